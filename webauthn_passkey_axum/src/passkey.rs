use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use webauthn_passkey::{
    AuthenticationOptions, AuthenticatorResponse, PasskeyCredential, RegisterCredential,
    RegistrationOptions, RegistrationStartRequest, delete_passkey_credential_core,
    handle_finish_authentication_core, handle_finish_registration_core,
    handle_start_authentication_core, handle_start_registration_core, list_credentials_core,
};

use crate::error::IntoResponseError;
use crate::session::{AuthUser, ceremony_context, require_ceremony_id};

/// Routes for the passkey ceremonies and credential management. Mount
/// under [`crate::WEBAUTHN_ROUTE_PREFIX`].
pub fn router() -> Router {
    Router::new()
        .route("/register/begin", post(register_begin))
        .route("/register/complete", post(register_complete))
        .route("/authenticate/begin", post(authenticate_begin))
        .route("/authenticate/complete", post(authenticate_complete))
        .route("/credentials", get(list_credentials))
        .route("/credentials/{credential_id}", delete(delete_credential))
}

async fn register_begin(
    user: Option<AuthUser>,
    headers: HeaderMap,
    Json(request): Json<RegistrationStartRequest>,
) -> Result<(HeaderMap, Json<RegistrationOptions>), (StatusCode, String)> {
    let (ceremony_id, set_headers) = ceremony_context(&headers)?;

    let session_user = user.as_ref().map(|u| &u.0);
    let options = handle_start_registration_core(session_user, &ceremony_id, &request)
        .await
        .into_response_error()?;

    Ok((set_headers, Json(options)))
}

async fn register_complete(
    headers: HeaderMap,
    Json(reg_data): Json<RegisterCredential>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let ceremony_id = require_ceremony_id(&headers)?;

    handle_finish_registration_core(&ceremony_id, &reg_data)
        .await
        .into_response_error()?;

    Ok(Json(json!({"status": "ok"})))
}

#[derive(Debug, Default, Deserialize)]
struct AuthenticationStartRequest {
    username: Option<String>,
}

async fn authenticate_begin(
    headers: HeaderMap,
    body: Option<Json<AuthenticationStartRequest>>,
) -> Result<(HeaderMap, Json<AuthenticationOptions>), (StatusCode, String)> {
    let (ceremony_id, set_headers) = ceremony_context(&headers)?;

    let request = body.map(|Json(request)| request).unwrap_or_default();
    let options = handle_start_authentication_core(&ceremony_id, request.username.as_deref())
        .await
        .into_response_error()?;

    Ok((set_headers, Json(options)))
}

async fn authenticate_complete(
    headers: HeaderMap,
    Json(auth_response): Json<AuthenticatorResponse>,
) -> Result<(HeaderMap, Json<Value>), (StatusCode, String)> {
    let ceremony_id = require_ceremony_id(&headers)?;

    let (_user_id, session_headers) =
        handle_finish_authentication_core(&ceremony_id, &auth_response)
            .await
            .into_response_error()?;

    Ok((session_headers, Json(json!({"status": "ok"}))))
}

async fn list_credentials(
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<PasskeyCredential>>, (StatusCode, String)> {
    let credentials = list_credentials_core(&user.user_id)
        .await
        .into_response_error()?;
    Ok(Json(credentials))
}

async fn delete_credential(
    AuthUser(user): AuthUser,
    Path(credential_id): Path<String>,
) -> Result<StatusCode, (StatusCode, String)> {
    delete_passkey_credential_core(&user.user_id, &credential_id)
        .await
        .into_response_error()?;
    Ok(StatusCode::NO_CONTENT)
}
