use http::HeaderMap;
use serde::Deserialize;

use crate::passkey::{
    AuthenticationOptions, AuthenticatorResponse, CredentialSearchField, PasskeyCredential,
    PasskeyStore, RegisterCredential, RegistrationOptions, finish_authentication,
    finish_registration, start_authentication, start_registration,
};
use crate::session::{SessionUser, new_session_header};

use super::errors::CoordinationError;

#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationStartRequest {
    /// Account to attach the passkey to when no session user exists,
    /// e.g. first-time signup.
    pub user_id: Option<String>,
    pub username: String,
    pub displayname: String,
}

/// Begin a registration ceremony. The owner comes from the authenticated
/// session when present, else from the request body.
pub async fn handle_start_registration_core(
    session_user: Option<&SessionUser>,
    ceremony_id: &str,
    request: &RegistrationStartRequest,
) -> Result<RegistrationOptions, CoordinationError> {
    let owner_id = session_user
        .map(|user| user.user_id.clone())
        .or_else(|| request.user_id.clone())
        .ok_or(CoordinationError::Unauthorized)
        .map_err(CoordinationError::log)?;

    let options =
        start_registration(ceremony_id, &owner_id, &request.username, &request.displayname)
            .await
            .map_err(|e| CoordinationError::from(e).log())?;
    Ok(options)
}

/// Complete a registration ceremony; returns the new credential id.
pub async fn handle_finish_registration_core(
    ceremony_id: &str,
    reg_data: &RegisterCredential,
) -> Result<String, CoordinationError> {
    finish_registration(ceremony_id, reg_data)
        .await
        .map_err(|e| CoordinationError::from(e).log())
}

/// Begin an authentication ceremony, optionally narrowed to a username.
pub async fn handle_start_authentication_core(
    ceremony_id: &str,
    username: Option<&str>,
) -> Result<AuthenticationOptions, CoordinationError> {
    start_authentication(ceremony_id, username)
        .await
        .map_err(|e| CoordinationError::from(e).log())
}

/// Complete an authentication ceremony. On success returns the
/// authenticated user id plus the `Set-Cookie` headers establishing a
/// fresh session bound to it.
pub async fn handle_finish_authentication_core(
    ceremony_id: &str,
    auth_response: &AuthenticatorResponse,
) -> Result<(String, HeaderMap), CoordinationError> {
    let (user_id, credential_id) = finish_authentication(ceremony_id, auth_response)
        .await
        .map_err(|e| CoordinationError::from(e).log())?;

    tracing::debug!(
        "Session established for user {} via credential {}",
        user_id,
        credential_id
    );

    let headers = new_session_header(&user_id).await?;
    Ok((user_id, headers))
}

/// List the credentials owned by a user.
pub async fn list_credentials_core(
    user_id: &str,
) -> Result<Vec<PasskeyCredential>, CoordinationError> {
    let credentials =
        PasskeyStore::get_credentials_by(CredentialSearchField::UserId(user_id.to_string()))
            .await
            .map_err(|e| CoordinationError::from(e).log())?;
    Ok(credentials)
}

/// Delete one credential, refusing unless the requester owns it.
pub async fn delete_passkey_credential_core(
    user_id: &str,
    credential_id: &str,
) -> Result<(), CoordinationError> {
    let credential = PasskeyStore::get_credential(credential_id)
        .await
        .map_err(|e| CoordinationError::from(e).log())?
        .ok_or_else(|| {
            CoordinationError::ResourceNotFound {
                resource_type: "Credential".to_string(),
                resource_id: credential_id.to_string(),
            }
            .log()
        })?;

    if credential.user_id != user_id {
        return Err(CoordinationError::Unauthorized.log());
    }

    PasskeyStore::delete_credential_by(CredentialSearchField::CredentialId(
        credential_id.to_string(),
    ))
    .await
    .map_err(|e| CoordinationError::from(e).log())?;

    tracing::info!("Deleted credential {} for user {}", credential_id, user_id);
    Ok(())
}
