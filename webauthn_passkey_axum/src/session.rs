use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{HeaderMap, StatusCode, header::SET_COOKIE, request::Parts};

use webauthn_passkey::{SESSION_COOKIE_NAME, SessionUser, gen_random_string, get_user_from_session};

/// Cookie scoping in-flight ceremonies to one browser. Its value is the
/// cache key for stored challenges, so two tabs share a ceremony but two
/// browsers never do.
pub(crate) const CEREMONY_COOKIE_NAME: &str = "__Host-CeremonyId";

/// Outlives the challenge TTL so a slow ceremony fails on the expired
/// challenge, not on a vanished cookie.
const CEREMONY_COOKIE_MAX_AGE: i64 = 600;

pub(crate) fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(axum::http::header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

/// Read the ceremony id from the request, minting a new one (and the
/// Set-Cookie header carrying it) when absent. Begin handlers call this;
/// the returned headers must be forwarded in the response.
pub(crate) fn ceremony_context(
    headers: &HeaderMap,
) -> Result<(String, HeaderMap), (StatusCode, String)> {
    let mut set_headers = HeaderMap::new();

    if let Some(ceremony_id) = get_cookie(headers, CEREMONY_COOKIE_NAME) {
        return Ok((ceremony_id, set_headers));
    }

    let ceremony_id = gen_random_string(16).map_err(|e| {
        tracing::error!("Failed to generate ceremony id: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error".to_string(),
        )
    })?;

    let cookie = format!(
        "{CEREMONY_COOKIE_NAME}={ceremony_id}; SameSite=Lax; Secure; HttpOnly; Path=/; Max-Age={CEREMONY_COOKIE_MAX_AGE}"
    );
    set_headers.insert(
        SET_COOKIE,
        cookie.parse().map_err(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        })?,
    );

    Ok((ceremony_id, set_headers))
}

/// Ceremony id for complete handlers: the cookie must already exist.
pub(crate) fn require_ceremony_id(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    get_cookie(headers, CEREMONY_COOKIE_NAME)
        .ok_or((StatusCode::BAD_REQUEST, "Verification failed".to_string()))
}

/// Extractor resolving the session cookie to an authenticated user.
/// Use `Option<AuthUser>` on routes that work with or without a login.
#[derive(Clone, Debug)]
pub struct AuthUser(pub SessionUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session_id = get_cookie(&parts.headers, SESSION_COOKIE_NAME.as_str())
            .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated".to_string()))?;

        let user = get_user_from_session(&session_id)
            .await
            .map_err(|e| {
                tracing::error!("Session lookup failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal error".to_string(),
                )
            })?
            .ok_or((StatusCode::UNAUTHORIZED, "Not authenticated".to_string()))?;

        Ok(AuthUser(user))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state).await {
            Ok(user) => Ok(Some(user)),
            Err(_) => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::COOKIE, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_get_cookie_parses_multiple_pairs() {
        let headers =
            headers_with_cookie("foo=1; __Host-CeremonyId=abc123; __Host-SessionId=xyz");
        assert_eq!(
            get_cookie(&headers, CEREMONY_COOKIE_NAME).as_deref(),
            Some("abc123")
        );
        assert_eq!(get_cookie(&headers, "__Host-SessionId").as_deref(), Some("xyz"));
        assert_eq!(get_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_ceremony_context_reuses_existing_cookie() {
        let headers = headers_with_cookie("__Host-CeremonyId=existing");
        let (ceremony_id, set_headers) = ceremony_context(&headers).unwrap();
        assert_eq!(ceremony_id, "existing");
        assert!(set_headers.is_empty());
    }

    #[test]
    fn test_ceremony_context_mints_cookie_when_absent() {
        let (ceremony_id, set_headers) = ceremony_context(&HeaderMap::new()).unwrap();
        assert!(!ceremony_id.is_empty());
        let cookie = set_headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with(&format!("{CEREMONY_COOKIE_NAME}={ceremony_id}")));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_require_ceremony_id_without_cookie() {
        let result = require_ceremony_id(&HeaderMap::new());
        assert_eq!(result.unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
