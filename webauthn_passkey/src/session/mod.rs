//! Cache-backed sessions binding a browser to an authenticated user.
//!
//! The core only reads and writes the session store and builds
//! `Set-Cookie` headers; parsing the Cookie request header is left to the
//! HTTP integration layer.

mod errors;

use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::{env, sync::LazyLock};

use chrono::{Duration, Utc};

use crate::storage::{CacheData, GENERIC_CACHE_STORE};
use crate::utils::{gen_random_string, header_set_cookie};

pub use errors::SessionError;

const SESSION_CACHE_PREFIX: &str = "session";

pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "__Host-SessionId".to_string())
});

/// Session lifetime in seconds.
pub(crate) static SESSION_TTL: LazyLock<u64> = LazyLock::new(|| {
    env::var("SESSION_TTL")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600)
});

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub user_id: String,
}

impl From<SessionUser> for CacheData {
    fn from(user: SessionUser) -> Self {
        Self {
            value: serde_json::to_string(&user).expect("Failed to serialize SessionUser"),
            expires_at: Utc::now() + Duration::seconds(*SESSION_TTL as i64),
        }
    }
}

impl TryFrom<CacheData> for SessionUser {
    type Error = SessionError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| SessionError::Storage(e.to_string()))
    }
}

/// Bind a session id to a user in the session store.
pub async fn bind_session(session_id: &str, user_id: &str) -> Result<(), SessionError> {
    let user = SessionUser {
        user_id: user_id.to_string(),
    };
    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            SESSION_CACHE_PREFIX,
            session_id,
            user.into(),
            *SESSION_TTL as usize,
        )
        .await?;
    Ok(())
}

pub async fn get_user_from_session(session_id: &str) -> Result<Option<SessionUser>, SessionError> {
    let data = GENERIC_CACHE_STORE
        .lock()
        .await
        .get(SESSION_CACHE_PREFIX, session_id)
        .await?;
    data.map(SessionUser::try_from).transpose()
}

pub async fn unbind_session(session_id: &str) -> Result<(), SessionError> {
    GENERIC_CACHE_STORE
        .lock()
        .await
        .remove(SESSION_CACHE_PREFIX, session_id)
        .await?;
    Ok(())
}

/// Mint a fresh session for the user and return the `Set-Cookie` header
/// establishing it. A new id on every login keeps an attacker-planted
/// session id from surviving authentication.
pub async fn new_session_header(user_id: &str) -> Result<HeaderMap, SessionError> {
    let session_id = gen_random_string(32)?;
    bind_session(&session_id, user_id).await?;

    let mut headers = HeaderMap::new();
    header_set_cookie(
        &mut headers,
        SESSION_COOKIE_NAME.as_str(),
        &session_id,
        *SESSION_TTL as i64,
    )
    .map_err(|e| SessionError::Cookie(e.to_string()))?;
    Ok(headers)
}
