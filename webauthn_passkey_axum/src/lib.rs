//! Axum bindings for [`webauthn_passkey`]: a drop-in router for the
//! registration and authentication ceremonies, cookie handling for
//! ceremony scoping and sessions, and an `AuthUser` extractor for
//! protected routes.

mod config;
mod error;
mod passkey;
mod session;

pub use config::WEBAUTHN_ROUTE_PREFIX;
pub use passkey::router;
pub use session::AuthUser;

pub use webauthn_passkey::{SessionUser, get_user_from_session, unbind_session};

/// Initialize the underlying passkey library (configuration and stores).
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    webauthn_passkey::init().await
}
