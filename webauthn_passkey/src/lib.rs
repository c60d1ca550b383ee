//! WebAuthn passkey registration and authentication.
//!
//! The crate runs both ceremony halves server-side: it issues single-use
//! challenges, verifies `navigator.credentials.create()` and `.get()`
//! responses (ES256 and RS256, attestation format `none`), persists
//! credentials in SQLite or PostgreSQL, and binds successful
//! authentications to cache-backed sessions.
//!
//! Configuration comes from environment variables (`ORIGIN`,
//! `PASSKEY_RP_ID`, `GENERIC_CACHE_STORE_TYPE`, `GENERIC_DATA_STORE_TYPE`
//! and friends). Call [`init`] once at startup to validate them and
//! prepare the stores.

mod coordination;
mod passkey;
mod session;
mod storage;
mod utils;

#[cfg(test)]
mod test_utils;

pub use coordination::{
    CoordinationError, RegistrationStartRequest, delete_passkey_credential_core,
    handle_finish_authentication_core, handle_finish_registration_core,
    handle_start_authentication_core, handle_start_registration_core, list_credentials_core,
};
pub use passkey::{
    AuthenticationOptions, AuthenticatorAttachment, AuthenticatorResponse, PasskeyCredential,
    PasskeyError, RegisterCredential, RegistrationOptions, ResidentKeyRequirement,
    UserVerificationPolicy,
};
pub use session::{
    SESSION_COOKIE_NAME, SessionError, SessionUser, get_user_from_session, new_session_header,
    unbind_session,
};
pub use utils::{UtilError, gen_random_string};

/// Validate configuration and initialize the cache and data stores.
/// Reads a `.env` file first when one exists.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    storage::init().await?;
    passkey::init().await?;

    tracing::info!("webauthn-passkey initialized");
    Ok(())
}
