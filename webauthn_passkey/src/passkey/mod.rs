pub(crate) mod config;
mod errors;
pub(crate) mod main;
mod storage;
mod types;

pub use config::{AuthenticatorAttachment, ResidentKeyRequirement, UserVerificationPolicy};
pub use errors::PasskeyError;
pub use main::{
    AuthenticationOptions, AuthenticatorResponse, RegisterCredential, RegistrationOptions,
};
pub(crate) use main::{
    finish_authentication, finish_registration, start_authentication, start_registration,
};
pub(crate) use storage::PasskeyStore;
pub use types::PasskeyCredential;
pub(crate) use types::CredentialSearchField;

pub(crate) async fn init() -> Result<(), PasskeyError> {
    config::validate_passkey_config()?;
    PasskeyStore::init().await
}
