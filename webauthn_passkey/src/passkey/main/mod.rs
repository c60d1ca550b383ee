mod attestation;
mod auth;
mod challenge;
mod register;
pub(crate) mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use types::{
    AuthenticationOptions, AuthenticatorResponse, RegisterCredential, RegistrationOptions,
};

pub(crate) use auth::{finish_authentication, start_authentication};
pub(crate) use register::{finish_registration, start_registration};
