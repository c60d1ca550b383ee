mod errors;
mod passkey;

pub use errors::CoordinationError;
pub use passkey::{
    RegistrationStartRequest, delete_passkey_credential_core, handle_finish_authentication_core,
    handle_finish_registration_core, handle_start_authentication_core,
    handle_start_registration_core, list_credentials_core,
};
