use thiserror::Error;

use crate::passkey::PasskeyError;
use crate::session::SessionError;
use crate::utils::UtilError;

#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("Coordination error: {0}")]
    Coordination(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("{resource_type} not found: {resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    #[error(transparent)]
    Passkey(#[from] PasskeyError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Utils(#[from] UtilError),
}

impl CoordinationError {
    /// Log at an appropriate level and hand the error back, so call sites
    /// can `return Err(err.log())`.
    pub(crate) fn log(self) -> Self {
        match &self {
            Self::Passkey(e) if e.is_security_event() => {
                tracing::warn!("Security event: {}", e);
            }
            _ => {
                tracing::debug!("Coordination error: {:#?}", self);
            }
        }
        self
    }
}
