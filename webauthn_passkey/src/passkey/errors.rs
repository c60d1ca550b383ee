use thiserror::Error;

use crate::storage::StorageError;
use crate::utils::UtilError;

/// Errors raised while running WebAuthn ceremonies.
///
/// The variants up to `PossibleCloning` mirror the distinct verification
/// failures; the HTTP layer is expected to collapse them into generic
/// responses so callers cannot probe which check failed.
#[derive(Debug, Error)]
pub enum PasskeyError {
    /// No challenge is stored for this ceremony, it expired, or it was
    /// already consumed.
    #[error("No active challenge for this ceremony")]
    NoChallenge,

    #[error("Challenge does not match the stored value")]
    ChallengeMismatch,

    #[error("Origin mismatch: got '{0}'")]
    OriginMismatch(String),

    #[error("Relying party ID hash mismatch")]
    RpIdMismatch,

    #[error("User verification required but not performed")]
    UserVerificationRequired,

    #[error("Credential not registered")]
    UnknownCredential,

    #[error("Credential ID already registered")]
    DuplicateCredentialId,

    #[error("Signature verification failed")]
    InvalidSignature,

    /// The sign counter did not advance; the private key may have been
    /// copied to another authenticator.
    #[error("Sign counter did not advance")]
    PossibleCloning,

    #[error("Invalid client data: {0}")]
    ClientData(String),

    #[error("Invalid authenticator data: {0}")]
    AuthenticatorData(String),

    #[error("Invalid attestation: {0}")]
    Attestation(String),

    #[error("Invalid format: {0}")]
    Format(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Utils(#[from] UtilError),
}

impl PasskeyError {
    /// True for failures that indicate tampering or credential cloning
    /// rather than a client-side mistake. These warrant a warn-level log
    /// and an authentication-denied response.
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::InvalidSignature | Self::PossibleCloning)
    }
}

impl From<StorageError> for PasskeyError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<sqlx::Error> for PasskeyError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::DuplicateCredentialId;
            }
        }
        Self::Storage(err.to_string())
    }
}
