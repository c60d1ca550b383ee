use axum::http::StatusCode;

use webauthn_passkey::{CoordinationError, PasskeyError};

/// Collapse internal errors into deliberately vague HTTP responses: a
/// caller probing the complete endpoints learns "verification failed",
/// not which check tripped.
pub(crate) trait IntoResponseError<T> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)>;
}

impl<T> IntoResponseError<T> for Result<T, CoordinationError> {
    fn into_response_error(self) -> Result<T, (StatusCode, String)> {
        self.map_err(map_coordination_error)
    }
}

fn map_coordination_error(err: CoordinationError) -> (StatusCode, String) {
    match &err {
        CoordinationError::Unauthorized => {
            (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
        }
        CoordinationError::ResourceNotFound { .. } => {
            (StatusCode::NOT_FOUND, "Not found".to_string())
        }
        CoordinationError::Passkey(e) => map_passkey_error(e),
        CoordinationError::Coordination(_)
        | CoordinationError::Session(_)
        | CoordinationError::Utils(_) => {
            tracing::error!("Internal error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
    }
}

fn map_passkey_error(err: &PasskeyError) -> (StatusCode, String) {
    if err.is_security_event() {
        // Already logged at warn by the core; deny without detail
        return (StatusCode::UNAUTHORIZED, "Verification failed".to_string());
    }

    match err {
        PasskeyError::Storage(_) | PasskeyError::Config(_) => {
            tracing::error!("Internal error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            )
        }
        _ => (StatusCode::BAD_REQUEST, "Verification failed".to_string()),
    }
}
