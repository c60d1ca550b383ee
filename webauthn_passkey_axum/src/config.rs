use std::{env, sync::LazyLock};

/// Mount point for the passkey router, e.g. `/webauthn`.
pub static WEBAUTHN_ROUTE_PREFIX: LazyLock<String> = LazyLock::new(|| {
    env::var("WEBAUTHN_ROUTE_PREFIX").unwrap_or_else(|_| "/webauthn".to_string())
});
