use serde::Serialize;
use std::{env, sync::LazyLock};

use super::errors::PasskeyError;

/// Web origin the relying party is served from, e.g. `https://app.example`.
/// Client data origins are compared against this string byte for byte.
pub(crate) static ORIGIN: LazyLock<String> =
    LazyLock::new(|| env::var("ORIGIN").expect("ORIGIN must be set"));

/// Relying party ID. Defaults to the host part of `ORIGIN`; override with
/// `PASSKEY_RP_ID` to scope credentials to a registrable parent domain.
pub(crate) static PASSKEY_RP_ID: LazyLock<String> = LazyLock::new(|| {
    env::var("PASSKEY_RP_ID").unwrap_or_else(|_| origin_host(ORIGIN.as_str()).to_string())
});

pub(crate) static PASSKEY_RP_NAME: LazyLock<String> =
    LazyLock::new(|| env::var("PASSKEY_RP_NAME").unwrap_or_else(|_| PASSKEY_RP_ID.clone()));

/// Ceremony timeout surfaced to the browser, in seconds.
pub(crate) static PASSKEY_TIMEOUT: LazyLock<u32> = LazyLock::new(|| {
    env::var("PASSKEY_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60)
});

/// Lifetime of a stored challenge, in seconds.
pub(crate) static PASSKEY_CHALLENGE_TIMEOUT: LazyLock<u64> = LazyLock::new(|| {
    env::var("PASSKEY_CHALLENGE_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(300)
});

pub(crate) static PASSKEY_ATTESTATION: LazyLock<String> = LazyLock::new(|| {
    let value = env::var("PASSKEY_ATTESTATION").unwrap_or_else(|_| "none".to_string());
    match value.as_str() {
        "none" | "indirect" | "direct" | "enterprise" => value,
        invalid => {
            tracing::warn!(
                "Invalid PASSKEY_ATTESTATION '{}', defaulting to 'none'",
                invalid
            );
            "none".to_string()
        }
    }
});

pub(crate) static PASSKEY_AUTHENTICATOR_ATTACHMENT: LazyLock<AuthenticatorAttachment> =
    LazyLock::new(|| {
        let value =
            env::var("PASSKEY_AUTHENTICATOR_ATTACHMENT").unwrap_or_else(|_| "platform".to_string());
        AuthenticatorAttachment::parse(&value).unwrap_or_else(|| {
            tracing::warn!(
                "Invalid PASSKEY_AUTHENTICATOR_ATTACHMENT '{}', defaulting to 'platform'",
                value
            );
            AuthenticatorAttachment::Platform
        })
    });

pub(crate) static PASSKEY_RESIDENT_KEY: LazyLock<ResidentKeyRequirement> = LazyLock::new(|| {
    let value = env::var("PASSKEY_RESIDENT_KEY").unwrap_or_else(|_| "required".to_string());
    ResidentKeyRequirement::parse(&value).unwrap_or_else(|| {
        tracing::warn!(
            "Invalid PASSKEY_RESIDENT_KEY '{}', defaulting to 'required'",
            value
        );
        ResidentKeyRequirement::Required
    })
});

pub(crate) static PASSKEY_USER_VERIFICATION: LazyLock<UserVerificationPolicy> =
    LazyLock::new(|| {
        let value = env::var("PASSKEY_USER_VERIFICATION").unwrap_or_else(|_| "required".to_string());
        UserVerificationPolicy::parse(&value).unwrap_or_else(|| {
            tracing::warn!(
                "Invalid PASSKEY_USER_VERIFICATION '{}', defaulting to 'required'",
                value
            );
            UserVerificationPolicy::Required
        })
    });

fn origin_host(origin: &str) -> &str {
    let without_scheme = origin
        .strip_prefix("https://")
        .or_else(|| origin.strip_prefix("http://"))
        .unwrap_or(origin);
    let without_path = without_scheme
        .split_once('/')
        .map_or(without_scheme, |(host, _)| host);
    without_path
        .split_once(':')
        .map_or(without_path, |(host, _)| host)
}

/// Which kind of authenticator the browser should offer during registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorAttachment {
    Platform,
    CrossPlatform,
    /// No preference; the field is omitted from the wire options.
    Any,
}

impl AuthenticatorAttachment {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "platform" => Some(Self::Platform),
            "cross-platform" => Some(Self::CrossPlatform),
            "any" => Some(Self::Any),
            _ => None,
        }
    }

    pub(crate) fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResidentKeyRequirement {
    Discouraged,
    Preferred,
    Required,
}

impl ResidentKeyRequirement {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "discouraged" => Some(Self::Discouraged),
            "preferred" => Some(Self::Preferred),
            "required" => Some(Self::Required),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserVerificationPolicy {
    Discouraged,
    Preferred,
    Required,
}

impl UserVerificationPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "discouraged" => Some(Self::Discouraged),
            "preferred" => Some(Self::Preferred),
            "required" => Some(Self::Required),
            _ => None,
        }
    }
}

pub(crate) fn validate_passkey_config() -> Result<(), PasskeyError> {
    let origin = ORIGIN.as_str();
    if !origin.starts_with("https://") && !origin.starts_with("http://") {
        return Err(PasskeyError::Config(format!(
            "ORIGIN must start with http:// or https://, got '{origin}'"
        )));
    }
    if PASSKEY_RP_ID.is_empty() {
        return Err(PasskeyError::Config("PASSKEY_RP_ID is empty".to_string()));
    }
    // Force the remaining statics so bad values warn at startup, not mid-ceremony
    let _ = *PASSKEY_TIMEOUT;
    let _ = *PASSKEY_CHALLENGE_TIMEOUT;
    let _ = PASSKEY_ATTESTATION.as_str();
    let _ = *PASSKEY_AUTHENTICATOR_ATTACHMENT;
    let _ = *PASSKEY_RESIDENT_KEY;
    let _ = *PASSKEY_USER_VERIFICATION;
    Ok(())
}
