use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::CacheData;

use super::errors::PasskeyError;

/// User entity as presented to the authenticator. `user_handle` is the
/// opaque `user.id` of the WebAuthn options; it is what discoverable
/// credentials hand back during authentication.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PublicKeyCredentialUserEntity {
    #[serde(rename = "id")]
    pub user_handle: String,
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

/// Challenge state held between the begin and complete halves of a
/// ceremony. Registration carries the user entity and the owning account
/// id; authentication stores neither.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredChallenge {
    /// base64url-encoded random bytes, exactly as sent to the client.
    pub challenge: String,
    pub user: Option<PublicKeyCredentialUserEntity>,
    pub user_id: Option<String>,
    /// Unix seconds at issuance.
    pub timestamp: u64,
    /// Lifetime in seconds.
    pub ttl: u64,
}

impl From<StoredChallenge> for CacheData {
    fn from(challenge: StoredChallenge) -> Self {
        let expires_at = Utc::now() + Duration::seconds(challenge.ttl as i64);
        Self {
            value: serde_json::to_string(&challenge).expect("Failed to serialize StoredChallenge"),
            expires_at,
        }
    }
}

impl TryFrom<CacheData> for StoredChallenge {
    type Error = PasskeyError;

    fn try_from(data: CacheData) -> Result<Self, Self::Error> {
        serde_json::from_str(&data.value).map_err(|e| PasskeyError::Storage(e.to_string()))
    }
}

/// A registered credential as persisted in the credential store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PasskeyCredential {
    /// base64url-encoded credential ID (the lookup key).
    pub credential_id: String,
    /// Opaque account identifier supplied by the host application.
    pub user_id: String,
    /// base64url-encoded public key: uncompressed P-256 point for ES256,
    /// DER RSAPublicKey for RS256.
    pub public_key: String,
    /// COSE algorithm identifier: -7 (ES256) or -257 (RS256).
    pub algorithm: i32,
    pub sign_count: u32,
    pub transports: Vec<String>,
    pub user: PublicKeyCredentialUserEntity,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub enum CredentialSearchField {
    CredentialId(String),
    UserId(String),
    UserHandle(String),
    UserName(String),
}
