use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Data stored in the cache.
///
/// `expires_at` travels with the value so backends without native key
/// expiry (the in-memory store) can still enforce TTL on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheData {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl CacheData {
    pub(crate) fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}
