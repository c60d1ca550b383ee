use chrono::Utc;
use subtle::ConstantTimeEq;

use crate::storage::GENERIC_CACHE_STORE;
use crate::utils::gen_random_string;

use super::super::config::PASSKEY_CHALLENGE_TIMEOUT;
use super::super::errors::PasskeyError;
use super::super::types::{PublicKeyCredentialUserEntity, StoredChallenge};

/// 32 bytes of entropy per challenge; the protocol floor is 16.
const CHALLENGE_LEN: usize = 32;

/// Registration and authentication challenges live under different cache
/// prefixes, so one kind can never satisfy the other.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    fn cache_prefix(self) -> &'static str {
        match self {
            Self::Registration => "regi_challenge",
            Self::Authentication => "auth_challenge",
        }
    }
}

/// Generate a fresh challenge and store it keyed by the ceremony id,
/// replacing any previous challenge for the same ceremony.
pub(crate) async fn issue_challenge(
    kind: CeremonyKind,
    ceremony_id: &str,
    user: Option<PublicKeyCredentialUserEntity>,
    user_id: Option<String>,
) -> Result<StoredChallenge, PasskeyError> {
    let stored = StoredChallenge {
        challenge: gen_random_string(CHALLENGE_LEN)?,
        user,
        user_id,
        timestamp: Utc::now().timestamp() as u64,
        ttl: *PASSKEY_CHALLENGE_TIMEOUT,
    };

    GENERIC_CACHE_STORE
        .lock()
        .await
        .put_with_ttl(
            kind.cache_prefix(),
            ceremony_id,
            stored.clone().into(),
            *PASSKEY_CHALLENGE_TIMEOUT as usize,
        )
        .await?;

    tracing::debug!(
        "Issued {:?} challenge for ceremony {}",
        kind,
        ceremony_id
    );
    Ok(stored)
}

/// Atomically remove and return the stored challenge for a ceremony.
///
/// Callers take the challenge before running any other verification, so
/// a failed ceremony burns its challenge just like a successful one.
pub(crate) async fn take_challenge(
    kind: CeremonyKind,
    ceremony_id: &str,
) -> Result<Option<StoredChallenge>, PasskeyError> {
    let data = GENERIC_CACHE_STORE
        .lock()
        .await
        .take(kind.cache_prefix(), ceremony_id)
        .await?;

    let Some(data) = data else {
        return Ok(None);
    };

    let stored: StoredChallenge = data.try_into()?;

    // The cache already enforces expiry; this guards against a backend
    // that returned a stale entry anyway.
    let age = (Utc::now().timestamp() as u64).saturating_sub(stored.timestamp);
    if age > stored.ttl {
        tracing::warn!(
            "Challenge for ceremony {} outlived its TTL ({}s > {}s)",
            ceremony_id,
            age,
            stored.ttl
        );
        return Ok(None);
    }

    Ok(Some(stored))
}

/// Compare a client-presented challenge against a previously taken one.
pub(crate) fn verify_taken_challenge(
    presented: &str,
    taken: Option<StoredChallenge>,
) -> Result<StoredChallenge, PasskeyError> {
    let stored = taken.ok_or(PasskeyError::NoChallenge)?;

    let matches: bool = stored
        .challenge
        .as_bytes()
        .ct_eq(presented.as_bytes())
        .into();
    if matches {
        Ok(stored)
    } else {
        Err(PasskeyError::ChallengeMismatch)
    }
}

/// Take and verify in one step. Success and failure both leave the
/// challenge destroyed.
#[cfg(test)]
pub(crate) async fn consume_challenge(
    kind: CeremonyKind,
    ceremony_id: &str,
    presented: &str,
) -> Result<StoredChallenge, PasskeyError> {
    let taken = take_challenge(kind, ceremony_id).await?;
    verify_taken_challenge(presented, taken)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_test_environment;

    #[tokio::test]
    async fn test_issue_and_consume() {
        init_test_environment().await;

        let stored = issue_challenge(CeremonyKind::Registration, "cer-consume", None, None)
            .await
            .unwrap();

        let consumed = consume_challenge(
            CeremonyKind::Registration,
            "cer-consume",
            &stored.challenge,
        )
        .await
        .unwrap();
        assert_eq!(consumed.challenge, stored.challenge);
    }

    #[tokio::test]
    async fn test_challenge_is_single_use() {
        init_test_environment().await;

        let stored = issue_challenge(CeremonyKind::Registration, "cer-single", None, None)
            .await
            .unwrap();

        consume_challenge(CeremonyKind::Registration, "cer-single", &stored.challenge)
            .await
            .unwrap();

        // Same value again: the challenge is gone
        let replay =
            consume_challenge(CeremonyKind::Registration, "cer-single", &stored.challenge).await;
        assert!(matches!(replay, Err(PasskeyError::NoChallenge)));
    }

    #[tokio::test]
    async fn test_mismatch_destroys_challenge() {
        init_test_environment().await;

        let stored = issue_challenge(CeremonyKind::Authentication, "cer-mismatch", None, None)
            .await
            .unwrap();

        let wrong =
            consume_challenge(CeremonyKind::Authentication, "cer-mismatch", "d3Jvbmc").await;
        assert!(matches!(wrong, Err(PasskeyError::ChallengeMismatch)));

        // The correct value no longer works either
        let retry = consume_challenge(
            CeremonyKind::Authentication,
            "cer-mismatch",
            &stored.challenge,
        )
        .await;
        assert!(matches!(retry, Err(PasskeyError::NoChallenge)));
    }

    #[tokio::test]
    async fn test_ceremony_kinds_are_isolated() {
        init_test_environment().await;

        let stored = issue_challenge(CeremonyKind::Registration, "cer-kind", None, None)
            .await
            .unwrap();

        // A registration challenge cannot complete an authentication
        let cross =
            consume_challenge(CeremonyKind::Authentication, "cer-kind", &stored.challenge).await;
        assert!(matches!(cross, Err(PasskeyError::NoChallenge)));

        // It is still available for its own kind
        consume_challenge(CeremonyKind::Registration, "cer-kind", &stored.challenge)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reissue_replaces_previous_challenge() {
        init_test_environment().await;

        let first = issue_challenge(CeremonyKind::Registration, "cer-reissue", None, None)
            .await
            .unwrap();
        let second = issue_challenge(CeremonyKind::Registration, "cer-reissue", None, None)
            .await
            .unwrap();
        assert_ne!(first.challenge, second.challenge);

        let old = consume_challenge(CeremonyKind::Registration, "cer-reissue", &first.challenge)
            .await;
        assert!(matches!(old, Err(PasskeyError::ChallengeMismatch)));
    }

    #[tokio::test]
    async fn test_expired_challenge_is_gone() {
        init_test_environment().await;

        // Plant an already-expired entry directly in the cache
        let stored = StoredChallenge {
            challenge: "ZXhwaXJlZA".to_string(),
            user: None,
            user_id: None,
            timestamp: (Utc::now().timestamp() as u64) - 1000,
            ttl: 1,
        };
        let mut data: crate::storage::CacheData = stored.into();
        data.expires_at = Utc::now() - chrono::Duration::seconds(1);
        GENERIC_CACHE_STORE
            .lock()
            .await
            .put_with_ttl("regi_challenge", "cer-expired", data, 1)
            .await
            .unwrap();

        let result =
            consume_challenge(CeremonyKind::Registration, "cer-expired", "ZXhwaXJlZA").await;
        assert!(matches!(result, Err(PasskeyError::NoChallenge)));
    }

    #[tokio::test]
    async fn test_registration_challenge_carries_user() {
        init_test_environment().await;

        let user = PublicKeyCredentialUserEntity {
            user_handle: "aGFuZGxl".to_string(),
            name: "alice".to_string(),
            display_name: "Alice".to_string(),
        };
        let stored = issue_challenge(
            CeremonyKind::Registration,
            "cer-user",
            Some(user.clone()),
            Some("U1".to_string()),
        )
        .await
        .unwrap();

        let consumed =
            consume_challenge(CeremonyKind::Registration, "cer-user", &stored.challenge)
                .await
                .unwrap();
        assert_eq!(consumed.user, Some(user));
        assert_eq!(consumed.user_id.as_deref(), Some("U1"));
    }
}
