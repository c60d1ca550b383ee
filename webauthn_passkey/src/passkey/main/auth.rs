use ring::digest;
use ring::signature::UnparsedPublicKey;

use crate::utils::base64url_decode;

use super::super::config::{PASSKEY_RP_ID, PASSKEY_TIMEOUT, PASSKEY_USER_VERIFICATION};
use super::super::errors::PasskeyError;
use super::super::storage::PasskeyStore;
use super::super::types::{CredentialSearchField, PasskeyCredential};
use super::attestation::{COSE_ALG_ES256, COSE_ALG_RS256};
use super::challenge::{self, CeremonyKind};
use super::types::{
    AuthenticationOptions, AuthenticatorData, AuthenticatorResponse, CredentialDescriptor,
    ParsedClientData,
};

/// Build request options for an authentication ceremony.
///
/// With a username the allow list names that account's credentials; with
/// none the list stays empty and the browser offers any discoverable
/// credential for this RP.
pub(crate) async fn start_authentication(
    ceremony_id: &str,
    username: Option<&str>,
) -> Result<AuthenticationOptions, PasskeyError> {
    let allow_credentials = match username {
        Some(name) => {
            PasskeyStore::get_credentials_by(CredentialSearchField::UserName(name.to_string()))
                .await?
                .into_iter()
                .map(|credential| CredentialDescriptor {
                    type_: "public-key".to_string(),
                    id: credential.credential_id,
                    transports: credential.transports,
                })
                .collect()
        }
        None => Vec::new(),
    };

    let stored =
        challenge::issue_challenge(CeremonyKind::Authentication, ceremony_id, None, None).await?;

    Ok(AuthenticationOptions {
        challenge: stored.challenge,
        timeout: *PASSKEY_TIMEOUT * 1000,
        rp_id: PASSKEY_RP_ID.clone(),
        allow_credentials,
        user_verification: *PASSKEY_USER_VERIFICATION,
    })
}

/// Verify a `navigator.credentials.get()` assertion. On success returns
/// the owning user id and the credential id that signed.
///
/// The stored challenge is taken first; a failed assertion burns it just
/// like a successful one.
pub(crate) async fn finish_authentication(
    ceremony_id: &str,
    auth_response: &AuthenticatorResponse,
) -> Result<(String, String), PasskeyError> {
    let taken = challenge::take_challenge(CeremonyKind::Authentication, ceremony_id).await?;

    let credential = PasskeyStore::get_credential(&auth_response.id)
        .await?
        .ok_or(PasskeyError::UnknownCredential)?;

    let client_data = ParsedClientData::from_base64(&auth_response.response.client_data_json)?;
    client_data.verify_ceremony_type("webauthn.get")?;
    client_data.verify_origin()?;
    challenge::verify_taken_challenge(&client_data.challenge, taken)?;

    let auth_data = AuthenticatorData::from_base64(&auth_response.response.authenticator_data)?;
    auth_data.verify()?;

    verify_user_handle(auth_response, &credential)?;
    verify_signature(auth_response, &credential, &auth_data, &client_data)?;
    verify_counter(&credential, auth_data.sign_count).await?;

    tracing::info!(
        "Authenticated user {} with credential {}",
        credential.user_id,
        credential.credential_id
    );
    Ok((credential.user_id, credential.credential_id))
}

/// A present user handle must match the one minted at registration;
/// an absent handle is fine in allow-list flows.
fn verify_user_handle(
    auth_response: &AuthenticatorResponse,
    credential: &PasskeyCredential,
) -> Result<(), PasskeyError> {
    match auth_response.response.user_handle.as_deref() {
        Some(handle) if handle != credential.user.user_handle => Err(PasskeyError::Verification(
            "User handle does not match the credential".into(),
        )),
        _ => Ok(()),
    }
}

/// The signature covers `authenticator_data || sha256(client_data_json)`,
/// verified with the algorithm fixed at registration. No fallback: a
/// signature that fails under the stored algorithm fails, full stop.
fn verify_signature(
    auth_response: &AuthenticatorResponse,
    credential: &PasskeyCredential,
    auth_data: &AuthenticatorData,
    client_data: &ParsedClientData,
) -> Result<(), PasskeyError> {
    let public_key = base64url_decode(&credential.public_key)?;
    let signature = base64url_decode(&auth_response.response.signature)?;

    let client_data_hash = digest::digest(&digest::SHA256, &client_data.raw_data);
    let mut signed_data = Vec::with_capacity(auth_data.raw_data.len() + 32);
    signed_data.extend_from_slice(&auth_data.raw_data);
    signed_data.extend_from_slice(client_data_hash.as_ref());

    let algorithm: &'static dyn ring::signature::VerificationAlgorithm = match credential.algorithm
    {
        COSE_ALG_ES256 => &ring::signature::ECDSA_P256_SHA256_ASN1,
        COSE_ALG_RS256 => &ring::signature::RSA_PKCS1_2048_8192_SHA256,
        alg => {
            return Err(PasskeyError::NotSupported(format!(
                "Unsupported stored algorithm: {alg}"
            )));
        }
    };

    UnparsedPublicKey::new(algorithm, &public_key)
        .verify(&signed_data, &signature)
        .map_err(|_| PasskeyError::InvalidSignature)
}

/// Counter rule: once the stored counter is nonzero, every assertion must
/// strictly advance it; a repeat or regression means the key may exist on
/// more than one device. A stored zero paired with a reported zero is a
/// counter-less authenticator and stays acceptable indefinitely.
async fn verify_counter(
    credential: &PasskeyCredential,
    new_sign_count: u32,
) -> Result<(), PasskeyError> {
    let stored = credential.sign_count;

    if stored == 0 && new_sign_count == 0 {
        PasskeyStore::touch_last_used(&credential.credential_id).await?;
        return Ok(());
    }

    if stored != 0 && new_sign_count <= stored {
        tracing::warn!(
            "Sign counter for credential {} went {} -> {}; possible cloned authenticator",
            credential.credential_id,
            stored,
            new_sign_count
        );
        return Err(PasskeyError::PossibleCloning);
    }

    // The conditional update settles races: of two assertions presenting
    // the same counter only one row-match succeeds.
    let updated =
        PasskeyStore::update_sign_count(&credential.credential_id, new_sign_count).await?;
    if !updated {
        tracing::warn!(
            "Concurrent counter update lost for credential {}; possible cloned authenticator",
            credential.credential_id
        );
        return Err(PasskeyError::PossibleCloning);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passkey::main::test_utils::{
        TestAuthenticator, assertion_auth_data, client_data_b64, insert_credential,
    };
    use crate::test_utils::init_test_environment;
    use crate::utils::base64url_encode;
    use serial_test::serial;

    const TEST_ORIGIN: &str = "https://app.example";

    fn assertion(
        authenticator: &TestAuthenticator,
        credential_id: &str,
        challenge: &str,
        origin: &str,
        sign_count: u32,
        user_handle: Option<&str>,
    ) -> AuthenticatorResponse {
        let auth_data = assertion_auth_data("example", sign_count);
        let client_data = client_data_b64("webauthn.get", challenge, origin);
        let signature = authenticator.sign_assertion(&auth_data, &client_data);

        AuthenticatorResponse {
            id: credential_id.to_string(),
            raw_id: credential_id.to_string(),
            type_: "public-key".to_string(),
            response: super::super::types::AuthenticatorAssertionResponse {
                client_data_json: client_data,
                authenticator_data: base64url_encode(auth_data).unwrap(),
                signature,
                user_handle: user_handle.map(str::to_string),
            },
        }
    }

    async fn cleanup(user_id: &str) {
        PasskeyStore::delete_credential_by(CredentialSearchField::UserId(user_id.to_string()))
            .await
            .unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn test_full_authentication_flow() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-flow-cred", "U1", 5).await;

        let options = start_authentication("auth-flow", Some("name-U1")).await.unwrap();
        assert_eq!(options.allow_credentials.len(), 1);
        assert_eq!(options.rp_id, "example");

        let response = assertion(
            &authenticator,
            &credential_id,
            &options.challenge,
            TEST_ORIGIN,
            6,
            None,
        );
        let (user_id, used_credential) =
            finish_authentication("auth-flow", &response).await.unwrap();
        assert_eq!(user_id, "U1");
        assert_eq!(used_credential, credential_id);

        // Counter persisted
        let stored = PasskeyStore::get_credential(&credential_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sign_count, 6);

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_replayed_assertion_is_rejected() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-replay-cred", "U1", 5).await;

        let options = start_authentication("auth-replay", None).await.unwrap();
        let response = assertion(
            &authenticator,
            &credential_id,
            &options.challenge,
            TEST_ORIGIN,
            6,
            None,
        );
        finish_authentication("auth-replay", &response).await.unwrap();

        // Bit-for-bit replay: the challenge no longer exists
        let replay = finish_authentication("auth-replay", &response).await;
        assert!(matches!(replay, Err(PasskeyError::NoChallenge)));

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_unknown_credential() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let options = start_authentication("auth-unknown", None).await.unwrap();
        let response = assertion(
            &authenticator,
            "bm8tc3VjaC1jcmVk",
            &options.challenge,
            TEST_ORIGIN,
            1,
            None,
        );

        let result = finish_authentication("auth-unknown", &response).await;
        assert!(matches!(result, Err(PasskeyError::UnknownCredential)));
    }

    #[tokio::test]
    #[serial]
    async fn test_origin_failure_wins_over_challenge_failure() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-order-cred", "U1", 5).await;

        let _options = start_authentication("auth-order", None).await.unwrap();
        // Both the origin and the challenge are wrong; the origin check
        // comes first in the verification sequence
        let response = assertion(
            &authenticator,
            &credential_id,
            "bm90LXRoZS1jaGFsbGVuZ2U",
            "https://evil.example",
            6,
            None,
        );

        let result = finish_authentication("auth-order", &response).await;
        assert!(matches!(result, Err(PasskeyError::OriginMismatch(_))));

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_counter_regression_and_repeat_rejected() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-counter-cred", "U1", 5).await;

        for bad_count in [4u32, 5u32] {
            let ceremony = format!("auth-counter-{bad_count}");
            let options = start_authentication(&ceremony, None).await.unwrap();
            let response = assertion(
                &authenticator,
                &credential_id,
                &options.challenge,
                TEST_ORIGIN,
                bad_count,
                None,
            );
            let result = finish_authentication(&ceremony, &response).await;
            assert!(
                matches!(result, Err(PasskeyError::PossibleCloning)),
                "counter {bad_count} against stored 5 must look like cloning"
            );
        }

        // Counter unchanged by the failed attempts; 6 still works
        let options = start_authentication("auth-counter-ok", None).await.unwrap();
        let response = assertion(
            &authenticator,
            &credential_id,
            &options.challenge,
            TEST_ORIGIN,
            6,
            None,
        );
        finish_authentication("auth-counter-ok", &response).await.unwrap();

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_zero_counter_authenticator_stays_accepted() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-zero-cred", "U1", 0).await;

        // A counter-less authenticator reports zero forever
        for round in 0..3 {
            let ceremony = format!("auth-zero-{round}");
            let options = start_authentication(&ceremony, None).await.unwrap();
            let response = assertion(
                &authenticator,
                &credential_id,
                &options.challenge,
                TEST_ORIGIN,
                0,
                None,
            );
            finish_authentication(&ceremony, &response).await.unwrap();
        }

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_zero_stored_counter_can_start_advancing() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-advance-cred", "U1", 0).await;

        let options = start_authentication("auth-advance", None).await.unwrap();
        let response = assertion(
            &authenticator,
            &credential_id,
            &options.challenge,
            TEST_ORIGIN,
            1,
            None,
        );
        finish_authentication("auth-advance", &response).await.unwrap();

        // Once nonzero, zero is no longer acceptable
        let options = start_authentication("auth-advance-2", None).await.unwrap();
        let response = assertion(
            &authenticator,
            &credential_id,
            &options.challenge,
            TEST_ORIGIN,
            0,
            None,
        );
        let result = finish_authentication("auth-advance-2", &response).await;
        assert!(matches!(result, Err(PasskeyError::PossibleCloning)));

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_signature_rejected() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-sig-cred", "U1", 5).await;

        // Signed by a different key
        let imposter = TestAuthenticator::new();
        let options = start_authentication("auth-sig", None).await.unwrap();
        let response = assertion(
            &imposter,
            &credential_id,
            &options.challenge,
            TEST_ORIGIN,
            6,
            None,
        );

        let result = finish_authentication("auth-sig", &response).await;
        assert!(matches!(result, Err(PasskeyError::InvalidSignature)));

        // Counter untouched by the failed attempt
        let stored = PasskeyStore::get_credential(&credential_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.sign_count, 5);

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_user_handle_mismatch_rejected() {
        init_test_environment().await;

        let authenticator = TestAuthenticator::new();
        let credential_id = insert_credential(&authenticator, "auth-handle-cred", "U1", 5).await;

        let options = start_authentication("auth-handle", None).await.unwrap();
        let response = assertion(
            &authenticator,
            &credential_id,
            &options.challenge,
            TEST_ORIGIN,
            6,
            Some("someone-else"),
        );

        let result = finish_authentication("auth-handle", &response).await;
        assert!(matches!(result, Err(PasskeyError::Verification(_))));

        cleanup("U1").await;
    }

    #[tokio::test]
    #[serial]
    async fn test_allow_list_empty_for_unknown_username() {
        init_test_environment().await;

        let options = start_authentication("auth-nobody", Some("no-such-user"))
            .await
            .unwrap();
        assert!(options.allow_credentials.is_empty());
    }
}
