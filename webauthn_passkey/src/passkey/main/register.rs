use chrono::Utc;

use crate::utils::{base64url_decode, base64url_encode, gen_random_string};

use super::super::config::{
    PASSKEY_ATTESTATION, PASSKEY_AUTHENTICATOR_ATTACHMENT, PASSKEY_RESIDENT_KEY, PASSKEY_RP_ID,
    PASSKEY_RP_NAME, PASSKEY_TIMEOUT, PASSKEY_USER_VERIFICATION,
};
use super::super::errors::PasskeyError;
use super::super::storage::PasskeyStore;
use super::super::types::{
    CredentialSearchField, PasskeyCredential, PublicKeyCredentialUserEntity,
};
use super::attestation::{
    COSE_ALG_ES256, COSE_ALG_RS256, extract_attested_credential, parse_attestation_object,
    verify_attestation_statement,
};
use super::challenge::{self, CeremonyKind};
use super::types::{
    AuthenticatorData, AuthenticatorSelection, CredentialDescriptor, ParsedClientData,
    PubKeyCredParam, RegisterCredential, RegistrationOptions, RelyingParty,
};

use crate::passkey::config::ResidentKeyRequirement;

/// Build creation options for a new passkey owned by `user_id`.
///
/// Existing credentials of the same account become the exclude list so
/// the authenticator refuses to mint a second passkey for it. The
/// challenge is stored under `ceremony_id` until the complete call.
pub(crate) async fn start_registration(
    ceremony_id: &str,
    user_id: &str,
    username: &str,
    displayname: &str,
) -> Result<RegistrationOptions, PasskeyError> {
    let existing =
        PasskeyStore::get_credentials_by(CredentialSearchField::UserId(user_id.to_string()))
            .await?;

    // Keep the user handle stable across re-registrations
    let user_handle = match existing.first() {
        Some(credential) => credential.user.user_handle.clone(),
        None => gen_random_string(16)?,
    };

    let user = PublicKeyCredentialUserEntity {
        user_handle,
        name: username.to_string(),
        display_name: displayname.to_string(),
    };

    let exclude_credentials = existing
        .into_iter()
        .map(|credential| CredentialDescriptor {
            type_: "public-key".to_string(),
            id: credential.credential_id,
            transports: credential.transports,
        })
        .collect();

    let stored = challenge::issue_challenge(
        CeremonyKind::Registration,
        ceremony_id,
        Some(user.clone()),
        Some(user_id.to_string()),
    )
    .await?;

    Ok(RegistrationOptions {
        challenge: stored.challenge,
        rp: RelyingParty {
            name: PASSKEY_RP_NAME.clone(),
            id: PASSKEY_RP_ID.clone(),
        },
        user,
        pub_key_cred_params: vec![
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: COSE_ALG_ES256,
            },
            PubKeyCredParam {
                type_: "public-key".to_string(),
                alg: COSE_ALG_RS256,
            },
        ],
        exclude_credentials,
        authenticator_selection: AuthenticatorSelection {
            authenticator_attachment: *PASSKEY_AUTHENTICATOR_ATTACHMENT,
            resident_key: *PASSKEY_RESIDENT_KEY,
            require_resident_key: *PASSKEY_RESIDENT_KEY == ResidentKeyRequirement::Required,
            user_verification: *PASSKEY_USER_VERIFICATION,
        },
        timeout: *PASSKEY_TIMEOUT * 1000,
        attestation: PASSKEY_ATTESTATION.clone(),
    })
}

/// Verify a `navigator.credentials.create()` response and persist the new
/// credential. Returns the base64url credential ID.
///
/// The stored challenge is taken up front; whatever the outcome, this
/// ceremony cannot be completed a second time.
pub(crate) async fn finish_registration(
    ceremony_id: &str,
    reg_data: &RegisterCredential,
) -> Result<String, PasskeyError> {
    let taken = challenge::take_challenge(CeremonyKind::Registration, ceremony_id).await?;

    let client_data = ParsedClientData::from_base64(&reg_data.response.client_data_json)?;
    client_data.verify_ceremony_type("webauthn.create")?;
    client_data.verify_origin()?;
    let stored = challenge::verify_taken_challenge(&client_data.challenge, taken)?;

    let attestation = parse_attestation_object(&reg_data.response.attestation_object)?;
    verify_attestation_statement(&attestation)?;

    let auth_data = AuthenticatorData::from_bytes(attestation.auth_data.clone())?;
    auth_data.verify()?;
    if !auth_data.has_attested_credential_data() {
        return Err(PasskeyError::AuthenticatorData(
            "Attested credential data flag not set".into(),
        ));
    }

    let attested = extract_attested_credential(&attestation.auth_data)?;

    let raw_id = base64url_decode(&reg_data.raw_id)?;
    if raw_id.is_empty() {
        return Err(PasskeyError::Format("Empty credential id".into()));
    }
    if raw_id != attested.credential_id {
        return Err(PasskeyError::Format(
            "Credential id does not match attested data".into(),
        ));
    }

    let user = stored
        .user
        .ok_or_else(|| PasskeyError::Format("Stored challenge carries no user".into()))?;
    let user_id = stored
        .user_id
        .ok_or_else(|| PasskeyError::Format("Stored challenge carries no user id".into()))?;

    let credential = PasskeyCredential {
        credential_id: reg_data.raw_id.clone(),
        user_id: user_id.clone(),
        public_key: base64url_encode(attested.public_key)?,
        algorithm: attested.algorithm,
        sign_count: auth_data.sign_count,
        transports: reg_data.transports.clone().unwrap_or_default(),
        user,
        created_at: Utc::now(),
        last_used_at: Utc::now(),
    };

    PasskeyStore::store_credential(credential).await?;

    tracing::info!(
        "Registered credential {} for user {}",
        reg_data.raw_id,
        user_id
    );
    Ok(reg_data.raw_id.clone())
}
