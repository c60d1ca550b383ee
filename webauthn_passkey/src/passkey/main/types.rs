use ring::digest;
use serde::{Deserialize, Serialize};

use crate::utils::base64url_decode;

use super::super::config::{
    AuthenticatorAttachment, ORIGIN, PASSKEY_RP_ID, PASSKEY_USER_VERIFICATION,
    ResidentKeyRequirement, UserVerificationPolicy,
};
use super::super::errors::PasskeyError;
use super::super::types::PublicKeyCredentialUserEntity;

/// Options returned by the begin half of a registration ceremony,
/// serialized in the shape `navigator.credentials.create()` expects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationOptions {
    pub(crate) challenge: String,
    pub(crate) rp: RelyingParty,
    pub(crate) user: PublicKeyCredentialUserEntity,
    pub(crate) pub_key_cred_params: Vec<PubKeyCredParam>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) exclude_credentials: Vec<CredentialDescriptor>,
    pub(crate) authenticator_selection: AuthenticatorSelection,
    /// Milliseconds.
    pub(crate) timeout: u32,
    pub(crate) attestation: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RelyingParty {
    pub(crate) name: String,
    pub(crate) id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub(crate) type_: String,
    pub(crate) alg: i32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub(crate) type_: String,
    pub(crate) id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) transports: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AuthenticatorSelection {
    #[serde(skip_serializing_if = "AuthenticatorAttachment::is_any")]
    pub(crate) authenticator_attachment: AuthenticatorAttachment,
    pub(crate) resident_key: ResidentKeyRequirement,
    pub(crate) require_resident_key: bool,
    pub(crate) user_verification: UserVerificationPolicy,
}

/// Options returned by the begin half of an authentication ceremony,
/// in the shape `navigator.credentials.get()` expects.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    pub(crate) challenge: String,
    /// Milliseconds.
    pub(crate) timeout: u32,
    pub(crate) rp_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub(crate) allow_credentials: Vec<CredentialDescriptor>,
    pub(crate) user_verification: UserVerificationPolicy,
}

/// Credential returned by `navigator.credentials.create()`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCredential {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AttestationResponse,
    pub transports: Option<Vec<String>>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
}

/// Assertion returned by `navigator.credentials.get()`.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorResponse {
    pub id: String,
    pub raw_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub response: AuthenticatorAssertionResponse,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    pub user_handle: Option<String>,
}

/// Parsed view of the clientDataJSON blob.
pub(crate) struct ParsedClientData {
    pub(crate) challenge: String,
    pub(crate) origin: String,
    pub(crate) type_: String,
    /// Raw decoded bytes; hashed into the signature base during
    /// authentication.
    pub(crate) raw_data: Vec<u8>,
}

impl ParsedClientData {
    pub(crate) fn from_base64(client_data_json: &str) -> Result<Self, PasskeyError> {
        let raw_data = base64url_decode(client_data_json)?;
        let data_str = std::str::from_utf8(&raw_data)
            .map_err(|e| PasskeyError::ClientData(format!("Invalid UTF-8: {e}")))?;
        let data: serde_json::Value = serde_json::from_str(data_str)
            .map_err(|e| PasskeyError::ClientData(format!("Invalid JSON: {e}")))?;

        let challenge = data["challenge"]
            .as_str()
            .ok_or_else(|| PasskeyError::ClientData("Missing challenge".into()))?
            .to_string();
        let origin = data["origin"]
            .as_str()
            .ok_or_else(|| PasskeyError::ClientData("Missing origin".into()))?
            .to_string();
        let type_ = data["type"]
            .as_str()
            .ok_or_else(|| PasskeyError::ClientData("Missing type".into()))?
            .to_string();

        Ok(Self {
            challenge,
            origin,
            type_,
            raw_data,
        })
    }

    pub(crate) fn verify_ceremony_type(&self, expected: &str) -> Result<(), PasskeyError> {
        if self.type_ == expected {
            Ok(())
        } else {
            Err(PasskeyError::ClientData(format!(
                "Expected type '{expected}', got '{}'",
                self.type_
            )))
        }
    }

    /// Exact byte comparison against the configured origin. A trailing
    /// slash or explicit default port is a mismatch.
    pub(crate) fn verify_origin(&self) -> Result<(), PasskeyError> {
        if self.origin == *ORIGIN {
            Ok(())
        } else {
            Err(PasskeyError::OriginMismatch(self.origin.clone()))
        }
    }
}

pub(crate) mod auth_flags {
    pub(crate) const USER_PRESENT: u8 = 1 << 0;
    pub(crate) const USER_VERIFIED: u8 = 1 << 2;
    pub(crate) const ATTESTED_CREDENTIAL_DATA: u8 = 1 << 6;
}

/// Parsed fixed-length header of the authenticator data: 32-byte rpIdHash,
/// one flags byte, 4-byte big-endian signature counter.
pub(crate) struct AuthenticatorData {
    pub(crate) rp_id_hash: Vec<u8>,
    pub(crate) flags: u8,
    pub(crate) sign_count: u32,
    pub(crate) raw_data: Vec<u8>,
}

impl AuthenticatorData {
    pub(crate) fn from_base64(authenticator_data: &str) -> Result<Self, PasskeyError> {
        Self::from_bytes(base64url_decode(authenticator_data)?)
    }

    pub(crate) fn from_bytes(data: Vec<u8>) -> Result<Self, PasskeyError> {
        if data.len() < 37 {
            return Err(PasskeyError::AuthenticatorData(format!(
                "Too short: {} bytes, need at least 37",
                data.len()
            )));
        }

        let counter_bytes: [u8; 4] = data[33..37]
            .try_into()
            .map_err(|_| PasskeyError::AuthenticatorData("Invalid counter bytes".into()))?;

        Ok(Self {
            rp_id_hash: data[..32].to_vec(),
            flags: data[32],
            sign_count: u32::from_be_bytes(counter_bytes),
            raw_data: data,
        })
    }

    pub(crate) fn is_user_present(&self) -> bool {
        self.flags & auth_flags::USER_PRESENT != 0
    }

    pub(crate) fn is_user_verified(&self) -> bool {
        self.flags & auth_flags::USER_VERIFIED != 0
    }

    pub(crate) fn has_attested_credential_data(&self) -> bool {
        self.flags & auth_flags::ATTESTED_CREDENTIAL_DATA != 0
    }

    /// Check rpIdHash against the configured RP ID and enforce the
    /// presence/verification flags per the configured policy.
    pub(crate) fn verify(&self) -> Result<(), PasskeyError> {
        let expected_hash = digest::digest(&digest::SHA256, PASSKEY_RP_ID.as_bytes());
        if self.rp_id_hash != expected_hash.as_ref() {
            return Err(PasskeyError::RpIdMismatch);
        }

        if !self.is_user_present() {
            return Err(PasskeyError::AuthenticatorData(
                "User presence flag not set".into(),
            ));
        }

        if *PASSKEY_USER_VERIFICATION == UserVerificationPolicy::Required
            && !self.is_user_verified()
        {
            return Err(PasskeyError::UserVerificationRequired);
        }

        Ok(())
    }
}
