//! Fixtures for ceremony tests: CBOR attestation objects, authenticator
//! data buffers and a signing ES256 authenticator backed by ring.

use chrono::Utc;
use ciborium::value::{Integer, Value as CborValue};
use ring::digest;
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair};

use crate::passkey::storage::PasskeyStore;
use crate::passkey::types::{PasskeyCredential, PublicKeyCredentialUserEntity};
use crate::utils::{base64url_decode, base64url_encode};

use super::types::auth_flags;

pub(crate) fn registered_flags() -> u8 {
    auth_flags::USER_PRESENT | auth_flags::USER_VERIFIED | auth_flags::ATTESTED_CREDENTIAL_DATA
}

pub(crate) fn client_data_b64(ceremony_type: &str, challenge: &str, origin: &str) -> String {
    let json = serde_json::json!({
        "type": ceremony_type,
        "challenge": challenge,
        "origin": origin,
    });
    base64url_encode(json.to_string().into_bytes()).unwrap()
}

fn auth_data_header(rp_id: &str, flags: u8, sign_count: u32) -> Vec<u8> {
    let mut out = digest::digest(&digest::SHA256, rp_id.as_bytes())
        .as_ref()
        .to_vec();
    out.push(flags);
    out.extend_from_slice(&sign_count.to_be_bytes());
    out
}

/// Plain assertion authenticator data: header only, UP and UV set.
pub(crate) fn assertion_auth_data(rp_id: &str, sign_count: u32) -> Vec<u8> {
    auth_data_header(
        rp_id,
        auth_flags::USER_PRESENT | auth_flags::USER_VERIFIED,
        sign_count,
    )
}

/// Authenticator data with an attested credential data section appended:
/// zero AAGUID, the given credential id and COSE key.
pub(crate) fn attested_auth_data(
    rp_id: &str,
    flags: u8,
    sign_count: u32,
    credential_id: &[u8],
    cose_key: &CborValue,
) -> Vec<u8> {
    let mut out = auth_data_header(rp_id, flags, sign_count);
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
    out.extend_from_slice(credential_id);
    ciborium::ser::into_writer(cose_key, &mut out).unwrap();
    out
}

pub(crate) fn ec2_cose_key(x: &[u8], y: &[u8]) -> CborValue {
    CborValue::Map(vec![
        (CborValue::Integer(Integer::from(1)), CborValue::Integer(Integer::from(2))),
        (CborValue::Integer(Integer::from(3)), CborValue::Integer(Integer::from(-7))),
        (CborValue::Integer(Integer::from(-1)), CborValue::Integer(Integer::from(1))),
        (CborValue::Integer(Integer::from(-2)), CborValue::Bytes(x.to_vec())),
        (CborValue::Integer(Integer::from(-3)), CborValue::Bytes(y.to_vec())),
    ])
}

/// base64url CBOR attestation object with an empty statement.
pub(crate) fn attestation_object(fmt: &str, auth_data: &[u8]) -> String {
    let map = CborValue::Map(vec![
        (CborValue::Text("fmt".into()), CborValue::Text(fmt.into())),
        (CborValue::Text("attStmt".into()), CborValue::Map(vec![])),
        (
            CborValue::Text("authData".into()),
            CborValue::Bytes(auth_data.to_vec()),
        ),
    ]);
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&map, &mut bytes).unwrap();
    base64url_encode(bytes).unwrap()
}

/// An ES256 keypair playing the role of a platform authenticator.
pub(crate) struct TestAuthenticator {
    key_pair: EcdsaKeyPair,
    /// Uncompressed P-256 point, 65 bytes.
    pub(crate) public_point: Vec<u8>,
}

impl TestAuthenticator {
    pub(crate) fn new() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng).unwrap();
        let key_pair =
            EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8.as_ref(), &rng)
                .unwrap();
        let public_point = key_pair.public_key().as_ref().to_vec();
        Self {
            key_pair,
            public_point,
        }
    }

    pub(crate) fn cose_key(&self) -> CborValue {
        ec2_cose_key(&self.public_point[1..33], &self.public_point[33..65])
    }

    /// Sign `authenticator_data || sha256(client_data_json)` and return the
    /// base64url DER signature.
    pub(crate) fn sign_assertion(&self, auth_data: &[u8], client_data_b64: &str) -> String {
        let client_data_raw = base64url_decode(client_data_b64).unwrap();
        let client_data_hash = digest::digest(&digest::SHA256, &client_data_raw);

        let mut message = auth_data.to_vec();
        message.extend_from_slice(client_data_hash.as_ref());

        let signature = self
            .key_pair
            .sign(&SystemRandom::new(), &message)
            .unwrap();
        base64url_encode(signature.as_ref().to_vec()).unwrap()
    }
}

/// Insert a credential for this authenticator straight into the store,
/// bypassing the registration ceremony. Returns the credential id.
pub(crate) async fn insert_credential(
    authenticator: &TestAuthenticator,
    id_label: &str,
    user_id: &str,
    sign_count: u32,
) -> String {
    let credential_id = base64url_encode(id_label.as_bytes().to_vec()).unwrap();
    let credential = PasskeyCredential {
        credential_id: credential_id.clone(),
        user_id: user_id.to_string(),
        public_key: base64url_encode(authenticator.public_point.clone()).unwrap(),
        algorithm: -7,
        sign_count,
        transports: vec!["internal".to_string()],
        user: PublicKeyCredentialUserEntity {
            user_handle: format!("handle-{user_id}"),
            name: format!("name-{user_id}"),
            display_name: format!("Display {user_id}"),
        },
        created_at: Utc::now(),
        last_used_at: Utc::now(),
    };
    PasskeyStore::store_credential(credential).await.unwrap();
    credential_id
}
