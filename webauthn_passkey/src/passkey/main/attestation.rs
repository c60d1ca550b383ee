use ciborium::value::Value as CborValue;

use crate::utils::base64url_decode;

use super::super::errors::PasskeyError;

/// COSE algorithm identifiers we register and verify.
pub(crate) const COSE_ALG_ES256: i32 = -7;
pub(crate) const COSE_ALG_RS256: i32 = -257;

const COSE_KTY_EC2: i128 = 2;
const COSE_KTY_RSA: i128 = 3;
const COSE_CRV_P256: i128 = 1;

pub(crate) struct AttestationObject {
    pub(crate) fmt: String,
    pub(crate) auth_data: Vec<u8>,
    pub(crate) att_stmt: Vec<(CborValue, CborValue)>,
}

pub(crate) fn parse_attestation_object(
    attestation_b64: &str,
) -> Result<AttestationObject, PasskeyError> {
    let attestation_bytes = base64url_decode(attestation_b64)?;

    let value: CborValue = ciborium::de::from_reader(attestation_bytes.as_slice())
        .map_err(|e| PasskeyError::Attestation(format!("Invalid CBOR: {e}")))?;

    let CborValue::Map(entries) = value else {
        return Err(PasskeyError::Attestation(
            "Attestation object is not a CBOR map".into(),
        ));
    };

    let mut fmt = None;
    let mut auth_data = None;
    let mut att_stmt = None;

    for (key, value) in entries {
        let CborValue::Text(key) = key else { continue };
        match (key.as_str(), value) {
            ("fmt", CborValue::Text(f)) => fmt = Some(f),
            ("authData", CborValue::Bytes(data)) => auth_data = Some(data),
            ("attStmt", CborValue::Map(stmt)) => att_stmt = Some(stmt),
            _ => {}
        }
    }

    match (fmt, auth_data, att_stmt) {
        (Some(fmt), Some(auth_data), Some(att_stmt)) => Ok(AttestationObject {
            fmt,
            auth_data,
            att_stmt,
        }),
        _ => Err(PasskeyError::Attestation(
            "Missing fmt, authData or attStmt".into(),
        )),
    }
}

/// For `"none"` the statement must be empty. Other formats are accepted
/// without chain verification; the key material in authData is what we
/// actually rely on.
pub(crate) fn verify_attestation_statement(
    attestation: &AttestationObject,
) -> Result<(), PasskeyError> {
    match attestation.fmt.as_str() {
        "none" => {
            if attestation.att_stmt.is_empty() {
                Ok(())
            } else {
                Err(PasskeyError::Attestation(
                    "'none' attestation must carry an empty statement".into(),
                ))
            }
        }
        other => {
            tracing::debug!(
                "Accepting '{}' attestation without statement verification",
                other
            );
            Ok(())
        }
    }
}

pub(crate) struct AttestedCredential {
    pub(crate) credential_id: Vec<u8>,
    /// Uncompressed P-256 point for ES256, DER RSAPublicKey for RS256;
    /// either way the bytes ring's verifier consumes directly.
    pub(crate) public_key: Vec<u8>,
    pub(crate) algorithm: i32,
}

/// Walk the attested credential data section of the authenticator data:
/// 16-byte AAGUID, 2-byte credential id length, credential id, COSE key.
pub(crate) fn extract_attested_credential(
    auth_data: &[u8],
) -> Result<AttestedCredential, PasskeyError> {
    // 37-byte header + 16 AAGUID + 2 length
    if auth_data.len() < 55 {
        return Err(PasskeyError::AuthenticatorData(
            "Attested credential data truncated".into(),
        ));
    }

    let cred_id_len = u16::from_be_bytes([auth_data[53], auth_data[54]]) as usize;
    let rest = &auth_data[55..];
    if rest.len() < cred_id_len || cred_id_len == 0 {
        return Err(PasskeyError::AuthenticatorData(
            "Invalid credential id length".into(),
        ));
    }

    let credential_id = rest[..cred_id_len].to_vec();
    let (public_key, algorithm) = extract_public_key(&rest[cred_id_len..])?;

    Ok(AttestedCredential {
        credential_id,
        public_key,
        algorithm,
    })
}

fn cose_entry<'a>(entries: &'a [(CborValue, CborValue)], label: i128) -> Option<&'a CborValue> {
    entries.iter().find_map(|(key, value)| match key {
        CborValue::Integer(i) if i128::from(*i) == label => Some(value),
        _ => None,
    })
}

fn cose_integer(entries: &[(CborValue, CborValue)], label: i128) -> Option<i128> {
    match cose_entry(entries, label) {
        Some(CborValue::Integer(i)) => Some(i128::from(*i)),
        _ => None,
    }
}

fn cose_bytes<'a>(entries: &'a [(CborValue, CborValue)], label: i128) -> Option<&'a [u8]> {
    match cose_entry(entries, label) {
        Some(CborValue::Bytes(bytes)) => Some(bytes.as_slice()),
        _ => None,
    }
}

fn extract_public_key(cose_key_bytes: &[u8]) -> Result<(Vec<u8>, i32), PasskeyError> {
    let value: CborValue = ciborium::de::from_reader(cose_key_bytes)
        .map_err(|e| PasskeyError::Attestation(format!("Invalid COSE key CBOR: {e}")))?;

    let CborValue::Map(entries) = value else {
        return Err(PasskeyError::Attestation("COSE key is not a map".into()));
    };

    let kty = cose_integer(&entries, 1)
        .ok_or_else(|| PasskeyError::Attestation("COSE key missing kty".into()))?;
    let alg = cose_integer(&entries, 3)
        .ok_or_else(|| PasskeyError::Attestation("COSE key missing alg".into()))?;

    match alg {
        a if a == COSE_ALG_ES256 as i128 => {
            if kty != COSE_KTY_EC2 {
                return Err(PasskeyError::Attestation(format!(
                    "ES256 requires EC2 key type, got {kty}"
                )));
            }
            if cose_integer(&entries, -1) != Some(COSE_CRV_P256) {
                return Err(PasskeyError::Attestation("ES256 requires curve P-256".into()));
            }
            let x = cose_bytes(&entries, -2)
                .ok_or_else(|| PasskeyError::Attestation("EC2 key missing x".into()))?;
            let y = cose_bytes(&entries, -3)
                .ok_or_else(|| PasskeyError::Attestation("EC2 key missing y".into()))?;
            if x.len() != 32 || y.len() != 32 {
                return Err(PasskeyError::Attestation(
                    "EC2 coordinates must be 32 bytes".into(),
                ));
            }

            // Uncompressed point: 0x04 || x || y
            let mut point = Vec::with_capacity(65);
            point.push(0x04);
            point.extend_from_slice(x);
            point.extend_from_slice(y);
            Ok((point, COSE_ALG_ES256))
        }
        a if a == COSE_ALG_RS256 as i128 => {
            if kty != COSE_KTY_RSA {
                return Err(PasskeyError::Attestation(format!(
                    "RS256 requires RSA key type, got {kty}"
                )));
            }
            let n = cose_bytes(&entries, -1)
                .ok_or_else(|| PasskeyError::Attestation("RSA key missing modulus".into()))?;
            let e = cose_bytes(&entries, -2)
                .ok_or_else(|| PasskeyError::Attestation("RSA key missing exponent".into()))?;

            Ok((rsa_public_key_der(n, e), COSE_ALG_RS256))
        }
        other => Err(PasskeyError::NotSupported(format!(
            "Unsupported COSE algorithm: {other}"
        ))),
    }
}

/// Minimal DER `RSAPublicKey ::= SEQUENCE { modulus INTEGER, publicExponent
/// INTEGER }`, the encoding ring's RSA verifier expects.
fn rsa_public_key_der(n: &[u8], e: &[u8]) -> Vec<u8> {
    let mut content = der_integer(n);
    content.extend_from_slice(&der_integer(e));

    let mut out = vec![0x30];
    out.extend_from_slice(&der_length(content.len()));
    out.extend_from_slice(&content);
    out
}

fn der_integer(bytes: &[u8]) -> Vec<u8> {
    let mut value: &[u8] = bytes;
    while value.len() > 1 && value[0] == 0 {
        value = &value[1..];
    }

    // A set high bit would flip the sign; pad with a zero byte
    let needs_pad = value.first().is_some_and(|b| b & 0x80 != 0);
    let len = value.len() + usize::from(needs_pad);

    let mut out = vec![0x02];
    out.extend_from_slice(&der_length(len));
    if needs_pad {
        out.push(0x00);
    }
    out.extend_from_slice(value);
    out
}

fn der_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        let mut out = vec![0x80 | (bytes.len() - skip) as u8];
        out.extend_from_slice(&bytes[skip..]);
        out
    }
}
