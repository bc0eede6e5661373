//! Device public key decoding: COSE_Key, SubjectPublicKeyInfo and raw SEC1.
use alloy_primitives::B256;
use ciborium::value::Value;
use p256::{PublicKey, elliptic_curve::sec1::ToEncodedPoint, pkcs8::DecodePublicKey};
use smart_account_core::PasskeyKey;

use crate::curve;

const COSE_KTY: i64 = 1;
const COSE_ALG: i64 = 3;
const COSE_CRV: i64 = -1;
const COSE_X: i64 = -2;
const COSE_Y: i64 = -3;

const KTY_EC2: i64 = 2;
const ALG_ES256: i64 = -7;
const CRV_P256: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyParseError {
    #[error("empty public key")]
    Empty,
    #[error("malformed CBOR: {0}")]
    Cbor(String),
    #[error("COSE key is not a map")]
    NotAMap,
    #[error("COSE label {0} has the wrong type")]
    WrongType(i64),
    #[error("COSE key is missing label {0}")]
    MissingLabel(i64),
    #[error("unsupported COSE parameter {label} = {value}")]
    Unsupported { label: i64, value: i64 },
    #[error("invalid SubjectPublicKeyInfo")]
    InvalidSpki,
    #[error("point is not on P-256")]
    NotOnCurve,
}

/// Detects the encoding and parses a P-256 public key.
pub fn parse_public_key(raw: &[u8]) -> Result<PasskeyKey, KeyParseError> {
    match raw.first() {
        None => Err(KeyParseError::Empty),
        Some(0x04) if raw.len() == 65 => parse_raw(raw),
        Some(0x30) => parse_spki(raw),
        Some(_) => parse_cose(raw),
    }
}

/// Uncompressed SEC1 point, `0x04 ‖ x ‖ y`.
pub fn parse_raw(raw: &[u8]) -> Result<PasskeyKey, KeyParseError> {
    if raw.len() != 65 || raw[0] != 0x04 {
        return Err(KeyParseError::NotOnCurve);
    }
    checked_key(&raw[1..33], &raw[33..])
}

pub fn parse_spki(der: &[u8]) -> Result<PasskeyKey, KeyParseError> {
    let key = PublicKey::from_public_key_der(der).map_err(|_| KeyParseError::InvalidSpki)?;
    let point = key.to_encoded_point(false);
    match (point.x(), point.y()) {
        (Some(x), Some(y)) => checked_key(x, y),
        _ => Err(KeyParseError::InvalidSpki),
    }
}

pub fn parse_cose(raw: &[u8]) -> Result<PasskeyKey, KeyParseError> {
    let value: Value =
        ciborium::de::from_reader(raw).map_err(|err| KeyParseError::Cbor(err.to_string()))?;
    let Value::Map(entries) = untagged(value) else {
        return Err(KeyParseError::NotAMap);
    };

    let (mut x, mut y) = (None, None);
    for (label, value) in entries {
        // labels other than small integers carry nothing we read
        let Some(label) = label.as_integer().and_then(|l| i64::try_from(l).ok()) else {
            continue;
        };
        match label {
            COSE_X => x = Some(byte_string(label, value)?),
            COSE_Y => y = Some(byte_string(label, value)?),
            COSE_KTY | COSE_ALG | COSE_CRV => {
                let value = value
                    .as_integer()
                    .and_then(|v| i64::try_from(v).ok())
                    .ok_or(KeyParseError::WrongType(label))?;
                let expected = match label {
                    COSE_KTY => KTY_EC2,
                    COSE_ALG => ALG_ES256,
                    _ => CRV_P256,
                };
                if value != expected {
                    return Err(KeyParseError::Unsupported { label, value });
                }
            }
            _ => {}
        }
    }

    let x = x.ok_or(KeyParseError::MissingLabel(COSE_X))?;
    let y = y.ok_or(KeyParseError::MissingLabel(COSE_Y))?;
    if x.len() != 32 || y.len() != 32 {
        return Err(KeyParseError::NotOnCurve);
    }
    checked_key(&x, &y)
}

fn untagged(mut value: Value) -> Value {
    loop {
        match value {
            Value::Tag(_, inner) => value = *inner,
            other => return other,
        }
    }
}

fn byte_string(label: i64, value: Value) -> Result<Vec<u8>, KeyParseError> {
    match value {
        Value::Bytes(bytes) => Ok(bytes),
        _ => Err(KeyParseError::WrongType(label)),
    }
}

fn checked_key(x: &[u8], y: &[u8]) -> Result<PasskeyKey, KeyParseError> {
    let key = PasskeyKey::new(B256::from_slice(x), B256::from_slice(y));
    let on_curve = curve::is_on_curve(
        alloy_primitives::U256::from_be_bytes(key.x.0),
        alloy_primitives::U256::from_be_bytes(key.y.0),
    );
    if on_curve { Ok(key) } else { Err(KeyParseError::NotOnCurve) }
}

/// Encodes a key as an ES256 COSE_Key map.
pub fn encode_cose(key: &PasskeyKey) -> Vec<u8> {
    let mut out = Vec::with_capacity(77);
    // {1: 2, 3: -7, -1: 1, -2: x, -3: y}
    out.extend_from_slice(&[0xa5, 0x01, 0x02, 0x03, 0x26, 0x20, 0x01]);
    out.extend_from_slice(&[0x21, 0x58, 0x20]);
    out.extend_from_slice(key.x.as_slice());
    out.extend_from_slice(&[0x22, 0x58, 0x20]);
    out.extend_from_slice(key.y.as_slice());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{GX, GY};

    fn generator() -> PasskeyKey {
        PasskeyKey::new(B256::from(GX.to_be_bytes::<32>()), B256::from(GY.to_be_bytes::<32>()))
    }

    #[test]
    fn should_parse_cose_key() {
        let key = generator();
        assert_eq!(parse_public_key(&encode_cose(&key)), Ok(key));
    }

    #[test]
    fn should_skip_tags_and_unknown_labels() {
        let key = generator();
        let mut cose = vec![0xd8, 0x18]; // tag(24)
        cose.push(0xa6);
        cose.extend_from_slice(&encode_cose(&key)[1..]);
        // -4: "kid"
        cose.extend_from_slice(&[0x23, 0x63, b'k', b'i', b'd']);
        assert_eq!(parse_cose(&cose), Ok(key));
    }

    #[test]
    fn should_reject_wrong_algorithm() {
        let mut cose = encode_cose(&generator());
        cose[4] = 0x27; // alg = -8
        assert_eq!(
            parse_cose(&cose),
            Err(KeyParseError::Unsupported { label: COSE_ALG, value: -8 })
        );
    }

    #[test]
    fn should_parse_raw_point() {
        let key = generator();
        let mut raw = vec![0x04];
        raw.extend_from_slice(&key.to_bytes());
        assert_eq!(parse_public_key(&raw), Ok(key));

        raw[64] ^= 1;
        assert_eq!(parse_public_key(&raw), Err(KeyParseError::NotOnCurve));
    }

    #[test]
    fn should_reject_deeply_nested_cbor() {
        // {0: [[[...]]]}
        let mut cose = vec![0xa1, 0x00];
        cose.resize(2 + 100_000, 0x81);
        cose.push(0x00);
        assert!(matches!(parse_cose(&cose), Err(KeyParseError::Cbor(_))));
        assert!(matches!(parse_public_key(&cose), Err(KeyParseError::Cbor(_))));
    }

    #[test]
    fn should_reject_non_map_and_mistyped_labels() {
        assert_eq!(parse_cose(&[0x80]), Err(KeyParseError::NotAMap));

        let mut cose = encode_cose(&generator());
        cose[2] = 0x60; // kty as an empty text string
        assert_eq!(parse_cose(&cose), Err(KeyParseError::WrongType(COSE_KTY)));
    }

    #[test]
    fn should_reject_truncated_cbor() {
        let cose = encode_cose(&generator());
        assert!(matches!(
            parse_cose(&cose[..40]),
            Err(KeyParseError::Cbor(_))
        ));
    }
}
