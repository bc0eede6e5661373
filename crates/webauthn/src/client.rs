//! Client-side assertion construction from raw authenticator output.
use alloy_primitives::{Bytes, U256};
use alloy_sol_types::SolValue;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use p256::ecdsa::Signature;

use crate::{
    assertion::{AUTH_DATA_MIN_LEN, WebAuthnAuth},
    curve::normalize_s,
};

const CHALLENGE_KEY: &str = r#""challenge":""#;
const TYPE_KEY: &str = r#""type":""#;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureParseError {
    #[error("invalid DER signature")]
    InvalidDer,
    #[error("signature scalar out of range")]
    ScalarOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WebAuthnError {
    #[error("authenticator data must be at least 37 bytes, got {0}")]
    AuthenticatorDataTooShort(usize),
    #[error("client data JSON has no challenge field")]
    MissingChallenge,
    #[error("client data JSON has no type field")]
    MissingType,
    #[error(transparent)]
    Signature(#[from] SignatureParseError),
}

/// Parses a DER-encoded ECDSA signature into `(r, s)`.
pub fn parse_der_signature(der: &[u8]) -> Result<(U256, U256), SignatureParseError> {
    let signature = Signature::from_der(der).map_err(|_| SignatureParseError::InvalidDer)?;
    let (r, s) = signature.split_bytes();
    Ok((U256::from_be_slice(&r), U256::from_be_slice(&s)))
}

pub fn encode_der_signature(r: U256, s: U256) -> Result<Vec<u8>, SignatureParseError> {
    let signature = Signature::from_scalars(r.to_be_bytes::<32>(), s.to_be_bytes::<32>())
        .map_err(|_| SignatureParseError::ScalarOutOfRange)?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Base64url without padding, the encoding browsers use for the challenge.
pub fn encode_challenge(challenge: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(challenge)
}

/// Minimal `clientDataJSON` for a `webauthn.get` ceremony.
pub fn client_data_json(challenge: &[u8], origin: &str) -> String {
    format!(
        r#"{{"type":"webauthn.get","challenge":"{}","origin":"{}","crossOrigin":false}}"#,
        encode_challenge(challenge),
        origin
    )
}

/// Builds the assertion the account verifies, locating the challenge and type
/// offsets and normalizing `s`.
pub fn build_assertion(
    authenticator_data: &[u8],
    client_data_json: &str,
    der_signature: &[u8],
) -> Result<WebAuthnAuth, WebAuthnError> {
    if authenticator_data.len() < AUTH_DATA_MIN_LEN {
        return Err(WebAuthnError::AuthenticatorDataTooShort(
            authenticator_data.len(),
        ));
    }
    let challenge_index = client_data_json
        .find(CHALLENGE_KEY)
        .ok_or(WebAuthnError::MissingChallenge)?;
    let type_index = client_data_json
        .find(TYPE_KEY)
        .ok_or(WebAuthnError::MissingType)?;
    let (r, s) = parse_der_signature(der_signature)?;

    Ok(WebAuthnAuth {
        authenticatorData: Bytes::copy_from_slice(authenticator_data),
        clientDataJSON: client_data_json.to_owned(),
        challengeIndex: U256::from(challenge_index),
        typeIndex: U256::from(type_index),
        r,
        s: normalize_s(s),
    })
}

/// ABI encoding carried as the signature envelope payload.
pub fn encode_assertion(auth: &WebAuthnAuth) -> Bytes {
    Bytes::from(auth.abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{HALF_N, N};
    use rand::{RngCore, rngs::OsRng};

    #[test]
    fn der_round_trip() {
        let r = U256::from(0x1234_5678_u64);
        let s = HALF_N - U256::from(99);
        let der = encode_der_signature(r, s).unwrap();
        assert_eq!(der[0], 0x30);
        assert_eq!(parse_der_signature(&der).unwrap(), (r, s));
    }

    fn random_scalar() -> U256 {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        U256::from_be_bytes(bytes).reduce_mod(N).max(U256::from(1))
    }

    #[test]
    fn der_round_trip_random_scalars() {
        let high = N - U256::from(1);
        let mut cases = vec![(high, high), (U256::from(1), high), (high, U256::from(1))];
        cases.extend((0..64).map(|_| (random_scalar(), random_scalar())));

        for (r, s) in cases {
            let der = encode_der_signature(r, s).unwrap();
            assert_eq!(parse_der_signature(&der).unwrap(), (r, s));
        }
        // high bit set, so the integer takes a leading zero byte
        let der = encode_der_signature(high, high).unwrap();
        assert_eq!(&der[2..5], &[0x02, 0x21, 0x00]);
    }

    #[test]
    fn should_reject_out_of_range_scalars() {
        assert_eq!(
            encode_der_signature(U256::ZERO, U256::from(1)),
            Err(SignatureParseError::ScalarOutOfRange)
        );
        assert_eq!(
            encode_der_signature(U256::from(1), N),
            Err(SignatureParseError::ScalarOutOfRange)
        );
        assert_eq!(
            parse_der_signature(&[0x30, 0x00]),
            Err(SignatureParseError::InvalidDer)
        );
    }

    #[test]
    fn should_locate_offsets() {
        let json = client_data_json(b"hello", "https://example.com");
        let der = encode_der_signature(U256::from(7), N - U256::from(3)).unwrap();
        let auth = build_assertion(&[0u8; 37], &json, &der).unwrap();

        assert_eq!(auth.typeIndex, U256::from(1));
        let challenge_index = usize::try_from(auth.challengeIndex).unwrap();
        assert!(json[challenge_index..].starts_with(r#""challenge":"aGVsbG8""#));
        assert_eq!(auth.s, U256::from(3));
    }

    #[test]
    fn should_require_fields() {
        let der = encode_der_signature(U256::from(7), U256::from(3)).unwrap();
        assert_eq!(
            build_assertion(&[0u8; 36], "{}", &der),
            Err(WebAuthnError::AuthenticatorDataTooShort(36))
        );
        assert_eq!(
            build_assertion(&[0u8; 37], r#"{"type":"webauthn.get"}"#, &der),
            Err(WebAuthnError::MissingChallenge)
        );
    }
}
