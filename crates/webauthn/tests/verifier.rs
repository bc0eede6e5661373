use alloy_primitives::{B256, U256};
use p256::{
    ecdsa::{Signature, SigningKey, VerifyingKey, signature::hazmat::PrehashSigner},
    elliptic_curve::sec1::ToEncodedPoint,
    pkcs8::EncodePublicKey,
};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use smart_account_core::PasskeyKey;
use smart_account_webauthn::{
    NativeP256, P256Backends, P256Verifier, SoftwareP256, WebAuthnAuth, WebAuthnPolicy,
    WebAuthnVerifier, assertion::signing_digest, build_assertion, client::client_data_json,
    curve::{HALF_N, N},
    encode_assertion, normalize_s, parse_public_key,
};

const RP_ID: &str = "wallet.example";

struct Passkey {
    signing_key: SigningKey,
    key: PasskeyKey,
}

impl Passkey {
    fn random() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let point = VerifyingKey::from(&signing_key).to_encoded_point(false);
        let key = PasskeyKey::new(
            B256::from_slice(point.x().unwrap()),
            B256::from_slice(point.y().unwrap()),
        );
        Self { signing_key, key }
    }

    fn sign_digest(&self, digest: B256) -> (U256, U256) {
        let signature: Signature = self.signing_key.sign_prehash(digest.as_slice()).unwrap();
        let (r, s) = signature.split_bytes();
        (U256::from_be_slice(&r), U256::from_be_slice(&s))
    }

    fn assert(&self, challenge: &[u8], flags: u8) -> WebAuthnAuth {
        let auth_data = authenticator_data(flags);
        let json = client_data_json(challenge, "https://wallet.example");
        let digest = signing_digest(&auth_data, json.as_bytes());
        let signature: Signature = self.signing_key.sign_prehash(digest.as_slice()).unwrap();
        build_assertion(&auth_data, &json, signature.to_der().as_bytes()).unwrap()
    }
}

fn authenticator_data(flags: u8) -> Vec<u8> {
    let mut data = Sha256::digest(RP_ID.as_bytes()).to_vec();
    data.push(flags);
    data.extend_from_slice(&1u32.to_be_bytes());
    data
}

fn verifiers() -> [WebAuthnVerifier; 2] {
    [
        WebAuthnVerifier::new(P256Backends::default(), WebAuthnPolicy::default()),
        WebAuthnVerifier::new(P256Backends::software_only(), WebAuthnPolicy::default()),
    ]
}

#[test]
fn test_valid_assertion_is_accepted() {
    let passkey = Passkey::random();
    let challenge = [0x42u8; 32];
    let auth = passkey.assert(&challenge, 0x05);

    for verifier in verifiers() {
        assert!(verifier.verify(&challenge, &auth, &passkey.key));
        assert!(verifier.verify_encoded(&challenge, &encode_assertion(&auth), &passkey.key));
    }
}

#[test]
fn test_high_s_assertion_is_normalized() {
    let passkey = Passkey::random();
    let challenge = [0x17u8; 32];
    let mut auth = passkey.assert(&challenge, 0x05);
    auth.s = N - auth.s;

    for verifier in verifiers() {
        assert!(verifier.verify(&challenge, &auth, &passkey.key));
    }
}

#[test]
fn test_wrong_challenge_is_rejected() {
    let passkey = Passkey::random();
    let auth = passkey.assert(&[1u8; 32], 0x05);

    for verifier in verifiers() {
        assert!(!verifier.verify(&[2u8; 32], &auth, &passkey.key));
    }
}

#[test]
fn test_wrong_key_is_rejected() {
    let passkey = Passkey::random();
    let other = Passkey::random();
    let challenge = [3u8; 32];
    let auth = passkey.assert(&challenge, 0x05);

    for verifier in verifiers() {
        assert!(!verifier.verify(&challenge, &auth, &other.key));
    }
}

#[test]
fn test_flags_are_enforced() {
    let passkey = Passkey::random();
    let challenge = [4u8; 32];
    let verifier = WebAuthnVerifier::default();

    // user present only
    assert!(!verifier.verify(&challenge, &passkey.assert(&challenge, 0x01), &passkey.key));
    // user verified only
    assert!(!verifier.verify(&challenge, &passkey.assert(&challenge, 0x04), &passkey.key));
    // backup state without eligibility
    assert!(!verifier.verify(&challenge, &passkey.assert(&challenge, 0x15), &passkey.key));
    // backed up, eligible
    assert!(verifier.verify(&challenge, &passkey.assert(&challenge, 0x1d), &passkey.key));
}

#[test]
fn test_short_authenticator_data_is_rejected() {
    let passkey = Passkey::random();
    let challenge = [5u8; 32];
    let mut auth = passkey.assert(&challenge, 0x05);
    auth.authenticatorData = auth.authenticatorData.slice(..36);
    assert!(!WebAuthnVerifier::default().verify(&challenge, &auth, &passkey.key));
}

#[test]
fn test_type_offset_must_point_at_get_ceremony() {
    let passkey = Passkey::random();
    let challenge = [6u8; 32];
    let mut auth = passkey.assert(&challenge, 0x05);
    auth.typeIndex += U256::from(1);
    assert!(!WebAuthnVerifier::default().verify(&challenge, &auth, &passkey.key));

    auth.typeIndex = U256::MAX;
    assert!(!WebAuthnVerifier::default().verify(&challenge, &auth, &passkey.key));
}

#[test]
fn test_relying_party_binding() {
    let passkey = Passkey::random();
    let challenge = [7u8; 32];
    let auth = passkey.assert(&challenge, 0x05);

    let bound = WebAuthnVerifier::new(P256Backends::default(), WebAuthnPolicy::for_rp_id(RP_ID));
    assert!(bound.verify(&challenge, &auth, &passkey.key));

    let other = WebAuthnVerifier::new(
        P256Backends::default(),
        WebAuthnPolicy::for_rp_id("evil.example"),
    );
    assert!(!other.verify(&challenge, &auth, &passkey.key));
}

#[test]
fn test_malformed_encoding_is_rejected() {
    let passkey = Passkey::random();
    assert!(!WebAuthnVerifier::default().verify_encoded(&[0u8; 32], &[0xde, 0xad], &passkey.key));
}

#[test]
fn test_backends_agree_on_random_signatures() {
    let native = NativeP256;
    let software = SoftwareP256;

    for _ in 0..8 {
        let passkey = Passkey::random();
        let mut digest = B256::ZERO;
        OsRng.fill_bytes(digest.as_mut_slice());
        let (r, s) = passkey.sign_digest(digest);

        assert!(native.verify(digest, r, s, &passkey.key));
        assert!(software.verify(digest, r, s, &passkey.key));

        let mut tampered = digest;
        tampered.0[0] ^= 0x80;
        assert_eq!(
            native.verify(tampered, r, s, &passkey.key),
            software.verify(tampered, r, s, &passkey.key)
        );
        assert!(!software.verify(tampered, r, s, &passkey.key));

        let bumped = r.add_mod(U256::from(1), N);
        assert_eq!(
            native.verify(digest, bumped, s, &passkey.key),
            software.verify(digest, bumped, s, &passkey.key)
        );
    }
}

#[test]
fn test_backends_agree_on_out_of_range_inputs() {
    let passkey = Passkey::random();
    let digest = B256::repeat_byte(0x33);
    let (r, s) = passkey.sign_digest(digest);
    let off_curve = PasskeyKey::new(passkey.key.x, B256::repeat_byte(0x01));

    let cases = [
        (U256::ZERO, s, passkey.key),
        (r, U256::ZERO, passkey.key),
        (N, s, passkey.key),
        (r, U256::MAX, passkey.key),
        (r, s, off_curve),
        (r, s, PasskeyKey::new(B256::repeat_byte(0xff), passkey.key.y)),
    ];
    for (r, s, key) in cases {
        assert!(!NativeP256.verify(digest, r, s, &key));
        assert!(!SoftwareP256.verify(digest, r, s, &key));
    }
}

#[test]
fn test_normalize_s_is_low_and_idempotent() {
    for _ in 0..64 {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        let s = U256::from_be_bytes(bytes);
        let normalized = normalize_s(s);
        assert!(normalized <= HALF_N);
        assert_eq!(normalize_s(normalized), normalized);
    }
    for s in [N, N + U256::from(1), U256::MAX] {
        let normalized = normalize_s(s);
        assert!(normalized <= HALF_N);
        assert_eq!(normalize_s(normalized), normalized);
    }
}

#[test]
fn test_unreduced_s_is_rejected() {
    let passkey = Passkey::random();
    let challenge = [0x18u8; 32];
    let mut auth = passkey.assert(&challenge, 0x05);

    for s in [N, N + U256::from(1), U256::MAX] {
        auth.s = s;
        for verifier in verifiers() {
            assert!(!verifier.verify(&challenge, &auth, &passkey.key));
        }
    }
}

#[test]
fn test_policy_reads_camel_case_json() {
    let policy: WebAuthnPolicy =
        serde_json::from_str(&serde_json::to_string(&WebAuthnPolicy::for_rp_id(RP_ID)).unwrap())
            .unwrap();
    assert_eq!(policy, WebAuthnPolicy::for_rp_id(RP_ID));

    let empty: WebAuthnPolicy = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, WebAuthnPolicy::default());
    assert!(serde_json::to_string(&policy).unwrap().contains("rpIdHash"));
}

#[test]
fn test_spki_and_raw_keys_match() {
    let passkey = Passkey::random();
    let verifying_key = VerifyingKey::from(&passkey.signing_key);
    let spki = verifying_key.to_public_key_der().unwrap();
    assert_eq!(parse_public_key(spki.as_bytes()).unwrap(), passkey.key);

    let raw = verifying_key.to_encoded_point(false);
    assert_eq!(parse_public_key(raw.as_bytes()).unwrap(), passkey.key);
}
