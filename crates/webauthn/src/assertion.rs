//! On-path WebAuthn assertion verification.
use alloy_primitives::{B256, U256};
use alloy_sol_types::{SolValue, sol};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use smart_account_core::PasskeyKey;
use tracing::debug;

use crate::{
    backend::P256Backends,
    curve::{is_valid_scalar, normalize_s},
};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct WebAuthnAuth {
        bytes authenticatorData;
        string clientDataJSON;
        uint256 challengeIndex;
        uint256 typeIndex;
        uint256 r;
        uint256 s;
    }
}

/// Authenticator data is `rpIdHash(32) ‖ flags(1) ‖ signCount(4) ‖ ...`.
pub const AUTH_DATA_MIN_LEN: usize = 37;

pub const FLAG_USER_PRESENT: u8 = 0x01;
pub const FLAG_USER_VERIFIED: u8 = 0x04;
pub const FLAG_BACKUP_ELIGIBLE: u8 = 0x08;
pub const FLAG_BACKUP_STATE: u8 = 0x10;

pub const EXPECTED_TYPE: &str = r#""type":"webauthn.get""#;

/// Read-only view over authenticator data.
#[derive(Debug, Clone, Copy)]
pub struct AuthDataParser<'a> {
    data: &'a [u8],
}

impl<'a> AuthDataParser<'a> {
    pub const fn new(data: &'a [u8]) -> Option<Self> {
        if data.len() < AUTH_DATA_MIN_LEN {
            None
        } else {
            Some(Self { data })
        }
    }

    pub fn rp_id_hash(&self) -> &'a [u8] {
        &self.data[..32]
    }

    pub const fn flags(&self) -> u8 {
        self.data[32]
    }

    pub const fn is_user_present(&self) -> bool {
        self.flags() & FLAG_USER_PRESENT != 0
    }

    pub const fn is_user_verified(&self) -> bool {
        self.flags() & FLAG_USER_VERIFIED != 0
    }

    /// Backup state may only be set on backup-eligible credentials.
    pub const fn has_consistent_backup_flags(&self) -> bool {
        self.flags() & FLAG_BACKUP_ELIGIBLE != 0 || self.flags() & FLAG_BACKUP_STATE == 0
    }

    pub const fn sign_count(&self) -> u32 {
        u32::from_be_bytes([self.data[33], self.data[34], self.data[35], self.data[36]])
    }
}

/// Relying-party constraints applied on top of the signature check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebAuthnPolicy {
    /// SHA-256 of the relying-party identifier.
    pub rp_id_hash: Option<B256>,
}

impl WebAuthnPolicy {
    pub fn for_rp_id(rp_id: &str) -> Self {
        Self {
            rp_id_hash: Some(B256::from_slice(&Sha256::digest(rp_id.as_bytes()))),
        }
    }
}

/// `"challenge":"<base64url(challenge)>"`
pub fn expected_challenge(challenge: &[u8]) -> String {
    format!(r#""challenge":"{}""#, URL_SAFE_NO_PAD.encode(challenge))
}

/// `SHA256(authenticatorData ‖ SHA256(clientDataJSON))`
pub fn signing_digest(authenticator_data: &[u8], client_data_json: &[u8]) -> B256 {
    let client_data_hash = Sha256::digest(client_data_json);
    let mut hasher = Sha256::new();
    hasher.update(authenticator_data);
    hasher.update(client_data_hash);
    B256::from_slice(&hasher.finalize())
}

fn has_substring_at(haystack: &str, index: U256, needle: &str) -> bool {
    usize::try_from(index)
        .ok()
        .and_then(|i| haystack.as_bytes().get(i..))
        .is_some_and(|tail| tail.starts_with(needle.as_bytes()))
}

/// Verifies passkey assertions for a fixed backend set and policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebAuthnVerifier {
    backends: P256Backends,
    policy: WebAuthnPolicy,
}

impl WebAuthnVerifier {
    pub const fn new(backends: P256Backends, policy: WebAuthnPolicy) -> Self {
        Self { backends, policy }
    }

    pub const fn backends(&self) -> &P256Backends {
        &self.backends
    }

    pub const fn policy(&self) -> &WebAuthnPolicy {
        &self.policy
    }

    /// Decodes an ABI-encoded assertion and verifies it.
    pub fn verify_encoded(&self, challenge: &[u8], encoded: &[u8], key: &PasskeyKey) -> bool {
        match <WebAuthnAuth as SolValue>::abi_decode(encoded) {
            Ok(auth) => self.verify(challenge, &auth, key),
            Err(err) => {
                debug!(error = %err, "malformed webauthn assertion");
                false
            }
        }
    }

    pub fn verify(&self, challenge: &[u8], auth: &WebAuthnAuth, key: &PasskeyKey) -> bool {
        let Some(auth_data) = AuthDataParser::new(&auth.authenticatorData) else {
            debug!(len = auth.authenticatorData.len(), "authenticator data too short");
            return false;
        };

        if !auth_data.is_user_present() || !auth_data.is_user_verified() {
            debug!(flags = auth_data.flags(), "missing user presence or verification");
            return false;
        }
        if !auth_data.has_consistent_backup_flags() {
            debug!(flags = auth_data.flags(), "backup state set without eligibility");
            return false;
        }

        if let Some(expected) = self.policy.rp_id_hash
            && auth_data.rp_id_hash() != expected.as_slice()
        {
            debug!("relying party mismatch");
            return false;
        }

        if !has_substring_at(&auth.clientDataJSON, auth.typeIndex, EXPECTED_TYPE) {
            debug!(type_index = %auth.typeIndex, "unexpected client data type");
            return false;
        }
        if !has_substring_at(
            &auth.clientDataJSON,
            auth.challengeIndex,
            &expected_challenge(challenge),
        ) {
            debug!(challenge_index = %auth.challengeIndex, "challenge mismatch");
            return false;
        }

        if !is_valid_scalar(auth.s) {
            debug!(s = %auth.s, "signature scalar out of range");
            return false;
        }
        let digest = signing_digest(&auth.authenticatorData, auth.clientDataJSON.as_bytes());
        self.backends
            .verify(digest, auth.r, normalize_s(auth.s), key)
    }
}
