use alloy_primitives::{B256, Bytes, U256};
use p256::{
    EncodedPoint, FieldBytes,
    ecdsa::{Signature, VerifyingKey, signature::hazmat::PrehashVerifier},
};
use smart_account_core::PasskeyKey;
use tracing::trace;

use crate::curve;

/// Length of a precompile input: `hash ‖ r ‖ s ‖ x ‖ y`.
pub const PRECOMPILE_INPUT_LEN: usize = 160;

/// A P-256 ECDSA verification backend.
pub trait P256Verifier: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;

    fn verify(&self, digest: B256, r: U256, s: U256, key: &PasskeyKey) -> bool;
}

/// Accelerated backend shaped like the RIP-7212 precompile.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeP256;

impl NativeP256 {
    /// Runs the precompile on a raw input. Returns a 32-byte `1` on success
    /// and empty output otherwise.
    pub fn call(input: &[u8]) -> Bytes {
        if input.len() != PRECOMPILE_INPUT_LEN {
            return Bytes::new();
        }
        let field = |i: usize| FieldBytes::clone_from_slice(&input[i * 32..(i + 1) * 32]);

        let Ok(signature) = Signature::from_scalars(field(1), field(2)) else {
            return Bytes::new();
        };
        let point = EncodedPoint::from_affine_coordinates(&field(3), &field(4), false);
        let Ok(key) = VerifyingKey::from_encoded_point(&point) else {
            return Bytes::new();
        };
        match key.verify_prehash(&input[..32], &signature) {
            Ok(()) => Bytes::copy_from_slice(B256::with_last_byte(1).as_slice()),
            Err(_) => Bytes::new(),
        }
    }

    pub fn encode_input(
        digest: B256,
        r: U256,
        s: U256,
        key: &PasskeyKey,
    ) -> [u8; PRECOMPILE_INPUT_LEN] {
        let mut input = [0u8; PRECOMPILE_INPUT_LEN];
        input[..32].copy_from_slice(digest.as_slice());
        input[32..64].copy_from_slice(&r.to_be_bytes::<32>());
        input[64..96].copy_from_slice(&s.to_be_bytes::<32>());
        input[96..128].copy_from_slice(key.x.as_slice());
        input[128..].copy_from_slice(key.y.as_slice());
        input
    }
}

impl P256Verifier for NativeP256 {
    fn name(&self) -> &'static str {
        "native"
    }

    fn verify(&self, digest: B256, r: U256, s: U256, key: &PasskeyKey) -> bool {
        let output = Self::call(&Self::encode_input(digest, r, s, key));
        output.len() == 32 && output[31] == 1
    }
}

/// Portable backend, pure modular arithmetic.
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareP256;

impl P256Verifier for SoftwareP256 {
    fn name(&self) -> &'static str {
        "software"
    }

    fn verify(&self, digest: B256, r: U256, s: U256, key: &PasskeyKey) -> bool {
        curve::verify(
            digest,
            r,
            s,
            U256::from_be_bytes(key.x.0),
            U256::from_be_bytes(key.y.0),
        )
    }
}

/// Backend selection: the native path when present, software otherwise.
#[derive(Debug, Clone, Copy)]
pub struct P256Backends {
    native: Option<NativeP256>,
    software: SoftwareP256,
}

impl Default for P256Backends {
    fn default() -> Self {
        Self::new(true)
    }
}

impl P256Backends {
    pub const fn new(native_available: bool) -> Self {
        Self {
            native: if native_available { Some(NativeP256) } else { None },
            software: SoftwareP256,
        }
    }

    pub const fn software_only() -> Self {
        Self::new(false)
    }

    pub const fn has_native(&self) -> bool {
        self.native.is_some()
    }

    pub fn active(&self) -> &dyn P256Verifier {
        match &self.native {
            Some(native) => native,
            None => &self.software,
        }
    }

    pub fn verify(&self, digest: B256, r: U256, s: U256, key: &PasskeyKey) -> bool {
        let backend = self.active();
        let ok = backend.verify(digest, r, s, key);
        trace!(backend = backend.name(), ok, "p256 verification");
        ok
    }
}
