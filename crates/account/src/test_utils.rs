//! Signers, contracts and modules for exercising accounts in tests.
use alloy_primitives::{Address, B256, Bytes, U256, address};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use p256::{
    ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey, signature::hazmat::PrehashSigner},
    elliptic_curve::sec1::ToEncodedPoint,
};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use smart_account_core::{Owner, PackedUserOperation, PasskeyKey, SignatureEnvelope, ValidationData};
use smart_account_webauthn::{
    WebAuthnVerifier, assertion::signing_digest, build_assertion, client::client_data_json,
    encode_assertion,
};

use crate::{
    account::SmartAccount,
    host::{CallContext, Contract, Fallback, Hook, Module, Validator, WorldState},
    state::ModuleType,
};

pub const ENTRY_POINT: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");
pub const ACCOUNT: Address = address!("00000000000000000000000000000000000acc01");
pub const RP_ID: &str = "wallet.example";

/// Flags for a user-present, user-verified assertion.
pub const FLAGS_UP_UV: u8 = 0x05;

pub fn slot(n: u8) -> B256 {
    B256::with_last_byte(n)
}

pub fn read_u256(world: &WorldState, address: Address, n: u8) -> U256 {
    U256::from_be_bytes(world.sload(address, slot(n)).0)
}

fn bump(world: &mut WorldState, address: Address, n: u8) -> U256 {
    let next = read_u256(world, address, n) + U256::from(1);
    world.sstore(address, slot(n), B256::from(next));
    next
}

/// An address owner backed by a local secp256k1 key.
#[derive(Debug, Clone)]
pub struct EcdsaOwner {
    signer: PrivateKeySigner,
}

impl EcdsaOwner {
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn owner(&self) -> Owner {
        Owner::address(self.address())
    }

    /// Raw 65-byte signature over `hash`.
    pub fn sign_raw(&self, hash: B256) -> Bytes {
        let signature = self
            .signer
            .sign_hash_sync(&hash)
            .expect("local signing cannot fail");
        Bytes::copy_from_slice(&signature.as_bytes())
    }

    /// Envelope for the owner stored at `index`.
    pub fn sign(&self, index: u8, hash: B256) -> Bytes {
        SignatureEnvelope::new(index, self.sign_raw(hash)).encode()
    }
}

/// A passkey owner backed by a local P-256 key.
#[derive(Debug, Clone)]
pub struct PasskeyOwner {
    signing_key: SigningKey,
    key: PasskeyKey,
}

impl PasskeyOwner {
    pub fn random() -> Self {
        let signing_key = SigningKey::random(&mut OsRng);
        let point = VerifyingKey::from(&signing_key).to_encoded_point(false);
        let key = PasskeyKey::new(
            B256::from_slice(point.x().expect("uncompressed point")),
            B256::from_slice(point.y().expect("uncompressed point")),
        );
        Self { signing_key, key }
    }

    pub const fn key(&self) -> PasskeyKey {
        self.key
    }

    pub const fn owner(&self) -> Owner {
        Owner::Passkey { key: self.key }
    }

    /// ABI-encoded assertion over `challenge` with the given flags.
    pub fn assertion(&self, challenge: &[u8], flags: u8) -> Bytes {
        let mut auth_data = Sha256::digest(RP_ID.as_bytes()).to_vec();
        auth_data.push(flags);
        auth_data.extend_from_slice(&1u32.to_be_bytes());
        let json = client_data_json(challenge, "https://wallet.example");
        let digest = signing_digest(&auth_data, json.as_bytes());
        let signature: P256Signature = self
            .signing_key
            .sign_prehash(digest.as_slice())
            .expect("prehash signing");
        let auth = build_assertion(&auth_data, &json, signature.to_der().as_bytes())
            .expect("well formed assertion");
        encode_assertion(&auth)
    }

    pub fn sign(&self, index: u8, hash: B256) -> Bytes {
        SignatureEnvelope::new(index, self.assertion(hash.as_slice(), FLAGS_UP_UV)).encode()
    }
}

/// Account at [`ACCOUNT`] bound to [`ENTRY_POINT`].
pub fn account_with(owners: &[Owner]) -> SmartAccount {
    SmartAccount::with_owners(ACCOUNT, ENTRY_POINT, WebAuthnVerifier::default(), owners)
        .expect("valid owners")
}

/// Increments slot 0 of the storage it runs against and returns the new
/// value. Calls with a value also record it in slot 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counter;

impl Contract for Counter {
    fn call(&self, world: &mut WorldState, ctx: CallContext, _data: &[u8]) -> Result<Bytes, Bytes> {
        let next = bump(world, ctx.address, 0);
        if !ctx.value.is_zero() {
            world.sstore(ctx.address, slot(1), B256::from(ctx.value));
        }
        Ok(Bytes::from(next.to_be_bytes::<32>().to_vec()))
    }
}

/// Always reverts with its configured payload.
#[derive(Debug, Clone, Default)]
pub struct Reverter {
    pub payload: Bytes,
}

impl Contract for Reverter {
    fn call(
        &self,
        _world: &mut WorldState,
        _ctx: CallContext,
        _data: &[u8],
    ) -> Result<Bytes, Bytes> {
        Err(self.payload.clone())
    }
}

/// Executor module with no behaviour of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockExecutor;

impl Module for MockExecutor {
    fn is_module_type(&self, module_type: ModuleType) -> bool {
        module_type == ModuleType::Executor
    }

    fn on_install(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }

    fn on_uninstall(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }
}

/// Validator that accepts exactly the signature `0x01`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockValidator;

impl Validator for MockValidator {
    fn validate_user_op(
        &self,
        _world: &WorldState,
        _account: Address,
        op: &PackedUserOperation,
        _op_hash: B256,
    ) -> ValidationData {
        ValidationData::from_verified(op.signature.as_ref() == [0x01])
    }
}

impl Module for MockValidator {
    fn is_module_type(&self, module_type: ModuleType) -> bool {
        module_type == ModuleType::Validator
    }

    fn on_install(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }

    fn on_uninstall(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }

    fn as_validator(&self) -> Option<&dyn Validator> {
        Some(self)
    }
}

/// Counts pre and post checks in its own storage, slots 1 and 2.
#[derive(Debug, Clone, Copy)]
pub struct CountingHook {
    pub address: Address,
}

const HOOK_DATA: [u8; 2] = [0xbe, 0xef];

impl Hook for CountingHook {
    fn pre_check(
        &self,
        world: &mut WorldState,
        _account: Address,
        _sender: Address,
        _value: U256,
        _data: &[u8],
    ) -> Result<Bytes, Bytes> {
        bump(world, self.address, 1);
        Ok(Bytes::from_static(&HOOK_DATA))
    }

    fn post_check(
        &self,
        world: &mut WorldState,
        _account: Address,
        hook_data: &[u8],
    ) -> Result<(), Bytes> {
        if hook_data != HOOK_DATA {
            return Err(Bytes::from_static(b"bad hook data"));
        }
        bump(world, self.address, 2);
        Ok(())
    }
}

impl Module for CountingHook {
    fn is_module_type(&self, module_type: ModuleType) -> bool {
        module_type == ModuleType::Hook
    }

    fn on_install(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }

    fn on_uninstall(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }

    fn as_hook(&self) -> Option<&dyn Hook> {
        Some(self)
    }
}

/// Returns the call data after the selector, prefixed with the sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoFallback;

impl Fallback for EchoFallback {
    fn handle(
        &self,
        _world: &mut WorldState,
        _account: Address,
        sender: Address,
        _value: U256,
        data: &[u8],
    ) -> Result<Bytes, Bytes> {
        let mut out = sender.to_vec();
        out.extend_from_slice(data.get(4..).unwrap_or_default());
        Ok(out.into())
    }
}

impl Module for EchoFallback {
    fn is_module_type(&self, module_type: ModuleType) -> bool {
        module_type == ModuleType::Fallback
    }

    fn on_install(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }

    fn on_uninstall(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }

    fn as_fallback(&self) -> Option<&dyn Fallback> {
        Some(self)
    }
}

/// Executor whose install hook writes a marker and then fails.
#[derive(Debug, Clone, Copy)]
pub struct FailingInstall {
    pub address: Address,
}

impl Module for FailingInstall {
    fn is_module_type(&self, module_type: ModuleType) -> bool {
        module_type == ModuleType::Executor
    }

    fn on_install(&self, world: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        bump(world, self.address, 0);
        Err(Bytes::from_static(b"install refused"))
    }

    fn on_uninstall(&self, _: &mut WorldState, _: Address, _: &[u8]) -> Result<(), Bytes> {
        Ok(())
    }
}
