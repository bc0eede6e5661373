//! Operation validation: nonce key rules, owner and module dispatch, prefund.
use alloy_primitives::{Address, B256, FixedBytes, Signature, U256};
use smart_account_core::{Owner, PackedUserOperation, SignatureEnvelope, ValidationData, gas};
use tracing::{debug, info};

use crate::{
    account::SmartAccount,
    auth::Capability,
    error::{AccountError, AccountResult},
    host::Host,
    replay,
    state::ModuleType,
};

/// ERC-1271 magic value for a valid signature.
pub const ERC1271_MAGIC_VALUE: FixedBytes<4> = FixedBytes([0x16, 0x26, 0xba, 0x7e]);
pub const ERC1271_INVALID: FixedBytes<4> = FixedBytes([0xff, 0xff, 0xff, 0xff]);

/// Which check decided the validation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureScheme {
    Ecdsa,
    WebAuthn { native: bool },
    Module(Address),
    /// No owner or module could be consulted.
    None,
}

impl SignatureScheme {
    /// Verification gas charged for the scheme.
    pub const fn gas(&self) -> u64 {
        let scheme = match self {
            Self::Ecdsa => gas::ECDSA_VERIFICATION_GAS,
            Self::WebAuthn { native: true } => gas::WEBAUTHN_VERIFICATION_GAS,
            Self::WebAuthn { native: false } => {
                gas::WEBAUTHN_VERIFICATION_GAS + gas::SOFTWARE_P256_SURCHARGE
            }
            Self::Module(_) => gas::MODULE_VALIDATION_GAS,
            Self::None => 0,
        };
        gas::VALIDATION_BASE_GAS + scheme
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub data: ValidationData,
    pub scheme: SignatureScheme,
    /// Whether the operation was hashed without the chain id.
    pub replayable: bool,
}

impl ValidationOutcome {
    pub const fn is_valid(&self) -> bool {
        !self.data.sig_failed
    }

    pub const fn gas(&self) -> u64 {
        self.scheme.gas()
    }
}

impl SmartAccount {
    /// `validateUserOp`, callable only by the entry point.
    ///
    /// Nonce key violations are errors. A bad signature is not an error, it
    /// is reported through [`ValidationData`]. `missing_funds` is paid to the
    /// entry point from the account balance.
    pub fn validate_user_op(
        &mut self,
        host: &mut Host,
        caller: Address,
        op: &PackedUserOperation,
        op_hash: B256,
        missing_funds: U256,
    ) -> AccountResult<ValidationOutcome> {
        self.authorize(caller, Capability::EntryPoint)?;
        if !self.state().is_initialized() {
            return Err(AccountError::NotInitialized);
        }

        let replayable = replay::check_nonce_key(op)?;
        let hash = if replayable {
            op.hash_without_chain_id(self.entry_point())
        } else {
            op_hash
        };

        let (data, scheme) = match op.nonce().validator() {
            Some(validator) => self.validate_with_module(host, validator, op, hash),
            None => self.verify_owner_signature(hash, &op.signature),
        };

        host.world
            .transfer(self.address(), self.entry_point(), missing_funds)?;

        info!(
            account = %self.address(),
            valid = !data.sig_failed,
            ?scheme,
            replayable,
            "user operation validated"
        );
        Ok(ValidationOutcome {
            data,
            scheme,
            replayable,
        })
    }

    fn validate_with_module(
        &mut self,
        host: &Host,
        validator: Address,
        op: &PackedUserOperation,
        hash: B256,
    ) -> (ValidationData, SignatureScheme) {
        if !self.state().is_module_installed(ModuleType::Validator, validator) {
            debug!(%validator, "nonce key names a validator that is not installed");
            return (ValidationData::invalid(), SignatureScheme::None);
        }
        let Some(module) = host.module(validator) else {
            return (ValidationData::invalid(), SignatureScheme::None);
        };
        let Some(module_validator) = module.as_validator() else {
            return (ValidationData::invalid(), SignatureScheme::None);
        };
        self.state_mut().current_validator = Some(validator);
        let data = module_validator.validate_user_op(&host.world, self.address(), op, hash);
        (data, SignatureScheme::Module(validator))
    }

    /// Checks `signature` (an owner envelope) over `hash`.
    pub fn verify_owner_signature(
        &self,
        hash: B256,
        signature: &[u8],
    ) -> (ValidationData, SignatureScheme) {
        let Ok(envelope) = SignatureEnvelope::decode(signature) else {
            return (ValidationData::invalid(), SignatureScheme::None);
        };
        let Some(owner) = self.state().owner_at(u64::from(envelope.owner_index)) else {
            debug!(index = envelope.owner_index, "no owner at signature index");
            return (ValidationData::invalid(), SignatureScheme::None);
        };

        match owner {
            Owner::Address { address } => {
                let ok = recover_signer(hash, &envelope.payload) == Some(*address);
                (ValidationData::from_verified(ok), SignatureScheme::Ecdsa)
            }
            Owner::Passkey { key } => {
                let ok = self
                    .verifier()
                    .verify_encoded(hash.as_slice(), &envelope.payload, key);
                let native = self.verifier().backends().has_native();
                (
                    ValidationData::from_verified(ok),
                    SignatureScheme::WebAuthn { native },
                )
            }
        }
    }

    /// ERC-1271 `isValidSignature`.
    pub fn is_valid_signature(&self, hash: B256, signature: &[u8]) -> FixedBytes<4> {
        let (data, _) = self.verify_owner_signature(hash, signature);
        if data.sig_failed {
            ERC1271_INVALID
        } else {
            ERC1271_MAGIC_VALUE
        }
    }

    /// Clears per-operation validation context.
    pub fn finish_operation(&mut self) {
        self.state_mut().current_validator = None;
    }
}

/// Recovers the signer of a 65-byte `r ‖ s ‖ v` signature over `hash`.
fn recover_signer(hash: B256, signature: &[u8]) -> Option<Address> {
    if signature.len() != 65 {
        return None;
    }
    let signature = Signature::from_raw(signature).ok()?;
    signature.recover_address_from_prehash(&hash).ok()
}
