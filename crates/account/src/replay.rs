//! Nonce key rules and the cross-chain replayable call path.
use alloy_primitives::{Address, B256, FixedBytes};
use alloy_sol_types::SolCall;
use smart_account_core::{PackedUserOperation, REPLAYABLE_NONCE_KEY};

use crate::{abi::ISmartAccount, error::AccountError};

/// Owner management calls that may be replayed on every chain.
pub const REPLAYABLE_SELECTORS: [[u8; 4]; 4] = [
    ISmartAccount::addOwnerAddressCall::SELECTOR,
    ISmartAccount::addOwnerPublicKeyCall::SELECTOR,
    ISmartAccount::removeOwnerAtIndexCall::SELECTOR,
    ISmartAccount::removeLastOwnerCall::SELECTOR,
];

pub fn can_skip_chain_id_validation(selector: [u8; 4]) -> bool {
    REPLAYABLE_SELECTORS.contains(&selector)
}

pub fn is_replayable_call(call_data: &[u8]) -> bool {
    call_data.get(..4) == Some(&ISmartAccount::executeWithoutChainIdValidationCall::SELECTOR[..])
}

/// Checks every inner call of a replayable payload against the allow-list.
pub fn check_replayable_calls(calls: &[alloy_primitives::Bytes]) -> Result<(), AccountError> {
    for call in calls {
        let selector: [u8; 4] = call
            .get(..4)
            .and_then(|s| s.try_into().ok())
            .ok_or(AccountError::InvalidCallData)?;
        if !can_skip_chain_id_validation(selector) {
            return Err(AccountError::SelectorNotAllowed(FixedBytes(selector)));
        }
    }
    Ok(())
}

/// Enforces that the nonce key matches the kind of call. Returns whether the
/// operation is replayable.
pub fn check_nonce_key(op: &PackedUserOperation) -> Result<bool, AccountError> {
    let key = op.nonce().key;
    if is_replayable_call(&op.call_data) {
        if key != REPLAYABLE_NONCE_KEY {
            return Err(AccountError::InvalidNonceKey(key));
        }
        let call = ISmartAccount::executeWithoutChainIdValidationCall::abi_decode(&op.call_data)
            .map_err(|_| AccountError::InvalidCallData)?;
        check_replayable_calls(&call.calls)?;
        Ok(true)
    } else if key == REPLAYABLE_NONCE_KEY {
        Err(AccountError::InvalidNonceKey(key))
    } else {
        Ok(false)
    }
}

/// Hash the account's owners sign for `op`.
pub fn signing_hash(op: &PackedUserOperation, entry_point: Address, chain_id: u64) -> B256 {
    if is_replayable_call(&op.call_data) {
        op.hash_without_chain_id(entry_point)
    } else {
        op.hash(entry_point, chain_id)
    }
}
