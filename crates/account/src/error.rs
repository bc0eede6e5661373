use alloy_primitives::{Address, B256, Bytes, FixedBytes, U256};
use alloy_sol_types::{Revert, SolError};
use smart_account_core::OwnerError;

use crate::state::ModuleType;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("invalid owner: {0}")]
    InvalidOwner(#[from] OwnerError),
    #[error("no owner at index {0}")]
    NoOwnerAtIndex(u64),
    #[error("owner at index {index} does not match, stored {stored}")]
    WrongOwnerAtIndex { index: u64, stored: Bytes },
    #[error("cannot remove the last owner")]
    LastOwner,
    #[error("{remaining} owners remain, not the last owner")]
    NotLastOwner { remaining: usize },
    #[error("invalid signature")]
    InvalidSignature,
    #[error("nonce key {0} does not match the call")]
    InvalidNonceKey(U256),
    #[error("selector {0} cannot skip chain id validation")]
    SelectorNotAllowed(FixedBytes<4>),
    #[error("module {module} already installed as {module_type:?}")]
    ModuleAlreadyInstalled { module_type: ModuleType, module: Address },
    #[error("module {module} not installed as {module_type:?}")]
    ModuleNotInstalled { module_type: ModuleType, module: Address },
    #[error("unsupported module type {0}")]
    UnsupportedModuleType(U256),
    #[error("module {module} is not a {module_type:?} module")]
    ModuleTypeMismatch { module_type: ModuleType, module: Address },
    #[error("unknown module {0}")]
    UnknownModule(Address),
    #[error("module hook failed: {0}")]
    ModuleHookFailed(Bytes),
    #[error("fallback selector {0} already registered")]
    FallbackSelectorTaken(FixedBytes<4>),
    #[error("no handler for selector {0}")]
    UnknownSelector(FixedBytes<4>),
    #[error("unsupported execution mode {0}")]
    UnsupportedExecutionMode(B256),
    #[error("execution failed: {0}")]
    ExecutionFailed(Bytes),
    #[error("out of gas: limit {limit}, needed {needed}")]
    OutOfGas { limit: u64, needed: u64 },
    #[error("caller {0} is not authorized")]
    UnauthorizedCaller(Address),
    #[error("account already initialized")]
    AlreadyInitialized,
    #[error("at least one owner is required")]
    NoOwners,
    #[error("account not initialized")]
    NotInitialized,
    #[error("invalid call data")]
    InvalidCallData,
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: U256, need: U256 },
}

impl AccountError {
    /// Revert payload reported to callers. Target failures keep their own
    /// bytes, everything else becomes an `Error(string)`.
    pub fn revert_data(&self) -> Bytes {
        match self {
            Self::ExecutionFailed(data) | Self::ModuleHookFailed(data) => data.clone(),
            other => Bytes::from(Revert::from(other.to_string()).abi_encode()),
        }
    }
}

pub type AccountResult<T> = Result<T, AccountError>;
