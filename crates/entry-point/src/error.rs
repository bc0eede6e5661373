use alloy_primitives::{Address, U256};
use smart_account::AccountError;
use smart_account_paymaster::SponsorError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryPointError {
    #[error(transparent)]
    Account(#[from] AccountError),
    #[error(transparent)]
    Sponsor(#[from] SponsorError),
    #[error("no account deployed at {0}")]
    AccountNotDeployed(Address),
    #[error("account {0} already constructed")]
    SenderAlreadyConstructed(Address),
    #[error("invalid account signature")]
    InvalidSignature,
    #[error("invalid nonce: expected sequence {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },
    #[error("deposit of {payer} is {have}, needs {need}")]
    InsufficientDeposit { payer: Address, have: U256, need: U256 },
    #[error("no paymaster registered at {0}")]
    UnknownPaymaster(Address),
    #[error("verification needs {needed} gas, limit is {limit}")]
    VerificationGasExceeded { limit: u128, needed: u64 },
}
