pub mod gas;
pub mod logger;
pub mod nonce;
pub mod owner;
pub mod signature;
pub mod user_operation;

pub use nonce::{Nonce, REPLAYABLE_NONCE_KEY, validator_nonce_key};
pub use owner::{Owner, OwnerError, PasskeyKey};
pub use signature::{
    EnvelopeError, SIG_VALIDATION_FAILED, SIG_VALIDATION_SUCCESS, SignatureEnvelope,
    ValidationData,
};
pub use user_operation::{PackedUserOperation, encode_paymaster_and_data, pack_gas_pair};
