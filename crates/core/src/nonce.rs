use alloy_primitives::{Address, U256, uint};
use serde::{Deserialize, Serialize};

/// Key reserved for operations that are valid on every chain, `2^192 - 1`.
pub const REPLAYABLE_NONCE_KEY: U256 =
    uint!(0xffffffffffffffffffffffffffffffffffffffffffffffff_U256);

/// A 256-bit nonce split into a 192-bit key and a 64-bit sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Nonce {
    pub key: U256,
    pub sequence: u64,
}

impl Nonce {
    pub fn new(key: U256, sequence: u64) -> Self {
        Self { key, sequence }
    }

    pub fn replayable(sequence: u64) -> Self {
        Self::new(REPLAYABLE_NONCE_KEY, sequence)
    }

    pub fn is_replayable(&self) -> bool {
        self.key == REPLAYABLE_NONCE_KEY
    }

    /// Validator module selected by the upper 20 bytes of the key, if any.
    pub fn validator(&self) -> Option<Address> {
        if self.is_replayable() {
            return None;
        }
        let bytes = self.key.to_be_bytes::<32>();
        // key occupies bytes 8..32 of the word, its top 20 bytes are 8..28
        let validator = Address::from_slice(&bytes[8..28]);
        (!validator.is_zero()).then_some(validator)
    }

    pub fn to_u256(&self) -> U256 {
        (self.key << 64usize) | U256::from(self.sequence)
    }
}

impl From<U256> for Nonce {
    fn from(value: U256) -> Self {
        Self {
            key: value >> 64usize,
            sequence: value.as_limbs()[0],
        }
    }
}

impl From<Nonce> for U256 {
    fn from(value: Nonce) -> Self {
        value.to_u256()
    }
}

/// Builds a key that routes validation to `validator`, `channel` keeps
/// parallel sequences apart.
pub fn validator_nonce_key(validator: Address, channel: u32) -> U256 {
    (U256::from_be_slice(validator.as_slice()) << 32usize) | U256::from(channel)
}
