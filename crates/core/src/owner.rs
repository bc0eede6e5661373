use alloy_primitives::{Address, B256, Bytes};
use serde::{Deserialize, Serialize};

/// Uncompressed P-256 public key coordinates of a passkey owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PasskeyKey {
    pub x: B256,
    pub y: B256,
}

impl PasskeyKey {
    pub const fn new(x: B256, y: B256) -> Self {
        Self { x, y }
    }

    pub fn to_bytes(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(self.x.as_slice());
        out[32..].copy_from_slice(self.y.as_slice());
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Owner {
    Address { address: Address },
    Passkey { key: PasskeyKey },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnerError {
    #[error("owner encoding must be 20, 32 or 64 bytes, got {0}")]
    InvalidLength(usize),
    #[error("32-byte owner is not an ABI-encoded address")]
    DirtyAddressPadding,
    #[error("owner must not be zero")]
    ZeroOwner,
    #[error("owner already registered")]
    AlreadyOwner,
}

impl Owner {
    pub const fn address(address: Address) -> Self {
        Self::Address { address }
    }

    pub const fn passkey(x: B256, y: B256) -> Self {
        Self::Passkey {
            key: PasskeyKey::new(x, y),
        }
    }

    /// Parses any accepted raw owner encoding.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, OwnerError> {
        let owner = match raw.len() {
            20 => Self::address(Address::from_slice(raw)),
            32 => {
                if raw[..12].iter().any(|b| *b != 0) {
                    return Err(OwnerError::DirtyAddressPadding);
                }
                Self::address(Address::from_slice(&raw[12..]))
            }
            64 => Self::passkey(B256::from_slice(&raw[..32]), B256::from_slice(&raw[32..])),
            len => return Err(OwnerError::InvalidLength(len)),
        };
        if owner.is_zero() {
            return Err(OwnerError::ZeroOwner);
        }
        Ok(owner)
    }

    /// Canonical stored form: addresses as 32-byte ABI words, passkeys as `x ‖ y`.
    pub fn encode(&self) -> Bytes {
        match self {
            Self::Address { address } => {
                let mut word = [0u8; 32];
                word[12..].copy_from_slice(address.as_slice());
                Bytes::copy_from_slice(&word)
            }
            Self::Passkey { key } => Bytes::copy_from_slice(&key.to_bytes()),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Self::Address { address } => address.is_zero(),
            Self::Passkey { key } => key.x.is_zero() && key.y.is_zero(),
        }
    }

    pub const fn as_address(&self) -> Option<Address> {
        match self {
            Self::Address { address } => Some(*address),
            Self::Passkey { .. } => None,
        }
    }

    pub const fn as_passkey(&self) -> Option<&PasskeyKey> {
        match self {
            Self::Passkey { key } => Some(key),
            Self::Address { .. } => None,
        }
    }
}

impl From<Address> for Owner {
    fn from(address: Address) -> Self {
        Self::address(address)
    }
}

impl From<PasskeyKey> for Owner {
    fn from(key: PasskeyKey) -> Self {
        Self::Passkey { key }
    }
}
