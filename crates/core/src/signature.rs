use alloy_primitives::{Bytes, U256};
use serde::{Deserialize, Serialize};

/// Signature wrapper carried in [`crate::PackedUserOperation::signature`].
///
/// Wire form is `ownerIndex(1) ‖ payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureEnvelope {
    pub owner_index: u8,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("signature envelope is empty")]
    Empty,
    #[error("signature envelope has no payload")]
    MissingPayload,
}

impl SignatureEnvelope {
    pub fn new(owner_index: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            owner_index,
            payload: payload.into(),
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
        let (&owner_index, payload) = raw.split_first().ok_or(EnvelopeError::Empty)?;
        if payload.is_empty() {
            return Err(EnvelopeError::MissingPayload);
        }
        Ok(Self {
            owner_index,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = Vec::with_capacity(1 + self.payload.len());
        buf.push(self.owner_index);
        buf.extend_from_slice(&self.payload);
        Bytes::from(buf)
    }
}

pub const SIG_VALIDATION_SUCCESS: U256 = U256::ZERO;
pub const SIG_VALIDATION_FAILED: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Result of account validation, packed the ERC-4337 way:
/// `validAfter(48) ‖ validUntil(48) ‖ authorizer(160)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationData {
    pub sig_failed: bool,
    /// `0` means no upper bound.
    pub valid_until: u64,
    pub valid_after: u64,
}

const TIMESTAMP_MASK: u64 = (1 << 48) - 1;

impl ValidationData {
    pub const fn valid() -> Self {
        Self {
            sig_failed: false,
            valid_until: 0,
            valid_after: 0,
        }
    }

    pub const fn invalid() -> Self {
        Self {
            sig_failed: true,
            valid_until: 0,
            valid_after: 0,
        }
    }

    pub const fn from_verified(ok: bool) -> Self {
        if ok { Self::valid() } else { Self::invalid() }
    }

    pub fn pack(&self) -> U256 {
        let authorizer = if self.sig_failed { U256::from(1) } else { U256::ZERO };
        authorizer
            | (U256::from(self.valid_until & TIMESTAMP_MASK) << 160usize)
            | (U256::from(self.valid_after & TIMESTAMP_MASK) << 208usize)
    }

    pub fn unpack(packed: U256) -> Self {
        let authorizer: U256 = packed & ((U256::from(1) << 160usize) - U256::from(1));
        let valid_until = (packed >> 160usize).as_limbs()[0] & TIMESTAMP_MASK;
        let valid_after = (packed >> 208usize).as_limbs()[0] & TIMESTAMP_MASK;
        Self {
            sig_failed: !authorizer.is_zero(),
            valid_until,
            valid_after,
        }
    }

    /// Whether the time window admits `now`.
    pub const fn is_within_window(&self, now: u64) -> bool {
        now >= self.valid_after && (self.valid_until == 0 || now <= self.valid_until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::bytes;

    #[test]
    fn should_decode_envelope() {
        let envelope = SignatureEnvelope::decode(&bytes!("02aabbcc")).unwrap();
        assert_eq!(envelope.owner_index, 2);
        assert_eq!(envelope.payload, bytes!("aabbcc"));
        assert_eq!(envelope.encode(), bytes!("02aabbcc"));
    }

    #[test]
    fn should_reject_malformed_envelope() {
        assert_eq!(SignatureEnvelope::decode(&[]), Err(EnvelopeError::Empty));
        assert_eq!(
            SignatureEnvelope::decode(&[0]),
            Err(EnvelopeError::MissingPayload)
        );
    }

    #[test]
    fn core_codes_are_zero_and_one() {
        assert_eq!(ValidationData::valid().pack(), SIG_VALIDATION_SUCCESS);
        assert_eq!(ValidationData::invalid().pack(), SIG_VALIDATION_FAILED);
    }

    #[test]
    fn time_bounds_survive_packing() {
        let data = ValidationData {
            sig_failed: false,
            valid_until: 1_700_000_100,
            valid_after: 1_700_000_000,
        };
        assert_eq!(ValidationData::unpack(data.pack()), data);
        assert!(data.is_within_window(1_700_000_050));
        assert!(!data.is_within_window(1_700_000_101));
        assert!(!data.is_within_window(1_699_999_999));
    }

    #[test]
    fn should_unpack_aggregator_word() {
        // aggregator 0x..aa, validUntil 0x30, validAfter 0x10
        let packed = U256::from(0xaa)
            | (U256::from(0x30) << 160usize)
            | (U256::from(0x10) << 208usize);
        let data = ValidationData::unpack(packed);
        assert!(data.sig_failed);
        assert_eq!(data.valid_until, 0x30);
        assert_eq!(data.valid_after, 0x10);
        assert_eq!(ValidationData::unpack(U256::MAX).valid_after, TIMESTAMP_MASK);
    }
}
