use alloy_primitives::U256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SponsorError {
    #[error("sponsor data must be sponsor, gas limits and a 65-byte authorization")]
    InvalidSponsorData,
    #[error("sponsor authorization is not signed by the sponsor signer")]
    InvalidSponsorSignature,
    #[error("spending cap exceeded: spent {spent}, max cost {max_cost}, cap {cap}")]
    SpendingCapExceeded { spent: U256, max_cost: U256, cap: U256 },
    #[error("no reservation {0}")]
    UnknownReservation(u64),
}
