//! Gas sponsorship for smart account operations.
//!
//! A sponsor authorizes each operation with an ECDSA signature and caps how
//! much it spends on any one account per period. Reservations are taken at
//! the maximum cost during validation and reconciled at settlement.

pub mod error;
pub mod policy;
pub mod sponsor;

pub use error::SponsorError;
pub use policy::{DEFAULT_PERIOD_SECS, SpendPolicyConfig, SpendRecord};
pub use sponsor::{Paymaster, Reservation, SponsorContext, SponsorPaymaster, sponsor_digest};
