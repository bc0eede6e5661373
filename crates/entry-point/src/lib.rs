//! Entry point for smart account operations.
//!
//! Holds the simulated world, deployed accounts, nonces, deposits and
//! registered sponsors, and runs each operation through validation, nonce
//! and sponsorship checks, execution and gas settlement.

pub mod config;
pub mod entry_point;
pub mod error;
pub mod metrics;

pub use config::{DEFAULT_ENTRY_POINT, EntryPointConfig};
pub use entry_point::{EntryPoint, OpReceipt};
pub use error::EntryPointError;
