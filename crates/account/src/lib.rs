//! A programmable smart account.
//!
//! Owners are addresses or passkeys kept at stable indices. Operations are
//! validated against an owner signature or an installed validator module,
//! then executed in single, batch or delegate mode with hooks around them.
//! The account runs against an in-memory [`host::Host`] that holds balances,
//! contract code and modules.

pub mod abi;
pub mod account;
pub mod auth;
pub mod error;
pub mod execution;
pub mod host;
pub mod modules;
pub mod owners;
pub mod replay;
pub mod state;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use abi::{Execution, ISmartAccount};
pub use account::SmartAccount;
pub use auth::Capability;
pub use error::{AccountError, AccountResult};
pub use execution::{ExecType, ExecutionMode, ExecutionResult, GasMeter};
pub use host::{CallContext, Contract, Fallback, Hook, Host, Module, Validator, WorldState};
pub use replay::{REPLAYABLE_SELECTORS, signing_hash};
pub use state::{AccountState, ModuleType};
pub use validation::{SignatureScheme, ValidationOutcome};
