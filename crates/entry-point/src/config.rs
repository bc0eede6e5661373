use alloy_primitives::{Address, address};
use serde::{Deserialize, Serialize};
use smart_account_webauthn::{P256Backends, WebAuthnPolicy, WebAuthnVerifier};

/// Canonical v0.7 entry point address.
pub const DEFAULT_ENTRY_POINT: Address = address!("0000000071727De22E5E9d8BAf0edAc6f37da032");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntryPointConfig {
    pub address: Address,
    pub chain_id: u64,
    /// Base fee per gas of the simulated block, in wei.
    pub base_fee: u128,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    /// Whether the P-256 precompile is available to passkey verification.
    pub native_p256: bool,
    /// Relying party passkey assertions must be bound to, if any.
    pub rp_id: Option<String>,
}

impl Default for EntryPointConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ENTRY_POINT,
            chain_id: 1,
            base_fee: 0,
            timestamp: 0,
            native_p256: true,
            rp_id: None,
        }
    }
}

impl EntryPointConfig {
    /// Passkey verifier accounts deployed under this config use.
    pub fn verifier(&self) -> WebAuthnVerifier {
        let policy = self
            .rp_id
            .as_deref()
            .map(WebAuthnPolicy::for_rp_id)
            .unwrap_or_default();
        WebAuthnVerifier::new(P256Backends::new(self.native_p256), policy)
    }
}
