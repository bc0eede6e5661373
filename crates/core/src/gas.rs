//! Flat gas schedule used by the in-memory entry point.

/// Charged once per operation before validation.
pub const VALIDATION_BASE_GAS: u64 = 5_000;
pub const ECDSA_VERIFICATION_GAS: u64 = 6_000;
/// WebAuthn assertions cost more because of the P-256 check and JSON scan.
pub const WEBAUTHN_VERIFICATION_GAS: u64 = 22_000;
/// Price of the software P-256 fallback on top of the WebAuthn base.
pub const SOFTWARE_P256_SURCHARGE: u64 = 330_000;
pub const MODULE_VALIDATION_GAS: u64 = 10_000;
pub const SPONSOR_VALIDATION_GAS: u64 = 8_000;

pub const CALL_BASE_GAS: u64 = 2_600;
pub const VALUE_TRANSFER_GAS: u64 = 9_000;
pub const ZERO_BYTE_GAS: u64 = 4;
pub const NON_ZERO_BYTE_GAS: u64 = 16;

/// Gas for one call carrying `data` and optionally value.
pub fn call_gas(data: &[u8], transfers_value: bool) -> u64 {
    let calldata: u64 = data
        .iter()
        .map(|b| if *b == 0 { ZERO_BYTE_GAS } else { NON_ZERO_BYTE_GAS })
        .sum();
    let value = if transfers_value { VALUE_TRANSFER_GAS } else { 0 };
    CALL_BASE_GAS + calldata + value
}

/// `min(maxFeePerGas, baseFee + maxPriorityFeePerGas)`
pub fn effective_gas_price(max_fee: u128, max_priority_fee: u128, base_fee: u128) -> u128 {
    max_fee.min(base_fee.saturating_add(max_priority_fee))
}
