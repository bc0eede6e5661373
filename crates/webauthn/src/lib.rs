//! Passkey (WebAuthn, P-256) authentication for smart account owners.
//!
//! [`WebAuthnVerifier`] is the on-path check an account runs for passkey
//! owners; it only ever answers `true` or `false`. The [`client`] and [`key`]
//! modules build assertions and decode device keys outside the trust boundary.

pub mod assertion;
pub mod backend;
pub mod client;
pub mod curve;
pub mod key;

pub use assertion::{WebAuthnAuth, WebAuthnPolicy, WebAuthnVerifier};
pub use backend::{NativeP256, P256Backends, P256Verifier, SoftwareP256};
pub use client::{
    SignatureParseError, WebAuthnError, build_assertion, encode_assertion, encode_der_signature,
    parse_der_signature,
};
pub use curve::normalize_s;
pub use key::{KeyParseError, parse_public_key};
