//! Operator tooling around the smart account engine: operation hashing,
//! nonce keys, passkey key parsing and assertion encoding, and local
//! simulation through the entry point.

pub mod commands;

use alloy_primitives::{Address, Bytes, U256};
use clap::{Parser, Subcommand};
use smart_account_core::logger::LogFormat;
use smart_account_entry_point::{DEFAULT_ENTRY_POINT, EntryPointConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "smart-account")]
#[command(about = "Hash, sign and simulate smart account operations")]
pub struct Config {
    #[arg(long, global = true, env = "SMART_ACCOUNT_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[arg(long, global = true, env = "SMART_ACCOUNT_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    #[arg(
        long,
        global = true,
        env = "SMART_ACCOUNT_ENTRY_POINT",
        default_value_t = DEFAULT_ENTRY_POINT
    )]
    pub entry_point: Address,

    #[arg(long, global = true, env = "SMART_ACCOUNT_CHAIN_ID", default_value_t = 1)]
    pub chain_id: u64,

    /// Verify passkeys with the software P-256 backend only.
    #[arg(long, global = true, env = "SMART_ACCOUNT_SOFTWARE_P256")]
    pub software_p256: bool,

    /// Relying party id passkey assertions must be bound to.
    #[arg(long, global = true, env = "SMART_ACCOUNT_RP_ID")]
    pub rp_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    pub fn entry_point_config(&self) -> EntryPointConfig {
        EntryPointConfig {
            address: self.entry_point,
            chain_id: self.chain_id,
            native_p256: !self.software_p256,
            rp_id: self.rp_id.clone(),
            ..Default::default()
        }
    }

    /// Runs the selected command and returns what it prints.
    pub fn run(&self) -> anyhow::Result<String> {
        commands::run(self)
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the hashes an operation is signed and sponsored under.
    Hash {
        /// Operation JSON, a file path, or `-` for stdin.
        #[arg(long)]
        op: String,
    },
    /// Build a nonce key and the first nonce under it.
    Nonce {
        #[arg(long, conflicts_with = "replayable")]
        validator: Option<Address>,
        #[arg(long, default_value_t = 0)]
        channel: u32,
        #[arg(long)]
        replayable: bool,
        #[arg(long, default_value_t = 0)]
        sequence: u64,
    },
    /// Decode a COSE, SubjectPublicKeyInfo or raw SEC1 P-256 public key.
    ParseKey {
        /// Hex encoded key.
        key: Bytes,
    },
    /// Print the clientDataJSON a passkey signs for `challenge`.
    ClientData {
        #[arg(long)]
        challenge: Bytes,
        #[arg(long, default_value = "https://localhost")]
        origin: String,
    },
    /// Encode an authenticator response as an account signature.
    Assertion {
        #[arg(long)]
        authenticator_data: Bytes,
        #[arg(long)]
        client_data_json: String,
        /// DER encoded ECDSA signature.
        #[arg(long)]
        signature: Bytes,
        /// Wrap the assertion in a signature envelope for this owner index.
        #[arg(long)]
        owner_index: Option<u8>,
    },
    /// Check an encoded assertion against a passkey.
    Verify {
        #[arg(long)]
        challenge: Bytes,
        #[arg(long)]
        assertion: Bytes,
        /// Hex encoded public key in any format `parse-key` accepts.
        #[arg(long)]
        key: Bytes,
    },
    /// Deploy the sender and run the operation through a local entry point.
    Simulate {
        /// Operation JSON, a file path, or `-` for stdin.
        #[arg(long)]
        op: String,
        /// Owner bytes: a 20 or 32 byte address, or a 64 byte passkey.
        #[arg(long = "owner", required = true)]
        owners: Vec<Bytes>,
        /// Entry point deposit credited to the sender, in wei.
        #[arg(long, default_value_t = U256::from(10).pow(U256::from(18)))]
        deposit: U256,
        #[arg(long, default_value_t = Address::ZERO)]
        beneficiary: Address,
        #[arg(long, default_value_t = 0)]
        base_fee: u128,
        #[arg(long, default_value_t = 0)]
        timestamp: u64,
    },
}
