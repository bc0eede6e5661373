use std::{fs, io};

use alloy_primitives::{Address, B256, Bytes, U256};
use anyhow::{Context, Result, bail};
use serde::Serialize;
use smart_account::signing_hash;
use smart_account_core::{
    Nonce, Owner, PackedUserOperation, PasskeyKey, REPLAYABLE_NONCE_KEY, SignatureEnvelope,
    validator_nonce_key,
};
use smart_account_entry_point::{EntryPoint, OpReceipt};
use smart_account_webauthn::{
    P256Verifier as _, build_assertion, client::client_data_json, encode_assertion,
    parse_public_key,
};
use tracing::{debug, info};

use crate::{Command, Config};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationHashes {
    /// What owners sign: chain agnostic for `executeWithoutChainIdValidation`
    /// calls, chain bound otherwise.
    pub signing_hash: B256,
    pub hash: B256,
    pub replayable_hash: B256,
    pub sponsor_hash: B256,
    pub nonce_key: U256,
    pub sequence: u64,
    pub max_cost: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceOutput {
    pub key: U256,
    pub nonce: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyOutput {
    pub x: B256,
    pub y: B256,
    /// Argument for `addOwnerPublicKey` or the `--owner` flag.
    pub owner: Bytes,
}

pub fn run(config: &Config) -> Result<String> {
    match &config.command {
        Command::Hash { op } => {
            let op = read_operation(op)?;
            let hashes = hash_operation(&op, config.entry_point, config.chain_id);
            Ok(serde_json::to_string_pretty(&hashes)?)
        }
        Command::Nonce {
            validator,
            channel,
            replayable,
            sequence,
        } => {
            let nonce = nonce_key(*validator, *channel, *replayable, *sequence)?;
            Ok(serde_json::to_string_pretty(&nonce)?)
        }
        Command::ParseKey { key } => Ok(serde_json::to_string_pretty(&parse_key(key)?)?),
        Command::ClientData { challenge, origin } => Ok(client_data_json(challenge, origin)),
        Command::Assertion {
            authenticator_data,
            client_data_json,
            signature,
            owner_index,
        } => {
            let encoded =
                encode_signature(authenticator_data, client_data_json, signature, *owner_index)?;
            Ok(encoded.to_string())
        }
        Command::Verify {
            challenge,
            assertion,
            key,
        } => {
            let key = parse_public_key(key).context("invalid passkey public key")?;
            let valid = verify_assertion(config, challenge, assertion, &key);
            Ok(valid.to_string())
        }
        Command::Simulate {
            op,
            owners,
            deposit,
            beneficiary,
            base_fee,
            timestamp,
        } => {
            let op = read_operation(op)?;
            let owners = owners
                .iter()
                .map(|raw| Owner::from_bytes(raw))
                .collect::<Result<Vec<_>, _>>()
                .context("invalid owner")?;
            let receipt = simulate(
                config,
                &op,
                &owners,
                *deposit,
                *beneficiary,
                *base_fee,
                *timestamp,
            )?;
            Ok(serde_json::to_string_pretty(&receipt)?)
        }
    }
}

/// Reads an operation from inline JSON, a file, or stdin when `source` is `-`.
pub fn read_operation(source: &str) -> Result<PackedUserOperation> {
    let json = if source == "-" {
        io::read_to_string(io::stdin()).context("failed to read operation from stdin")?
    } else if source.trim_start().starts_with('{') {
        source.to_owned()
    } else {
        fs::read_to_string(source).with_context(|| format!("failed to read {source}"))?
    };
    serde_json::from_str(&json).context("invalid operation JSON")
}

pub fn hash_operation(
    op: &PackedUserOperation,
    entry_point: Address,
    chain_id: u64,
) -> OperationHashes {
    let nonce = op.nonce();
    OperationHashes {
        signing_hash: signing_hash(op, entry_point, chain_id),
        hash: op.hash(entry_point, chain_id),
        replayable_hash: op.hash_without_chain_id(entry_point),
        sponsor_hash: op.sponsor_hash(entry_point, chain_id),
        nonce_key: nonce.key,
        sequence: nonce.sequence,
        max_cost: op.max_cost(),
    }
}

pub fn nonce_key(
    validator: Option<Address>,
    channel: u32,
    replayable: bool,
    sequence: u64,
) -> Result<NonceOutput> {
    let key = match (validator, replayable) {
        (Some(_), true) => bail!("a replayable nonce cannot select a validator"),
        (Some(validator), false) => validator_nonce_key(validator, channel),
        (None, true) => REPLAYABLE_NONCE_KEY,
        (None, false) => U256::from(channel),
    };
    Ok(NonceOutput {
        key,
        nonce: Nonce::new(key, sequence).to_u256(),
    })
}

pub fn parse_key(raw: &[u8]) -> Result<KeyOutput> {
    let key = parse_public_key(raw).context("invalid passkey public key")?;
    Ok(KeyOutput {
        x: key.x,
        y: key.y,
        owner: Owner::Passkey { key }.encode(),
    })
}

/// ABI encoded assertion, enveloped when an owner index is given.
pub fn encode_signature(
    authenticator_data: &[u8],
    client_data_json: &str,
    der_signature: &[u8],
    owner_index: Option<u8>,
) -> Result<Bytes> {
    let auth = build_assertion(authenticator_data, client_data_json, der_signature)
        .context("failed to build assertion")?;
    let encoded = encode_assertion(&auth);
    Ok(match owner_index {
        Some(index) => SignatureEnvelope::new(index, encoded).encode(),
        None => encoded,
    })
}

pub fn verify_assertion(
    config: &Config,
    challenge: &[u8],
    assertion: &[u8],
    key: &PasskeyKey,
) -> bool {
    let verifier = config.entry_point_config().verifier();
    let valid = verifier.verify_encoded(challenge, assertion, key);
    debug!(
        backend = verifier.backends().active().name(),
        valid, "assertion checked"
    );
    valid
}

/// Runs `op` against a fresh entry point holding only its sender.
pub fn simulate(
    config: &Config,
    op: &PackedUserOperation,
    owners: &[Owner],
    deposit: U256,
    beneficiary: Address,
    base_fee: u128,
    timestamp: u64,
) -> Result<OpReceipt> {
    let mut entry_point = EntryPoint::new(config.entry_point_config());
    entry_point.set_base_fee(base_fee);
    entry_point.set_timestamp(timestamp);
    entry_point.deploy_account(op.sender, owners)?;
    entry_point.deposit_to(op.sender, deposit);
    info!(
        sender = %op.sender,
        chain_id = config.chain_id,
        %deposit,
        "simulating operation"
    );
    entry_point
        .handle_op(op, beneficiary)
        .context("operation failed validation")
}
