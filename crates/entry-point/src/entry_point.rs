use std::fmt;

use alloy_primitives::{Address, B256, Bytes, U256, map::HashMap};
use serde::Serialize;
use smart_account::{AccountError, GasMeter, Host, SmartAccount, ValidationOutcome, signing_hash};
use smart_account_core::{Owner, PackedUserOperation, gas};
use smart_account_paymaster::{Paymaster, Reservation, SponsorContext};
use tracing::{info, warn};

use crate::{config::EntryPointConfig, error::EntryPointError, metrics::Metrics};

/// Outcome of an operation that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpReceipt {
    pub op_hash: B256,
    pub sender: Address,
    pub nonce: U256,
    pub paymaster: Option<Address>,
    pub success: bool,
    pub actual_gas: u64,
    pub actual_gas_cost: U256,
    /// Revert payload of a failed execution.
    pub revert_reason: Option<Bytes>,
}

/// Ledger state rolled back together with the world.
#[derive(Debug, Clone, Default)]
struct Ledger {
    nonces: HashMap<(Address, U256), u64>,
    deposits: HashMap<Address, U256>,
}

pub struct EntryPoint {
    config: EntryPointConfig,
    host: Host,
    accounts: HashMap<Address, SmartAccount>,
    ledger: Ledger,
    paymasters: HashMap<Address, Box<dyn Paymaster>>,
    metrics: Metrics,
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint")
            .field("config", &self.config)
            .field("accounts", &self.accounts.len())
            .field("paymasters", &self.paymasters.len())
            .finish_non_exhaustive()
    }
}

fn saturating_u64(value: impl TryInto<u64>) -> u64 {
    value.try_into().unwrap_or(u64::MAX)
}

impl EntryPoint {
    pub fn new(config: EntryPointConfig) -> Self {
        Self {
            config,
            host: Host::new(),
            accounts: HashMap::default(),
            ledger: Ledger::default(),
            paymasters: HashMap::default(),
            metrics: Metrics::default(),
        }
    }

    pub const fn config(&self) -> &EntryPointConfig {
        &self.config
    }

    pub const fn address(&self) -> Address {
        self.config.address
    }

    pub const fn host(&self) -> &Host {
        &self.host
    }

    pub const fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    pub const fn set_timestamp(&mut self, timestamp: u64) {
        self.config.timestamp = timestamp;
    }

    pub const fn set_base_fee(&mut self, base_fee: u128) {
        self.config.base_fee = base_fee;
    }

    /// Deploys and initializes an account at `address`.
    pub fn deploy_account(
        &mut self,
        address: Address,
        owners: &[Owner],
    ) -> Result<&SmartAccount, EntryPointError> {
        if self.accounts.contains_key(&address) {
            return Err(EntryPointError::SenderAlreadyConstructed(address));
        }
        let verifier = self.config.verifier();
        let account = SmartAccount::with_owners(address, self.address(), verifier, owners)?;
        info!(account = %address, owners = owners.len(), "account deployed");
        Ok(self.accounts.entry(address).or_insert(account))
    }

    pub fn account(&self, address: Address) -> Option<&SmartAccount> {
        self.accounts.get(&address)
    }

    pub fn register_paymaster(&mut self, paymaster: Box<dyn Paymaster>) {
        self.paymasters.insert(paymaster.address(), paymaster);
    }

    /// Credits `amount` to the deposit of `account`.
    pub fn deposit_to(&mut self, account: Address, amount: U256) {
        self.host.world.credit(self.address(), amount);
        let deposit = self.ledger.deposits.entry(account).or_default();
        *deposit = deposit.saturating_add(amount);
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.ledger.deposits.get(&account).copied().unwrap_or_default()
    }

    /// `key << 64 | sequence` of the next valid nonce.
    pub fn get_nonce(&self, sender: Address, key: U256) -> U256 {
        let sequence = self.ledger.nonces.get(&(sender, key)).copied().unwrap_or_default();
        (key << 64usize) | U256::from(sequence)
    }

    /// The hash owners sign, chain bound unless the operation is replayable.
    pub fn user_op_hash(&self, op: &PackedUserOperation) -> B256 {
        signing_hash(op, self.address(), self.config.chain_id)
    }

    pub fn handle_ops(
        &mut self,
        ops: &[PackedUserOperation],
        beneficiary: Address,
    ) -> Vec<Result<OpReceipt, EntryPointError>> {
        ops.iter().map(|op| self.handle_op(op, beneficiary)).collect()
    }

    /// Validates then executes one operation. Neither a validation failure nor
    /// a reverted execution leaves a trace, including on the nonce. Reverts
    /// are reported in the receipt.
    pub fn handle_op(
        &mut self,
        op: &PackedUserOperation,
        beneficiary: Address,
    ) -> Result<OpReceipt, EntryPointError> {
        let mut account = self
            .accounts
            .remove(&op.sender)
            .ok_or(EntryPointError::AccountNotDeployed(op.sender))?;
        let account_snapshot = account.snapshot();
        let world_snapshot = self.host.snapshot();
        let ledger_snapshot = self.ledger.clone();

        let result = self.process(&mut account, op, beneficiary);
        let rolled_back = match &result {
            Ok(receipt) => !receipt.success,
            Err(_) => {
                self.metrics.ops_rejected.increment(1);
                true
            }
        };
        if rolled_back {
            account.restore(account_snapshot);
            self.host.restore(world_snapshot);
            self.ledger = ledger_snapshot;
        }
        account.finish_operation();
        self.accounts.insert(op.sender, account);
        result
    }

    fn process(
        &mut self,
        account: &mut SmartAccount,
        op: &PackedUserOperation,
        beneficiary: Address,
    ) -> Result<OpReceipt, EntryPointError> {
        if !op.init_code.is_empty() {
            return Err(EntryPointError::SenderAlreadyConstructed(op.sender));
        }
        let sponsor = op.paymaster();
        if let Some(sponsor) = sponsor
            && !self.paymasters.contains_key(&sponsor)
        {
            return Err(EntryPointError::UnknownPaymaster(sponsor));
        }

        let max_cost = op.max_cost();
        let op_hash = self.user_op_hash(op);

        let outcome = self.validate_account(account, op, op_hash, sponsor.is_some(), max_cost)?;
        self.check_nonce(op)?;
        let reservation = match sponsor {
            Some(sponsor) => Some(self.validate_sponsor(sponsor, op, max_cost)?),
            None => None,
        };
        let payer = sponsor.unwrap_or(op.sender);
        let have = self.balance_of(payer);
        if have < max_cost {
            self.release(sponsor, reservation);
            return Err(EntryPointError::InsufficientDeposit {
                payer,
                have,
                need: max_cost,
            });
        }
        self.metrics.ops_validated.increment(1);

        let (gas_used, revert_reason) = self.execute(account, op);
        let success = revert_reason.is_none();
        if !success {
            self.release(sponsor, reservation);
        }

        let verification_gas = outcome.gas()
            + if sponsor.is_some() {
                gas::SPONSOR_VALIDATION_GAS
            } else {
                0
            };
        let actual_gas = saturating_u64(op.pre_verification_gas)
            .saturating_add(verification_gas)
            .saturating_add(gas_used);
        let price = gas::effective_gas_price(
            op.max_fee_per_gas(),
            op.max_priority_fee_per_gas(),
            self.config.base_fee,
        );
        if !success {
            return Ok(OpReceipt {
                op_hash,
                sender: op.sender,
                nonce: op.nonce,
                paymaster: sponsor,
                success,
                actual_gas,
                actual_gas_cost: U256::ZERO,
                revert_reason,
            });
        }
        let actual_gas_cost = U256::from(actual_gas)
            .saturating_mul(U256::from(price))
            .min(max_cost);

        if let (Some(sponsor), Some(reservation)) = (sponsor, reservation)
            && let Some(paymaster) = self.paymasters.get_mut(&sponsor)
        {
            paymaster.settle(reservation.id, actual_gas_cost)?;
        }
        self.charge(payer, beneficiary, actual_gas_cost)?;

        info!(
            sender = %op.sender,
            nonce = %op.nonce,
            success,
            actual_gas,
            %actual_gas_cost,
            "user operation handled"
        );
        Ok(OpReceipt {
            op_hash,
            sender: op.sender,
            nonce: op.nonce,
            paymaster: sponsor,
            success,
            actual_gas,
            actual_gas_cost,
            revert_reason,
        })
    }

    fn validate_account(
        &mut self,
        account: &mut SmartAccount,
        op: &PackedUserOperation,
        op_hash: B256,
        sponsored: bool,
        max_cost: U256,
    ) -> Result<ValidationOutcome, EntryPointError> {
        let missing_funds = if sponsored {
            U256::ZERO
        } else {
            max_cost.saturating_sub(self.balance_of(op.sender))
        };
        let entry_point = self.address();
        let outcome =
            account.validate_user_op(&mut self.host, entry_point, op, op_hash, missing_funds)?;
        if !outcome.is_valid() || !outcome.data.is_within_window(self.config.timestamp) {
            return Err(EntryPointError::InvalidSignature);
        }
        let limit = op.verification_gas_limit();
        if u128::from(outcome.gas()) > limit {
            return Err(EntryPointError::VerificationGasExceeded {
                limit,
                needed: outcome.gas(),
            });
        }
        let deposit = self.ledger.deposits.entry(op.sender).or_default();
        *deposit = deposit.saturating_add(missing_funds);
        Ok(outcome)
    }

    fn check_nonce(&mut self, op: &PackedUserOperation) -> Result<(), EntryPointError> {
        let nonce = op.nonce();
        let stored = self.ledger.nonces.entry((op.sender, nonce.key)).or_default();
        if nonce.sequence != *stored {
            return Err(EntryPointError::InvalidNonce {
                expected: *stored,
                got: nonce.sequence,
            });
        }
        *stored += 1;
        Ok(())
    }

    fn validate_sponsor(
        &mut self,
        sponsor: Address,
        op: &PackedUserOperation,
        max_cost: U256,
    ) -> Result<Reservation, EntryPointError> {
        let limit = op.paymaster_verification_gas_limit();
        if u128::from(gas::SPONSOR_VALIDATION_GAS) > limit {
            return Err(EntryPointError::VerificationGasExceeded {
                limit,
                needed: gas::SPONSOR_VALIDATION_GAS,
            });
        }
        let ctx = SponsorContext {
            entry_point: self.address(),
            chain_id: self.config.chain_id,
            timestamp: self.config.timestamp,
            max_cost,
        };
        let paymaster = self
            .paymasters
            .get_mut(&sponsor)
            .ok_or(EntryPointError::UnknownPaymaster(sponsor))?;
        Ok(paymaster.validate(op, &ctx)?)
    }

    fn release(&mut self, sponsor: Option<Address>, reservation: Option<Reservation>) {
        if let (Some(sponsor), Some(reservation)) = (sponsor, reservation)
            && let Some(paymaster) = self.paymasters.get_mut(&sponsor)
            && let Err(err) = paymaster.release(reservation.id)
        {
            warn!(%sponsor, error = %err, "failed to release sponsorship");
        }
    }

    /// Runs the call payload, returning gas used and the revert payload of a
    /// failed execution.
    fn execute(
        &mut self,
        account: &mut SmartAccount,
        op: &PackedUserOperation,
    ) -> (u64, Option<Bytes>) {
        if op.call_data.is_empty() {
            return (0, None);
        }
        let mut meter = GasMeter::new(saturating_u64(op.call_gas_limit()));
        let entry_point = self.address();
        match account.call(&mut self.host, entry_point, U256::ZERO, &op.call_data, &mut meter) {
            Ok(_) => {
                self.metrics.ops_executed.increment(1);
                (meter.used(), None)
            }
            Err(err) => {
                self.metrics.ops_reverted.increment(1);
                warn!(sender = %op.sender, error = %err, "user operation reverted");
                let used = match err {
                    AccountError::OutOfGas { limit, .. } => limit,
                    _ => meter.used(),
                };
                (used, Some(err.revert_data()))
            }
        }
    }

    /// Pays `amount` from the payer's deposit to the beneficiary.
    fn charge(
        &mut self,
        payer: Address,
        beneficiary: Address,
        amount: U256,
    ) -> Result<(), EntryPointError> {
        let have = self.balance_of(payer);
        if have < amount {
            return Err(EntryPointError::InsufficientDeposit {
                payer,
                have,
                need: amount,
            });
        }
        self.ledger.deposits.insert(payer, have - amount);
        self.host
            .world
            .transfer(self.address(), beneficiary, amount)
            .map_err(EntryPointError::from)
    }
}
