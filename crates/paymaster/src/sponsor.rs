//! Signature-gated sponsorship with a rolling per-account cap.
use std::fmt::Debug;

use alloy_primitives::{Address, B256, Signature, U256, keccak256, map::HashMap};
use alloy_sol_types::SolValue;
use smart_account_core::{PackedUserOperation, user_operation::SPONSOR_DATA_OFFSET};
use tracing::{debug, info};

use crate::{
    error::SponsorError,
    policy::{SpendPolicyConfig, SpendRecord},
};

/// Length of the signed authorization that follows the gas limits.
pub const AUTHORIZATION_LEN: usize = 65;

/// Chain facts a sponsor validates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SponsorContext {
    pub entry_point: Address,
    pub chain_id: u64,
    pub timestamp: u64,
    pub max_cost: U256,
}

/// Funds held back for one operation until it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub id: u64,
    pub sender: Address,
    pub max_cost: U256,
    pub period_start: u64,
}

/// A gas sponsor registered with the entry point.
pub trait Paymaster: Send + Sync + Debug {
    fn address(&self) -> Address;

    /// Authorizes `op` and reserves its maximum cost.
    fn validate(
        &mut self,
        op: &PackedUserOperation,
        ctx: &SponsorContext,
    ) -> Result<Reservation, SponsorError>;

    /// Settles a reservation at `actual_cost`, returns the amount refunded
    /// to the account's allowance.
    fn settle(&mut self, reservation_id: u64, actual_cost: U256) -> Result<U256, SponsorError>;

    /// Drops a reservation for an operation that was rolled back in full.
    fn release(&mut self, reservation_id: u64) -> Result<(), SponsorError>;
}

/// Message the sponsor signer authorizes:
/// `keccak256(abi.encode(sponsorHash, maxCost, chainId, sponsor))`.
pub fn sponsor_digest(
    op: &PackedUserOperation,
    entry_point: Address,
    chain_id: u64,
    max_cost: U256,
    sponsor: Address,
) -> B256 {
    let sponsor_hash = op.sponsor_hash(entry_point, chain_id);
    keccak256((sponsor_hash, max_cost, U256::from(chain_id), sponsor).abi_encode())
}

#[derive(Debug, Clone)]
pub struct SponsorPaymaster {
    address: Address,
    config: SpendPolicyConfig,
    record: SpendRecord,
    reservations: HashMap<u64, Reservation>,
    next_reservation: u64,
}

impl SponsorPaymaster {
    pub fn new(address: Address, config: SpendPolicyConfig) -> Self {
        Self {
            address,
            config,
            record: SpendRecord::default(),
            reservations: HashMap::default(),
            next_reservation: 0,
        }
    }

    pub const fn config(&self) -> &SpendPolicyConfig {
        &self.config
    }

    pub const fn record(&self) -> &SpendRecord {
        &self.record
    }

    pub fn reservation(&self, id: u64) -> Option<&Reservation> {
        self.reservations.get(&id)
    }

    fn authorization<'a>(&self, op: &'a PackedUserOperation) -> Result<&'a [u8], SponsorError> {
        let data = &op.paymaster_and_data;
        if data.len() != SPONSOR_DATA_OFFSET + AUTHORIZATION_LEN
            || op.paymaster() != Some(self.address)
        {
            return Err(SponsorError::InvalidSponsorData);
        }
        Ok(&data[SPONSOR_DATA_OFFSET..])
    }

    fn check_signature(
        &self,
        op: &PackedUserOperation,
        ctx: &SponsorContext,
    ) -> Result<(), SponsorError> {
        let authorization = self.authorization(op)?;
        let digest = sponsor_digest(op, ctx.entry_point, ctx.chain_id, ctx.max_cost, self.address);
        let signer = Signature::from_raw(authorization)
            .ok()
            .and_then(|signature| signature.recover_address_from_prehash(&digest).ok());
        if signer != Some(self.config.signer) {
            debug!(sponsor = %self.address, ?signer, "sponsor signature mismatch");
            return Err(SponsorError::InvalidSponsorSignature);
        }
        Ok(())
    }
}

impl Paymaster for SponsorPaymaster {
    fn address(&self) -> Address {
        self.address
    }

    fn validate(
        &mut self,
        op: &PackedUserOperation,
        ctx: &SponsorContext,
    ) -> Result<Reservation, SponsorError> {
        self.check_signature(op, ctx)?;

        self.record.roll(ctx.timestamp, self.config.period);
        self.record.reserve(op.sender, ctx.max_cost, self.config.cap)?;

        let reservation = Reservation {
            id: self.next_reservation,
            sender: op.sender,
            max_cost: ctx.max_cost,
            period_start: self.record.period_start(),
        };
        self.next_reservation += 1;
        self.reservations.insert(reservation.id, reservation);
        info!(
            sponsor = %self.address,
            sender = %op.sender,
            max_cost = %ctx.max_cost,
            spent = %self.record.spent(op.sender),
            "sponsorship reserved"
        );
        Ok(reservation)
    }

    fn settle(&mut self, reservation_id: u64, actual_cost: U256) -> Result<U256, SponsorError> {
        let reservation = self
            .reservations
            .remove(&reservation_id)
            .ok_or(SponsorError::UnknownReservation(reservation_id))?;
        let refund = reservation.max_cost.saturating_sub(actual_cost);
        // a rollover since validation already cleared the reservation
        if reservation.period_start == self.record.period_start() {
            self.record.refund(reservation.sender, refund);
        }
        info!(
            sponsor = %self.address,
            sender = %reservation.sender,
            %actual_cost,
            %refund,
            "sponsorship settled"
        );
        Ok(refund)
    }

    fn release(&mut self, reservation_id: u64) -> Result<(), SponsorError> {
        let reservation = self
            .reservations
            .remove(&reservation_id)
            .ok_or(SponsorError::UnknownReservation(reservation_id))?;
        if reservation.period_start == self.record.period_start() {
            self.record.refund(reservation.sender, reservation.max_cost);
        }
        debug!(sponsor = %self.address, sender = %reservation.sender, "sponsorship released");
        Ok(())
    }
}
