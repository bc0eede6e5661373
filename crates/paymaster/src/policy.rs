use alloy_primitives::{Address, U256, map::HashMap};
use serde::{Deserialize, Serialize};

use crate::error::SponsorError;

pub const DEFAULT_PERIOD_SECS: u64 = 86_400;

const fn default_period() -> u64 {
    DEFAULT_PERIOD_SECS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendPolicyConfig {
    /// Maximum sponsored spend per account and period, in wei.
    pub cap: U256,
    #[serde(default = "default_period")]
    pub period: u64,
    /// Key whose signature authorizes sponsorship.
    pub signer: Address,
}

impl SpendPolicyConfig {
    pub const fn new(cap: U256, signer: Address) -> Self {
        Self {
            cap,
            period: DEFAULT_PERIOD_SECS,
            signer,
        }
    }

    pub const fn with_period(mut self, period: u64) -> Self {
        self.period = period;
        self
    }
}

/// Per-account spend within the current period.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpendRecord {
    spent: HashMap<Address, U256>,
    period_start: u64,
}

impl SpendRecord {
    pub fn new(now: u64) -> Self {
        Self {
            spent: HashMap::default(),
            period_start: now,
        }
    }

    pub const fn period_start(&self) -> u64 {
        self.period_start
    }

    pub fn spent(&self, account: Address) -> U256 {
        self.spent.get(&account).copied().unwrap_or_default()
    }

    /// Starts a new period if `now` is past the current one. Periods stay
    /// aligned to the first start.
    pub fn roll(&mut self, now: u64, period: u64) {
        if period == 0 || now < self.period_start.saturating_add(period) {
            return;
        }
        let elapsed = now - self.period_start;
        self.period_start = now - elapsed % period;
        self.spent.clear();
    }

    /// Reserves `max_cost` for `account` if it fits under `cap`.
    pub fn reserve(
        &mut self,
        account: Address,
        max_cost: U256,
        cap: U256,
    ) -> Result<(), SponsorError> {
        let spent = self.spent(account);
        let total = spent.checked_add(max_cost);
        match total {
            Some(total) if total <= cap => {
                self.spent.insert(account, total);
                Ok(())
            }
            _ => Err(SponsorError::SpendingCapExceeded { spent, max_cost, cap }),
        }
    }

    /// Gives back `amount` of an earlier reservation.
    pub fn refund(&mut self, account: Address, amount: U256) {
        if let Some(spent) = self.spent.get_mut(&account) {
            *spent = spent.saturating_sub(amount);
        }
    }
}
