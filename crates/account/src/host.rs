//! In-memory world the account executes against.
use std::{fmt::Debug, sync::Arc};

use alloy_primitives::{Address, B256, Bytes, U256, map::HashMap};
use smart_account_core::{PackedUserOperation, ValidationData};

use crate::{error::AccountError, state::ModuleType};

/// Balances and contract storage. Cloned to snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorldState {
    balances: HashMap<Address, U256>,
    storage: HashMap<Address, HashMap<B256, B256>>,
}

impl WorldState {
    pub fn balance(&self, address: Address) -> U256 {
        self.balances.get(&address).copied().unwrap_or_default()
    }

    pub fn set_balance(&mut self, address: Address, balance: U256) {
        self.balances.insert(address, balance);
    }

    pub fn credit(&mut self, address: Address, amount: U256) {
        let balance = self.balance(address).saturating_add(amount);
        self.set_balance(address, balance);
    }

    pub fn debit(&mut self, address: Address, amount: U256) -> Result<(), AccountError> {
        let have = self.balance(address);
        if have < amount {
            return Err(AccountError::InsufficientBalance { have, need: amount });
        }
        self.set_balance(address, have - amount);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), AccountError> {
        if amount.is_zero() || from == to {
            return Ok(());
        }
        self.debit(from, amount)?;
        self.credit(to, amount);
        Ok(())
    }

    pub fn sload(&self, address: Address, slot: B256) -> B256 {
        self.storage
            .get(&address)
            .and_then(|slots| slots.get(&slot))
            .copied()
            .unwrap_or_default()
    }

    pub fn sstore(&mut self, address: Address, slot: B256, value: B256) {
        self.storage.entry(address).or_default().insert(slot, value);
    }
}

/// Who is calling and in which storage context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// Storage the code operates on; the account itself for delegate calls.
    pub address: Address,
    pub code_address: Address,
    pub caller: Address,
    pub value: U256,
}

impl CallContext {
    pub fn is_delegate(&self) -> bool {
        self.address != self.code_address
    }
}

/// Code deployed at an address. Failures carry the raw revert payload.
pub trait Contract: Send + Sync + Debug {
    fn call(&self, world: &mut WorldState, ctx: CallContext, data: &[u8]) -> Result<Bytes, Bytes>;
}

pub trait Validator: Send + Sync {
    fn validate_user_op(
        &self,
        world: &WorldState,
        account: Address,
        op: &PackedUserOperation,
        op_hash: B256,
    ) -> ValidationData;
}

pub trait Hook: Send + Sync {
    /// Runs before an execution, the returned bytes are passed to
    /// [`Hook::post_check`].
    fn pre_check(
        &self,
        world: &mut WorldState,
        account: Address,
        sender: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Bytes, Bytes>;

    fn post_check(
        &self,
        world: &mut WorldState,
        account: Address,
        hook_data: &[u8],
    ) -> Result<(), Bytes>;
}

pub trait Fallback: Send + Sync {
    fn handle(
        &self,
        world: &mut WorldState,
        account: Address,
        sender: Address,
        value: U256,
        data: &[u8],
    ) -> Result<Bytes, Bytes>;
}

/// An extension module. Module state lives in [`WorldState`] storage keyed by
/// the module address, so snapshots cover it.
pub trait Module: Send + Sync + Debug {
    fn is_module_type(&self, module_type: ModuleType) -> bool;

    fn on_install(&self, world: &mut WorldState, account: Address, data: &[u8])
    -> Result<(), Bytes>;

    fn on_uninstall(
        &self,
        world: &mut WorldState,
        account: Address,
        data: &[u8],
    ) -> Result<(), Bytes>;

    fn as_validator(&self) -> Option<&dyn Validator> {
        None
    }

    fn as_hook(&self) -> Option<&dyn Hook> {
        None
    }

    fn as_fallback(&self) -> Option<&dyn Fallback> {
        None
    }
}

/// World state plus the code and modules deployed into it.
#[derive(Debug, Clone, Default)]
pub struct Host {
    pub world: WorldState,
    contracts: HashMap<Address, Arc<dyn Contract>>,
    modules: HashMap<Address, Arc<dyn Module>>,
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy_contract(&mut self, address: Address, contract: Arc<dyn Contract>) {
        self.contracts.insert(address, contract);
    }

    pub fn deploy_module(&mut self, address: Address, module: Arc<dyn Module>) {
        self.modules.insert(address, module);
    }

    pub fn contract(&self, address: Address) -> Option<Arc<dyn Contract>> {
        self.contracts.get(&address).cloned()
    }

    pub fn module(&self, address: Address) -> Option<Arc<dyn Module>> {
        self.modules.get(&address).cloned()
    }

    pub fn snapshot(&self) -> WorldState {
        self.world.clone()
    }

    pub fn restore(&mut self, snapshot: WorldState) {
        self.world = snapshot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn transfer_moves_value() {
        let a = address!("000000000000000000000000000000000000000a");
        let b = address!("000000000000000000000000000000000000000b");
        let mut world = WorldState::default();
        world.set_balance(a, U256::from(10));

        world.transfer(a, b, U256::from(4)).unwrap();
        assert_eq!(world.balance(a), U256::from(6));
        assert_eq!(world.balance(b), U256::from(4));
        assert_eq!(
            world.transfer(a, b, U256::from(7)),
            Err(AccountError::InsufficientBalance {
                have: U256::from(6),
                need: U256::from(7),
            })
        );
    }

    #[test]
    fn restore_discards_writes() {
        let a = address!("000000000000000000000000000000000000000a");
        let mut host = Host::new();
        let snapshot = host.snapshot();
        host.world.sstore(a, B256::ZERO, B256::repeat_byte(1));
        assert_eq!(host.world.sload(a, B256::ZERO), B256::repeat_byte(1));
        host.restore(snapshot);
        assert_eq!(host.world.sload(a, B256::ZERO), B256::ZERO);
    }
}
