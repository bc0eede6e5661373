use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, FixedBytes, U256, map::HashSet};
use serde::{Deserialize, Serialize};
use smart_account_core::Owner;

use crate::error::AccountError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleType {
    Validator = 1,
    Executor = 2,
    Fallback = 3,
    Hook = 4,
}

impl ModuleType {
    pub const fn id(self) -> u8 {
        self as u8
    }
}

impl TryFrom<U256> for ModuleType {
    type Error = AccountError;

    fn try_from(value: U256) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(1) => Ok(Self::Validator),
            Ok(2) => Ok(Self::Executor),
            Ok(3) => Ok(Self::Fallback),
            Ok(4) => Ok(Self::Hook),
            _ => Err(AccountError::UnsupportedModuleType(value)),
        }
    }
}

impl From<ModuleType> for U256 {
    fn from(value: ModuleType) -> Self {
        Self::from(value.id())
    }
}

/// Everything an account persists. Cloned wholesale to snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    pub(crate) owners: BTreeMap<u64, Owner>,
    pub(crate) members: HashSet<Owner>,
    pub(crate) next_index: u64,
    pub(crate) initialized: bool,
    pub(crate) modules: BTreeSet<(ModuleType, Address)>,
    pub(crate) current_validator: Option<Address>,
    pub(crate) fallbacks: BTreeMap<FixedBytes<4>, Address>,
}

impl AccountState {
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_module_installed(&self, module_type: ModuleType, module: Address) -> bool {
        self.modules.contains(&(module_type, module))
    }

    /// Installed modules of one type, ordered by address.
    pub fn modules_of(&self, module_type: ModuleType) -> impl Iterator<Item = Address> + '_ {
        self.modules
            .iter()
            .filter(move |(ty, _)| *ty == module_type)
            .map(|(_, module)| *module)
    }

    pub const fn current_validator(&self) -> Option<Address> {
        self.current_validator
    }

    pub fn fallback_handler(&self, selector: FixedBytes<4>) -> Option<Address> {
        self.fallbacks.get(&selector).copied()
    }
}
