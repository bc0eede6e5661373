use alloy_primitives::Address;

use crate::{
    account::SmartAccount,
    error::AccountError,
    state::ModuleType,
};

/// Who may invoke a guarded account entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    EntryPoint,
    EntryPointOrSelf,
    OwnerOrSelf,
    InstalledExecutor,
}

impl SmartAccount {
    pub fn is_authorized(&self, caller: Address, capability: Capability) -> bool {
        let is_self = caller == self.address();
        let is_entry_point = caller == self.entry_point();
        match capability {
            Capability::EntryPoint => is_entry_point,
            Capability::EntryPointOrSelf => is_entry_point || is_self,
            Capability::OwnerOrSelf => is_self || self.state().is_owner_address(caller),
            Capability::InstalledExecutor => self
                .state()
                .is_module_installed(ModuleType::Executor, caller),
        }
    }

    pub(crate) fn authorize(
        &self,
        caller: Address,
        capability: Capability,
    ) -> Result<(), AccountError> {
        if self.is_authorized(caller, capability) {
            Ok(())
        } else {
            Err(AccountError::UnauthorizedCaller(caller))
        }
    }
}
