//! Module registry: install, uninstall and lookup.
use alloy_primitives::{Address, FixedBytes, U256};
use alloy_sol_types::SolInterface;
use tracing::info;

use crate::{
    abi::ISmartAccountCalls,
    account::SmartAccount,
    auth::Capability,
    error::{AccountError, AccountResult},
    host::Host,
    state::ModuleType,
};

/// Splits fallback install data into the routed selector and the payload
/// handed to the module.
fn split_fallback_data(data: &[u8]) -> AccountResult<(FixedBytes<4>, &[u8])> {
    if data.len() < 4 {
        return Err(AccountError::InvalidCallData);
    }
    Ok((FixedBytes::from_slice(&data[..4]), &data[4..]))
}

impl SmartAccount {
    pub fn install_module(
        &mut self,
        host: &mut Host,
        caller: Address,
        module_type_id: U256,
        module: Address,
        init_data: &[u8],
    ) -> AccountResult<()> {
        self.authorize(caller, Capability::EntryPointOrSelf)?;
        let module_type = ModuleType::try_from(module_type_id)?;
        let implementation = host
            .module(module)
            .ok_or(AccountError::UnknownModule(module))?;
        if !implementation.is_module_type(module_type) {
            return Err(AccountError::ModuleTypeMismatch {
                module_type,
                module,
            });
        }
        if self.state().is_module_installed(module_type, module) {
            return Err(AccountError::ModuleAlreadyInstalled {
                module_type,
                module,
            });
        }

        let (selector, hook_data) = if module_type == ModuleType::Fallback {
            let (selector, rest) = split_fallback_data(init_data)?;
            if ISmartAccountCalls::valid_selector(selector.0)
                || self.state().fallback_handler(selector).is_some()
            {
                return Err(AccountError::FallbackSelectorTaken(selector));
            }
            (Some(selector), rest)
        } else {
            (None, init_data)
        };

        self.atomically(host, |account, host| {
            let state = account.state_mut();
            state.modules.insert((module_type, module));
            if let Some(selector) = selector {
                state.fallbacks.insert(selector, module);
            }
            implementation
                .on_install(&mut host.world, account.address(), hook_data)
                .map_err(AccountError::ModuleHookFailed)
        })?;

        info!(account = %self.address(), %module, ?module_type, "module installed");
        Ok(())
    }

    pub fn uninstall_module(
        &mut self,
        host: &mut Host,
        caller: Address,
        module_type_id: U256,
        module: Address,
        deinit_data: &[u8],
    ) -> AccountResult<()> {
        self.authorize(caller, Capability::EntryPointOrSelf)?;
        let module_type = ModuleType::try_from(module_type_id)?;
        if !self.state().is_module_installed(module_type, module) {
            return Err(AccountError::ModuleNotInstalled {
                module_type,
                module,
            });
        }
        let implementation = host
            .module(module)
            .ok_or(AccountError::UnknownModule(module))?;

        let (selector, hook_data) = if module_type == ModuleType::Fallback {
            let (selector, rest) = split_fallback_data(deinit_data)?;
            if self.state().fallback_handler(selector) != Some(module) {
                return Err(AccountError::ModuleNotInstalled {
                    module_type,
                    module,
                });
            }
            (Some(selector), rest)
        } else {
            (None, deinit_data)
        };

        self.atomically(host, |account, host| {
            let state = account.state_mut();
            state.modules.remove(&(module_type, module));
            if let Some(selector) = selector {
                state.fallbacks.remove(&selector);
            }
            if state.current_validator == Some(module) {
                state.current_validator = None;
            }
            implementation
                .on_uninstall(&mut host.world, account.address(), hook_data)
                .map_err(AccountError::ModuleHookFailed)
        })?;

        info!(account = %self.address(), %module, ?module_type, "module uninstalled");
        Ok(())
    }

    /// For fallback modules a non-empty `context` narrows the lookup to the
    /// selector it starts with.
    pub fn is_module_installed(
        &self,
        module_type: ModuleType,
        module: Address,
        context: &[u8],
    ) -> bool {
        if !self.state().is_module_installed(module_type, module) {
            return false;
        }
        match (module_type, context.get(..4)) {
            (ModuleType::Fallback, Some(selector)) => {
                self.state().fallback_handler(FixedBytes::from_slice(selector)) == Some(module)
            }
            _ => true,
        }
    }
}
