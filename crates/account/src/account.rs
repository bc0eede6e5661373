use alloy_primitives::{Address, B256, Bytes, FixedBytes, U256};
use alloy_sol_types::{SolInterface, SolValue};
use smart_account_core::Owner;
use smart_account_webauthn::WebAuthnVerifier;
use tracing::debug;

use crate::{
    abi::ISmartAccountCalls,
    auth::Capability,
    error::{AccountError, AccountResult},
    execution::GasMeter,
    host::Host,
    state::{AccountState, ModuleType},
};

/// A deployed smart account bound to one entry point.
#[derive(Debug, Clone)]
pub struct SmartAccount {
    address: Address,
    entry_point: Address,
    state: AccountState,
    verifier: WebAuthnVerifier,
}

impl SmartAccount {
    /// Creates an uninitialized account.
    pub fn new(address: Address, entry_point: Address, verifier: WebAuthnVerifier) -> Self {
        Self {
            address,
            entry_point,
            state: AccountState::default(),
            verifier,
        }
    }

    /// Creates and initializes an account in one step.
    pub fn with_owners(
        address: Address,
        entry_point: Address,
        verifier: WebAuthnVerifier,
        owners: &[Owner],
    ) -> AccountResult<Self> {
        let mut account = Self::new(address, entry_point, verifier);
        account.initialize(owners)?;
        Ok(account)
    }

    pub fn initialize(&mut self, owners: &[Owner]) -> AccountResult<()> {
        self.state.initialize(owners)?;
        debug!(account = %self.address, owners = owners.len(), "account initialized");
        Ok(())
    }

    pub const fn address(&self) -> Address {
        self.address
    }

    pub const fn entry_point(&self) -> Address {
        self.entry_point
    }

    pub const fn state(&self) -> &AccountState {
        &self.state
    }

    pub(crate) const fn state_mut(&mut self) -> &mut AccountState {
        &mut self.state
    }

    pub const fn verifier(&self) -> &WebAuthnVerifier {
        &self.verifier
    }

    pub fn snapshot(&self) -> AccountState {
        self.state.clone()
    }

    pub fn restore(&mut self, snapshot: AccountState) {
        self.state = snapshot;
    }

    /// Runs `f` and rolls back both account and world state if it fails.
    pub(crate) fn atomically<T, F>(&mut self, host: &mut Host, f: F) -> AccountResult<T>
    where
        F: FnOnce(&mut Self, &mut Host) -> AccountResult<T>,
    {
        let state = self.snapshot();
        let world = host.snapshot();
        let result = f(self, host);
        if result.is_err() {
            self.restore(state);
            host.restore(world);
        }
        result
    }

    fn ensure_initialized(&self) -> AccountResult<()> {
        if self.state.is_initialized() {
            Ok(())
        } else {
            Err(AccountError::NotInitialized)
        }
    }

    fn owner_guard(&self, caller: Address) -> AccountResult<()> {
        self.ensure_initialized()?;
        self.authorize(caller, Capability::OwnerOrSelf)
    }

    pub fn add_owner_address(&mut self, caller: Address, owner: Address) -> AccountResult<u64> {
        self.owner_guard(caller)?;
        self.state.add_owner_address(owner)
    }

    pub fn add_owner_public_key(
        &mut self,
        caller: Address,
        x: B256,
        y: B256,
    ) -> AccountResult<u64> {
        self.owner_guard(caller)?;
        self.state.add_owner_public_key(x, y)
    }

    pub fn remove_owner_at_index(
        &mut self,
        caller: Address,
        index: u64,
        owner: &[u8],
    ) -> AccountResult<Owner> {
        self.owner_guard(caller)?;
        self.state.remove_owner_at_index_checked(index, owner)
    }

    pub fn remove_last_owner(
        &mut self,
        caller: Address,
        index: u64,
        owner: &[u8],
    ) -> AccountResult<Owner> {
        self.owner_guard(caller)?;
        self.state.remove_last_owner(index, owner)
    }

    /// Entry for a message call into the account. Known selectors go to the
    /// account ABI, anything else to the registered fallback handler.
    pub fn call(
        &mut self,
        host: &mut Host,
        caller: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> AccountResult<Bytes> {
        if data.is_empty() {
            // plain value transfer
            return Ok(Bytes::new());
        }
        let selector = data.get(..4).ok_or(AccountError::InvalidCallData)?;
        let selector = FixedBytes::<4>::from_slice(selector);
        if !ISmartAccountCalls::valid_selector(selector.0) {
            return self.forward_to_fallback(host, caller, value, selector, data);
        }

        let call =
            ISmartAccountCalls::abi_decode(data).map_err(|_| AccountError::InvalidCallData)?;
        let output = match call {
            ISmartAccountCalls::execute(call) => {
                self.execute(host, caller, call.mode, &call.executionCalldata, gas)?;
                Bytes::new()
            }
            ISmartAccountCalls::executeFromExecutor(call) => {
                let results = self.execute_from_executor(
                    host,
                    caller,
                    call.mode,
                    &call.executionCalldata,
                    gas,
                )?;
                let returns: Vec<Bytes> = results.into_iter().map(|r| r.return_data).collect();
                returns.abi_encode().into()
            }
            ISmartAccountCalls::executeWithoutChainIdValidation(call) => {
                self.execute_without_chain_id_validation(host, caller, &call.calls, gas)?;
                Bytes::new()
            }
            ISmartAccountCalls::addOwnerAddress(call) => {
                self.add_owner_address(caller, call.owner)?;
                Bytes::new()
            }
            ISmartAccountCalls::addOwnerPublicKey(call) => {
                self.add_owner_public_key(caller, call.x, call.y)?;
                Bytes::new()
            }
            ISmartAccountCalls::removeOwnerAtIndex(call) => {
                self.remove_owner_at_index(caller, index_arg(call.index), &call.owner)?;
                Bytes::new()
            }
            ISmartAccountCalls::removeLastOwner(call) => {
                self.remove_last_owner(caller, index_arg(call.index), &call.owner)?;
                Bytes::new()
            }
            ISmartAccountCalls::isOwnerAddress(call) => {
                self.state.is_owner_address(call.account).abi_encode().into()
            }
            ISmartAccountCalls::isOwnerBytes(call) => {
                self.state.is_owner_bytes(&call.account).abi_encode().into()
            }
            ISmartAccountCalls::ownerAtIndex(call) => {
                let owner = self
                    .state
                    .owner_at(index_arg(call.index))
                    .map(Owner::encode)
                    .unwrap_or_default();
                owner.abi_encode().into()
            }
            ISmartAccountCalls::nextOwnerIndex(_) => {
                U256::from(self.state.next_index()).abi_encode().into()
            }
            ISmartAccountCalls::ownerCount(_) => {
                U256::from(self.state.owner_count()).abi_encode().into()
            }
            ISmartAccountCalls::installModule(call) => {
                self.install_module(host, caller, call.moduleTypeId, call.module, &call.initData)?;
                Bytes::new()
            }
            ISmartAccountCalls::uninstallModule(call) => {
                self.uninstall_module(
                    host,
                    caller,
                    call.moduleTypeId,
                    call.module,
                    &call.deInitData,
                )?;
                Bytes::new()
            }
            ISmartAccountCalls::isModuleInstalled(call) => {
                let installed = ModuleType::try_from(call.moduleTypeId).is_ok_and(|ty| {
                    self.is_module_installed(ty, call.module, &call.additionalContext)
                });
                installed.abi_encode().into()
            }
            ISmartAccountCalls::isValidSignature(call) => {
                self.is_valid_signature(call.hash, &call.signature).abi_encode().into()
            }
        };
        Ok(output)
    }

    fn forward_to_fallback(
        &mut self,
        host: &mut Host,
        caller: Address,
        value: U256,
        selector: FixedBytes<4>,
        data: &[u8],
    ) -> AccountResult<Bytes> {
        let handler = self
            .state
            .fallback_handler(selector)
            .ok_or(AccountError::UnknownSelector(selector))?;
        let module = host.module(handler).ok_or(AccountError::UnknownModule(handler))?;
        let fallback = module
            .as_fallback()
            .ok_or(AccountError::UnknownSelector(selector))?;
        debug!(%selector, %handler, "forwarding to fallback");
        fallback
            .handle(&mut host.world, self.address, caller, value, data)
            .map_err(AccountError::ExecutionFailed)
    }
}

/// Indices that overflow `u64` can never be assigned.
fn index_arg(index: U256) -> u64 {
    u64::try_from(index).unwrap_or(u64::MAX)
}
