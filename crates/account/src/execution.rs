//! ERC-7579 style execution: single, batch and delegate calls.
use std::sync::Arc;

use alloy_primitives::{Address, B256, Bytes, U256};
use alloy_sol_types::SolValue;
use smart_account_core::gas;
use tracing::{debug, warn};

use crate::{
    abi::Execution,
    account::SmartAccount,
    auth::Capability,
    error::{AccountError, AccountResult},
    host::{CallContext, Host, Module},
    replay::check_replayable_calls,
    state::ModuleType,
};

pub const CALLTYPE_SINGLE: u8 = 0x00;
pub const CALLTYPE_BATCH: u8 = 0x01;
pub const CALLTYPE_DELEGATE: u8 = 0xff;

pub const EXECTYPE_DEFAULT: u8 = 0x00;
pub const EXECTYPE_TRY: u8 = 0x01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    Single,
    Batch,
    Delegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecType {
    /// Any failure reverts the whole execution.
    Revert,
    /// Failed entries are rolled back and reported, the rest continue.
    Try,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionMode {
    pub call_type: CallType,
    pub exec_type: ExecType,
}

impl ExecutionMode {
    pub const fn new(call_type: CallType, exec_type: ExecType) -> Self {
        Self {
            call_type,
            exec_type,
        }
    }

    pub const fn single() -> Self {
        Self::new(CallType::Single, ExecType::Revert)
    }

    pub const fn batch() -> Self {
        Self::new(CallType::Batch, ExecType::Revert)
    }

    pub const fn try_batch() -> Self {
        Self::new(CallType::Batch, ExecType::Try)
    }

    pub const fn delegate() -> Self {
        Self::new(CallType::Delegate, ExecType::Revert)
    }

    /// Parses the mode word. Unknown call or exec types and non-zero
    /// reserved bytes are rejected.
    pub fn decode(mode: B256) -> AccountResult<Self> {
        let unsupported = || AccountError::UnsupportedExecutionMode(mode);
        let call_type = match mode[0] {
            CALLTYPE_SINGLE => CallType::Single,
            CALLTYPE_BATCH => CallType::Batch,
            CALLTYPE_DELEGATE => CallType::Delegate,
            _ => return Err(unsupported()),
        };
        let exec_type = match mode[1] {
            EXECTYPE_DEFAULT => ExecType::Revert,
            EXECTYPE_TRY => ExecType::Try,
            _ => return Err(unsupported()),
        };
        if mode[2..].iter().any(|b| *b != 0) {
            return Err(unsupported());
        }
        Ok(Self::new(call_type, exec_type))
    }

    pub fn encode(&self) -> B256 {
        let mut word = B256::ZERO;
        word[0] = match self.call_type {
            CallType::Single => CALLTYPE_SINGLE,
            CallType::Batch => CALLTYPE_BATCH,
            CallType::Delegate => CALLTYPE_DELEGATE,
        };
        word[1] = match self.exec_type {
            ExecType::Revert => EXECTYPE_DEFAULT,
            ExecType::Try => EXECTYPE_TRY,
        };
        word
    }
}

/// `target(20) ‖ value(32) ‖ callData`
pub fn encode_single(target: Address, value: U256, call_data: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(52 + call_data.len());
    buf.extend_from_slice(target.as_slice());
    buf.extend_from_slice(&value.to_be_bytes::<32>());
    buf.extend_from_slice(call_data);
    buf.into()
}

pub fn decode_single(data: &[u8]) -> AccountResult<(Address, U256, &[u8])> {
    if data.len() < 52 {
        return Err(AccountError::InvalidCallData);
    }
    Ok((
        Address::from_slice(&data[..20]),
        U256::from_be_slice(&data[20..52]),
        &data[52..],
    ))
}

pub fn encode_batch(executions: &[Execution]) -> Bytes {
    executions.to_vec().abi_encode().into()
}

pub fn decode_batch(data: &[u8]) -> AccountResult<Vec<Execution>> {
    <Vec<Execution> as SolValue>::abi_decode(data).map_err(|_| AccountError::InvalidCallData)
}

/// `target(20) ‖ callData`
pub fn encode_delegate(target: Address, call_data: &[u8]) -> Bytes {
    let mut buf = Vec::with_capacity(20 + call_data.len());
    buf.extend_from_slice(target.as_slice());
    buf.extend_from_slice(call_data);
    buf.into()
}

pub fn decode_delegate(data: &[u8]) -> AccountResult<(Address, &[u8])> {
    if data.len() < 20 {
        return Err(AccountError::InvalidCallData);
    }
    Ok((Address::from_slice(&data[..20]), &data[20..]))
}

/// Outcome of one executed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub return_data: Bytes,
}

impl ExecutionResult {
    pub const fn ok(return_data: Bytes) -> Self {
        Self {
            success: true,
            return_data,
        }
    }

    pub const fn failed(return_data: Bytes) -> Self {
        Self {
            success: false,
            return_data,
        }
    }
}

/// Tracks execution gas against a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasMeter {
    limit: u64,
    used: u64,
}

impl GasMeter {
    pub const fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    pub const fn unlimited() -> Self {
        Self::new(u64::MAX)
    }

    pub fn charge(&mut self, amount: u64) -> AccountResult<()> {
        let needed = self.used.saturating_add(amount);
        if needed > self.limit {
            return Err(AccountError::OutOfGas {
                limit: self.limit,
                needed,
            });
        }
        self.used = needed;
        Ok(())
    }

    pub const fn used(&self) -> u64 {
        self.used
    }

    pub const fn limit(&self) -> u64 {
        self.limit
    }
}

impl SmartAccount {
    /// `execute(mode, data)`, callable by the entry point or the account.
    pub fn execute(
        &mut self,
        host: &mut Host,
        caller: Address,
        mode: B256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> AccountResult<Vec<ExecutionResult>> {
        self.authorize(caller, Capability::EntryPointOrSelf)?;
        self.guarded_execution(host, caller, mode, data, gas)
    }

    /// `executeFromExecutor(mode, data)`, callable by installed executors.
    pub fn execute_from_executor(
        &mut self,
        host: &mut Host,
        caller: Address,
        mode: B256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> AccountResult<Vec<ExecutionResult>> {
        self.authorize(caller, Capability::InstalledExecutor)?;
        self.guarded_execution(host, caller, mode, data, gas)
    }

    /// Replays allow-listed owner management calls on the account itself.
    /// Only the entry point may call this, the nonce key was checked during
    /// validation.
    pub fn execute_without_chain_id_validation(
        &mut self,
        host: &mut Host,
        caller: Address,
        calls: &[Bytes],
        gas: &mut GasMeter,
    ) -> AccountResult<()> {
        self.authorize(caller, Capability::EntryPoint)?;
        check_replayable_calls(calls)?;
        self.atomically(host, |account, host| {
            for call in calls {
                account.call_target(host, account.address(), U256::ZERO, call, gas)?;
            }
            Ok(())
        })
    }

    /// Runs installed hooks around an execution and reverts everything on
    /// failure.
    fn guarded_execution(
        &mut self,
        host: &mut Host,
        caller: Address,
        mode: B256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> AccountResult<Vec<ExecutionResult>> {
        let mode = ExecutionMode::decode(mode)?;
        self.atomically(host, |account, host| {
            let hooks = account.pre_checks(host, caller, data)?;
            let results = account.run(host, mode, data, gas)?;
            for (module, hook_data) in hooks {
                if let Some(hook) = module.as_hook() {
                    hook.post_check(&mut host.world, account.address(), &hook_data)
                        .map_err(AccountError::ModuleHookFailed)?;
                }
            }
            Ok(results)
        })
    }

    fn pre_checks(
        &self,
        host: &mut Host,
        caller: Address,
        data: &[u8],
    ) -> AccountResult<Vec<(Arc<dyn Module>, Bytes)>> {
        let mut hooks = Vec::new();
        let installed: Vec<Address> = self.state().modules_of(ModuleType::Hook).collect();
        for address in installed {
            let Some(module) = host.module(address) else {
                continue;
            };
            let Some(hook) = module.as_hook() else {
                continue;
            };
            let hook_data = hook
                .pre_check(&mut host.world, self.address(), caller, U256::ZERO, data)
                .map_err(AccountError::ModuleHookFailed)?;
            hooks.push((module, hook_data));
        }
        Ok(hooks)
    }

    fn run(
        &mut self,
        host: &mut Host,
        mode: ExecutionMode,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> AccountResult<Vec<ExecutionResult>> {
        match mode.call_type {
            CallType::Single => {
                let (target, value, call_data) = decode_single(data)?;
                let result =
                    self.run_entry(host, mode.exec_type, gas, |account, host, gas| {
                        account.call_target(host, target, value, call_data, gas)
                    })?;
                Ok(vec![result])
            }
            CallType::Batch => {
                let executions = decode_batch(data)?;
                let mut results = Vec::with_capacity(executions.len());
                for (index, execution) in executions.iter().enumerate() {
                    let result =
                        self.run_entry(host, mode.exec_type, gas, |account, host, gas| {
                            account.call_target(
                                host,
                                execution.target,
                                execution.value,
                                &execution.callData,
                                gas,
                            )
                        })?;
                    if !result.success {
                        debug!(index, target = %execution.target, "batch entry failed");
                    }
                    results.push(result);
                }
                Ok(results)
            }
            CallType::Delegate => {
                let (target, call_data) = decode_delegate(data)?;
                let result =
                    self.run_entry(host, mode.exec_type, gas, |account, host, gas| {
                        account.delegate_to(host, target, call_data, gas)
                    })?;
                Ok(vec![result])
            }
        }
    }

    /// Runs one entry. In try mode a failure is rolled back locally and
    /// reported, running out of gas always aborts.
    fn run_entry<F>(
        &mut self,
        host: &mut Host,
        exec_type: ExecType,
        gas: &mut GasMeter,
        f: F,
    ) -> AccountResult<ExecutionResult>
    where
        F: FnOnce(&mut Self, &mut Host, &mut GasMeter) -> AccountResult<Bytes>,
    {
        match exec_type {
            ExecType::Revert => f(self, host, gas).map(ExecutionResult::ok),
            ExecType::Try => {
                let state = self.state().clone();
                let world = host.snapshot();
                match f(self, host, gas) {
                    Ok(data) => Ok(ExecutionResult::ok(data)),
                    Err(err @ AccountError::OutOfGas { .. }) => Err(err),
                    Err(err) => {
                        warn!(error = %err, "try entry reverted");
                        self.restore(state);
                        host.restore(world);
                        Ok(ExecutionResult::failed(err.revert_data()))
                    }
                }
            }
        }
    }

    pub(crate) fn call_target(
        &mut self,
        host: &mut Host,
        target: Address,
        value: U256,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> AccountResult<Bytes> {
        gas.charge(gas::call_gas(data, !value.is_zero()))?;
        if target == self.address() {
            return self.call(host, self.address(), value, data, gas);
        }

        host.world.transfer(self.address(), target, value)?;
        let Some(contract) = host.contract(target) else {
            return Ok(Bytes::new());
        };
        let ctx = CallContext {
            address: target,
            code_address: target,
            caller: self.address(),
            value,
        };
        contract
            .call(&mut host.world, ctx, data)
            .map_err(AccountError::ExecutionFailed)
    }

    fn delegate_to(
        &mut self,
        host: &mut Host,
        target: Address,
        data: &[u8],
        gas: &mut GasMeter,
    ) -> AccountResult<Bytes> {
        gas.charge(gas::call_gas(data, false))?;
        let Some(contract) = host.contract(target) else {
            return Ok(Bytes::new());
        };
        let ctx = CallContext {
            address: self.address(),
            code_address: target,
            caller: self.address(),
            value: U256::ZERO,
        };
        contract
            .call(&mut host.world, ctx, data)
            .map_err(AccountError::ExecutionFailed)
    }
}
