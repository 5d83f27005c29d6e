//! Call and create semantics around the interpreter.
//!
//! The `Evm` owns the dispatch tables, the precompile set and the shared
//! code analysis cache, and borrows the world state for the duration of one
//! transaction. Sub-calls snapshot the state and revert it when the child
//! frame reverts or faults; faults consume the child's remaining gas, a
//! revert hands it back.

use crate::analysis::{keccak256, AnalysisCache, CodeBitmap};
use crate::context::{BlockContext, ChainRules, EvmConfig, TxContext};
use crate::eof::Container;
use crate::errors::VmError;
use crate::frame::Frame;
use crate::gas;
use crate::interpreter::FrameResult;
use crate::jump_table::{self, JumpTable};
use crate::precompile::{run_precompile, Precompiles};
use crate::state::StateDB;
use alloy_primitives::{Address, Bytes, B256, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub const CALL_CREATE_DEPTH: usize = 1024;

#[derive(Debug, Clone)]
pub struct CallResult {
    pub success: bool,
    pub gas_left: u64,
    pub output: Bytes,
}

impl CallResult {
    fn failed(gas_left: u64) -> Self {
        Self { success: false, gas_left, output: Bytes::new() }
    }

    fn succeeded(gas_left: u64, output: Bytes) -> Self {
        Self { success: true, gas_left, output }
    }
}

#[derive(Debug, Clone)]
pub struct CreateResult {
    /// Deployed address on success, `None` on any failure.
    pub address: Option<Address>,
    pub gas_left: u64,
    /// Revert payload; empty for every other outcome.
    pub output: Bytes,
}

impl CreateResult {
    fn failed(gas_left: u64) -> Self {
        Self { address: None, gas_left, output: Bytes::new() }
    }
}

/// One EVM instance executes one transaction's worth of calls against a
/// borrowed `StateDB`.
pub struct Evm<'a> {
    pub state: &'a mut dyn StateDB,
    pub block: BlockContext,
    pub tx: TxContext,
    pub rules: ChainRules,
    pub config: EvmConfig,
    pub(crate) table: JumpTable,
    pub(crate) eof_table: JumpTable,
    pub precompiles: Precompiles,
    analysis: Arc<AnalysisCache>,
    pub(crate) depth: usize,
    pub(crate) abort: Arc<AtomicBool>,
    /// Gas forwarded to the pending sub-call, set by the call-family
    /// dynamic gas functions and consumed by the handlers.
    pub(crate) call_gas_temp: u64,
}

impl<'a> Evm<'a> {
    pub fn new(
        state: &'a mut dyn StateDB,
        block: BlockContext,
        tx: TxContext,
        rules: ChainRules,
        config: EvmConfig,
    ) -> Self {
        Self {
            state,
            block,
            tx,
            rules,
            config,
            table: jump_table::table_for(&rules),
            eof_table: jump_table::eof(),
            precompiles: Precompiles::standard(),
            analysis: Arc::new(AnalysisCache::new()),
            depth: 0,
            abort: Arc::new(AtomicBool::new(false)),
            call_gas_temp: 0,
        }
    }

    /// Flag checked once per instruction; setting it stops execution at the
    /// next iteration without consuming further gas.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn cancel(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    // ── Calls ──────────────────────────────────────────────────────────────

    /// Plain CALL: run `to`'s code in `to`'s context, transferring `value`.
    pub fn call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
        value: U256,
        read_only: bool,
    ) -> CallResult {
        if self.depth >= CALL_CREATE_DEPTH {
            return CallResult::failed(gas);
        }
        if !value.is_zero() && self.state.get_balance(caller) < value {
            return CallResult::failed(gas);
        }
        let snapshot = self.state.snapshot();
        if !self.state.exist(to) {
            if !self.precompiles.contains(&to) && self.rules.is_eip158 && value.is_zero() {
                // Calling a nonexistent account with no value changes
                // nothing; don't instantiate an empty account.
                return CallResult::succeeded(gas, Bytes::new());
            }
            self.state.create_account(to);
        }
        if !value.is_zero() {
            self.state.sub_balance(caller, value);
            self.state.add_balance(to, value);
        }
        self.run_call_target(caller, to, to, input, gas, value, read_only, snapshot)
    }

    /// CALLCODE: run `code_addr`'s code in the caller's own context.
    pub fn call_code(
        &mut self,
        context: Address,
        code_addr: Address,
        input: Bytes,
        gas: u64,
        value: U256,
        read_only: bool,
    ) -> CallResult {
        if self.depth >= CALL_CREATE_DEPTH {
            return CallResult::failed(gas);
        }
        // Value moves from the account to itself, so only the balance
        // check is observable.
        if !value.is_zero() && self.state.get_balance(context) < value {
            return CallResult::failed(gas);
        }
        let snapshot = self.state.snapshot();
        self.run_call_target(context, context, code_addr, input, gas, value, read_only, snapshot)
    }

    /// DELEGATECALL: run `code_addr`'s code in the current context, keeping
    /// the parent's caller and value.
    pub fn delegate_call(
        &mut self,
        caller: Address,
        context: Address,
        code_addr: Address,
        value: U256,
        input: Bytes,
        gas: u64,
        read_only: bool,
    ) -> CallResult {
        if self.depth >= CALL_CREATE_DEPTH {
            return CallResult::failed(gas);
        }
        let snapshot = self.state.snapshot();
        self.run_call_target(caller, context, code_addr, input, gas, value, read_only, snapshot)
    }

    /// STATICCALL: like CALL with zero value, with all writes forbidden in
    /// the child and below.
    pub fn static_call(
        &mut self,
        caller: Address,
        to: Address,
        input: Bytes,
        gas: u64,
    ) -> CallResult {
        if self.depth >= CALL_CREATE_DEPTH {
            return CallResult::failed(gas);
        }
        let snapshot = self.state.snapshot();
        self.run_call_target(caller, to, to, input, gas, U256::ZERO, true, snapshot)
    }

    /// Run a validated container directly. The caller is responsible for
    /// having passed it through `eof::validation` first.
    pub fn call_container(
        &mut self,
        caller: Address,
        address: Address,
        container: Arc<Container>,
        input: Bytes,
        gas: u64,
        value: U256,
    ) -> CallResult {
        if self.depth >= CALL_CREATE_DEPTH {
            return CallResult::failed(gas);
        }
        if !value.is_zero() && self.state.get_balance(caller) < value {
            return CallResult::failed(gas);
        }
        let snapshot = self.state.snapshot();
        if !value.is_zero() {
            self.state.sub_balance(caller, value);
            self.state.add_balance(address, value);
        }
        let frame = Frame {
            address,
            caller,
            code_address: address,
            code: Bytes::new(),
            code_hash: B256::ZERO,
            container: Some(container),
            bitmap: None,
            input,
            value,
            gas,
            gas_limit: gas,
            read_only: false,
            is_create: false,
        };
        self.finish_call(frame, snapshot)
    }

    #[allow(clippy::too_many_arguments)]
    fn run_call_target(
        &mut self,
        caller: Address,
        address: Address,
        code_addr: Address,
        input: Bytes,
        gas: u64,
        value: U256,
        read_only: bool,
        snapshot: usize,
    ) -> CallResult {
        if let Some(p) = self.precompiles.get(&code_addr) {
            return match run_precompile(p, &input, gas) {
                Ok((output, gas_left)) => CallResult::succeeded(gas_left, output),
                Err(_) => {
                    self.state.revert_to_snapshot(snapshot);
                    CallResult::failed(0)
                }
            };
        }
        let code = self.state.get_code(code_addr);
        if code.is_empty() {
            return CallResult::succeeded(gas, Bytes::new());
        }
        let code_hash = self.state.get_code_hash(code_addr);
        let bitmap = self.analysis.bitmap(code_hash, &code);
        let frame = Frame {
            address,
            caller,
            code_address: code_addr,
            code,
            code_hash,
            container: None,
            bitmap: Some(bitmap),
            input,
            value,
            gas,
            gas_limit: gas,
            read_only,
            is_create: false,
        };
        self.finish_call(frame, snapshot)
    }

    fn finish_call(&mut self, mut frame: Frame, snapshot: usize) -> CallResult {
        trace!(depth = self.depth, to = %frame.address, gas = frame.gas, "call enter");
        self.depth += 1;
        let result = self.run_frame(&mut frame);
        self.depth -= 1;
        match result {
            Ok(FrameResult { exit, output }) if !matches!(exit, crate::interpreter::Exit::Revert) => {
                trace!(depth = self.depth, gas_left = frame.gas, ?exit, "call exit");
                CallResult::succeeded(frame.gas, output)
            }
            Ok(FrameResult { output, .. }) => {
                trace!(depth = self.depth, gas_left = frame.gas, "call reverted");
                self.state.revert_to_snapshot(snapshot);
                CallResult { success: false, gas_left: frame.gas, output }
            }
            Err(err) => {
                debug!(depth = self.depth, %err, "call faulted");
                self.state.revert_to_snapshot(snapshot);
                // run_frame zeroed the gas for every fault except an abort.
                CallResult::failed(frame.gas)
            }
        }
    }

    // ── Creates ────────────────────────────────────────────────────────────

    /// CREATE: address derived from the caller and its nonce.
    pub fn create(
        &mut self,
        caller: Address,
        value: U256,
        initcode: Bytes,
        gas: u64,
    ) -> CreateResult {
        let nonce = self.state.get_nonce(caller);
        let address = create_address(caller, nonce);
        self.create_inner(caller, value, initcode, gas, address)
    }

    /// CREATE2: address derived from the caller, salt and initcode hash.
    pub fn create2(
        &mut self,
        caller: Address,
        value: U256,
        initcode: Bytes,
        salt: U256,
        gas: u64,
    ) -> CreateResult {
        let address = create2_address(caller, salt, &initcode);
        self.create_inner(caller, value, initcode, gas, address)
    }

    fn create_inner(
        &mut self,
        caller: Address,
        value: U256,
        initcode: Bytes,
        gas: u64,
        address: Address,
    ) -> CreateResult {
        if self.depth >= CALL_CREATE_DEPTH {
            return CreateResult::failed(gas);
        }
        if self.rules.is_shanghai && initcode.len() > gas::MAX_INITCODE_SIZE {
            return CreateResult::failed(gas);
        }
        if !value.is_zero() && self.state.get_balance(caller) < value {
            return CreateResult::failed(gas);
        }
        let nonce = self.state.get_nonce(caller);
        if nonce == u64::MAX {
            return CreateResult::failed(gas);
        }
        self.state.set_nonce(caller, nonce + 1);
        if self.rules.is_berlin {
            self.state.access_address(address);
        }

        // Address already carries a nonce or code: the create burns all
        // forwarded gas.
        if self.state.get_nonce(address) != 0 || self.state.get_code_size(address) != 0 {
            debug!(%address, "create collision");
            return CreateResult::failed(0);
        }

        let snapshot = self.state.snapshot();
        self.state.create_account(address);
        if self.rules.is_eip158 {
            self.state.set_nonce(address, 1);
        }
        if !value.is_zero() {
            self.state.sub_balance(caller, value);
            self.state.add_balance(address, value);
        }

        let code_hash = keccak256(&initcode);
        let bitmap = Arc::new(CodeBitmap::legacy(&initcode));
        let mut frame = Frame {
            address,
            caller,
            code_address: address,
            code: initcode,
            code_hash,
            container: None,
            bitmap: Some(bitmap),
            input: Bytes::new(),
            value,
            gas,
            gas_limit: gas,
            read_only: false,
            is_create: true,
        };

        trace!(depth = self.depth, %address, gas, "create enter");
        self.depth += 1;
        let result = self.run_frame(&mut frame);
        self.depth -= 1;

        match result {
            Ok(res) if res.reverted() => {
                self.state.revert_to_snapshot(snapshot);
                CreateResult { address: None, gas_left: frame.gas, output: res.output }
            }
            Ok(res) => match self.deposit_code(&mut frame, res.output) {
                Ok(()) => CreateResult { address: Some(address), gas_left: frame.gas, output: Bytes::new() },
                Err(err) => {
                    debug!(%address, %err, "code deposit failed");
                    self.state.revert_to_snapshot(snapshot);
                    if err.consumes_all_gas() {
                        frame.gas = 0;
                    }
                    CreateResult::failed(frame.gas)
                }
            },
            Err(err) => {
                debug!(depth = self.depth, %err, "create faulted");
                self.state.revert_to_snapshot(snapshot);
                CreateResult::failed(frame.gas)
            }
        }
    }

    /// Store the returned runtime code, applying the deposit charge and the
    /// deploy-time code rules.
    fn deposit_code(&mut self, frame: &mut Frame, code: Bytes) -> Result<(), VmError> {
        if self.rules.is_eip158 && code.len() > gas::MAX_CODE_SIZE {
            return Err(VmError::MaxCodeSizeExceeded);
        }
        if self.rules.is_london && !code.is_empty() && code[0] == 0xEF {
            return Err(VmError::InvalidCode);
        }
        let deposit = code.len() as u64 * gas::CREATE_DATA_GAS;
        if !frame.use_gas(deposit) {
            if self.rules.is_homestead {
                return Err(VmError::CodeStoreOutOfGas);
            }
            // Frontier quirk: the deposit silently fails, the create
            // still succeeds with no code stored.
            return Ok(());
        }
        self.state.set_code(frame.address, code);
        Ok(())
    }
}

/// Contract address for CREATE: last 20 bytes of keccak(rlp([sender, nonce])).
pub fn create_address(caller: Address, nonce: u64) -> Address {
    let mut stream = rlp::RlpStream::new_list(2);
    stream.append(&caller.as_slice().to_vec());
    stream.append(&nonce);
    let hash = keccak256(&stream.out());
    Address::from_slice(&hash[12..])
}

/// Contract address for CREATE2:
/// last 20 bytes of keccak(0xff ++ sender ++ salt ++ keccak(initcode)).
pub fn create2_address(caller: Address, salt: U256, initcode: &[u8]) -> Address {
    let mut buf = Vec::with_capacity(1 + 20 + 32 + 32);
    buf.push(0xFF);
    buf.extend_from_slice(caller.as_slice());
    buf.extend_from_slice(&salt.to_be_bytes::<32>());
    buf.extend_from_slice(keccak256(initcode).as_slice());
    let hash = keccak256(&buf);
    Address::from_slice(&hash[12..])
}
