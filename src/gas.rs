//! Gas schedule: static cost tiers and the dynamic cost functions.
//!
//! Costs follow the Ethereum schedules through the fork lineage in
//! `context::ChainRules`. Dynamic functions are charged strictly before the
//! corresponding state mutation or memory growth; memory expansion is
//! charged on resize only, deduplicated through `Memory::last_gas_cost`.

use crate::errors::VmError;
use crate::evm::Evm;
use crate::frame::Frame;
use crate::interpreter::Scope;
use crate::memory::Memory;
use crate::stack::Stack;
use crate::word;
use alloy_primitives::{Address, U256};

// ── Static tiers ───────────────────────────────────────────────────────────
pub const GAS_QUICK: u64 = 2; //   ADDRESS, CALLER, PC, ...
pub const GAS_FASTEST: u64 = 3; // ADD, SUB, comparisons, MLOAD, PUSH, ...
pub const GAS_FAST: u64 = 5; //    MUL, DIV, MOD, SIGNEXTEND
pub const GAS_MID: u64 = 8; //     ADDMOD, MULMOD, JUMP
pub const GAS_SLOW: u64 = 10; //   JUMPI
pub const GAS_EXT: u64 = 20; //    BALANCE/EXTCODESIZE before EIP-150

pub const JUMPDEST_GAS: u64 = 1;

// ── Memory ─────────────────────────────────────────────────────────────────
pub const MEMORY_GAS: u64 = 3;
pub const QUAD_COEFF_DIV: u64 = 512;
// Largest memory size whose gas cost still fits a u64.
const MAX_MEMORY_SIZE: u64 = 0x1FFFFFFFE0;

// ── Hashing / copying / logging ────────────────────────────────────────────
pub const KECCAK256_GAS: u64 = 30;
pub const KECCAK256_WORD_GAS: u64 = 6;
pub const COPY_GAS: u64 = 3;
pub const LOG_GAS: u64 = 375;
pub const LOG_TOPIC_GAS: u64 = 375;
pub const LOG_DATA_GAS: u64 = 8;

// ── EXP ────────────────────────────────────────────────────────────────────
pub const EXP_GAS: u64 = 10;
pub const EXP_BYTE_FRONTIER: u64 = 10;
pub const EXP_BYTE_EIP158: u64 = 50;

// ── State access (pre-Berlin constants live in the jump tables) ────────────
pub const SLOAD_GAS_FRONTIER: u64 = 50;
pub const SLOAD_GAS_EIP150: u64 = 200;
pub const SLOAD_GAS_EIP1884: u64 = 800;
pub const BALANCE_GAS_FRONTIER: u64 = 20;
pub const BALANCE_GAS_EIP150: u64 = 400;
pub const BALANCE_GAS_EIP1884: u64 = 700;
pub const EXTCODE_GAS_EIP150: u64 = 700;
pub const EXTCODEHASH_GAS_CONSTANTINOPLE: u64 = 400;
pub const EXTCODEHASH_GAS_EIP1884: u64 = 700;

// ── EIP-2929 warm/cold ─────────────────────────────────────────────────────
pub const COLD_ACCOUNT_ACCESS_GAS: u64 = 2600;
pub const COLD_SLOAD_GAS: u64 = 2100;
pub const WARM_ACCESS_GAS: u64 = 100;

// ── SSTORE ─────────────────────────────────────────────────────────────────
pub const SSTORE_SET_GAS: u64 = 20_000;
pub const SSTORE_RESET_GAS: u64 = 5_000;
pub const SSTORE_CLEAR_REFUND_LEGACY: u64 = 15_000;
pub const SSTORE_CLEAR_REFUND_EIP3529: u64 = 4_800;
pub const SSTORE_SENTRY_GAS: u64 = 2_300;
pub const SLOAD_GAS_EIP2200: u64 = 800;

// ── Transient storage ──────────────────────────────────────────────────────
pub const TRANSIENT_STORAGE_GAS: u64 = 100;

// ── Calls ──────────────────────────────────────────────────────────────────
pub const CALL_GAS_FRONTIER: u64 = 40;
pub const CALL_GAS_EIP150: u64 = 700;
pub const CALL_VALUE_TRANSFER_GAS: u64 = 9_000;
pub const CALL_NEW_ACCOUNT_GAS: u64 = 25_000;
pub const CALL_STIPEND: u64 = 2_300;

// ── Create / code deposit ──────────────────────────────────────────────────
pub const CREATE_GAS: u64 = 32_000;
pub const CREATE_DATA_GAS: u64 = 200;
pub const INITCODE_WORD_GAS: u64 = 2;
pub const MAX_CODE_SIZE: usize = 24_576;
pub const MAX_INITCODE_SIZE: usize = 2 * MAX_CODE_SIZE;

// ── Selfdestruct ───────────────────────────────────────────────────────────
pub const SELFDESTRUCT_GAS_EIP150: u64 = 5_000;
pub const SELFDESTRUCT_REFUND: u64 = 24_000;

// ── EOF control flow ───────────────────────────────────────────────────────
pub const RJUMP_GAS: u64 = 2;
pub const RJUMPI_GAS: u64 = 4;
pub const RJUMPV_GAS: u64 = 4;
pub const CALLF_GAS: u64 = 5;
pub const RETF_GAS: u64 = 3;
pub const JUMPF_GAS: u64 = 5;

pub type MemorySizeFn = fn(&Stack) -> Result<u64, VmError>;
pub type DynamicGasFn = fn(&mut Evm<'_>, &mut Frame, &mut Scope, u64) -> Result<u64, VmError>;

/// Number of 32-byte words needed to hold `size` bytes.
pub fn to_word_size(size: u64) -> u64 {
    size.div_ceil(32)
}

/// Quadratic memory expansion fee: `3*words + words²/512`, charged as the
/// delta over what this frame has already paid. Charging the same size
/// twice charges zero the second time.
pub fn memory_gas_cost(mem: &mut Memory, new_size: u64) -> Result<u64, VmError> {
    if new_size == 0 {
        return Ok(0);
    }
    if new_size > MAX_MEMORY_SIZE {
        return Err(VmError::GasUintOverflow);
    }
    let words = to_word_size(new_size);
    let total = MEMORY_GAS * words + words * words / QUAD_COEFF_DIV;
    if total > mem.last_gas_cost {
        let fee = total - mem.last_gas_cost;
        mem.last_gas_cost = total;
        return Ok(fee);
    }
    Ok(0)
}

/// EIP-150 gas forwarding: the caller keeps at least 1/64th of what it has
/// left after the call's base costs.
pub fn call_gas(
    is_eip150: bool,
    available_gas: u64,
    base: u64,
    requested: U256,
) -> Result<u64, VmError> {
    if is_eip150 {
        let available = available_gas.saturating_sub(base);
        let gas = available - available / 64;
        if word::as_u64_checked(requested).map_or(true, |req| req > gas) {
            return Ok(gas);
        }
    }
    word::as_u64_checked(requested).ok_or(VmError::GasUintOverflow)
}

// ── Memory size functions (bytes required; the loop word-aligns) ───────────

fn calc_mem_size(offset: U256, length: U256) -> Result<u64, VmError> {
    if length.is_zero() {
        return Ok(0);
    }
    let offset = word::as_u64_checked(offset).ok_or(VmError::GasUintOverflow)?;
    let length = word::as_u64_checked(length).ok_or(VmError::GasUintOverflow)?;
    offset.checked_add(length).ok_or(VmError::GasUintOverflow)
}

pub fn mem_keccak256(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(0)?, stack.peek(1)?)
}

pub fn mem_calldata_copy(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(0)?, stack.peek(2)?)
}

pub fn mem_ext_codecopy(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(1)?, stack.peek(3)?)
}

pub fn mem_mload(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(0)?, U256::from(32))
}

pub fn mem_mstore8(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(0)?, U256::from(1))
}

pub fn mem_mcopy(stack: &Stack) -> Result<u64, VmError> {
    let dst = calc_mem_size(stack.peek(0)?, stack.peek(2)?)?;
    let src = calc_mem_size(stack.peek(1)?, stack.peek(2)?)?;
    Ok(dst.max(src))
}

pub fn mem_create(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(1)?, stack.peek(2)?)
}

pub fn mem_call(stack: &Stack) -> Result<u64, VmError> {
    let args = calc_mem_size(stack.peek(3)?, stack.peek(4)?)?;
    let ret = calc_mem_size(stack.peek(5)?, stack.peek(6)?)?;
    Ok(args.max(ret))
}

pub fn mem_delegate_call(stack: &Stack) -> Result<u64, VmError> {
    let args = calc_mem_size(stack.peek(2)?, stack.peek(3)?)?;
    let ret = calc_mem_size(stack.peek(4)?, stack.peek(5)?)?;
    Ok(args.max(ret))
}

pub fn mem_return(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(0)?, stack.peek(1)?)
}

pub fn mem_log(stack: &Stack) -> Result<u64, VmError> {
    calc_mem_size(stack.peek(0)?, stack.peek(1)?)
}

// ── Dynamic gas functions ──────────────────────────────────────────────────

pub fn pure_memory_gas(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    memory_gas_cost(&mut scope.memory, memory_size)
}

pub fn gas_keccak256(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    let len = word::as_u64_checked(scope.stack.peek(1)?).ok_or(VmError::GasUintOverflow)?;
    let word_gas = to_word_size(len)
        .checked_mul(KECCAK256_WORD_GAS)
        .ok_or(VmError::GasUintOverflow)?;
    gas = gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)?;
    Ok(gas)
}

/// CALLDATACOPY/CODECOPY/RETURNDATACOPY: memory expansion plus 3 gas per
/// copied word. The length sits at stack depth 2.
pub fn gas_copy(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    copier_gas(scope, memory_size, 2)
}

fn copier_gas(scope: &mut Scope, memory_size: u64, len_pos: usize) -> Result<u64, VmError> {
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    let len = word::as_u64_checked(scope.stack.peek(len_pos)?).ok_or(VmError::GasUintOverflow)?;
    let word_gas = to_word_size(len).checked_mul(COPY_GAS).ok_or(VmError::GasUintOverflow)?;
    gas = gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)?;
    Ok(gas)
}

pub fn gas_mcopy(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    copier_gas(scope, memory_size, 2)
}

pub fn gas_ext_codecopy(
    evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    let len = word::as_u64_checked(scope.stack.peek(3)?).ok_or(VmError::GasUintOverflow)?;
    let word_gas = to_word_size(len).checked_mul(COPY_GAS).ok_or(VmError::GasUintOverflow)?;
    gas = gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)?;
    if evm.rules.is_berlin {
        let addr = word_to_address(scope.stack.peek(0)?);
        gas = gas
            .checked_add(account_access_gas(evm, addr))
            .ok_or(VmError::GasUintOverflow)?;
    }
    Ok(gas)
}

pub fn gas_exp_frontier(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    exp_gas(evm, frame, scope, memory_size, EXP_BYTE_FRONTIER)
}

pub fn gas_exp_eip158(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    exp_gas(evm, frame, scope, memory_size, EXP_BYTE_EIP158)
}

fn exp_gas(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    _memory_size: u64,
    per_byte: u64,
) -> Result<u64, VmError> {
    let exponent = scope.stack.peek(1)?;
    EXP_GAS
        .checked_add(per_byte * word::byte_len(exponent))
        .ok_or(VmError::GasUintOverflow)
}

pub fn gas_log0(evm: &mut Evm<'_>, f: &mut Frame, s: &mut Scope, m: u64) -> Result<u64, VmError> {
    log_gas(evm, f, s, m, 0)
}
pub fn gas_log1(evm: &mut Evm<'_>, f: &mut Frame, s: &mut Scope, m: u64) -> Result<u64, VmError> {
    log_gas(evm, f, s, m, 1)
}
pub fn gas_log2(evm: &mut Evm<'_>, f: &mut Frame, s: &mut Scope, m: u64) -> Result<u64, VmError> {
    log_gas(evm, f, s, m, 2)
}
pub fn gas_log3(evm: &mut Evm<'_>, f: &mut Frame, s: &mut Scope, m: u64) -> Result<u64, VmError> {
    log_gas(evm, f, s, m, 3)
}
pub fn gas_log4(evm: &mut Evm<'_>, f: &mut Frame, s: &mut Scope, m: u64) -> Result<u64, VmError> {
    log_gas(evm, f, s, m, 4)
}

fn log_gas(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
    topics: u64,
) -> Result<u64, VmError> {
    let len = word::as_u64_checked(scope.stack.peek(1)?).ok_or(VmError::GasUintOverflow)?;
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    gas = gas
        .checked_add(LOG_GAS + LOG_TOPIC_GAS * topics)
        .ok_or(VmError::GasUintOverflow)?;
    let data_gas = len.checked_mul(LOG_DATA_GAS).ok_or(VmError::GasUintOverflow)?;
    gas.checked_add(data_gas).ok_or(VmError::GasUintOverflow)
}

/// Berlin SLOAD: warm 100, cold 2100.
pub fn gas_sload_eip2929(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    _memory_size: u64,
) -> Result<u64, VmError> {
    let key = scope.stack.peek(0)?;
    if evm.state.access_slot(frame.address, key) {
        Ok(COLD_SLOAD_GAS)
    } else {
        Ok(WARM_ACCESS_GAS)
    }
}

/// Berlin BALANCE/EXTCODESIZE/EXTCODEHASH: warm 100, cold 2600.
pub fn gas_account_access_eip2929(
    evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    _memory_size: u64,
) -> Result<u64, VmError> {
    let addr = word_to_address(scope.stack.peek(0)?);
    Ok(account_access_gas(evm, addr))
}

fn account_access_gas(evm: &mut Evm<'_>, addr: Address) -> u64 {
    if evm.state.access_address(addr) {
        COLD_ACCOUNT_ACCESS_GAS
    } else {
        WARM_ACCESS_GAS
    }
}

/// Pre-Istanbul SSTORE: 20000 on set, 5000 otherwise, 15000 refund on clear.
pub fn gas_sstore_legacy(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    _memory_size: u64,
) -> Result<u64, VmError> {
    let key = scope.stack.peek(0)?;
    let value = scope.stack.peek(1)?;
    let current = evm.state.get_state(frame.address, key);
    if current.is_zero() && !value.is_zero() {
        Ok(SSTORE_SET_GAS)
    } else if !current.is_zero() && value.is_zero() {
        evm.state.add_refund(SSTORE_CLEAR_REFUND_LEGACY);
        Ok(SSTORE_RESET_GAS)
    } else {
        Ok(SSTORE_RESET_GAS)
    }
}

/// Net gas metering per EIP-2200, with the EIP-2929 cold surcharge from
/// Berlin and the EIP-3529 reduced clear refund from London.
pub fn gas_sstore_net(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    _memory_size: u64,
) -> Result<u64, VmError> {
    // EIP-2200 sentry: refuse to operate with less than the stipend left,
    // so re-entrancy on the stipend cannot toggle storage.
    if frame.gas <= SSTORE_SENTRY_GAS {
        return Err(VmError::OutOfGas);
    }
    let berlin = evm.rules.is_berlin;
    let (warm_cost, reset_cost) = if berlin {
        (WARM_ACCESS_GAS, SSTORE_RESET_GAS - COLD_SLOAD_GAS)
    } else {
        (SLOAD_GAS_EIP2200, SSTORE_RESET_GAS)
    };
    let clear_refund = if evm.rules.is_london {
        SSTORE_CLEAR_REFUND_EIP3529
    } else {
        SSTORE_CLEAR_REFUND_LEGACY
    };

    let key = scope.stack.peek(0)?;
    let value = scope.stack.peek(1)?;
    let mut cost = 0u64;
    if berlin && evm.state.access_slot(frame.address, key) {
        cost += COLD_SLOAD_GAS;
    }
    let current = evm.state.get_state(frame.address, key);
    if current == value {
        return Ok(cost + warm_cost);
    }
    let original = evm.state.get_committed_state(frame.address, key);
    if original == current {
        if original.is_zero() {
            return Ok(cost + SSTORE_SET_GAS);
        }
        if value.is_zero() {
            evm.state.add_refund(clear_refund);
        }
        return Ok(cost + reset_cost);
    }
    // Dirty slot: charge the cheap rate and settle through refunds.
    if !original.is_zero() {
        if current.is_zero() {
            evm.state.sub_refund(clear_refund);
        } else if value.is_zero() {
            evm.state.add_refund(clear_refund);
        }
    }
    if original == value {
        if original.is_zero() {
            evm.state.add_refund(SSTORE_SET_GAS - warm_cost);
        } else {
            evm.state.add_refund(reset_cost - warm_cost);
        }
    }
    Ok(cost + warm_cost)
}

pub fn gas_create(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    memory_gas_cost(&mut scope.memory, memory_size)
}

pub fn gas_create2(
    _evm: &mut Evm<'_>,
    _frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    let len = word::as_u64_checked(scope.stack.peek(2)?).ok_or(VmError::GasUintOverflow)?;
    let word_gas = to_word_size(len)
        .checked_mul(KECCAK256_WORD_GAS)
        .ok_or(VmError::GasUintOverflow)?;
    gas = gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)?;
    Ok(gas)
}

/// EIP-3860: initcode is charged 2 gas per word on top of the base create
/// costs.
pub fn gas_create_eip3860(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let gas = gas_create(evm, frame, scope, memory_size)?;
    let len = word::as_u64_checked(scope.stack.peek(2)?).ok_or(VmError::GasUintOverflow)?;
    let word_gas = to_word_size(len)
        .checked_mul(INITCODE_WORD_GAS)
        .ok_or(VmError::GasUintOverflow)?;
    gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)
}

pub fn gas_create2_eip3860(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let gas = gas_create2(evm, frame, scope, memory_size)?;
    let len = word::as_u64_checked(scope.stack.peek(2)?).ok_or(VmError::GasUintOverflow)?;
    let word_gas = to_word_size(len)
        .checked_mul(INITCODE_WORD_GAS)
        .ok_or(VmError::GasUintOverflow)?;
    gas.checked_add(word_gas).ok_or(VmError::GasUintOverflow)
}

pub fn gas_call(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let target = word_to_address(scope.stack.peek(1)?);
    let value = scope.stack.peek(2)?;
    let transfers_value = !value.is_zero();
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    if evm.rules.is_berlin {
        gas = gas
            .checked_add(call_access_gas(evm, target))
            .ok_or(VmError::GasUintOverflow)?;
    }
    if evm.rules.is_eip158 {
        if transfers_value && evm.state.empty(target) {
            gas = gas.checked_add(CALL_NEW_ACCOUNT_GAS).ok_or(VmError::GasUintOverflow)?;
        }
    } else if !evm.state.exist(target) {
        gas = gas.checked_add(CALL_NEW_ACCOUNT_GAS).ok_or(VmError::GasUintOverflow)?;
    }
    if transfers_value {
        gas = gas.checked_add(CALL_VALUE_TRANSFER_GAS).ok_or(VmError::GasUintOverflow)?;
    }
    finish_call_gas(evm, frame, scope, gas)
}

pub fn gas_callcode(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let target = word_to_address(scope.stack.peek(1)?);
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    if evm.rules.is_berlin {
        gas = gas
            .checked_add(call_access_gas(evm, target))
            .ok_or(VmError::GasUintOverflow)?;
    }
    if !scope.stack.peek(2)?.is_zero() {
        gas = gas.checked_add(CALL_VALUE_TRANSFER_GAS).ok_or(VmError::GasUintOverflow)?;
    }
    finish_call_gas(evm, frame, scope, gas)
}

pub fn gas_delegate_call(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    let target = word_to_address(scope.stack.peek(1)?);
    let mut gas = memory_gas_cost(&mut scope.memory, memory_size)?;
    if evm.rules.is_berlin {
        gas = gas
            .checked_add(call_access_gas(evm, target))
            .ok_or(VmError::GasUintOverflow)?;
    }
    finish_call_gas(evm, frame, scope, gas)
}

pub fn gas_static_call(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    memory_size: u64,
) -> Result<u64, VmError> {
    gas_delegate_call(evm, frame, scope, memory_size)
}

/// Berlin call-variant access cost: the warm 100 lives in the constant gas
/// column, cold pays the 2500 difference here.
fn call_access_gas(evm: &mut Evm<'_>, target: Address) -> u64 {
    if evm.state.access_address(target) {
        COLD_ACCOUNT_ACCESS_GAS - WARM_ACCESS_GAS
    } else {
        0
    }
}

fn finish_call_gas(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    base: u64,
) -> Result<u64, VmError> {
    let requested = scope.stack.peek(0)?;
    let forwarded = call_gas(evm.rules.is_eip150, frame.gas, base, requested)?;
    evm.call_gas_temp = forwarded;
    base.checked_add(forwarded).ok_or(VmError::GasUintOverflow)
}

pub fn gas_selfdestruct(
    evm: &mut Evm<'_>,
    frame: &mut Frame,
    scope: &mut Scope,
    _memory_size: u64,
) -> Result<u64, VmError> {
    let beneficiary = word_to_address(scope.stack.peek(0)?);
    let mut gas = if evm.rules.is_eip150 { SELFDESTRUCT_GAS_EIP150 } else { 0 };
    if evm.rules.is_berlin && evm.state.access_address(beneficiary) {
        gas += COLD_ACCOUNT_ACCESS_GAS;
    }
    if evm.rules.is_eip158 {
        if evm.state.empty(beneficiary) && !evm.state.get_balance(frame.address).is_zero() {
            gas += CALL_NEW_ACCOUNT_GAS;
        }
    } else if evm.rules.is_eip150 && !evm.state.exist(beneficiary) {
        gas += CALL_NEW_ACCOUNT_GAS;
    }
    if !evm.rules.is_london && !evm.state.has_self_destructed(frame.address) {
        evm.state.add_refund(SELFDESTRUCT_REFUND);
    }
    Ok(gas)
}

pub fn word_to_address(w: U256) -> Address {
    Address::from_slice(&w.to_be_bytes::<32>()[12..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_word_size() {
        assert_eq!(to_word_size(0), 0);
        assert_eq!(to_word_size(1), 1);
        assert_eq!(to_word_size(32), 1);
        assert_eq!(to_word_size(33), 2);
    }

    #[test]
    fn test_memory_gas_is_delta_charged() {
        let mut mem = Memory::new();
        // 32 bytes: 1 word, 3 gas.
        assert_eq!(memory_gas_cost(&mut mem, 32).unwrap(), 3);
        // Same size again: already paid.
        assert_eq!(memory_gas_cost(&mut mem, 32).unwrap(), 0);
        // 64 bytes: total 6, delta 3.
        assert_eq!(memory_gas_cost(&mut mem, 64).unwrap(), 3);
        // Shrinking request: nothing more to pay.
        assert_eq!(memory_gas_cost(&mut mem, 32).unwrap(), 0);
    }

    #[test]
    fn test_memory_gas_quadratic_term() {
        // 1024 words: 3*1024 + 1024^2/512 = 3072 + 2048 = 5120.
        let mut mem = Memory::new();
        assert_eq!(memory_gas_cost(&mut mem, 1024 * 32).unwrap(), 5120);
    }

    #[test]
    fn test_memory_gas_cost_of_a_equals_total_minus_prior() {
        // cost(b) - cost(a) for consecutive resizes a <= b.
        let mut stepped = Memory::new();
        let a = memory_gas_cost(&mut stepped, 320).unwrap();
        let b = memory_gas_cost(&mut stepped, 6400).unwrap();
        let mut direct = Memory::new();
        let total = memory_gas_cost(&mut direct, 6400).unwrap();
        assert_eq!(a + b, total);
    }

    #[test]
    fn test_memory_gas_overflow_guard() {
        let mut mem = Memory::new();
        assert_eq!(memory_gas_cost(&mut mem, u64::MAX), Err(VmError::GasUintOverflow));
    }

    #[test]
    fn test_call_gas_retains_a_64th() {
        // 6400 available, no base cost: forward at most 6400 - 100 = 6300.
        assert_eq!(call_gas(true, 6400, 0, U256::MAX).unwrap(), 6300);
        // Requesting less than the cap forwards exactly the request.
        assert_eq!(call_gas(true, 6400, 0, U256::from(1000)).unwrap(), 1000);
        // Pre-EIP-150 forwards the request unconditionally.
        assert_eq!(call_gas(false, 100, 0, U256::from(1000)).unwrap(), 1000);
    }
}
