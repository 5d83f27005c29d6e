//! Opcode handlers.
//!
//! Each handler runs after the dispatch loop has verified stack bounds,
//! charged constant and dynamic gas, and grown memory. Handlers therefore
//! index memory directly; stack mutation still goes through the checked
//! `Stack` API so a metadata mistake surfaces as an error, not a panic.

use crate::errors::VmError;
use crate::evm::Evm;
use crate::frame::Frame;
use crate::gas::{self, word_to_address};
use crate::interpreter::{Control, ReturnContext, Scope, RETURN_STACK_LIMIT};
use crate::stack::STACK_LIMIT;
use crate::word;
use alloy_primitives::{Bytes, B256, U256};

// ── Shared helpers ─────────────────────────────────────────────────────────

/// Slice `size` bytes out of `data` starting at `offset`, zero-padded past
/// the end. Offsets beyond the data are all padding.
fn get_data(data: &[u8], offset: U256, size: usize) -> Vec<u8> {
    let start = word::as_usize_saturated(offset).min(data.len());
    let end = start.saturating_add(size).min(data.len());
    let mut out = data[start..end].to_vec();
    out.resize(size, 0);
    out
}

fn address_to_word(addr: alloy_primitives::Address) -> U256 {
    U256::from_be_slice(addr.as_slice())
}

fn imm_u16(code: &[u8], pos: usize) -> u16 {
    let hi = code.get(pos).copied().unwrap_or(0);
    let lo = code.get(pos + 1).copied().unwrap_or(0);
    u16::from_be_bytes([hi, lo])
}

fn imm_i16(code: &[u8], pos: usize) -> i16 {
    imm_u16(code, pos) as i16
}

// ── Arithmetic ─────────────────────────────────────────────────────────────

pub fn op_stop(_e: &mut Evm<'_>, _f: &mut Frame, _s: &mut Scope) -> Result<Control, VmError> {
    Ok(Control::Stop)
}

pub fn op_add(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = x.wrapping_add(*y);
    Ok(Control::Continue)
}

pub fn op_mul(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = x.wrapping_mul(*y);
    Ok(Control::Continue)
}

pub fn op_sub(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = x.wrapping_sub(*y);
    Ok(Control::Continue)
}

pub fn op_div(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::div(x, *y);
    Ok(Control::Continue)
}

pub fn op_sdiv(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::sdiv(x, *y);
    Ok(Control::Continue)
}

pub fn op_mod(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::rem(x, *y);
    Ok(Control::Continue)
}

pub fn op_smod(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::smod(x, *y);
    Ok(Control::Continue)
}

pub fn op_addmod(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.pop()?;
    let m = s.stack.top_mut()?;
    *m = x.add_mod(y, *m);
    Ok(Control::Continue)
}

pub fn op_mulmod(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.pop()?;
    let m = s.stack.top_mut()?;
    *m = x.mul_mod(y, *m);
    Ok(Control::Continue)
}

pub fn op_exp(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let base = s.stack.pop()?;
    let exponent = s.stack.top_mut()?;
    *exponent = base.pow(*exponent);
    Ok(Control::Continue)
}

pub fn op_signextend(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let ext = s.stack.pop()?;
    let value = s.stack.top_mut()?;
    *value = word::signextend(ext, *value);
    Ok(Control::Continue)
}

// ── Comparison / bitwise ───────────────────────────────────────────────────

pub fn op_lt(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::bool_to_word(x < *y);
    Ok(Control::Continue)
}

pub fn op_gt(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::bool_to_word(x > *y);
    Ok(Control::Continue)
}

pub fn op_slt(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::bool_to_word(word::slt(x, *y));
    Ok(Control::Continue)
}

pub fn op_sgt(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::bool_to_word(word::sgt(x, *y));
    Ok(Control::Continue)
}

pub fn op_eq(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = word::bool_to_word(x == *y);
    Ok(Control::Continue)
}

pub fn op_iszero(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.top_mut()?;
    *x = word::bool_to_word(x.is_zero());
    Ok(Control::Continue)
}

pub fn op_and(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = x & *y;
    Ok(Control::Continue)
}

pub fn op_or(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = x | *y;
    Ok(Control::Continue)
}

pub fn op_xor(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.pop()?;
    let y = s.stack.top_mut()?;
    *y = x ^ *y;
    Ok(Control::Continue)
}

pub fn op_not(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let x = s.stack.top_mut()?;
    *x = !*x;
    Ok(Control::Continue)
}

pub fn op_byte(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let i = s.stack.pop()?;
    let value = s.stack.top_mut()?;
    *value = word::byte(i, *value);
    Ok(Control::Continue)
}

pub fn op_shl(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let shift = s.stack.pop()?;
    let value = s.stack.top_mut()?;
    *value = match word::as_u64_checked(shift) {
        Some(sh) if sh < 256 => value.wrapping_shl(sh as usize),
        _ => U256::ZERO,
    };
    Ok(Control::Continue)
}

pub fn op_shr(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let shift = s.stack.pop()?;
    let value = s.stack.top_mut()?;
    *value = match word::as_u64_checked(shift) {
        Some(sh) if sh < 256 => value.wrapping_shr(sh as usize),
        _ => U256::ZERO,
    };
    Ok(Control::Continue)
}

pub fn op_sar(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let shift = s.stack.pop()?;
    let value = s.stack.top_mut()?;
    *value = word::sar(shift, *value);
    Ok(Control::Continue)
}

// ── Hashing ────────────────────────────────────────────────────────────────

pub fn op_keccak256(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let data = s
        .memory
        .get(word::as_usize_saturated(offset), word::as_usize_saturated(size));
    let hash = crate::analysis::keccak256(&data);
    s.stack.push(U256::from_be_bytes(hash.0))?;
    Ok(Control::Continue)
}

// ── Environment ────────────────────────────────────────────────────────────

pub fn op_address(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(address_to_word(f.address))?;
    Ok(Control::Continue)
}

pub fn op_balance(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let addr = word_to_address(s.stack.pop()?);
    s.stack.push(e.state.get_balance(addr))?;
    Ok(Control::Continue)
}

pub fn op_origin(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(address_to_word(e.tx.origin))?;
    Ok(Control::Continue)
}

pub fn op_caller(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(address_to_word(f.caller))?;
    Ok(Control::Continue)
}

pub fn op_callvalue(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(f.value)?;
    Ok(Control::Continue)
}

pub fn op_calldataload(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let offset = s.stack.top_mut()?;
    let data = get_data(&f.input, *offset, 32);
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&data);
    *offset = U256::from_be_bytes(buf);
    Ok(Control::Continue)
}

pub fn op_calldatasize(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(f.input.len()))?;
    Ok(Control::Continue)
}

pub fn op_calldatacopy(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let mem_offset = s.stack.pop()?;
    let data_offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let size = word::as_usize_saturated(size);
    let data = get_data(&f.input, data_offset, size);
    s.memory.set_padded(word::as_usize_saturated(mem_offset), size, &data);
    Ok(Control::Continue)
}

pub fn op_codesize(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(f.code.len()))?;
    Ok(Control::Continue)
}

pub fn op_codecopy(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let mem_offset = s.stack.pop()?;
    let code_offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let size = word::as_usize_saturated(size);
    let data = get_data(&f.code, code_offset, size);
    s.memory.set_padded(word::as_usize_saturated(mem_offset), size, &data);
    Ok(Control::Continue)
}

pub fn op_gasprice(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(e.tx.gas_price)?;
    Ok(Control::Continue)
}

pub fn op_extcodesize(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let addr = word_to_address(s.stack.pop()?);
    s.stack.push(U256::from(e.state.get_code_size(addr)))?;
    Ok(Control::Continue)
}

pub fn op_extcodecopy(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let addr = word_to_address(s.stack.pop()?);
    let mem_offset = s.stack.pop()?;
    let code_offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let size = word::as_usize_saturated(size);
    let code = e.state.get_code(addr);
    let data = get_data(&code, code_offset, size);
    s.memory.set_padded(word::as_usize_saturated(mem_offset), size, &data);
    Ok(Control::Continue)
}

pub fn op_returndatasize(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(s.return_data.len()))?;
    Ok(Control::Continue)
}

/// RETURNDATACOPY is the one copy opcode with strict bounds: reading past
/// the end of the return buffer faults instead of zero-padding.
pub fn op_returndatacopy(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let mem_offset = s.stack.pop()?;
    let data_offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let data_offset = word::as_u64_checked(data_offset).ok_or(VmError::ReturnDataOutOfBounds)?;
    let size64 = word::as_u64_checked(size).ok_or(VmError::ReturnDataOutOfBounds)?;
    let end = data_offset
        .checked_add(size64)
        .ok_or(VmError::ReturnDataOutOfBounds)?;
    if end > s.return_data.len() as u64 {
        return Err(VmError::ReturnDataOutOfBounds);
    }
    let data = s.return_data[data_offset as usize..end as usize].to_vec();
    s.memory.set(word::as_usize_saturated(mem_offset), &data);
    Ok(Control::Continue)
}

pub fn op_extcodehash(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let addr = word_to_address(s.stack.pop()?);
    if e.state.empty(addr) {
        s.stack.push(U256::ZERO)?;
    } else {
        s.stack.push(U256::from_be_bytes(e.state.get_code_hash(addr).0))?;
    }
    Ok(Control::Continue)
}

// ── Block context ──────────────────────────────────────────────────────────

pub fn op_blockhash(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let number = s.stack.top_mut()?;
    let hash = match word::as_u64_checked(*number) {
        Some(n) => e.block.block_hash(n),
        None => B256::ZERO,
    };
    *number = U256::from_be_bytes(hash.0);
    Ok(Control::Continue)
}

pub fn op_coinbase(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(address_to_word(e.block.coinbase))?;
    Ok(Control::Continue)
}

pub fn op_timestamp(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(e.block.timestamp))?;
    Ok(Control::Continue)
}

pub fn op_number(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(e.block.number))?;
    Ok(Control::Continue)
}

pub fn op_prevrandao(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from_be_bytes(e.block.prev_randao.0))?;
    Ok(Control::Continue)
}

pub fn op_gaslimit(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(e.block.gas_limit))?;
    Ok(Control::Continue)
}

pub fn op_chainid(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(e.block.chain_id))?;
    Ok(Control::Continue)
}

pub fn op_selfbalance(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(e.state.get_balance(f.address))?;
    Ok(Control::Continue)
}

pub fn op_basefee(e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let fee = if e.config.no_base_fee { U256::ZERO } else { e.block.base_fee };
    s.stack.push(fee)?;
    Ok(Control::Continue)
}

// ── Stack / memory / storage / flow ────────────────────────────────────────

pub fn op_pop(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.pop()?;
    Ok(Control::Continue)
}

pub fn op_mload(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let offset = s.stack.top_mut()?;
    let at = word::as_usize_saturated(*offset);
    *offset = s.memory.get_word(at);
    Ok(Control::Continue)
}

pub fn op_mstore(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let offset = s.stack.pop()?;
    let value = s.stack.pop()?;
    s.memory.set_word(word::as_usize_saturated(offset), value);
    Ok(Control::Continue)
}

pub fn op_mstore8(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let offset = s.stack.pop()?;
    let value = s.stack.pop()?;
    s.memory.set_byte(word::as_usize_saturated(offset), value.byte(0));
    Ok(Control::Continue)
}

pub fn op_sload(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let key = s.stack.top_mut()?;
    *key = e.state.get_state(f.address, *key);
    Ok(Control::Continue)
}

pub fn op_sstore(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    if f.read_only {
        return Err(VmError::WriteProtection);
    }
    let key = s.stack.pop()?;
    let value = s.stack.pop()?;
    e.state.set_state(f.address, key, value);
    Ok(Control::Continue)
}

pub fn op_jump(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let dest = s.stack.pop()?;
    if !f.valid_jumpdest(dest) {
        return Err(VmError::InvalidJump(word::as_usize_saturated(dest)));
    }
    s.pc = word::as_usize_saturated(dest);
    Ok(Control::Jump)
}

pub fn op_jumpi(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let dest = s.stack.pop()?;
    let cond = s.stack.pop()?;
    if cond.is_zero() {
        return Ok(Control::Continue);
    }
    if !f.valid_jumpdest(dest) {
        return Err(VmError::InvalidJump(word::as_usize_saturated(dest)));
    }
    s.pc = word::as_usize_saturated(dest);
    Ok(Control::Jump)
}

pub fn op_pc(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(s.pc))?;
    Ok(Control::Continue)
}

pub fn op_msize(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(s.memory.len()))?;
    Ok(Control::Continue)
}

pub fn op_gas(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::from(f.gas))?;
    Ok(Control::Continue)
}

pub fn op_jumpdest(_e: &mut Evm<'_>, _f: &mut Frame, _s: &mut Scope) -> Result<Control, VmError> {
    Ok(Control::Continue)
}

pub fn op_tload(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let key = s.stack.top_mut()?;
    *key = e.state.get_transient_state(f.address, *key);
    Ok(Control::Continue)
}

pub fn op_tstore(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    if f.read_only {
        return Err(VmError::WriteProtection);
    }
    let key = s.stack.pop()?;
    let value = s.stack.pop()?;
    e.state.set_transient_state(f.address, key, value);
    Ok(Control::Continue)
}

pub fn op_mcopy(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let dst = s.stack.pop()?;
    let src = s.stack.pop()?;
    let size = s.stack.pop()?;
    s.memory.copy(
        word::as_usize_saturated(dst),
        word::as_usize_saturated(src),
        word::as_usize_saturated(size),
    );
    Ok(Control::Continue)
}

pub fn op_push0(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    s.stack.push(U256::ZERO)?;
    Ok(Control::Continue)
}

/// PUSH1..PUSH32. A push truncated by the end of code zero-fills the
/// missing low bytes.
pub fn op_push<const N: usize>(
    _e: &mut Evm<'_>,
    f: &mut Frame,
    s: &mut Scope,
) -> Result<Control, VmError> {
    let code = f.code_section(s.section);
    let start = (s.pc + 1).min(code.len());
    let end = (s.pc + 1 + N).min(code.len());
    let avail = &code[start..end];
    let mut buf = [0u8; 32];
    buf[32 - N..32 - N + avail.len()].copy_from_slice(avail);
    let value = U256::from_be_bytes(buf);
    s.stack.push(value)?;
    s.pc += N;
    Ok(Control::Continue)
}

pub fn op_dup<const N: usize>(
    _e: &mut Evm<'_>,
    _f: &mut Frame,
    s: &mut Scope,
) -> Result<Control, VmError> {
    s.stack.dup(N)?;
    Ok(Control::Continue)
}

pub fn op_swap<const N: usize>(
    _e: &mut Evm<'_>,
    _f: &mut Frame,
    s: &mut Scope,
) -> Result<Control, VmError> {
    s.stack.swap(N)?;
    Ok(Control::Continue)
}

pub fn op_log<const N: usize>(
    e: &mut Evm<'_>,
    f: &mut Frame,
    s: &mut Scope,
) -> Result<Control, VmError> {
    if f.read_only {
        return Err(VmError::WriteProtection);
    }
    let offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let mut topics = Vec::with_capacity(N);
    for _ in 0..N {
        topics.push(B256::from(s.stack.pop()?.to_be_bytes::<32>()));
    }
    let data = s
        .memory
        .get(word::as_usize_saturated(offset), word::as_usize_saturated(size));
    e.state.add_log(crate::state::Log { address: f.address, topics, data });
    Ok(Control::Continue)
}

// ── EOF control flow ───────────────────────────────────────────────────────

pub fn op_rjump(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let code = f.code_section(s.section);
    let offset = imm_i16(code, s.pc + 1);
    s.pc = (s.pc as isize + 3 + offset as isize) as usize;
    Ok(Control::Jump)
}

pub fn op_rjumpi(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let cond = s.stack.pop()?;
    if cond.is_zero() {
        s.pc += 2;
        return Ok(Control::Continue);
    }
    let code = f.code_section(s.section);
    let offset = imm_i16(code, s.pc + 1);
    s.pc = (s.pc as isize + 3 + offset as isize) as usize;
    Ok(Control::Jump)
}

pub fn op_rjumpv(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let case = s.stack.pop()?;
    let code = f.code_section(s.section);
    let count = code.get(s.pc + 1).copied().unwrap_or(0) as usize;
    let after = s.pc + 2 + 2 * count;
    match word::as_u64_checked(case) {
        Some(i) if (i as usize) < count => {
            let offset = imm_i16(code, s.pc + 2 + 2 * i as usize);
            s.pc = (after as isize + offset as isize) as usize;
            Ok(Control::Jump)
        }
        _ => {
            // Out-of-range selector falls through past the branch table.
            s.pc = after;
            Ok(Control::Jump)
        }
    }
}

pub fn op_callf(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let container = f.container.as_ref().ok_or(VmError::InvalidCode)?;
    let code = container.code_section(s.section);
    let target = imm_u16(code, s.pc + 1) as usize;
    let meta = *container.types.get(target).ok_or(VmError::InvalidCode)?;
    let projected =
        (s.stack.len() + meta.max_stack_height as usize).saturating_sub(meta.inputs as usize);
    if projected > STACK_LIMIT {
        return Err(VmError::StackOverflow { have: projected, limit: STACK_LIMIT });
    }
    if s.return_stack.len() >= RETURN_STACK_LIMIT {
        return Err(VmError::ReturnStackOverflow);
    }
    s.return_stack.push(ReturnContext { section: s.section, pc: s.pc + 3 });
    s.section = target;
    s.pc = 0;
    Ok(Control::Jump)
}

pub fn op_retf(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let ctx = s.return_stack.pop().ok_or(VmError::InvalidCode)?;
    s.section = ctx.section;
    s.pc = ctx.pc;
    Ok(Control::Jump)
}

pub fn op_jumpf(_e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let container = f.container.as_ref().ok_or(VmError::InvalidCode)?;
    let code = container.code_section(s.section);
    let target = imm_u16(code, s.pc + 1) as usize;
    let meta = *container.types.get(target).ok_or(VmError::InvalidCode)?;
    let projected =
        (s.stack.len() + meta.max_stack_height as usize).saturating_sub(meta.inputs as usize);
    if projected > STACK_LIMIT {
        return Err(VmError::StackOverflow { have: projected, limit: STACK_LIMIT });
    }
    s.section = target;
    s.pc = 0;
    Ok(Control::Jump)
}

// ── System ─────────────────────────────────────────────────────────────────

pub fn op_create(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    if f.read_only {
        return Err(VmError::WriteProtection);
    }
    let value = s.stack.pop()?;
    let offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let initcode = s
        .memory
        .get(word::as_usize_saturated(offset), word::as_usize_saturated(size));

    // All-but-one-64th gas forwarding for creates since EIP-150.
    let mut gas = f.gas;
    if e.rules.is_eip150 {
        gas -= gas / 64;
    }
    if !f.use_gas(gas) {
        return Err(VmError::OutOfGas);
    }
    let res = e.create(f.address, value, Bytes::from(initcode), gas);
    f.refund_gas(res.gas_left);
    s.return_data = res.output;
    match res.address {
        Some(addr) => s.stack.push(address_to_word(addr))?,
        None => s.stack.push(U256::ZERO)?,
    }
    Ok(Control::Continue)
}

pub fn op_create2(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    if f.read_only {
        return Err(VmError::WriteProtection);
    }
    let value = s.stack.pop()?;
    let offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let salt = s.stack.pop()?;
    let initcode = s
        .memory
        .get(word::as_usize_saturated(offset), word::as_usize_saturated(size));

    let mut gas = f.gas;
    gas -= gas / 64;
    if !f.use_gas(gas) {
        return Err(VmError::OutOfGas);
    }
    let res = e.create2(f.address, value, Bytes::from(initcode), salt, gas);
    f.refund_gas(res.gas_left);
    s.return_data = res.output;
    match res.address {
        Some(addr) => s.stack.push(address_to_word(addr))?,
        None => s.stack.push(U256::ZERO)?,
    }
    Ok(Control::Continue)
}

pub fn op_call(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let _requested = s.stack.pop()?;
    let addr = word_to_address(s.stack.pop()?);
    let value = s.stack.pop()?;
    let in_offset = s.stack.pop()?;
    let in_size = s.stack.pop()?;
    let ret_offset = s.stack.pop()?;
    let ret_size = s.stack.pop()?;

    if f.read_only && !value.is_zero() {
        return Err(VmError::WriteProtection);
    }
    let mut gas = e.call_gas_temp;
    if !value.is_zero() {
        gas += gas::CALL_STIPEND;
    }
    let args = s
        .memory
        .get(word::as_usize_saturated(in_offset), word::as_usize_saturated(in_size));

    let res = e.call(f.address, addr, Bytes::from(args), gas, value, f.read_only);
    f.refund_gas(res.gas_left);
    write_call_output(s, ret_offset, ret_size, &res.output);
    s.return_data = res.output;
    s.stack.push(word::bool_to_word(res.success))?;
    Ok(Control::Continue)
}

pub fn op_callcode(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let _requested = s.stack.pop()?;
    let addr = word_to_address(s.stack.pop()?);
    let value = s.stack.pop()?;
    let in_offset = s.stack.pop()?;
    let in_size = s.stack.pop()?;
    let ret_offset = s.stack.pop()?;
    let ret_size = s.stack.pop()?;

    let mut gas = e.call_gas_temp;
    if !value.is_zero() {
        gas += gas::CALL_STIPEND;
    }
    let args = s
        .memory
        .get(word::as_usize_saturated(in_offset), word::as_usize_saturated(in_size));

    let res = e.call_code(f.address, addr, Bytes::from(args), gas, value, f.read_only);
    f.refund_gas(res.gas_left);
    write_call_output(s, ret_offset, ret_size, &res.output);
    s.return_data = res.output;
    s.stack.push(word::bool_to_word(res.success))?;
    Ok(Control::Continue)
}

pub fn op_delegatecall(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let _requested = s.stack.pop()?;
    let addr = word_to_address(s.stack.pop()?);
    let in_offset = s.stack.pop()?;
    let in_size = s.stack.pop()?;
    let ret_offset = s.stack.pop()?;
    let ret_size = s.stack.pop()?;

    let gas = e.call_gas_temp;
    let args = s
        .memory
        .get(word::as_usize_saturated(in_offset), word::as_usize_saturated(in_size));

    let res = e.delegate_call(f.caller, f.address, addr, f.value, Bytes::from(args), gas, f.read_only);
    f.refund_gas(res.gas_left);
    write_call_output(s, ret_offset, ret_size, &res.output);
    s.return_data = res.output;
    s.stack.push(word::bool_to_word(res.success))?;
    Ok(Control::Continue)
}

pub fn op_staticcall(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let _requested = s.stack.pop()?;
    let addr = word_to_address(s.stack.pop()?);
    let in_offset = s.stack.pop()?;
    let in_size = s.stack.pop()?;
    let ret_offset = s.stack.pop()?;
    let ret_size = s.stack.pop()?;

    let gas = e.call_gas_temp;
    let args = s
        .memory
        .get(word::as_usize_saturated(in_offset), word::as_usize_saturated(in_size));

    let res = e.static_call(f.address, addr, Bytes::from(args), gas);
    f.refund_gas(res.gas_left);
    write_call_output(s, ret_offset, ret_size, &res.output);
    s.return_data = res.output;
    s.stack.push(word::bool_to_word(res.success))?;
    Ok(Control::Continue)
}

/// Copy a sub-call's output into caller memory. Only `min(ret_size, output)`
/// bytes are written; the rest of the reserved window keeps its old
/// contents.
fn write_call_output(s: &mut Scope, ret_offset: U256, ret_size: U256, output: &[u8]) {
    let n = word::as_usize_saturated(ret_size).min(output.len());
    if n > 0 {
        s.memory.set(word::as_usize_saturated(ret_offset), &output[..n]);
    }
}

pub fn op_return(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let data = s
        .memory
        .get(word::as_usize_saturated(offset), word::as_usize_saturated(size));
    Ok(Control::Return(Bytes::from(data)))
}

pub fn op_revert(_e: &mut Evm<'_>, _f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    let offset = s.stack.pop()?;
    let size = s.stack.pop()?;
    let data = s
        .memory
        .get(word::as_usize_saturated(offset), word::as_usize_saturated(size));
    Ok(Control::Revert(Bytes::from(data)))
}

pub fn op_selfdestruct(e: &mut Evm<'_>, f: &mut Frame, s: &mut Scope) -> Result<Control, VmError> {
    if f.read_only {
        return Err(VmError::WriteProtection);
    }
    let beneficiary = word_to_address(s.stack.pop()?);
    let balance = e.state.get_balance(f.address);
    e.state.add_balance(beneficiary, balance);
    e.state.self_destruct(f.address);
    Ok(Control::SelfDestruct)
}
