//! Per-fork instruction tables.
//!
//! Each table maps an opcode to its handler plus static metadata: constant
//! gas, stack bounds, and optional dynamic-gas and memory-size functions.
//! Tables are built cumulatively, each fork editing a copy of its parent,
//! mirroring how the schedules were introduced on chain. The EOF table is
//! derived separately: it removes the opcodes banned inside validated
//! containers and adds the RJUMP/CALLF families.

use crate::errors::VmError;
use crate::evm::Evm;
use crate::frame::Frame;
use crate::gas;
use crate::gas::{DynamicGasFn, MemorySizeFn};
use crate::instructions::*;
use crate::interpreter::{Control, Scope};
use crate::opcode as op;
use crate::stack::STACK_LIMIT;

pub type ExecuteFn = fn(&mut Evm<'_>, &mut Frame, &mut Scope) -> Result<Control, VmError>;

#[derive(Clone, Copy)]
pub struct Instruction {
    pub execute: ExecuteFn,
    pub constant_gas: u64,
    /// Minimum stack depth required before execution.
    pub min_stack: usize,
    /// Maximum stack depth allowed before execution, such that the net
    /// pushes still fit under the 1024-item limit.
    pub max_stack: usize,
    pub dynamic_gas: Option<DynamicGasFn>,
    pub memory_size: Option<MemorySizeFn>,
}

impl Instruction {
    const fn new(execute: ExecuteFn, constant_gas: u64, pops: usize, pushes: usize) -> Self {
        Self {
            execute,
            constant_gas,
            min_stack: pops,
            max_stack: STACK_LIMIT + pops - pushes,
            dynamic_gas: None,
            memory_size: None,
        }
    }

    const fn dynamic(mut self, f: DynamicGasFn) -> Self {
        self.dynamic_gas = Some(f);
        self
    }

    const fn memory(mut self, f: MemorySizeFn) -> Self {
        self.memory_size = Some(f);
        self
    }
}

impl std::fmt::Debug for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instruction")
            .field("constant_gas", &self.constant_gas)
            .field("min_stack", &self.min_stack)
            .field("max_stack", &self.max_stack)
            .finish()
    }
}

/// Opcode-indexed dispatch table. `None` means undefined for this fork.
#[derive(Clone)]
pub struct JumpTable(pub [Option<Instruction>; 256]);

impl JumpTable {
    pub fn get(&self, opcode: u8) -> Option<&Instruction> {
        self.0[opcode as usize].as_ref()
    }

    pub fn is_defined(&self, opcode: u8) -> bool {
        self.0[opcode as usize].is_some()
    }

    fn set(&mut self, opcode: u8, inst: Instruction) {
        self.0[opcode as usize] = Some(inst);
    }

    fn remove(&mut self, opcode: u8) {
        self.0[opcode as usize] = None;
    }
}

pub fn frontier() -> JumpTable {
    let mut t = JumpTable([None; 256]);

    t.set(op::STOP, Instruction::new(op_stop, 0, 0, 0));
    t.set(op::ADD, Instruction::new(op_add, gas::GAS_FASTEST, 2, 1));
    t.set(op::MUL, Instruction::new(op_mul, gas::GAS_FAST, 2, 1));
    t.set(op::SUB, Instruction::new(op_sub, gas::GAS_FASTEST, 2, 1));
    t.set(op::DIV, Instruction::new(op_div, gas::GAS_FAST, 2, 1));
    t.set(op::SDIV, Instruction::new(op_sdiv, gas::GAS_FAST, 2, 1));
    t.set(op::MOD, Instruction::new(op_mod, gas::GAS_FAST, 2, 1));
    t.set(op::SMOD, Instruction::new(op_smod, gas::GAS_FAST, 2, 1));
    t.set(op::ADDMOD, Instruction::new(op_addmod, gas::GAS_MID, 3, 1));
    t.set(op::MULMOD, Instruction::new(op_mulmod, gas::GAS_MID, 3, 1));
    t.set(op::EXP, Instruction::new(op_exp, 0, 2, 1).dynamic(gas::gas_exp_frontier));
    t.set(op::SIGNEXTEND, Instruction::new(op_signextend, gas::GAS_FAST, 2, 1));

    t.set(op::LT, Instruction::new(op_lt, gas::GAS_FASTEST, 2, 1));
    t.set(op::GT, Instruction::new(op_gt, gas::GAS_FASTEST, 2, 1));
    t.set(op::SLT, Instruction::new(op_slt, gas::GAS_FASTEST, 2, 1));
    t.set(op::SGT, Instruction::new(op_sgt, gas::GAS_FASTEST, 2, 1));
    t.set(op::EQ, Instruction::new(op_eq, gas::GAS_FASTEST, 2, 1));
    t.set(op::ISZERO, Instruction::new(op_iszero, gas::GAS_FASTEST, 1, 1));
    t.set(op::AND, Instruction::new(op_and, gas::GAS_FASTEST, 2, 1));
    t.set(op::OR, Instruction::new(op_or, gas::GAS_FASTEST, 2, 1));
    t.set(op::XOR, Instruction::new(op_xor, gas::GAS_FASTEST, 2, 1));
    t.set(op::NOT, Instruction::new(op_not, gas::GAS_FASTEST, 1, 1));
    t.set(op::BYTE, Instruction::new(op_byte, gas::GAS_FASTEST, 2, 1));

    t.set(
        op::KECCAK256,
        Instruction::new(op_keccak256, gas::KECCAK256_GAS, 2, 1)
            .dynamic(gas::gas_keccak256)
            .memory(gas::mem_keccak256),
    );

    t.set(op::ADDRESS, Instruction::new(op_address, gas::GAS_QUICK, 0, 1));
    t.set(op::BALANCE, Instruction::new(op_balance, gas::BALANCE_GAS_FRONTIER, 1, 1));
    t.set(op::ORIGIN, Instruction::new(op_origin, gas::GAS_QUICK, 0, 1));
    t.set(op::CALLER, Instruction::new(op_caller, gas::GAS_QUICK, 0, 1));
    t.set(op::CALLVALUE, Instruction::new(op_callvalue, gas::GAS_QUICK, 0, 1));
    t.set(op::CALLDATALOAD, Instruction::new(op_calldataload, gas::GAS_FASTEST, 1, 1));
    t.set(op::CALLDATASIZE, Instruction::new(op_calldatasize, gas::GAS_QUICK, 0, 1));
    t.set(
        op::CALLDATACOPY,
        Instruction::new(op_calldatacopy, gas::GAS_FASTEST, 3, 0)
            .dynamic(gas::gas_copy)
            .memory(gas::mem_calldata_copy),
    );
    t.set(op::CODESIZE, Instruction::new(op_codesize, gas::GAS_QUICK, 0, 1));
    t.set(
        op::CODECOPY,
        Instruction::new(op_codecopy, gas::GAS_FASTEST, 3, 0)
            .dynamic(gas::gas_copy)
            .memory(gas::mem_calldata_copy),
    );
    t.set(op::GASPRICE, Instruction::new(op_gasprice, gas::GAS_QUICK, 0, 1));
    t.set(op::EXTCODESIZE, Instruction::new(op_extcodesize, gas::GAS_EXT, 1, 1));
    t.set(
        op::EXTCODECOPY,
        Instruction::new(op_extcodecopy, gas::GAS_EXT, 4, 0)
            .dynamic(gas::gas_ext_codecopy)
            .memory(gas::mem_ext_codecopy),
    );

    t.set(op::BLOCKHASH, Instruction::new(op_blockhash, gas::GAS_EXT, 1, 1));
    t.set(op::COINBASE, Instruction::new(op_coinbase, gas::GAS_QUICK, 0, 1));
    t.set(op::TIMESTAMP, Instruction::new(op_timestamp, gas::GAS_QUICK, 0, 1));
    t.set(op::NUMBER, Instruction::new(op_number, gas::GAS_QUICK, 0, 1));
    t.set(op::PREVRANDAO, Instruction::new(op_prevrandao, gas::GAS_QUICK, 0, 1));
    t.set(op::GASLIMIT, Instruction::new(op_gaslimit, gas::GAS_QUICK, 0, 1));

    t.set(op::POP, Instruction::new(op_pop, gas::GAS_QUICK, 1, 0));
    t.set(
        op::MLOAD,
        Instruction::new(op_mload, gas::GAS_FASTEST, 1, 1)
            .dynamic(gas::pure_memory_gas)
            .memory(gas::mem_mload),
    );
    t.set(
        op::MSTORE,
        Instruction::new(op_mstore, gas::GAS_FASTEST, 2, 0)
            .dynamic(gas::pure_memory_gas)
            .memory(gas::mem_mload),
    );
    t.set(
        op::MSTORE8,
        Instruction::new(op_mstore8, gas::GAS_FASTEST, 2, 0)
            .dynamic(gas::pure_memory_gas)
            .memory(gas::mem_mstore8),
    );
    t.set(op::SLOAD, Instruction::new(op_sload, gas::SLOAD_GAS_FRONTIER, 1, 1));
    t.set(op::SSTORE, Instruction::new(op_sstore, 0, 2, 0).dynamic(gas::gas_sstore_legacy));
    t.set(op::JUMP, Instruction::new(op_jump, gas::GAS_MID, 1, 0));
    t.set(op::JUMPI, Instruction::new(op_jumpi, gas::GAS_SLOW, 2, 0));
    t.set(op::PC, Instruction::new(op_pc, gas::GAS_QUICK, 0, 1));
    t.set(op::MSIZE, Instruction::new(op_msize, gas::GAS_QUICK, 0, 1));
    t.set(op::GAS, Instruction::new(op_gas, gas::GAS_QUICK, 0, 1));
    t.set(op::JUMPDEST, Instruction::new(op_jumpdest, gas::JUMPDEST_GAS, 0, 0));

    t.set(op::PUSH1, Instruction::new(op_push::<1>, gas::GAS_FASTEST, 0, 1));
    t.set(0x61, Instruction::new(op_push::<2>, gas::GAS_FASTEST, 0, 1));
    t.set(0x62, Instruction::new(op_push::<3>, gas::GAS_FASTEST, 0, 1));
    t.set(0x63, Instruction::new(op_push::<4>, gas::GAS_FASTEST, 0, 1));
    t.set(0x64, Instruction::new(op_push::<5>, gas::GAS_FASTEST, 0, 1));
    t.set(0x65, Instruction::new(op_push::<6>, gas::GAS_FASTEST, 0, 1));
    t.set(0x66, Instruction::new(op_push::<7>, gas::GAS_FASTEST, 0, 1));
    t.set(0x67, Instruction::new(op_push::<8>, gas::GAS_FASTEST, 0, 1));
    t.set(0x68, Instruction::new(op_push::<9>, gas::GAS_FASTEST, 0, 1));
    t.set(0x69, Instruction::new(op_push::<10>, gas::GAS_FASTEST, 0, 1));
    t.set(0x6A, Instruction::new(op_push::<11>, gas::GAS_FASTEST, 0, 1));
    t.set(0x6B, Instruction::new(op_push::<12>, gas::GAS_FASTEST, 0, 1));
    t.set(0x6C, Instruction::new(op_push::<13>, gas::GAS_FASTEST, 0, 1));
    t.set(0x6D, Instruction::new(op_push::<14>, gas::GAS_FASTEST, 0, 1));
    t.set(0x6E, Instruction::new(op_push::<15>, gas::GAS_FASTEST, 0, 1));
    t.set(0x6F, Instruction::new(op_push::<16>, gas::GAS_FASTEST, 0, 1));
    t.set(0x70, Instruction::new(op_push::<17>, gas::GAS_FASTEST, 0, 1));
    t.set(0x71, Instruction::new(op_push::<18>, gas::GAS_FASTEST, 0, 1));
    t.set(0x72, Instruction::new(op_push::<19>, gas::GAS_FASTEST, 0, 1));
    t.set(0x73, Instruction::new(op_push::<20>, gas::GAS_FASTEST, 0, 1));
    t.set(0x74, Instruction::new(op_push::<21>, gas::GAS_FASTEST, 0, 1));
    t.set(0x75, Instruction::new(op_push::<22>, gas::GAS_FASTEST, 0, 1));
    t.set(0x76, Instruction::new(op_push::<23>, gas::GAS_FASTEST, 0, 1));
    t.set(0x77, Instruction::new(op_push::<24>, gas::GAS_FASTEST, 0, 1));
    t.set(0x78, Instruction::new(op_push::<25>, gas::GAS_FASTEST, 0, 1));
    t.set(0x79, Instruction::new(op_push::<26>, gas::GAS_FASTEST, 0, 1));
    t.set(0x7A, Instruction::new(op_push::<27>, gas::GAS_FASTEST, 0, 1));
    t.set(0x7B, Instruction::new(op_push::<28>, gas::GAS_FASTEST, 0, 1));
    t.set(0x7C, Instruction::new(op_push::<29>, gas::GAS_FASTEST, 0, 1));
    t.set(0x7D, Instruction::new(op_push::<30>, gas::GAS_FASTEST, 0, 1));
    t.set(0x7E, Instruction::new(op_push::<31>, gas::GAS_FASTEST, 0, 1));
    t.set(op::PUSH32, Instruction::new(op_push::<32>, gas::GAS_FASTEST, 0, 1));

    t.set(op::DUP1, Instruction::new(op_dup::<1>, gas::GAS_FASTEST, 1, 2));
    t.set(0x81, Instruction::new(op_dup::<2>, gas::GAS_FASTEST, 2, 3));
    t.set(0x82, Instruction::new(op_dup::<3>, gas::GAS_FASTEST, 3, 4));
    t.set(0x83, Instruction::new(op_dup::<4>, gas::GAS_FASTEST, 4, 5));
    t.set(0x84, Instruction::new(op_dup::<5>, gas::GAS_FASTEST, 5, 6));
    t.set(0x85, Instruction::new(op_dup::<6>, gas::GAS_FASTEST, 6, 7));
    t.set(0x86, Instruction::new(op_dup::<7>, gas::GAS_FASTEST, 7, 8));
    t.set(0x87, Instruction::new(op_dup::<8>, gas::GAS_FASTEST, 8, 9));
    t.set(0x88, Instruction::new(op_dup::<9>, gas::GAS_FASTEST, 9, 10));
    t.set(0x89, Instruction::new(op_dup::<10>, gas::GAS_FASTEST, 10, 11));
    t.set(0x8A, Instruction::new(op_dup::<11>, gas::GAS_FASTEST, 11, 12));
    t.set(0x8B, Instruction::new(op_dup::<12>, gas::GAS_FASTEST, 12, 13));
    t.set(0x8C, Instruction::new(op_dup::<13>, gas::GAS_FASTEST, 13, 14));
    t.set(0x8D, Instruction::new(op_dup::<14>, gas::GAS_FASTEST, 14, 15));
    t.set(0x8E, Instruction::new(op_dup::<15>, gas::GAS_FASTEST, 15, 16));
    t.set(op::DUP16, Instruction::new(op_dup::<16>, gas::GAS_FASTEST, 16, 17));

    t.set(op::SWAP1, Instruction::new(op_swap::<1>, gas::GAS_FASTEST, 2, 2));
    t.set(0x91, Instruction::new(op_swap::<2>, gas::GAS_FASTEST, 3, 3));
    t.set(0x92, Instruction::new(op_swap::<3>, gas::GAS_FASTEST, 4, 4));
    t.set(0x93, Instruction::new(op_swap::<4>, gas::GAS_FASTEST, 5, 5));
    t.set(0x94, Instruction::new(op_swap::<5>, gas::GAS_FASTEST, 6, 6));
    t.set(0x95, Instruction::new(op_swap::<6>, gas::GAS_FASTEST, 7, 7));
    t.set(0x96, Instruction::new(op_swap::<7>, gas::GAS_FASTEST, 8, 8));
    t.set(0x97, Instruction::new(op_swap::<8>, gas::GAS_FASTEST, 9, 9));
    t.set(0x98, Instruction::new(op_swap::<9>, gas::GAS_FASTEST, 10, 10));
    t.set(0x99, Instruction::new(op_swap::<10>, gas::GAS_FASTEST, 11, 11));
    t.set(0x9A, Instruction::new(op_swap::<11>, gas::GAS_FASTEST, 12, 12));
    t.set(0x9B, Instruction::new(op_swap::<12>, gas::GAS_FASTEST, 13, 13));
    t.set(0x9C, Instruction::new(op_swap::<13>, gas::GAS_FASTEST, 14, 14));
    t.set(0x9D, Instruction::new(op_swap::<14>, gas::GAS_FASTEST, 15, 15));
    t.set(0x9E, Instruction::new(op_swap::<15>, gas::GAS_FASTEST, 16, 16));
    t.set(op::SWAP16, Instruction::new(op_swap::<16>, gas::GAS_FASTEST, 17, 17));

    t.set(op::LOG0, Instruction::new(op_log::<0>, 0, 2, 0).dynamic(gas::gas_log0).memory(gas::mem_log));
    t.set(op::LOG1, Instruction::new(op_log::<1>, 0, 3, 0).dynamic(gas::gas_log1).memory(gas::mem_log));
    t.set(op::LOG2, Instruction::new(op_log::<2>, 0, 4, 0).dynamic(gas::gas_log2).memory(gas::mem_log));
    t.set(op::LOG3, Instruction::new(op_log::<3>, 0, 5, 0).dynamic(gas::gas_log3).memory(gas::mem_log));
    t.set(op::LOG4, Instruction::new(op_log::<4>, 0, 6, 0).dynamic(gas::gas_log4).memory(gas::mem_log));

    t.set(
        op::CREATE,
        Instruction::new(op_create, gas::CREATE_GAS, 3, 1)
            .dynamic(gas::gas_create)
            .memory(gas::mem_create),
    );
    t.set(
        op::CALL,
        Instruction::new(op_call, gas::CALL_GAS_FRONTIER, 7, 1)
            .dynamic(gas::gas_call)
            .memory(gas::mem_call),
    );
    t.set(
        op::CALLCODE,
        Instruction::new(op_callcode, gas::CALL_GAS_FRONTIER, 7, 1)
            .dynamic(gas::gas_callcode)
            .memory(gas::mem_call),
    );
    t.set(
        op::RETURN,
        Instruction::new(op_return, 0, 2, 0)
            .dynamic(gas::pure_memory_gas)
            .memory(gas::mem_return),
    );
    t.set(op::SELFDESTRUCT, Instruction::new(op_selfdestruct, 0, 1, 0).dynamic(gas::gas_selfdestruct));

    t
}

pub fn homestead() -> JumpTable {
    let mut t = frontier();
    t.set(
        op::DELEGATECALL,
        Instruction::new(op_delegatecall, gas::CALL_GAS_FRONTIER, 6, 1)
            .dynamic(gas::gas_delegate_call)
            .memory(gas::mem_delegate_call),
    );
    t
}

/// EIP-150 gas repricing.
pub fn tangerine() -> JumpTable {
    let mut t = homestead();
    reprice(&mut t, op::BALANCE, gas::BALANCE_GAS_EIP150);
    reprice(&mut t, op::SLOAD, gas::SLOAD_GAS_EIP150);
    reprice(&mut t, op::EXTCODESIZE, gas::EXTCODE_GAS_EIP150);
    reprice(&mut t, op::EXTCODECOPY, gas::EXTCODE_GAS_EIP150);
    reprice(&mut t, op::CALL, gas::CALL_GAS_EIP150);
    reprice(&mut t, op::CALLCODE, gas::CALL_GAS_EIP150);
    reprice(&mut t, op::DELEGATECALL, gas::CALL_GAS_EIP150);
    t
}

/// EIP-158/160.
pub fn spurious() -> JumpTable {
    let mut t = tangerine();
    redynamic(&mut t, op::EXP, gas::gas_exp_eip158);
    t
}

pub fn byzantium() -> JumpTable {
    let mut t = spurious();
    t.set(op::RETURNDATASIZE, Instruction::new(op_returndatasize, gas::GAS_QUICK, 0, 1));
    t.set(
        op::RETURNDATACOPY,
        Instruction::new(op_returndatacopy, gas::GAS_FASTEST, 3, 0)
            .dynamic(gas::gas_copy)
            .memory(gas::mem_calldata_copy),
    );
    t.set(
        op::STATICCALL,
        Instruction::new(op_staticcall, gas::CALL_GAS_EIP150, 6, 1)
            .dynamic(gas::gas_static_call)
            .memory(gas::mem_delegate_call),
    );
    t.set(
        op::REVERT,
        Instruction::new(op_revert, 0, 2, 0)
            .dynamic(gas::pure_memory_gas)
            .memory(gas::mem_return),
    );
    t
}

pub fn constantinople() -> JumpTable {
    let mut t = byzantium();
    t.set(op::SHL, Instruction::new(op_shl, gas::GAS_FASTEST, 2, 1));
    t.set(op::SHR, Instruction::new(op_shr, gas::GAS_FASTEST, 2, 1));
    t.set(op::SAR, Instruction::new(op_sar, gas::GAS_FASTEST, 2, 1));
    t.set(op::EXTCODEHASH, Instruction::new(op_extcodehash, gas::EXTCODEHASH_GAS_CONSTANTINOPLE, 1, 1));
    t.set(
        op::CREATE2,
        Instruction::new(op_create2, gas::CREATE_GAS, 4, 1)
            .dynamic(gas::gas_create2)
            .memory(gas::mem_create),
    );
    t
}

/// EIP-1884 repricings, EIP-2200 net-metered SSTORE, CHAINID, SELFBALANCE.
pub fn istanbul() -> JumpTable {
    let mut t = constantinople();
    reprice(&mut t, op::BALANCE, gas::BALANCE_GAS_EIP1884);
    reprice(&mut t, op::EXTCODEHASH, gas::EXTCODEHASH_GAS_EIP1884);
    reprice(&mut t, op::SLOAD, gas::SLOAD_GAS_EIP1884);
    redynamic(&mut t, op::SSTORE, gas::gas_sstore_net);
    t.set(op::CHAINID, Instruction::new(op_chainid, gas::GAS_QUICK, 0, 1));
    t.set(op::SELFBALANCE, Instruction::new(op_selfbalance, gas::GAS_FAST, 0, 1));
    t
}

/// EIP-2929: constant costs move into warm/cold dynamic functions.
pub fn berlin() -> JumpTable {
    let mut t = istanbul();
    t.set(op::SLOAD, Instruction::new(op_sload, 0, 1, 1).dynamic(gas::gas_sload_eip2929));
    t.set(op::BALANCE, Instruction::new(op_balance, 0, 1, 1).dynamic(gas::gas_account_access_eip2929));
    t.set(op::EXTCODESIZE, Instruction::new(op_extcodesize, 0, 1, 1).dynamic(gas::gas_account_access_eip2929));
    t.set(op::EXTCODEHASH, Instruction::new(op_extcodehash, 0, 1, 1).dynamic(gas::gas_account_access_eip2929));
    reprice(&mut t, op::EXTCODECOPY, 0);
    reprice(&mut t, op::CALL, gas::WARM_ACCESS_GAS);
    reprice(&mut t, op::CALLCODE, gas::WARM_ACCESS_GAS);
    reprice(&mut t, op::DELEGATECALL, gas::WARM_ACCESS_GAS);
    reprice(&mut t, op::STATICCALL, gas::WARM_ACCESS_GAS);
    t
}

pub fn london() -> JumpTable {
    let mut t = berlin();
    t.set(op::BASEFEE, Instruction::new(op_basefee, gas::GAS_QUICK, 0, 1));
    t
}

pub fn merge() -> JumpTable {
    // PREVRANDAO reuses the 0x44 slot; the handler reads the block's
    // randomness field for every fork.
    london()
}

/// PUSH0 and the EIP-3860 per-word initcode charge.
pub fn shanghai() -> JumpTable {
    let mut t = merge();
    t.set(op::PUSH0, Instruction::new(op_push0, gas::GAS_QUICK, 0, 1));
    redynamic(&mut t, op::CREATE, gas::gas_create_eip3860);
    redynamic(&mut t, op::CREATE2, gas::gas_create2_eip3860);
    t
}

pub fn cancun() -> JumpTable {
    let mut t = shanghai();
    t.set(op::TLOAD, Instruction::new(op_tload, gas::TRANSIENT_STORAGE_GAS, 1, 1));
    t.set(op::TSTORE, Instruction::new(op_tstore, gas::TRANSIENT_STORAGE_GAS, 2, 0));
    t.set(
        op::MCOPY,
        Instruction::new(op_mcopy, gas::GAS_FASTEST, 3, 0)
            .dynamic(gas::gas_mcopy)
            .memory(gas::mem_mcopy),
    );
    t
}

/// Table for code running inside a validated container: the dynamic-jump
/// and code-introspection opcodes are removed, the structured control-flow
/// opcodes added. Stack bounds for CALLF/RETF/JUMPF are proven at
/// validation time, not checked here.
pub fn eof() -> JumpTable {
    let mut t = cancun();
    for op in [
        op::JUMP,
        op::JUMPI,
        op::PC,
        op::JUMPDEST,
        op::SELFDESTRUCT,
        op::CALLCODE,
        op::CREATE,
        op::CREATE2,
        op::CALL,
        op::DELEGATECALL,
        op::STATICCALL,
        op::GAS,
        op::CODESIZE,
        op::CODECOPY,
        op::EXTCODESIZE,
        op::EXTCODECOPY,
        op::EXTCODEHASH,
    ] {
        t.remove(op);
    }
    t.set(op::RJUMP, Instruction::new(op_rjump, gas::RJUMP_GAS, 0, 0));
    t.set(op::RJUMPI, Instruction::new(op_rjumpi, gas::RJUMPI_GAS, 1, 0));
    t.set(op::RJUMPV, Instruction::new(op_rjumpv, gas::RJUMPV_GAS, 1, 0));
    t.set(op::CALLF, Instruction::new(op_callf, gas::CALLF_GAS, 0, 0));
    t.set(op::RETF, Instruction::new(op_retf, gas::RETF_GAS, 0, 0));
    t.set(op::JUMPF, Instruction::new(op_jumpf, gas::JUMPF_GAS, 0, 0));
    t
}

/// The legacy-code table for a fork. EOF frames always use `eof()`.
pub fn table_for(rules: &crate::context::ChainRules) -> JumpTable {
    use crate::context::Fork;
    match rules.fork {
        Fork::Frontier => frontier(),
        Fork::Homestead => homestead(),
        Fork::TangerineWhistle => tangerine(),
        Fork::SpuriousDragon => spurious(),
        Fork::Byzantium => byzantium(),
        Fork::Constantinople => constantinople(),
        Fork::Istanbul => istanbul(),
        Fork::Berlin => berlin(),
        Fork::London => london(),
        Fork::Merge => merge(),
        Fork::Shanghai => shanghai(),
        Fork::Cancun | Fork::Prague => cancun(),
    }
}

fn reprice(t: &mut JumpTable, opcode: u8, constant_gas: u64) {
    if let Some(inst) = t.0[opcode as usize].as_mut() {
        inst.constant_gas = constant_gas;
    }
}

fn redynamic(t: &mut JumpTable, opcode: u8, f: DynamicGasFn) {
    if let Some(inst) = t.0[opcode as usize].as_mut() {
        inst.dynamic_gas = Some(f);
    }
}
