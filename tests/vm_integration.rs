//! Integration tests for the IONA EVM.
//!
//! Tests cover:
//! - Opcode correctness observed through RETURN payloads
//! - Gas accounting, including exact exhaustion boundaries and warm/cold
//!   access pricing
//! - Revert/fault semantics (state rollback, gas consumption)
//! - Contract deploy + call lifecycle through CREATE/CREATE2
//! - Static-call write protection, logs, transient storage, selfdestruct
//! - Precompile dispatch

use alloy_primitives::{address, hex, Address, Bytes, U256};
use iona_evm::state::StateDB;
use iona_evm::{
    BlockContext, ChainRules, Evm, EvmConfig, Fork, MemoryState, TxContext,
};

// ── Helpers ────────────────────────────────────────────────────────────────

fn caller() -> Address {
    address!("00000000000000000000000000000000000000aa")
}

fn contract() -> Address {
    address!("00000000000000000000000000000000000000cc")
}

fn state_with(code: &[u8]) -> MemoryState {
    let mut state = MemoryState::new();
    state.set_code(contract(), Bytes::copy_from_slice(code));
    state
}

fn evm_on(state: &mut MemoryState, fork: Fork) -> Evm<'_> {
    Evm::new(
        state,
        BlockContext::default(),
        TxContext::default(),
        ChainRules::new(fork),
        EvmConfig::default(),
    )
}

fn run(fork: Fork, code: &[u8], gas: u64) -> iona_evm::CallResult {
    let mut state = state_with(code);
    let mut evm = evm_on(&mut state, fork);
    evm.call(caller(), contract(), Bytes::new(), gas, U256::ZERO, false)
}

/// Trailing `MSTORE(0, top-of-stack); RETURN(0, 32)`.
fn return_top() -> Vec<u8> {
    vec![0x60, 0, 0x52, 0x60, 32, 0x60, 0, 0xF3]
}

fn returned_word(result: &iona_evm::CallResult) -> U256 {
    assert!(result.success, "call failed: {result:?}");
    assert_eq!(result.output.len(), 32);
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&result.output);
    U256::from_be_bytes(buf)
}

/// Constructor that stores `runtime` in memory byte by byte and returns it.
fn constructor_for(runtime: &[u8]) -> Vec<u8> {
    let mut code = Vec::new();
    for (i, &byte) in runtime.iter().enumerate() {
        code.extend_from_slice(&[0x60, byte, 0x60, i as u8, 0x53]); // PUSH1 b, PUSH1 i, MSTORE8
    }
    code.extend_from_slice(&[0x60, runtime.len() as u8, 0x60, 0, 0xF3]);
    code
}

/// Runtime code returning 42 as a 32-byte word.
fn return_42() -> Vec<u8> {
    let mut code = vec![0x60, 42];
    code.extend(return_top());
    code
}

// ── Arithmetic through RETURN ──────────────────────────────────────────────

#[test]
fn test_add_returns_sum() {
    let mut code = vec![0x60, 3, 0x60, 4, 0x01]; // PUSH1 3, PUSH1 4, ADD
    code.extend(return_top());
    let r = run(Fork::Cancun, &code, 100_000);
    assert_eq!(returned_word(&r), U256::from(7));
}

#[test]
fn test_sub_wraps_below_zero() {
    // 0 - 1 == 2^256 - 1. SUB pops x then y, computing x - y.
    let mut code = vec![0x60, 1, 0x60, 0, 0x03]; // PUSH1 1, PUSH1 0, SUB
    code.extend(return_top());
    let r = run(Fork::Cancun, &code, 100_000);
    assert_eq!(returned_word(&r), U256::MAX);
}

#[test]
fn test_div_by_zero_is_zero() {
    let mut code = vec![0x60, 0, 0x60, 7, 0x04]; // 7 / 0
    code.extend(return_top());
    let r = run(Fork::Cancun, &code, 100_000);
    assert_eq!(returned_word(&r), U256::ZERO);
}

#[test]
fn test_exp() {
    let mut code = vec![0x60, 10, 0x60, 2, 0x0A]; // 2 ** 10
    code.extend(return_top());
    let r = run(Fork::Cancun, &code, 100_000);
    assert_eq!(returned_word(&r), U256::from(1024));
}

#[test]
fn test_signextend_byte() {
    // SIGNEXTEND(0, 0xFF) == -1
    let mut code = vec![0x60, 0xFF, 0x60, 0, 0x0B];
    code.extend(return_top());
    let r = run(Fork::Cancun, &code, 100_000);
    assert_eq!(returned_word(&r), U256::MAX);
}

#[test]
fn test_implicit_stop_past_end_of_code() {
    // Code that just pushes: falls off the end, halts cleanly.
    let r = run(Fork::Cancun, &[0x60, 1], 100_000);
    assert!(r.success);
    assert!(r.output.is_empty());
}

// ── Gas accounting ─────────────────────────────────────────────────────────

#[test]
fn test_exact_gas_boundary() {
    // PUSH1 + PUSH1 + ADD = 3 + 3 + 3 = 9 gas; STOP is free.
    let code = [0x60, 1, 0x60, 2, 0x01, 0x00];
    let exact = run(Fork::Cancun, &code, 9);
    assert!(exact.success);
    assert_eq!(exact.gas_left, 0);

    let short = run(Fork::Cancun, &code, 8);
    assert!(!short.success);
    assert_eq!(short.gas_left, 0, "a fault consumes all frame gas");
}

#[test]
fn test_memory_expansion_charged_once() {
    // Two MSTOREs to the same word: expansion paid once.
    // PUSH1 1, PUSH1 0, MSTORE, PUSH1 2, PUSH1 0, MSTORE, STOP
    let code = [0x60, 1, 0x60, 0, 0x52, 0x60, 2, 0x60, 0, 0x52, 0x00];
    let r = run(Fork::Cancun, &code, 100_000);
    assert!(r.success);
    // 4 pushes + 2 mstores at 3 each, plus one 1-word expansion fee of 3.
    assert_eq!(100_000 - r.gas_left, 6 * 3 + 3);
}

#[test]
fn test_cold_then_warm_sload_pricing() {
    // PUSH1 0, SLOAD, POP, PUSH1 0, SLOAD, POP, STOP
    let code = [0x60, 0, 0x54, 0x50, 0x60, 0, 0x54, 0x50, 0x00];
    let r = run(Fork::Cancun, &code, 100_000);
    assert!(r.success);
    // 3 + 2100 + 2 + 3 + 100 + 2
    assert_eq!(100_000 - r.gas_left, 2210);
}

#[test]
fn test_quadratic_memory_cost() {
    // MLOAD at offset 31744 forces 993 words of memory.
    // PUSH2 0x7C00, MLOAD, STOP
    let code = [0x61, 0x7C, 0x00, 0x51, 0x00];
    let r = run(Fork::Cancun, &code, 100_000);
    assert!(r.success);
    let words = 993u64;
    let expansion = 3 * words + words * words / 512;
    assert_eq!(100_000 - r.gas_left, 3 + 3 + expansion);
}

#[test]
fn test_mcopy_overlap_both_directions() {
    let mut pattern = [0u8; 32];
    for (i, b) in pattern.iter_mut().enumerate() {
        *b = i as u8 + 1;
    }
    let seed = {
        let mut c = vec![0x7F]; // PUSH32 pattern
        c.extend_from_slice(&pattern);
        c.extend_from_slice(&[0x60, 0, 0x52]); // MSTORE(0)
        c
    };

    // dst > src: shift mem[0..31] up one byte.
    let mut code = seed.clone();
    code.extend_from_slice(&[0x60, 31, 0x60, 0, 0x60, 1, 0x5E]); // MCOPY(1, 0, 31)
    code.extend_from_slice(&[0x60, 32, 0x60, 0, 0xF3]); // RETURN(0, 32)
    let r = run(Fork::Cancun, &code, 100_000);
    assert!(r.success, "call failed: {r:?}");
    let mut want = [0u8; 32];
    want[0] = 1;
    want[1..].copy_from_slice(&pattern[..31]);
    assert_eq!(r.output.as_ref(), &want[..]);

    // dst < src: shift mem[1..32] down one byte.
    let mut code = seed;
    code.extend_from_slice(&[0x60, 31, 0x60, 1, 0x60, 0, 0x5E]); // MCOPY(0, 1, 31)
    code.extend_from_slice(&[0x60, 32, 0x60, 0, 0xF3]);
    let r = run(Fork::Cancun, &code, 100_000);
    assert!(r.success, "call failed: {r:?}");
    let mut want = [0u8; 32];
    want[..31].copy_from_slice(&pattern[1..]);
    want[31] = 32;
    assert_eq!(r.output.as_ref(), &want[..]);
}

#[test]
fn test_mcopy_gas_charge() {
    // Copy one word onto itself in fresh memory.
    // PUSH1 32, PUSH1 0, PUSH1 0, MCOPY, STOP
    let code = [0x60, 32, 0x60, 0, 0x60, 0, 0x5E, 0x00];
    let r = run(Fork::Cancun, &code, 100_000);
    assert!(r.success);
    // 3 pushes, MCOPY base 3, 1-word expansion 3, 1 copy word at 3.
    assert_eq!(100_000 - r.gas_left, 9 + 3 + 3 + 3);
}

// ── Revert and fault semantics ─────────────────────────────────────────────

#[test]
fn test_revert_returns_payload_and_keeps_gas() {
    // MSTORE8(0, 0x2A); REVERT(0, 1)
    let code = [0x60, 0x2A, 0x60, 0, 0x53, 0x60, 1, 0x60, 0, 0xFD];
    let r = run(Fork::Cancun, &code, 100_000);
    assert!(!r.success);
    assert!(r.gas_left > 90_000, "revert must not consume remaining gas");
    assert_eq!(r.output.as_ref(), &[0x2A]);
}

#[test]
fn test_revert_rolls_back_storage() {
    // SSTORE(0, 1) then REVERT(0, 0)
    let code = [0x60, 1, 0x60, 0, 0x55, 0x60, 0, 0x60, 0, 0xFD];
    let mut state = state_with(&code);
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::ZERO, false);
    assert!(!r.success);
    assert!(state.get_state(contract(), U256::ZERO).is_zero());
}

#[test]
fn test_invalid_opcode_consumes_all_gas() {
    let r = run(Fork::Cancun, &[0x60, 1, 0xFE], 100_000);
    assert!(!r.success);
    assert_eq!(r.gas_left, 0);
}

#[test]
fn test_jump_into_push_payload_faults() {
    // PUSH1 1, JUMP - offset 1 is the push immediate, not an instruction.
    let r = run(Fork::Cancun, &[0x60, 1, 0x56, 0x5B, 0x00], 100_000);
    assert!(!r.success);
    assert_eq!(r.gas_left, 0);
}

#[test]
fn test_jump_to_jumpdest_succeeds() {
    // PUSH1 4, JUMP, INVALID, JUMPDEST, STOP
    let r = run(Fork::Cancun, &[0x60, 4, 0x56, 0xFE, 0x5B, 0x00], 100_000);
    assert!(r.success);
}

#[test]
fn test_stack_underflow_faults() {
    let r = run(Fork::Cancun, &[0x01], 100_000); // ADD on empty stack
    assert!(!r.success);
    assert_eq!(r.gas_left, 0);
}

// ── Storage, logs, transient storage ───────────────────────────────────────

#[test]
fn test_sstore_then_sload() {
    // SSTORE(key=5, value=42); SLOAD(5); return it
    let mut code = vec![0x60, 42, 0x60, 5, 0x55, 0x60, 5, 0x54];
    code.extend(return_top());
    let mut state = state_with(&code);
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::ZERO, false);
    assert_eq!(returned_word(&r), U256::from(42));
    assert_eq!(state.get_state(contract(), U256::from(5)), U256::from(42));
}

#[test]
fn test_sstore_clear_records_refund() {
    let code = [0x60, 0, 0x60, 1, 0x55, 0x00]; // SSTORE(1, 0)
    let mut state = state_with(&code);
    state.seed_storage(contract(), U256::from(1), U256::from(5));
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::ZERO, false);
    assert!(r.success);
    assert_eq!(state.get_refund(), 4_800, "EIP-3529 clear refund");
}

#[test]
fn test_log1_records_topic_and_data() {
    // MSTORE8(0, 0xAA); LOG1(offset 0, size 1, topic 0x42)
    let code = [0x60, 0xAA, 0x60, 0, 0x53, 0x60, 0x42, 0x60, 1, 0x60, 0, 0xA1, 0x00];
    let mut state = state_with(&code);
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::ZERO, false);
    assert!(r.success);
    let logs = state.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].address, contract());
    assert_eq!(logs[0].topics.len(), 1);
    assert_eq!(logs[0].topics[0].as_slice()[31], 0x42);
    assert_eq!(logs[0].data, vec![0xAA]);
}

#[test]
fn test_transient_storage_roundtrip() {
    // TSTORE(0, 42); TLOAD(0); return it
    let mut code = vec![0x60, 42, 0x60, 0, 0x5D, 0x60, 0, 0x5C];
    code.extend(return_top());
    let r = run(Fork::Cancun, &code, 100_000);
    assert_eq!(returned_word(&r), U256::from(42));
}

#[test]
fn test_tload_undefined_before_cancun() {
    let r = run(Fork::Shanghai, &[0x60, 0, 0x5C, 0x00], 100_000);
    assert!(!r.success);
    assert_eq!(r.gas_left, 0);
}

// ── Calls ──────────────────────────────────────────────────────────────────

fn child() -> Address {
    address!("00000000000000000000000000000000000000dd")
}

/// CALL `child()` with no value and no input, then execute `after`.
fn call_child_then(after: &[u8]) -> Vec<u8> {
    let mut code = vec![
        0x60, 0, // ret_len
        0x60, 0, // ret_off
        0x60, 0, // in_len
        0x60, 0, // in_off
        0x60, 0, // value
        0x73, // PUSH20 child address
    ];
    code.extend_from_slice(child().as_slice());
    code.extend_from_slice(&[0x62, 0xFF, 0xFF, 0xFF]); // PUSH3 gas
    code.push(0xF1); // CALL
    code.extend_from_slice(after);
    code
}

#[test]
fn test_call_and_returndatacopy() {
    // Parent calls child (returns word 42), then copies the full return
    // buffer to memory and returns it.
    let after = [
        0x50, // POP call result
        0x60, 32, 0x60, 0, 0x60, 0, 0x3E, // RETURNDATACOPY(0, 0, 32)
        0x60, 32, 0x60, 0, 0xF3, // RETURN(0, 32)
    ];
    let parent = call_child_then(&after);
    let mut state = state_with(&parent);
    state.set_code(child(), Bytes::from(return_42()));
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 500_000, U256::ZERO, false);
    assert_eq!(returned_word(&r), U256::from(42));
}

#[test]
fn test_returndatacopy_out_of_bounds_faults() {
    // Child returns 32 bytes; copying 33 must fault the parent.
    let after = [
        0x50,
        0x60, 33, 0x60, 0, 0x60, 0, 0x3E, // RETURNDATACOPY(0, 0, 33)
        0x00,
    ];
    let parent = call_child_then(&after);
    let mut state = state_with(&parent);
    state.set_code(child(), Bytes::from(return_42()));
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 500_000, U256::ZERO, false);
    assert!(!r.success);
    assert_eq!(r.gas_left, 0);
}

#[test]
fn test_staticcall_blocks_writes_in_child() {
    // Child attempts SSTORE; parent STATICCALLs it and returns the flag.
    let mut parent = vec![
        0x60, 0, // ret_len
        0x60, 0, // ret_off
        0x60, 0, // in_len
        0x60, 0, // in_off
        0x73, // PUSH20 child
    ];
    parent.extend_from_slice(child().as_slice());
    parent.extend_from_slice(&[0x62, 0xFF, 0xFF, 0xFF]); // PUSH3 gas
    parent.push(0xFA); // STATICCALL
    parent.extend(return_top());

    let mut state = state_with(&parent);
    state.set_code(child(), Bytes::from(vec![0x60, 1, 0x60, 0, 0x55, 0x00]));
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 500_000, U256::ZERO, false);
    // Child faulted with WriteProtection; parent observes a 0 flag.
    assert_eq!(returned_word(&r), U256::ZERO);
    assert!(state.get_state(child(), U256::ZERO).is_zero());
}

#[test]
fn test_call_transfers_value() {
    let code = [0x00]; // STOP
    let mut state = state_with(&code);
    state.add_balance(caller(), U256::from(1000));
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::from(300), false);
    assert!(r.success);
    assert_eq!(state.get_balance(contract()), U256::from(300));
    assert_eq!(state.get_balance(caller()), U256::from(700));
}

#[test]
fn test_call_insufficient_balance_fails_without_fault() {
    let code = [0x00];
    let mut state = state_with(&code);
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::from(300), false);
    assert!(!r.success);
    assert_eq!(r.gas_left, 100_000, "the failed transfer returns all gas");
}

// ── Create lifecycle ───────────────────────────────────────────────────────

#[test]
fn test_create_deploy_then_call() {
    let mut state = MemoryState::new();
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let init = constructor_for(&return_42());
    let created = evm.create(caller(), U256::ZERO, Bytes::from(init), 1_000_000);
    let addr = created.address.expect("deploy failed");
    assert_eq!(addr, iona_evm::evm::create_address(caller(), 0));

    let r = evm.call(caller(), addr, Bytes::new(), 100_000, U256::ZERO, false);
    assert_eq!(returned_word(&r), U256::from(42));
    assert_eq!(state.get_code(addr), Bytes::from(return_42()));
    assert_eq!(state.get_nonce(caller()), 1);
}

#[test]
fn test_create2_is_salt_deterministic() {
    let init = constructor_for(&return_42());
    let expected = iona_evm::evm::create2_address(caller(), U256::from(7), &init);

    let mut state = MemoryState::new();
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let created = evm.create2(caller(), U256::ZERO, Bytes::from(init), U256::from(7), 1_000_000);
    assert_eq!(created.address, Some(expected));
}

#[test]
fn test_create_collision_burns_gas() {
    let mut state = MemoryState::new();
    let target = iona_evm::evm::create_address(caller(), 0);
    state.set_nonce(target, 3);
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let created = evm.create(caller(), U256::ZERO, Bytes::from(vec![0x00]), 1_000_000);
    assert!(created.address.is_none());
    assert_eq!(created.gas_left, 0);
}

#[test]
fn test_deployed_code_may_not_start_with_ef() {
    // Constructor returning a single 0xEF byte.
    let init = constructor_for(&[0xEF]);
    let mut state = MemoryState::new();
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let created = evm.create(caller(), U256::ZERO, Bytes::from(init), 1_000_000);
    assert!(created.address.is_none());
    assert_eq!(created.gas_left, 0);
}

#[test]
fn test_oversize_code_deposit_rejected() {
    // RETURN(0, 24577): one byte over the EIP-170 cap.
    let init = vec![0x61, 0x60, 0x01, 0x60, 0, 0xF3]; // PUSH2 0x6001, PUSH1 0, RETURN
    let mut state = MemoryState::new();
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let created = evm.create(caller(), U256::ZERO, Bytes::from(init), 10_000_000);
    assert!(created.address.is_none());
    assert_eq!(created.gas_left, 0);
}

#[test]
fn test_initcode_size_cap_post_shanghai() {
    let init = vec![0u8; 49_153];
    let mut state = MemoryState::new();
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let created = evm.create(caller(), U256::ZERO, Bytes::from(init), 1_000_000);
    assert!(created.address.is_none());
    assert_eq!(created.gas_left, 1_000_000, "rejected before execution, gas returned");
}

// ── Selfdestruct ───────────────────────────────────────────────────────────

#[test]
fn test_selfdestruct_moves_balance() {
    let beneficiary = address!("00000000000000000000000000000000000000ee");
    let mut code = vec![0x73]; // PUSH20
    code.extend_from_slice(beneficiary.as_slice());
    code.push(0xFF); // SELFDESTRUCT

    let mut state = state_with(&code);
    state.add_balance(contract(), U256::from(500));
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::ZERO, false);
    assert!(r.success);
    assert_eq!(state.get_balance(beneficiary), U256::from(500));
    assert!(state.get_balance(contract()).is_zero());
    assert!(state.has_self_destructed(contract()));
}

// ── Precompiles ────────────────────────────────────────────────────────────

#[test]
fn test_sha256_precompile() {
    let mut state = MemoryState::new();
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(
        caller(),
        address!("0000000000000000000000000000000000000002"),
        Bytes::from_static(b"abc"),
        100_000,
        U256::ZERO,
        false,
    );
    assert!(r.success);
    assert_eq!(
        r.output.as_ref(),
        hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
    );
    assert_eq!(r.gas_left, 100_000 - 72);
}

#[test]
fn test_identity_precompile() {
    let mut state = MemoryState::new();
    let mut evm = evm_on(&mut state, Fork::Cancun);
    let r = evm.call(
        caller(),
        address!("0000000000000000000000000000000000000004"),
        Bytes::from_static(&[1, 2, 3]),
        100_000,
        U256::ZERO,
        false,
    );
    assert!(r.success);
    assert_eq!(r.output.as_ref(), &[1, 2, 3]);
}

// ── Fork gating and abort ──────────────────────────────────────────────────

#[test]
fn test_push0_undefined_before_shanghai() {
    assert!(!run(Fork::Merge, &[0x5F, 0x00], 100_000).success);
    assert!(run(Fork::Shanghai, &[0x5F, 0x00], 100_000).success);
}

#[test]
fn test_frontier_sload_price() {
    let code = [0x60, 0, 0x54, 0x00];
    let r = run(Fork::Frontier, &code, 100_000);
    assert!(r.success);
    assert_eq!(100_000 - r.gas_left, 3 + 50);
}

#[test]
fn test_abort_stops_without_consuming_gas() {
    let code = [0x60, 1, 0x60, 2, 0x01, 0x00];
    let mut state = state_with(&code);
    let mut evm = evm_on(&mut state, Fork::Cancun);
    evm.cancel();
    let r = evm.call(caller(), contract(), Bytes::new(), 100_000, U256::ZERO, false);
    assert!(!r.success);
    assert_eq!(r.gas_left, 100_000, "an abort charges nothing");
}
