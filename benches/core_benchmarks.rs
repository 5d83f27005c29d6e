//! Criterion benchmarks for IONA EVM core operations.
//!
//! Run: cargo bench --locked
//! Results written to target/criterion/

use alloy_primitives::{Address, Bytes, U256};
use iona_evm::eof::validation::validate_container;
use iona_evm::eof::{Container, FunctionMetadata, NON_RETURNING};
use iona_evm::jump_table;
use iona_evm::state::StateDB;
use iona_evm::{BlockContext, ChainRules, Evm, EvmConfig, Fork, MemoryState, TxContext};

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

// ── Helpers ──────────────────────────────────────────────────────────────

fn caller() -> Address {
    Address::repeat_byte(0xAA)
}

fn contract() -> Address {
    Address::repeat_byte(0xCC)
}

fn run(code: &[u8], gas: u64) -> u64 {
    let mut state = MemoryState::new();
    state.set_code(contract(), Bytes::copy_from_slice(code));
    let mut evm = Evm::new(
        &mut state,
        BlockContext::default(),
        TxContext::default(),
        ChainRules::new(Fork::Cancun),
        EvmConfig::default(),
    );
    let result = evm.call(caller(), contract(), Bytes::new(), gas, U256::ZERO, false);
    assert!(result.success, "benchmark bytecode faulted");
    gas - result.gas_left
}

/// Countdown loop executing `n` iterations of SUB/DUP1/JUMPI.
fn countdown_code(n: u16) -> Vec<u8> {
    vec![
        0x61, (n >> 8) as u8, n as u8, // PUSH2 n
        0x5B, // JUMPDEST (offset 3)
        0x60, 1, // PUSH1 1
        0x90, // SWAP1
        0x03, // SUB
        0x80, // DUP1
        0x60, 3, // PUSH1 3
        0x57, // JUMPI
        0x00, // STOP
    ]
}

/// Write then read back `n` distinct storage slots.
fn storage_code(n: u8) -> Vec<u8> {
    let mut code = Vec::new();
    for i in 0..n {
        code.extend_from_slice(&[0x60, i, 0x60, i, 0x55]); // SSTORE(i, i)
    }
    for i in 0..n {
        code.extend_from_slice(&[0x60, i, 0x54, 0x50]); // SLOAD(i), POP
    }
    code.push(0x00);
    code
}

// ── Interpreter benchmarks ──────────────────────────────────────────────

fn bench_interpreter_loop(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpreter");

    for n_iters in [16u16, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("countdown", n_iters), &n_iters, |b, &n| {
            let code = countdown_code(n);
            b.iter(|| run(black_box(&code), 10_000_000));
        });
    }

    group.finish();
}

fn bench_keccak(c: &mut Criterion) {
    let mut group = c.benchmark_group("keccak");

    for size in [32u16, 256, 1024] {
        group.bench_with_input(BenchmarkId::new("hash", size), &size, |b, &size| {
            // KECCAK256 over `size` zero bytes of fresh memory.
            let code = vec![
                0x61, (size >> 8) as u8, size as u8, // PUSH2 size
                0x60, 0, // PUSH1 0
                0x20, // KECCAK256
                0x50, // POP
                0x00, // STOP
            ];
            b.iter(|| run(black_box(&code), 10_000_000));
        });
    }

    group.finish();
}

fn bench_storage(c: &mut Criterion) {
    let mut group = c.benchmark_group("storage");

    for n_slots in [1u8, 16, 64] {
        group.bench_with_input(
            BenchmarkId::new("sstore_sload", n_slots),
            &n_slots,
            |b, &n| {
                let code = storage_code(n);
                b.iter(|| run(black_box(&code), 10_000_000));
            },
        );
    }

    group.finish();
}

// ── Validation benchmarks ───────────────────────────────────────────────

fn bench_eof_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("eof_validation");

    for n_pairs in [64usize, 512, 4096] {
        group.bench_with_input(BenchmarkId::new("validate", n_pairs), &n_pairs, |b, &n| {
            // A straight-line section of n PUSH1/POP pairs.
            let mut code = Vec::with_capacity(3 * n + 1);
            for _ in 0..n {
                code.extend_from_slice(&[0x60, 1, 0x50]);
            }
            code.push(0x00);
            let container = Container::single(
                FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 1 },
                code,
            );
            b.iter(|| validate_container(black_box(&container)));
        });
    }

    group.finish();
}

fn bench_jump_table_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("jump_table");

    group.bench_function("build_cancun", |b| {
        let rules = ChainRules::new(Fork::Cancun);
        b.iter(|| jump_table::table_for(black_box(&rules)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_interpreter_loop,
    bench_keccak,
    bench_storage,
    bench_eof_validation,
    bench_jump_table_build,
);
criterion_main!(benches);
