#![no_main]
use libfuzzer_sys::fuzz_target;

// Fuzz the interpreter with arbitrary bytecode.
//
// Safety guarantee: executing arbitrary bytecode must NEVER panic.
// All failures (out-of-gas, invalid opcode, stack underflow, bad jumps,
// return-data violations, etc.) must surface as a failed CallResult.
fuzz_target!(|data: &[u8]| {
    use alloy_primitives::{Address, Bytes, U256};
    use iona_evm::state::StateDB;
    use iona_evm::{BlockContext, ChainRules, Evm, EvmConfig, Fork, MemoryState, TxContext};

    // First byte picks the fork, next 32 are calldata, the rest is code.
    let (fork, rest) = match data.split_first() {
        Some((&f, rest)) => {
            let forks = [
                Fork::Frontier,
                Fork::Homestead,
                Fork::TangerineWhistle,
                Fork::SpuriousDragon,
                Fork::Byzantium,
                Fork::Constantinople,
                Fork::Istanbul,
                Fork::Berlin,
                Fork::London,
                Fork::Merge,
                Fork::Shanghai,
                Fork::Cancun,
            ];
            (forks[f as usize % forks.len()], rest)
        }
        None => (Fork::Cancun, data),
    };
    let split = rest.len().min(32);
    let (calldata, code) = rest.split_at(split);

    let caller = Address::repeat_byte(0xAA);
    let contract = Address::repeat_byte(0xCC);

    let mut state = MemoryState::new();
    state.set_code(contract, Bytes::copy_from_slice(code));
    state.add_balance(caller, U256::from(1u64 << 40));

    let mut evm = Evm::new(
        &mut state,
        BlockContext::default(),
        TxContext::default(),
        ChainRules::new(fork),
        EvmConfig::default(),
    );

    // Bounded gas keeps a single input fast; nested calls and creates are
    // reachable through the call-family opcodes in the fuzzed code.
    let result = evm.call(
        caller,
        contract,
        Bytes::copy_from_slice(calldata),
        200_000,
        U256::from(1),
        false,
    );

    // Gas can only be consumed, never minted.
    assert!(result.gas_left <= 200_000);
});
