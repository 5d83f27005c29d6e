//! Fork selection and execution context.
//!
//! The active fork decides which instruction table and gas schedule apply.
//! Everything is plain data passed into the EVM at construction — there are
//! no process-wide singletons.

use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Protocol upgrades in activation order. Later forks include everything
/// the earlier ones enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Fork {
    Frontier,
    Homestead,
    TangerineWhistle,
    SpuriousDragon,
    Byzantium,
    Constantinople,
    Istanbul,
    Berlin,
    London,
    Merge,
    Shanghai,
    Cancun,
    /// Enables EOF container execution alongside legacy code.
    Prague,
}

/// Flattened feature switches derived from the fork, mirroring how the rest
/// of the node consumes chain configuration. The interpreter dispatches only
/// through these and the jump table, never by comparing forks inline.
#[derive(Debug, Clone, Copy)]
pub struct ChainRules {
    pub fork: Fork,
    pub is_homestead: bool,
    pub is_eip150: bool,
    pub is_eip158: bool,
    pub is_byzantium: bool,
    pub is_constantinople: bool,
    pub is_istanbul: bool,
    pub is_berlin: bool,
    pub is_london: bool,
    pub is_merge: bool,
    pub is_shanghai: bool,
    pub is_cancun: bool,
    pub is_eof: bool,
}

impl ChainRules {
    pub fn new(fork: Fork) -> Self {
        Self {
            fork,
            is_homestead: fork >= Fork::Homestead,
            is_eip150: fork >= Fork::TangerineWhistle,
            is_eip158: fork >= Fork::SpuriousDragon,
            is_byzantium: fork >= Fork::Byzantium,
            is_constantinople: fork >= Fork::Constantinople,
            is_istanbul: fork >= Fork::Istanbul,
            is_berlin: fork >= Fork::Berlin,
            is_london: fork >= Fork::London,
            is_merge: fork >= Fork::Merge,
            is_shanghai: fork >= Fork::Shanghai,
            is_cancun: fork >= Fork::Cancun,
            is_eof: fork >= Fork::Prague,
        }
    }
}

/// Per-block environment, provided by the block producer / importer.
#[derive(Debug, Clone, Default)]
pub struct BlockContext {
    pub coinbase: Address,
    pub number: u64,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub base_fee: U256,
    pub prev_randao: B256,
    pub chain_id: u64,
    /// Hashes of the most recent 256 ancestors, for BLOCKHASH.
    pub recent_hashes: BTreeMap<u64, B256>,
}

impl BlockContext {
    /// BLOCKHASH semantics: only the 256 most recent blocks resolve,
    /// everything else is zero.
    pub fn block_hash(&self, number: u64) -> B256 {
        if number >= self.number || self.number - number > 256 {
            return B256::ZERO;
        }
        self.recent_hashes.get(&number).copied().unwrap_or(B256::ZERO)
    }
}

/// Per-transaction environment.
#[derive(Debug, Clone, Default)]
pub struct TxContext {
    pub origin: Address,
    pub gas_price: U256,
}

/// Interpreter knobs. Constructed once by the surrounding node logic and
/// handed to the EVM by value.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvmConfig {
    /// Skip the EIP-1559 base fee (gas-price-0 RPC calls).
    pub no_base_fee: bool,
}
