//! Precompiled contracts.
//!
//! Precompiles are addressed like contracts but dispatched before code
//! lookup. Gas is charged up front from the forwarded gas; an insufficient
//! budget faults the sub-call with `OutOfGas` and the usual
//! all-gas-consumed semantics.

use crate::errors::VmError;
use crate::gas;
use alloy_primitives::{address, Address, Bytes};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

pub const SHA256_BASE_GAS: u64 = 60;
pub const SHA256_WORD_GAS: u64 = 12;
pub const IDENTITY_BASE_GAS: u64 = 15;
pub const IDENTITY_WORD_GAS: u64 = 3;

pub trait Precompile: Send + Sync {
    fn required_gas(&self, input: &[u8]) -> u64;
    fn run(&self, input: &[u8]) -> Result<Bytes, VmError>;
}

struct Sha256Hash;

impl Precompile for Sha256Hash {
    fn required_gas(&self, input: &[u8]) -> u64 {
        SHA256_BASE_GAS + SHA256_WORD_GAS * gas::to_word_size(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> Result<Bytes, VmError> {
        let digest = Sha256::digest(input);
        Ok(Bytes::copy_from_slice(&digest))
    }
}

struct Identity;

impl Precompile for Identity {
    fn required_gas(&self, input: &[u8]) -> u64 {
        IDENTITY_BASE_GAS + IDENTITY_WORD_GAS * gas::to_word_size(input.len() as u64)
    }

    fn run(&self, input: &[u8]) -> Result<Bytes, VmError> {
        Ok(Bytes::copy_from_slice(input))
    }
}

/// Address-keyed precompile set, fixed at EVM construction.
pub struct Precompiles {
    contracts: BTreeMap<Address, Box<dyn Precompile>>,
}

impl Precompiles {
    /// The built-in set: SHA-256 at 0x02 and identity at 0x04.
    pub fn standard() -> Self {
        let mut contracts: BTreeMap<Address, Box<dyn Precompile>> = BTreeMap::new();
        contracts.insert(
            address!("0000000000000000000000000000000000000002"),
            Box::new(Sha256Hash),
        );
        contracts.insert(
            address!("0000000000000000000000000000000000000004"),
            Box::new(Identity),
        );
        Self { contracts }
    }

    pub fn empty() -> Self {
        Self { contracts: BTreeMap::new() }
    }

    pub fn get(&self, addr: &Address) -> Option<&dyn Precompile> {
        self.contracts.get(addr).map(|p| p.as_ref())
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.contracts.contains_key(addr)
    }
}

impl std::fmt::Debug for Precompiles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Precompiles")
            .field("addresses", &self.contracts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Run a precompile against a gas budget. Returns the output and the gas
/// left over, or `OutOfGas` when the budget cannot cover the input.
pub fn run_precompile(
    p: &dyn Precompile,
    input: &[u8],
    gas_budget: u64,
) -> Result<(Bytes, u64), VmError> {
    let cost = p.required_gas(input);
    if cost > gas_budget {
        return Err(VmError::OutOfGas);
    }
    let output = p.run(input)?;
    Ok((output, gas_budget - cost))
}
