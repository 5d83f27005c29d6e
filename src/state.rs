//! World-state interface consumed by the interpreter.
//!
//! The EVM core never owns persistent state; it talks to a `StateDB`
//! collaborator for balances, nonces, code, storage, the per-transaction
//! access list and refund counter, and snapshot/revert. `MemoryState` is the
//! reference backend used by tests and by the block simulator: a plain
//! BTreeMap world with whole-copy snapshots.
//!
//! Write protection is enforced by the interpreter (it refuses to reach
//! mutating methods from a read-only frame), not by implementations.

use crate::analysis::keccak256;
use alloy_primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A log record emitted by LOG0..LOG4.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
}

/// Abstract world state. Mutations are journaled by the implementation;
/// `snapshot`/`revert_to_snapshot` bound the effects of reverted frames.
pub trait StateDB {
    fn create_account(&mut self, addr: Address);
    fn exist(&self, addr: Address) -> bool;
    /// EIP-161 emptiness: zero balance, zero nonce, no code.
    fn empty(&self, addr: Address) -> bool;

    fn get_balance(&self, addr: Address) -> U256;
    fn add_balance(&mut self, addr: Address, amount: U256);
    fn sub_balance(&mut self, addr: Address, amount: U256);

    fn get_nonce(&self, addr: Address) -> u64;
    fn set_nonce(&mut self, addr: Address, nonce: u64);

    fn get_code(&self, addr: Address) -> Bytes;
    fn get_code_size(&self, addr: Address) -> usize;
    fn get_code_hash(&self, addr: Address) -> B256;
    fn set_code(&mut self, addr: Address, code: Bytes);

    fn get_state(&self, addr: Address, key: U256) -> U256;
    /// Value of the slot as of the start of the transaction, for net gas
    /// metering.
    fn get_committed_state(&self, addr: Address, key: U256) -> U256;
    fn set_state(&mut self, addr: Address, key: U256, value: U256);

    fn get_transient_state(&self, addr: Address, key: U256) -> U256;
    fn set_transient_state(&mut self, addr: Address, key: U256, value: U256);

    /// Mark the address warm; returns true when it was cold (EIP-2929).
    fn access_address(&mut self, addr: Address) -> bool;
    /// Mark the slot warm; returns true when it was cold.
    fn access_slot(&mut self, addr: Address, key: U256) -> bool;

    fn add_refund(&mut self, gas: u64);
    fn sub_refund(&mut self, gas: u64);
    fn get_refund(&self) -> u64;

    fn self_destruct(&mut self, addr: Address);
    fn has_self_destructed(&self, addr: Address) -> bool;

    fn add_log(&mut self, log: Log);

    fn snapshot(&mut self) -> usize;
    fn revert_to_snapshot(&mut self, id: usize);
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub balance: U256,
    pub nonce: u64,
    pub code: Bytes,
}

/// Everything covered by a snapshot. Transient storage, the access list,
/// logs and the refund counter all revert with the frame that produced
/// them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct World {
    accounts: BTreeMap<Address, Account>,
    storage: BTreeMap<(Address, U256), U256>,
    transient: BTreeMap<(Address, U256), U256>,
    self_destructed: BTreeSet<Address>,
    warm_addresses: BTreeSet<Address>,
    warm_slots: BTreeSet<(Address, U256)>,
    refund: u64,
    logs: Vec<Log>,
}

/// In-memory state backed by BTreeMaps, with copy-on-snapshot semantics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryState {
    world: World,
    /// Slot values as of the start of the current transaction.
    committed: BTreeMap<(Address, U256), U256>,
    #[serde(skip)]
    snapshots: Vec<World>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> &[Log] {
        &self.world.logs
    }

    /// Test/setup helper: write a slot both live and committed, as if it
    /// had been set in an earlier transaction.
    pub fn seed_storage(&mut self, addr: Address, key: U256, value: U256) {
        self.world.storage.insert((addr, key), value);
        self.committed.insert((addr, key), value);
    }

    /// Begin a fresh transaction: clear transient storage, the access list,
    /// the refund counter, and re-commit storage.
    pub fn begin_tx(&mut self) {
        self.world.transient.clear();
        self.world.warm_addresses.clear();
        self.world.warm_slots.clear();
        self.world.refund = 0;
        self.committed = self.world.storage.clone();
        self.snapshots.clear();
    }

    fn account(&self, addr: Address) -> Option<&Account> {
        self.world.accounts.get(&addr)
    }

    fn account_mut(&mut self, addr: Address) -> &mut Account {
        self.world.accounts.entry(addr).or_default()
    }
}

impl StateDB for MemoryState {
    fn create_account(&mut self, addr: Address) {
        self.world.accounts.entry(addr).or_default();
    }

    fn exist(&self, addr: Address) -> bool {
        self.account(addr).is_some()
    }

    fn empty(&self, addr: Address) -> bool {
        match self.account(addr) {
            None => true,
            Some(a) => a.balance.is_zero() && a.nonce == 0 && a.code.is_empty(),
        }
    }

    fn get_balance(&self, addr: Address) -> U256 {
        self.account(addr).map(|a| a.balance).unwrap_or_default()
    }

    fn add_balance(&mut self, addr: Address, amount: U256) {
        let acct = self.account_mut(addr);
        acct.balance = acct.balance.saturating_add(amount);
    }

    fn sub_balance(&mut self, addr: Address, amount: U256) {
        let acct = self.account_mut(addr);
        acct.balance = acct.balance.saturating_sub(amount);
    }

    fn get_nonce(&self, addr: Address) -> u64 {
        self.account(addr).map(|a| a.nonce).unwrap_or(0)
    }

    fn set_nonce(&mut self, addr: Address, nonce: u64) {
        self.account_mut(addr).nonce = nonce;
    }

    fn get_code(&self, addr: Address) -> Bytes {
        self.account(addr).map(|a| a.code.clone()).unwrap_or_default()
    }

    fn get_code_size(&self, addr: Address) -> usize {
        self.account(addr).map(|a| a.code.len()).unwrap_or(0)
    }

    fn get_code_hash(&self, addr: Address) -> B256 {
        match self.account(addr) {
            None => B256::ZERO,
            Some(a) => keccak256(&a.code),
        }
    }

    fn set_code(&mut self, addr: Address, code: Bytes) {
        self.account_mut(addr).code = code;
    }

    fn get_state(&self, addr: Address, key: U256) -> U256 {
        self.world.storage.get(&(addr, key)).copied().unwrap_or_default()
    }

    fn get_committed_state(&self, addr: Address, key: U256) -> U256 {
        self.committed.get(&(addr, key)).copied().unwrap_or_default()
    }

    fn set_state(&mut self, addr: Address, key: U256, value: U256) {
        if value.is_zero() {
            self.world.storage.remove(&(addr, key));
        } else {
            self.world.storage.insert((addr, key), value);
        }
    }

    fn get_transient_state(&self, addr: Address, key: U256) -> U256 {
        self.world.transient.get(&(addr, key)).copied().unwrap_or_default()
    }

    fn set_transient_state(&mut self, addr: Address, key: U256, value: U256) {
        if value.is_zero() {
            self.world.transient.remove(&(addr, key));
        } else {
            self.world.transient.insert((addr, key), value);
        }
    }

    fn access_address(&mut self, addr: Address) -> bool {
        self.world.warm_addresses.insert(addr)
    }

    fn access_slot(&mut self, addr: Address, key: U256) -> bool {
        self.world.warm_slots.insert((addr, key))
    }

    fn add_refund(&mut self, gas: u64) {
        self.world.refund += gas;
    }

    fn sub_refund(&mut self, gas: u64) {
        self.world.refund = self.world.refund.saturating_sub(gas);
    }

    fn get_refund(&self) -> u64 {
        self.world.refund
    }

    fn self_destruct(&mut self, addr: Address) {
        self.world.self_destructed.insert(addr);
        self.account_mut(addr).balance = U256::ZERO;
    }

    fn has_self_destructed(&self, addr: Address) -> bool {
        self.world.self_destructed.contains(&addr)
    }

    fn add_log(&mut self, log: Log) {
        self.world.logs.push(log);
    }

    fn snapshot(&mut self) -> usize {
        self.snapshots.push(self.world.clone());
        self.snapshots.len() - 1
    }

    fn revert_to_snapshot(&mut self, id: usize) {
        debug_assert!(id < self.snapshots.len(), "unknown snapshot id {id}");
        self.world = self.snapshots[id].clone();
        self.snapshots.truncate(id);
    }
}
