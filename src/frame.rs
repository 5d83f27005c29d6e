//! A single execution context: one frame of the call stack.
//!
//! Created when a call or create enters the interpreter, destroyed when the
//! frame halts, reverts or faults. Gas accounting is frame-local; unused gas
//! travels back to the caller through the `CallResult`, never through shared
//! state.

use crate::analysis::CodeBitmap;
use crate::eof::Container;
use crate::opcode;
use alloy_primitives::{Address, Bytes, B256, U256};
use std::sync::Arc;

#[derive(Debug)]
pub struct Frame {
    /// Address whose context we execute in (storage, balance, logs).
    pub address: Address,
    pub caller: Address,
    /// Address the code was loaded from; differs from `address` under
    /// DELEGATECALL/CALLCODE.
    pub code_address: Address,
    pub code: Bytes,
    pub code_hash: B256,
    /// Set for validated sectioned code; `code` is ignored then.
    pub container: Option<Arc<Container>>,
    /// Legacy jump analysis, shared across frames running the same code.
    pub bitmap: Option<Arc<CodeBitmap>>,
    pub input: Bytes,
    pub value: U256,
    /// Gas remaining in this frame.
    pub gas: u64,
    pub gas_limit: u64,
    pub read_only: bool,
    pub is_create: bool,
}

impl Frame {
    pub fn gas_used(&self) -> u64 {
        self.gas_limit - self.gas
    }

    /// Deduct gas; false means the frame is out of gas (caller faults it).
    #[must_use]
    pub fn use_gas(&mut self, amount: u64) -> bool {
        if self.gas < amount {
            return false;
        }
        self.gas -= amount;
        true
    }

    pub fn refund_gas(&mut self, amount: u64) {
        self.gas += amount;
    }

    /// Bytes of the active code section. Legacy code is section 0.
    pub fn code_section(&self, section: usize) -> &[u8] {
        match &self.container {
            Some(c) => c.code_section(section),
            None => &self.code,
        }
    }

    /// Opcode at `pc`, an implicit STOP past the end of the code.
    pub fn op_at(&self, section: usize, pc: usize) -> u8 {
        self.code_section(section).get(pc).copied().unwrap_or(opcode::STOP)
    }

    /// Legacy jump validity: the target must be an instruction start and a
    /// JUMPDEST marker. Sectioned code never consults this; its targets are
    /// proven at validation time.
    pub fn valid_jumpdest(&self, dest: U256) -> bool {
        let limbs = dest.as_limbs();
        if limbs[1] != 0 || limbs[2] != 0 || limbs[3] != 0 {
            return false;
        }
        let dest = limbs[0] as usize;
        if dest >= self.code.len() || self.code[dest] != opcode::JUMPDEST {
            return false;
        }
        match &self.bitmap {
            Some(bm) => bm.is_code(dest),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis;

    fn frame_with(code: Vec<u8>) -> Frame {
        let bitmap = Arc::new(CodeBitmap::legacy(&code));
        Frame {
            address: Address::ZERO,
            caller: Address::ZERO,
            code_address: Address::ZERO,
            code_hash: analysis::keccak256(&code),
            code: code.into(),
            container: None,
            bitmap: Some(bitmap),
            input: Bytes::new(),
            value: U256::ZERO,
            gas: 100_000,
            gas_limit: 100_000,
            read_only: false,
            is_create: false,
        }
    }

    #[test]
    fn test_use_gas_exact() {
        let mut f = frame_with(vec![]);
        assert!(f.use_gas(100_000));
        assert_eq!(f.gas, 0);
        assert!(!f.use_gas(1));
        assert_eq!(f.gas_used(), 100_000);
    }

    #[test]
    fn test_jumpdest_inside_push_payload_rejected() {
        // PUSH1 0x5B; JUMPDEST
        let f = frame_with(vec![opcode::PUSH1, opcode::JUMPDEST, opcode::JUMPDEST]);
        assert!(!f.valid_jumpdest(U256::from(1)));
        assert!(f.valid_jumpdest(U256::from(2)));
        assert!(!f.valid_jumpdest(U256::from(3)));
        assert!(!f.valid_jumpdest(U256::MAX));
    }
}
