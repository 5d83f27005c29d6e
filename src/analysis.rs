//! Code bitmap and jump-destination analysis.
//!
//! One forward scan marks which byte offsets are instruction starts and
//! which are immediate data (PUSH payloads, and the fixed-width offsets of
//! the EOF relative jumps). After the O(n) build, `is_code` answers in O(1).
//!
//! The bitmap for a given code blob is immutable once built, so it is cached
//! by content hash and shared across every frame executing the same deployed
//! code, including frames on other threads.

use crate::opcode;
use alloy_primitives::B256;
use parking_lot::RwLock;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::sync::Arc;

pub fn keccak256(data: &[u8]) -> B256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    B256::from_slice(&hasher.finalize())
}

/// Bit-per-byte map over a code blob; a set bit means the byte at that
/// offset is the start of an instruction.
#[derive(Debug, Clone)]
pub struct CodeBitmap {
    bits: Vec<u64>,
    len: usize,
}

impl CodeBitmap {
    /// Analyze legacy bytecode: only PUSH immediates are data.
    pub fn legacy(code: &[u8]) -> Self {
        Self::build(code, false)
    }

    /// Analyze one EOF code section: PUSH immediates plus the fixed-width
    /// operands of RJUMP/RJUMPI/RJUMPV/CALLF/JUMPF are data.
    pub fn eof(code: &[u8]) -> Self {
        Self::build(code, true)
    }

    fn build(code: &[u8], eof: bool) -> Self {
        let words = (code.len() + 63) / 64;
        let mut bits = vec![0u64; words];
        let mut pc = 0usize;
        while pc < code.len() {
            bits[pc / 64] |= 1 << (pc % 64);
            let op = code[pc];
            let mut imm = opcode::push_data_size(op);
            if eof {
                imm = match op {
                    opcode::RJUMP | opcode::RJUMPI | opcode::CALLF | opcode::JUMPF => 2,
                    opcode::RJUMPV => {
                        // count byte + two bytes per branch
                        let count = code.get(pc + 1).copied().unwrap_or(0) as usize;
                        1 + count * 2
                    }
                    _ => imm,
                };
            }
            pc += 1 + imm;
        }
        Self { bits, len: code.len() }
    }

    /// Whether `offset` is the start of an instruction (not immediate data).
    pub fn is_code(&self, offset: usize) -> bool {
        if offset >= self.len {
            return false;
        }
        self.bits[offset / 64] & (1 << (offset % 64)) != 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Shared bitmap cache keyed by code hash.
///
/// Entries are inserted once and never mutated; lookups clone the `Arc`.
#[derive(Debug, Default)]
pub struct AnalysisCache {
    entries: RwLock<HashMap<B256, Arc<CodeBitmap>>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bitmap for `code`, building and caching it on first sight.
    pub fn bitmap(&self, code_hash: B256, code: &[u8]) -> Arc<CodeBitmap> {
        if let Some(found) = self.entries.read().get(&code_hash) {
            return Arc::clone(found);
        }
        let built = Arc::new(CodeBitmap::legacy(code));
        self.entries
            .write()
            .entry(code_hash)
            .or_insert(built)
            .clone()
    }
}
