//! Linear byte memory for a single call frame.
//!
//! Grows in 32-byte words and never shrinks within a frame. Expansion is
//! charged by the gas model *before* `resize` is called; `last_gas_cost`
//! records the total quadratic fee already paid so that repeated expansions
//! are only ever charged the delta.

use alloy_primitives::U256;

#[derive(Debug, Default)]
pub struct Memory {
    data: Vec<u8>,
    /// Total quadratic expansion fee paid so far. Maintained by
    /// `gas::memory_gas_cost`.
    pub(crate) last_gas_cost: u64,
}

impl Memory {
    pub fn new() -> Self {
        Self { data: Vec::new(), last_gas_cost: 0 }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grow to `size` bytes, rounded up to a word boundary by the caller.
    /// Never shrinks.
    pub fn resize(&mut self, size: usize) {
        if size > self.data.len() {
            self.data.resize(size, 0);
        }
    }

    /// Copy `size` bytes starting at `offset`.
    ///
    /// The interpreter always resizes (and charges) before reading; an
    /// out-of-bounds read here is an interpreter defect, not a user error.
    pub fn get(&self, offset: usize, size: usize) -> Vec<u8> {
        if size == 0 {
            return Vec::new();
        }
        self.data[offset..offset + size].to_vec()
    }

    /// Write `data` at `offset`. Same precondition as `get`.
    pub fn set(&mut self, offset: usize, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        self.data[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Write a 256-bit word big-endian at `offset`.
    pub fn set_word(&mut self, offset: usize, value: U256) {
        self.data[offset..offset + 32].copy_from_slice(&value.to_be_bytes::<32>());
    }

    /// Read a 256-bit word big-endian at `offset`.
    pub fn get_word(&self, offset: usize) -> U256 {
        let mut buf = [0u8; 32];
        buf.copy_from_slice(&self.data[offset..offset + 32]);
        U256::from_be_bytes(buf)
    }

    pub fn set_byte(&mut self, offset: usize, value: u8) {
        self.data[offset] = value;
    }

    /// Copy within memory, handling overlap (MCOPY).
    pub fn copy(&mut self, dst: usize, src: usize, size: usize) {
        if size == 0 {
            return;
        }
        self.data.copy_within(src..src + size, dst);
    }

    /// Write `data` at `offset`, zero-padding up to `size` bytes. Used by
    /// the *COPY opcodes where the source may be shorter than the requested
    /// length.
    pub fn set_padded(&mut self, offset: usize, size: usize, data: &[u8]) {
        if size == 0 {
            return;
        }
        let n = data.len().min(size);
        self.data[offset..offset + n].copy_from_slice(&data[..n]);
        for b in &mut self.data[offset + n..offset + size] {
            *b = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_never_shrinks() {
        let mut m = Memory::new();
        m.resize(64);
        assert_eq!(m.len(), 64);
        m.resize(32);
        assert_eq!(m.len(), 64);
        m.resize(96);
        assert_eq!(m.len(), 96);
    }

    #[test]
    fn test_word_roundtrip() {
        let mut m = Memory::new();
        m.resize(64);
        let v = U256::from(0xDEAD_BEEFu64);
        m.set_word(32, v);
        assert_eq!(m.get_word(32), v);
        // big-endian layout: low byte at the end of the word
        assert_eq!(m.data()[63], 0xEF);
    }

    #[test]
    fn test_set_padded() {
        let mut m = Memory::new();
        m.resize(32);
        m.set(0, &[0xFF; 32]);
        m.set_padded(0, 8, &[1, 2, 3]);
        assert_eq!(&m.data()[..8], &[1, 2, 3, 0, 0, 0, 0, 0]);
        assert_eq!(m.data()[8], 0xFF);
    }

    #[test]
    fn test_copy_overlapping() {
        let mut m = Memory::new();
        m.resize(32);
        m.set(0, &[1, 2, 3, 4]);
        m.copy(2, 0, 4);
        assert_eq!(&m.data()[..6], &[1, 2, 1, 2, 3, 4]);
    }
}
