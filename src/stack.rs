//! Bounded operand stack.
//!
//! 1024-word LIFO. Every operation checks before it mutates: a failed push,
//! pop, dup or swap leaves the stack exactly as it was.

use crate::errors::VmError;
use alloy_primitives::U256;

pub const STACK_LIMIT: usize = 1024;

#[derive(Debug, Clone, Default)]
pub struct Stack {
    data: Vec<U256>,
}

impl Stack {
    pub fn new() -> Self {
        Self { data: Vec::with_capacity(64) }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[U256] {
        &self.data
    }

    pub fn push(&mut self, value: U256) -> Result<(), VmError> {
        if self.data.len() >= STACK_LIMIT {
            return Err(VmError::StackOverflow { have: self.data.len() + 1, limit: STACK_LIMIT });
        }
        self.data.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<U256, VmError> {
        self.data
            .pop()
            .ok_or(VmError::StackUnderflow { have: 0, want: 1 })
    }

    /// The `n`-th element from the top, `peek(0)` being the top itself.
    pub fn peek(&self, n: usize) -> Result<U256, VmError> {
        self.require(n + 1)?;
        Ok(self.data[self.data.len() - 1 - n])
    }

    /// Fails with StackUnderflow unless at least `n` items are present.
    pub fn require(&self, n: usize) -> Result<(), VmError> {
        if self.data.len() < n {
            return Err(VmError::StackUnderflow { have: self.data.len(), want: n });
        }
        Ok(())
    }

    /// DUP<n>: duplicate the `n`-th item from the top (1-based).
    pub fn dup(&mut self, n: usize) -> Result<(), VmError> {
        self.require(n)?;
        if self.data.len() >= STACK_LIMIT {
            return Err(VmError::StackOverflow { have: self.data.len() + 1, limit: STACK_LIMIT });
        }
        let value = self.data[self.data.len() - n];
        self.data.push(value);
        Ok(())
    }

    /// SWAP<n>: swap the top with the `n+1`-th item from the top (1-based).
    pub fn swap(&mut self, n: usize) -> Result<(), VmError> {
        self.require(n + 1)?;
        let top = self.data.len() - 1;
        self.data.swap(top, top - n);
        Ok(())
    }

    /// Overwrite the top of the stack in place. Used by binary ops that pop
    /// one operand and rewrite the other.
    pub fn top_mut(&mut self) -> Result<&mut U256, VmError> {
        self.require(1)?;
        let top = self.data.len() - 1;
        Ok(&mut self.data[top])
    }
}
