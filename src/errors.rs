//! Runtime fault taxonomy for the IONA EVM.
//!
//! Every variant except `Reverted`-adjacent exits is a frame fault: the
//! faulting frame consumes all of its remaining gas and reports failure to
//! its caller. Reverts are modelled as a normal exit (`Exit::Revert`), not
//! as a `VmError`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("out of gas")]
    OutOfGas,
    #[error("gas uint64 overflow")]
    GasUintOverflow,
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),
    #[error("stack underflow ({have} <=> {want})")]
    StackUnderflow { have: usize, want: usize },
    #[error("stack limit reached ({have} > {limit})")]
    StackOverflow { have: usize, limit: usize },
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),
    #[error("write protection")]
    WriteProtection,
    #[error("return data out of bounds")]
    ReturnDataOutOfBounds,
    #[error("call depth limit exceeded")]
    CallDepth,
    #[error("insufficient balance for transfer")]
    InsufficientBalance,
    #[error("contract address collision")]
    ContractAddressCollision,
    #[error("max code size exceeded (max 24576 bytes)")]
    MaxCodeSizeExceeded,
    #[error("max initcode size exceeded (max 49152 bytes)")]
    MaxInitCodeSizeExceeded,
    #[error("invalid code: must not begin with 0xEF")]
    InvalidCode,
    #[error("contract creation code storage out of gas")]
    CodeStoreOutOfGas,
    #[error("return stack limit reached")]
    ReturnStackOverflow,
    #[error("memory limit exceeded")]
    MemoryOverflow,
    #[error("execution aborted")]
    Aborted,
    #[error("nonce uint64 overflow")]
    NonceUintOverflow,
}

impl VmError {
    /// Whether this fault consumes all remaining gas in the frame.
    ///
    /// Everything does, except an external abort: the stop-request check
    /// terminates between instructions without charging further gas.
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(self, VmError::Aborted)
    }
}
