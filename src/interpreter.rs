//! The dispatch loop.
//!
//! One iteration per instruction: abort check, fetch, table lookup, stack
//! bounds, constant gas, memory sizing, dynamic gas, memory growth, execute.
//! Gas is always charged before the effect it pays for. A `VmError` faults
//! the frame and (except for an external abort) consumes all remaining gas;
//! REVERT is a normal exit carrying its output and leaving gas intact.

use crate::errors::VmError;
use crate::evm::Evm;
use crate::frame::Frame;
use crate::gas;
use crate::memory::Memory;
use crate::stack::{Stack, STACK_LIMIT};
use alloy_primitives::Bytes;
use std::sync::atomic::Ordering;

pub const RETURN_STACK_LIMIT: usize = 1024;

/// Caller context saved by CALLF, restored by RETF.
#[derive(Debug, Clone, Copy)]
pub struct ReturnContext {
    pub section: usize,
    pub pc: usize,
}

/// Per-frame mutable execution state, separate from the frame's identity
/// and gas so handlers can borrow them independently.
#[derive(Debug, Default)]
pub struct Scope {
    pub stack: Stack,
    pub memory: Memory,
    pub pc: usize,
    /// Active code section; always 0 for legacy code.
    pub section: usize,
    pub return_stack: Vec<ReturnContext>,
    /// Output of the most recent completed sub-call.
    pub return_data: Bytes,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }
}

/// What a handler tells the loop to do next.
#[derive(Debug)]
pub enum Control {
    /// Advance past this instruction (handlers that consume immediates have
    /// already moved `pc` over them).
    Continue,
    /// `pc` has been set to the next instruction; do not advance.
    Jump,
    Stop,
    Return(Bytes),
    Revert(Bytes),
    SelfDestruct,
}

/// How a frame halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    Stop,
    Return,
    Revert,
    SelfDestruct,
}

#[derive(Debug)]
pub struct FrameResult {
    pub exit: Exit,
    pub output: Bytes,
}

impl FrameResult {
    pub fn reverted(&self) -> bool {
        self.exit == Exit::Revert
    }
}

impl<'a> Evm<'a> {
    /// Run a frame to completion.
    ///
    /// `Ok` covers every non-fault halt including REVERT; `Err` is a fault,
    /// after which `frame.gas` is zero unless the error was an abort.
    pub(crate) fn run_frame(&mut self, frame: &mut Frame) -> Result<FrameResult, VmError> {
        let mut scope = Scope::new();
        match self.step_loop(frame, &mut scope) {
            Ok(result) => Ok(result),
            Err(err) => {
                if err.consumes_all_gas() {
                    frame.gas = 0;
                }
                Err(err)
            }
        }
    }

    fn step_loop(&mut self, frame: &mut Frame, scope: &mut Scope) -> Result<FrameResult, VmError> {
        loop {
            if self.abort.load(Ordering::Relaxed) {
                return Err(VmError::Aborted);
            }
            let op = frame.op_at(scope.section, scope.pc);
            let table = if frame.container.is_some() { &self.eof_table } else { &self.table };
            let inst = *table.get(op).ok_or(VmError::InvalidOpcode(op))?;

            let sp = scope.stack.len();
            if sp < inst.min_stack {
                return Err(VmError::StackUnderflow { have: sp, want: inst.min_stack });
            }
            if sp > inst.max_stack {
                return Err(VmError::StackOverflow {
                    have: sp + (STACK_LIMIT - inst.max_stack),
                    limit: STACK_LIMIT,
                });
            }
            if !frame.use_gas(inst.constant_gas) {
                return Err(VmError::OutOfGas);
            }

            // Word-aligned byte size this instruction needs memory grown to.
            let mut mem_size = 0u64;
            if let Some(memory_size) = inst.memory_size {
                let needed = memory_size(&scope.stack)?;
                let words = gas::to_word_size(needed);
                mem_size = words.checked_mul(32).ok_or(VmError::GasUintOverflow)?;
            }
            if let Some(dynamic_gas) = inst.dynamic_gas {
                let cost = dynamic_gas(self, frame, scope, mem_size)?;
                if !frame.use_gas(cost) {
                    return Err(VmError::OutOfGas);
                }
            }
            if mem_size > 0 {
                scope.memory.resize(mem_size as usize);
            }

            match (inst.execute)(self, frame, scope)? {
                Control::Continue => scope.pc += 1,
                Control::Jump => {}
                Control::Stop => {
                    return Ok(FrameResult { exit: Exit::Stop, output: Bytes::new() });
                }
                Control::Return(output) => {
                    return Ok(FrameResult { exit: Exit::Return, output });
                }
                Control::Revert(output) => {
                    return Ok(FrameResult { exit: Exit::Revert, output });
                }
                Control::SelfDestruct => {
                    return Ok(FrameResult { exit: Exit::SelfDestruct, output: Bytes::new() });
                }
            }
        }
    }
}
