//! EOF container model.
//!
//! A container is the decoded form of the sectioned code format: an ordered
//! list of code sections with typed call/return metadata, a data section,
//! and nested sub-containers. Binary decoding happens upstream; this module
//! owns the *semantic* rules, and `validation` proves type- and stack-safety
//! before any section may execute.

pub mod validation;

use alloy_primitives::Bytes;

/// Sentinel in `FunctionMetadata::outputs` marking a non-returning section
/// (one that exits via RETURN/REVERT/STOP/JUMPF but never RETF).
pub const NON_RETURNING: u8 = 0x80;

/// Hard limits on container shape.
pub const MAX_SECTIONS: usize = 1024;
pub const MAX_INPUTS: u8 = 127;
pub const MAX_OUTPUTS: u8 = 127;
pub const MAX_STACK_HEIGHT: u16 = 1023;

/// Declared type of one code section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub inputs: u8,
    /// `NON_RETURNING` (0x80) means the section never returns via RETF.
    pub outputs: u8,
    pub max_stack_height: u16,
}

impl FunctionMetadata {
    pub fn returning(&self) -> bool {
        self.outputs != NON_RETURNING
    }
}

/// A decoded EOF container. Immutable once validated; frames executing it
/// share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Container {
    pub types: Vec<FunctionMetadata>,
    pub code_sections: Vec<Bytes>,
    pub data: Bytes,
    pub sub_containers: Vec<Container>,
}

impl Container {
    /// Convenience constructor for a single-section container.
    pub fn single(metadata: FunctionMetadata, code: impl Into<Bytes>) -> Self {
        Self {
            types: vec![metadata],
            code_sections: vec![code.into()],
            data: Bytes::new(),
            sub_containers: Vec::new(),
        }
    }

    pub fn code_section(&self, index: usize) -> &[u8] {
        &self.code_sections[index]
    }
}
