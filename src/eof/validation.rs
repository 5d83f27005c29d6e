//! Deploy-time container validation.
//!
//! Two passes per code section. Pass 1 is a structural scan: every opcode
//! defined, immediates in bounds, relative-jump targets on instruction
//! starts, section arguments valid, last instruction terminal. Pass 2 is a
//! worklist dataflow over stack heights: each instruction records the
//! (min, max) height it was reached with, and a revisit must match the
//! recorded bounds exactly or the container is rejected. A section that
//! passes cannot underflow or overflow the stack at runtime, so the
//! interpreter skips per-instruction bounds checks for proven properties.

use crate::eof::{Container, FunctionMetadata, MAX_INPUTS, MAX_OUTPUTS, MAX_SECTIONS, MAX_STACK_HEIGHT, NON_RETURNING};
use crate::jump_table::{self, JumpTable};
use crate::opcode;
use crate::stack::STACK_LIMIT;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("container has no code sections")]
    NoCodeSections,
    #[error("too many code sections: {0}")]
    TooManySections(usize),
    #[error("type count {types} does not match code section count {sections}")]
    TypeSectionMismatch { types: usize, sections: usize },
    #[error("section {0} is empty")]
    EmptyCode(usize),
    #[error("section 0 must take no inputs and be non-returning")]
    InvalidFirstSection,
    #[error("section {0}: too many inputs")]
    TooManyInputs(usize),
    #[error("section {0}: invalid output count")]
    TooManyOutputs(usize),
    #[error("section {0}: declared max stack height exceeds limit")]
    StackHeightLimit(usize),
    #[error("undefined instruction {0:#04x}")]
    UndefinedInstruction(u8),
    #[error("truncated immediate at offset {0}")]
    TruncatedImmediate(usize),
    #[error("relative jump at offset {offset} targets invalid destination {dest}")]
    InvalidJumpDest { offset: usize, dest: isize },
    #[error("branch table with zero entries at offset {0}")]
    InvalidBranchCount(usize),
    #[error("invalid section argument at offset {0}")]
    InvalidSectionArgument(usize),
    #[error("section does not end in a terminal instruction")]
    InvalidCodeTermination,
    #[error("unreachable instructions at offset {0}")]
    UnreachableCode(usize),
    #[error("stack underflow at offset {offset} (have {have}, want {want})")]
    StackUnderflow { offset: usize, have: u16, want: u16 },
    #[error("stack overflow at offset {0}")]
    StackOverflow(usize),
    #[error("conflicting stack heights at offset {0}")]
    ConflictingStack(usize),
    #[error("output arity violation at offset {0}")]
    InvalidOutputs(usize),
    #[error("declared max stack height {declared} does not match observed {observed}")]
    InvalidMaxStackHeight { declared: u16, observed: u16 },
}

/// Validate a whole container, sub-containers included.
pub fn validate_container(container: &Container) -> Result<(), ValidationError> {
    if container.code_sections.is_empty() {
        return Err(ValidationError::NoCodeSections);
    }
    if container.code_sections.len() > MAX_SECTIONS {
        return Err(ValidationError::TooManySections(container.code_sections.len()));
    }
    if container.types.len() != container.code_sections.len() {
        return Err(ValidationError::TypeSectionMismatch {
            types: container.types.len(),
            sections: container.code_sections.len(),
        });
    }
    let first = &container.types[0];
    if first.inputs != 0 || first.returning() {
        return Err(ValidationError::InvalidFirstSection);
    }
    for (i, meta) in container.types.iter().enumerate() {
        if meta.inputs > MAX_INPUTS {
            return Err(ValidationError::TooManyInputs(i));
        }
        if meta.outputs > MAX_OUTPUTS && meta.outputs != NON_RETURNING {
            return Err(ValidationError::TooManyOutputs(i));
        }
        if meta.max_stack_height > MAX_STACK_HEIGHT {
            return Err(ValidationError::StackHeightLimit(i));
        }
        if container.code_sections[i].is_empty() {
            return Err(ValidationError::EmptyCode(i));
        }
    }

    let table = jump_table::eof();
    for section in 0..container.code_sections.len() {
        validate_instructions(container, section, &table)?;
        validate_stack(container, section, &table)?;
    }
    for sub in &container.sub_containers {
        validate_container(sub)?;
    }
    Ok(())
}

/// Immediate byte count of the instruction at `pc`, branch tables included.
fn immediate_len(code: &[u8], pc: usize) -> usize {
    let op = code[pc];
    if op == opcode::RJUMPV {
        let count = code.get(pc + 1).copied().unwrap_or(0) as usize;
        1 + 2 * count
    } else {
        opcode::immediate_size(op).max(opcode::push_data_size(op))
    }
}

fn read_i16(code: &[u8], pos: usize) -> i16 {
    i16::from_be_bytes([code[pos], code[pos + 1]])
}

fn read_u16(code: &[u8], pos: usize) -> u16 {
    u16::from_be_bytes([code[pos], code[pos + 1]])
}

/// Pass 1: structural scan.
fn validate_instructions(
    container: &Container,
    section: usize,
    table: &JumpTable,
) -> Result<(), ValidationError> {
    let code = container.code_section(section);
    let meta = container.types[section];
    let bitmap = crate::analysis::CodeBitmap::eof(code);

    let mut pc = 0usize;
    let mut last_op = 0u8;
    while pc < code.len() {
        let op = code[pc];
        if op != opcode::INVALID && !table.is_defined(op) {
            return Err(ValidationError::UndefinedInstruction(op));
        }
        if op == opcode::RJUMPV {
            let count = match code.get(pc + 1) {
                None => return Err(ValidationError::TruncatedImmediate(pc)),
                Some(0) => return Err(ValidationError::InvalidBranchCount(pc)),
                Some(&c) => c as usize,
            };
            if pc + 1 + 2 * count >= code.len() {
                return Err(ValidationError::TruncatedImmediate(pc));
            }
        } else {
            let imm = immediate_len(code, pc);
            if pc + imm >= code.len() {
                return Err(ValidationError::TruncatedImmediate(pc));
            }
        }

        match op {
            opcode::RJUMP | opcode::RJUMPI => {
                let offset = read_i16(code, pc + 1);
                check_jump_target(code, &bitmap, pc, pc + 3, offset)?;
            }
            opcode::RJUMPV => {
                let count = code[pc + 1] as usize;
                let after = pc + 2 + 2 * count;
                for branch in 0..count {
                    let offset = read_i16(code, pc + 2 + 2 * branch);
                    check_jump_target(code, &bitmap, pc, after, offset)?;
                }
            }
            opcode::CALLF => {
                let target = read_u16(code, pc + 1) as usize;
                let target_meta = container
                    .types
                    .get(target)
                    .ok_or(ValidationError::InvalidSectionArgument(pc))?;
                // CALLF pushes a return address, so a never-returning
                // callee must be reached with JUMPF instead.
                if !target_meta.returning() {
                    return Err(ValidationError::InvalidSectionArgument(pc));
                }
            }
            opcode::JUMPF => {
                let target = read_u16(code, pc + 1) as usize;
                if target >= container.types.len() {
                    return Err(ValidationError::InvalidSectionArgument(pc));
                }
            }
            opcode::RETF => {
                if !meta.returning() {
                    return Err(ValidationError::InvalidOutputs(pc));
                }
            }
            _ => {}
        }

        last_op = op;
        pc += 1 + immediate_len(code, pc);
    }

    if !opcode::is_terminal(last_op) {
        return Err(ValidationError::InvalidCodeTermination);
    }
    Ok(())
}

fn check_jump_target(
    code: &[u8],
    bitmap: &crate::analysis::CodeBitmap,
    pc: usize,
    base: usize,
    offset: i16,
) -> Result<(), ValidationError> {
    let dest = base as isize + offset as isize;
    if dest < 0 || dest as usize >= code.len() || !bitmap.is_code(dest as usize) {
        return Err(ValidationError::InvalidJumpDest { offset: pc, dest });
    }
    Ok(())
}

/// Pass 2: stack-height dataflow.
///
/// Every reachable instruction is tagged with the exact (min, max) height
/// bounds it executes at; a control-flow merge whose bounds differ from the
/// recorded ones rejects the container rather than widening.
fn validate_stack(
    container: &Container,
    section: usize,
    table: &JumpTable,
) -> Result<(), ValidationError> {
    let code = container.code_section(section);
    let meta = container.types[section];
    let bitmap = crate::analysis::CodeBitmap::eof(code);

    let mut recorded: Vec<Option<(u16, u16)>> = vec![None; code.len()];
    let mut worklist: Vec<(usize, u16, u16)> = vec![(0, meta.inputs as u16, meta.inputs as u16)];
    let mut observed_max = meta.inputs as u16;

    while let Some((pc, min, max)) = worklist.pop() {
        match recorded[pc] {
            Some(bounds) if bounds == (min, max) => continue,
            Some(_) => return Err(ValidationError::ConflictingStack(pc)),
            None => recorded[pc] = Some((min, max)),
        }
        observed_max = observed_max.max(max);

        let op = code[pc];
        let (pops, pushes) = stack_effect(table, op);
        if min < pops {
            return Err(ValidationError::StackUnderflow { offset: pc, have: min, want: pops });
        }
        let min_after = min - pops + pushes;
        let max_after = max - pops + pushes;
        if max_after > MAX_STACK_HEIGHT {
            return Err(ValidationError::StackOverflow(pc));
        }
        let next = pc + 1 + immediate_len(code, pc);

        match op {
            opcode::RJUMP => {
                let dest = (next as isize + read_i16(code, pc + 1) as isize) as usize;
                worklist.push((dest, min_after, max_after));
            }
            opcode::RJUMPI => {
                let dest = (next as isize + read_i16(code, pc + 1) as isize) as usize;
                worklist.push((dest, min_after, max_after));
                worklist.push((next, min_after, max_after));
            }
            opcode::RJUMPV => {
                let count = code[pc + 1] as usize;
                for branch in 0..count {
                    let dest = (next as isize + read_i16(code, pc + 2 + 2 * branch) as isize) as usize;
                    worklist.push((dest, min_after, max_after));
                }
                worklist.push((next, min_after, max_after));
            }
            opcode::CALLF => {
                let callee = container.types[read_u16(code, pc + 1) as usize];
                if min < callee.inputs as u16 {
                    return Err(ValidationError::StackUnderflow {
                        offset: pc,
                        have: min,
                        want: callee.inputs as u16,
                    });
                }
                if max as usize + callee.max_stack_height as usize - callee.inputs as usize
                    > STACK_LIMIT
                {
                    return Err(ValidationError::StackOverflow(pc));
                }
                let delta = callee.outputs as i32 - callee.inputs as i32;
                worklist.push((
                    next,
                    (min as i32 + delta) as u16,
                    (max as i32 + delta) as u16,
                ));
            }
            opcode::RETF => {
                let outputs = meta.outputs as u16;
                if min != max || min != outputs {
                    return Err(ValidationError::InvalidOutputs(pc));
                }
            }
            opcode::JUMPF => {
                let callee = container.types[read_u16(code, pc + 1) as usize];
                if max as usize + callee.max_stack_height as usize - callee.inputs as usize
                    > STACK_LIMIT
                {
                    return Err(ValidationError::StackOverflow(pc));
                }
                if callee.returning() {
                    // Tail call into a returning section: the current
                    // section forwards its own outputs.
                    if !meta.returning() {
                        return Err(ValidationError::InvalidOutputs(pc));
                    }
                    if meta.outputs < callee.outputs {
                        return Err(ValidationError::InvalidOutputs(pc));
                    }
                    let want = (meta.outputs - callee.outputs) as u16 + callee.inputs as u16;
                    if min != max || min != want {
                        return Err(ValidationError::InvalidOutputs(pc));
                    }
                } else if min < callee.inputs as u16 {
                    return Err(ValidationError::StackUnderflow {
                        offset: pc,
                        have: min,
                        want: callee.inputs as u16,
                    });
                }
            }
            _ if opcode::is_terminal(op) => {}
            _ => worklist.push((next, min_after, max_after)),
        }
    }

    for pc in 0..code.len() {
        if bitmap.is_code(pc) && recorded[pc].is_none() {
            return Err(ValidationError::UnreachableCode(pc));
        }
    }
    if observed_max != meta.max_stack_height {
        return Err(ValidationError::InvalidMaxStackHeight {
            declared: meta.max_stack_height,
            observed: observed_max,
        });
    }
    Ok(())
}

/// Net stack effect of one opcode, derived from the dispatch metadata.
fn stack_effect(table: &JumpTable, op: u8) -> (u16, u16) {
    if op == opcode::INVALID {
        return (0, 0);
    }
    match table.get(op) {
        Some(inst) => {
            let pops = inst.min_stack;
            let pushes = pops + STACK_LIMIT - inst.max_stack;
            (pops as u16, pushes as u16)
        }
        // Pass 1 has already rejected undefined opcodes.
        None => (0, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcode::*;

    fn section(inputs: u8, outputs: u8, max_stack_height: u16, code: Vec<u8>) -> Container {
        Container::single(FunctionMetadata { inputs, outputs, max_stack_height }, code)
    }

    fn entry(max_stack_height: u16, code: Vec<u8>) -> Container {
        section(0, NON_RETURNING, max_stack_height, code)
    }

    #[test]
    fn test_push_add_pop_valid_at_exact_height() {
        let code = vec![PUSH1, 1, PUSH1, 2, ADD, POP, STOP];
        assert_eq!(validate_container(&entry(2, code.clone())), Ok(()));
        // Any other declared height must be rejected.
        for declared in [0u16, 1, 3, 10] {
            assert_eq!(
                validate_container(&entry(declared, code.clone())),
                Err(ValidationError::InvalidMaxStackHeight { declared, observed: 2 })
            );
        }
    }

    #[test]
    fn test_truncated_push_immediate() {
        let c = entry(1, vec![PUSH2, 0x01]);
        assert_eq!(validate_container(&c), Err(ValidationError::TruncatedImmediate(0)));
    }

    #[test]
    fn test_truncated_rjump_immediate() {
        let c = entry(0, vec![RJUMP, 0x00]);
        assert_eq!(validate_container(&c), Err(ValidationError::TruncatedImmediate(0)));
    }

    #[test]
    fn test_undefined_instruction() {
        // JUMP is banned inside containers.
        let c = entry(1, vec![PUSH1, 0, JUMP, STOP]);
        assert_eq!(validate_container(&c), Err(ValidationError::UndefinedInstruction(JUMP)));
    }

    #[test]
    fn test_rjump_into_immediate_rejected() {
        // RJUMP -2 targets its own operand byte.
        let c = entry(0, vec![RJUMP, 0xFF, 0xFE, STOP]);
        match validate_container(&c) {
            Err(ValidationError::InvalidJumpDest { offset: 0, dest: 1 }) => {}
            other => panic!("expected InvalidJumpDest, got {other:?}"),
        }
    }

    #[test]
    fn test_rjump_out_of_bounds_rejected() {
        let c = entry(0, vec![RJUMP, 0x00, 0x10, STOP]);
        assert!(matches!(
            validate_container(&c),
            Err(ValidationError::InvalidJumpDest { .. })
        ));
    }

    #[test]
    fn test_backward_rjump_loop_valid() {
        // Infinite loop: RJUMP -3 back onto itself.
        let c = entry(0, vec![RJUMP, 0xFF, 0xFD]);
        assert_eq!(validate_container(&c), Ok(()));
    }

    #[test]
    fn test_missing_terminator() {
        let c = entry(1, vec![PUSH1, 1, POP]);
        assert_eq!(validate_container(&c), Err(ValidationError::InvalidCodeTermination));
    }

    #[test]
    fn test_rjumpv_zero_branches() {
        let c = entry(1, vec![PUSH1, 0, RJUMPV, 0x00, STOP]);
        assert_eq!(validate_container(&c), Err(ValidationError::InvalidBranchCount(2)));
    }

    #[test]
    fn test_rjumpv_valid_branch_table() {
        // Selector picks branch 0 (+1) or falls through.
        let code = vec![PUSH1, 0, RJUMPV, 0x01, 0x00, 0x01, STOP, STOP];
        assert_eq!(validate_container(&entry(1, code)), Ok(()));
    }

    #[test]
    fn test_stack_underflow_detected() {
        let c = entry(0, vec![POP, STOP]);
        assert_eq!(
            validate_container(&c),
            Err(ValidationError::StackUnderflow { offset: 0, have: 0, want: 1 })
        );
    }

    #[test]
    fn test_conflicting_merge_heights_rejected() {
        // RJUMPI skips one PUSH, so the join point sees heights 1 and 2.
        // 0: PUSH1 0; 2: RJUMPI +2 (to 7); 5: PUSH1 1; 7: STOP
        let code = vec![PUSH1, 0, RJUMPI, 0x00, 0x02, PUSH1, 1, STOP];
        assert_eq!(validate_container(&entry(1, code)), Err(ValidationError::ConflictingStack(7)));
    }

    #[test]
    fn test_unreachable_code_rejected() {
        // STOP; STOP - the second is never reached.
        let c = entry(0, vec![STOP, STOP]);
        assert_eq!(validate_container(&c), Err(ValidationError::UnreachableCode(1)));
    }

    #[test]
    fn test_callf_retf_roundtrip() {
        // Section 0: CALLF 1; POP; STOP.  Section 1: PUSH1 7; RETF (0 in, 1 out).
        let c = Container {
            types: vec![
                FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 1 },
                FunctionMetadata { inputs: 0, outputs: 1, max_stack_height: 1 },
            ],
            code_sections: vec![
                vec![CALLF, 0x00, 0x01, POP, STOP].into(),
                vec![PUSH1, 7, RETF].into(),
            ],
            data: Default::default(),
            sub_containers: Vec::new(),
        };
        assert_eq!(validate_container(&c), Ok(()));
    }

    #[test]
    fn test_callf_to_missing_section() {
        let c = entry(0, vec![CALLF, 0x00, 0x07, STOP]);
        assert_eq!(validate_container(&c), Err(ValidationError::InvalidSectionArgument(0)));
    }

    #[test]
    fn test_callf_to_non_returning_section() {
        let c = Container {
            types: vec![
                FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 0 },
                FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 0 },
            ],
            code_sections: vec![
                vec![CALLF, 0x00, 0x01, STOP].into(),
                vec![STOP].into(),
            ],
            data: Default::default(),
            sub_containers: Vec::new(),
        };
        assert_eq!(validate_container(&c), Err(ValidationError::InvalidSectionArgument(0)));
    }

    #[test]
    fn test_retf_with_wrong_height() {
        // Section 1 declares 1 output but returns with 2 items.
        let c = Container {
            types: vec![
                FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 1 },
                FunctionMetadata { inputs: 0, outputs: 1, max_stack_height: 2 },
            ],
            code_sections: vec![
                vec![CALLF, 0x00, 0x01, POP, STOP].into(),
                vec![PUSH1, 7, PUSH1, 8, RETF].into(),
            ],
            data: Default::default(),
            sub_containers: Vec::new(),
        };
        assert_eq!(validate_container(&c), Err(ValidationError::InvalidOutputs(4)));
    }

    #[test]
    fn test_retf_in_non_returning_section() {
        let c = entry(0, vec![RETF]);
        assert_eq!(validate_container(&c), Err(ValidationError::InvalidOutputs(0)));
    }

    #[test]
    fn test_jumpf_to_non_returning() {
        let c = Container {
            types: vec![
                FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 0 },
                FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 0 },
            ],
            code_sections: vec![
                vec![JUMPF, 0x00, 0x01].into(),
                vec![STOP].into(),
            ],
            data: Default::default(),
            sub_containers: Vec::new(),
        };
        assert_eq!(validate_container(&c), Ok(()));
    }

    #[test]
    fn test_first_section_must_be_non_returning() {
        let c = section(0, 1, 1, vec![PUSH1, 1, RETF]);
        assert_eq!(validate_container(&c), Err(ValidationError::InvalidFirstSection));
    }

    #[test]
    fn test_declared_height_above_limit() {
        let c = entry(1024, vec![STOP]);
        assert_eq!(validate_container(&c), Err(ValidationError::StackHeightLimit(0)));
    }

    #[test]
    fn test_type_code_count_mismatch() {
        let c = Container {
            types: vec![FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 0 }],
            code_sections: vec![vec![STOP].into(), vec![STOP].into()],
            data: Default::default(),
            sub_containers: Vec::new(),
        };
        assert_eq!(
            validate_container(&c),
            Err(ValidationError::TypeSectionMismatch { types: 1, sections: 2 })
        );
    }

    #[test]
    fn test_invalid_sub_container_rejected() {
        let mut c = entry(0, vec![STOP]);
        c.sub_containers.push(Container {
            types: vec![FunctionMetadata { inputs: 0, outputs: NON_RETURNING, max_stack_height: 0 }],
            code_sections: vec![vec![POP, STOP].into()],
            data: Default::default(),
            sub_containers: Vec::new(),
        });
        assert!(matches!(
            validate_container(&c),
            Err(ValidationError::StackUnderflow { .. })
        ));
    }
}
