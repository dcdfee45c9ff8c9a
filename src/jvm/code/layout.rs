use crate::jvm::code::{switch_padding, BranchInstruction, CodeInstruction, InsnIndex};
use crate::jvm::{Error, Serialize};
use crate::util::Width;
use log::debug;

/// Code array, along with where each instruction ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub code: Vec<u8>,

    /// Byte offset of every instruction, followed by the length of the code
    offsets: Vec<usize>,
}

impl Layout {
    /// Byte offset of an instruction (or the end of the code)
    pub fn offset_of(&self, index: InsnIndex) -> usize {
        self.offsets[index.0]
    }
}

/// Choose an encoding for every instruction and serialize them
///
/// Jump offsets depend on the widths of the instructions in between, which in turn depend on the
/// jump offsets (`goto` vs. `goto_w`) and on the position (switch padding). So we lay the code out
/// repeatedly, widening `goto`/`jsr` whose offset doesn't fit in 16 bits, until nothing changes.
/// Conditional jumps have no wide form: if one of those is out of range, the code cannot be
/// encoded.
pub fn lay_out(instructions: &[CodeInstruction]) -> Result<Layout, Error> {
    let mut widened = vec![false; instructions.len()];

    let offsets = loop {
        let offsets = compute_offsets(instructions, &widened);
        let code_len = offsets[instructions.len()];
        if code_len > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(code_len));
        }

        let mut changed = false;
        for (idx, insn) in instructions.iter().enumerate() {
            let branch = match insn {
                CodeInstruction::Branch(branch) if !widened[idx] => branch,
                _ => continue,
            };
            let target = match branch {
                BranchInstruction::If(_, target)
                | BranchInstruction::IfICmp(_, target)
                | BranchInstruction::IfACmp(_, target)
                | BranchInstruction::IfNull(_, target)
                | BranchInstruction::Goto(target)
                | BranchInstruction::Jsr(target) => target,
                _ => continue,
            };
            let distance = offsets[target.0] as isize - offsets[idx] as isize;
            if i16::try_from(distance).is_err() {
                match branch {
                    BranchInstruction::Goto(_) | BranchInstruction::Jsr(_) => {
                        debug!("widening jump at instruction {} ({} bytes)", idx, distance);
                        widened[idx] = true;
                        changed = true;
                    }
                    _ => {
                        return Err(Error::JumpOutOfRange {
                            instruction: idx,
                            distance,
                        })
                    }
                }
            }
        }

        if !changed {
            break offsets;
        }
    };

    let mut code = Vec::with_capacity(offsets[instructions.len()]);
    for (idx, insn) in instructions.iter().enumerate() {
        match insn {
            CodeInstruction::Regular(insn) => insn.serialize(&mut code)?,
            CodeInstruction::Branch(branch) => {
                let offset = offsets[idx] as isize;
                let relative = |target: &InsnIndex| offsets[target.0] as isize - offset;
                let regular = |target: &InsnIndex| -> Result<i16, Error> {
                    i16::try_from(relative(target)).map_err(|_| Error::JumpOutOfRange {
                        instruction: idx,
                        distance: relative(target),
                    })
                };
                let wide = |target: &InsnIndex| -> Result<i32, Error> {
                    Ok(relative(target) as i32)
                };
                let encoded: BranchInstruction<i16, i32> = match branch {
                    BranchInstruction::Goto(target) if widened[idx] => {
                        BranchInstruction::GotoW(wide(target)?)
                    }
                    BranchInstruction::Jsr(target) if widened[idx] => {
                        BranchInstruction::JsrW(wide(target)?)
                    }
                    BranchInstruction::TableSwitch {
                        default,
                        low,
                        targets,
                        ..
                    } => BranchInstruction::TableSwitch {
                        padding: switch_padding(offsets[idx]),
                        default: wide(default)?,
                        low: *low,
                        targets: targets.iter().map(wide).collect::<Result<_, _>>()?,
                    },
                    BranchInstruction::LookupSwitch {
                        default, targets, ..
                    } => BranchInstruction::LookupSwitch {
                        padding: switch_padding(offsets[idx]),
                        default: wide(default)?,
                        targets: targets
                            .iter()
                            .map(|(key, target)| Ok((*key, wide(target)?)))
                            .collect::<Result<_, Error>>()?,
                    },
                    other => other.map_labels(regular, wide)?,
                };
                encoded.serialize(&mut code)?;
            }
        }
    }

    Ok(Layout { code, offsets })
}

fn compute_offsets(instructions: &[CodeInstruction], widened: &[bool]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(instructions.len() + 1);
    let mut offset = 0;
    for (idx, insn) in instructions.iter().enumerate() {
        offsets.push(offset);
        offset += match insn {
            CodeInstruction::Regular(insn) => insn.width(),
            CodeInstruction::Branch(branch) => branch_width(branch, offset, widened[idx]),
        };
    }
    offsets.push(offset);
    offsets
}

fn branch_width(
    branch: &BranchInstruction<InsnIndex, InsnIndex>,
    offset: usize,
    widened: bool,
) -> usize {
    match branch {
        BranchInstruction::Goto(_) | BranchInstruction::Jsr(_) if widened => 5,
        BranchInstruction::TableSwitch { targets, .. } => {
            1 + switch_padding(offset) as usize + 4 * (3 + targets.len())
        }
        BranchInstruction::LookupSwitch { targets, .. } => {
            1 + switch_padding(offset) as usize + 8 * (1 + targets.len())
        }
        other => other.width(),
    }
}
