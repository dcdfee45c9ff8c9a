use crate::jvm::code::{
    BranchInstruction, CodeInstruction, ExceptionRange, InsnIndex, Instruction, InvokeType,
};
use crate::jvm::{ConstantsPool, Error, FieldType, MalformedKind, MethodDescriptor};
use crate::util::Width;
use log::trace;
use std::collections::VecDeque;

/// Stack depth (in slots) on entry to every instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDepths {
    /// `None` for instructions no path reaches
    pub depths: Vec<Option<usize>>,

    /// Deepest the stack ever gets, including inside an instruction
    pub max_stack: usize,
}

impl StackDepths {
    pub fn at(&self, index: InsnIndex) -> Option<usize> {
        self.depths.get(index.0).copied().flatten()
    }
}

/// Compute stack depths by following every edge of the control flow graph
///
/// Exception handlers are entered with just the exception on the stack. A `jsr` pushes its return
/// address for the subroutine and resumes at the next instruction with the depth it had. When two
/// paths disagree (which a verifier would reject), the larger depth is kept so that `max_stack` is
/// never too small. Errors are located by instruction index rather than byte offset.
pub fn analyze_stack(
    instructions: &[CodeInstruction],
    exception_table: &[ExceptionRange],
    constants: &ConstantsPool,
) -> Result<StackDepths, Error> {
    let mut depths: Vec<Option<usize>> = vec![None; instructions.len()];
    let mut max_stack = 0;
    let mut worklist: VecDeque<usize> = VecDeque::new();

    if !instructions.is_empty() {
        visit(0, 0, &mut depths, &mut worklist);
    }

    while let Some(idx) = worklist.pop_front() {
        let depth = match depths[idx] {
            Some(depth) => depth,
            None => continue,
        };

        for handler in exception_table {
            if handler.start.0 <= idx && idx < handler.end.0 {
                visit(handler.handler.0, 1, &mut depths, &mut worklist);
            }
        }

        let (pops, pushes) = stack_effect(&instructions[idx], constants)
            .map_err(|kind| Error::malformed(idx, kind))?;
        let after = match depth.checked_sub(pops) {
            Some(remaining) => remaining + pushes,
            None => return Err(Error::malformed(idx, MalformedKind::StackUnderflow(idx))),
        };
        max_stack = max_stack.max(depth).max(after);
        if max_stack > u16::MAX as usize {
            return Err(Error::MethodCodeMaxStackOverflow(max_stack));
        }

        match &instructions[idx] {
            CodeInstruction::Regular(_) => visit(idx + 1, after, &mut depths, &mut worklist),
            CodeInstruction::Branch(BranchInstruction::Jsr(target))
            | CodeInstruction::Branch(BranchInstruction::JsrW(target)) => {
                max_stack = max_stack.max(depth + 1);
                visit(target.0, depth + 1, &mut depths, &mut worklist);
                visit(idx + 1, depth, &mut depths, &mut worklist);
            }
            CodeInstruction::Branch(branch) => {
                for target in branch.jump_targets().targets() {
                    visit(target.0, after, &mut depths, &mut worklist);
                }
                if branch.falls_through() {
                    visit(idx + 1, after, &mut depths, &mut worklist);
                }
            }
        }
    }

    trace!("stack depths {:?} (max {})", depths, max_stack);
    Ok(StackDepths { depths, max_stack })
}

/// Record the depth on entry to an instruction, queueing it if that depth is new or larger
fn visit(idx: usize, depth: usize, depths: &mut [Option<usize>], worklist: &mut VecDeque<usize>) {
    if let Some(slot) = depths.get_mut(idx) {
        match slot {
            Some(existing) if *existing >= depth => (),
            _ => {
                *slot = Some(depth);
                worklist.push_back(idx);
            }
        }
    }
}

/// Number of local variable slots touched by instructions
pub fn locals_used(instructions: &[CodeInstruction]) -> usize {
    instructions
        .iter()
        .filter_map(|insn| match insn {
            CodeInstruction::Regular(insn) => insn.local_access(),
            CodeInstruction::Branch(BranchInstruction::Ret(idx)) => Some((*idx, 1)),
            CodeInstruction::Branch(_) => None,
        })
        .map(|(idx, width)| idx as usize + width)
        .max()
        .unwrap_or(0)
}

fn field_width(descriptor: &str) -> Result<usize, MalformedKind> {
    FieldType::parse(descriptor)
        .map(|field_type| field_type.width())
        .map_err(|_| MalformedKind::BadDescriptor(descriptor.to_owned()))
}

fn method_descriptor(descriptor: &str) -> Result<MethodDescriptor, MalformedKind> {
    MethodDescriptor::parse(descriptor)
        .map_err(|_| MalformedKind::BadDescriptor(descriptor.to_owned()))
}

/// Slots popped and then pushed by an instruction
fn stack_effect(
    insn: &CodeInstruction,
    constants: &ConstantsPool,
) -> Result<(usize, usize), MalformedKind> {
    use Instruction::*;

    let insn = match insn {
        CodeInstruction::Regular(insn) => insn,
        CodeInstruction::Branch(branch) => {
            let pops = match branch {
                BranchInstruction::If(_, _)
                | BranchInstruction::IfNull(_, _)
                | BranchInstruction::TableSwitch { .. }
                | BranchInstruction::LookupSwitch { .. }
                | BranchInstruction::IReturn
                | BranchInstruction::FReturn
                | BranchInstruction::AReturn
                | BranchInstruction::AThrow => 1,
                BranchInstruction::IfICmp(_, _)
                | BranchInstruction::IfACmp(_, _)
                | BranchInstruction::LReturn
                | BranchInstruction::DReturn => 2,
                BranchInstruction::Goto(_)
                | BranchInstruction::GotoW(_)
                | BranchInstruction::Jsr(_)
                | BranchInstruction::JsrW(_)
                | BranchInstruction::Ret(_)
                | BranchInstruction::Return => 0,
            };
            return Ok((pops, 0));
        }
    };

    let effect = match insn {
        Nop | IInc(_, _) => (0, 0),
        AConstNull | IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5
        | FConst0 | FConst1 | FConst2 | BiPush(_) | SiPush(_) | New(_) => (0, 1),
        LConst0 | LConst1 | DConst0 | DConst1 | Ldc2(_) => (0, 2),
        Ldc(idx) => (0, constants.loadable_width(*idx)?),

        ILoad(_) | FLoad(_) | ALoad(_) => (0, 1),
        LLoad(_) | DLoad(_) => (0, 2),
        IStore(_) | FStore(_) | AStore(_) => (1, 0),
        LStore(_) | DStore(_) => (2, 0),

        IALoad | FALoad | AALoad | BALoad | CALoad | SALoad => (2, 1),
        LALoad | DALoad => (2, 2),
        IAStore | FAStore | AAStore | BAStore | CAStore | SAStore => (3, 0),
        LAStore | DAStore => (4, 0),

        Pop | MonitorEnter | MonitorExit => (1, 0),
        Pop2 => (2, 0),
        Dup => (1, 2),
        DupX1 => (2, 3),
        DupX2 => (3, 4),
        Dup2 => (2, 4),
        Dup2X1 => (3, 5),
        Dup2X2 => (4, 6),
        Swap => (2, 2),

        IAdd | ISub | IMul | IDiv | IRem | IAnd | IOr | IXor | ISh(_) => (2, 1),
        FAdd | FSub | FMul | FDiv | FRem => (2, 1),
        LAdd | LSub | LMul | LDiv | LRem | LAnd | LOr | LXor => (4, 2),
        DAdd | DSub | DMul | DDiv | DRem => (4, 2),
        LSh(_) => (3, 2),
        INeg | FNeg => (1, 1),
        LNeg | DNeg => (2, 2),

        I2F | F2I | I2B | I2C | I2S => (1, 1),
        I2L | I2D | F2L | F2D => (1, 2),
        L2I | L2F | D2I | D2F => (2, 1),
        L2D | D2L => (2, 2),

        LCmp | DCmp(_) => (4, 1),
        FCmp(_) => (2, 1),

        GetStatic(idx) => (0, field_width(constants.member_ref(*idx)?.descriptor)?),
        PutStatic(idx) => (field_width(constants.member_ref(*idx)?.descriptor)?, 0),
        GetField(idx) => (1, field_width(constants.member_ref(*idx)?.descriptor)?),
        PutField(idx) => (1 + field_width(constants.member_ref(*idx)?.descriptor)?, 0),

        Invoke(invoke_type, idx) => {
            let descriptor = method_descriptor(constants.member_ref(*idx)?.descriptor)?;
            let has_this = !matches!(invoke_type, InvokeType::Static);
            (
                descriptor.parameter_length(has_this),
                descriptor.return_width(),
            )
        }
        InvokeDynamic(idx) => {
            let (_, descriptor) = constants.invoke_dynamic(*idx)?;
            let descriptor = method_descriptor(descriptor)?;
            (descriptor.parameter_length(false), descriptor.return_width())
        }

        NewArray(_) | ANewArray(_) | ArrayLength | CheckCast(_) | InstanceOf(_) => (1, 1),
        MultiANewArray(_, dimensions) => (*dimensions as usize, 1),
    };
    Ok(effect)
}
