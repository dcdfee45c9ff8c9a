//! Bytecode representation and editing
//!
//! ### Structure
//!
//! Despite being pushed off into [just another method attribute](crate::jvm::class_file::Code),
//! the bytecode is arguably the most important part of the class file - it contains the actual
//! executable instructions. We split up the [list of bytecode instructions][0] into two groups:
//!
//!   - [`Instruction`] for straight-line instructions
//!   - [`BranchInstruction`] for instructions that may jump, return, or throw
//!
//! ### Editing
//!
//! A [`MethodBody`] is the decoded form of a `Code` attribute in which every position (jump
//! targets, exception ranges, debug tables, stack map frames) is an [`InsnIndex`] instead of a byte
//! offset. That makes inserting instructions cheap: shift the indices, then let [`lay_out`]
//! compute fresh byte offsets when the body gets encoded again.
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se18/html/jvms-6.html#jvms-6.5

mod body;
mod decode;
mod instructions;
mod layout;

pub use body::*;
pub use decode::*;
pub use instructions::*;
pub use layout::*;
