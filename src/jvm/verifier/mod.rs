//! Verification types, stack map frames, and the stack depth analysis needed to recompute
//! `max_stack` after code has been inserted

mod frame;
mod stack;
mod types;

pub use frame::*;
pub use stack::*;
pub use types::*;
