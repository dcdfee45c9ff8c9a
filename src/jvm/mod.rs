//! Read, edit, and write JVM classes
//!
//! ### Layers
//!
//! The module is split the same way a class file is consumed:
//!
//!   - [`class_file`] mirrors the binary format one-to-one (constant pool indices, raw attributes)
//!   - [`code`] decodes a `Code` attribute into instructions and positional metadata
//!   - [`verifier`] knows about verification types, stack map frames, and stack depths
//!   - [`model`] ties those together into classes whose method bodies can be replaced
//!
//! ### Simple example
//!
//! Adding a `nop` at the start of the first method with code:
//!
//! ```no_run
//! use jvmpatch::jvm::code::{CodeInstruction, InsnIndex, Instruction};
//! use jvmpatch::jvm::model::CompiledType;
//! use jvmpatch::jvm::Error;
//!
//! # fn add_nop(bytes: &[u8]) -> Result<Vec<u8>, Error> {
//! let mut class = CompiledType::parse(bytes)?;
//! let index = class.methods.iter().position(|m| m.body.is_some()).unwrap();
//!
//! let mut body = class.methods[index].body.clone().unwrap();
//! body.insert(InsnIndex(0), vec![CodeInstruction::Regular(Instruction::Nop)]);
//!
//! let constants = class.constants().clone();
//! class.commit_method(index, body, constants)?;
//! class.to_bytes()
//! # }
//! ```

mod access_flags;
mod binary_format;
pub mod class_file;
pub mod code;
mod constants;
mod descriptors;
mod errors;
pub mod model;
mod names;
pub mod verifier;
mod version;

pub use access_flags::*;
pub use binary_format::*;
pub use constants::*;
pub use descriptors::*;
pub use errors::*;
pub use names::*;
pub use version::*;
