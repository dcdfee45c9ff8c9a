//! Editable representations of classes
//!
//! This is the representation to use while patching. Parsing a class decodes the body of every
//! method, but serializing only re-encodes the bodies that were actually edited: everything else
//! keeps the exact bytes it had in the input.
//!
//!   - __Class__ is represented using [`CompiledType`]
//!   - __Method__ is represented using [`CompiledMethod`]

mod class;
mod method;

pub use class::*;
pub use method::*;
