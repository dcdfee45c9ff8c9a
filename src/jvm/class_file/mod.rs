//! Raw structures of the class file format
//!
//! Everything here maps one-to-one onto the binary layout. Interpreting the contents of a method
//! body happens in [`crate::jvm::code`].

mod attribute;
mod class;
mod field;
mod method;

pub use attribute::*;
pub use class::*;
pub use field::*;
pub use method::*;
