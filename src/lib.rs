//! Load-time patching of JVM classes
//!
//! The [`patch`] module decides what to insert where, on top of the class file model in [`jvm`].

pub mod jvm;
pub mod patch;
mod util;
