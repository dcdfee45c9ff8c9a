//! Splice static hook calls into methods of classes as they get loaded
//!
//! ### Pipeline
//!
//! For every class the host loads, the [`Transformer`] looks up the [`PatchRule`]s for its type.
//! Types without rules are handed back untouched. Otherwise, for each rule:
//!
//!   1. the [`TargetIdentity`] is resolved into the literal method name and descriptor, in
//!      whichever naming scheme (stable or obfuscated) the host uses
//!   2. the method is located by exact name and descriptor ([`find_method`])
//!   3. the [`SlotStrategy`] picks the local variable to pass to the hook
//!   4. the [`InsertionStrategy`] picks the instruction to put the call in front of
//!   5. the load and `invokestatic` are spliced in ([`apply`]) and the method is re-encoded
//!
//! A rule that fails at any step leaves its method alone: the outcome is reported as a
//! [`PatchOutcome`] and logged, but it is not an error.

mod apply;
mod builtin;
mod errors;
mod identity;
mod insertion;
mod locator;
mod mappings;
mod rules;
mod settings;
mod slots;

pub use apply::*;
pub use builtin::*;
pub use errors::*;
pub use identity::*;
pub use insertion::*;
pub use locator::*;
pub use mappings::*;
pub use rules::*;
pub use settings::*;
pub use slots::*;
