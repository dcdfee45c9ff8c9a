use super::Rendering;
use crate::jvm::code::MethodBody;
use log::debug;

/// How to pick the local variable whose value is passed to the hook
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStrategy {
    /// Slot known ahead of time (eg. `1` for the first parameter of an instance method)
    Fixed(u16),

    /// First entry of the `LocalVariableTable` with this descriptor, in declaration order
    ///
    /// When the table is missing altogether, `fallback` is used if there is one. A table that
    /// exists but has no matching entry means the method doesn't look like we expect, so there is
    /// no fallback in that case.
    Lookup {
        descriptor: Rendering<String>,
        fallback: Option<u16>,
    },

    /// The hook takes no arguments
    NoArgument,
}

/// What gets loaded before the hook is called
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HookArgument {
    Nothing,
    Local(u16),
}

impl HookArgument {
    pub fn slot(&self) -> Option<u16> {
        match self {
            HookArgument::Nothing => None,
            HookArgument::Local(slot) => Some(*slot),
        }
    }
}

impl SlotStrategy {
    /// Resolve the argument to the hook, if possible
    pub fn resolve(&self, body: &MethodBody, obfuscated: bool) -> Option<HookArgument> {
        match self {
            SlotStrategy::Fixed(slot) => Some(HookArgument::Local(*slot)),
            SlotStrategy::NoArgument => Some(HookArgument::Nothing),
            SlotStrategy::Lookup {
                descriptor,
                fallback,
            } => {
                let descriptor = descriptor.select(obfuscated);
                if body.local_variables.is_empty() {
                    debug!("no local variable table, falling back to {:?}", fallback);
                    return fallback.map(HookArgument::Local);
                }
                let found = body
                    .local_variables
                    .iter()
                    .find(|local| local.descriptor == *descriptor)
                    .map(|local| HookArgument::Local(local.slot));
                debug!("local with descriptor {}: {:?}", descriptor, found);
                found
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{BranchInstruction, CodeInstruction, InsnIndex, LocalVariableEntry};

    fn body(locals: &[(u16, &str)]) -> MethodBody {
        MethodBody {
            max_stack: 0,
            max_locals: 3,
            instructions: vec![CodeInstruction::Branch(BranchInstruction::Return)],
            exception_table: vec![],
            line_numbers: vec![],
            local_variables: locals
                .iter()
                .map(|(slot, descriptor)| LocalVariableEntry {
                    slot: *slot,
                    name: format!("var{}", slot),
                    descriptor: (*descriptor).to_owned(),
                    start: InsnIndex(0),
                    end: InsnIndex(1),
                })
                .collect(),
            local_variable_types: vec![],
            frames: None,
            other_attributes: vec![],
        }
    }

    fn lookup(fallback: Option<u16>) -> SlotStrategy {
        SlotStrategy::Lookup {
            descriptor: Rendering {
                stable: "La/Chunk;".to_owned(),
                alternate: "Lbxp;".to_owned(),
            },
            fallback,
        }
    }

    #[test]
    fn first_match_wins() {
        let body = body(&[(0, "La/Owner;"), (2, "La/Chunk;"), (1, "La/Chunk;")]);
        assert_eq!(
            lookup(None).resolve(&body, false),
            Some(HookArgument::Local(2))
        );
        assert_eq!(lookup(None).resolve(&body, true), None);
    }

    #[test]
    fn fallback_only_without_table() {
        assert_eq!(lookup(None).resolve(&body(&[]), false), None);
        assert_eq!(
            lookup(Some(1)).resolve(&body(&[]), true),
            Some(HookArgument::Local(1))
        );
        assert_eq!(lookup(Some(1)).resolve(&body(&[(0, "La/Owner;")]), false), None);
    }

    #[test]
    fn fixed_and_no_argument() {
        assert_eq!(
            SlotStrategy::Fixed(1).resolve(&body(&[]), true),
            Some(HookArgument::Local(1))
        );
        assert_eq!(
            SlotStrategy::NoArgument.resolve(&body(&[]), false),
            Some(HookArgument::Nothing)
        );
    }
}
