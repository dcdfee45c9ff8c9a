use crate::jvm::code::{CodeInstruction, InsnIndex, MethodBody};

/// Where to put the hook call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertionStrategy {
    /// Right before the instruction at a fixed index near the start of the method
    ///
    /// With `require_return`, this only applies to methods that contain a return instruction.
    FixedIndex { index: usize, require_return: bool },

    /// Right before the first return instruction (`athrow` doesn't count)
    ///
    /// Methods with several returns only get the hook on the first one.
    BeforeFirstReturn,
}

impl InsertionStrategy {
    /// Find the instruction the hook call goes in front of
    pub fn find(&self, body: &MethodBody) -> Option<InsnIndex> {
        let first_return = body.find(CodeInstruction::is_return);
        match self {
            InsertionStrategy::FixedIndex {
                index,
                require_return,
            } => {
                if *index >= body.instructions.len() || (*require_return && first_return.is_none()) {
                    None
                } else {
                    Some(InsnIndex(*index))
                }
            }
            InsertionStrategy::BeforeFirstReturn => first_return,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{BranchInstruction, Instruction, OrdComparison};

    fn body(instructions: Vec<CodeInstruction>) -> MethodBody {
        MethodBody {
            max_stack: 1,
            max_locals: 1,
            instructions,
            exception_table: vec![],
            line_numbers: vec![],
            local_variables: vec![],
            local_variable_types: vec![],
            frames: None,
            other_attributes: vec![],
        }
    }

    #[test]
    fn first_return_only() {
        let body = body(vec![
            CodeInstruction::Regular(Instruction::ILoad(0)),
            CodeInstruction::Branch(BranchInstruction::If(OrdComparison::EQ, InsnIndex(3))),
            CodeInstruction::Branch(BranchInstruction::Return),
            CodeInstruction::Branch(BranchInstruction::Return),
        ]);
        assert_eq!(
            InsertionStrategy::BeforeFirstReturn.find(&body),
            Some(InsnIndex(2))
        );
    }

    #[test]
    fn throws_are_not_returns() {
        let body = body(vec![
            CodeInstruction::Regular(Instruction::AConstNull),
            CodeInstruction::Branch(BranchInstruction::AThrow),
        ]);
        assert_eq!(InsertionStrategy::BeforeFirstReturn.find(&body), None);
        let guarded = InsertionStrategy::FixedIndex {
            index: 0,
            require_return: true,
        };
        assert_eq!(guarded.find(&body), None);
        let unguarded = InsertionStrategy::FixedIndex {
            index: 0,
            require_return: false,
        };
        assert_eq!(unguarded.find(&body), Some(InsnIndex(0)));
    }

    #[test]
    fn fixed_index_must_exist() {
        let body = body(vec![CodeInstruction::Branch(BranchInstruction::Return)]);
        let strategy = InsertionStrategy::FixedIndex {
            index: 2,
            require_return: false,
        };
        assert_eq!(strategy.find(&body), None);
    }
}
