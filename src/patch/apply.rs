use super::{HookArgument, HookSymbol};
use crate::jvm::code::{CodeInstruction, InsnIndex, Instruction, InvokeType, MethodBody};
use crate::jvm::{BaseType, ConstantsPool, Error, FieldType};

/// Instructions calling the hook: load the argument (if any), then `invokestatic`
///
/// The `Methodref` for the hook is added to `constants`. The load instruction is picked from the
/// parameter type of the hook.
pub fn hook_call(
    hook: &HookSymbol,
    argument: HookArgument,
    constants: &mut ConstantsPool,
    obfuscated: bool,
) -> Result<Vec<CodeInstruction>, Error> {
    let mut instructions = vec![];

    if let HookArgument::Local(slot) = argument {
        let load = match hook.parsed_descriptor.parameters.first() {
            Some(FieldType::Base(BaseType::Long)) => Instruction::LLoad(slot),
            Some(FieldType::Base(BaseType::Float)) => Instruction::FLoad(slot),
            Some(FieldType::Base(BaseType::Double)) => Instruction::DLoad(slot),
            Some(FieldType::Base(_)) => Instruction::ILoad(slot),
            Some(_) | None => Instruction::ALoad(slot),
        };
        instructions.push(CodeInstruction::Regular(load));
    }

    let method_ref = constants.get_method_ref(
        &hook.owner,
        &hook.name,
        hook.descriptor.select(obfuscated),
        false,
    )?;
    instructions.push(CodeInstruction::Regular(Instruction::Invoke(
        InvokeType::Static,
        method_ref.0,
    )));

    Ok(instructions)
}

/// Splice the hook call in front of the anchor instruction
///
/// Nothing is removed, and the call leaves the stack as it found it. Jumps to the anchor now land
/// on the hook call.
pub fn apply(body: &mut MethodBody, anchor: InsnIndex, call: Vec<CodeInstruction>) {
    body.insert(anchor, call);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::patch::Mappings;

    #[test]
    fn typed_loads() {
        let mappings = Mappings::new();
        let mut constants = ConstantsPool::new();
        let cases = [
            ("(J)V", Instruction::LLoad(3)),
            ("(D)V", Instruction::DLoad(3)),
            ("(F)V", Instruction::FLoad(3)),
            ("(Z)V", Instruction::ILoad(3)),
            ("([I)V", Instruction::ALoad(3)),
        ];
        for (descriptor, load) in cases {
            let hook = HookSymbol::new(&mappings, "a/Hook", "post", descriptor).unwrap();
            let call = hook_call(&hook, HookArgument::Local(3), &mut constants, false).unwrap();
            assert_eq!(call.len(), 2);
            assert_eq!(call[0], CodeInstruction::Regular(load));
        }
    }

    #[test]
    fn method_ref_is_shared() {
        let mappings = Mappings::new();
        let mut constants = ConstantsPool::new();
        let hook = HookSymbol::new(&mappings, "a/Hook", "enable", "()V").unwrap();
        let first = hook_call(&hook, HookArgument::Nothing, &mut constants, false).unwrap();
        let count = constants.len();
        let second = hook_call(&hook, HookArgument::Nothing, &mut constants, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(constants.len(), count);
    }
}
