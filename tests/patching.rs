mod common;

use common::{index_bytes, method_body, raw_code, stack_map_table, ClassBuilder, MethodSpec};
use jvmpatch::jvm::class_file::StackMapFrame;
use jvmpatch::jvm::code::{
    BranchInstruction, CodeInstruction, InsnIndex, Instruction, InvokeType, OrdComparison,
};
use jvmpatch::jvm::model::CompiledType;
use jvmpatch::jvm::{Constant, MethodAccessFlags};
use jvmpatch::patch::{
    Error, HookSymbol, InsertionStrategy, Mappings, PatchOutcome, PatchRule, Rendering, RuleTable,
    Settings, SlotStrategy, TargetIdentity, Transformer,
};

const ALOAD_0: u8 = 0x2a;
const ALOAD_1: u8 = 0x2b;
const ILOAD_2: u8 = 0x1c;
const IFEQ: u8 = 0x99;
const GOTO: u8 = 0xa7;
const NOP: u8 = 0x00;
const PUTFIELD: u8 = 0xb5;
const RETURN: u8 = 0xb1;
const ATHROW: u8 = 0xbf;
const ASTORE_2: u8 = 0x4d;
const LDC: u8 = 0x12;
const ARETURN: u8 = 0xb0;

fn chunk_rule(mappings: &Mappings, insertion: InsertionStrategy) -> PatchRule {
    PatchRule::new(
        TargetIdentity::new(mappings, "a.Target", "setChunk", "(La/Chunk;)V").unwrap(),
        SlotStrategy::Lookup {
            descriptor: Rendering {
                stable: "La/Chunk;".to_owned(),
                alternate: mappings.alternate_descriptor("La/Chunk;").unwrap(),
            },
            fallback: None,
        },
        insertion,
        HookSymbol::new(mappings, "a/Hooks", "onChunk", "(La/Chunk;)V").unwrap(),
    )
    .unwrap()
}

fn entry_rule(mappings: &Mappings, method: &str, descriptor: &str, require_return: bool) -> PatchRule {
    PatchRule::new(
        TargetIdentity::new(mappings, "a.Target", method, descriptor).unwrap(),
        SlotStrategy::NoArgument,
        InsertionStrategy::FixedIndex {
            index: 0,
            require_return,
        },
        HookSymbol::new(mappings, "a/Hooks", "onEnter", "()V").unwrap(),
    )
    .unwrap()
}

fn transformer(rules: Vec<PatchRule>) -> Transformer {
    let mut table = RuleTable::new();
    for rule in rules {
        table.add(rule);
    }
    Transformer::with_rules(table)
}

/// `void setChunk(Chunk chunk) { this.chunk = chunk; }`
fn set_chunk_class(with_locals: bool) -> Vec<u8> {
    let mut builder = ClassBuilder::new("a/Target");
    let field = index_bytes(builder.field_ref("a/Target", "chunk", "La/Chunk;"));
    let code = vec![ALOAD_0, ALOAD_1, PUTFIELD, field[0], field[1], RETURN];
    let mut method = MethodSpec::new("setChunk", "(La/Chunk;)V", code);
    if with_locals {
        method = method.locals(vec![(0, "this", "La/Target;"), (1, "chunk", "La/Chunk;")]);
    }
    builder.method(method);
    builder.build()
}

/// `void check(Chunk chunk, int flag) { if (flag != 0) this.chunk = chunk; }`
fn branching_class() -> Vec<u8> {
    let mut builder = ClassBuilder::new("a/Target");
    let field = index_bytes(builder.field_ref("a/Target", "chunk", "La/Chunk;"));
    let code = vec![
        ILOAD_2, IFEQ, 0x00, 0x08, ALOAD_0, ALOAD_1, PUTFIELD, field[0], field[1], RETURN,
    ];
    let method = MethodSpec::new("check", "(La/Chunk;I)V", code)
        .locals(vec![
            (0, "this", "La/Target;"),
            (1, "chunk", "La/Chunk;"),
            (2, "flag", "I"),
        ])
        .frames(vec![StackMapFrame::SameLocalsNoStack { offset_delta: 9 }]);
    builder.method(method);
    builder.build()
}

fn hook_ref(bytes: &[u8], instruction: &CodeInstruction) -> (String, String, String) {
    let index = match instruction {
        CodeInstruction::Regular(Instruction::Invoke(InvokeType::Static, index)) => *index,
        other => panic!("expected invokestatic, got {:?}", other),
    };
    let class = CompiledType::parse(bytes).unwrap();
    let member = class.constants().member_ref(index).unwrap();
    (
        member.class.to_owned(),
        member.name.to_owned(),
        member.descriptor.to_owned(),
    )
}

#[test]
fn classes_without_rules_are_untouched() {
    let bytes = set_chunk_class(true);
    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);

    let patched = transformer.patch("a.Other", &bytes, false).unwrap();
    assert_eq!(patched.bytes, bytes);
    assert!(patched.outcomes.is_empty());

    // Not even parsed
    let garbage = vec![0xde, 0xad];
    assert_eq!(transformer.transform("a.Other", &garbage, false).unwrap(), garbage);
}

#[test]
fn hook_is_called_before_the_return() {
    let bytes = set_chunk_class(true);
    let original = method_body(&bytes, "setChunk");
    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);

    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert_eq!(
        patched.outcomes,
        vec![PatchOutcome::Applied {
            method: "a/Target.setChunk(La/Chunk;)V".to_owned(),
            index: InsnIndex(3),
            slot: Some(1),
        }]
    );
    assert_ne!(patched.bytes, bytes);

    let body = method_body(&patched.bytes, "setChunk");
    assert_eq!(body.instructions.len(), original.instructions.len() + 2);
    assert_eq!(&body.instructions[..3], &original.instructions[..3]);
    assert_eq!(
        body.instructions[3],
        CodeInstruction::Regular(Instruction::ALoad(1))
    );
    assert_eq!(
        hook_ref(&patched.bytes, &body.instructions[4]),
        (
            "a/Hooks".to_owned(),
            "onChunk".to_owned(),
            "(La/Chunk;)V".to_owned()
        )
    );
    assert_eq!(
        body.instructions[5],
        CodeInstruction::Branch(BranchInstruction::Return)
    );

    // Locals stay in scope up to the end of the longer code
    let chunk = &body.local_variables[1];
    assert_eq!((chunk.slot, chunk.name.as_str()), (1, "chunk"));
    assert_eq!((chunk.start, chunk.end), (InsnIndex(0), InsnIndex(6)));

    let code = raw_code(&patched.bytes, "setChunk");
    assert_eq!(code.max_stack, 2);
    assert_eq!(code.max_locals, 2);
    assert_eq!(code.code_array.0.len(), 10);
}

#[test]
fn only_one_application_is_promised() {
    let bytes = set_chunk_class(true);
    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);

    let once = transformer.transform("a.Target", &bytes, false).unwrap();
    let again = transformer.transform("a.Target", &bytes, false).unwrap();
    assert_eq!(once, again);
    assert_eq!(
        method_body(&once, "setChunk").instructions.len(),
        method_body(&bytes, "setChunk").instructions.len() + 2
    );
}

#[test]
fn missing_local_variable_table_leaves_method_alone() {
    let bytes = set_chunk_class(false);
    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);

    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert_eq!(patched.bytes, bytes);
    assert!(matches!(
        patched.outcomes.as_slice(),
        [PatchOutcome::SlotUnresolved { .. }]
    ));
}

#[test]
fn fixed_slot_works_without_local_variable_table() {
    let mappings = Mappings::new();
    let rule = PatchRule::new(
        TargetIdentity::new(&mappings, "a.Target", "setChunk", "(La/Chunk;)V").unwrap(),
        SlotStrategy::Fixed(1),
        InsertionStrategy::BeforeFirstReturn,
        HookSymbol::new(&mappings, "a/Hooks", "onChunk", "(La/Chunk;)V").unwrap(),
    )
    .unwrap();
    let bytes = set_chunk_class(false);

    let patched = transformer(vec![rule]).patch("a.Target", &bytes, false).unwrap();
    assert!(patched.outcomes[0].is_applied());
    let body = method_body(&patched.bytes, "setChunk");
    assert_eq!(
        body.instructions[3],
        CodeInstruction::Regular(Instruction::ALoad(1))
    );
}

#[test]
fn stable_and_obfuscated_names_patch_the_same_way() {
    let mut mappings = Mappings::new();
    mappings.add_class("a/Chunk", "q").unwrap();
    mappings.add_class("a/Target", "r").unwrap();
    mappings
        .add_method("a/Target", "setChunk", "(La/Chunk;)V", "b")
        .unwrap();
    let transformer = transformer(vec![chunk_rule(&mappings, InsertionStrategy::BeforeFirstReturn)]);

    let stable = set_chunk_class(true);

    let mut builder = ClassBuilder::new("r");
    let field = index_bytes(builder.field_ref("r", "c", "Lq;"));
    let code = vec![ALOAD_0, ALOAD_1, PUTFIELD, field[0], field[1], RETURN];
    builder.method(
        MethodSpec::new("b", "(Lq;)V", code).locals(vec![(0, "this", "Lr;"), (1, "chunk", "Lq;")]),
    );
    let obfuscated = builder.build();

    let stable = transformer.patch("a.Target", &stable, false).unwrap();
    let obfuscated_bytes = transformer
        .transform_class("r", "a.Target", &obfuscated)
        .unwrap();
    let obfuscated = transformer.patch("a.Target", &obfuscated, true).unwrap();
    assert_eq!(obfuscated.bytes, obfuscated_bytes);

    match (&stable.outcomes[..], &obfuscated.outcomes[..]) {
        (
            [PatchOutcome::Applied { index: i1, slot: s1, .. }],
            [PatchOutcome::Applied { index: i2, slot: s2, method }],
        ) => {
            assert_eq!(i1, i2);
            assert_eq!(s1, s2);
            assert_eq!(method, "r.b(Lq;)V");
        }
        other => panic!("expected both to be patched, got {:?}", other),
    }

    let body = method_body(&obfuscated.bytes, "b");
    assert_eq!(
        hook_ref(&obfuscated.bytes, &body.instructions[4]),
        ("a/Hooks".to_owned(), "onChunk".to_owned(), "(Lq;)V".to_owned())
    );
}

#[test]
fn stable_names_miss_obfuscated_classes() {
    let mut mappings = Mappings::new();
    mappings
        .add_method("a/Target", "setChunk", "(La/Chunk;)V", "b")
        .unwrap();
    let transformer = transformer(vec![chunk_rule(&mappings, InsertionStrategy::BeforeFirstReturn)]);

    // Requested with the stable name, but the class only has the obfuscated method
    let mut builder = ClassBuilder::new("a/Target");
    builder.method(MethodSpec::new("b", "(La/Chunk;)V", vec![RETURN]));
    let bytes = builder.build();

    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert_eq!(patched.bytes, bytes);
    assert!(matches!(
        patched.outcomes.as_slice(),
        [PatchOutcome::MethodNotFound { .. }]
    ));
}

#[test]
fn jumps_to_the_return_reach_the_hook() {
    let mappings = Mappings::new();
    let rule = PatchRule::new(
        TargetIdentity::new(&mappings, "a.Target", "check", "(La/Chunk;I)V").unwrap(),
        SlotStrategy::Fixed(1),
        InsertionStrategy::BeforeFirstReturn,
        HookSymbol::new(&mappings, "a/Hooks", "onChunk", "(La/Chunk;)V").unwrap(),
    )
    .unwrap();
    let bytes = branching_class();

    let patched = transformer(vec![rule]).patch("a.Target", &bytes, false).unwrap();
    assert!(patched.outcomes[0].is_applied());

    let body = method_body(&patched.bytes, "check");
    assert_eq!(body.instructions.len(), 8);
    assert_eq!(
        body.instructions[1],
        CodeInstruction::Branch(BranchInstruction::If(OrdComparison::EQ, InsnIndex(5)))
    );
    assert_eq!(
        body.instructions[5],
        CodeInstruction::Regular(Instruction::ALoad(1))
    );
    let frames = body.frames.unwrap();
    assert_eq!(
        frames.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
        vec![InsnIndex(5)]
    );

    let code = raw_code(&patched.bytes, "check");
    assert_eq!(&code.code_array.0[1..4], &[IFEQ, 0x00, 0x08]);
}

#[test]
fn frames_move_with_shifted_code() {
    let transformer = transformer(vec![entry_rule(&Mappings::new(), "check", "(La/Chunk;I)V", true)]);
    let bytes = branching_class();

    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert_eq!(
        patched.outcomes,
        vec![PatchOutcome::Applied {
            method: "a/Target.check(La/Chunk;I)V".to_owned(),
            index: InsnIndex(0),
            slot: None,
        }]
    );

    let body = method_body(&patched.bytes, "check");
    assert_eq!(body.instructions.len(), 7);
    assert_eq!(
        hook_ref(&patched.bytes, &body.instructions[0]),
        ("a/Hooks".to_owned(), "onEnter".to_owned(), "()V".to_owned())
    );
    assert_eq!(
        body.instructions[2],
        CodeInstruction::Branch(BranchInstruction::If(OrdComparison::EQ, InsnIndex(6)))
    );

    let code = raw_code(&patched.bytes, "check");
    assert_eq!(code.code_array.0.len(), 13);
    let table = stack_map_table(&patched.bytes, "check").unwrap();
    assert_eq!(
        table.0,
        vec![StackMapFrame::SameLocalsNoStack { offset_delta: 12 }]
    );
}

#[test]
fn fixed_index_needs_a_return() {
    let transformer = transformer(vec![entry_rule(&Mappings::new(), "fail", "()V", true)]);
    let mut builder = ClassBuilder::new("a/Target");
    builder.method(MethodSpec::new("fail", "()V", vec![0x01, ATHROW]));
    let bytes = builder.build();

    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert_eq!(patched.bytes, bytes);
    assert!(matches!(
        patched.outcomes.as_slice(),
        [PatchOutcome::AnchorNotFound { .. }]
    ));
}

#[test]
fn static_methods_patch_at_entry() {
    let transformer = transformer(vec![entry_rule(&Mappings::new(), "run", "()V", false)]);
    let mut builder = ClassBuilder::new("a/Target");
    builder.method(
        MethodSpec::new("run", "()V", vec![NOP, RETURN])
            .access_flags(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC),
    );
    let bytes = builder.build();

    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert!(patched.outcomes[0].is_applied());
    let body = method_body(&patched.bytes, "run");
    assert_eq!(body.instructions.len(), 3);
    assert_eq!(
        body.instructions[1],
        CodeInstruction::Regular(Instruction::Nop)
    );
    let code = raw_code(&patched.bytes, "run");
    assert_eq!(code.max_stack, 0);
    assert_eq!(code.max_locals, 0);
}

#[test]
fn unreachable_anchor_is_skipped() {
    let mappings = Mappings::new();
    let rule = PatchRule::new(
        TargetIdentity::new(&mappings, "a.Target", "skip", "()V").unwrap(),
        SlotStrategy::NoArgument,
        InsertionStrategy::FixedIndex {
            index: 1,
            require_return: false,
        },
        HookSymbol::new(&mappings, "a/Hooks", "onEnter", "()V").unwrap(),
    )
    .unwrap();
    let mut builder = ClassBuilder::new("a/Target");
    builder.method(MethodSpec::new("skip", "()V", vec![GOTO, 0x00, 0x04, NOP, RETURN]));
    let bytes = builder.build();

    let patched = transformer(vec![rule]).patch("a.Target", &bytes, false).unwrap();
    assert_eq!(patched.bytes, bytes);
    assert!(matches!(
        patched.outcomes.as_slice(),
        [PatchOutcome::AnchorUnreachable { .. }]
    ));
}

#[test]
fn jumps_pushed_out_of_range_leave_method_alone() {
    let mappings = Mappings::new();
    let rule = PatchRule::new(
        TargetIdentity::new(&mappings, "a.Target", "far", "(I)V").unwrap(),
        SlotStrategy::NoArgument,
        InsertionStrategy::FixedIndex {
            index: 2,
            require_return: true,
        },
        HookSymbol::new(&mappings, "a/Hooks", "onEnter", "()V").unwrap(),
    )
    .unwrap();

    // `ifeq` jumps exactly as far as it can, to the final `return`
    let mut code = vec![0x1a, IFEQ, 0x7f, 0xff];
    code.extend(std::iter::repeat(NOP).take(32_764));
    code.push(RETURN);
    let mut builder = ClassBuilder::new("a/Target");
    builder.method(
        MethodSpec::new("far", "(I)V", code)
            .access_flags(MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC),
    );
    let bytes = builder.build();

    let patched = transformer(vec![rule]).patch("a.Target", &bytes, false).unwrap();
    assert_eq!(patched.bytes, bytes);
    assert!(matches!(
        patched.outcomes.as_slice(),
        [PatchOutcome::EncodingFailed { .. }]
    ));
}

#[test]
fn rules_on_one_type_are_independent() {
    let mappings = Mappings::new();
    let transformer = transformer(vec![
        entry_rule(&mappings, "missing", "()V", true),
        chunk_rule(&mappings, InsertionStrategy::BeforeFirstReturn),
    ]);
    let bytes = set_chunk_class(true);

    let patched = transformer.patch("a/Target", &bytes, false).unwrap();
    assert!(matches!(
        patched.outcomes.as_slice(),
        [
            PatchOutcome::MethodNotFound { .. },
            PatchOutcome::Applied { .. }
        ]
    ));
    assert_eq!(method_body(&patched.bytes, "setChunk").instructions.len(), 6);
}

#[test]
fn malformed_classes_are_errors() {
    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);

    let result = transformer.transform("a.Target", &[0xca, 0xfe, 0xba, 0xbe, 0x00], false);
    assert!(matches!(result, Err(Error::MalformedInput(_))));

    let bytes = set_chunk_class(true);
    let result = transformer.transform("a.Target", &bytes[..bytes.len() - 3], false);
    assert!(matches!(result, Err(Error::MalformedInput(_))));
}

#[test]
fn builtin_profiler_rule() {
    let settings = Settings::new().unwrap();
    let transformer = Transformer::new(&settings).unwrap();

    let mut builder = ClassBuilder::new("net/minecraft/profiler/Profiler");
    builder.method(
        MethodSpec::new("endStartSection", "(Ljava/lang/String;)V", vec![NOP, RETURN])
            .locals(vec![(0, "this", "Lnet/minecraft/profiler/Profiler;"), (1, "name", "Ljava/lang/String;")]),
    );
    let bytes = builder.build();

    let patched = transformer
        .patch("net.minecraft.profiler.Profiler", &bytes, false)
        .unwrap();
    assert_eq!(
        patched.outcomes,
        vec![PatchOutcome::Applied {
            method: "net/minecraft/profiler/Profiler.endStartSection(Ljava/lang/String;)V"
                .to_owned(),
            index: InsnIndex(0),
            slot: Some(1),
        }]
    );
    let body = method_body(&patched.bytes, "endStartSection");
    assert_eq!(
        hook_ref(&patched.bytes, &body.instructions[1]),
        (
            "elucent/albedo/event/ProfilerStartEvent".to_owned(),
            "postNewEvent".to_owned(),
            "(Ljava/lang/String;)V".to_owned()
        )
    );

    // Obfuscated host: same class, renamed method
    let mut builder = ClassBuilder::new("rl");
    builder.method(MethodSpec::new("c", "(Ljava/lang/String;)V", vec![NOP, RETURN]));
    let bytes = builder.build();
    let patched = transformer
        .transform_class("rl", "net.minecraft.profiler.Profiler", &bytes)
        .unwrap();
    assert_ne!(patched, bytes);
    assert_eq!(method_body(&patched, "c").instructions.len(), 4);
}

#[test]
fn constants_are_only_appended() {
    let bytes = set_chunk_class(true);
    let before = CompiledType::parse(&bytes).unwrap();
    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);

    let patched = transformer.transform("a.Target", &bytes, false).unwrap();
    let after = CompiledType::parse(&patched).unwrap();
    for (index, constant) in before.constants().iter() {
        assert_eq!(after.constants().get(index).unwrap(), constant);
    }
}

#[test]
fn overloads_are_told_apart() {
    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);

    // Same name, different parameter type
    let mut builder = ClassBuilder::new("a/Target");
    builder.method(
        MethodSpec::new("setChunk", "(Ljava/lang/Object;)V", vec![RETURN])
            .locals(vec![(0, "this", "La/Target;"), (1, "chunk", "La/Chunk;")]),
    );
    let bytes = builder.build();
    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert_eq!(patched.bytes, bytes);
    assert!(matches!(
        patched.outcomes.as_slice(),
        [PatchOutcome::MethodNotFound { .. }]
    ));

    // Both overloads present: only the exact descriptor is patched
    let field = index_bytes(builder.field_ref("a/Target", "chunk", "La/Chunk;"));
    builder.method(
        MethodSpec::new(
            "setChunk",
            "(La/Chunk;)V",
            vec![ALOAD_0, ALOAD_1, PUTFIELD, field[0], field[1], RETURN],
        )
        .locals(vec![(0, "this", "La/Target;"), (1, "chunk", "La/Chunk;")]),
    );
    let bytes = builder.build();
    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert_eq!(
        patched.outcomes,
        vec![PatchOutcome::Applied {
            method: "a/Target.setChunk(La/Chunk;)V".to_owned(),
            index: InsnIndex(3),
            slot: Some(1),
        }]
    );

    let class = CompiledType::parse(&patched.bytes).unwrap();
    let lengths: Vec<(&str, usize)> = class
        .methods
        .iter()
        .map(|method| {
            let body = method.body.as_ref().unwrap();
            (method.descriptor.as_str(), body.instructions.len())
        })
        .collect();
    assert_eq!(
        lengths,
        vec![("(Ljava/lang/Object;)V", 1), ("(La/Chunk;)V", 6)]
    );
}

#[test]
fn exception_ranges_cover_the_same_instructions() {
    // `try { this.chunk = chunk; } catch (RuntimeException e) { }`
    let mut builder = ClassBuilder::new("a/Target");
    let field = index_bytes(builder.field_ref("a/Target", "chunk", "La/Chunk;"));
    let caught = builder.constants.get_class("java/lang/RuntimeException").unwrap();
    let code = vec![
        ALOAD_0, ALOAD_1, PUTFIELD, field[0], field[1], RETURN, ASTORE_2, RETURN,
    ];
    builder.method(
        MethodSpec::new("setChunk", "(La/Chunk;)V", code)
            .locals(vec![(0, "this", "La/Target;"), (1, "chunk", "La/Chunk;")])
            .handler(0, 5, 6, caught),
    );
    let bytes = builder.build();
    let original = method_body(&bytes, "setChunk");

    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);
    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert!(patched.outcomes[0].is_applied());

    let body = method_body(&patched.bytes, "setChunk");
    assert_eq!(body.exception_table.len(), 1);
    let range = &body.exception_table[0];
    assert_eq!(
        (range.start, range.end, range.handler),
        (InsnIndex(0), InsnIndex(3), InsnIndex(6))
    );
    assert_eq!(range.catch_type, original.exception_table[0].catch_type);

    // Same guarded instructions, same handler code
    assert_eq!(
        &body.instructions[range.start.0..range.end.0],
        &original.instructions[0..3]
    );
    assert_eq!(
        &body.instructions[range.handler.0..],
        &original.instructions[4..]
    );

    let code = raw_code(&patched.bytes, "setChunk");
    let handler = &code.exception_table[0];
    assert_eq!(
        (handler.start_pc.0, handler.end_pc.0, handler.handler_pc.0),
        (0, 5, 10)
    );
    assert_eq!(code.max_locals, 3);
}

#[test]
fn unpaired_surrogates_survive_patching() {
    let mut builder = ClassBuilder::new("a/Target");
    let text = builder.raw_string(&[0xED, 0xA0, 0x80]);
    let field = index_bytes(builder.field_ref("a/Target", "chunk", "La/Chunk;"));
    builder.method(MethodSpec::new(
        "text",
        "()Ljava/lang/String;",
        vec![LDC, text.0 as u8, ARETURN],
    ));
    builder.method(
        MethodSpec::new(
            "setChunk",
            "(La/Chunk;)V",
            vec![ALOAD_0, ALOAD_1, PUTFIELD, field[0], field[1], RETURN],
        )
        .locals(vec![(0, "this", "La/Target;"), (1, "chunk", "La/Chunk;")]),
    );
    let bytes = builder.build();

    let transformer = transformer(vec![chunk_rule(&Mappings::new(), InsertionStrategy::BeforeFirstReturn)]);
    let patched = transformer.patch("a.Target", &bytes, false).unwrap();
    assert!(patched.outcomes[0].is_applied());

    let class = CompiledType::parse(&patched.bytes).unwrap();
    let utf8 = match class.constants().get(text).unwrap() {
        Constant::String(utf8) => *utf8,
        other => panic!("expected a string constant, got {:?}", other),
    };
    assert_eq!(
        class.constants().get(utf8).unwrap(),
        &Constant::OpaqueUtf8(vec![0xED, 0xA0, 0x80])
    );
    assert_eq!(method_body(&patched.bytes, "text").instructions.len(), 2);
}
