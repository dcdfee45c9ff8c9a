use crate::jvm::code::{
    BranchInstruction, CodeInstruction, CompareMode, EqComparison, InsnIndex, Instruction,
    InvokeType, OrdComparison, ShiftType,
};
use crate::jvm::{
    BaseType, ClassConstantIndex, ConstantIndex, ConstantsPool, Error, MalformedKind, Reader,
};

/// Instructions decoded from a code array, along with where each one started
#[derive(Debug)]
pub struct DecodedCode {
    pub instructions: Vec<CodeInstruction>,

    /// Byte offset of every instruction, followed by the length of the code array
    offsets: Vec<usize>,
}

impl DecodedCode {
    /// Instruction starting exactly at the given byte offset
    pub fn start_at(&self, offset: usize) -> Option<InsnIndex> {
        match self.offsets.binary_search(&offset) {
            Ok(idx) if idx + 1 < self.offsets.len() => Some(InsnIndex(idx)),
            _ => None,
        }
    }

    /// Like `start_at`, but also accepts the end of the code (for exclusive range bounds)
    pub fn bound_at(&self, offset: usize) -> Option<InsnIndex> {
        self.offsets.binary_search(&offset).ok().map(InsnIndex)
    }

    /// Byte offset where the instruction started
    pub fn offset_of(&self, index: InsnIndex) -> usize {
        self.offsets[index.0]
    }
}

/// First pass representation, with jump targets still as absolute byte offsets
enum RawInstruction {
    Regular(Instruction),
    Branch(BranchInstruction<isize, isize>),
}

/// Decode a code array
///
/// Every constant operand is checked against the constant pool and every jump must land at the
/// start of an instruction. Errors are reported at byte offsets into the code array.
pub fn decode_instructions(code: &[u8], constants: &ConstantsPool) -> Result<DecodedCode, Error> {
    let mut reader = Reader::new(code);
    let mut raw_instructions = vec![];
    let mut offsets = vec![];

    while reader.remaining() > 0 {
        let offset = reader.position();
        offsets.push(offset);
        raw_instructions.push(decode_instruction(&mut reader, constants)?);
    }
    offsets.push(code.len());

    let mut decoded = DecodedCode {
        instructions: Vec::with_capacity(raw_instructions.len()),
        offsets,
    };

    for (idx, raw_instruction) in raw_instructions.into_iter().enumerate() {
        let instruction = match raw_instruction {
            RawInstruction::Regular(insn) => CodeInstruction::Regular(insn),
            RawInstruction::Branch(branch) => {
                let offset = decoded.offsets[idx];
                let resolve = |target: &isize| -> Result<InsnIndex, Error> {
                    usize::try_from(*target)
                        .ok()
                        .and_then(|target| decoded.start_at(target))
                        .ok_or_else(|| {
                            Error::malformed(offset, MalformedKind::BadJumpTarget(*target))
                        })
                };
                CodeInstruction::Branch(branch.map_labels(resolve, resolve)?)
            }
        };
        decoded.instructions.push(instruction);
    }

    Ok(decoded)
}

fn decode_instruction(
    reader: &mut Reader<'_>,
    constants: &ConstantsPool,
) -> Result<RawInstruction, Error> {
    let start = reader.position();
    let opcode = reader.read_u8()?;

    // Jump targets are relative to the start of the branch instruction
    let target = |relative: isize| start as isize + relative;

    let insn = match opcode {
        0x00 => Instruction::Nop,
        0x01 => Instruction::AConstNull,
        0x02 => Instruction::IConstM1,
        0x03 => Instruction::IConst0,
        0x04 => Instruction::IConst1,
        0x05 => Instruction::IConst2,
        0x06 => Instruction::IConst3,
        0x07 => Instruction::IConst4,
        0x08 => Instruction::IConst5,
        0x09 => Instruction::LConst0,
        0x0a => Instruction::LConst1,
        0x0b => Instruction::FConst0,
        0x0c => Instruction::FConst1,
        0x0d => Instruction::FConst2,
        0x0e => Instruction::DConst0,
        0x0f => Instruction::DConst1,
        0x10 => Instruction::BiPush(reader.read_i8()?),
        0x11 => Instruction::SiPush(reader.read_i16()?),
        0x12 | 0x13 => {
            let idx = if opcode == 0x12 {
                ConstantIndex(reader.read_u8()? as u16)
            } else {
                ConstantIndex(reader.read_u16()?)
            };
            loadable(reader, constants, idx, 1)?;
            Instruction::Ldc(idx)
        }
        0x14 => {
            let idx = ConstantIndex(reader.read_u16()?);
            loadable(reader, constants, idx, 2)?;
            Instruction::Ldc2(idx)
        }
        0x15 => Instruction::ILoad(reader.read_u8()? as u16),
        0x16 => Instruction::LLoad(reader.read_u8()? as u16),
        0x17 => Instruction::FLoad(reader.read_u8()? as u16),
        0x18 => Instruction::DLoad(reader.read_u8()? as u16),
        0x19 => Instruction::ALoad(reader.read_u8()? as u16),
        0x1a..=0x1d => Instruction::ILoad((opcode - 0x1a) as u16),
        0x1e..=0x21 => Instruction::LLoad((opcode - 0x1e) as u16),
        0x22..=0x25 => Instruction::FLoad((opcode - 0x22) as u16),
        0x26..=0x29 => Instruction::DLoad((opcode - 0x26) as u16),
        0x2a..=0x2d => Instruction::ALoad((opcode - 0x2a) as u16),
        0x2e => Instruction::IALoad,
        0x2f => Instruction::LALoad,
        0x30 => Instruction::FALoad,
        0x31 => Instruction::DALoad,
        0x32 => Instruction::AALoad,
        0x33 => Instruction::BALoad,
        0x34 => Instruction::CALoad,
        0x35 => Instruction::SALoad,
        0x36 => Instruction::IStore(reader.read_u8()? as u16),
        0x37 => Instruction::LStore(reader.read_u8()? as u16),
        0x38 => Instruction::FStore(reader.read_u8()? as u16),
        0x39 => Instruction::DStore(reader.read_u8()? as u16),
        0x3a => Instruction::AStore(reader.read_u8()? as u16),
        0x3b..=0x3e => Instruction::IStore((opcode - 0x3b) as u16),
        0x3f..=0x42 => Instruction::LStore((opcode - 0x3f) as u16),
        0x43..=0x46 => Instruction::FStore((opcode - 0x43) as u16),
        0x47..=0x4a => Instruction::DStore((opcode - 0x47) as u16),
        0x4b..=0x4e => Instruction::AStore((opcode - 0x4b) as u16),
        0x4f => Instruction::IAStore,
        0x50 => Instruction::LAStore,
        0x51 => Instruction::FAStore,
        0x52 => Instruction::DAStore,
        0x53 => Instruction::AAStore,
        0x54 => Instruction::BAStore,
        0x55 => Instruction::CAStore,
        0x56 => Instruction::SAStore,
        0x57 => Instruction::Pop,
        0x58 => Instruction::Pop2,
        0x59 => Instruction::Dup,
        0x5a => Instruction::DupX1,
        0x5b => Instruction::DupX2,
        0x5c => Instruction::Dup2,
        0x5d => Instruction::Dup2X1,
        0x5e => Instruction::Dup2X2,
        0x5f => Instruction::Swap,
        0x60 => Instruction::IAdd,
        0x61 => Instruction::LAdd,
        0x62 => Instruction::FAdd,
        0x63 => Instruction::DAdd,
        0x64 => Instruction::ISub,
        0x65 => Instruction::LSub,
        0x66 => Instruction::FSub,
        0x67 => Instruction::DSub,
        0x68 => Instruction::IMul,
        0x69 => Instruction::LMul,
        0x6a => Instruction::FMul,
        0x6b => Instruction::DMul,
        0x6c => Instruction::IDiv,
        0x6d => Instruction::LDiv,
        0x6e => Instruction::FDiv,
        0x6f => Instruction::DDiv,
        0x70 => Instruction::IRem,
        0x71 => Instruction::LRem,
        0x72 => Instruction::FRem,
        0x73 => Instruction::DRem,
        0x74 => Instruction::INeg,
        0x75 => Instruction::LNeg,
        0x76 => Instruction::FNeg,
        0x77 => Instruction::DNeg,
        0x78 => Instruction::ISh(ShiftType::Left),
        0x79 => Instruction::LSh(ShiftType::Left),
        0x7a => Instruction::ISh(ShiftType::ArithmeticRight),
        0x7b => Instruction::LSh(ShiftType::ArithmeticRight),
        0x7c => Instruction::ISh(ShiftType::LogicalRight),
        0x7d => Instruction::LSh(ShiftType::LogicalRight),
        0x7e => Instruction::IAnd,
        0x7f => Instruction::LAnd,
        0x80 => Instruction::IOr,
        0x81 => Instruction::LOr,
        0x82 => Instruction::IXor,
        0x83 => Instruction::LXor,
        0x84 => {
            let idx = reader.read_u8()? as u16;
            let diff = reader.read_i8()? as i16;
            Instruction::IInc(idx, diff)
        }
        0x85 => Instruction::I2L,
        0x86 => Instruction::I2F,
        0x87 => Instruction::I2D,
        0x88 => Instruction::L2I,
        0x89 => Instruction::L2F,
        0x8a => Instruction::L2D,
        0x8b => Instruction::F2I,
        0x8c => Instruction::F2L,
        0x8d => Instruction::F2D,
        0x8e => Instruction::D2I,
        0x8f => Instruction::D2L,
        0x90 => Instruction::D2F,
        0x91 => Instruction::I2B,
        0x92 => Instruction::I2C,
        0x93 => Instruction::I2S,
        0x94 => Instruction::LCmp,
        0x95 => Instruction::FCmp(CompareMode::L),
        0x96 => Instruction::FCmp(CompareMode::G),
        0x97 => Instruction::DCmp(CompareMode::L),
        0x98 => Instruction::DCmp(CompareMode::G),

        0x99..=0x9e => {
            let comparison = ord_comparison(opcode - 0x99);
            let relative = reader.read_i16()? as isize;
            return Ok(RawInstruction::Branch(BranchInstruction::If(
                comparison,
                target(relative),
            )));
        }
        0x9f..=0xa4 => {
            let comparison = ord_comparison(opcode - 0x9f);
            let relative = reader.read_i16()? as isize;
            return Ok(RawInstruction::Branch(BranchInstruction::IfICmp(
                comparison,
                target(relative),
            )));
        }
        0xa5 | 0xa6 | 0xc6 | 0xc7 => {
            let comparison = if opcode == 0xa5 || opcode == 0xc6 {
                EqComparison::EQ
            } else {
                EqComparison::NE
            };
            let lbl = target(reader.read_i16()? as isize);
            let branch = if opcode < 0xc6 {
                BranchInstruction::IfACmp(comparison, lbl)
            } else {
                BranchInstruction::IfNull(comparison, lbl)
            };
            return Ok(RawInstruction::Branch(branch));
        }
        0xa7 => {
            let lbl = target(reader.read_i16()? as isize);
            return Ok(RawInstruction::Branch(BranchInstruction::Goto(lbl)));
        }
        0xa8 => {
            let lbl = target(reader.read_i16()? as isize);
            return Ok(RawInstruction::Branch(BranchInstruction::Jsr(lbl)));
        }
        0xa9 => {
            let idx = reader.read_u8()? as u16;
            return Ok(RawInstruction::Branch(BranchInstruction::Ret(idx)));
        }
        0xaa => {
            let padding = switch_padding(start);
            reader.skip(padding as usize)?;
            let default = target(reader.read_i32()? as isize);
            let low = reader.read_i32()?;
            let high = reader.read_i32()?;
            if high < low {
                return Err(Error::malformed(start, MalformedKind::BadSwitch));
            }
            let count = high as i64 - low as i64 + 1;
            if count * 4 > reader.remaining() as i64 {
                return Err(reader.error(MalformedKind::UnexpectedEof));
            }
            let mut targets = vec![];
            for _ in 0..count {
                targets.push(target(reader.read_i32()? as isize));
            }
            return Ok(RawInstruction::Branch(BranchInstruction::TableSwitch {
                padding,
                default,
                low,
                targets,
            }));
        }
        0xab => {
            let padding = switch_padding(start);
            reader.skip(padding as usize)?;
            let default = target(reader.read_i32()? as isize);
            let npairs = reader.read_i32()?;
            if npairs < 0 {
                return Err(Error::malformed(start, MalformedKind::BadSwitch));
            }
            if npairs as i64 * 8 > reader.remaining() as i64 {
                return Err(reader.error(MalformedKind::UnexpectedEof));
            }
            let mut targets = vec![];
            for _ in 0..npairs {
                let key = reader.read_i32()?;
                targets.push((key, target(reader.read_i32()? as isize)));
            }
            return Ok(RawInstruction::Branch(BranchInstruction::LookupSwitch {
                padding,
                default,
                targets,
            }));
        }
        0xac => return Ok(RawInstruction::Branch(BranchInstruction::IReturn)),
        0xad => return Ok(RawInstruction::Branch(BranchInstruction::LReturn)),
        0xae => return Ok(RawInstruction::Branch(BranchInstruction::FReturn)),
        0xaf => return Ok(RawInstruction::Branch(BranchInstruction::DReturn)),
        0xb0 => return Ok(RawInstruction::Branch(BranchInstruction::AReturn)),
        0xb1 => return Ok(RawInstruction::Branch(BranchInstruction::Return)),

        0xb2..=0xb5 => {
            let idx = ConstantIndex(reader.read_u16()?);
            reader.locate(constants.member_ref(idx))?;
            match opcode {
                0xb2 => Instruction::GetStatic(idx),
                0xb3 => Instruction::PutStatic(idx),
                0xb4 => Instruction::GetField(idx),
                _ => Instruction::PutField(idx),
            }
        }
        0xb6..=0xb8 => {
            let idx = ConstantIndex(reader.read_u16()?);
            reader.locate(constants.member_ref(idx))?;
            let invoke_type = match opcode {
                0xb6 => InvokeType::Virtual,
                0xb7 => InvokeType::Special,
                _ => InvokeType::Static,
            };
            Instruction::Invoke(invoke_type, idx)
        }
        0xb9 => {
            let idx = ConstantIndex(reader.read_u16()?);
            reader.locate(constants.member_ref(idx))?;
            let count = reader.read_u8()?;
            reader.skip(1)?;
            Instruction::Invoke(InvokeType::Interface(count), idx)
        }
        0xba => {
            let idx = ConstantIndex(reader.read_u16()?);
            reader.locate(constants.invoke_dynamic(idx))?;
            reader.skip(2)?;
            Instruction::InvokeDynamic(idx)
        }
        0xbb => Instruction::New(class_operand(reader, constants)?),
        0xbc => {
            let atype = reader.read_u8()?;
            let base_type = match atype {
                4 => BaseType::Boolean,
                5 => BaseType::Char,
                6 => BaseType::Float,
                7 => BaseType::Double,
                8 => BaseType::Byte,
                9 => BaseType::Short,
                10 => BaseType::Int,
                11 => BaseType::Long,
                _ => return Err(Error::malformed(start, MalformedKind::BadArrayType(atype))),
            };
            Instruction::NewArray(base_type)
        }
        0xbd => Instruction::ANewArray(class_operand(reader, constants)?),
        0xbe => Instruction::ArrayLength,
        0xbf => return Ok(RawInstruction::Branch(BranchInstruction::AThrow)),
        0xc0 => Instruction::CheckCast(class_operand(reader, constants)?),
        0xc1 => Instruction::InstanceOf(class_operand(reader, constants)?),
        0xc2 => Instruction::MonitorEnter,
        0xc3 => Instruction::MonitorExit,
        0xc4 => return decode_wide(reader, start),
        0xc5 => {
            let class = class_operand(reader, constants)?;
            let dimensions = reader.read_u8()?;
            Instruction::MultiANewArray(class, dimensions)
        }
        0xc8 => {
            let lbl = target(reader.read_i32()? as isize);
            return Ok(RawInstruction::Branch(BranchInstruction::GotoW(lbl)));
        }
        0xc9 => {
            let lbl = target(reader.read_i32()? as isize);
            return Ok(RawInstruction::Branch(BranchInstruction::JsrW(lbl)));
        }

        _ => return Err(Error::malformed(start, MalformedKind::UnknownOpcode(opcode))),
    };

    Ok(RawInstruction::Regular(insn))
}

/// Instructions that can follow a `wide` prefix
fn decode_wide(reader: &mut Reader<'_>, start: usize) -> Result<RawInstruction, Error> {
    let opcode = reader.read_u8()?;
    let insn = match opcode {
        0x84 => {
            let idx = reader.read_u16()?;
            let diff = reader.read_i16()?;
            Instruction::IInc(idx, diff)
        }
        0xa9 => {
            let idx = reader.read_u16()?;
            return Ok(RawInstruction::Branch(BranchInstruction::Ret(idx)));
        }
        0x15 => Instruction::ILoad(reader.read_u16()?),
        0x16 => Instruction::LLoad(reader.read_u16()?),
        0x17 => Instruction::FLoad(reader.read_u16()?),
        0x18 => Instruction::DLoad(reader.read_u16()?),
        0x19 => Instruction::ALoad(reader.read_u16()?),
        0x36 => Instruction::IStore(reader.read_u16()?),
        0x37 => Instruction::LStore(reader.read_u16()?),
        0x38 => Instruction::FStore(reader.read_u16()?),
        0x39 => Instruction::DStore(reader.read_u16()?),
        0x3a => Instruction::AStore(reader.read_u16()?),
        _ => return Err(Error::malformed(start, MalformedKind::BadWideOpcode(opcode))),
    };
    Ok(RawInstruction::Regular(insn))
}

/// Comparisons in opcode order (`eq`, `ne`, `lt`, `ge`, `gt`, `le`)
fn ord_comparison(delta: u8) -> OrdComparison {
    match delta {
        0 => OrdComparison::EQ,
        1 => OrdComparison::NE,
        2 => OrdComparison::LT,
        3 => OrdComparison::GE,
        4 => OrdComparison::GT,
        _ => OrdComparison::LE,
    }
}

/// Padding after a switch opcode so that the operands start 4-byte aligned
pub fn switch_padding(opcode_offset: usize) -> u8 {
    (3 - (opcode_offset % 4)) as u8
}

fn class_operand(
    reader: &mut Reader<'_>,
    constants: &ConstantsPool,
) -> Result<ClassConstantIndex, Error> {
    let idx = ClassConstantIndex(ConstantIndex(reader.read_u16()?));
    reader.locate(constants.class_name(idx))?;
    Ok(idx)
}

fn loadable(
    reader: &Reader<'_>,
    constants: &ConstantsPool,
    idx: ConstantIndex,
    expected_width: usize,
) -> Result<(), Error> {
    let width = reader.locate(constants.loadable_width(idx))?;
    if width != expected_width {
        let expected = if expected_width == 1 {
            "single-width loadable constant"
        } else {
            "Long or Double"
        };
        return Err(reader.error(MalformedKind::ConstantTypeMismatch {
            index: idx,
            expected,
        }));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_short_and_wide_forms() {
        let pool = ConstantsPool::new();
        let code = [0x2b, 0x15, 0x07, 0xc4, 0x39, 0x01, 0x2c, 0x84, 0x02, 0xff, 0xb1];
        let decoded = decode_instructions(&code, &pool).unwrap();
        assert_eq!(
            decoded.instructions,
            vec![
                CodeInstruction::Regular(Instruction::ALoad(1)),
                CodeInstruction::Regular(Instruction::ILoad(7)),
                CodeInstruction::Regular(Instruction::DStore(300)),
                CodeInstruction::Regular(Instruction::IInc(2, -1)),
                CodeInstruction::Branch(BranchInstruction::Return),
            ]
        );
        assert_eq!(decoded.start_at(3), Some(InsnIndex(2)));
        assert_eq!(decoded.start_at(4), None);
        assert_eq!(decoded.start_at(11), None);
        assert_eq!(decoded.bound_at(11), Some(InsnIndex(5)));
    }

    #[test]
    fn jumps_become_instruction_indices() {
        let pool = ConstantsPool::new();
        // iload_0; ifeq +5; iconst_1; ireturn; iconst_0; ireturn
        let code = [0x1a, 0x99, 0x00, 0x05, 0x04, 0xac, 0x03, 0xac];
        let decoded = decode_instructions(&code, &pool).unwrap();
        assert_eq!(
            decoded.instructions[1],
            CodeInstruction::Branch(BranchInstruction::If(OrdComparison::EQ, InsnIndex(4)))
        );
    }

    #[test]
    fn jump_into_instruction_is_malformed() {
        let pool = ConstantsPool::new();
        // goto +2 lands in the middle of the `goto` itself
        let code = [0xa7, 0x00, 0x02, 0xb1];
        match decode_instructions(&code, &pool) {
            Err(Error::Malformed { offset, kind }) => {
                assert_eq!(offset, 0);
                assert_eq!(kind, MalformedKind::BadJumpTarget(2));
            }
            other => panic!("expected bad jump, got {:?}", other),
        }
    }

    #[test]
    fn switch_padding_is_skipped() {
        let pool = ConstantsPool::new();
        #[rustfmt::skip]
        let code = [
            0x03,                   // iconst_0
            0xaa, 0x00, 0x00,       // tableswitch + 2 bytes padding
            0x00, 0x00, 0x00, 0x13, // default: +19
            0x00, 0x00, 0x00, 0x00, // low
            0x00, 0x00, 0x00, 0x00, // high
            0x00, 0x00, 0x00, 0x13, // 0: +19
            0xb1,                   // return
        ];
        let decoded = decode_instructions(&code, &pool).unwrap();
        assert_eq!(
            decoded.instructions[1],
            CodeInstruction::Branch(BranchInstruction::TableSwitch {
                padding: 2,
                default: InsnIndex(2),
                low: 0,
                targets: vec![InsnIndex(2)],
            })
        );
    }

    #[test]
    fn unknown_opcode() {
        let pool = ConstantsPool::new();
        match decode_instructions(&[0x00, 0xca], &pool) {
            Err(Error::Malformed { offset, kind }) => {
                assert_eq!(offset, 1);
                assert_eq!(kind, MalformedKind::UnknownOpcode(0xca));
            }
            other => panic!("expected unknown opcode, got {:?}", other),
        }
    }

    #[test]
    fn constant_operands_are_checked() {
        let pool = ConstantsPool::new();
        match decode_instructions(&[0x12, 0x01, 0xb1], &pool) {
            Err(Error::Malformed { kind, .. }) => {
                assert_eq!(kind, MalformedKind::BadConstantIndex(ConstantIndex(1)))
            }
            other => panic!("expected bad constant, got {:?}", other),
        }
    }
}
