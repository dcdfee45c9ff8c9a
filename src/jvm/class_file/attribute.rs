use crate::jvm::verifier::VerificationType;
use crate::jvm::{
    ClassConstantIndex, ConstantsPool, Deserialize, Error, MalformedKind, Reader, Serialize,
    Utf8ConstantIndex,
};
use byteorder::WriteBytesExt;

/// Attributes (used in classes, fields, methods, and even on some attributes)
///
/// Attributes are kept as raw bytes until something needs to look inside them. This way
/// attributes we don't understand (annotations, signatures, ...) survive a round trip untouched.
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: Utf8ConstantIndex,
    pub info: Vec<u8>,
}

impl Attribute {
    /// Name of the attribute, as found in the constant pool
    pub fn name<'a>(&self, constants: &'a ConstantsPool) -> Result<&'a str, MalformedKind> {
        constants.utf8(self.name_index)
    }

    /// Decode the attribute body, which must be consumed in full
    pub fn decode<A: AttributeLike + Deserialize>(&self) -> Result<A, Error> {
        let mut reader = Reader::new(&self.info);
        let attribute = A::deserialize(&mut reader)?;
        reader.expect_end()?;
        Ok(attribute)
    }
}

impl Serialize for Attribute {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.name_index.serialize(writer)?;

        // Attribute info length is 4 bytes
        (self.info.len() as u32).serialize(writer)?;
        writer.write_all(&self.info)?;

        Ok(())
    }
}

impl Deserialize for Attribute {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let name_index = Utf8ConstantIndex::deserialize(reader)?;
        let length = reader.read_u32()? as usize;
        let info = reader.read_bytes(length)?.to_vec();
        Ok(Attribute { name_index, info })
    }
}

/// Attributes are all stored in the same way (see `Attribute`), but internally
/// they represent very different things. This trait is implemented by things
/// which can be turned into attributes.
pub trait AttributeLike: Serialize {
    /// Name of the attribute
    const NAME: &'static str;
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.3
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_array: BytecodeArray,
    pub exception_table: Vec<ExceptionHandler>,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Code {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.max_stack.serialize(writer)?;
        self.max_locals.serialize(writer)?;
        self.code_array.serialize(writer)?;
        self.exception_table.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Code {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let max_stack = reader.read_u16()?;
        let max_locals = reader.read_u16()?;
        let code_array = BytecodeArray::deserialize(reader)?;
        let exception_table = Vec::deserialize(reader)?;
        let attributes = Vec::deserialize(reader)?;
        Ok(Code {
            max_stack,
            max_locals,
            code_array,
            exception_table,
            attributes,
        })
    }
}

impl AttributeLike for Code {
    const NAME: &'static str = "Code";
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandler {
    /// Start of exception handler range (inclusive)
    pub start_pc: BytecodeIndex,

    /// End of exception handler range (exclusive)
    pub end_pc: BytecodeIndex,

    /// Start of the exception handler
    pub handler_pc: BytecodeIndex,

    /// Index `0` catches everything (used for `finally`)
    pub catch_type: ClassConstantIndex,
}

impl Serialize for ExceptionHandler {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.end_pc.serialize(writer)?;
        self.handler_pc.serialize(writer)?;
        self.catch_type.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ExceptionHandler {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(ExceptionHandler {
            start_pc: BytecodeIndex::deserialize(reader)?,
            end_pc: BytecodeIndex::deserialize(reader)?,
            handler_pc: BytecodeIndex::deserialize(reader)?,
            catch_type: ClassConstantIndex::deserialize(reader)?,
        })
    }
}

/// Encoded bytecode instructions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BytecodeArray(pub Vec<u8>);

/// Code length is 4 bytes, even though the code can be no longer than 65535 bytes
impl Serialize for BytecodeArray {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let len = self.0.len() as u32;
        len.serialize(writer)?;
        writer.write_all(&self.0)?;
        Ok(())
    }
}

impl Deserialize for BytecodeArray {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let len = reader.read_u32()? as usize;
        if len == 0 || len > u16::MAX as usize {
            return Err(reader.error(MalformedKind::BadCodeOffset(len)));
        }
        Ok(BytecodeArray(reader.read_bytes(len)?.to_vec()))
    }
}

/// Index into `BytecodeArray`
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct BytecodeIndex(pub u16);

impl Serialize for BytecodeIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for BytecodeIndex {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(BytecodeIndex(reader.read_u16()?))
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackMapTable(pub Vec<StackMapFrame<ClassConstantIndex, u16>>);

impl AttributeLike for StackMapTable {
    const NAME: &'static str = "StackMapTable";
}

impl Serialize for StackMapTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for StackMapTable {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(StackMapTable(Vec::deserialize(reader)?))
    }
}

/// Compressed stack map frame
///
/// Frames are computed with class names (`Cls = String`) and then converted to constant pool
/// indices right before they are written out, so that only the types that actually end up in the
/// table get added to the constant pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackMapFrame<Cls, U> {
    /// Frame has the same locals as the previous frame and number of stack items is zero
    /// Tags: 0-63 or 251
    SameLocalsNoStack { offset_delta: u16 },

    /// Frame has the same locals as the previous frame and number of stack items is one
    /// Tags: 64-127 or 247
    SameLocalsOneStack {
        offset_delta: u16,
        stack: VerificationType<Cls, U>,
    },

    /// Frame is like the previous frame, but without the last `chopped_k` locals
    ///
    /// Note: `chopped_k` must be in the range 1 to 3 inclusive
    /// Tags: 248-250
    ChopLocalsNoStack { offset_delta: u16, chopped_k: u8 },

    /// Frame is like the previous frame, but with extra locals
    /// Tags: 252-254
    AppendLocalsNoStack {
        offset_delta: u16,
        locals: Vec<VerificationType<Cls, U>>,
    },

    /// Frame has exactly the locals and stack specified
    /// Tag: 255
    Full {
        offset_delta: u16,
        locals: Vec<VerificationType<Cls, U>>,
        stack: Vec<VerificationType<Cls, U>>,
    },
}

impl<Cls, U> StackMapFrame<Cls, U> {
    pub fn offset_delta(&self) -> u16 {
        match self {
            StackMapFrame::SameLocalsNoStack { offset_delta }
            | StackMapFrame::SameLocalsOneStack { offset_delta, .. }
            | StackMapFrame::ChopLocalsNoStack { offset_delta, .. }
            | StackMapFrame::AppendLocalsNoStack { offset_delta, .. }
            | StackMapFrame::Full { offset_delta, .. } => *offset_delta,
        }
    }

    /// Convert every verification type in the frame
    pub fn map<Cls2, U2, E>(
        &self,
        mut map_type: impl FnMut(&VerificationType<Cls, U>) -> Result<VerificationType<Cls2, U2>, E>,
    ) -> Result<StackMapFrame<Cls2, U2>, E> {
        Ok(match self {
            StackMapFrame::SameLocalsNoStack { offset_delta } => StackMapFrame::SameLocalsNoStack {
                offset_delta: *offset_delta,
            },
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => StackMapFrame::SameLocalsOneStack {
                offset_delta: *offset_delta,
                stack: map_type(stack)?,
            },
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => StackMapFrame::ChopLocalsNoStack {
                offset_delta: *offset_delta,
                chopped_k: *chopped_k,
            },
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => StackMapFrame::AppendLocalsNoStack {
                offset_delta: *offset_delta,
                locals: locals.iter().map(&mut map_type).collect::<Result<_, E>>()?,
            },
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => StackMapFrame::Full {
                offset_delta: *offset_delta,
                locals: locals.iter().map(&mut map_type).collect::<Result<_, E>>()?,
                stack: stack.iter().map(&mut map_type).collect::<Result<_, E>>()?,
            },
        })
    }
}

impl Serialize for StackMapFrame<ClassConstantIndex, u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            // `same_frame` and `same_frame_extended`
            StackMapFrame::SameLocalsNoStack { offset_delta } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8).serialize(writer)?;
                } else {
                    251u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
            }

            // `same_locals_1_stack_item_frame` and `same_locals_1_stack_item_frame_extended`
            StackMapFrame::SameLocalsOneStack {
                offset_delta,
                stack,
            } => {
                if *offset_delta <= 63 {
                    (*offset_delta as u8 + 64).serialize(writer)?;
                } else {
                    247u8.serialize(writer)?;
                    offset_delta.serialize(writer)?;
                }
                stack.serialize(writer)?;
            }

            // `chop_frame`
            StackMapFrame::ChopLocalsNoStack {
                offset_delta,
                chopped_k,
            } => {
                assert!(
                    0 < *chopped_k && *chopped_k < 4,
                    "ChopLocalsNoStack chops 1-3 locals"
                );
                (251 - chopped_k).serialize(writer)?;
                offset_delta.serialize(writer)?;
            }

            // `append_frame`
            StackMapFrame::AppendLocalsNoStack {
                offset_delta,
                locals,
            } => {
                let added_k = locals.len();
                assert!(
                    0 < added_k && added_k < 4,
                    "AppendLocalsNoStack adds 1-3 locals"
                );
                (251 + added_k as u8).serialize(writer)?;
                offset_delta.serialize(writer)?;
                for local in locals {
                    local.serialize(writer)?;
                }
            }

            // `full_frame`
            StackMapFrame::Full {
                offset_delta,
                locals,
                stack,
            } => {
                255u8.serialize(writer)?;
                offset_delta.serialize(writer)?;
                locals.serialize(writer)?;
                stack.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for StackMapFrame<ClassConstantIndex, u16> {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let frame_type = reader.read_u8()?;
        let frame = match frame_type {
            0..=63 => StackMapFrame::SameLocalsNoStack {
                offset_delta: frame_type as u16,
            },
            64..=127 => StackMapFrame::SameLocalsOneStack {
                offset_delta: frame_type as u16 - 64,
                stack: VerificationType::deserialize(reader)?,
            },
            247 => {
                let offset_delta = reader.read_u16()?;
                let stack = VerificationType::deserialize(reader)?;
                StackMapFrame::SameLocalsOneStack {
                    offset_delta,
                    stack,
                }
            }
            248..=250 => StackMapFrame::ChopLocalsNoStack {
                offset_delta: reader.read_u16()?,
                chopped_k: 251 - frame_type,
            },
            251 => StackMapFrame::SameLocalsNoStack {
                offset_delta: reader.read_u16()?,
            },
            252..=254 => {
                let offset_delta = reader.read_u16()?;
                let mut locals = vec![];
                for _ in 0..(frame_type - 251) {
                    locals.push(VerificationType::deserialize(reader)?);
                }
                StackMapFrame::AppendLocalsNoStack {
                    offset_delta,
                    locals,
                }
            }
            255 => {
                let offset_delta = reader.read_u16()?;
                let locals = Vec::deserialize(reader)?;
                let stack = Vec::deserialize(reader)?;
                StackMapFrame::Full {
                    offset_delta,
                    locals,
                    stack,
                }
            }
            _ => return Err(reader.error(MalformedKind::UnknownFrameType(frame_type))),
        };
        Ok(frame)
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.12
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumberTable(pub Vec<LineNumber>);

impl AttributeLike for LineNumberTable {
    const NAME: &'static str = "LineNumberTable";
}

impl Serialize for LineNumberTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LineNumberTable {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(LineNumberTable(Vec::deserialize(reader)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineNumber {
    pub start_pc: BytecodeIndex,
    pub line_number: u16,
}

impl Serialize for LineNumber {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.line_number.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LineNumber {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(LineNumber {
            start_pc: BytecodeIndex::deserialize(reader)?,
            line_number: reader.read_u16()?,
        })
    }
}

/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.13
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableTable(pub Vec<LocalVariable>);

impl AttributeLike for LocalVariableTable {
    const NAME: &'static str = "LocalVariableTable";
}

impl Serialize for LocalVariableTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LocalVariableTable {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(LocalVariableTable(Vec::deserialize(reader)?))
    }
}

/// Same layout as `LocalVariableTable`, but `descriptor_index` points at a generic signature
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.7.14
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableTypeTable(pub Vec<LocalVariable>);

impl AttributeLike for LocalVariableTypeTable {
    const NAME: &'static str = "LocalVariableTypeTable";
}

impl Serialize for LocalVariableTypeTable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for LocalVariableTypeTable {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(LocalVariableTypeTable(Vec::deserialize(reader)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariable {
    /// Start of the range in which the variable has a value
    pub start_pc: BytecodeIndex,

    /// Length of that range, in bytes
    pub length: u16,

    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,

    /// Local variable slot
    pub index: u16,
}

impl Serialize for LocalVariable {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.start_pc.serialize(writer)?;
        self.length.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.index.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for LocalVariable {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(LocalVariable {
            start_pc: BytecodeIndex::deserialize(reader)?,
            length: reader.read_u16()?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            index: reader.read_u16()?,
        })
    }
}
