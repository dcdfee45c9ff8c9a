use crate::jvm::{
    BaseType, ClassConstantIndex, ConstantsPool, Deserialize, Error, FieldType, MalformedKind,
    Reader, Serialize,
};
use crate::util::Width;
use byteorder::WriteBytesExt;

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls, U> {
    /// Unusable slot (eg. a local that was never assigned on some path)
    Top,
    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called by `<init>` has not been called
    ///
    ///   - in a method body, we use an instruction index for `U`: the position of the `new`
    ///     instruction, which moves along with that instruction when code is inserted
    ///   - when serializing into a classfile, we use `u16` for `U`, corresponding to the offset of
    ///     the `new` instruction from the start of the method body
    Uninitialized(U),
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Convert the class and uninitialized representations
    pub fn map<Cls2, U2, E>(
        &self,
        map_class: impl FnOnce(&Cls) -> Result<Cls2, E>,
        map_uninitialized: impl FnOnce(&U) -> Result<U2, E>,
    ) -> Result<VerificationType<Cls2, U2>, E> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)?),
            VerificationType::Uninitialized(u) => {
                VerificationType::Uninitialized(map_uninitialized(u)?)
            }
        })
    }
}

/// Object types are named by what would go in a `CONSTANT_Class_info` (so array types use their
/// descriptor).
impl<U> From<&FieldType> for VerificationType<String, U> {
    fn from(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Object(cls) => VerificationType::Object(cls.as_str().to_owned()),
            FieldType::Array { .. } => VerificationType::Object(field_type.to_string()),
        }
    }
}

impl<U: Copy> VerificationType<ClassConstantIndex, U> {
    /// Resolve the class constant into the name of the class
    pub fn resolve_class(
        &self,
        constants: &ConstantsPool,
    ) -> Result<VerificationType<String, U>, MalformedKind> {
        self.map(
            |cls| constants.class_name(*cls).map(str::to_owned),
            |u| Ok(*u),
        )
    }
}

impl Serialize for VerificationType<ClassConstantIndex, u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for VerificationType<ClassConstantIndex, u16> {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let vtype = match reader.read_u8()? {
            0 => VerificationType::Top,
            1 => VerificationType::Integer,
            2 => VerificationType::Float,
            3 => VerificationType::Double,
            4 => VerificationType::Long,
            5 => VerificationType::Null,
            6 => VerificationType::UninitializedThis,
            7 => VerificationType::Object(ClassConstantIndex::deserialize(reader)?),
            8 => VerificationType::Uninitialized(reader.read_u16()?),
            other => return Err(reader.error(MalformedKind::UnknownVerificationType(other))),
        };
        Ok(vtype)
    }
}

impl<Cls, A> Width for VerificationType<Cls, A> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}
