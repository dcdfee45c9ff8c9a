use crate::jvm::class_file::Attribute;
use crate::jvm::{Deserialize, Error, FieldAccessFlags, Reader, Serialize, Utf8ConstantIndex};
use byteorder::WriteBytesExt;

/// Field declared by a class or interface
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.5
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub access_flags: FieldAccessFlags,
    pub name_index: Utf8ConstantIndex,
    pub descriptor_index: Utf8ConstantIndex,
    pub attributes: Vec<Attribute>,
}

impl Serialize for Field {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.access_flags.serialize(writer)?;
        self.name_index.serialize(writer)?;
        self.descriptor_index.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Field {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Field {
            access_flags: FieldAccessFlags::deserialize(reader)?,
            name_index: Utf8ConstantIndex::deserialize(reader)?,
            descriptor_index: Utf8ConstantIndex::deserialize(reader)?,
            attributes: Vec::deserialize(reader)?,
        })
    }
}
