use crate::jvm::class_file::{Attribute, Field, Method};
use crate::jvm::{
    ClassAccessFlags, ClassConstantIndex, ConstantsPool, Deserialize, Error, MalformedKind, Reader,
    Serialize, Version,
};
use byteorder::WriteBytesExt;

/// Representation of the [`class` file format of the JVM][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub version: Version,
    pub constants: ConstantsPool,
    pub access_flags: ClassAccessFlags,
    pub this_class: ClassConstantIndex,

    /// Index `0` for `java/lang/Object` (which has no superclass)
    pub super_class: ClassConstantIndex,
    pub interfaces: Vec<ClassConstantIndex>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Magic header bytes that go at the front of the serialized class file
    pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

    /// Parse a complete class file
    ///
    /// The buffer must contain exactly one class file and nothing more.
    pub fn parse(bytes: &[u8]) -> Result<ClassFile, Error> {
        let mut reader = Reader::new(bytes);
        let class = ClassFile::deserialize(&mut reader)?;
        reader.expect_end()?;
        Ok(class)
    }

    /// Serialize the class file into a fresh buffer
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut bytes = vec![];
        self.serialize(&mut bytes)?;
        Ok(bytes)
    }

    /// Name of this class, in binary form (eg. `java/lang/String`)
    pub fn class_name(&self) -> Result<&str, MalformedKind> {
        self.constants.class_name(self.this_class)
    }
}

impl Serialize for ClassFile {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&ClassFile::MAGIC)?;
        self.version.serialize(writer)?;
        self.constants.serialize(writer)?;
        self.access_flags.serialize(writer)?;
        self.this_class.serialize(writer)?;
        self.super_class.serialize(writer)?;
        self.interfaces.serialize(writer)?;
        self.fields.serialize(writer)?;
        self.methods.serialize(writer)?;
        self.attributes.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for ClassFile {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let magic = reader.read_u32()?;
        if magic.to_be_bytes() != ClassFile::MAGIC {
            return Err(Error::malformed(0, MalformedKind::BadMagic(magic)));
        }
        let version = Version::deserialize(reader)?;
        let constants = ConstantsPool::deserialize(reader)?;
        let access_flags = ClassAccessFlags::deserialize(reader)?;

        let this_class = ClassConstantIndex::deserialize(reader)?;
        reader.locate(constants.class_name(this_class))?;
        let super_class = ClassConstantIndex::deserialize(reader)?;
        if super_class.0 .0 != 0 {
            reader.locate(constants.class_name(super_class))?;
        }
        let interfaces: Vec<ClassConstantIndex> = Vec::deserialize(reader)?;
        for interface in &interfaces {
            reader.locate(constants.class_name(*interface))?;
        }

        let fields: Vec<Field> = Vec::deserialize(reader)?;
        let methods: Vec<Method> = Vec::deserialize(reader)?;
        let attributes: Vec<Attribute> = Vec::deserialize(reader)?;

        // Member and attribute names must at least be valid UTF-8 constants
        for field in &fields {
            reader.locate(constants.utf8(field.name_index))?;
            reader.locate(constants.utf8(field.descriptor_index))?;
        }
        for method in &methods {
            reader.locate(constants.utf8(method.name_index))?;
            reader.locate(constants.utf8(method.descriptor_index))?;
        }
        let all_attributes = fields
            .iter()
            .flat_map(|field| field.attributes.iter())
            .chain(methods.iter().flat_map(|method| method.attributes.iter()))
            .chain(attributes.iter());
        for attribute in all_attributes {
            reader.locate(attribute.name(&constants))?;
        }

        Ok(ClassFile {
            version,
            constants,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }
}
