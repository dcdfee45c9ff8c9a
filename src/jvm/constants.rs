use super::class_file::{Attribute, AttributeLike};
use super::{Deserialize, Error, MalformedKind, Reader, Serialize};
use crate::util::{Offset, OffsetVec, Width};
use byteorder::WriteBytesExt;
use std::collections::HashMap;
use std::result::Result;

/// Class file constants pool
///
/// The pool is read in the order it appears in the class file and written back out in that same
/// order, so indices used anywhere in the class (including attributes we never decode) stay
/// valid. New constants can only be appended. Lookups of the kinds of constants we add
/// (`Utf8`, `Class`, `NameAndType`, `Methodref`) are deduplicated against what the class already
/// contains.
#[derive(Debug, Clone)]
pub struct ConstantsPool {
    constants: OffsetVec<Constant>,

    utf8s: HashMap<String, Utf8ConstantIndex>,
    classes: HashMap<Utf8ConstantIndex, ClassConstantIndex>,
    name_and_types: HashMap<(Utf8ConstantIndex, Utf8ConstantIndex), NameAndTypeConstantIndex>,
    methodrefs: HashMap<(ClassConstantIndex, NameAndTypeConstantIndex, bool), MethodRefConstantIndex>,
}

/// Class, name, and descriptor behind a `Fieldref`/`Methodref`/`InterfaceMethodref`
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct MemberRef<'a> {
    pub class: &'a str,
    pub name: &'a str,
    pub descriptor: &'a str,
}

impl ConstantsPool {
    /// Make a fresh empty constants pool
    pub fn new() -> ConstantsPool {
        ConstantsPool {
            constants: OffsetVec::new_starting_at(Offset(1)),
            utf8s: HashMap::new(),
            classes: HashMap::new(),
            name_and_types: HashMap::new(),
            methodrefs: HashMap::new(),
        }
    }

    /// Number of constant pool slots, as written in the `constant_pool_count` field
    pub fn count(&self) -> u16 {
        self.constants.offset_len().0 as u16
    }

    /// Number of constants (wide constants count once)
    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstantIndex, &Constant)> + '_ {
        self.constants
            .iter()
            .map(|(offset, constant)| (ConstantIndex(offset.0 as u16), constant))
    }

    /// Push a constant into the constant pool, provided there is space for it
    ///
    /// Note: the largest valid index is 65534, indexing starts at 1, and some constants take two
    /// spaces.
    pub fn push_constant(&mut self, constant: Constant) -> Result<ConstantIndex, Error> {
        let offset = self.constants.offset_len().0;
        if offset + constant.width() > u16::MAX as usize {
            return Err(Error::ConstantPoolOverflow(offset));
        }
        let index = ConstantIndex(offset as u16);

        // First occurrence wins, so reused entries always point at the earliest equivalent
        match &constant {
            Constant::Utf8(string) => {
                self.utf8s
                    .entry(string.clone())
                    .or_insert(Utf8ConstantIndex(index));
            }
            Constant::Class(name) => {
                self.classes
                    .entry(*name)
                    .or_insert(ClassConstantIndex(index));
            }
            Constant::NameAndType { name, descriptor } => {
                self.name_and_types
                    .entry((*name, *descriptor))
                    .or_insert(NameAndTypeConstantIndex(index));
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                self.methodrefs
                    .entry((*class, *name_and_type, *is_interface))
                    .or_insert(MethodRefConstantIndex(index));
            }
            _ => (),
        }

        self.constants.push(constant);
        Ok(index)
    }

    /// Get or insert a utf8 constant from the constant pool
    pub fn get_utf8(&mut self, utf8: &str) -> Result<Utf8ConstantIndex, Error> {
        if let Some(idx) = self.utf8s.get(utf8) {
            Ok(*idx)
        } else {
            let constant = Constant::Utf8(utf8.to_owned());
            Ok(Utf8ConstantIndex(self.push_constant(constant)?))
        }
    }

    /// Get or insert a class constant from the constant pool
    pub fn get_class(&mut self, class_name: &str) -> Result<ClassConstantIndex, Error> {
        let name = self.get_utf8(class_name)?;
        if let Some(idx) = self.classes.get(&name) {
            Ok(*idx)
        } else {
            Ok(ClassConstantIndex(self.push_constant(Constant::Class(name))?))
        }
    }

    /// Get or insert a name & type constant from the constant pool
    pub fn get_name_and_type(
        &mut self,
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    ) -> Result<NameAndTypeConstantIndex, Error> {
        if let Some(idx) = self.name_and_types.get(&(name, descriptor)) {
            Ok(*idx)
        } else {
            let constant = Constant::NameAndType { name, descriptor };
            Ok(NameAndTypeConstantIndex(self.push_constant(constant)?))
        }
    }

    /// Get or insert a `CONSTANT_Methodref_info` or `CONSTANT_InterfaceMethodref_info`
    pub fn get_method_ref(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
        is_interface: bool,
    ) -> Result<MethodRefConstantIndex, Error> {
        let class = self.get_class(class_name)?;
        let name = self.get_utf8(method_name)?;
        let descriptor = self.get_utf8(descriptor)?;
        let name_and_type = self.get_name_and_type(name, descriptor)?;
        if let Some(idx) = self.methodrefs.get(&(class, name_and_type, is_interface)) {
            Ok(*idx)
        } else {
            let constant = Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            };
            Ok(MethodRefConstantIndex(self.push_constant(constant)?))
        }
    }

    /// Look up any constant
    pub fn get(&self, index: impl Into<ConstantIndex>) -> Result<&Constant, MalformedKind> {
        let index = index.into();
        self.constants
            .get_offset(Offset(index.0 as usize))
            .ok_or(MalformedKind::BadConstantIndex(index))
    }

    /// Look up the string behind a `CONSTANT_Utf8_info`
    pub fn utf8(&self, index: impl Into<ConstantIndex>) -> Result<&str, MalformedKind> {
        let index = index.into();
        match self.get(index)? {
            Constant::Utf8(string) => Ok(string),
            _ => Err(mismatch(index, "Utf8")),
        }
    }

    /// Look up the (internal) name behind a `CONSTANT_Class_info`
    pub fn class_name(&self, index: impl Into<ConstantIndex>) -> Result<&str, MalformedKind> {
        let index = index.into();
        match self.get(index)? {
            Constant::Class(name) => self.utf8(*name),
            _ => Err(mismatch(index, "Class")),
        }
    }

    /// Look up the name and descriptor behind a `CONSTANT_NameAndType_info`
    pub fn name_and_type(
        &self,
        index: impl Into<ConstantIndex>,
    ) -> Result<(&str, &str), MalformedKind> {
        let index = index.into();
        match self.get(index)? {
            Constant::NameAndType { name, descriptor } => {
                Ok((self.utf8(*name)?, self.utf8(*descriptor)?))
            }
            _ => Err(mismatch(index, "NameAndType")),
        }
    }

    /// Look up a field or method reference
    pub fn member_ref(&self, index: impl Into<ConstantIndex>) -> Result<MemberRef<'_>, MalformedKind> {
        let index = index.into();
        let (class, name_and_type) = match self.get(index)? {
            Constant::FieldRef(class, name_and_type) => (*class, *name_and_type),
            Constant::MethodRef {
                class,
                name_and_type,
                ..
            } => (*class, *name_and_type),
            _ => return Err(mismatch(index, "Fieldref or Methodref")),
        };
        let (name, descriptor) = self.name_and_type(name_and_type)?;
        Ok(MemberRef {
            class: self.class_name(class)?,
            name,
            descriptor,
        })
    }

    /// Look up the name and descriptor of a dynamic call site
    pub fn invoke_dynamic(
        &self,
        index: impl Into<ConstantIndex>,
    ) -> Result<(&str, &str), MalformedKind> {
        let index = index.into();
        match self.get(index)? {
            Constant::InvokeDynamic {
                method_descriptor, ..
            } => self.name_and_type(*method_descriptor),
            _ => Err(mismatch(index, "InvokeDynamic")),
        }
    }

    /// Number of stack slots pushed when the constant is loaded with `ldc`/`ldc_w`/`ldc2_w`
    pub fn loadable_width(&self, index: impl Into<ConstantIndex>) -> Result<usize, MalformedKind> {
        let index = index.into();
        match self.get(index)? {
            Constant::Long(_) | Constant::Double(_) => Ok(2),
            Constant::Integer(_)
            | Constant::Float(_)
            | Constant::String(_)
            | Constant::Class(_)
            | Constant::MethodHandle { .. }
            | Constant::MethodType { .. } => Ok(1),
            Constant::Dynamic { name_and_type, .. } => {
                let (_, descriptor) = self.name_and_type(*name_and_type)?;
                Ok(if descriptor == "J" || descriptor == "D" {
                    2
                } else {
                    1
                })
            }
            _ => Err(mismatch(index, "loadable constant")),
        }
    }

    /// Add an attribute to the constant pool
    pub fn get_attribute<A: AttributeLike>(&mut self, attribute: &A) -> Result<Attribute, Error> {
        let name_index = self.get_utf8(A::NAME)?;
        let mut info = vec![];

        attribute.serialize(&mut info).map_err(Error::IoError)?;

        Ok(Attribute { name_index, info })
    }

    /// Check that every index inside the pool points at a constant of the right kind
    fn validate(&self) -> Result<(), MalformedKind> {
        for (_, constant) in self.iter() {
            match constant {
                Constant::String(text) => match self.get(*text)? {
                    Constant::Utf8(_) | Constant::OpaqueUtf8(_) => (),
                    _ => return Err(mismatch((*text).into(), "Utf8")),
                },
                Constant::Class(name)
                | Constant::Module(name)
                | Constant::Package(name)
                | Constant::MethodType { descriptor: name } => {
                    self.utf8(*name)?;
                }
                Constant::FieldRef(class, name_and_type)
                | Constant::MethodRef {
                    class,
                    name_and_type,
                    ..
                } => {
                    self.class_name(*class)?;
                    self.name_and_type(*name_and_type)?;
                }
                Constant::NameAndType { name, descriptor } => {
                    self.utf8(*name)?;
                    self.utf8(*descriptor)?;
                }
                Constant::MethodHandle { member, .. } => {
                    self.member_ref(*member)?;
                }
                Constant::Dynamic { name_and_type, .. } => {
                    self.name_and_type(*name_and_type)?;
                }
                Constant::InvokeDynamic {
                    method_descriptor, ..
                } => {
                    self.name_and_type(*method_descriptor)?;
                }
                Constant::Integer(_)
                | Constant::Float(_)
                | Constant::Long(_)
                | Constant::Double(_)
                | Constant::Utf8(_)
                | Constant::OpaqueUtf8(_) => (),
            }
        }
        Ok(())
    }
}

impl Default for ConstantsPool {
    fn default() -> Self {
        ConstantsPool::new()
    }
}

fn mismatch(index: ConstantIndex, expected: &'static str) -> MalformedKind {
    MalformedKind::ConstantTypeMismatch { index, expected }
}

/// `constant_pool_count` followed by the constants
impl Serialize for ConstantsPool {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.count().serialize(writer)?;
        for constant in self.constants.values() {
            constant.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for ConstantsPool {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let count = reader.read_u16()? as usize;
        let mut pool = ConstantsPool::new();
        while pool.constants.offset_len().0 < count {
            let constant = Constant::deserialize(reader)?;
            if pool.constants.offset_len().0 + constant.width() > count {
                let index = ConstantIndex(pool.constants.offset_len().0 as u16);
                return Err(reader.error(MalformedKind::BadConstantIndex(index)));
            }
            pool.push_constant(constant)?;
        }
        reader.locate(pool.validate())?;
        Ok(pool)
    }
}

/// Constants as in the constant pool
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-4.html#jvms-4.4
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// Class or an interface
    Class(Utf8ConstantIndex),

    /// Field
    FieldRef(ClassConstantIndex, NameAndTypeConstantIndex),

    /// Method (this combines `Methodref` and `InterfaceMethodref`
    MethodRef {
        class: ClassConstantIndex,
        name_and_type: NameAndTypeConstantIndex,
        is_interface: bool,
    },

    /// Constant object of type `java.lang.String`
    String(Utf8ConstantIndex),

    /// Constant primitive of type `int`
    Integer(i32),

    /// Constant primitive of type `float`
    Float(f32),

    /// Constant primitive of type `long`
    Long(i64),

    /// Constant primitive of type `double`
    Double(f64),

    /// Name and a type (eg. for a field or a method)
    NameAndType {
        name: Utf8ConstantIndex,
        descriptor: Utf8ConstantIndex,
    },

    /// Constant UTF-8 encoded raw string value
    ///
    /// Despite the name, the encoding is not quite UTF-8 (the encoding of the
    /// null character `\u{0000}` and the encoding of supplementary characters
    /// is different).
    Utf8(String),

    /// `CONSTANT_Utf8_info` whose UTF-16 text has unpaired surrogates (eg. `"\uD800"` in Java
    /// source), so it can't be a `String`. Kept as the original bytes.
    OpaqueUtf8(Vec<u8>),

    /// Constant object of type `java.lang.invoke.MethodHandle`
    MethodHandle {
        handle_kind: HandleKind,

        /// Depending on the method kind, this points to different things:
        ///
        ///   - `FieldRef` for `GetField`, `GetStatic`, `PutField`, `PutStatic`
        ///   - `MethodRef` for the rest
        member: ConstantIndex,
    },

    /// Method type
    MethodType { descriptor: Utf8ConstantIndex },

    /// Dynamically-computed constant
    Dynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        name_and_type: NameAndTypeConstantIndex,
    },

    /// Dynamically-computed call site
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute
        bootstrap_method: u16,
        method_descriptor: NameAndTypeConstantIndex,
    },

    /// Module (only in `module-info` classes)
    Module(Utf8ConstantIndex),

    /// Package exported or opened by a module
    Package(Utf8ConstantIndex),
}

impl Serialize for Constant {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Constant::Utf8(string) => {
                1u8.serialize(writer)?;
                let buffer: Vec<u8> = encode_modified_utf8(string);
                (buffer.len() as u16).serialize(writer)?;
                writer.write_all(&buffer)?;
            }
            Constant::OpaqueUtf8(bytes) => {
                1u8.serialize(writer)?;
                (bytes.len() as u16).serialize(writer)?;
                writer.write_all(bytes)?;
            }
            Constant::Integer(integer) => {
                3u8.serialize(writer)?;
                integer.serialize(writer)?;
            }
            Constant::Float(float) => {
                4u8.serialize(writer)?;
                float.serialize(writer)?;
            }
            Constant::Long(long) => {
                5u8.serialize(writer)?;
                long.serialize(writer)?;
            }
            Constant::Double(double) => {
                6u8.serialize(writer)?;
                double.serialize(writer)?;
            }
            Constant::Class(name) => {
                7u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::String(bytes) => {
                8u8.serialize(writer)?;
                bytes.serialize(writer)?;
            }
            Constant::FieldRef(class, name_and_type) => {
                9u8.serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::MethodRef {
                class,
                name_and_type,
                is_interface,
            } => {
                (if !is_interface { 10u8 } else { 11u8 }).serialize(writer)?;
                class.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::NameAndType { name, descriptor } => {
                12u8.serialize(writer)?;
                name.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::MethodHandle {
                handle_kind,
                member,
            } => {
                15u8.serialize(writer)?;
                handle_kind.serialize(writer)?;
                member.serialize(writer)?;
            }
            Constant::MethodType { descriptor } => {
                16u8.serialize(writer)?;
                descriptor.serialize(writer)?;
            }
            Constant::Dynamic {
                bootstrap_method,
                name_and_type,
            } => {
                17u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                name_and_type.serialize(writer)?;
            }
            Constant::InvokeDynamic {
                bootstrap_method,
                method_descriptor,
            } => {
                18u8.serialize(writer)?;
                bootstrap_method.serialize(writer)?;
                method_descriptor.serialize(writer)?;
            }
            Constant::Module(name) => {
                19u8.serialize(writer)?;
                name.serialize(writer)?;
            }
            Constant::Package(name) => {
                20u8.serialize(writer)?;
                name.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl Deserialize for Constant {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let tag_position = reader.position();
        let tag = reader.read_u8()?;
        let constant = match tag {
            1 => {
                let len = reader.read_u16()? as usize;
                let bytes = reader.read_bytes(len)?;
                let units = decode_modified_utf8_units(bytes)
                    .map_err(|kind| Error::malformed(tag_position, kind))?;
                match String::from_utf16(&units) {
                    Ok(string) => Constant::Utf8(string),
                    Err(_) => Constant::OpaqueUtf8(bytes.to_vec()),
                }
            }
            3 => Constant::Integer(reader.read_i32()?),
            4 => Constant::Float(reader.read_f32()?),
            5 => Constant::Long(reader.read_i64()?),
            6 => Constant::Double(reader.read_f64()?),
            7 => Constant::Class(Utf8ConstantIndex::deserialize(reader)?),
            8 => Constant::String(Utf8ConstantIndex::deserialize(reader)?),
            9 => Constant::FieldRef(
                ClassConstantIndex::deserialize(reader)?,
                NameAndTypeConstantIndex::deserialize(reader)?,
            ),
            10 | 11 => Constant::MethodRef {
                class: ClassConstantIndex::deserialize(reader)?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
                is_interface: tag == 11,
            },
            12 => Constant::NameAndType {
                name: Utf8ConstantIndex::deserialize(reader)?,
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            15 => Constant::MethodHandle {
                handle_kind: HandleKind::deserialize(reader)?,
                member: ConstantIndex::deserialize(reader)?,
            },
            16 => Constant::MethodType {
                descriptor: Utf8ConstantIndex::deserialize(reader)?,
            },
            17 => Constant::Dynamic {
                bootstrap_method: reader.read_u16()?,
                name_and_type: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            18 => Constant::InvokeDynamic {
                bootstrap_method: reader.read_u16()?,
                method_descriptor: NameAndTypeConstantIndex::deserialize(reader)?,
            },
            19 => Constant::Module(Utf8ConstantIndex::deserialize(reader)?),
            20 => Constant::Package(Utf8ConstantIndex::deserialize(reader)?),
            other => {
                return Err(Error::malformed(
                    tag_position,
                    MalformedKind::UnknownConstantTag(other),
                ))
            }
        };
        Ok(constant)
    }
}

/// Modified UTF-8 format used in class files.
///
/// See [this `DataInput` section for details][0]. Quoting from that section:
///
/// > The differences between this format and the standard UTF-8 format are the following:
/// >
/// >  * The null byte `\u0000` is encoded in 2-byte format rather than 1-byte, so that the encoded
/// >    strings never have embedded nulls.
/// >  * Only the 1-byte, 2-byte, and 3-byte formats are used.
/// >  * Supplementary characters are represented in the form of surrogate pairs.
///
/// [0]: https://docs.oracle.com/en/java/javase/17/docs/api/java.base/java/io/DataInput.html#modified-utf-8
pub fn encode_modified_utf8(string: &str) -> Vec<u8> {
    let mut buffer: Vec<u8> = vec![];
    for c in string.chars() {
        // Handle the exception for how `\u{0000}` is represented
        let len: usize = if c == '\u{0000}' { 2 } else { c.len_utf8() };
        let code: u32 = c as u32;

        match len {
            1 => buffer.push(code as u8),
            2 => {
                buffer.push((code >> 6 & 0x1F) as u8 | 0b1100_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
            3 => {
                buffer.push((code >> 12 & 0x0F) as u8 | 0b1110_0000);
                buffer.push((code >> 6 & 0x3F) as u8 | 0b1000_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }

            // Supplementary characters: main divergence from unicode
            _ => {
                buffer.push(0b1110_1101);
                buffer.push(((code >> 16 & 0x0F) as u8).wrapping_sub(1) & 0x0F | 0b1010_0000);
                buffer.push((code >> 10 & 0x3F) as u8 | 0b1000_0000);

                buffer.push(0b1110_1101);
                buffer.push(((code >> 6 & 0x0F) as u8) | 0b1011_0000);
                buffer.push((code & 0x3F) as u8 | 0b1000_0000);
            }
        }
    }
    buffer
}

/// Inverse of [`encode_modified_utf8`]
///
/// Only the canonical encoding of each character is accepted (no overlong forms other than the
/// 2-byte null, no unpaired surrogates), so decoding then re-encoding reproduces the input.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, MalformedKind> {
    let units = decode_modified_utf8_units(bytes)?;
    String::from_utf16(&units).map_err(|_| MalformedKind::InvalidModifiedUtf8)
}

/// Decode modified UTF-8 into UTF-16 code units, without pairing up surrogates
///
/// Every unit is one 1-, 2-, or 3-byte group and must use its shortest form (except for the
/// 2-byte null). Java strings may hold unpaired surrogates, so those are not rejected here.
pub fn decode_modified_utf8_units(bytes: &[u8]) -> Result<Vec<u16>, MalformedKind> {
    let invalid = MalformedKind::InvalidModifiedUtf8;
    let continuation = |idx: usize| -> Result<u16, MalformedKind> {
        match bytes.get(idx) {
            Some(b) if b & 0b1100_0000 == 0b1000_0000 => Ok((b & 0x3F) as u16),
            _ => Err(MalformedKind::InvalidModifiedUtf8),
        }
    };

    let mut units = Vec::with_capacity(bytes.len());
    let mut idx = 0;
    while idx < bytes.len() {
        let b = bytes[idx];
        let unit = if b != 0 && b < 0x80 {
            idx += 1;
            b as u16
        } else if b & 0b1110_0000 == 0b1100_0000 {
            let unit = (b as u16 & 0x1F) << 6 | continuation(idx + 1)?;
            if unit != 0 && unit < 0x80 {
                return Err(invalid);
            }
            idx += 2;
            unit
        } else if b & 0b1111_0000 == 0b1110_0000 {
            let unit =
                (b as u16 & 0x0F) << 12 | continuation(idx + 1)? << 6 | continuation(idx + 2)?;
            if unit < 0x800 {
                return Err(invalid);
            }
            idx += 3;
            unit
        } else {
            return Err(invalid);
        };
        units.push(unit);
    }
    Ok(units)
}

#[cfg(test)]
mod modified_utf8_tests {
    use super::*;

    #[test]
    fn containing_null_byte() {
        assert_eq!(encode_modified_utf8("a\x00a"), vec![97, 192, 128, 97]);
        assert_eq!(decode_modified_utf8(&[97, 192, 128, 97]).unwrap(), "a\x00a");
    }

    #[test]
    fn simple_ascii() {
        assert_eq!(encode_modified_utf8("foo"), vec![102, 111, 111]);
        assert_eq!(decode_modified_utf8(b"hel10_World").unwrap(), "hel10_World");
    }

    #[test]
    fn two_and_three_byte_encodings() {
        let text = "ĄǍǞǠǺȀȂȦȺӐӒऄअॲঅਅઅଅஅఅಅഅะະ༁ཨ";
        assert_eq!(encode_modified_utf8(text), text.as_bytes());
        assert_eq!(decode_modified_utf8(text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn supplementary_characters() {
        let encoded = vec![
            237, 160, 128, 237, 176, 128, 237, 172, 191, 237, 191, 191, 237, 175, 191, 237, 191,
            191,
        ];
        assert_eq!(
            encode_modified_utf8("\u{10000}\u{dffff}\u{10FFFF}"),
            encoded
        );
        assert_eq!(
            decode_modified_utf8(&encoded).unwrap(),
            "\u{10000}\u{dffff}\u{10FFFF}"
        );
    }

    #[test]
    fn unpaired_surrogates_are_units_only() {
        let lone_high = [0x61, 0xED, 0xA0, 0x80];
        assert_eq!(
            decode_modified_utf8_units(&lone_high).unwrap(),
            vec![0x61, 0xD800]
        );
        assert_eq!(
            decode_modified_utf8(&lone_high),
            Err(MalformedKind::InvalidModifiedUtf8)
        );
    }

    #[test]
    fn rejected_encodings() {
        // raw null, overlong 'a', four-byte form, lone low surrogate, truncated sequence
        for bytes in [
            &[0u8][..],
            &[0xC1, 0xA1],
            &[0xF0, 0x90, 0x80, 0x80],
            &[0xED, 0xB0, 0x80],
            &[0xE0, 0xA4],
        ] {
            assert_eq!(
                decode_modified_utf8(bytes),
                Err(MalformedKind::InvalidModifiedUtf8)
            );
        }
    }
}

/// Almost all constants have width 1, except for `Constant::Long` and `Constant::Double`. Quoting
/// the JVM specification:
///
/// > All 8-byte constants take up two entries in the constant_pool table of the class file. If a
/// > CONSTANT_Long_info or CONSTANT_Double_info structure is the item in the constant_pool table
/// > at index n, then the next usable item in the pool is located at index n+2. The constant_pool
/// > index n+1 must be valid but is considered unusable.
impl Width for Constant {
    fn width(&self) -> usize {
        match self {
            Constant::Long(_) | Constant::Double(_) => 2,
            _ => 1,
        }
    }
}

#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Debug)]
pub struct ConstantIndex(pub u16);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct Utf8ConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct NameAndTypeConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct ClassConstantIndex(pub ConstantIndex);

#[derive(Copy, Clone, Hash, Eq, PartialEq, Debug)]
pub struct MethodRefConstantIndex(pub ConstantIndex);

impl From<Utf8ConstantIndex> for ConstantIndex {
    fn from(idx: Utf8ConstantIndex) -> ConstantIndex {
        idx.0
    }
}
impl From<NameAndTypeConstantIndex> for ConstantIndex {
    fn from(idx: NameAndTypeConstantIndex) -> ConstantIndex {
        idx.0
    }
}
impl From<ClassConstantIndex> for ConstantIndex {
    fn from(idx: ClassConstantIndex) -> ConstantIndex {
        idx.0
    }
}
impl From<MethodRefConstantIndex> for ConstantIndex {
    fn from(idx: MethodRefConstantIndex) -> ConstantIndex {
        idx.0
    }
}

impl Serialize for ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
impl Serialize for Utf8ConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
impl Serialize for NameAndTypeConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
impl Serialize for ClassConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}
impl Serialize for MethodRefConstantIndex {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.0.serialize(writer)
    }
}

impl Deserialize for ConstantIndex {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(ConstantIndex(reader.read_u16()?))
    }
}
impl Deserialize for Utf8ConstantIndex {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(Utf8ConstantIndex(ConstantIndex::deserialize(reader)?))
    }
}
impl Deserialize for NameAndTypeConstantIndex {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(NameAndTypeConstantIndex(ConstantIndex::deserialize(reader)?))
    }
}
impl Deserialize for ClassConstantIndex {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        Ok(ClassConstantIndex(ConstantIndex::deserialize(reader)?))
    }
}

/// Type of method handle
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se15/html/jvms-5.html#jvms-5.4.3.5-220
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq)]
pub enum HandleKind {
    GetField,
    GetStatic,
    PutField,
    PutStatic,
    InvokeVirtual,
    InvokeStatic,
    InvokeSpecial,
    NewInvokeSpecial,
    InvokeInterface,
}

impl Serialize for HandleKind {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        let byte: u8 = match self {
            HandleKind::GetField => 1,
            HandleKind::GetStatic => 2,
            HandleKind::PutField => 3,
            HandleKind::PutStatic => 4,
            HandleKind::InvokeVirtual => 5,
            HandleKind::InvokeStatic => 6,
            HandleKind::InvokeSpecial => 7,
            HandleKind::NewInvokeSpecial => 8,
            HandleKind::InvokeInterface => 9,
        };
        byte.serialize(writer)
    }
}

impl Deserialize for HandleKind {
    fn deserialize(reader: &mut Reader<'_>) -> Result<Self, Error> {
        let kind = match reader.read_u8()? {
            1 => HandleKind::GetField,
            2 => HandleKind::GetStatic,
            3 => HandleKind::PutField,
            4 => HandleKind::PutStatic,
            5 => HandleKind::InvokeVirtual,
            6 => HandleKind::InvokeStatic,
            7 => HandleKind::InvokeSpecial,
            8 => HandleKind::NewInvokeSpecial,
            9 => HandleKind::InvokeInterface,
            other => return Err(reader.error(MalformedKind::UnknownConstantTag(other))),
        };
        Ok(kind)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn sample_pool() -> ConstantsPool {
        let mut pool = ConstantsPool::new();
        pool.get_method_ref("java/lang/Object", "<init>", "()V", false)
            .unwrap();
        pool.push_constant(Constant::Long(42)).unwrap();
        pool.get_utf8("Code").unwrap();
        pool
    }

    #[test]
    fn lookups_are_deduplicated() {
        let mut pool = sample_pool();
        let len = pool.len();
        let first = pool
            .get_method_ref("java/lang/Object", "<init>", "()V", false)
            .unwrap();
        assert_eq!(pool.len(), len);
        assert_eq!(pool.get_class("java/lang/Object").unwrap().0, ConstantIndex(2));

        let interface = pool
            .get_method_ref("java/lang/Object", "<init>", "()V", true)
            .unwrap();
        assert_ne!(first, interface);
        assert_eq!(pool.len(), len + 1);
    }

    #[test]
    fn wide_constants_take_two_slots() {
        let pool = sample_pool();
        let long_index = pool
            .iter()
            .find(|(_, c)| matches!(c, Constant::Long(_)))
            .map(|(idx, _)| idx)
            .unwrap();
        assert_eq!(
            pool.get(ConstantIndex(long_index.0 + 1)),
            Err(MalformedKind::BadConstantIndex(ConstantIndex(long_index.0 + 1)))
        );
        assert_eq!(pool.utf8(ConstantIndex(long_index.0 + 2)), Ok("Code"));
        assert_eq!(pool.loadable_width(long_index), Ok(2));
    }

    #[test]
    fn member_refs_resolve() {
        let pool = sample_pool();
        let (idx, _) = pool
            .iter()
            .find(|(_, c)| matches!(c, Constant::MethodRef { .. }))
            .unwrap();
        assert_eq!(
            pool.member_ref(idx),
            Ok(MemberRef {
                class: "java/lang/Object",
                name: "<init>",
                descriptor: "()V",
            })
        );
    }

    #[test]
    fn pool_round_trips() {
        let pool = sample_pool();
        let mut bytes = vec![];
        pool.serialize(&mut bytes).unwrap();
        let decoded = ConstantsPool::deserialize(&mut Reader::new(&bytes)).unwrap();
        assert_eq!(decoded.count(), pool.count());
        let mut rewritten = vec![];
        decoded.serialize(&mut rewritten).unwrap();
        assert_eq!(bytes, rewritten);
    }

    #[test]
    fn dangling_reference_is_malformed() {
        // count = 2, one `Class` pointing at slot 5
        let bytes = [0, 2, 7, 0, 5];
        let err = ConstantsPool::deserialize(&mut Reader::new(&bytes)).unwrap_err();
        assert!(err.is_malformed_input());
    }
}
