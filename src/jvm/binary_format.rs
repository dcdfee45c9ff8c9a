use super::{Error, MalformedKind};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Result;

/// Utility trait for serializing data inside class files
///
/// Java class files have some peculiarities that make it useful to define an extra trait (instead
/// of just using `serde`):
///
///   - tags are always `u8`
///   - when serializing a sequence, the length of the sequence is usually `u16`
///
pub trait Serialize: Sized {
    /// Serialize construct into a binary output stream
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()>;
}

/// Counterpart to [`Serialize`] for reading class files
///
/// Reading never fails with an I/O error: running out of bytes or finding an unexpected value is
/// reported as [`Error::Malformed`], with the offset at which the problem was found.
pub trait Deserialize: Sized {
    fn deserialize(reader: &mut Reader<'_>) -> std::result::Result<Self, Error>;
}

/// Cursor over an in-memory buffer (a whole class file or the body of one attribute)
#[derive(Clone)]
pub struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Reader<'a> {
        Reader { bytes, position: 0 }
    }

    /// Offset of the next byte to be read
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.position
    }

    /// Produce an error located at the current position
    pub fn error(&self, kind: MalformedKind) -> Error {
        Error::malformed(self.position, kind)
    }

    /// Attach the current position to the outcome of a lookup (eg. into the constant pool)
    pub fn locate<T>(
        &self,
        result: std::result::Result<T, MalformedKind>,
    ) -> std::result::Result<T, Error> {
        result.map_err(|kind| self.error(kind))
    }

    /// Read a value using one of the `byteorder` readers
    fn read_with<T>(
        &mut self,
        width: usize,
        read: impl FnOnce(&mut &'a [u8]) -> Result<T>,
    ) -> std::result::Result<T, Error> {
        let mut rest: &'a [u8] = &self.bytes[self.position..];
        match read(&mut rest) {
            Ok(value) => {
                self.position += width;
                Ok(value)
            }
            Err(_) => Err(self.error(MalformedKind::UnexpectedEof)),
        }
    }

    pub fn read_u8(&mut self) -> std::result::Result<u8, Error> {
        self.read_with(1, |r| r.read_u8())
    }

    pub fn read_i8(&mut self) -> std::result::Result<i8, Error> {
        self.read_with(1, |r| r.read_i8())
    }

    pub fn read_u16(&mut self) -> std::result::Result<u16, Error> {
        self.read_with(2, |r| r.read_u16::<BigEndian>())
    }

    pub fn read_i16(&mut self) -> std::result::Result<i16, Error> {
        self.read_with(2, |r| r.read_i16::<BigEndian>())
    }

    pub fn read_u32(&mut self) -> std::result::Result<u32, Error> {
        self.read_with(4, |r| r.read_u32::<BigEndian>())
    }

    pub fn read_i32(&mut self) -> std::result::Result<i32, Error> {
        self.read_with(4, |r| r.read_i32::<BigEndian>())
    }

    pub fn read_i64(&mut self) -> std::result::Result<i64, Error> {
        self.read_with(8, |r| r.read_i64::<BigEndian>())
    }

    pub fn read_f32(&mut self) -> std::result::Result<f32, Error> {
        self.read_with(4, |r| r.read_f32::<BigEndian>())
    }

    pub fn read_f64(&mut self) -> std::result::Result<f64, Error> {
        self.read_with(8, |r| r.read_f64::<BigEndian>())
    }

    /// Borrow the next `len` bytes
    pub fn read_bytes(&mut self, len: usize) -> std::result::Result<&'a [u8], Error> {
        if self.remaining() < len {
            return Err(self.error(MalformedKind::UnexpectedEof));
        }
        let slice = &self.bytes[self.position..self.position + len];
        self.position += len;
        Ok(slice)
    }

    /// Skip forward (used for `tableswitch`/`lookupswitch` padding)
    pub fn skip(&mut self, len: usize) -> std::result::Result<(), Error> {
        self.read_bytes(len).map(|_| ())
    }

    /// Assert that the whole buffer has been consumed
    pub fn expect_end(&self) -> std::result::Result<(), Error> {
        match self.remaining() {
            0 => Ok(()),
            leftover => Err(self.error(MalformedKind::TrailingBytes(leftover))),
        }
    }
}

impl Serialize for u8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(*self)
    }
}

impl Serialize for u16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(*self)
    }
}

impl Serialize for u32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<BigEndian>(*self)
    }
}

impl Serialize for i8 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i8(*self)
    }
}

impl Serialize for i16 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i16::<BigEndian>(*self)
    }
}

impl Serialize for i32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i32::<BigEndian>(*self)
    }
}

impl Serialize for i64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_i64::<BigEndian>(*self)
    }
}

impl Serialize for f32 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f32::<BigEndian>(*self)
    }
}

impl Serialize for f64 {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        writer.write_f64::<BigEndian>(*self)
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Serialize> Serialize for Vec<A> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        (self.len() as u16).serialize(writer)?;
        for elem in self {
            elem.serialize(writer)?;
        }
        Ok(())
    }
}

impl Deserialize for u8 {
    fn deserialize(reader: &mut Reader<'_>) -> std::result::Result<Self, Error> {
        reader.read_u8()
    }
}

impl Deserialize for u16 {
    fn deserialize(reader: &mut Reader<'_>) -> std::result::Result<Self, Error> {
        reader.read_u16()
    }
}

impl Deserialize for u32 {
    fn deserialize(reader: &mut Reader<'_>) -> std::result::Result<Self, Error> {
        reader.read_u32()
    }
}

/// Size in `u16` is the first thing serialized/deserialized
impl<A: Deserialize> Deserialize for Vec<A> {
    fn deserialize(reader: &mut Reader<'_>) -> std::result::Result<Self, Error> {
        let len = reader.read_u16()?;
        let mut elems = Vec::with_capacity(len as usize);
        for _ in 0..len {
            elems.push(A::deserialize(reader)?);
        }
        Ok(elems)
    }
}
