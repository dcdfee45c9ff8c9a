use super::{Deserialize, Error, Reader, Serialize};
use byteorder::WriteBytesExt;
use std::io::Result;

/// Version of the class file, which is used to verify that the JVM has the
/// necessary features to interpret the class
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Version {
    pub minor_version: u16,
    pub major_version: u16,
}

impl Version {
    /// JVM class file version corresponding to Java SE 6 (first to carry `StackMapTable`)
    pub const JAVA6: Version = Version {
        minor_version: 0,
        major_version: 50,
    };

    /// JVM class file version corresponding to Java SE 8 (released March 2014)
    pub const JAVA8: Version = Version {
        minor_version: 0,
        major_version: 52,
    };

    /// Are methods of this class checked with the type-checking verifier?
    ///
    /// Older classes fall back to type inference and have no use for stack map frames.
    pub fn uses_stack_map_frames(&self) -> bool {
        *self >= Version::JAVA6
    }
}

impl Serialize for Version {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> Result<()> {
        self.minor_version.serialize(writer)?;
        self.major_version.serialize(writer)?;
        Ok(())
    }
}

impl Deserialize for Version {
    fn deserialize(reader: &mut Reader<'_>) -> std::result::Result<Self, Error> {
        let minor_version = reader.read_u16()?;
        let major_version = reader.read_u16()?;
        Ok(Version {
            minor_version,
            major_version,
        })
    }
}
