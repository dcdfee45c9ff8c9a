use super::ConstantIndex;

#[derive(Debug)]
pub enum Error {
    /// The input is not a well-formed class file
    Malformed {
        /// Byte offset into the buffer being read (class file or attribute body)
        offset: usize,
        kind: MalformedKind,
    },
    IoError(std::io::Error),

    /// The constant pool is full (indices are 16-bit)
    ConstantPoolOverflow(usize),
    MethodCodeMaxStackOverflow(usize),
    MethodCodeMaxLocalsOverflow(usize),
    MethodCodeOverflow(usize),

    /// A conditional jump does not fit in a signed 16-bit offset after re-layout
    JumpOutOfRange {
        instruction: usize,
        distance: isize,
    },
}

#[derive(Debug, PartialEq, Eq)]
pub enum MalformedKind {
    UnexpectedEof,
    BadMagic(u32),
    UnknownConstantTag(u8),
    BadConstantIndex(ConstantIndex),
    ConstantTypeMismatch {
        index: ConstantIndex,
        expected: &'static str,
    },
    InvalidModifiedUtf8,
    UnknownOpcode(u8),
    BadWideOpcode(u8),
    BadArrayType(u8),
    BadSwitch,
    BadJumpTarget(isize),
    BadCodeOffset(usize),
    UnknownFrameType(u8),
    UnknownVerificationType(u8),
    BadFrame(String),
    StackUnderflow(usize),
    BadDescriptor(String),
    TrailingBytes(usize),
    BadAttributeLength {
        name: String,
        declared: usize,
    },
}

impl Error {
    pub fn malformed(offset: usize, kind: MalformedKind) -> Error {
        Error::Malformed { offset, kind }
    }

    /// Was this caused by the input (as opposed to a failure to write the output)?
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Error::Malformed { .. })
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Malformed { offset, kind } => {
                write!(f, "malformed class file at byte {}: {:?}", offset, kind)
            }
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::ConstantPoolOverflow(len) => {
                write!(f, "constant pool overflow ({} entries)", len)
            }
            Error::MethodCodeMaxStackOverflow(depth) => {
                write!(f, "maximum stack depth {} does not fit in 16 bits", depth)
            }
            Error::MethodCodeMaxLocalsOverflow(locals) => {
                write!(f, "maximum locals {} does not fit in 16 bits", locals)
            }
            Error::MethodCodeOverflow(len) => write!(f, "method code is too long ({} bytes)", len),
            Error::JumpOutOfRange {
                instruction,
                distance,
            } => write!(
                f,
                "jump at instruction {} spans {} bytes, which does not fit in 16 bits",
                instruction, distance
            ),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
