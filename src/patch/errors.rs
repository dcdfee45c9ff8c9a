use crate::jvm;

#[derive(Debug)]
pub enum Error {
    /// The class handed to the transformer could not be parsed
    MalformedInput(jvm::Error),

    /// A line of a mappings file could not be understood
    MalformedMappings { line: usize, message: String },

    /// A rule refers to names or descriptors that make no sense
    InvalidRule(String),

    IoError(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::MalformedInput(err) => write!(f, "{}", err),
            Error::MalformedMappings { line, message } => {
                write!(f, "mappings line {}: {}", line, message)
            }
            Error::InvalidRule(message) => write!(f, "invalid rule: {}", message),
            Error::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

impl From<jvm::Error> for Error {
    fn from(err: jvm::Error) -> Error {
        Error::MalformedInput(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}
