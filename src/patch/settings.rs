use super::{Error, Mappings};

pub struct Settings {
    /// Names in the stable and obfuscated schemes
    pub mappings: Mappings,

    /// Instruction index that "fixed index" rules put their hook call in front of
    ///
    /// The default of `0` is the very first instruction of the method.
    pub entry_index: usize,
}

impl Settings {
    /// Compiled-in defaults
    pub fn new() -> Result<Settings, Error> {
        Ok(Settings {
            mappings: Mappings::builtin()?,
            entry_index: 0,
        })
    }

    /// Replace the compiled-in mappings (eg. with ones read from an SRG file)
    pub fn with_mappings(mut self, mappings: Mappings) -> Settings {
        self.mappings = mappings;
        self
    }
}
