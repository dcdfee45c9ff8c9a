use std::fmt::{Display, Error as FmtError, Formatter};

/// Name every instance initializer has
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Root of the class hierarchy, whose constructor has no superclass constructor to call
pub const OBJECT_CLASS: &str = "java/lang/Object";

/// Class or interface name in internal form (`java/lang/Object`)
///
/// Every `/`-separated segment must be a valid unqualified name: non-empty and free of `.`, `;`,
/// `[`, and `/`. See <https://docs.oracle.com/javase/specs/jvms/se16/html/jvms-4.html#jvms-4.2.1>
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct BinaryName(String);

impl BinaryName {
    pub fn new(name: String) -> Result<BinaryName, String> {
        if name.is_empty() {
            return Err("Binary name is empty".to_owned());
        }
        for segment in name.split('/') {
            if segment.is_empty() {
                return Err(format!("Binary name '{}' has an empty segment", name));
            }
            if segment.contains(&['.', ';', '['][..]) {
                return Err(format!("Binary name '{}' contains an illegal character", name));
            }
        }
        Ok(BinaryName(name))
    }

    /// Accept a source-level (dotted) class name as well as the internal form
    pub fn from_dotted(name: &str) -> Result<BinaryName, String> {
        BinaryName::new(name.replace('.', "/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for BinaryName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for BinaryName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dotted_names_become_internal() {
        let name = BinaryName::from_dotted("net.minecraft.profiler.Profiler").unwrap();
        assert_eq!(name.as_str(), "net/minecraft/profiler/Profiler");
        assert_eq!(BinaryName::from_dotted("a/b/C").unwrap().as_str(), "a/b/C");
    }

    #[test]
    fn rejects_bad_names() {
        assert!(BinaryName::new(String::new()).is_err());
        assert!(BinaryName::new("a//b".to_owned()).is_err());
        assert!(BinaryName::new("a/b;".to_owned()).is_err());
        assert!(BinaryName::new("[La;".to_owned()).is_err());
        assert!(BinaryName::from_dotted("a..b").is_err());
    }
}
