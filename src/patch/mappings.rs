use super::Error;
use crate::jvm::{BinaryName, FieldType, MethodDescriptor};
use std::collections::HashMap;

/// Two-way lookup between the stable and the alternate (obfuscated) spelling of names
///
/// Classes are keyed by their binary name (`net/minecraft/entity/Entity`). Methods are keyed by
/// stable owner, name, and descriptor, since overloads may be renamed differently. Anything without an entry is spelled the same way in both schemes.
#[derive(Debug, Clone, Default)]
pub struct Mappings {
    alternate_classes: HashMap<String, BinaryName>,
    stable_classes: HashMap<String, BinaryName>,
    alternate_methods: HashMap<(String, String, String), String>,
}

impl Mappings {
    /// Empty mappings (every name is the same in both schemes)
    pub fn new() -> Mappings {
        Mappings::default()
    }

    /// Record that a class is called `alternate` in the obfuscated scheme
    pub fn add_class(&mut self, stable: &str, alternate: &str) -> Result<(), String> {
        let stable = BinaryName::new(stable.to_owned())?;
        let alternate = BinaryName::new(alternate.to_owned())?;
        self.stable_classes
            .insert(alternate.as_str().to_owned(), stable.clone());
        self.alternate_classes
            .insert(stable.as_str().to_owned(), alternate);
        Ok(())
    }

    /// Record that a method is called `alternate` in the obfuscated scheme
    ///
    /// The owner and descriptor are given in the stable scheme.
    pub fn add_method(
        &mut self,
        owner: &str,
        stable: &str,
        descriptor: &str,
        alternate: &str,
    ) -> Result<(), String> {
        MethodDescriptor::parse(descriptor)
            .map_err(|err| format!("bad method descriptor '{}': {}", descriptor, err))?;
        self.alternate_methods.insert(
            (owner.to_owned(), stable.to_owned(), descriptor.to_owned()),
            alternate.to_owned(),
        );
        Ok(())
    }

    /// Obfuscated spelling of a class
    pub fn alternate_class<'a>(&'a self, stable: &'a str) -> &'a str {
        self.alternate_classes
            .get(stable)
            .map_or(stable, |name| name.as_str())
    }

    /// Stable spelling of a class
    pub fn stable_class<'a>(&'a self, alternate: &'a str) -> &'a str {
        self.stable_classes
            .get(alternate)
            .map_or(alternate, |name| name.as_str())
    }

    /// Obfuscated spelling of a method (owner and descriptor in the stable scheme)
    pub fn alternate_method<'a>(&'a self, owner: &str, name: &'a str, descriptor: &str) -> &'a str {
        let key = (owner.to_owned(), name.to_owned(), descriptor.to_owned());
        self.alternate_methods.get(&key).map_or(name, String::as_str)
    }

    /// Rewrite every class mentioned in a method or field descriptor into the obfuscated scheme
    pub fn alternate_descriptor(&self, descriptor: &str) -> Result<String, String> {
        let mut rename = |class: &BinaryName| -> BinaryName {
            self.alternate_classes
                .get(class.as_str())
                .cloned()
                .unwrap_or_else(|| class.clone())
        };
        if descriptor.starts_with('(') {
            let parsed = MethodDescriptor::parse(descriptor)
                .map_err(|err| format!("bad method descriptor '{}': {}", descriptor, err))?;
            Ok(parsed.rename_classes(rename).to_string())
        } else {
            let parsed = FieldType::parse(descriptor)
                .map_err(|err| format!("bad field descriptor '{}': {}", descriptor, err))?;
            Ok(parsed.rename_classes(&mut rename).to_string())
        }
    }

    /// Read mappings in the SRG format
    ///
    /// Only `CL:` (class) and `MD:` (method) lines matter. Both list the obfuscated spelling
    /// first, and `MD:` lines carry descriptors in both schemes:
    ///
    /// ```text
    /// CL: bxp net/minecraft/client/renderer/chunk/RenderChunk
    /// MD: bxf/a (Lbxp;)V net/minecraft/client/renderer/ChunkRenderContainer/preRenderChunk (Lnet/minecraft/client/renderer/chunk/RenderChunk;)V
    /// ```
    ///
    /// Package (`PK:`) and field (`FD:`) lines are accepted and ignored, as are blank lines and
    /// `#` comments.
    pub fn parse_srg(source: &str) -> Result<Mappings, Error> {
        let mut mappings = Mappings::new();

        for (line_idx, line) in source.lines().enumerate() {
            let line_no = line_idx + 1;
            let malformed = |message: String| Error::MalformedMappings {
                line: line_no,
                message,
            };
            let line = line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }

            let mut words = line.split_whitespace();
            let tag = words.next().unwrap_or("");
            let words: Vec<&str> = words.collect();
            match (tag, words.as_slice()) {
                ("CL:", [alternate, stable]) => {
                    mappings.add_class(stable, alternate).map_err(malformed)?;
                }
                ("MD:", [_, _, stable, stable_descriptor]) => {
                    let (owner, name) = split_member(stable)
                        .ok_or_else(|| malformed(format!("bad method name '{}'", stable)))?;
                    let (_, alternate) = split_member(words[0])
                        .ok_or_else(|| malformed(format!("bad method name '{}'", words[0])))?;
                    mappings
                        .add_method(owner, name, stable_descriptor, alternate)
                        .map_err(malformed)?;
                }
                ("PK:", _) | ("FD:", _) => (),
                ("CL:", _) | ("MD:", _) => {
                    return Err(malformed(format!("wrong number of fields for {}", tag)));
                }
                _ => return Err(malformed(format!("unknown line type '{}'", tag))),
            }
        }

        Ok(mappings)
    }
}

/// Split `owner/name` at the last `/`
fn split_member(qualified: &str) -> Option<(&str, &str)> {
    qualified
        .rsplit_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
}

#[cfg(test)]
mod test {
    use super::*;

    const SAMPLE: &str = "\
PK: . net/minecraft/src
# comment
CL: ve net/minecraft/entity/Entity
CL: bwa$b net/minecraft/client/renderer/block/model/ItemCameraTransforms$TransformType

FD: ve/a net/minecraft/entity/Entity/field_70170_p
MD: bzf/a (Lve;DDDFFZ)V net/minecraft/client/renderer/entity/RenderManager/doRenderEntity (Lnet/minecraft/entity/Entity;DDDFFZ)V
";

    #[test]
    fn parse_srg_lines() {
        let mappings = Mappings::parse_srg(SAMPLE).unwrap();
        assert_eq!(mappings.alternate_class("net/minecraft/entity/Entity"), "ve");
        assert_eq!(mappings.stable_class("ve"), "net/minecraft/entity/Entity");
        assert_eq!(mappings.stable_class("java/lang/String"), "java/lang/String");
        assert_eq!(
            mappings.alternate_method(
                "net/minecraft/client/renderer/entity/RenderManager",
                "doRenderEntity",
                "(Lnet/minecraft/entity/Entity;DDDFFZ)V"
            ),
            "a"
        );
        // overloads are distinguished by descriptor
        assert_eq!(
            mappings.alternate_method(
                "net/minecraft/client/renderer/entity/RenderManager",
                "doRenderEntity",
                "()V"
            ),
            "doRenderEntity"
        );
    }

    #[test]
    fn descriptors_in_both_schemes() {
        let mappings = Mappings::parse_srg(SAMPLE).unwrap();
        assert_eq!(
            mappings
                .alternate_descriptor("(Lnet/minecraft/entity/Entity;[Lnet/minecraft/entity/Entity;J)V")
                .unwrap(),
            "(Lve;[Lve;J)V"
        );
        assert_eq!(
            mappings
                .alternate_descriptor(
                    "Lnet/minecraft/client/renderer/block/model/ItemCameraTransforms$TransformType;"
                )
                .unwrap(),
            "Lbwa$b;"
        );
        assert!(mappings.alternate_descriptor("(Q)V").is_err());
    }

    #[test]
    fn bad_entries_are_rejected() {
        let mut mappings = Mappings::new();
        assert!(mappings.add_class("a//b", "x").is_err());
        assert!(mappings.add_class("a/B", "").is_err());
        assert!(mappings.add_method("a/B", "run", "(Q)V", "a").is_err());
        assert!(mappings.add_method("a/B", "run", "I", "a").is_err());
        assert_eq!(mappings.alternate_method("a/B", "run", "(Q)V"), "run");
    }

    #[test]
    fn methods_may_come_before_their_classes() {
        let source = "\
MD: bzf/a (Lve;)V a/Render/draw (Lnet/minecraft/entity/Entity;)V
CL: ve net/minecraft/entity/Entity
";
        let mappings = Mappings::parse_srg(source).unwrap();
        assert_eq!(
            mappings.alternate_method("a/Render", "draw", "(Lnet/minecraft/entity/Entity;)V"),
            "a"
        );
    }

    #[test]
    fn bad_lines_are_located() {
        match Mappings::parse_srg("CL: a\nCL: b c\n") {
            Err(Error::MalformedMappings { line, .. }) => assert_eq!(line, 1),
            other => panic!("expected malformed mappings, got {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            Mappings::parse_srg("CL: b c\nXX: whatever\n"),
            Err(Error::MalformedMappings { line: 2, .. })
        ));
    }
}
