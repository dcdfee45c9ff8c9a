use crate::jvm::class_file::ClassFile;
use crate::jvm::code::MethodBody;
use crate::jvm::model::CompiledMethod;
use crate::jvm::{ConstantsPool, Error};
use log::debug;

/// Parsed class, ready to have method bodies swapped out
#[derive(Debug, Clone)]
pub struct CompiledType {
    /// Raw class file, kept in sync with every committed edit
    pub class_file: ClassFile,

    /// Binary name of the class (eg. `net/minecraft/profiler/Profiler`)
    pub name: String,

    /// Methods, in the same order as in the class file
    pub methods: Vec<CompiledMethod>,
}

impl CompiledType {
    /// Parse a class file and decode all of its method bodies
    pub fn parse(bytes: &[u8]) -> Result<CompiledType, Error> {
        let class_file = ClassFile::parse(bytes)?;
        let name = class_file
            .class_name()
            .map_err(|kind| Error::malformed(0, kind))?
            .to_owned();
        let methods = class_file
            .methods
            .iter()
            .map(|method| CompiledMethod::decode(method, &class_file.constants, &name))
            .collect::<Result<Vec<_>, Error>>()?;
        debug!(
            "parsed {} (version {}.{}, {} methods, {} constants)",
            name,
            class_file.version.major_version,
            class_file.version.minor_version,
            methods.len(),
            class_file.constants.len()
        );
        Ok(CompiledType {
            class_file,
            name,
            methods,
        })
    }

    pub fn constants(&self) -> &ConstantsPool {
        &self.class_file.constants
    }

    /// Replace the body of a method
    ///
    /// `constants` must be the constant pool of this class, extended with whatever the new body
    /// refers to. The body is encoded right away: if that fails, the class is left exactly as it
    /// was.
    pub fn commit_method(
        &mut self,
        index: usize,
        mut body: MethodBody,
        mut constants: ConstantsPool,
    ) -> Result<(), Error> {
        if body.frames.is_some() && !self.class_file.version.uses_stack_map_frames() {
            debug!("dropping stack map frames from {} (pre-Java 6 class)", self.name);
            body.frames = None;
        }

        let method = &self.methods[index];
        let attribute = method.encode_body(&body, &mut constants, &self.name)?;

        let raw_attributes = &mut self.class_file.methods[index].attributes;
        let code_attribute = match method.code_attribute {
            Some(idx) => {
                raw_attributes[idx] = attribute;
                idx
            }
            None => {
                raw_attributes.push(attribute);
                raw_attributes.len() - 1
            }
        };
        self.class_file.constants = constants;

        let method = &mut self.methods[index];
        method.code_attribute = Some(code_attribute);
        method.body = Some(body);
        method.modified = true;
        Ok(())
    }

    /// Have any methods been edited?
    pub fn is_modified(&self) -> bool {
        self.methods.iter().any(|method| method.modified)
    }

    /// Serialize the class, with every committed edit
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        self.class_file.to_bytes()
    }
}
