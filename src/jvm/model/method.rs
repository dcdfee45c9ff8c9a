use crate::jvm::class_file::{self, Attribute, Code};
use crate::jvm::code::{MethodBody, MethodContext};
use crate::jvm::{ConstantsPool, Error, MalformedKind, MethodAccessFlags, MethodDescriptor};

/// Method of a [`super::CompiledType`], with its body decoded
#[derive(Debug, Clone)]
pub struct CompiledMethod {
    pub access_flags: MethodAccessFlags,
    pub name: String,

    /// Descriptor exactly as spelled in the constant pool
    pub descriptor: String,
    pub parsed_descriptor: MethodDescriptor,

    /// Decoded `Code` attribute (`None` for abstract and native methods)
    pub body: Option<MethodBody>,

    /// Has the body been replaced since the class was parsed?
    pub modified: bool,

    /// Position of the `Code` attribute among the method attributes
    pub(super) code_attribute: Option<usize>,
}

impl CompiledMethod {
    /// Decode a method from the class file
    pub fn decode(
        method: &class_file::Method,
        constants: &ConstantsPool,
        class_name: &str,
    ) -> Result<CompiledMethod, Error> {
        let malformed = |kind| Error::malformed(0, kind);
        let name = constants.utf8(method.name_index).map_err(malformed)?;
        let descriptor = constants.utf8(method.descriptor_index).map_err(malformed)?;
        let parsed_descriptor = MethodDescriptor::parse(descriptor)
            .map_err(|_| malformed(MalformedKind::BadDescriptor(descriptor.to_owned())))?;

        let mut code_attribute = None;
        for (idx, attribute) in method.attributes.iter().enumerate() {
            if attribute.name(constants).map_err(malformed)? == "Code" {
                if code_attribute.is_some() {
                    let msg = format!("{} has more than one Code attribute", name);
                    return Err(malformed(MalformedKind::BadFrame(msg)));
                }
                code_attribute = Some(idx);
            }
        }

        let mut compiled = CompiledMethod {
            access_flags: method.access_flags,
            name: name.to_owned(),
            descriptor: descriptor.to_owned(),
            parsed_descriptor,
            body: None,
            modified: false,
            code_attribute,
        };
        if let Some(idx) = code_attribute {
            let code: Code = method.attributes[idx].decode()?;
            let body = MethodBody::decode(&code, constants, &compiled.context(class_name))?;
            compiled.body = Some(body);
        }
        Ok(compiled)
    }

    pub fn is_static(&self) -> bool {
        self.access_flags.contains(MethodAccessFlags::STATIC)
    }

    /// Context needed to decode or encode the body of this method
    pub fn context<'a>(&'a self, class_name: &'a str) -> MethodContext<'a> {
        MethodContext {
            class_name,
            name: &self.name,
            descriptor: &self.parsed_descriptor,
            is_static: self.is_static(),
        }
    }

    /// Encode a body for this method into a `Code` attribute
    pub fn encode_body(
        &self,
        body: &MethodBody,
        constants: &mut ConstantsPool,
        class_name: &str,
    ) -> Result<Attribute, Error> {
        let code = body.encode(constants, &self.context(class_name))?;
        constants.get_attribute(&code)
    }
}
