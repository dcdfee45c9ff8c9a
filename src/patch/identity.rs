use super::{Error, Mappings};
use crate::jvm::{BinaryName, MethodDescriptor};

/// Literal spelled once per naming scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendering<T> {
    pub stable: T,

    /// Spelling used when the host runs with obfuscated names
    pub alternate: T,
}

impl<T> Rendering<T> {
    pub fn select(&self, obfuscated: bool) -> &T {
        if obfuscated {
            &self.alternate
        } else {
            &self.stable
        }
    }
}

impl<T: Clone> Rendering<T> {
    /// Literal that is spelled identically in both schemes
    pub fn same(value: T) -> Rendering<T> {
        Rendering {
            stable: value.clone(),
            alternate: value,
        }
    }
}

/// Logical method that a rule patches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetIdentity {
    /// Stable binary name of the type declaring the method
    pub type_name: String,
    pub method_name: Rendering<String>,
    pub descriptor: Rendering<String>,
}

impl TargetIdentity {
    /// Identify a method by its stable spelling, deriving the obfuscated one from the mappings
    pub fn new(
        mappings: &Mappings,
        type_name: &str,
        method_name: &str,
        descriptor: &str,
    ) -> Result<TargetIdentity, Error> {
        let type_name = BinaryName::from_dotted(type_name).map_err(Error::InvalidRule)?;
        let type_name = type_name.as_ref().to_owned();
        let alternate_descriptor = mappings
            .alternate_descriptor(descriptor)
            .map_err(Error::InvalidRule)?;
        let alternate_name = mappings.alternate_method(&type_name, method_name, descriptor);
        Ok(TargetIdentity {
            method_name: Rendering {
                stable: method_name.to_owned(),
                alternate: alternate_name.to_owned(),
            },
            descriptor: Rendering {
                stable: descriptor.to_owned(),
                alternate: alternate_descriptor,
            },
            type_name,
        })
    }

    /// Literal name and descriptor to search the method table for
    pub fn resolve(&self, obfuscated: bool) -> (&str, &str) {
        (
            self.method_name.select(obfuscated),
            self.descriptor.select(obfuscated),
        )
    }
}

/// Static method to call from the patched code
///
/// Hooks live outside the patched program, so their owner and name are the same in both schemes.
/// Their descriptor mentions patched types though, so it has both spellings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookSymbol {
    /// Binary name of the class declaring the hook
    pub owner: String,
    pub name: String,
    pub descriptor: Rendering<String>,

    /// Descriptor of the hook, parsed
    pub parsed_descriptor: MethodDescriptor,
}

impl HookSymbol {
    pub fn new(
        mappings: &Mappings,
        owner: &str,
        name: &str,
        descriptor: &str,
    ) -> Result<HookSymbol, Error> {
        let parsed_descriptor = MethodDescriptor::parse(descriptor)
            .map_err(|err| Error::InvalidRule(format!("hook descriptor '{}': {}", descriptor, err)))?;
        if parsed_descriptor.return_type.is_some() {
            let msg = format!("hook {}.{} must return void", owner, name);
            return Err(Error::InvalidRule(msg));
        }
        let owner = BinaryName::from_dotted(owner).map_err(Error::InvalidRule)?;
        Ok(HookSymbol {
            owner: owner.as_ref().to_owned(),
            name: name.to_owned(),
            descriptor: Rendering {
                stable: descriptor.to_owned(),
                alternate: mappings
                    .alternate_descriptor(descriptor)
                    .map_err(Error::InvalidRule)?,
            },
            parsed_descriptor,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn mappings() -> Mappings {
        let mut mappings = Mappings::new();
        mappings
            .add_class("net/minecraft/entity/Entity", "ve")
            .unwrap();
        mappings
            .add_method(
                "net/minecraft/client/renderer/entity/RenderManager",
                "doRenderEntity",
                "(Lnet/minecraft/entity/Entity;DDDFFZ)V",
                "a",
            )
            .unwrap();
        mappings
    }

    #[test]
    fn resolve_both_schemes() {
        let identity = TargetIdentity::new(
            &mappings(),
            "net.minecraft.client.renderer.entity.RenderManager",
            "doRenderEntity",
            "(Lnet/minecraft/entity/Entity;DDDFFZ)V",
        )
        .unwrap();
        assert_eq!(
            identity.type_name,
            "net/minecraft/client/renderer/entity/RenderManager"
        );
        assert_eq!(
            identity.resolve(false),
            ("doRenderEntity", "(Lnet/minecraft/entity/Entity;DDDFFZ)V")
        );
        assert_eq!(identity.resolve(true), ("a", "(Lve;DDDFFZ)V"));
    }

    #[test]
    fn unmapped_names_coincide() {
        let identity = TargetIdentity::new(
            &mappings(),
            "net/minecraftforge/client/ForgeHooksClient",
            "handleCameraTransforms",
            "(Z)V",
        )
        .unwrap();
        assert_eq!(identity.resolve(true), identity.resolve(false));
    }

    #[test]
    fn hooks_must_return_void() {
        let result = HookSymbol::new(&mappings(), "a/Hook", "post", "(Lnet/minecraft/entity/Entity;)I");
        assert!(matches!(result, Err(Error::InvalidRule(_))));

        let hook = HookSymbol::new(&mappings(), "a.Hook", "post", "(Lnet/minecraft/entity/Entity;)V")
            .unwrap();
        assert_eq!(hook.owner, "a/Hook");
        assert_eq!(hook.descriptor.select(true), "(Lve;)V");
    }
}
