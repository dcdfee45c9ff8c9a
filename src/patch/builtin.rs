//! Rules compiled into the patcher

use super::{
    Error, HookSymbol, InsertionStrategy, Mappings, PatchRule, Rendering, Settings, SlotStrategy,
    TargetIdentity,
};

const RENDER_UTIL: &str = "elucent/albedo/util/RenderUtil";
const RENDER_CHUNK: &str = "Lnet/minecraft/client/renderer/chunk/RenderChunk;";
const ENTITY: &str = "Lnet/minecraft/entity/Entity;";
const TILE_ENTITY: &str = "Lnet/minecraft/tileentity/TileEntity;";
const ITEM_STACK: &str = "Lnet/minecraft/item/ItemStack;";
const BAKED_MODEL: &str = "Lnet/minecraft/client/renderer/block/model/IBakedModel;";
const TRANSFORM_TYPE: &str =
    "Lnet/minecraft/client/renderer/block/model/ItemCameraTransforms$TransformType;";

impl Mappings {
    /// Obfuscated names of everything the built-in rules mention
    pub fn builtin() -> Result<Mappings, Error> {
        let classes = [
            ("net/minecraft/client/renderer/chunk/RenderChunk", "bxp"),
            ("net/minecraft/entity/Entity", "ve"),
            ("net/minecraft/tileentity/TileEntity", "avh"),
            ("net/minecraft/item/ItemStack", "ain"),
            ("net/minecraft/client/renderer/block/model/IBakedModel", "cfw"),
            (
                "net/minecraft/client/renderer/block/model/ItemCameraTransforms$TransformType",
                "bwa$b",
            ),
        ];
        let methods = [
            (
                "net/minecraft/client/renderer/ChunkRenderContainer",
                "preRenderChunk",
                format!("({})V", RENDER_CHUNK),
                "a",
            ),
            (
                "net/minecraft/client/renderer/entity/RenderManager",
                "doRenderEntity",
                format!("({}DDDFFZ)V", ENTITY),
                "a",
            ),
            (
                "net/minecraft/client/renderer/tileentity/TileEntityRendererDispatcher",
                "render",
                format!("({}FI)V", TILE_ENTITY),
                "a",
            ),
            (
                "net/minecraft/client/renderer/GlStateManager",
                "enableLighting",
                "()V".to_owned(),
                "f",
            ),
            (
                "net/minecraft/client/renderer/GlStateManager",
                "disableLighting",
                "()V".to_owned(),
                "g",
            ),
            (
                "net/minecraft/profiler/Profiler",
                "endStartSection",
                "(Ljava/lang/String;)V".to_owned(),
                "c",
            ),
            (
                "net/minecraft/client/renderer/RenderItem",
                "renderItem",
                format!("({}{})V", ITEM_STACK, BAKED_MODEL),
                "a",
            ),
        ];

        let mut mappings = Mappings::new();
        for (stable, alternate) in classes {
            mappings
                .add_class(stable, alternate)
                .map_err(Error::InvalidRule)?;
        }
        for (owner, stable, descriptor, alternate) in &methods {
            mappings
                .add_method(owner, stable, descriptor, alternate)
                .map_err(Error::InvalidRule)?;
        }
        Ok(mappings)
    }
}

/// The built-in rules, in the order they are tried
pub fn builtin_rules(settings: &Settings) -> Result<Vec<PatchRule>, Error> {
    let mappings = &settings.mappings;
    let entry = |require_return: bool| InsertionStrategy::FixedIndex {
        index: settings.entry_index,
        require_return,
    };
    let lookup = |descriptor: &str, fallback: u16| -> Result<SlotStrategy, Error> {
        Ok(SlotStrategy::Lookup {
            descriptor: Rendering {
                stable: descriptor.to_owned(),
                alternate: mappings
                    .alternate_descriptor(descriptor)
                    .map_err(Error::InvalidRule)?,
            },
            fallback: Some(fallback),
        })
    };
    let target = |type_name: &str, method: &str, descriptor: &str| {
        TargetIdentity::new(mappings, type_name, method, descriptor)
    };
    let hook = |owner: &str, name: &str, descriptor: &str| {
        HookSymbol::new(mappings, owner, name, descriptor)
    };

    Ok(vec![
        PatchRule::new(
            target(
                "net.minecraft.client.renderer.ChunkRenderContainer",
                "preRenderChunk",
                &format!("({})V", RENDER_CHUNK),
            )?,
            lookup(RENDER_CHUNK, 1)?,
            InsertionStrategy::BeforeFirstReturn,
            hook(RENDER_UTIL, "renderChunkUniforms", &format!("({})V", RENDER_CHUNK))?,
        )?,
        PatchRule::new(
            target(
                "net.minecraft.client.renderer.entity.RenderManager",
                "doRenderEntity",
                &format!("({}DDDFFZ)V", ENTITY),
            )?,
            SlotStrategy::Fixed(1),
            entry(true),
            hook(
                "elucent/albedo/event/RenderEntityEvent",
                "postNewEvent",
                &format!("({})V", ENTITY),
            )?,
        )?,
        PatchRule::new(
            target(
                "net.minecraft.client.renderer.tileentity.TileEntityRendererDispatcher",
                "render",
                &format!("({}FI)V", TILE_ENTITY),
            )?,
            SlotStrategy::Fixed(1),
            entry(true),
            hook(
                "elucent/albedo/event/RenderTileEntityEvent",
                "postNewEvent",
                &format!("({})V", TILE_ENTITY),
            )?,
        )?,
        PatchRule::new(
            target(
                "net.minecraft.client.renderer.GlStateManager",
                "enableLighting",
                "()V",
            )?,
            SlotStrategy::NoArgument,
            entry(false),
            hook(RENDER_UTIL, "enableLightingUniforms", "()V")?,
        )?,
        PatchRule::new(
            target(
                "net.minecraft.client.renderer.GlStateManager",
                "disableLighting",
                "()V",
            )?,
            SlotStrategy::NoArgument,
            entry(false),
            hook(RENDER_UTIL, "disableLightingUniforms", "()V")?,
        )?,
        PatchRule::new(
            target(
                "net.minecraft.profiler.Profiler",
                "endStartSection",
                "(Ljava/lang/String;)V",
            )?,
            SlotStrategy::Fixed(1),
            entry(false),
            hook(
                "elucent/albedo/event/ProfilerStartEvent",
                "postNewEvent",
                "(Ljava/lang/String;)V",
            )?,
        )?,
        PatchRule::new(
            target(
                "net.minecraft.client.renderer.RenderItem",
                "renderItem",
                &format!("({}{})V", ITEM_STACK, BAKED_MODEL),
            )?,
            lookup(ITEM_STACK, 1)?,
            InsertionStrategy::BeforeFirstReturn,
            hook(RENDER_UTIL, "renderItem", &format!("({})V", ITEM_STACK))?,
        )?,
        PatchRule::new(
            target(
                "net.minecraftforge.client.ForgeHooksClient",
                "handleCameraTransforms",
                &format!("({}{}Z){}", BAKED_MODEL, TRANSFORM_TYPE, BAKED_MODEL),
            )?,
            lookup(TRANSFORM_TYPE, 1)?,
            entry(false),
            hook(RENDER_UTIL, "setTransform", &format!("({})V", TRANSFORM_TYPE))?,
        )?,
    ])
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn builtin_mappings_load() {
        let mappings = Mappings::builtin().unwrap();
        assert_eq!(mappings.alternate_class("net/minecraft/entity/Entity"), "ve");
        assert_eq!(
            mappings.alternate_method(
                "net/minecraft/client/renderer/GlStateManager",
                "disableLighting",
                "()V"
            ),
            "g"
        );
    }

    #[test]
    fn all_builtin_rules_are_valid() {
        let rules = builtin_rules(&Settings::new().unwrap()).unwrap();
        assert_eq!(rules.len(), 8);
    }

    #[test]
    fn obfuscated_spellings() {
        let rules = builtin_rules(&Settings::new().unwrap()).unwrap();
        let chunk = &rules[0];
        assert_eq!(chunk.identity.resolve(true), ("a", "(Lbxp;)V"));
        assert_eq!(chunk.hook.descriptor.select(true), "(Lbxp;)V");

        let camera = &rules[7];
        assert_eq!(
            camera.identity.resolve(true),
            ("handleCameraTransforms", "(Lcfw;Lbwa$b;Z)Lcfw;")
        );

        let lighting = &rules[4];
        assert_eq!(lighting.identity.resolve(true), ("g", "()V"));
    }

    #[test]
    fn entry_index_comes_from_settings() {
        let settings = Settings {
            entry_index: 3,
            ..Settings::new().unwrap()
        };
        let rules = builtin_rules(&settings).unwrap();
        assert_eq!(
            rules[5].insertion,
            InsertionStrategy::FixedIndex {
                index: 3,
                require_return: false
            }
        );
    }
}
