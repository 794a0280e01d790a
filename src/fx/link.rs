//! Annotation-driven linking of effect parameters to registry resources.
//!
//! Linking runs once per parameter after an effect is constructed. It never
//! fails: every problem is logged and the parameter is left unlinked, so a
//! malformed annotation cannot keep the rest of the effect from loading.

use std::sync::Arc;

use crate::backend::{
    AnnotationValue, Extent3d, NativeEffect, NativeHandle, ParameterKind, TextureDescriptor,
    TextureFormat, TextureKind, TextureUsage,
};

use super::resource::Resource;
use super::{Binding, Parameter, Texture};

/// Name of the registry texture bound to a texture parameter.
pub const TEXTURE_ANNOTATION: &str = "texture";
/// File to load the texture from when it is not registered yet.
pub const FILE_ANNOTATION: &str = "file";
/// Global parameter this parameter receives values from.
pub const SOURCE_ANNOTATION: &str = "source";
/// One, two or three components: cube edge, 2D size or volume size.
pub const SIZE_ANNOTATION: &str = "size";
pub const FORMAT_ANNOTATION: &str = "format";
pub const MIPMAPS_ANNOTATION: &str = "mipmaps";
pub const RENDER_TARGET_ANNOTATION: &str = "rendertarget";

pub(crate) struct Linker<'a> {
    pub binding: &'a Arc<Binding>,
    pub native: &'a dyn NativeEffect,
    pub effect_name: &'a str,
}

impl Linker<'_> {
    pub fn link(&self, parameter: &Arc<Parameter>) {
        let Some(handle) = parameter.native_handle() else {
            return;
        };

        if parameter.value_kind() == ParameterKind::Texture {
            self.link_texture(parameter, handle);
        }

        if let Some(source) = self.string_annotation(handle, SOURCE_ANNOTATION) {
            self.link_source(parameter, &source);
        }
    }

    fn link_texture(&self, parameter: &Arc<Parameter>, handle: NativeHandle) {
        let Some(texture_name) = self.string_annotation(handle, TEXTURE_ANNOTATION) else {
            return;
        };

        let registry = self.binding.registry();
        let texture = match registry.get_texture(&texture_name) {
            Some(texture) => Some(texture),
            None => match self.string_annotation(handle, FILE_ANNOTATION) {
                Some(file) => match registry.load_texture(self.binding, &texture_name, &file) {
                    Ok(texture) => Some(texture),
                    Err(err) => {
                        log::warn!(
                            "Effect '{}': failed to load texture '{}' from '{}': {}",
                            self.effect_name,
                            texture_name,
                            file,
                            err
                        );
                        None
                    }
                },
                None => self.link_new_texture(parameter, handle, &texture_name),
            },
        };

        let Some(texture) = texture else {
            log::warn!(
                "Effect '{}': texture '{}' for parameter '{}' could not be resolved; left unbound",
                self.effect_name,
                texture_name,
                parameter.name()
            );
            return;
        };

        if let Err(err) = parameter.set_texture(Some(texture)) {
            log::warn!(
                "Effect '{}': binding texture '{}' to '{}' failed: {}",
                self.effect_name,
                texture_name,
                parameter.name(),
                err
            );
        }
    }

    /// Synthesize a texture from the parameter's creation annotations.
    fn link_new_texture(
        &self,
        parameter: &Parameter,
        handle: NativeHandle,
        texture_name: &str,
    ) -> Option<Arc<Texture>> {
        let format = match self.string_annotation(handle, FORMAT_ANNOTATION) {
            Some(name) => match TextureFormat::from_name(&name) {
                Some(format) => format,
                None => {
                    log::warn!(
                        "Effect '{}': unknown format '{}' on '{}'",
                        self.effect_name,
                        name,
                        parameter.name()
                    );
                    return None;
                }
            },
            None => {
                log::warn!(
                    "Effect '{}': parameter '{}' names missing texture '{}' but has no format",
                    self.effect_name,
                    parameter.name(),
                    texture_name
                );
                return None;
            }
        };

        let size = self
            .native
            .annotation(handle, SIZE_ANNOTATION)
            .and_then(|value| value.as_vector());
        let (kind, extent) = match size.as_deref() {
            None => {
                let config = self.binding.config();
                let (width, height) = self
                    .binding
                    .backbuffer_size()
                    .unwrap_or(config.fallback_texture_size);
                (TextureKind::D2, Extent3d::new_2d(width, height))
            }
            Some(components) => {
                if components.iter().any(|&c| c < 1.0) {
                    log::warn!(
                        "Effect '{}': invalid size {:?} on '{}'",
                        self.effect_name,
                        components,
                        parameter.name()
                    );
                    return None;
                }
                match *components {
                    [edge] => (TextureKind::Cube, Extent3d::new_2d(edge as u32, edge as u32)),
                    [w, h] => (TextureKind::D2, Extent3d::new_2d(w as u32, h as u32)),
                    [w, h, d] => (
                        TextureKind::Volume,
                        Extent3d::new_3d(w as u32, h as u32, d as u32),
                    ),
                    _ => {
                        log::warn!(
                            "Effect '{}': size of '{}' needs 1 to 3 components, got {}",
                            self.effect_name,
                            parameter.name(),
                            components.len()
                        );
                        return None;
                    }
                }
            }
        };

        let mipmaps = self.bool_annotation(handle, MIPMAPS_ANNOTATION).unwrap_or(false);
        let render_target = self
            .bool_annotation(handle, RENDER_TARGET_ANNOTATION)
            .unwrap_or(true);

        let mut usage = TextureUsage::TEXTURE_BINDING;
        if render_target {
            usage |= TextureUsage::RENDER_ATTACHMENT;
        } else {
            usage |= TextureUsage::COPY_DST;
        }
        if mipmaps {
            usage |= TextureUsage::AUTOGEN_MIPMAPS;
        }

        let descriptor = TextureDescriptor {
            label: Some(texture_name.to_string()),
            kind,
            size: extent,
            mip_levels: if mipmaps { extent.full_mip_levels() } else { 1 },
            format,
            usage,
        };

        match self
            .binding
            .registry()
            .create_texture(self.binding, texture_name, &descriptor)
        {
            Ok(texture) => {
                log::debug!(
                    "Effect '{}': synthesized texture '{}' for '{}'",
                    self.effect_name,
                    texture_name,
                    parameter.name()
                );
                Some(texture)
            }
            Err(err) => {
                log::warn!(
                    "Effect '{}': creating texture '{}' failed: {}",
                    self.effect_name,
                    texture_name,
                    err
                );
                None
            }
        }
    }

    /// Attach `parameter` to the named global, creating the global when needed.
    fn link_source(&self, parameter: &Arc<Parameter>, source: &str) {
        let registry = self.binding.registry();

        let global = match registry.get_parameter(source, parameter.desc()) {
            Some(global) => {
                if let Err(err) = parameter.set(global.value()) {
                    log::warn!(
                        "Effect '{}': seeding '{}' from '{}' failed: {}",
                        self.effect_name,
                        parameter.name(),
                        source,
                        err
                    );
                }
                global
            }
            None if registry.contains_parameter(source) => {
                log::warn!(
                    "Effect '{}': global '{}' does not match the type of '{}'",
                    self.effect_name,
                    source,
                    parameter.name()
                );
                return;
            }
            None => {
                let Some(global) =
                    registry.create_parameter(self.binding, source, parameter.desc())
                else {
                    return;
                };
                if let Err(err) = global.set(parameter.value()) {
                    log::warn!(
                        "Effect '{}': seeding global '{}' failed: {}",
                        self.effect_name,
                        source,
                        err
                    );
                }
                global
            }
        };

        match global.attach(parameter) {
            Ok(()) => parameter.set_link_source(&global),
            Err(err) => log::warn!(
                "Effect '{}': linking '{}' to '{}' failed: {}",
                self.effect_name,
                parameter.name(),
                source,
                err
            ),
        }
    }

    fn string_annotation(&self, handle: NativeHandle, name: &str) -> Option<String> {
        match self.native.annotation(handle, name)? {
            AnnotationValue::String(value) => Some(value),
            other => {
                log::warn!(
                    "Effect '{}': annotation '{}' should be a string, found {:?}",
                    self.effect_name,
                    name,
                    other
                );
                None
            }
        }
    }

    fn bool_annotation(&self, handle: NativeHandle, name: &str) -> Option<bool> {
        self.native
            .annotation(handle, name)
            .and_then(|value| value.as_bool())
    }
}
