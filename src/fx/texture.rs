//! Texture resource.

use std::sync::{Arc, Weak};

use crate::backend::{TextureDescriptor, TextureHandle, TextureKind};

use super::resource::{PropertyBag, PropertyKey, PropertyValue, Resource, ResourceKind};
use super::Binding;

/// A named 2D, cube or volume image.
///
/// Textures are created by a [`Binding`] and hold a weak reference back to it.
/// A texture without native storage is a "null" texture; bound as a pass
/// target it selects the back buffer.
pub struct Texture {
    name: String,
    descriptor: TextureDescriptor,
    native: Option<TextureHandle>,
    source: Option<String>,
    binding: Weak<Binding>,
    generation: u64,
    properties: PropertyBag,
}

impl Texture {
    pub(crate) fn new(
        binding: &Arc<Binding>,
        generation: u64,
        name: String,
        descriptor: TextureDescriptor,
        native: Option<TextureHandle>,
        source: Option<String>,
    ) -> Self {
        Self {
            name,
            descriptor,
            native,
            source,
            binding: Arc::downgrade(binding),
            generation,
            properties: PropertyBag::new(),
        }
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.size.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.size.height
    }

    /// Native storage, `None` for the null texture.
    pub fn native_handle(&self) -> Option<TextureHandle> {
        self.native
    }

    pub fn is_null(&self) -> bool {
        self.native.is_none()
    }

    /// File the texel data was loaded from, if any.
    pub fn source_file(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the creating binding is still attached to the same device.
    pub fn is_valid(&self) -> bool {
        self.binding
            .upgrade()
            .is_some_and(|binding| binding.device_for(self.generation).is_ok())
    }
}

impl Resource for Texture {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Texture
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn builtin_property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        let desc = &self.descriptor;
        let value = match key {
            PropertyKey::Name => PropertyValue::String(self.name.clone()),
            PropertyKey::Type => PropertyValue::from(match desc.kind {
                TextureKind::D2 => "2d",
                TextureKind::Cube => "cube",
                TextureKind::Volume => "volume",
            }),
            PropertyKey::Width => PropertyValue::Int(desc.size.width as i64),
            PropertyKey::Height => PropertyValue::Int(desc.size.height as i64),
            PropertyKey::Depth => PropertyValue::Int(desc.size.depth as i64),
            PropertyKey::Format => PropertyValue::String(format!("{:?}", desc.format)),
            PropertyKey::MipLevels => PropertyValue::Int(desc.mip_levels as i64),
            _ => return None,
        };
        Some(value)
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("name", &self.name)
            .field("kind", &self.descriptor.kind)
            .field("size", &self.descriptor.size)
            .field("format", &self.descriptor.format)
            .field("native", &self.native)
            .finish()
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        let Some(handle) = self.native else {
            return;
        };
        // Textures of a reset binding belong to a device we no longer hold.
        if let Some(device) = self
            .binding
            .upgrade()
            .and_then(|binding| binding.device_for(self.generation).ok())
        {
            log::trace!("Texture: releasing '{}' ({:?})", self.name, handle);
            device.destroy_texture(handle);
        }
    }
}

static_assertions::assert_impl_all!(Texture: Send, Sync);
