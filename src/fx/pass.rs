//! Pass: one rendering step inside a technique.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::{NativeEffect, NativeHandle, MAX_RENDER_TARGETS};
use crate::error::{FxError, FxResult};

use super::resource::{PropertyBag, PropertyKey, PropertyValue, Resource, ResourceKind};
use super::{Binding, Effect, Technique, Texture};

/// A single draw step with up to [`MAX_RENDER_TARGETS`] output textures.
///
/// Pass targets come from the `target0`..`target3` annotations (the prefix is
/// configurable). Scanning stops at the first missing slot; a name that
/// cannot be resolved leaves its slot empty.
pub struct Pass {
    id: u64,
    index: u32,
    name: String,
    technique: Weak<Technique>,
    handle: NativeHandle,
    vertex_shader: Option<NativeHandle>,
    pixel_shader: Option<NativeHandle>,
    target_names: [Option<String>; MAX_RENDER_TARGETS],
    targets: Mutex<[Option<Arc<Texture>>; MAX_RENDER_TARGETS]>,
    properties: PropertyBag,
}

impl Pass {
    pub(crate) fn new(
        binding: &Binding,
        technique: Weak<Technique>,
        native: &dyn NativeEffect,
        technique_handle: NativeHandle,
        index: u32,
    ) -> FxResult<Self> {
        let handle = native
            .pass(technique_handle, index)
            .ok_or_else(|| FxError::InvalidParams(format!("no native pass at index {index}")))?;
        let desc = native
            .pass_desc(handle)
            .ok_or_else(|| FxError::InvalidParams(format!("pass {index} has no descriptor")))?;

        let mut target_names: [Option<String>; MAX_RENDER_TARGETS] = Default::default();
        for (slot, target_name) in target_names.iter_mut().enumerate() {
            let annotation = binding.config().target_annotation(slot);
            let Some(value) = native.annotation(handle, &annotation) else {
                break;
            };
            match value.as_str() {
                Some(name) => *target_name = Some(name.to_string()),
                None => log::warn!(
                    "Pass '{}': annotation '{}' is not a texture name",
                    desc.name,
                    annotation
                ),
            }
        }

        let pass = Self {
            id: binding.next_id(),
            index,
            name: desc.name,
            technique,
            handle,
            vertex_shader: desc.vertex_shader,
            pixel_shader: desc.pixel_shader,
            target_names,
            targets: Mutex::new(Default::default()),
            properties: PropertyBag::new(),
        };
        pass.resolve_targets(binding);
        Ok(pass)
    }

    /// Look up still-empty target slots in the registry.
    pub(crate) fn resolve_targets(&self, binding: &Binding) {
        let registry = binding.registry();
        let mut targets = self.targets.lock();
        for (slot, name) in self.target_names.iter().enumerate() {
            let Some(name) = name else {
                continue;
            };
            if targets[slot].is_some() {
                continue;
            }
            match registry.get_texture(name) {
                Some(texture) => targets[slot] = Some(texture),
                None => log::debug!(
                    "Pass '{}': target {} '{}' is not registered yet",
                    self.name,
                    slot,
                    name
                ),
            }
        }
    }

    /// Index of this pass within its technique.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn technique(&self) -> Option<Arc<Technique>> {
        self.technique.upgrade()
    }

    pub fn vertex_shader(&self) -> Option<NativeHandle> {
        self.vertex_shader
    }

    pub fn pixel_shader(&self) -> Option<NativeHandle> {
        self.pixel_shader
    }

    /// Texture name read from the target annotation of `index`.
    pub fn target_name(&self, index: usize) -> Option<&str> {
        self.target_names.get(index).and_then(|n| n.as_deref())
    }

    pub fn get_target(&self, index: usize) -> FxResult<Option<Arc<Texture>>> {
        Self::check_slot(index)?;
        Ok(self.targets.lock()[index].clone())
    }

    pub fn set_target(&self, index: usize, texture: Option<Arc<Texture>>) -> FxResult<()> {
        Self::check_slot(index)?;
        self.targets.lock()[index] = texture;
        Ok(())
    }

    /// Enter the pass.
    ///
    /// Fails with [`FxError::InvalidCall`] unless the owning effect is the
    /// binding's active effect and no pass is active. When a target or the
    /// native pass is rejected, the device state from before the call is
    /// restored.
    pub fn bind(&self) -> FxResult<()> {
        let (technique, effect) = self.owners()?;
        let binding = effect.binding();
        let device = binding.device_for(effect.generation())?;

        binding.begin_pass(effect.id(), self.id, || {
            let saved = device.capture_state();
            let targets = self.targets.lock().clone();
            let result = targets
                .iter()
                .enumerate()
                .filter_map(|(slot, target)| target.as_ref().map(|texture| (slot, texture)))
                .try_for_each(|(slot, texture)| {
                    device.set_render_target(slot, texture.native_handle())
                })
                .and_then(|()| effect.native().begin_pass(technique.handle(), self.index));

            if let Err(err) = result {
                log::warn!("Pass '{}': bind failed, restoring device state", self.name);
                device.apply_state(&saved);
                return Err(err.into());
            }
            Ok(())
        })?;

        log::trace!("Pass '{}': bound", self.name);
        Ok(())
    }

    /// Leave the pass. Fails unless this pass is the active one.
    pub fn reset(&self) -> FxResult<()> {
        let (_, effect) = self.owners()?;
        effect
            .binding()
            .end_pass(self.id, || Ok(effect.native().end_pass()?))?;

        log::trace!("Pass '{}': reset", self.name);
        Ok(())
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    fn owners(&self) -> FxResult<(Arc<Technique>, Arc<Effect>)> {
        let technique = self
            .technique
            .upgrade()
            .ok_or_else(|| FxError::InvalidCall(format!("technique of pass '{}' is gone", self.name)))?;
        let effect = technique
            .effect()
            .ok_or_else(|| FxError::InvalidCall(format!("effect of pass '{}' is gone", self.name)))?;
        Ok((technique, effect))
    }

    fn check_slot(index: usize) -> FxResult<()> {
        if index < MAX_RENDER_TARGETS {
            Ok(())
        } else {
            Err(FxError::InvalidParams(format!(
                "render target index {index} out of range 0..{MAX_RENDER_TARGETS}"
            )))
        }
    }
}

impl Resource for Pass {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Pass
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn builtin_property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        match key {
            PropertyKey::Name => Some(PropertyValue::String(self.name.clone())),
            PropertyKey::Count => {
                let bound = self.targets.lock().iter().filter(|t| t.is_some()).count();
                Some(PropertyValue::Int(bound as i64))
            }
            _ => None,
        }
    }
}

impl std::fmt::Debug for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pass")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("targets", &self.target_names)
            .finish()
    }
}

static_assertions::assert_impl_all!(Pass: Send, Sync);
