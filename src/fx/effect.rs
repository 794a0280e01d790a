//! Effect: a compiled shader program with its reflected techniques and parameters.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::backend::{NativeEffect, NativeHandle, NativeValue};
use crate::error::{FxError, FxResult};

use super::link::Linker;
use super::resource::{PropertyBag, PropertyKey, PropertyValue, Resource, ResourceKind, ResourceRef};
use super::{Binding, Parameter, Technique};

/// A compiled effect.
///
/// The effect owns its parameters and techniques; techniques own their passes.
/// Only techniques that validated against the device are exposed, in the order
/// of the source file, and the first of them is the default.
///
/// # Example
///
/// ```ignore
/// let effect = binding.create_effect(source)?;
/// let technique = effect.bind(true)?;
/// for pass in technique.passes() {
///     pass.bind()?;
///     // draw
///     pass.reset()?;
/// }
/// effect.reset()?;
/// ```
pub struct Effect {
    id: u64,
    name: String,
    binding: Arc<Binding>,
    generation: u64,
    native: Box<dyn NativeEffect>,
    parameters: Vec<Arc<Parameter>>,
    techniques: Vec<Arc<Technique>>,
    default_technique: RwLock<Option<Arc<Technique>>>,
    properties: PropertyBag,
}

impl Effect {
    /// Reflect a compiled program, link its parameters and pick the default
    /// technique. Parameters and techniques that fail are logged and skipped.
    pub(crate) fn new(
        binding: &Arc<Binding>,
        generation: u64,
        name: String,
        native: Box<dyn NativeEffect>,
    ) -> FxResult<Arc<Self>> {
        let desc = native.describe();

        let effect = Arc::new_cyclic(|this: &Weak<Effect>| {
            let mut parameters = Vec::with_capacity(desc.parameters as usize);
            for index in 0..desc.parameters {
                match reflect_parameter(this, native.as_ref(), index) {
                    Ok(parameter) => parameters.push(Arc::new(parameter)),
                    Err(err) => log::warn!("Effect '{}': skipping parameter {}: {}", name, index, err),
                }
            }

            let mut techniques = Vec::with_capacity(desc.techniques as usize);
            for index in 0..desc.techniques {
                let Some(handle) = native.technique(index) else {
                    log::warn!("Effect '{}': technique {} has no handle", name, index);
                    continue;
                };
                if !native.validate_technique(handle) {
                    let technique_name = native
                        .technique_desc(handle)
                        .map(|d| d.name)
                        .unwrap_or_default();
                    log::warn!(
                        "Effect '{}': technique '{}' failed validation and is skipped",
                        name,
                        technique_name
                    );
                    continue;
                }
                match Technique::new(binding, this.clone(), native.as_ref(), handle) {
                    Ok(technique) => techniques.push(technique),
                    Err(err) => log::warn!("Effect '{}': skipping technique {}: {}", name, index, err),
                }
            }

            Effect {
                id: binding.next_id(),
                name,
                binding: Arc::clone(binding),
                generation,
                native,
                parameters,
                default_technique: RwLock::new(techniques.first().cloned()),
                techniques,
                properties: PropertyBag::new(),
            }
        });

        if let Some(default) = effect.default_technique() {
            effect.native.set_technique(default.handle())?;
        } else {
            log::warn!("Effect '{}': no technique validated", effect.name);
        }

        let linker = Linker {
            binding,
            native: effect.native.as_ref(),
            effect_name: &effect.name,
        };
        for parameter in &effect.parameters {
            linker.link(parameter);
        }

        // Targets may name textures synthesized while linking.
        for technique in &effect.techniques {
            for pass in technique.passes() {
                pass.resolve_targets(binding);
            }
        }

        log::trace!(
            "Effect '{}': created with {} parameter(s), {} technique(s)",
            effect.name,
            effect.parameters.len(),
            effect.techniques.len()
        );
        Ok(effect)
    }

    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn native(&self) -> &dyn NativeEffect {
        self.native.as_ref()
    }

    /// Whether the binding is still attached to the device this effect was
    /// compiled for.
    pub fn is_valid(&self) -> bool {
        self.binding.device_for(self.generation).is_ok()
    }

    /// Whether this effect is the binding's active effect.
    pub fn is_active(&self) -> bool {
        self.binding.active_effect() == Some(self.id)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameters(&self) -> &[Arc<Parameter>] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&Arc<Parameter>> {
        self.parameters.get(index)
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&Arc<Parameter>> {
        self.parameters.iter().find(|p| p.name() == name)
    }

    /// Number of techniques that validated. Check it before drawing.
    pub fn technique_count(&self) -> usize {
        self.techniques.len()
    }

    pub fn techniques(&self) -> &[Arc<Technique>] {
        &self.techniques
    }

    pub fn technique(&self, index: usize) -> Option<&Arc<Technique>> {
        self.techniques.get(index)
    }

    pub fn technique_by_name(&self, name: &str) -> Option<&Arc<Technique>> {
        self.techniques.iter().find(|t| t.name() == name)
    }

    pub fn default_technique(&self) -> Option<Arc<Technique>> {
        self.default_technique.read().clone()
    }

    /// Make `technique` the default for the next [`Effect::bind`].
    pub fn set_default_technique(&self, technique: &Arc<Technique>) -> FxResult<()> {
        if !self.techniques.iter().any(|t| Arc::ptr_eq(t, technique)) {
            return Err(FxError::InvalidParams(format!(
                "technique '{}' does not belong to effect '{}'",
                technique.name(),
                self.name
            )));
        }
        if self.is_active() {
            return Err(FxError::InvalidCall(format!(
                "effect '{}' is active",
                self.name
            )));
        }

        self.native.set_technique(technique.handle())?;
        *self.default_technique.write() = Some(Arc::clone(technique));
        Ok(())
    }

    /// Find a parameter, technique or pass by name.
    pub fn find_resource(&self, name: &str) -> Option<ResourceRef> {
        if let Some(parameter) = self.parameter_by_name(name) {
            return Some(ResourceRef::Parameter(Arc::clone(parameter)));
        }
        if let Some(technique) = self.technique_by_name(name) {
            return Some(ResourceRef::Technique(Arc::clone(technique)));
        }
        self.techniques
            .iter()
            .find_map(|t| t.pass_by_name(name))
            .map(|pass| ResourceRef::Pass(Arc::clone(pass)))
    }

    /// Activate the effect and return its default technique.
    ///
    /// With `clean` set the current render state is saved and the binding's
    /// baseline state applied first; [`Effect::reset`] restores the saved
    /// state. Fails with [`FxError::InvalidCall`] when another effect is
    /// active or the effect has no technique.
    pub fn bind(&self, clean: bool) -> FxResult<Arc<Technique>> {
        self.binding.device_for(self.generation)?;
        let technique = self.default_technique().ok_or_else(|| {
            FxError::InvalidCall(format!("effect '{}' has no usable technique", self.name))
        })?;

        self.binding.begin_effect(self.id, clean, || {
            let passes = self.native.begin(technique.handle())?;
            log::trace!(
                "Effect '{}': begun '{}' with {} pass(es)",
                self.name,
                technique.name(),
                passes
            );
            Ok(())
        })?;

        Ok(technique)
    }

    /// Deactivate the effect. A pass left active is ended first.
    pub fn reset(&self) -> FxResult<()> {
        self.binding.end_effect(self.id, |dangling_pass| {
            if dangling_pass {
                log::warn!("Effect '{}': reset while a pass is active", self.name);
                self.native.end_pass()?;
            }
            self.native.end()?;
            Ok(())
        })?;

        log::trace!("Effect '{}': reset", self.name);
        Ok(())
    }

    pub(crate) fn write_native(&self, handle: NativeHandle, value: &NativeValue) -> FxResult<()> {
        self.binding.device_for(self.generation)?;
        Ok(self.native.set_value(handle, value)?)
    }

    pub(crate) fn read_native(&self, handle: NativeHandle) -> FxResult<NativeValue> {
        Ok(self.native.get_value(handle)?)
    }
}

fn reflect_parameter(
    effect: &Weak<Effect>,
    native: &dyn NativeEffect,
    index: u32,
) -> FxResult<Parameter> {
    let handle = native
        .parameter(index)
        .ok_or_else(|| FxError::InvalidParams(format!("no native parameter at index {index}")))?;
    let reflected = native
        .parameter_desc(handle)
        .ok_or_else(|| FxError::InvalidParams(format!("parameter {index} has no descriptor")))?;
    let initial = native.get_value(handle)?;

    Ok(Parameter::new_native(
        effect.clone(),
        handle,
        reflected.name,
        reflected.desc,
        initial,
    ))
}

impl Resource for Effect {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Effect
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn builtin_property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        match key {
            PropertyKey::Name => Some(PropertyValue::String(self.name.clone())),
            PropertyKey::Count => Some(PropertyValue::Int(self.techniques.len() as i64)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .field("techniques", &self.techniques)
            .finish()
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        if self.is_active() {
            log::warn!("Effect '{}': dropped while active", self.name);
            if let Err(err) = self.reset() {
                log::error!("Effect '{}': reset on drop failed: {}", self.name, err);
            }
        }

        for parameter in &self.parameters {
            if let Some(source) = parameter.take_link_source() {
                // NotFound when the host detached it already.
                let _ = source.detach(parameter);
            }
        }

        log::trace!("Effect '{}': destroyed", self.name);
    }
}

static_assertions::assert_impl_all!(Effect: Send, Sync);
