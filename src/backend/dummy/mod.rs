//! Dummy effect backend for testing and development.
//!
//! This backend doesn't touch a GPU but provides a complete implementation
//! of the native seam: it compiles a subset of the effect-file language,
//! reflects parameters/techniques/passes with their annotations, tracks
//! texture allocations and keeps a simulated render state that passes mutate.

mod parser;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::traits::*;
use crate::backend::types::*;

use parser::{ParsedEffect, ParsedPass, ParsedTechnique};

/// Highest shader model the dummy device reports by default.
pub const DEFAULT_SHADER_MODEL: i32 = 3;

const TAG_SHIFT: u64 = 48;
const TAG_PARAMETER: u64 = 1;
const TAG_TECHNIQUE: u64 = 2;
const TAG_PASS: u64 = 3;
const TAG_SHADER: u64 = 4;

#[derive(Debug, Clone)]
struct DummyTexture {
    descriptor: TextureDescriptor,
    uploaded_bytes: usize,
}

/// Device state shared between the backend and the effects it compiled.
#[derive(Debug, Default)]
struct DeviceState {
    render_state: Mutex<RenderState>,
    textures: Mutex<HashMap<TextureHandle, DummyTexture>>,
    next_texture: AtomicU64,
}

/// Dummy effect backend.
#[derive(Debug, Clone)]
pub struct DummyBackend {
    device: Arc<DeviceState>,
    shader_model: i32,
    backbuffer: Option<(u32, u32)>,
}

impl DummyBackend {
    /// Create a new dummy backend.
    pub fn new() -> Self {
        Self {
            device: Arc::new(DeviceState::default()),
            shader_model: DEFAULT_SHADER_MODEL,
            backbuffer: Some((1280, 720)),
        }
    }

    /// Highest `shader_model` annotation a technique may carry and still validate.
    pub fn with_shader_model(mut self, shader_model: i32) -> Self {
        self.shader_model = shader_model;
        self
    }

    /// Back buffer size reported to the engine; `None` for an unknown size.
    pub fn with_backbuffer_size(mut self, size: Option<(u32, u32)>) -> Self {
        self.backbuffer = size;
        self
    }

    /// Mutate one named render state, as the host application would.
    pub fn set_render_state(&self, state: &str, value: u32) {
        self.device
            .render_state
            .lock()
            .states
            .insert(state.to_string(), value);
    }

    /// Current value of one named render state.
    pub fn render_state_value(&self, state: &str) -> Option<u32> {
        self.device.render_state.lock().states.get(state).copied()
    }

    /// Number of live textures.
    pub fn texture_count(&self) -> usize {
        self.device.textures.lock().len()
    }

    /// Descriptor of a live texture.
    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<TextureDescriptor> {
        self.device
            .textures
            .lock()
            .get(&texture)
            .map(|t| t.descriptor.clone())
    }

    /// Number of bytes last uploaded into a texture.
    pub fn uploaded_bytes(&self, texture: TextureHandle) -> Option<usize> {
        self.device
            .textures
            .lock()
            .get(&texture)
            .map(|t| t.uploaded_bytes)
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectBackend for DummyBackend {
    fn name(&self) -> &str {
        "Dummy Backend"
    }

    fn compile_effect(
        &self,
        source: &str,
        flags: CompileFlags,
    ) -> BackendResult<Box<dyn NativeEffect>> {
        let parsed = parser::parse_effect(source)
            .map_err(|diagnostics| BackendError::CompilationFailed { diagnostics })?;

        log::trace!(
            "DummyBackend: compiled effect with {} parameter(s), {} technique(s)",
            parsed.parameters.len(),
            parsed.techniques.len()
        );

        Ok(Box::new(DummyEffect::new(
            parsed,
            Arc::clone(&self.device),
            flags,
            self.shader_model,
        )))
    }

    fn create_texture(&self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.size.width == 0 || desc.size.height == 0 || desc.size.depth == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: dimensions cannot be zero",
                desc.label
            )));
        }
        if desc.mip_levels == 0 || desc.mip_levels > desc.size.full_mip_levels() {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: invalid mip level count {}",
                desc.label, desc.mip_levels
            )));
        }
        if desc.kind == TextureKind::Cube && desc.size.width != desc.size.height {
            return Err(BackendError::TextureCreationFailed(format!(
                "{:?}: cube faces must be square",
                desc.label
            )));
        }

        let handle = TextureHandle(self.device.next_texture.fetch_add(1, Ordering::Relaxed) + 1);
        self.device.textures.lock().insert(
            handle,
            DummyTexture {
                descriptor: desc.clone(),
                uploaded_bytes: 0,
            },
        );

        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.size.width,
            desc.size.height,
            desc.size.depth
        );
        Ok(handle)
    }

    fn write_texture(&self, texture: TextureHandle, data: &[u8]) -> BackendResult<()> {
        let mut textures = self.device.textures.lock();
        let entry = textures
            .get_mut(&texture)
            .ok_or_else(|| BackendError::InvalidCall(format!("unknown texture {texture:?}")))?;

        let desc = &entry.descriptor;
        let layers = match desc.kind {
            TextureKind::D2 => 1,
            TextureKind::Cube => 6,
            TextureKind::Volume => desc.size.depth,
        };
        let expected = [desc.size.height, layers, desc.format.bytes_per_pixel()]
            .into_iter()
            .try_fold(desc.size.width as usize, |total, factor| {
                total.checked_mul(factor as usize)
            })
            .ok_or_else(|| {
                BackendError::InvalidCall(format!("texture {texture:?} is too large to upload"))
            })?;
        if data.len() != expected {
            return Err(BackendError::InvalidCall(format!(
                "texture {texture:?} expects {expected} bytes, got {}",
                data.len()
            )));
        }

        log::trace!("DummyBackend: write_texture {:?} len={}", texture, data.len());
        entry.uploaded_bytes = data.len();
        Ok(())
    }

    fn destroy_texture(&self, texture: TextureHandle) {
        log::trace!("DummyBackend: destroying texture {:?}", texture);
        self.device.textures.lock().remove(&texture);
        let mut state = self.device.render_state.lock();
        for target in state.targets.iter_mut() {
            if *target == Some(texture) {
                *target = None;
            }
        }
    }

    fn set_render_target(&self, slot: usize, texture: Option<TextureHandle>) -> BackendResult<()> {
        if slot >= MAX_RENDER_TARGETS {
            return Err(BackendError::InvalidCall(format!(
                "render target slot {slot} out of range"
            )));
        }
        if let Some(handle) = texture {
            let textures = self.device.textures.lock();
            let entry = textures
                .get(&handle)
                .ok_or_else(|| BackendError::InvalidCall(format!("unknown texture {handle:?}")))?;
            if !entry.descriptor.is_render_target() {
                return Err(BackendError::InvalidCall(format!(
                    "texture {:?} is not a render target",
                    entry.descriptor.label
                )));
            }
        }
        self.device.render_state.lock().targets[slot] = texture;
        Ok(())
    }

    fn capture_state(&self) -> RenderState {
        self.device.render_state.lock().clone()
    }

    fn apply_state(&self, state: &RenderState) {
        *self.device.render_state.lock() = state.clone();
    }

    fn backbuffer_size(&self) -> Option<(u32, u32)> {
        self.backbuffer
    }
}

/// What a [`NativeHandle`] issued by a [`DummyEffect`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleTarget {
    Parameter(usize),
    Technique(usize),
    Pass(usize, usize),
}

#[derive(Debug, Default)]
struct ExecutionState {
    values: Vec<NativeValue>,
    current_technique: Option<usize>,
    begun: Option<usize>,
    active_pass: Option<(usize, usize)>,
}

/// Effect compiled by the [`DummyBackend`].
#[derive(Debug)]
pub struct DummyEffect {
    source: ParsedEffect,
    device: Arc<DeviceState>,
    flags: CompileFlags,
    shader_model: i32,
    execution: Mutex<ExecutionState>,
}

impl DummyEffect {
    fn new(
        source: ParsedEffect,
        device: Arc<DeviceState>,
        flags: CompileFlags,
        shader_model: i32,
    ) -> Self {
        let values = source.parameters.iter().map(|p| p.initial.clone()).collect();
        let current_technique = if source.techniques.is_empty() {
            None
        } else {
            Some(0)
        };
        Self {
            source,
            device,
            flags,
            shader_model,
            execution: Mutex::new(ExecutionState {
                values,
                current_technique,
                ..Default::default()
            }),
        }
    }

    fn decode(&self, handle: NativeHandle) -> Option<HandleTarget> {
        let tag = handle.0 >> TAG_SHIFT;
        let payload = handle.0 & ((1 << TAG_SHIFT) - 1);
        let target = match tag {
            TAG_PARAMETER => HandleTarget::Parameter(payload as usize),
            TAG_TECHNIQUE => HandleTarget::Technique(payload as usize),
            TAG_PASS => HandleTarget::Pass((payload >> 16) as usize, (payload & 0xFFFF) as usize),
            _ => return None,
        };
        // Reject handles that point past the reflected data
        let valid = match target {
            HandleTarget::Parameter(i) => i < self.source.parameters.len(),
            HandleTarget::Technique(t) => t < self.source.techniques.len(),
            HandleTarget::Pass(t, p) => self
                .source
                .techniques
                .get(t)
                .is_some_and(|tech| p < tech.passes.len()),
        };
        valid.then_some(target)
    }

    fn technique_index(&self, handle: NativeHandle) -> BackendResult<usize> {
        match self.decode(handle) {
            Some(HandleTarget::Technique(t)) => Ok(t),
            _ => Err(BackendError::InvalidHandle(handle)),
        }
    }

    fn parameter_index(&self, handle: NativeHandle) -> BackendResult<usize> {
        match self.decode(handle) {
            Some(HandleTarget::Parameter(i)) => Ok(i),
            _ => Err(BackendError::InvalidHandle(handle)),
        }
    }

    fn pass_source(&self, technique: usize, pass: usize) -> Option<&ParsedPass> {
        self.source
            .techniques
            .get(technique)
            .and_then(|t| t.passes.get(pass))
    }

    fn technique_source(&self, technique: usize) -> Option<&ParsedTechnique> {
        self.source.techniques.get(technique)
    }
}

fn find_annotation(
    annotations: &[(String, AnnotationValue)],
    name: &str,
) -> Option<AnnotationValue> {
    annotations
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

impl NativeEffect for DummyEffect {
    fn describe(&self) -> EffectDesc {
        EffectDesc {
            parameters: self.source.parameters.len() as u32,
            techniques: self.source.techniques.len() as u32,
        }
    }

    fn parameter(&self, index: u32) -> Option<NativeHandle> {
        ((index as usize) < self.source.parameters.len())
            .then(|| NativeHandle((TAG_PARAMETER << TAG_SHIFT) | index as u64))
    }

    fn parameter_desc(&self, parameter: NativeHandle) -> Option<NativeParameterDesc> {
        let index = self.parameter_index(parameter).ok()?;
        let source = &self.source.parameters[index];
        Some(NativeParameterDesc {
            name: source.name.clone(),
            desc: source.desc,
        })
    }

    fn technique(&self, index: u32) -> Option<NativeHandle> {
        ((index as usize) < self.source.techniques.len())
            .then(|| NativeHandle((TAG_TECHNIQUE << TAG_SHIFT) | index as u64))
    }

    fn technique_desc(&self, technique: NativeHandle) -> Option<TechniqueDesc> {
        let index = self.technique_index(technique).ok()?;
        let source = self.technique_source(index)?;
        Some(TechniqueDesc {
            name: source.name.clone(),
            passes: source.passes.len() as u32,
        })
    }

    fn pass(&self, technique: NativeHandle, index: u32) -> Option<NativeHandle> {
        let t = self.technique_index(technique).ok()?;
        self.pass_source(t, index as usize)?;
        Some(NativeHandle(
            (TAG_PASS << TAG_SHIFT) | ((t as u64) << 16) | index as u64,
        ))
    }

    fn pass_desc(&self, pass: NativeHandle) -> Option<PassDesc> {
        let Some(HandleTarget::Pass(t, p)) = self.decode(pass) else {
            return None;
        };
        let source = self.pass_source(t, p)?;
        let shader = |stage: u64| {
            NativeHandle((TAG_SHADER << TAG_SHIFT) | ((t as u64) << 17) | ((p as u64) << 1) | stage)
        };
        Some(PassDesc {
            name: source.name.clone(),
            vertex_shader: source.vertex_shader.then(|| shader(0)),
            pixel_shader: source.pixel_shader.then(|| shader(1)),
        })
    }

    fn validate_technique(&self, technique: NativeHandle) -> bool {
        let Ok(index) = self.technique_index(technique) else {
            return false;
        };
        if self.flags.contains(CompileFlags::SKIP_VALIDATION) {
            return true;
        }
        let required = self
            .technique_source(index)
            .and_then(|t| find_annotation(&t.annotations, "shader_model"))
            .and_then(|value| value.as_int())
            .unwrap_or(0);
        required <= self.shader_model
    }

    fn annotation(&self, handle: NativeHandle, name: &str) -> Option<AnnotationValue> {
        let annotations = match self.decode(handle)? {
            HandleTarget::Parameter(i) => &self.source.parameters[i].annotations,
            HandleTarget::Technique(t) => &self.technique_source(t)?.annotations,
            HandleTarget::Pass(t, p) => &self.pass_source(t, p)?.annotations,
        };
        find_annotation(annotations, name)
    }

    fn set_technique(&self, technique: NativeHandle) -> BackendResult<()> {
        let index = self.technique_index(technique)?;
        self.execution.lock().current_technique = Some(index);
        Ok(())
    }

    fn begin(&self, technique: NativeHandle) -> BackendResult<u32> {
        let index = self.technique_index(technique)?;
        let mut execution = self.execution.lock();
        if execution.begun.is_some() {
            return Err(BackendError::InvalidCall("effect already begun".to_string()));
        }
        execution.begun = Some(index);
        execution.current_technique = Some(index);
        Ok(self.source.techniques[index].passes.len() as u32)
    }

    fn end(&self) -> BackendResult<()> {
        let mut execution = self.execution.lock();
        if execution.begun.is_none() {
            return Err(BackendError::InvalidCall("effect not begun".to_string()));
        }
        if execution.active_pass.is_some() {
            return Err(BackendError::InvalidCall("a pass is still active".to_string()));
        }
        execution.begun = None;
        Ok(())
    }

    fn begin_pass(&self, technique: NativeHandle, index: u32) -> BackendResult<()> {
        let t = self.technique_index(technique)?;
        let pass = self
            .pass_source(t, index as usize)
            .ok_or_else(|| BackendError::InvalidCall(format!("pass {index} out of range")))?;

        let mut execution = self.execution.lock();
        if execution.begun.is_none() {
            return Err(BackendError::InvalidCall("effect not begun".to_string()));
        }
        if execution.active_pass.is_some() {
            return Err(BackendError::InvalidCall("a pass is already active".to_string()));
        }

        let mut state = self.device.render_state.lock();
        for (name, value) in &pass.states {
            state.states.insert(name.clone(), *value);
        }
        execution.active_pass = Some((t, index as usize));
        Ok(())
    }

    fn end_pass(&self) -> BackendResult<()> {
        let mut execution = self.execution.lock();
        if execution.active_pass.take().is_none() {
            return Err(BackendError::InvalidCall("no active pass".to_string()));
        }
        Ok(())
    }

    fn get_value(&self, parameter: NativeHandle) -> BackendResult<NativeValue> {
        let index = self.parameter_index(parameter)?;
        Ok(self.execution.lock().values[index].clone())
    }

    fn set_value(&self, parameter: NativeHandle, value: &NativeValue) -> BackendResult<()> {
        let index = self.parameter_index(parameter)?;
        let expected = self.source.parameters[index].desc.kind;
        if value.kind() != expected {
            return Err(BackendError::TypeMismatch {
                expected: expected.name(),
                actual: value.kind().name(),
            });
        }
        self.execution.lock().values[index] = value.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    const SOURCE: &str = r#"
        float4 tint = { 1, 1, 1, 1 };
        technique basic { pass p0 { CullMode = 2; } }
        technique modern < int shader_model = 5; > { pass p0 { } }
    "#;

    fn compile(backend: &DummyBackend) -> Box<dyn NativeEffect> {
        backend
            .compile_effect(SOURCE, CompileFlags::empty())
            .unwrap()
    }

    #[test]
    fn test_compile_failure_returns_diagnostics() {
        let backend = DummyBackend::new();
        match backend.compile_effect("float4 broken", CompileFlags::empty()) {
            Err(BackendError::CompilationFailed { diagnostics }) => {
                assert!(!diagnostics.is_empty())
            }
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(_) => panic!("compilation should fail"),
        }
    }

    #[test]
    fn test_reflection() {
        let backend = DummyBackend::new();
        let effect = compile(&backend);
        assert_eq!(
            effect.describe(),
            EffectDesc {
                parameters: 1,
                techniques: 2
            }
        );

        let tint = effect.parameter(0).unwrap();
        assert_eq!(effect.parameter_desc(tint).unwrap().name, "tint");
        assert!(effect.parameter(1).is_none());

        let basic = effect.technique(0).unwrap();
        assert_eq!(effect.technique_desc(basic).unwrap().passes, 1);
        let pass = effect.pass(basic, 0).unwrap();
        assert_eq!(effect.pass_desc(pass).unwrap().name, "p0");
        assert!(effect.pass(basic, 1).is_none());
    }

    #[test]
    fn test_validation_against_shader_model() {
        let backend = DummyBackend::new();
        let effect = compile(&backend);
        assert!(effect.validate_technique(effect.technique(0).unwrap()));
        assert!(!effect.validate_technique(effect.technique(1).unwrap()));

        let effect = backend
            .compile_effect(SOURCE, CompileFlags::SKIP_VALIDATION)
            .unwrap();
        assert!(effect.validate_technique(effect.technique(1).unwrap()));
    }

    #[test]
    fn test_pass_applies_state() {
        let backend = DummyBackend::new();
        let effect = compile(&backend);
        let technique = effect.technique(0).unwrap();

        assert!(effect.begin_pass(technique, 0).is_err());
        assert_eq!(effect.begin(technique).unwrap(), 1);
        effect.begin_pass(technique, 0).unwrap();
        assert_eq!(backend.render_state_value("CullMode"), Some(2));
        assert!(effect.end().is_err());
        effect.end_pass().unwrap();
        effect.end().unwrap();
    }

    #[test]
    fn test_value_type_checking() {
        let backend = DummyBackend::new();
        let effect = compile(&backend);
        let tint = effect.parameter(0).unwrap();

        assert_eq!(effect.get_value(tint).unwrap(), NativeValue::Float(Vec4::ONE));
        assert!(effect.set_value(tint, &NativeValue::Int(1)).is_err());
        effect
            .set_value(tint, &NativeValue::Float(Vec4::new(0.5, 0.5, 0.5, 1.0)))
            .unwrap();
        assert_eq!(
            effect.get_value(tint).unwrap(),
            NativeValue::Float(Vec4::new(0.5, 0.5, 0.5, 1.0))
        );
    }

    #[test]
    fn test_texture_lifecycle() {
        let backend = DummyBackend::new();
        let desc = TextureDescriptor::new_2d(4, 4, TextureFormat::Rgba8Unorm)
            .with_usage(TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING);
        let texture = backend.create_texture(&desc).unwrap();
        assert_eq!(backend.texture_count(), 1);

        assert!(backend.write_texture(texture, &[0u8; 3]).is_err());
        backend.write_texture(texture, &[0u8; 64]).unwrap();
        assert_eq!(backend.uploaded_bytes(texture), Some(64));

        backend.set_render_target(0, Some(texture)).unwrap();
        assert_eq!(backend.capture_state().targets[0], Some(texture));
        backend.destroy_texture(texture);
        assert_eq!(backend.texture_count(), 0);
        assert_eq!(backend.capture_state().targets[0], None);
    }

    #[test]
    fn test_rejects_invalid_textures() {
        let backend = DummyBackend::new();
        assert!(backend
            .create_texture(&TextureDescriptor::new_2d(0, 4, TextureFormat::R32Float))
            .is_err());
        assert!(backend
            .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::R32Float).with_mip_levels(9))
            .is_err());

        let sampled = backend
            .create_texture(&TextureDescriptor::new_2d(4, 4, TextureFormat::R32Float))
            .unwrap();
        assert!(backend.set_render_target(0, Some(sampled)).is_err());
        assert!(backend.set_render_target(4, None).is_err());
    }

    #[test]
    fn test_oversized_upload_is_rejected() {
        let backend = DummyBackend::new();
        let huge = backend
            .create_texture(&TextureDescriptor::new_volume(
                u32::MAX,
                u32::MAX,
                u32::MAX,
                TextureFormat::Rgba8Unorm,
            ))
            .unwrap();

        assert!(matches!(
            backend.write_texture(huge, &[0u8; 4]),
            Err(BackendError::InvalidCall(_))
        ));
        assert_eq!(backend.uploaded_bytes(huge), Some(0));
    }
}
