//! Native backend abstraction traits
//!
//! These traits are the seam between the effect engine and the native shader
//! compiler / graphics device. The engine never talks to a graphics API
//! directly; everything it needs goes through [`EffectBackend`] and the
//! [`NativeEffect`] objects it compiles.

use thiserror::Error;

use crate::backend::types::*;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("effect compilation failed with {} diagnostic(s)", diagnostics.len())]
    CompilationFailed { diagnostics: Vec<String> },
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Invalid handle: {0:?}")]
    InvalidHandle(NativeHandle),
    #[error("Invalid call: {0}")]
    InvalidCall(String),
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Opaque handle to a parameter, technique or pass inside a compiled effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

/// Handle to a native texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// A native graphics device able to compile effects and allocate textures.
pub trait EffectBackend: Send + Sync {
    /// Human readable backend name.
    fn name(&self) -> &str;

    /// Compile effect source text against this device.
    ///
    /// Source is treated as single-byte text.
    fn compile_effect(
        &self,
        source: &str,
        flags: CompileFlags,
    ) -> BackendResult<Box<dyn NativeEffect>>;

    /// Allocate a texture.
    fn create_texture(&self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    /// Upload texel data into the top mip level.
    fn write_texture(&self, texture: TextureHandle, data: &[u8]) -> BackendResult<()>;

    /// Release a texture.
    fn destroy_texture(&self, texture: TextureHandle);

    /// Bind a render target slot; `None` selects the back buffer.
    fn set_render_target(&self, slot: usize, texture: Option<TextureHandle>) -> BackendResult<()>;

    /// Capture the current render state.
    fn capture_state(&self) -> RenderState;

    /// Overwrite the current render state.
    fn apply_state(&self, state: &RenderState);

    /// Size of the host's back buffer, if known.
    fn backbuffer_size(&self) -> Option<(u32, u32)>;
}

/// A compiled effect program and its reflection data.
pub trait NativeEffect: Send + Sync {
    /// Parameter and technique counts.
    fn describe(&self) -> EffectDesc;

    fn parameter(&self, index: u32) -> Option<NativeHandle>;

    fn parameter_desc(&self, parameter: NativeHandle) -> Option<NativeParameterDesc>;

    fn technique(&self, index: u32) -> Option<NativeHandle>;

    fn technique_desc(&self, technique: NativeHandle) -> Option<TechniqueDesc>;

    fn pass(&self, technique: NativeHandle, index: u32) -> Option<NativeHandle>;

    fn pass_desc(&self, pass: NativeHandle) -> Option<PassDesc>;

    /// Check that a technique can run on the current hardware.
    fn validate_technique(&self, technique: NativeHandle) -> bool;

    /// Look up an annotation on a parameter, technique or pass.
    fn annotation(&self, handle: NativeHandle, name: &str) -> Option<AnnotationValue>;

    /// Select the technique used by the next [`NativeEffect::begin`].
    fn set_technique(&self, technique: NativeHandle) -> BackendResult<()>;

    /// Begin the effect with the given technique. Returns its pass count.
    fn begin(&self, technique: NativeHandle) -> BackendResult<u32>;

    fn end(&self) -> BackendResult<()>;

    fn begin_pass(&self, technique: NativeHandle, index: u32) -> BackendResult<()>;

    fn end_pass(&self) -> BackendResult<()>;

    fn get_value(&self, parameter: NativeHandle) -> BackendResult<NativeValue>;

    fn set_value(&self, parameter: NativeHandle, value: &NativeValue) -> BackendResult<()>;
}
