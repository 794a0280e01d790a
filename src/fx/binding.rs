//! Binding: the hardware context that creates effects, parameters and textures.
//!
//! The binding also owns the activation state machine:
//!
//! ```text
//! Unbound --Effect::bind--> EffectActive --Pass::bind--> PassActive
//!    ^                          |  ^                         |
//!    +------Effect::reset-------+  +-------Pass::reset-------+
//! ```
//!
//! and a stack of saved render states used by clean effect activation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::backend::{
    BackendError, EffectBackend, ParameterDesc, RenderState, TextureDescriptor, TextureFormat,
    TextureUsage,
};
use crate::config::CoreConfig;
use crate::error::{FxError, FxResult};
use crate::registry::Registry;
use crate::vfs::Vfs;

use super::resource::Resource;
use super::{Effect, Parameter, Texture};

/// One entry of the argument list passed to [`Binding::init`].
#[derive(Clone)]
pub enum BindingArgument {
    Device(Arc<dyn EffectBackend>),
    Integer(i64),
    Text(String),
}

impl std::fmt::Debug for BindingArgument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device(backend) => f.debug_tuple("Device").field(&backend.name()).finish(),
            Self::Integer(value) => f.debug_tuple("Integer").field(value).finish(),
            Self::Text(value) => f.debug_tuple("Text").field(value).finish(),
        }
    }
}

/// The attached device and the state captured when it was attached.
struct DeviceContext {
    backend: Arc<dyn EffectBackend>,
    initial_state: RenderState,
    generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveEffect {
    id: u64,
    clean: bool,
}

#[derive(Debug, Default)]
struct Activation {
    effect: Option<ActiveEffect>,
    pass: Option<u64>,
}

/// A graphics device attachment.
///
/// A binding starts unattached; [`Binding::init`] attaches it to a device and
/// [`Binding::reset`] releases it again, invalidating every resource created
/// in between.
///
/// # Thread Safety
///
/// `Binding` is `Send + Sync`, but activation is meant to be driven from a
/// single render thread.
pub struct Binding {
    registry: Arc<Registry>,
    files: Arc<Vfs>,
    config: CoreConfig,
    device: RwLock<Option<DeviceContext>>,
    generations: AtomicU64,
    next_id: AtomicU64,
    activation: Mutex<Activation>,
    state_stack: Mutex<Vec<RenderState>>,
    // Weak references for bookkeeping
    effects: Mutex<Vec<Weak<Effect>>>,
    textures: Mutex<Vec<Weak<Texture>>>,
}

impl Binding {
    /// Create an unattached binding.
    pub fn new(registry: Arc<Registry>, files: Arc<Vfs>, config: CoreConfig) -> Arc<Self> {
        Arc::new(Self {
            registry,
            files,
            config,
            device: RwLock::new(None),
            generations: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
            activation: Mutex::new(Activation::default()),
            state_stack: Mutex::new(Vec::new()),
            effects: Mutex::new(Vec::new()),
            textures: Mutex::new(Vec::new()),
        })
    }

    /// Attach to a device.
    ///
    /// The argument list must be exactly `[BindingArgument::Device(backend)]`.
    /// Any other shape fails with [`FxError::InvalidParams`] and leaves the
    /// binding unattached. The device's current render state becomes the
    /// baseline applied by [`Binding::reset_state`].
    pub fn init(&self, arguments: &[BindingArgument]) -> FxResult<()> {
        let backend = match arguments {
            [BindingArgument::Device(backend)] => Arc::clone(backend),
            _ => {
                self.release();
                return Err(FxError::InvalidParams(format!(
                    "binding expects a single device argument, got {arguments:?}"
                )));
            }
        };

        self.release();

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let initial_state = backend.capture_state();
        log::info!(
            "Binding: attached to '{}' (generation {})",
            backend.name(),
            generation
        );
        *self.device.write() = Some(DeviceContext {
            backend,
            initial_state,
            generation,
        });
        Ok(())
    }

    /// Release the device. The device itself is left to its owner; every
    /// effect and texture created so far becomes invalid.
    ///
    /// If a clean effect is still active, the host state it saved is applied
    /// before the device is let go.
    pub fn reset(&self) {
        self.release();
    }

    fn release(&self) {
        let previous = self.device.write().take();
        *self.activation.lock() = Activation::default();
        let saved = std::mem::take(&mut *self.state_stack.lock());

        if let Some(context) = previous {
            if let Some(host_state) = saved.first() {
                log::warn!(
                    "Binding: released with {} saved render state(s), restoring the oldest",
                    saved.len()
                );
                context.backend.apply_state(host_state);
            }
            log::info!("Binding: released '{}'", context.backend.name());
        }
    }

    pub fn is_attached(&self) -> bool {
        self.device.read().is_some()
    }

    /// The attached device, if any.
    pub fn backend(&self) -> Option<Arc<dyn EffectBackend>> {
        self.device
            .read()
            .as_ref()
            .map(|context| Arc::clone(&context.backend))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn files(&self) -> &Arc<Vfs> {
        &self.files
    }

    pub fn backbuffer_size(&self) -> Option<(u32, u32)> {
        self.backend().and_then(|backend| backend.backbuffer_size())
    }

    /// Compile an effect from source text.
    ///
    /// Compiler diagnostics are logged and the call fails with
    /// [`FxError::ApiError`].
    pub fn create_effect(self: &Arc<Self>, source: &str) -> FxResult<Arc<Effect>> {
        self.compile("<inline>", source)
    }

    /// Compile an effect read through the file system. The effect is named
    /// after the resolved path.
    pub fn create_effect_from_file(self: &Arc<Self>, file: &str) -> FxResult<Arc<Effect>> {
        let file = self.files.get_file(file)?;
        // Effect sources are single-byte text.
        let source = match String::from_utf8(file.data) {
            Ok(source) => source,
            Err(err) => err.into_bytes().into_iter().map(char::from).collect(),
        };
        self.compile(&file.path, &source)
    }

    fn compile(self: &Arc<Self>, name: &str, source: &str) -> FxResult<Arc<Effect>> {
        let (backend, generation) = self.device()?;

        let native = backend
            .compile_effect(source, self.config.compile_flags)
            .map_err(|err| match err {
                BackendError::CompilationFailed { diagnostics } => {
                    for diagnostic in &diagnostics {
                        log::error!("Binding: {}: {}", name, diagnostic);
                    }
                    FxError::ApiError(format!(
                        "compiling '{}' failed with {} diagnostic(s)",
                        name,
                        diagnostics.len()
                    ))
                }
                other => other.into(),
            })?;

        let effect = Effect::new(self, generation, name.to_string(), native)?;
        self.effects.lock().push(Arc::downgrade(&effect));
        Ok(effect)
    }

    /// Create a virtual parameter. Registration is left to the registry.
    pub fn create_parameter(&self, name: &str, desc: ParameterDesc) -> Arc<Parameter> {
        log::trace!("Binding: created parameter '{}' ({:?})", name, desc);
        Arc::new(Parameter::new_virtual(name.to_string(), desc))
    }

    /// Allocate a texture on the device.
    pub fn create_texture(
        self: &Arc<Self>,
        name: &str,
        descriptor: &TextureDescriptor,
    ) -> FxResult<Arc<Texture>> {
        let (backend, generation) = self.device()?;

        let mut descriptor = descriptor.clone();
        if descriptor.label.is_none() {
            descriptor.label = Some(name.to_string());
        }
        let handle = backend.create_texture(&descriptor)?;

        let texture = Arc::new(Texture::new(
            self,
            generation,
            name.to_string(),
            descriptor,
            Some(handle),
            None,
        ));
        self.track_texture(&texture);
        Ok(texture)
    }

    /// Decode an image file into an RGBA8 texture.
    pub fn create_texture_from_file(self: &Arc<Self>, name: &str, file: &str) -> FxResult<Arc<Texture>> {
        let (backend, generation) = self.device()?;
        let file = self.files.get_file(file)?;

        let image = image::load_from_memory(&file.data)
            .map_err(|err| FxError::ApiError(format!("failed to decode '{}': {}", file.path, err)))?
            .to_rgba8();
        let (width, height) = image.dimensions();

        let descriptor =
            TextureDescriptor::new_2d(width, height, TextureFormat::Rgba8Unorm).with_label(name);
        let handle = backend.create_texture(&descriptor)?;
        if let Err(err) = backend.write_texture(handle, image.as_raw()) {
            backend.destroy_texture(handle);
            return Err(err.into());
        }

        let texture = Arc::new(Texture::new(
            self,
            generation,
            name.to_string(),
            descriptor,
            Some(handle),
            Some(file.path),
        ));
        self.track_texture(&texture);
        Ok(texture)
    }

    /// Create a texture without native storage. Bound as a pass target it
    /// selects the back buffer.
    pub fn create_null_texture(self: &Arc<Self>) -> FxResult<Arc<Texture>> {
        let (backend, generation) = self.device()?;
        let (width, height) = backend
            .backbuffer_size()
            .unwrap_or(self.config.fallback_texture_size);
        let descriptor = TextureDescriptor::new_2d(width, height, TextureFormat::Bgra8Unorm)
            .with_usage(TextureUsage::RENDER_ATTACHMENT);

        let texture = Arc::new(Texture::new(
            self,
            generation,
            String::new(),
            descriptor,
            None,
            None,
        ));
        self.track_texture(&texture);
        Ok(texture)
    }

    /// Save the current render state.
    pub fn push_state(&self) -> FxResult<()> {
        let (backend, _) = self.device()?;
        self.state_stack.lock().push(backend.capture_state());
        Ok(())
    }

    /// Restore the most recently saved render state.
    pub fn pop_state(&self) -> FxResult<()> {
        let (backend, _) = self.device()?;
        let state = self
            .state_stack
            .lock()
            .pop()
            .ok_or_else(|| FxError::InvalidCall("render state stack is empty".to_string()))?;
        backend.apply_state(&state);
        Ok(())
    }

    /// Apply the baseline state captured by [`Binding::init`].
    pub fn reset_state(&self) -> FxResult<()> {
        let guard = self.device.read();
        let context = guard.as_ref().ok_or_else(Self::unattached)?;
        context.backend.apply_state(&context.initial_state);
        Ok(())
    }

    /// Number of saved render states.
    pub fn state_depth(&self) -> usize {
        self.state_stack.lock().len()
    }

    pub fn has_active_effect(&self) -> bool {
        self.activation.lock().effect.is_some()
    }

    pub fn has_active_pass(&self) -> bool {
        self.activation.lock().pass.is_some()
    }

    /// Number of live effects created by this binding.
    pub fn effect_count(&self) -> usize {
        let mut effects = self.effects.lock();
        effects.retain(|weak| weak.strong_count() > 0);
        effects.len()
    }

    /// Number of live textures created by this binding.
    pub fn texture_count(&self) -> usize {
        let mut textures = self.textures.lock();
        textures.retain(|weak| weak.strong_count() > 0);
        textures.len()
    }

    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The device, if it is still the one of `generation`.
    pub(crate) fn device_for(&self, generation: u64) -> FxResult<Arc<dyn EffectBackend>> {
        let (backend, current) = self.device()?;
        if current != generation {
            return Err(FxError::InvalidCall(
                "resource was created for a previous device".to_string(),
            ));
        }
        Ok(backend)
    }

    pub(crate) fn active_effect(&self) -> Option<u64> {
        self.activation.lock().effect.map(|active| active.id)
    }

    /// Transition `Unbound -> EffectActive`.
    pub(crate) fn begin_effect(
        &self,
        effect: u64,
        clean: bool,
        begin: impl FnOnce() -> FxResult<()>,
    ) -> FxResult<()> {
        let mut activation = self.activation.lock();
        if let Some(active) = activation.effect {
            return Err(FxError::InvalidCall(if active.id == effect {
                "effect is already active".to_string()
            } else {
                "another effect is active".to_string()
            }));
        }

        if clean {
            self.push_state()?;
            if let Err(err) = self.reset_state() {
                self.pop_state()?;
                return Err(err);
            }
        }

        if let Err(err) = begin() {
            if clean {
                self.pop_state()?;
            }
            return Err(err);
        }

        activation.effect = Some(ActiveEffect { id: effect, clean });
        Ok(())
    }

    /// Transition `EffectActive -> Unbound`. `end` learns whether a pass was
    /// left active. The activation is cleared and clean state restored even
    /// when `end` fails.
    pub(crate) fn end_effect(
        &self,
        effect: u64,
        end: impl FnOnce(bool) -> FxResult<()>,
    ) -> FxResult<()> {
        let mut activation = self.activation.lock();
        let active = match activation.effect {
            Some(active) if active.id == effect => active,
            _ => return Err(FxError::InvalidCall("effect is not active".to_string())),
        };

        let dangling_pass = activation.pass.take().is_some();
        let result = end(dangling_pass);
        activation.effect = None;

        if active.clean {
            if let Err(err) = self.pop_state() {
                log::error!("Binding: restoring render state failed: {}", err);
            }
        }
        result
    }

    /// Transition `EffectActive -> PassActive`.
    pub(crate) fn begin_pass(
        &self,
        effect: u64,
        pass: u64,
        begin: impl FnOnce() -> FxResult<()>,
    ) -> FxResult<()> {
        let mut activation = self.activation.lock();
        if activation.effect.map(|active| active.id) != Some(effect) {
            return Err(FxError::InvalidCall(
                "the pass's effect is not active".to_string(),
            ));
        }
        if activation.pass.is_some() {
            return Err(FxError::InvalidCall("a pass is already active".to_string()));
        }

        begin()?;
        activation.pass = Some(pass);
        Ok(())
    }

    /// Transition `PassActive -> EffectActive`.
    pub(crate) fn end_pass(&self, pass: u64, end: impl FnOnce() -> FxResult<()>) -> FxResult<()> {
        let mut activation = self.activation.lock();
        if activation.pass != Some(pass) {
            return Err(FxError::InvalidCall("pass is not active".to_string()));
        }

        end()?;
        activation.pass = None;
        Ok(())
    }

    fn device(&self) -> FxResult<(Arc<dyn EffectBackend>, u64)> {
        self.device
            .read()
            .as_ref()
            .map(|context| (Arc::clone(&context.backend), context.generation))
            .ok_or_else(Self::unattached)
    }

    fn unattached() -> FxError {
        FxError::InvalidCall("binding is not attached to a device".to_string())
    }

    fn track_texture(&self, texture: &Arc<Texture>) {
        self.textures.lock().push(Arc::downgrade(texture));
        log::trace!(
            "Binding: created texture '{}' ({:?})",
            texture.name(),
            texture.native_handle()
        );
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("attached", &self.is_attached())
            .field("state_depth", &self.state_depth())
            .finish()
    }
}

static_assertions::assert_impl_all!(Binding: Send, Sync);
static_assertions::assert_impl_all!(BindingArgument: Send, Sync);
