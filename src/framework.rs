//! The framework instance.
//!
//! A [`Core`] owns the registry, the file system and the configuration, and
//! keeps the binding it created last as the current one. Registry operations
//! that need a device go through that binding.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{ParameterDesc, TextureDescriptor};
use crate::config::CoreConfig;
use crate::error::{FxError, FxResult};
use crate::fx::{Binding, Parameter, Texture};
use crate::registry::{ParameterQuery, Registry};
use crate::vfs::{FileSystemProvider, Vfs};

/// Owner of the shared registry and the current [`Binding`].
///
/// Dropping the core clears both registries; resources still held elsewhere
/// stay alive.
///
/// # Example
///
/// ```ignore
/// let core = Core::new(CoreConfig::default().with_search_path("effects"));
/// let binding = core.create_binding();
/// binding.init(&[BindingArgument::Device(Arc::new(DummyBackend::new()))])?;
///
/// let time = core.create_parameter("time", ParameterDesc::float(1)).unwrap();
/// let effect = binding.create_effect_from_file("bloom.fx")?;
/// ```
pub struct Core {
    config: CoreConfig,
    registry: Arc<Registry>,
    files: Arc<Vfs>,
    binding: RwLock<Option<Arc<Binding>>>,
}

impl Core {
    /// Create a core whose file system mounts every configured search path.
    pub fn new(config: CoreConfig) -> Self {
        let mut files = Vfs::new();
        for (index, root) in config.search_paths.iter().enumerate() {
            files.mount(format!("search{index}"), FileSystemProvider::new(root.clone()));
        }
        Self::with_files(config, files)
    }

    /// Create a core over a prepared file system.
    pub fn with_files(config: CoreConfig, files: Vfs) -> Self {
        log::info!(
            "Core: created ({} file source(s))",
            files.sources().count()
        );
        Self {
            config,
            registry: Arc::new(Registry::new()),
            files: Arc::new(files),
            binding: RwLock::new(None),
        }
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

    /// Create an unattached binding and make it current.
    pub fn create_binding(&self) -> Arc<Binding> {
        let binding = Binding::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.files),
            self.config.clone(),
        );
        *self.binding.write() = Some(Arc::clone(&binding));
        binding
    }

    /// The current binding.
    pub fn binding(&self) -> Option<Arc<Binding>> {
        self.binding.read().clone()
    }

    /// Create and register a virtual parameter through the current binding.
    ///
    /// Returns `None` with a warning when the name is taken or no binding exists.
    pub fn create_parameter(&self, name: &str, desc: ParameterDesc) -> Option<Arc<Parameter>> {
        let Some(binding) = self.binding() else {
            log::warn!("Core: cannot create parameter '{}' without a binding", name);
            return None;
        };
        self.registry.create_parameter(&binding, name, desc)
    }

    /// Create and register a texture, or return the one registered under `name`.
    pub fn create_texture(&self, name: &str, descriptor: &TextureDescriptor) -> FxResult<Arc<Texture>> {
        let binding = self.current_binding()?;
        self.registry.create_texture(&binding, name, descriptor)
    }

    /// Load and register a texture, or return the one registered under `name`.
    pub fn load_texture(&self, name: &str, file: &str) -> FxResult<Arc<Texture>> {
        let binding = self.current_binding()?;
        self.registry.load_texture(&binding, name, file)
    }

    pub fn get_parameter(&self, name: &str, query: impl Into<ParameterQuery>) -> Option<Arc<Parameter>> {
        self.registry.get_parameter(name, query)
    }

    pub fn get_texture(&self, name: &str) -> Option<Arc<Texture>> {
        self.registry.get_texture(name)
    }

    pub fn remove_parameter(&self, name: &str) -> FxResult<()> {
        self.registry.remove_parameter(name)
    }

    pub fn remove_texture(&self, name: &str) -> FxResult<()> {
        self.registry.remove_texture(name)
    }

    fn current_binding(&self) -> FxResult<Arc<Binding>> {
        self.binding()
            .ok_or_else(|| FxError::InvalidCall("no binding has been created".to_string()))
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.registry.clear();
        log::info!("Core: destroyed");
    }
}

impl std::fmt::Debug for Core {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Core")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish()
    }
}

static_assertions::assert_impl_all!(Core: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::{DummyBackend, TextureFormat};
    use crate::fx::BindingArgument;

    #[test]
    fn test_operations_need_a_binding() {
        let core = Core::new(CoreConfig::default());
        assert!(core.binding().is_none());
        assert!(core.create_parameter("a", ParameterDesc::int()).is_none());
        assert!(matches!(
            core.create_texture("t", &TextureDescriptor::default()),
            Err(FxError::InvalidCall(_))
        ));
    }

    #[test]
    fn test_drop_clears_registry() {
        let backend = Arc::new(DummyBackend::new());
        let core = Core::new(CoreConfig::default());
        let binding = core.create_binding();
        binding.init(&[BindingArgument::Device(backend.clone())]).unwrap();

        core.create_texture("rt", &TextureDescriptor::new_2d(16, 16, TextureFormat::Rgba8Unorm))
            .unwrap();
        let registry = Arc::clone(core.registry());
        assert_eq!(registry.texture_count(), 1);

        drop(core);
        assert_eq!(registry.texture_count(), 0);
        assert_eq!(backend.texture_count(), 0);
    }
}
