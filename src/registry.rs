//! Name-keyed stores of shared parameters and textures.
//!
//! The two stores deliberately treat duplicate names differently: creating a
//! parameter under a taken name is rejected, while creating or loading a
//! texture under a taken name returns the texture already registered.
//!
//! Textures left behind by a binding reset are dropped on lookup, so the next
//! create or load under their name allocates on the current device.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::backend::{ParameterDesc, ParameterKind, TextureDescriptor};
use crate::error::{FxError, FxResult};
use crate::fx::{Binding, Parameter, Resource, Texture};

/// Filter for [`Registry::get_parameter`]. `None` fields match anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParameterQuery {
    pub kind: Option<ParameterKind>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
    pub elements: Option<u32>,
}

impl ParameterQuery {
    /// Match any parameter.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn kind(kind: ParameterKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    fn matches(&self, desc: &ParameterDesc) -> bool {
        self.kind.map_or(true, |kind| kind == desc.kind)
            && self.rows.map_or(true, |rows| rows == desc.rows)
            && self.columns.map_or(true, |columns| columns == desc.columns)
            && self.elements.map_or(true, |elements| elements == desc.elements)
    }
}

impl From<ParameterDesc> for ParameterQuery {
    fn from(desc: ParameterDesc) -> Self {
        Self {
            kind: Some(desc.kind),
            rows: Some(desc.rows),
            columns: Some(desc.columns),
            elements: Some(desc.elements),
        }
    }
}

impl From<ParameterKind> for ParameterQuery {
    fn from(kind: ParameterKind) -> Self {
        Self::kind(kind)
    }
}

/// Registry of named parameters and textures shared across effects.
#[derive(Default)]
pub struct Registry {
    parameters: RwLock<HashMap<String, Arc<Parameter>>>,
    textures: RwLock<HashMap<String, Arc<Texture>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a virtual parameter.
    ///
    /// Returns `None` with a warning when the name is taken; the registered
    /// parameter is left untouched.
    pub fn create_parameter(
        &self,
        binding: &Binding,
        name: &str,
        desc: ParameterDesc,
    ) -> Option<Arc<Parameter>> {
        let mut parameters = self.parameters.write();
        if parameters.contains_key(name) {
            log::warn!("Registry: parameter '{}' already exists", name);
            return None;
        }

        let parameter = binding.create_parameter(name, desc);
        parameters.insert(name.to_string(), Arc::clone(&parameter));
        log::trace!("Registry: registered parameter '{}'", name);
        Some(parameter)
    }

    /// Create and register a texture, or return the one registered under `name`.
    pub fn create_texture(
        &self,
        binding: &Arc<Binding>,
        name: &str,
        descriptor: &TextureDescriptor,
    ) -> FxResult<Arc<Texture>> {
        if let Some(existing) = self.existing_texture(name) {
            return Ok(existing);
        }
        let texture = binding.create_texture(name, descriptor)?;
        Ok(self.insert_texture(name, texture))
    }

    /// Load and register a texture from a file, or return the one registered
    /// under `name`.
    pub fn load_texture(
        &self,
        binding: &Arc<Binding>,
        name: &str,
        file: &str,
    ) -> FxResult<Arc<Texture>> {
        if let Some(existing) = self.existing_texture(name) {
            return Ok(existing);
        }
        let texture = binding.create_texture_from_file(name, file)?;
        Ok(self.insert_texture(name, texture))
    }

    /// Look up a parameter whose type matches every field set in `query`.
    pub fn get_parameter(
        &self,
        name: &str,
        query: impl Into<ParameterQuery>,
    ) -> Option<Arc<Parameter>> {
        let query = query.into();
        self.parameters
            .read()
            .get(name)
            .filter(|parameter| query.matches(&parameter.desc()))
            .cloned()
    }

    pub fn contains_parameter(&self, name: &str) -> bool {
        self.parameters.read().contains_key(name)
    }

    /// Look up a texture. Entries invalidated by a binding reset are evicted.
    pub fn get_texture(&self, name: &str) -> Option<Arc<Texture>> {
        let texture = self.textures.read().get(name).cloned()?;
        if texture.is_valid() {
            return Some(texture);
        }
        self.evict_stale_texture(name);
        None
    }

    /// Unregister a parameter. Other holders keep it alive.
    pub fn remove_parameter(&self, name: &str) -> FxResult<()> {
        let removed = self.parameters.write().remove(name);
        match removed {
            Some(_) => {
                log::trace!("Registry: removed parameter '{}'", name);
                Ok(())
            }
            None => Err(FxError::NotFound(format!("parameter '{name}'"))),
        }
    }

    /// Unregister a texture. Other holders keep it alive.
    pub fn remove_texture(&self, name: &str) -> FxResult<()> {
        let removed = self.textures.write().remove(name);
        match removed {
            Some(_) => {
                log::trace!("Registry: removed texture '{}'", name);
                Ok(())
            }
            None => Err(FxError::NotFound(format!("texture '{name}'"))),
        }
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.read().keys().cloned().collect()
    }

    pub fn texture_names(&self) -> Vec<String> {
        self.textures.read().keys().cloned().collect()
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.read().len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.read().len()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let parameters = std::mem::take(&mut *self.parameters.write());
        let textures = std::mem::take(&mut *self.textures.write());
        log::debug!(
            "Registry: cleared {} parameter(s), {} texture(s)",
            parameters.len(),
            textures.len()
        );
    }

    fn existing_texture(&self, name: &str) -> Option<Arc<Texture>> {
        let existing = self.get_texture(name)?;
        log::warn!("Registry: texture '{}' already exists, reusing it", name);
        Some(existing)
    }

    fn insert_texture(&self, name: &str, texture: Arc<Texture>) -> Arc<Texture> {
        let mut textures = self.textures.write();
        // First valid registration wins.
        let entry = textures
            .entry(name.to_string())
            .and_modify(|existing| {
                if !existing.is_valid() {
                    *existing = Arc::clone(&texture);
                }
            })
            .or_insert_with(|| Arc::clone(&texture));
        log::trace!("Registry: registered texture '{}'", entry.name());
        Arc::clone(entry)
    }

    fn evict_stale_texture(&self, name: &str) {
        let mut textures = self.textures.write();
        if textures.get(name).is_some_and(|texture| !texture.is_valid()) {
            textures.remove(name);
            log::debug!("Registry: evicted texture '{}' of a released device", name);
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("parameters", &self.parameter_count())
            .field("textures", &self.texture_count())
            .finish()
    }
}

static_assertions::assert_impl_all!(Registry: Send, Sync);
