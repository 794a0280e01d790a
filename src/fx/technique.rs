//! Technique: an ordered sequence of passes.

use std::sync::{Arc, Weak};

use crate::backend::{NativeEffect, NativeHandle};
use crate::error::{FxError, FxResult};

use super::resource::{PropertyBag, PropertyKey, PropertyValue, Resource, ResourceKind};
use super::{Binding, Effect, Pass};

/// A validated, immutable list of passes inside an [`Effect`].
///
/// Techniques have no bind/reset of their own; passes are entered directly.
pub struct Technique {
    name: String,
    effect: Weak<Effect>,
    handle: NativeHandle,
    passes: Vec<Arc<Pass>>,
    properties: PropertyBag,
}

impl Technique {
    /// Build a technique and all of its passes.
    ///
    /// Fails when the technique has no descriptor or any pass cannot be
    /// constructed.
    pub(crate) fn new(
        binding: &Binding,
        effect: Weak<Effect>,
        native: &dyn NativeEffect,
        handle: NativeHandle,
    ) -> FxResult<Arc<Self>> {
        let desc = native
            .technique_desc(handle)
            .ok_or_else(|| FxError::InvalidParams(format!("technique {handle:?} has no descriptor")))?;

        let mut failure = None;
        let technique = Arc::new_cyclic(|this: &Weak<Technique>| {
            let mut passes = Vec::with_capacity(desc.passes as usize);
            for index in 0..desc.passes {
                match Pass::new(binding, this.clone(), native, handle, index) {
                    Ok(pass) => passes.push(Arc::new(pass)),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }
            Technique {
                name: desc.name.clone(),
                effect,
                handle,
                passes,
                properties: PropertyBag::new(),
            }
        });

        if let Some(err) = failure {
            return Err(err);
        }

        log::trace!(
            "Technique '{}': created with {} pass(es)",
            technique.name,
            technique.passes.len()
        );
        Ok(technique)
    }

    pub fn effect(&self) -> Option<Arc<Effect>> {
        self.effect.upgrade()
    }

    pub(crate) fn handle(&self) -> NativeHandle {
        self.handle
    }

    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    pub fn pass(&self, index: usize) -> Option<&Arc<Pass>> {
        self.passes.get(index)
    }

    pub fn passes(&self) -> &[Arc<Pass>] {
        &self.passes
    }

    pub fn pass_by_name(&self, name: &str) -> Option<&Arc<Pass>> {
        self.passes.iter().find(|p| p.name() == name)
    }
}

impl Resource for Technique {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Technique
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn builtin_property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        match key {
            PropertyKey::Name => Some(PropertyValue::String(self.name.clone())),
            PropertyKey::Count => Some(PropertyValue::Int(self.passes.len() as i64)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Technique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Technique")
            .field("name", &self.name)
            .field("passes", &self.passes)
            .finish()
    }
}

static_assertions::assert_impl_all!(Technique: Send, Sync);
