//! Fixtures shared by unit tests.

use std::sync::Arc;

use crate::backend::DummyBackend;
use crate::config::CoreConfig;
use crate::fx::{Binding, BindingArgument};
use crate::registry::Registry;
use crate::vfs::Vfs;

/// A binding over its own registry, attached to `backend`.
pub(crate) fn binding_with(backend: Arc<DummyBackend>) -> Arc<Binding> {
    let binding = Binding::new(
        Arc::new(Registry::new()),
        Arc::new(Vfs::new()),
        CoreConfig::default(),
    );
    binding
        .init(&[BindingArgument::Device(backend)])
        .expect("dummy device attaches");
    binding
}
