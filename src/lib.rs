//! fxinject - shader effect binding and parameter linking
//!
//! Compiles externally authored effect files against a host's graphics device
//! and drives them from the host's render loop:
//!
//! - **Binding**: attaches to a device, compiles effects, creates parameters
//!   and textures, and enforces the effect/pass activation state machine
//! - **Effect / Technique / Pass**: the reflected program, with techniques
//!   filtered by hardware validation and passes carrying render targets
//! - **Parameter**: typed value cells with directed value propagation
//! - **Registry**: named parameters and textures shared across effects, filled
//!   automatically from effect annotations
//!
//! The native compiler and device sit behind [`backend::EffectBackend`]; the
//! `dummy` feature provides a reference implementation without a GPU.

pub mod backend;
pub mod config;
pub mod error;
pub mod framework;
pub mod fx;
pub mod registry;
pub mod vfs;

#[cfg(all(test, feature = "dummy"))]
mod test_support;

pub use config::CoreConfig;
pub use error::{FxError, FxResult};
pub use framework::Core;
pub use fx::{
    Binding, BindingArgument, Effect, Parameter, ParameterValue, Pass, PropertyKey,
    PropertyValue, Resource, ResourceKind, ResourceRef, Technique, Texture,
};
pub use registry::{ParameterQuery, Registry};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
