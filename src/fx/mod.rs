//! The effect object model.
//!
//! A [`Binding`] compiles [`Effect`]s; an effect owns its [`Parameter`]s and
//! [`Technique`]s, a technique owns its [`Pass`]es. Back references (pass to
//! technique, technique to effect, parameter to effect) are weak.
//! [`Texture`]s are shared between effects through the registry.

mod binding;
mod effect;
pub mod link;
mod parameter;
mod pass;
mod resource;
mod technique;
mod texture;

pub use binding::{Binding, BindingArgument};
pub use effect::Effect;
pub use parameter::{Parameter, ParameterValue};
pub use pass::Pass;
pub use resource::{PropertyBag, PropertyKey, PropertyValue, Resource, ResourceKind, ResourceRef};
pub use technique::Technique;
pub use texture::Texture;
