//! Named resources and their property bags.
//!
//! Every object in the effect graph has a name and a typed property bag.
//! Well-known keys are answered by the object itself and are read-only;
//! [`PropertyKey::Custom`] keys are stored in a map-backed [`PropertyBag`]
//! that hosts may use for ad hoc data.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{FxError, FxResult};

use super::{Effect, Parameter, Pass, Technique, Texture};

/// Key of a resource property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name,
    /// Parameter kind or texture dimensionality.
    Type,
    Width,
    Height,
    Depth,
    Format,
    MipLevels,
    /// Number of children (techniques of an effect, passes of a technique).
    Count,
    Custom(String),
}

impl PropertyKey {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }
}

/// Value of a resource property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    String(String),
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for PropertyValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Map-backed store for custom properties.
#[derive(Debug, Default)]
pub struct PropertyBag {
    entries: RwLock<HashMap<String, PropertyValue>>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<PropertyValue> {
        self.entries.read().get(name).cloned()
    }

    /// Store a value, returning the previous one.
    pub fn set(&self, name: impl Into<String>, value: PropertyValue) -> Option<PropertyValue> {
        self.entries.write().insert(name.into(), value)
    }

    pub fn remove(&self, name: &str) -> Option<PropertyValue> {
        self.entries.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Kind of a resource in the effect graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Parameter,
    Texture,
    Effect,
    Technique,
    Pass,
}

/// Capabilities shared by every named resource.
pub trait Resource {
    fn name(&self) -> &str;

    fn kind(&self) -> ResourceKind;

    /// Store for custom properties.
    fn properties(&self) -> &PropertyBag;

    /// Answer a well-known key. Returns `None` for keys this resource does not know.
    fn builtin_property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        match key {
            PropertyKey::Name => Some(PropertyValue::String(self.name().to_string())),
            _ => None,
        }
    }

    fn property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        match key {
            PropertyKey::Custom(name) => self.properties().get(name),
            builtin => self.builtin_property(builtin),
        }
    }

    /// Set a custom property. Well-known keys are read-only.
    fn set_property(&self, key: PropertyKey, value: PropertyValue) -> FxResult<()> {
        match key {
            PropertyKey::Custom(name) => {
                self.properties().set(name, value);
                Ok(())
            }
            builtin => Err(FxError::InvalidCall(format!(
                "property {builtin:?} of '{}' is read-only",
                self.name()
            ))),
        }
    }
}

/// Any resource of the effect graph.
#[derive(Debug, Clone)]
pub enum ResourceRef {
    Parameter(Arc<Parameter>),
    Texture(Arc<Texture>),
    Effect(Arc<Effect>),
    Technique(Arc<Technique>),
    Pass(Arc<Pass>),
}

impl ResourceRef {
    pub fn as_resource(&self) -> &dyn Resource {
        match self {
            Self::Parameter(p) => p.as_ref(),
            Self::Texture(t) => t.as_ref(),
            Self::Effect(e) => e.as_ref(),
            Self::Technique(t) => t.as_ref(),
            Self::Pass(p) => p.as_ref(),
        }
    }

    pub fn name(&self) -> &str {
        self.as_resource().name()
    }

    pub fn kind(&self) -> ResourceKind {
        self.as_resource().kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain {
        properties: PropertyBag,
    }

    impl Resource for Plain {
        fn name(&self) -> &str {
            "plain"
        }

        fn kind(&self) -> ResourceKind {
            ResourceKind::Texture
        }

        fn properties(&self) -> &PropertyBag {
            &self.properties
        }
    }

    #[test]
    fn test_custom_properties() {
        let plain = Plain {
            properties: PropertyBag::new(),
        };
        assert!(plain.property(&PropertyKey::custom("scale")).is_none());

        plain
            .set_property(PropertyKey::custom("scale"), 2.0f32.into())
            .unwrap();
        assert_eq!(
            plain.property(&PropertyKey::custom("scale")),
            Some(PropertyValue::Float(2.0))
        );
        assert_eq!(plain.properties().len(), 1);
    }

    #[test]
    fn test_builtin_keys_are_read_only() {
        let plain = Plain {
            properties: PropertyBag::new(),
        };
        assert_eq!(
            plain.property(&PropertyKey::Name),
            Some(PropertyValue::String("plain".to_string()))
        );
        assert!(matches!(
            plain.set_property(PropertyKey::Name, "other".into()),
            Err(FxError::InvalidCall(_))
        ));
        assert!(plain.property(&PropertyKey::Width).is_none());
    }

    #[test]
    fn test_bag_remove() {
        let bag = PropertyBag::new();
        assert!(bag.is_empty());
        bag.set("a", true.into());
        assert_eq!(bag.set("a", false.into()), Some(PropertyValue::Bool(true)));
        assert_eq!(bag.remove("a"), Some(PropertyValue::Bool(false)));
        assert!(bag.is_empty());
    }
}
