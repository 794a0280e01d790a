//! Typed parameter cells and attachment-based value propagation.

use std::sync::{Arc, Weak};

use glam::Vec4;
use parking_lot::{Mutex, RwLock};

use crate::backend::{NativeHandle, NativeValue, ParameterDesc, ParameterKind};
use crate::error::{FxError, FxResult};

use super::resource::{PropertyBag, PropertyKey, PropertyValue, Resource, ResourceKind};
use super::{Effect, Texture};

/// Value held by a [`Parameter`].
#[derive(Debug, Clone)]
pub enum ParameterValue {
    Bool(bool),
    /// Up to four float components; unused components are zero.
    Float(Vec4),
    Int(i32),
    String(String),
    Texture(Option<Arc<Texture>>),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Self::Bool(_) => ParameterKind::Bool,
            Self::Float(_) => ParameterKind::Float,
            Self::Int(_) => ParameterKind::Int,
            Self::String(_) => ParameterKind::String,
            Self::Texture(_) => ParameterKind::Texture,
        }
    }

    /// Zeroed or empty value of the given kind.
    pub fn zeroed(kind: ParameterKind) -> Self {
        match kind {
            ParameterKind::Bool => Self::Bool(false),
            ParameterKind::Float => Self::Float(Vec4::ZERO),
            ParameterKind::Int => Self::Int(0),
            ParameterKind::String => Self::String(String::new()),
            ParameterKind::Texture => Self::Texture(None),
        }
    }

    pub(crate) fn to_native(&self) -> NativeValue {
        match self {
            Self::Bool(v) => NativeValue::Bool(*v),
            Self::Float(v) => NativeValue::Float(*v),
            Self::Int(v) => NativeValue::Int(*v),
            Self::String(v) => NativeValue::String(v.clone()),
            Self::Texture(t) => NativeValue::Texture(t.as_ref().and_then(|t| t.native_handle())),
        }
    }

    /// Convert a reflected value. Native texture handles cannot be mapped back
    /// to a managed texture and come back empty.
    pub(crate) fn from_native(value: NativeValue) -> Self {
        match value {
            NativeValue::Bool(v) => Self::Bool(v),
            NativeValue::Float(v) => Self::Float(v),
            NativeValue::Int(v) => Self::Int(v),
            NativeValue::String(v) => Self::String(v),
            NativeValue::Texture(_) => Self::Texture(None),
        }
    }
}

impl PartialEq for ParameterValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Texture(a), Self::Texture(b)) => match (a, b) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            _ => false,
        }
    }
}

/// Slot of a hardware-backed parameter inside its compiled effect.
#[derive(Debug)]
struct NativeSlot {
    effect: Weak<Effect>,
    handle: NativeHandle,
}

/// A named, typed value cell.
///
/// Hardware-backed parameters mirror a slot of a compiled [`Effect`]; virtual
/// parameters exist only in the registry. Setting a value stores it, pushes it
/// to every attached child in attachment order and, for hardware-backed
/// parameters, writes it into the native slot.
pub struct Parameter {
    name: String,
    desc: ParameterDesc,
    slot: Option<NativeSlot>,
    value: RwLock<ParameterValue>,
    attached: Mutex<Vec<Weak<Parameter>>>,
    link_source: Mutex<Option<Weak<Parameter>>>,
    properties: PropertyBag,
}

impl Parameter {
    pub(crate) fn new_virtual(name: String, desc: ParameterDesc) -> Self {
        Self {
            name,
            desc,
            slot: None,
            value: RwLock::new(ParameterValue::zeroed(desc.kind)),
            attached: Mutex::new(Vec::new()),
            link_source: Mutex::new(None),
            properties: PropertyBag::new(),
        }
    }

    /// Wrap a reflected effect parameter.
    pub(crate) fn new_native(
        effect: Weak<Effect>,
        handle: NativeHandle,
        name: String,
        desc: ParameterDesc,
        initial: NativeValue,
    ) -> Self {
        let initial = if initial.kind() == desc.kind {
            ParameterValue::from_native(initial)
        } else {
            ParameterValue::zeroed(desc.kind)
        };
        Self {
            name,
            desc,
            slot: Some(NativeSlot { effect, handle }),
            value: RwLock::new(initial),
            attached: Mutex::new(Vec::new()),
            link_source: Mutex::new(None),
            properties: PropertyBag::new(),
        }
    }

    pub fn desc(&self) -> ParameterDesc {
        self.desc
    }

    pub fn value_kind(&self) -> ParameterKind {
        self.desc.kind
    }

    /// Whether this parameter mirrors a slot inside a compiled effect.
    pub fn is_hardware_backed(&self) -> bool {
        self.slot.is_some()
    }

    pub(crate) fn native_handle(&self) -> Option<NativeHandle> {
        self.slot.as_ref().map(|slot| slot.handle)
    }

    /// The effect owning this parameter's native slot.
    pub fn effect(&self) -> Option<Arc<Effect>> {
        self.slot.as_ref().and_then(|slot| slot.effect.upgrade())
    }

    /// Snapshot of the cached value.
    pub fn value(&self) -> ParameterValue {
        self.value.read().clone()
    }

    /// Store `value`, propagate it to attached children and write it into
    /// the native slot.
    ///
    /// Fails with [`FxError::InvalidParams`] and no side effects when the
    /// value kind differs from the declared kind. Failures of children are
    /// logged and do not fail the call.
    pub fn set(&self, value: ParameterValue) -> FxResult<()> {
        self.check_kind(value.kind())?;

        *self.value.write() = value.clone();

        for child in self.attached() {
            if let Err(err) = child.set(value.clone()) {
                log::warn!(
                    "Parameter '{}': propagation to '{}' failed: {}",
                    self.name,
                    child.name,
                    err
                );
            }
        }

        self.write_native(&value)
    }

    pub fn set_bool(&self, value: bool) -> FxResult<()> {
        self.set(ParameterValue::Bool(value))
    }

    pub fn get_bool(&self) -> FxResult<bool> {
        match self.checked_value(ParameterKind::Bool)? {
            ParameterValue::Bool(v) => Ok(v),
            _ => Err(self.kind_error(ParameterKind::Bool)),
        }
    }

    /// Set a scalar float; the remaining components are zeroed.
    pub fn set_float(&self, value: f32) -> FxResult<()> {
        self.set(ParameterValue::Float(Vec4::new(value, 0.0, 0.0, 0.0)))
    }

    pub fn get_float(&self) -> FxResult<f32> {
        self.get_vector().map(|v| v.x)
    }

    pub fn set_vector(&self, value: Vec4) -> FxResult<()> {
        self.set(ParameterValue::Float(value))
    }

    pub fn get_vector(&self) -> FxResult<Vec4> {
        match self.checked_value(ParameterKind::Float)? {
            ParameterValue::Float(v) => Ok(v),
            _ => Err(self.kind_error(ParameterKind::Float)),
        }
    }

    pub fn set_int(&self, value: i32) -> FxResult<()> {
        self.set(ParameterValue::Int(value))
    }

    pub fn get_int(&self) -> FxResult<i32> {
        match self.checked_value(ParameterKind::Int)? {
            ParameterValue::Int(v) => Ok(v),
            _ => Err(self.kind_error(ParameterKind::Int)),
        }
    }

    pub fn set_string(&self, value: impl Into<String>) -> FxResult<()> {
        self.set(ParameterValue::String(value.into()))
    }

    pub fn get_string(&self) -> FxResult<String> {
        match self.checked_value(ParameterKind::String)? {
            ParameterValue::String(v) => Ok(v),
            _ => Err(self.kind_error(ParameterKind::String)),
        }
    }

    pub fn set_texture(&self, texture: Option<Arc<Texture>>) -> FxResult<()> {
        self.set(ParameterValue::Texture(texture))
    }

    pub fn get_texture(&self) -> FxResult<Option<Arc<Texture>>> {
        match self.checked_value(ParameterKind::Texture)? {
            ParameterValue::Texture(v) => Ok(v),
            _ => Err(self.kind_error(ParameterKind::Texture)),
        }
    }

    /// Read the value currently stored in the native slot.
    pub fn read_native(&self) -> FxResult<NativeValue> {
        let slot = self.slot.as_ref().ok_or_else(|| {
            FxError::InvalidCall(format!("parameter '{}' is not hardware-backed", self.name))
        })?;
        let effect = slot.effect.upgrade().ok_or_else(|| {
            FxError::InvalidCall(format!("effect of parameter '{}' was dropped", self.name))
        })?;
        effect.read_native(slot.handle)
    }

    /// Attach `child` so that every value set on this parameter is forwarded
    /// to it.
    ///
    /// Rejects self-attachment, duplicates, kind mismatches and attachments
    /// that would close a cycle.
    ///
    /// The child is held weakly: attaching does not keep it alive. Once the
    /// last strong reference elsewhere is dropped, the child silently stops
    /// receiving values and is pruned from [`Parameter::attached`]. Keep an
    /// `Arc` to host-created children for as long as they should follow this
    /// parameter.
    pub fn attach(&self, child: &Arc<Parameter>) -> FxResult<()> {
        if std::ptr::eq(self, child.as_ref()) {
            return Err(FxError::InvalidParams(format!(
                "parameter '{}' cannot be attached to itself",
                self.name
            )));
        }
        if child.desc.kind != self.desc.kind {
            return Err(FxError::InvalidParams(format!(
                "cannot attach {} parameter '{}' to {} parameter '{}'",
                child.desc.kind.name(),
                child.name,
                self.desc.kind.name(),
                self.name
            )));
        }
        if child.reaches(self) {
            return Err(FxError::InvalidParams(format!(
                "attaching '{}' to '{}' would create a cycle",
                child.name, self.name
            )));
        }

        let mut attached = self.attached.lock();
        if attached
            .iter()
            .any(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(child)))
        {
            return Err(FxError::InvalidParams(format!(
                "'{}' is already attached to '{}'",
                child.name, self.name
            )));
        }
        attached.push(Arc::downgrade(child));

        log::trace!("Parameter '{}': attached '{}'", self.name, child.name);
        Ok(())
    }

    /// Remove a previously attached child.
    pub fn detach(&self, child: &Parameter) -> FxResult<()> {
        let mut attached = self.attached.lock();
        let position = attached
            .iter()
            .position(|weak| std::ptr::eq(weak.as_ptr(), child))
            .ok_or_else(|| {
                FxError::NotFound(format!(
                    "'{}' is not attached to '{}'",
                    child.name, self.name
                ))
            })?;
        attached.remove(position);

        log::trace!("Parameter '{}': detached '{}'", self.name, child.name);
        Ok(())
    }

    /// Live attached children in attachment order. Dead entries are pruned.
    pub fn attached(&self) -> Vec<Arc<Parameter>> {
        let mut attached = self.attached.lock();
        attached.retain(|weak| weak.strong_count() > 0);
        attached.iter().filter_map(Weak::upgrade).collect()
    }

    /// The global this parameter was linked to through a `source` annotation.
    pub fn link_source(&self) -> Option<Arc<Parameter>> {
        self.link_source.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn set_link_source(&self, source: &Arc<Parameter>) {
        *self.link_source.lock() = Some(Arc::downgrade(source));
    }

    pub(crate) fn take_link_source(&self) -> Option<Arc<Parameter>> {
        self.link_source.lock().take().and_then(|weak| weak.upgrade())
    }

    /// Whether `target` is reachable from this parameter through attachments.
    fn reaches(&self, target: &Parameter) -> bool {
        let mut stack = self.attached();
        let mut visited: Vec<*const Parameter> = Vec::new();
        while let Some(node) = stack.pop() {
            if std::ptr::eq(node.as_ref(), target) {
                return true;
            }
            let ptr = Arc::as_ptr(&node);
            if visited.contains(&ptr) {
                continue;
            }
            visited.push(ptr);
            stack.extend(node.attached());
        }
        false
    }

    fn check_kind(&self, kind: ParameterKind) -> FxResult<()> {
        if kind == self.desc.kind {
            Ok(())
        } else {
            Err(self.kind_error(kind))
        }
    }

    fn checked_value(&self, kind: ParameterKind) -> FxResult<ParameterValue> {
        self.check_kind(kind)?;
        Ok(self.value())
    }

    fn kind_error(&self, requested: ParameterKind) -> FxError {
        FxError::InvalidParams(format!(
            "parameter '{}' holds {} values, not {}",
            self.name,
            self.desc.kind.name(),
            requested.name()
        ))
    }

    fn write_native(&self, value: &ParameterValue) -> FxResult<()> {
        let Some(slot) = &self.slot else {
            return Ok(());
        };
        // The cached value stays authoritative once the effect is gone.
        let Some(effect) = slot.effect.upgrade() else {
            return Ok(());
        };
        effect.write_native(slot.handle, &value.to_native())
    }
}

impl Resource for Parameter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Parameter
    }

    fn properties(&self) -> &PropertyBag {
        &self.properties
    }

    fn builtin_property(&self, key: &PropertyKey) -> Option<PropertyValue> {
        match key {
            PropertyKey::Name => Some(PropertyValue::String(self.name.clone())),
            PropertyKey::Type => Some(PropertyValue::from(self.desc.kind.name())),
            PropertyKey::Width => Some(PropertyValue::Int(self.desc.columns as i64)),
            PropertyKey::Height => Some(PropertyValue::Int(self.desc.rows as i64)),
            PropertyKey::Count => Some(PropertyValue::Int(self.desc.elements as i64)),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("desc", &self.desc)
            .field("hardware_backed", &self.slot.is_some())
            .field("attached", &self.attached.lock().len())
            .finish()
    }
}

static_assertions::assert_impl_all!(Parameter: Send, Sync);
