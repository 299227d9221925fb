//! Conversions between host values and [`Value`].
//!
//! Boxing goes through `From`, unboxing through [`Unbox`], which checks the
//! tag before touching the payload and reports a mismatch instead of
//! reinterpreting it.
use core::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    FunctionRef, NativeHandle, ObjectRef, RopeString, Tag, Value, ValueError, canonicalize_nan,
};

/// Marker type for the host side of `undefined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Undefined;

// ── Boxing ─────────────────────────────────────────────────────────

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(canonicalize_nan(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Arc<str>> for Value {
    fn from(s: Arc<str>) -> Self {
        Value::String(s)
    }
}

impl From<RopeString> for Value {
    fn from(rope: RopeString) -> Self {
        Value::Rope(rope)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<FunctionRef> for Value {
    fn from(function: FunctionRef) -> Self {
        Value::Function(function)
    }
}

impl From<NativeHandle> for Value {
    fn from(handle: NativeHandle) -> Self {
        Value::Native(handle)
    }
}

impl From<Undefined> for Value {
    fn from(_: Undefined) -> Self {
        Value::Undefined
    }
}

/// `None` boxes as `null`.
impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::NULL, Into::into)
    }
}

// ── Unboxing ───────────────────────────────────────────────────────

/// Host types a value can be unboxed into.
pub trait Unbox: Sized {
    /// The tag a value must carry to unbox as `Self`.
    const TAG: Tag;

    fn unbox(value: &Value) -> Result<Self, ValueError>;
}

fn mismatch(expected: Tag, value: &Value) -> ValueError {
    ValueError::TypeMismatch {
        expected,
        found: value.tag(),
    }
}

macro_rules! unbox_variant {
    ($ty:ty, $tag:expr, $variant:ident($bind:ident) => $out:expr) => {
        impl Unbox for $ty {
            const TAG: Tag = $tag;

            fn unbox(value: &Value) -> Result<Self, ValueError> {
                match value {
                    Value::$variant($bind) => Ok($out),
                    other => Err(mismatch(Self::TAG, other)),
                }
            }
        }
    };
}

unbox_variant!(f64, Tag::Number, Number(n) => *n);
unbox_variant!(bool, Tag::Boolean, Boolean(b) => *b);
unbox_variant!(Arc<str>, Tag::String, String(s) => s.clone());
unbox_variant!(String, Tag::String, String(s) => s.to_string());
unbox_variant!(RopeString, Tag::RopeString, Rope(r) => r.clone());
unbox_variant!(ObjectRef, Tag::Object, Object(o) => o.clone());
unbox_variant!(FunctionRef, Tag::Function, Function(f) => f.clone());
unbox_variant!(NativeHandle, Tag::NativeHandle, Native(h) => h.clone());

impl Unbox for Undefined {
    const TAG: Tag = Tag::Undefined;

    fn unbox(value: &Value) -> Result<Self, ValueError> {
        match value {
            Value::Undefined => Ok(Undefined),
            other => Err(mismatch(Self::TAG, other)),
        }
    }
}

impl Value {
    /// Box any host value with a declared conversion.
    #[inline]
    pub fn boxed(value: impl Into<Value>) -> Self {
        value.into()
    }

    /// Extract `T`, failing with a type mismatch if the tag disagrees.
    #[inline]
    pub fn unbox<T: Unbox>(&self) -> Result<T, ValueError> {
        T::unbox(self)
    }

    /// The most natural host representation of this value, for host code
    /// that does not understand tags. Ropes are flattened.
    pub fn to_native_boxed(&self) -> NativeBoxed {
        match self {
            Value::Number(n) => NativeBoxed::Number(*n),
            Value::Boolean(b) => NativeBoxed::Boolean(*b),
            Value::String(s) => NativeBoxed::String(s.clone()),
            Value::Rope(rope) => NativeBoxed::String(rope.flatten()),
            Value::Undefined => NativeBoxed::Undefined,
            Value::Native(handle) if handle.is_null() => NativeBoxed::Null,
            Value::Native(handle) => NativeBoxed::Native(handle.clone()),
            Value::Object(object) => NativeBoxed::Object(object.clone()),
            Value::Function(function) => {
                NativeBoxed::Function(function.clone())
            }
        }
    }
}

/// A value as plain host data.
#[derive(Debug, Clone)]
pub enum NativeBoxed {
    Number(f64),
    Boolean(bool),
    String(Arc<str>),
    Undefined,
    Null,
    Native(NativeHandle),
    Object(ObjectRef),
    Function(FunctionRef),
}

impl NativeBoxed {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeBoxed::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NativeBoxed::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NativeBoxed::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<NativeBoxed> for Value {
    fn from(native: NativeBoxed) -> Self {
        match native {
            NativeBoxed::Number(n) => Value::from(n),
            NativeBoxed::Boolean(b) => Value::Boolean(b),
            NativeBoxed::String(s) => Value::String(s),
            NativeBoxed::Undefined => Value::Undefined,
            NativeBoxed::Null => Value::NULL,
            NativeBoxed::Native(handle) => Value::Native(handle),
            NativeBoxed::Object(object) => Value::Object(object),
            NativeBoxed::Function(function) => Value::Function(function),
        }
    }
}

impl PartialEq for NativeBoxed {
    fn eq(&self, other: &Self) -> bool {
        Value::from(self.clone()) == Value::from(other.clone())
    }
}

// ── Host objects of unknown type ───────────────────────────────────

/// A shared host object handed to the engine without a static type.
pub type HostAny = Arc<dyn Any + Send + Sync>;

pub type BoxFn = fn(&(dyn Any + Send + Sync)) -> Option<Value>;

/// Bespoke boxing conversions for host types, keyed by `TypeId`.
///
/// Built-in host types are tried first, then registered conversions; a
/// host object nobody claims is boxed as a native handle.
#[derive(Default)]
pub struct BoxingRegistry {
    conversions: HashMap<TypeId, BoxFn>,
}

impl BoxingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register how `T` should be boxed. A later registration for the same
    /// type replaces the earlier one.
    pub fn register<T: Any>(&mut self, convert: BoxFn) {
        self.conversions.insert(TypeId::of::<T>(), convert);
    }

    pub fn len(&self) -> usize {
        self.conversions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversions.is_empty()
    }

    /// Box a host object whose type is unknown here. An unclaimed object
    /// becomes a native handle named `"host"`.
    pub fn box_host(&self, host: HostAny) -> Value {
        self.box_host_named(host, "host")
    }

    /// Box a typed host object, naming a fallback handle after `T`.
    pub fn box_typed<T: Any + Send + Sync>(&self, host: Arc<T>) -> Value {
        self.box_host_named(host, type_name::<T>())
    }

    /// Like [`box_host`](Self::box_host), with the name a fallback native
    /// handle reports.
    pub fn box_host_named(&self, host: HostAny, type_name: &'static str) -> Value {
        if let Some(value) = box_builtin(&*host) {
            return value;
        }
        let type_id = (*host).type_id();
        if let Some(value) = self.conversions.get(&type_id).and_then(|convert| convert(&*host)) {
            return value;
        }
        log::trace!("boxing unclaimed {type_name} as native handle");
        Value::Native(NativeHandle::from_shared(host, type_name))
    }
}

fn box_builtin(host: &(dyn Any + Send + Sync)) -> Option<Value> {
    if let Some(n) = host.downcast_ref::<f64>() {
        return Some(Value::from(*n));
    }
    if let Some(n) = host.downcast_ref::<i32>() {
        return Some(Value::from(*n));
    }
    if let Some(b) = host.downcast_ref::<bool>() {
        return Some(Value::from(*b));
    }
    if let Some(s) = host.downcast_ref::<String>() {
        return Some(Value::from(s.as_str()));
    }
    if let Some(s) = host.downcast_ref::<&'static str>() {
        return Some(Value::from(*s));
    }
    if let Some(s) = host.downcast_ref::<Arc<str>>() {
        return Some(Value::from(s.clone()));
    }
    if let Some(rope) = host.downcast_ref::<RopeString>() {
        return Some(Value::from(rope.clone()));
    }
    if let Some(object) = host.downcast_ref::<ObjectRef>() {
        return Some(Value::from(object.clone()));
    }
    if let Some(function) = host.downcast_ref::<FunctionRef>() {
        return Some(Value::from(function.clone()));
    }
    if let Some(handle) = host.downcast_ref::<NativeHandle>() {
        return Some(Value::from(handle.clone()));
    }
    if host.is::<Undefined>() {
        return Some(Value::Undefined);
    }
    None
}
