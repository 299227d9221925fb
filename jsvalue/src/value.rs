//! Value: the engine's universal dynamic value.
//!
//! In memory a value is a checked sum type; the only way to reach a payload
//! is through a match or a tag-checked accessor, so a value can never be
//! read through the wrong field. The single-word NaN-boxed form lives in
//! [`crate::word`] and is produced from and decoded into this type.
use core::fmt;
use std::sync::Arc;

use crate::{
    ArrayRecord, FunctionRef, NativeHandle, ObjectRef, RegExpRecord, RopeString, Tag,
    number_to_string,
};

/// A tagged value.
///
/// `Number` may hold any `f64`. NaN payloads are canonicalised when a
/// value is packed into a [`Word`](crate::Word), which is the only place a
/// stray NaN could be confused with a reserved marker.
#[derive(Clone, Default)]
pub enum Value {
    Number(f64),
    Boolean(bool),
    String(Arc<str>),
    Rope(RopeString),
    #[default]
    Undefined,
    /// Host-native handle. A null payload is ECMAScript `null`.
    Native(NativeHandle),
    Object(ObjectRef),
    Function(FunctionRef),
}

impl Value {
    pub const NULL: Value = Value::Native(NativeHandle::null());
    pub const TRUE: Value = Value::Boolean(true);
    pub const FALSE: Value = Value::Boolean(false);

    #[inline]
    pub const fn tag(&self) -> Tag {
        match self {
            Value::Number(_) => Tag::Number,
            Value::Boolean(_) => Tag::Boolean,
            Value::String(_) => Tag::String,
            Value::Rope(_) => Tag::RopeString,
            Value::Undefined => Tag::Undefined,
            Value::Native(_) => Tag::NativeHandle,
            Value::Object(_) => Tag::Object,
            Value::Function(_) => Tag::Function,
        }
    }

    // ── Predicates ─────────────────────────────────────────────────

    #[inline(always)]
    pub const fn is_number(&self) -> bool {
        matches!(self, Value::Number(_))
    }

    /// True for every kind carried as a (tag, reference) pair, i.e. neither
    /// a number nor one of the two boolean patterns.
    #[inline(always)]
    pub const fn is_tagged(&self) -> bool {
        self.tag().is_reference()
    }

    #[inline(always)]
    pub const fn is_boolean(&self) -> bool {
        matches!(self, Value::Boolean(_))
    }

    /// Strings in either flat or rope form.
    #[inline(always)]
    pub const fn is_string(&self) -> bool {
        matches!(self, Value::String(_) | Value::Rope(_))
    }

    #[inline(always)]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Includes `null`, which is a native handle with no payload.
    #[inline(always)]
    pub const fn is_native_handle(&self) -> bool {
        matches!(self, Value::Native(_))
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Native(handle) if handle.is_null())
    }

    /// Objects and functions alike.
    #[inline(always)]
    pub const fn is_object(&self) -> bool {
        self.tag().is_object()
    }

    /// An object that is not callable.
    #[inline(always)]
    pub const fn is_strictly_object(&self) -> bool {
        self.is_object() && !self.is_function()
    }

    #[inline(always)]
    pub const fn is_function(&self) -> bool {
        self.tag().is_function()
    }

    /// Needs a type check on the referenced object.
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Object(object) if object.is::<ArrayRecord>())
    }

    /// Needs a type check on the referenced object.
    pub fn is_regexp(&self) -> bool {
        matches!(self, Value::Object(object) if object.is::<RegExpRecord>())
    }

    /// ECMA-262 §8.6.2: undefined, null, booleans, strings and numbers.
    /// A native handle with a payload is a host object, not a primitive.
    pub fn is_primitive(&self) -> bool {
        match self {
            Value::Number(_)
            | Value::Boolean(_)
            | Value::String(_)
            | Value::Rope(_)
            | Value::Undefined => true,
            Value::Native(handle) => handle.is_null(),
            Value::Object(_) | Value::Function(_) => false,
        }
    }

    // ── Language-level helpers ─────────────────────────────────────

    /// Result of the `typeof` operator.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::String(_) | Value::Rope(_) => "string",
            Value::Undefined => "undefined",
            Value::Native(_) | Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// The `===` operator. Strings compare by contents regardless of rope
    /// form, references by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Native(a), Value::Native(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => {
                Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
            }
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (a, b) if a.is_string() && b.is_string() => {
                a.as_string() == b.as_string()
            }
            _ => false,
        }
    }

    /// Contents of a flat or rope string. Flattens (and caches) ropes.
    pub fn as_string(&self) -> Option<Arc<str>> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Rope(rope) => Some(rope.flatten()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n:?})"),
            Value::Boolean(b) => write!(f, "Boolean({b})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Rope(rope) => write!(f, "Rope({:?})", rope.flatten()),
            Value::Undefined => f.write_str("Undefined"),
            Value::Native(handle) => write!(f, "{handle:?}"),
            Value::Object(object) => write!(f, "Object({object:?})"),
            Value::Function(function) => {
                write!(f, "Function({})", function.name())
            }
        }
    }
}

/// ECMAScript `ToString` for primitives; references render as their
/// `[object Class]` form.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&number_to_string(*n)),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::String(s) => f.write_str(s),
            Value::Rope(rope) => write!(f, "{rope}"),
            Value::Undefined => f.write_str("undefined"),
            Value::Native(handle) if handle.is_null() => f.write_str("null"),
            Value::Native(handle) => {
                write!(f, "[native {}]", handle.type_name())
            }
            Value::Object(object) => {
                write!(f, "[object {}]", object.class_name())
            }
            Value::Function(function) => {
                write!(f, "function {}() {{ [native code] }}", function.name())
            }
        }
    }
}
