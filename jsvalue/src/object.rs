//! Object-model seam.
//!
//! The real property tables, prototype chains and array storage belong to
//! the object model. This module only fixes what the value layer needs from
//! it: named property access for scope resolution and a concrete type that
//! `is_array`/`is_regexp` can recognise by downcasting.
use core::any::Any;
use core::fmt;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::Value;

/// An object reachable from a [`Value`].
pub trait HostObject: Any + Send + Sync {
    /// Own property lookup, no prototype walk.
    fn get(&self, name: &str) -> Option<Value>;

    fn put(&self, name: &str, value: Value);

    fn has_property(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The `[[Class]]` name used by diagnostics.
    fn class_name(&self) -> &'static str {
        "Object"
    }

    fn as_any(&self) -> &dyn Any;
}

/// Shared, non-owning view of an object from a value's point of view.
pub type ObjectRef = Arc<dyn HostObject>;

impl dyn HostObject {
    pub fn is<T: HostObject>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for dyn HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[object {}]", self.class_name())
    }
}

/// Property table shared by the concrete records below.
#[derive(Default)]
pub struct PropertyTable(RwLock<HashMap<String, Value>>);

impl PropertyTable {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.0.read().get(name).cloned()
    }

    pub fn put(&self, name: &str, value: Value) {
        self.0.write().insert(name.to_owned(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Plain objects ──────────────────────────────────────────────────

#[derive(Default)]
pub struct PlainObject {
    properties: PropertyTable,
}

impl PlainObject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> ObjectRef {
        Arc::new(Self::new())
    }

    pub fn with_properties<'a>(
        properties: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> ObjectRef {
        let object = Self::new();
        for (name, value) in properties {
            object.properties.put(name, value);
        }
        Arc::new(object)
    }
}

impl HostObject for PlainObject {
    fn get(&self, name: &str) -> Option<Value> {
        self.properties.get(name)
    }

    fn put(&self, name: &str, value: Value) {
        self.properties.put(name, value);
    }

    fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Arrays ─────────────────────────────────────────────────────────

/// Largest gap a write may open past the dense elements before the value
/// goes to sparse storage instead.
const MAX_DENSE_GAP: usize = 1024;

#[derive(Default)]
struct Elements {
    dense: Vec<Value>,
    sparse: BTreeMap<u32, Value>,
}

impl Elements {
    fn len(&self) -> usize {
        let sparse = self.sparse.last_key_value().map_or(0, |(index, _)| *index as usize + 1);
        self.dense.len().max(sparse)
    }

    fn set(&mut self, index: u32, value: Value) {
        let slot = index as usize;
        if let Some(element) = self.dense.get_mut(slot) {
            *element = value;
        } else if self.sparse.is_empty() && slot - self.dense.len() <= MAX_DENSE_GAP {
            self.dense.resize(slot, Value::Undefined);
            self.dense.push(value);
        } else {
            self.sparse.insert(index, value);
        }
    }
}

#[derive(Default)]
pub struct ArrayRecord {
    elements: RwLock<Elements>,
    properties: PropertyTable,
}

impl ArrayRecord {
    pub fn from_elements(elements: Vec<Value>) -> Self {
        Self {
            elements: RwLock::new(Elements {
                dense: elements,
                sparse: BTreeMap::new(),
            }),
            properties: PropertyTable::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Holes below the length read as `undefined`.
    pub fn element(&self, index: usize) -> Option<Value> {
        let elements = self.elements.read();
        if let Some(value) = elements.dense.get(index) {
            return Some(value.clone());
        }
        if index >= elements.len() {
            return None;
        }
        let value = u32::try_from(index).ok().and_then(|index| elements.sparse.get(&index));
        Some(value.cloned().unwrap_or_default())
    }

    pub fn push(&self, value: Value) {
        let mut elements = self.elements.write();
        match u32::try_from(elements.len()) {
            Ok(index) if index < u32::MAX => elements.set(index, value),
            _ => log::warn!("array length limit reached, dropping pushed value"),
        }
    }
}

/// Canonical decimal array index: below `u32::MAX`, no leading zeros.
/// Anything else is an ordinary property name.
fn array_index(name: &str) -> Option<u32> {
    if name.len() > 1 && name.starts_with('0') {
        return None;
    }
    if !name.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    name.parse().ok().filter(|index| *index < u32::MAX)
}

impl HostObject for ArrayRecord {
    fn get(&self, name: &str) -> Option<Value> {
        if name == "length" {
            return Some(Value::from(self.len() as f64));
        }
        match array_index(name) {
            Some(index) => self.element(index as usize),
            None => self.properties.get(name),
        }
    }

    fn put(&self, name: &str, value: Value) {
        match array_index(name) {
            Some(index) => self.elements.write().set(index, value),
            None => self.properties.put(name, value),
        }
    }

    fn class_name(&self) -> &'static str {
        "Array"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// ── Regular expressions ────────────────────────────────────────────

/// Compiled pattern text; matching lives in the object model.
pub struct RegExpRecord {
    source: String,
    flags: String,
    properties: PropertyTable,
}

impl RegExpRecord {
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
            properties: PropertyTable::default(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }
}

impl HostObject for RegExpRecord {
    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "source" => Some(Value::from(self.source.as_str())),
            "global" => Some(Value::from(self.flags.contains('g'))),
            "ignoreCase" => Some(Value::from(self.flags.contains('i'))),
            "multiline" => Some(Value::from(self.flags.contains('m'))),
            _ => self.properties.get(name),
        }
    }

    fn put(&self, name: &str, value: Value) {
        self.properties.put(name, value);
    }

    fn class_name(&self) -> &'static str {
        "RegExp"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
