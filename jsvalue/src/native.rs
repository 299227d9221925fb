use core::any::{Any, type_name};
use core::fmt;
use std::sync::Arc;

/// Opaque handle to a host-native object.
///
/// An absent payload is how the engine spells ECMAScript `null`: a native
/// handle pointing at nothing. It shares the native-handle tag but stays
/// distinct from `undefined`, which has its own tag.
#[derive(Clone)]
pub struct NativeHandle {
    payload: Option<Arc<dyn Any + Send + Sync>>,
    type_name: &'static str,
}

impl NativeHandle {
    pub const fn null() -> Self {
        Self {
            payload: None,
            type_name: "null",
        }
    }

    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            payload: Some(Arc::new(value)),
            type_name: type_name::<T>(),
        }
    }

    /// Wrap an already shared host object without copying it.
    pub fn from_shared(payload: Arc<dyn Any + Send + Sync>, type_name: &'static str) -> Self {
        Self {
            payload: Some(payload),
            type_name,
        }
    }

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        self.payload.is_none()
    }

    /// Rust type name of the payload, `"null"` when absent.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn payload(&self) -> Option<&Arc<dyn Any + Send + Sync>> {
        self.payload.as_ref()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    /// Identity comparison: two handles are equal when both are null or
    /// both point at the same host allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.payload, &other.payload) {
            (None, None) => true,
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Default for NativeHandle {
    fn default() -> Self {
        Self::null()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            None => f.write_str("Null"),
            Some(ptr) => write!(
                f,
                "Native({} @ {:p})",
                self.type_name,
                Arc::as_ptr(ptr) as *const ()
            ),
        }
    }
}
