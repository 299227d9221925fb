use crate::{Value, ValueError};

/// Root table for reference payloads of packed words.
///
/// A [`Word`](crate::Word) stores an index instead of a pointer, and this
/// table holds the referenced value for as long as the words built against
/// it are in use. Dropping or clearing the table releases every payload at
/// once, the way an activation's roots are released when it is discarded.
#[derive(Debug, Default)]
pub struct HandleTable {
    slots: Vec<Value>,
}

impl HandleTable {
    /// Largest number of handles a table can hold. `u32::MAX` itself is
    /// never handed out.
    pub const CAPACITY: usize = u32::MAX as usize;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
        }
    }

    /// Register `value` and return its handle index.
    pub fn root(&mut self, value: Value) -> Result<u32, ValueError> {
        let index = self.slots.len();
        if index >= Self::CAPACITY {
            return Err(ValueError::PayloadOverflow);
        }
        self.slots.push(value);
        u32::try_from(index).map_err(|_| ValueError::PayloadOverflow)
    }

    pub fn get(&self, index: u32) -> Result<&Value, ValueError> {
        self.slots
            .get(index as usize)
            .ok_or(ValueError::StaleHandle(index))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Release every rooted payload. Words packed against this table
    /// become stale.
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.slots.iter()
    }
}
