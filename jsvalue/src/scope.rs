use core::mem;
use std::sync::Arc;

use crate::{ObjectRef, Value};

/// One `with`/eval scope: the object consulted for free variables and the
/// static depth it was entered at.
#[derive(Debug)]
struct ScopeNode {
    depth: usize,
    object: ObjectRef,
    rest: ScopeChain,
    len: usize,
}

/// Persistent list of scope objects, nearest first.
///
/// Entering a scope prepends and leaves the existing chain untouched, so a
/// chain can be handed to nested code and still be used by its owner.
#[derive(Debug, Clone, Default)]
pub struct ScopeChain(Option<Arc<ScopeNode>>);

impl ScopeChain {
    pub const fn empty() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn prepend(&self, depth: usize, object: ObjectRef) -> Self {
        let len = self.len() + 1;
        Self(Some(Arc::new(ScopeNode {
            depth,
            object,
            rest: self.clone(),
            len,
        })))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.as_ref().map_or(0, |node| node.len)
    }

    pub fn head(&self) -> Option<(usize, &ObjectRef)> {
        self.0.as_ref().map(|node| (node.depth, &node.object))
    }

    pub fn iter(&self) -> ScopeIter<'_> {
        ScopeIter {
            current: self.0.as_deref(),
        }
    }

    /// Walk front to back and return the first binding of `name`, along
    /// with the depth of the scope that supplied it.
    pub fn resolve(&self, name: &str) -> Option<(usize, Value)> {
        self.iter().find_map(|(depth, object)| {
            object.get(name).map(|value| (depth, value))
        })
    }
}

pub struct ScopeIter<'a> {
    current: Option<&'a ScopeNode>,
}

impl<'a> Iterator for ScopeIter<'a> {
    type Item = (usize, &'a ObjectRef);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.current?;
        self.current = node.rest.0.as_deref();
        Some((node.depth, &node.object))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.current.map_or(0, |node| node.len);
        (len, Some(len))
    }
}

impl ExactSizeIterator for ScopeIter<'_> {}

impl Drop for ScopeNode {
    fn drop(&mut self) {
        let mut rest = mem::take(&mut self.rest.0);
        while let Some(node) = rest {
            match Arc::try_unwrap(node) {
                Ok(mut node) => rest = mem::take(&mut node.rest.0),
                Err(_) => break,
            }
        }
    }
}
