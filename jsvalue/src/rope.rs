use core::{fmt, mem};
use std::sync::{Arc, OnceLock};

/// A lazily concatenated string.
///
/// Concatenation only allocates a node; the characters are copied the first
/// time the rope is flattened and the result is cached on that node.
#[derive(Clone)]
pub struct RopeString(Arc<RopeNode>);

enum RopeNode {
    Leaf(Arc<str>),
    Concat {
        left: RopeString,
        right: RopeString,
        len: usize,
        depth: usize,
        flat: OnceLock<Arc<str>>,
    },
}

static EMPTY: OnceLock<RopeString> = OnceLock::new();

impl RopeString {
    pub fn empty() -> Self {
        EMPTY.get_or_init(|| Self::leaf("")).clone()
    }

    pub fn leaf(s: impl Into<Arc<str>>) -> Self {
        Self(Arc::new(RopeNode::Leaf(s.into())))
    }

    pub fn concat(left: RopeString, right: RopeString) -> Self {
        let len = left.len() + right.len();
        let depth = left.depth().max(right.depth()) + 1;
        Self(Arc::new(RopeNode::Concat {
            left,
            right,
            len,
            depth,
            flat: OnceLock::new(),
        }))
    }

    /// Byte length of the flattened string.
    #[inline]
    pub fn len(&self) -> usize {
        match &*self.0 {
            RopeNode::Leaf(s) => s.len(),
            RopeNode::Concat { len, .. } => *len,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn depth(&self) -> usize {
        match &*self.0 {
            RopeNode::Leaf(_) => 0,
            RopeNode::Concat { depth, .. } => *depth,
        }
    }

    pub fn is_flat(&self) -> bool {
        match &*self.0 {
            RopeNode::Leaf(_) => true,
            RopeNode::Concat { flat, .. } => flat.get().is_some(),
        }
    }

    /// Materialize the rope. The walk is iterative, deep ropes built by
    /// repeated `+=` must not exhaust the native stack.
    pub fn flatten(&self) -> Arc<str> {
        let (left, right, flat) = match &*self.0 {
            RopeNode::Leaf(s) => return s.clone(),
            RopeNode::Concat {
                left, right, flat, ..
            } => (left, right, flat),
        };

        flat.get_or_init(|| {
            let mut out = String::with_capacity(self.len());
            let mut pending: Vec<&RopeString> = vec![right, left];
            while let Some(rope) = pending.pop() {
                match &*rope.0 {
                    RopeNode::Leaf(s) => out.push_str(s),
                    RopeNode::Concat {
                        left, right, flat, ..
                    } => match flat.get() {
                        Some(s) => out.push_str(s),
                        None => {
                            pending.push(right);
                            pending.push(left);
                        }
                    },
                }
            }
            out.into()
        })
        .clone()
    }

    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

// Dropping a deep rope recursively would overflow the stack, so children
// are detached and released from a worklist instead.
impl Drop for RopeNode {
    fn drop(&mut self) {
        let RopeNode::Concat { left, right, .. } = self else {
            return;
        };
        let mut pending = vec![
            mem::replace(left, RopeString::empty()),
            mem::replace(right, RopeString::empty()),
        ];
        while let Some(rope) = pending.pop() {
            if let Ok(mut node) = Arc::try_unwrap(rope.0) {
                if let RopeNode::Concat { left, right, .. } = &mut node {
                    pending.push(mem::replace(left, RopeString::empty()));
                    pending.push(mem::replace(right, RopeString::empty()));
                }
            }
        }
    }
}

impl From<&str> for RopeString {
    fn from(s: &str) -> Self {
        Self::leaf(s)
    }
}

impl From<String> for RopeString {
    fn from(s: String) -> Self {
        Self::leaf(s)
    }
}

impl PartialEq for RopeString {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
            || (self.len() == other.len() && self.flatten() == other.flatten())
    }
}

impl fmt::Display for RopeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flatten())
    }
}

impl fmt::Debug for RopeString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RopeString")
            .field("len", &self.len())
            .field("depth", &self.depth())
            .field("flat", &self.is_flat())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_is_lazy_until_flattened() {
        let rope = RopeString::concat("hel".into(), "lo".into());
        assert_eq!(rope.len(), 5);
        assert!(!rope.is_flat());
        assert_eq!(&*rope.flatten(), "hello");
        assert!(rope.is_flat());
    }

    #[test]
    fn nested_concat_keeps_order() {
        let ab = RopeString::concat("a".into(), "b".into());
        let cd = RopeString::concat("c".into(), "d".into());
        let abcd = RopeString::concat(ab.clone(), cd);
        let rope = RopeString::concat(abcd, ab);
        assert_eq!(rope.to_string(), "abcdab");
        assert_eq!(rope.depth(), 3);
    }

    #[test]
    fn deep_left_leaning_rope_flattens() {
        let mut rope = RopeString::leaf("");
        for _ in 0..100_000 {
            rope = RopeString::concat(rope, "x".into());
        }
        assert_eq!(rope.len(), 100_000);
        assert!(rope.flatten().bytes().all(|b| b == b'x'));
    }

    #[test]
    fn equality_compares_contents() {
        let a = RopeString::concat("foo".into(), "bar".into());
        let b = RopeString::leaf("foobar");
        assert_eq!(a, b);
        assert_ne!(a, RopeString::leaf("foobaz"));
    }
}
