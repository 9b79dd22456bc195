use std::fmt;

/// A memo index. Indices are assigned in first-visit order starting at 0 and
/// are what `$id` and `$ref` records carry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Creates a new `ObjectId`.
    /// Restricted to the crate so indices only come from a memo or from text.
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the raw index.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
