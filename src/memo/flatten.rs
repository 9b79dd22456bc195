use std::collections::HashMap;

use super::id::ObjectId;
use crate::value::Value;

/// Identity → index table used while flattening.
///
/// Every memoized value is retained until [`FlattenMemo::clear`], so an
/// allocation freed mid-walk (for example a `Vec` field materialized on the
/// fly) cannot hand its address to a different object.
#[derive(Debug, Default)]
pub struct FlattenMemo {
    ids: HashMap<usize, ObjectId>,
    retained: Vec<Value>,
}

impl FlattenMemo {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks `value` up, assigning the next index on first visit.
    ///
    /// Returns `None` for values that never carry identity, otherwise the
    /// index and whether it was assigned by this call.
    pub fn get_or_assign(&mut self, value: &Value) -> Option<(ObjectId, bool)> {
        let identity = value.identity()?;
        if let Some(&id) = self.ids.get(&identity) {
            return Some((id, false));
        }
        let id = ObjectId::new(self.retained.len());
        self.ids.insert(identity, id);
        self.retained.push(value.clone());
        Some((id, true))
    }

    /// Looks `value` up without assigning.
    pub fn get(&self, value: &Value) -> Option<ObjectId> {
        value.identity().and_then(|identity| self.ids.get(&identity).copied())
    }

    /// Number of memoized values.
    pub fn len(&self) -> usize {
        self.retained.len()
    }

    /// True if nothing has been memoized.
    pub fn is_empty(&self) -> bool {
        self.retained.is_empty()
    }

    /// Forgets every entry and releases the retained values.
    pub fn clear(&mut self) {
        self.ids.clear();
        self.retained.clear();
    }
}
