use super::id::ObjectId;
use crate::error::{PickleError, Result};
use crate::value::Value;

/// Index → object table used while restoring.
///
/// Slots are reserved in encounter order, the same pre-order the pickler
/// assigned indices in. A slot stays empty between [`RestoreMemo::reserve`]
/// and [`RestoreMemo::remember`]; resolving it in that window is a
/// reference into an object that is still being constructed.
#[derive(Debug, Default)]
pub struct RestoreMemo {
    slots: Vec<Option<Value>>,
}

impl RestoreMemo {
    /// Creates an empty memo.
    pub fn new() -> Self {
        Self::default()
    }

    /// The index the next reservation will get.
    pub fn next_index(&self) -> ObjectId {
        ObjectId::new(self.slots.len())
    }

    /// Reserves the next slot.
    pub fn reserve(&mut self) -> ObjectId {
        let id = self.next_index();
        self.slots.push(None);
        id
    }

    /// Fills a reserved slot.
    pub fn remember(&mut self, id: ObjectId, value: Value) -> Result<()> {
        let slot = self.slots.get_mut(id.index()).ok_or_else(|| {
            PickleError::malformed(format!("memo slot {id} was never reserved"))
        })?;
        *slot = Some(value);
        Ok(())
    }

    /// Reserves and fills the next slot in one step.
    pub fn push(&mut self, value: Value) -> ObjectId {
        let id = self.next_index();
        self.slots.push(Some(value));
        id
    }

    /// Resolves a back-reference.
    pub fn resolve(&self, index: usize) -> Result<Value> {
        self.slots
            .get(index)
            .and_then(Option::clone)
            .ok_or(PickleError::DanglingReference(index))
    }

    /// Number of reserved slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if nothing has been reserved.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drops every slot.
    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
