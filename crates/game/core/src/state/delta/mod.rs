//! Change tracking for kernel operations.
//!
//! The kernel appends an [`EntityChanges`] entry for every entity an
//! operation touched. The runtime drains the journal after each command and
//! publishes it on the event bus.
mod bitmask;
mod changes;

use serde::{Deserialize, Serialize};

use crate::state::EntityId;

pub use bitmask::EntityFields;
pub use changes::EntityChanges;

/// Accumulated changes since the journal was last drained.
///
/// Entries are merged per entity and kept in first-touched order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeJournal {
    entries: Vec<EntityChanges>,
}

impl ChangeJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `fields` into the entry for `id`.
    pub fn record(&mut self, id: EntityId, fields: EntityFields) {
        if fields.is_empty() {
            return;
        }
        match self.entries.iter_mut().find(|c| c.id == id) {
            Some(entry) => entry.fields |= fields,
            None => self.entries.push(EntityChanges::new(id, fields)),
        }
    }

    pub fn merge(&mut self, changes: EntityChanges) {
        self.record(changes.id, changes.fields);
    }

    pub fn get(&self, id: EntityId) -> Option<EntityFields> {
        self.entries.iter().find(|c| c.id == id).map(|c| c.fields)
    }

    pub fn entries(&self) -> &[EntityChanges] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Takes every entry, leaving the journal empty.
    pub fn drain(&mut self) -> Vec<EntityChanges> {
        std::mem::take(&mut self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn journal_merges_per_entity() {
        let mut journal = ChangeJournal::new();
        journal.record(EntityId(1), EntityFields::HIT_POINTS);
        journal.record(EntityId(2), EntityFields::CREDITS);
        journal.record(EntityId(1), EntityFields::CONDITION);
        journal.record(EntityId(3), EntityFields::empty());

        assert_eq!(journal.entries().len(), 2);
        assert_eq!(
            journal.get(EntityId(1)),
            Some(EntityFields::HIT_POINTS | EntityFields::CONDITION)
        );
        assert_eq!(journal.drain().len(), 2);
        assert!(journal.is_empty());
    }
}
