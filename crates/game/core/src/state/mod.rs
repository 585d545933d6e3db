//! Authoritative world state.
//!
//! [`WorldState`] owns every entity. Callers read freely; mutable access is
//! gated behind the kernel's `ActiveMutation` token, which only the mutation
//! kernel can mint, so every write in the crate funnels through one place.
pub mod delta;
pub mod path;
pub mod snapshot;
pub mod types;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::kernel::ActiveMutation;

pub use delta::{ChangeJournal, EntityChanges, EntityFields};
pub use path::{Defense, FieldPath, PathError};
pub use snapshot::{EntitySnapshot, SnapshotError, StateDigest};
pub use types::{
    Ability, AbilityScores, Collection, ConditionStep, DefenseMisc, EntityId, EntityKind,
    EntityRef, EntitySeed, EntityState, FeatureRecord, FeatureRecords, HitPoints, RecordData,
    RecordId, RecordUpdate, ScaleClass, ShieldState, ShieldZone, SizeCategory, StatusMarker,
    StatusMarkers, Subsystem, SubsystemMap, SubsystemTier,
};

/// Every entity in the world plus the id allocators and dice state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Base seed for every roll. Set once when the world is created.
    pub game_seed: u64,

    /// Incremented once per roll so no two rolls share a seed.
    roll_nonce: u64,

    /// Ids are never reused. 0 is reserved for unspawned entities.
    next_entity_id: u32,
    next_record_id: u32,

    entities: BTreeMap<EntityId, EntityState>,
}

impl WorldState {
    /// Creates an empty world.
    pub fn new(game_seed: u64) -> Self {
        Self {
            game_seed,
            roll_nonce: 0,
            next_entity_id: 1,
            next_record_id: 1,
            entities: BTreeMap::new(),
        }
    }

    /// Rebuilds a world from previously persisted entities.
    ///
    /// Allocators resume above the highest ids present. Derived stats are
    /// stale until the kernel runs `recompute_all`.
    pub fn from_entities(game_seed: u64, entities: impl IntoIterator<Item = EntityState>) -> Self {
        let mut world = Self::new(game_seed);
        for entity in entities {
            world.next_entity_id = world.next_entity_id.max(entity.id.0.saturating_add(1));
            if let Some(max) = entity.records.max_id() {
                world.next_record_id = world.next_record_id.max(max.0.saturating_add(1));
            }
            world.entities.insert(entity.id, entity);
        }
        world
    }

    pub fn entity(&self, id: EntityId) -> Option<&EntityState> {
        self.entities.get(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityState> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn roll_nonce(&self) -> u64 {
        self.roll_nonce
    }

    pub(crate) fn entity_mut(
        &mut self,
        _token: &ActiveMutation,
        id: EntityId,
    ) -> Option<&mut EntityState> {
        self.entities.get_mut(&id)
    }

    /// Inserts or replaces an entity under its own id.
    pub(crate) fn put(&mut self, _token: &ActiveMutation, entity: EntityState) {
        self.entities.insert(entity.id, entity);
    }

    pub(crate) fn allocate_entity_id(&mut self, _token: &ActiveMutation) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    pub(crate) fn allocate_record_id(&mut self, _token: &ActiveMutation) -> RecordId {
        let id = RecordId(self.next_record_id);
        self.next_record_id += 1;
        id
    }

    /// Returns the current nonce and advances it.
    pub(crate) fn take_roll_nonce(&mut self, _token: &ActiveMutation) -> u64 {
        let nonce = self.roll_nonce;
        self.roll_nonce += 1;
        nonce
    }
}

impl Default for WorldState {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restored_world_allocates_past_existing_ids() {
        let mut hero = EntityState::character("Kell");
        hero.id = EntityId(7);
        hero.records.push(FeatureRecord {
            id: RecordId(40),
            kind: Collection::Feats,
            name: "Toughness".into(),
            payload: serde_json::Value::Null,
            linked: None,
        });

        let mut world = WorldState::from_entities(3, [hero]);
        let token = ActiveMutation::for_tests();
        assert_eq!(world.allocate_entity_id(&token), EntityId(8));
        assert_eq!(world.allocate_record_id(&token), RecordId(41));
        assert_eq!(world.take_roll_nonce(&token), 0);
        assert_eq!(world.roll_nonce(), 1);
    }
}
