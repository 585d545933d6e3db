use serde::{Deserialize, Serialize};

use crate::state::{EntityId, EntityState};

use super::bitmask::EntityFields;

/// Which fields of one entity an operation touched.
///
/// Only the id and a bitmask are stored; current values are read back from
/// the world when an observer needs them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityChanges {
    pub id: EntityId,
    pub fields: EntityFields,
}

impl EntityChanges {
    pub fn new(id: EntityId, fields: EntityFields) -> Self {
        Self { id, fields }
    }

    /// Compares persistent fields of two states of the same entity.
    ///
    /// Derived stats are ignored here; the kernel flags `DERIVED` itself after
    /// a recompute pass. Returns `None` when nothing persistent changed.
    pub fn from_states(before: &EntityState, after: &EntityState) -> Option<Self> {
        debug_assert_eq!(before.id, after.id, "cannot diff different entities");

        let mut fields = EntityFields::empty();

        if before.name != after.name || before.level != after.level || before.size != after.size
        {
            fields |= EntityFields::IDENTITY;
        }
        if before.hit_points != after.hit_points {
            fields |= EntityFields::HIT_POINTS;
        }
        if before.condition != after.condition {
            fields |= EntityFields::CONDITION;
        }
        if before.force_points != after.force_points
            || before.destiny_points != after.destiny_points
        {
            fields |= EntityFields::RESOURCES;
        }
        if before.credits != after.credits {
            fields |= EntityFields::CREDITS;
        }
        if before.abilities != after.abilities {
            fields |= EntityFields::ABILITIES;
        }
        if before.defense_misc != after.defense_misc {
            fields |= EntityFields::DEFENSES;
        }
        if before.speed != after.speed {
            fields |= EntityFields::SPEED;
        }
        if before.shields != after.shields {
            fields |= EntityFields::SHIELDS;
        }
        if before.subsystems != after.subsystems {
            fields |= EntityFields::SUBSYSTEMS;
        }
        if before.records != after.records {
            fields |= EntityFields::RECORDS;
        }
        if before.markers != after.markers {
            fields |= EntityFields::MARKERS;
        }

        (!fields.is_empty()).then_some(Self {
            id: after.id,
            fields,
        })
    }
}
