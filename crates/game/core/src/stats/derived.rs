//! Defense, threshold and speed computation.

use serde::{Deserialize, Serialize};

use crate::combat::subsystem::{SubsystemPenalties, aggregate_penalties};
use crate::env::TablesOracle;
use crate::state::{Ability, EntityState};

/// Values computed from persistent entity state.
///
/// Never written through a field path; the kernel replaces the whole block
/// after every operation and bumps `revision`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedStats {
    pub reflex: i32,
    pub fortitude: i32,
    pub will: i32,
    pub damage_threshold: i32,
    /// Condition-track penalty applied to attacks and defenses.
    pub condition_penalty: i32,
    /// Effective speed after engine damage.
    pub speed: u32,
    pub subsystems: SubsystemPenalties,
    /// Number of recompute passes this entity has seen.
    pub revision: u64,
}

impl DerivedStats {
    /// Computes the block for `entity`, tagging it with `revision`.
    ///
    /// Formulas:
    /// - Reflex: 10 + level + DEX mod + size modifier + misc + condition penalty
    /// - Fortitude: 10 + level + CON mod (STR for vehicles) + misc + condition penalty
    /// - Will: 10 + level + WIS mod + misc + condition penalty
    /// - Threshold: Fortitude + size threshold bonus + misc
    pub fn compute<T>(entity: &EntityState, tables: &T, revision: u64) -> Self
    where
        T: TablesOracle + ?Sized,
    {
        let level = i32::try_from(entity.level).unwrap_or(i32::MAX);
        let penalty = tables.condition_penalty(entity.condition);
        let size = tables.size_modifiers(entity.size);
        let misc = entity.defense_misc;
        let abilities = &entity.abilities;

        let fortitude_ability = if entity.is_vehicle() {
            Ability::Strength
        } else {
            Ability::Constitution
        };

        let reflex =
            10 + level + abilities.modifier(Ability::Dexterity) + size.reflex + misc.reflex + penalty;
        let fortitude =
            10 + level + abilities.modifier(fortitude_ability) + misc.fortitude + penalty;
        let will = 10 + level + abilities.modifier(Ability::Wisdom) + misc.will + penalty;

        let subsystems = entity
            .subsystems
            .as_ref()
            .map(|map| aggregate_penalties(map, tables))
            .unwrap_or_default();
        let speed = entity.speed * u32::from(subsystems.speed_percent) / 100;

        Self {
            reflex,
            fortitude,
            will,
            damage_threshold: fortitude + size.threshold + misc.threshold,
            condition_penalty: penalty,
            speed,
            subsystems,
            revision,
        }
    }
}
