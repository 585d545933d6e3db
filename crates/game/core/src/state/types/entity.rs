//! Entity state: characters, creatures and vehicles.
//!
//! Persistent fields are public for reading. Mutable access is only handed
//! out by [`crate::state::WorldState`] to the mutation kernel, and the
//! [`DerivedStats`] block is recomputed by the kernel after every operation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use super::common::{AbilityScores, EntityId, EntityKind, SizeCategory};
use super::record::FeatureRecords;
use super::status::StatusMarkers;
use super::subsystem::SubsystemMap;
use crate::config::GameConfig;
use crate::stats::DerivedStats;

/// Current and maximum hit points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HitPoints {
    pub current: u32,
    pub max: u32,
}

impl HitPoints {
    pub const fn full(max: u32) -> Self {
        Self { current: max, max }
    }

    pub const fn is_valid(&self) -> bool {
        self.current <= self.max
    }
}

/// Position on the condition track: 0 is normal, 5 is helpless.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConditionStep(pub u8);

impl ConditionStep {
    pub const NORMAL: Self = Self(0);
    pub const HELPLESS: Self = Self(GameConfig::MAX_CONDITION_STEP);

    /// Moves down the track by `steps`, stopping at helpless.
    pub fn shifted(self, steps: u8) -> Self {
        Self(self.0.saturating_add(steps).min(Self::HELPLESS.0))
    }

    pub const fn is_helpless(self) -> bool {
        self.0 >= Self::HELPLESS.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 <= Self::HELPLESS.0
    }
}

/// Stored misc bonuses feeding the derived defenses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DefenseMisc {
    pub reflex: i32,
    pub fortitude: i32,
    pub will: i32,
    pub threshold: i32,
}

/// Facing of a shield pool.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ShieldZone {
    #[default]
    Fore,
    Aft,
    Port,
    Starboard,
}

impl ShieldZone {
    pub const COUNT: usize = 4;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Vehicle shield rating and the remaining pool per zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShieldState {
    /// Maximum pool per zone.
    pub rating: u32,
    zones: [u32; ShieldZone::COUNT],
}

impl ShieldState {
    /// Fully charged shields.
    pub const fn charged(rating: u32) -> Self {
        Self {
            rating,
            zones: [rating; ShieldZone::COUNT],
        }
    }

    pub fn zone(&self, zone: ShieldZone) -> u32 {
        self.zones[zone.index()]
    }

    pub fn set_zone(&mut self, zone: ShieldZone, value: u32) {
        self.zones[zone.index()] = value;
    }

    pub fn is_valid(&self) -> bool {
        self.zones.iter().all(|z| *z <= self.rating)
    }
}

/// A mutable record representing a character, creature or vehicle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,
    pub size: SizeCategory,
    pub level: u32,
    pub abilities: AbilityScores,
    pub hit_points: HitPoints,
    pub condition: ConditionStep,
    pub force_points: u32,
    pub destiny_points: u32,
    pub credits: u64,
    /// Base speed in squares before subsystem penalties.
    pub speed: u32,
    pub defense_misc: DefenseMisc,
    pub shields: Option<ShieldState>,
    pub subsystems: Option<SubsystemMap>,
    pub records: FeatureRecords,
    pub markers: StatusMarkers,
    #[serde(skip)]
    pub(crate) derived: DerivedStats,
}

impl EntityState {
    /// Creates an entity with average scores and no id yet.
    ///
    /// The world assigns the real id when the kernel spawns it.
    pub fn new(name: impl Into<String>, kind: EntityKind) -> Self {
        let vehicle = kind.is_vehicle();
        Self {
            id: EntityId::UNASSIGNED,
            name: name.into(),
            kind,
            size: if vehicle {
                SizeCategory::Colossal
            } else {
                SizeCategory::Medium
            },
            level: 1,
            abilities: AbilityScores::default(),
            hit_points: HitPoints::full(10),
            condition: ConditionStep::NORMAL,
            force_points: 0,
            destiny_points: 0,
            credits: 0,
            speed: 6,
            defense_misc: DefenseMisc::default(),
            shields: vehicle.then(|| ShieldState::charged(0)),
            subsystems: vehicle.then(SubsystemMap::new),
            records: FeatureRecords::new(),
            markers: StatusMarkers::empty(),
            derived: DerivedStats::default(),
        }
    }

    pub fn character(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::Character)
    }

    pub fn creature(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::Creature)
    }

    pub fn vehicle(name: impl Into<String>) -> Self {
        Self::new(name, EntityKind::Vehicle)
    }

    pub fn with_size(mut self, size: SizeCategory) -> Self {
        self.size = size;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_abilities(mut self, abilities: AbilityScores) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn with_hit_points(mut self, max: u32) -> Self {
        self.hit_points = HitPoints::full(max);
        self
    }

    pub fn with_credits(mut self, credits: u64) -> Self {
        self.credits = credits;
        self
    }

    pub fn with_force_points(mut self, points: u32) -> Self {
        self.force_points = points;
        self
    }

    pub fn with_destiny_points(mut self, points: u32) -> Self {
        self.destiny_points = points;
        self
    }

    pub fn with_shields(mut self, rating: u32) -> Self {
        self.shields = Some(ShieldState::charged(rating));
        self
    }

    pub fn with_subsystems(mut self, subsystems: SubsystemMap) -> Self {
        self.subsystems = Some(subsystems);
        self
    }

    pub fn with_defense_misc(mut self, misc: DefenseMisc) -> Self {
        self.defense_misc = misc;
        self
    }

    /// Computed values as of the last kernel recompute pass.
    pub fn derived(&self) -> &DerivedStats {
        &self.derived
    }

    pub fn is_vehicle(&self) -> bool {
        self.kind.is_vehicle()
    }

    /// Checks the scalar invariants the kernel guarantees after every operation.
    pub fn check_invariants(&self) -> Result<(), &'static str> {
        if !self.hit_points.is_valid() {
            return Err("hit points exceed maximum");
        }
        if !self.condition.is_valid() {
            return Err("condition step beyond helpless");
        }
        if let Some(shields) = &self.shields
            && !shields.is_valid()
        {
            return Err("shield zone exceeds rating");
        }
        Ok(())
    }
}

/// Data for an entity created by a mutation plan.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitySeed {
    pub name: String,
    pub kind: EntityKind,
    pub size: Option<SizeCategory>,
    pub level: u32,
    pub abilities: AbilityScores,
    pub hit_points: u32,
    pub credits: u64,
    pub force_points: u32,
    pub destiny_points: u32,
    pub speed: Option<u32>,
    pub shield_rating: Option<u32>,
}

impl Default for EntitySeed {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: EntityKind::Character,
            size: None,
            level: 1,
            abilities: AbilityScores::default(),
            hit_points: 10,
            credits: 0,
            force_points: 0,
            destiny_points: 0,
            speed: None,
            shield_rating: None,
        }
    }
}

impl EntitySeed {
    pub fn named(name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name: name.into(),
            kind,
            ..Self::default()
        }
    }

    /// Materializes the seed as an unspawned entity.
    pub fn into_entity(self) -> EntityState {
        let mut entity = EntityState::new(self.name, self.kind)
            .with_level(self.level)
            .with_abilities(self.abilities)
            .with_hit_points(self.hit_points)
            .with_credits(self.credits)
            .with_force_points(self.force_points)
            .with_destiny_points(self.destiny_points);
        if let Some(size) = self.size {
            entity.size = size;
        }
        if let Some(speed) = self.speed {
            entity.speed = speed;
        }
        if let Some(rating) = self.shield_rating {
            entity.shields = Some(ShieldState::charged(rating));
        }
        entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_shift_stops_at_helpless() {
        assert_eq!(ConditionStep(4).shifted(2), ConditionStep::HELPLESS);
        assert_eq!(ConditionStep(1).shifted(1), ConditionStep(2));
        assert!(ConditionStep(5).is_helpless());
    }

    #[test]
    fn vehicles_start_with_subsystems_and_shields() {
        let ship = EntityState::vehicle("Corvette").with_shields(15);
        assert!(ship.subsystems.is_some());
        assert_eq!(ship.shields.map(|s| s.zone(ShieldZone::Aft)), Some(15));
        let hero = EntityState::character("Kell");
        assert!(hero.subsystems.is_none());
        assert!(hero.shields.is_none());
    }

    #[test]
    fn invariants_reject_overfull_hit_points() {
        let mut hero = EntityState::character("Kell").with_hit_points(20);
        assert!(hero.check_invariants().is_ok());
        hero.hit_points.current = 21;
        assert!(hero.check_invariants().is_err());
    }

    #[test]
    fn seed_builds_vehicle() {
        let mut seed = EntitySeed::named("Skiff", EntityKind::Vehicle);
        seed.shield_rating = Some(10);
        seed.hit_points = 60;
        let skiff = seed.into_entity();
        assert_eq!(skiff.id, EntityId::UNASSIGNED);
        assert_eq!(skiff.size, SizeCategory::Colossal);
        assert_eq!(skiff.hit_points, HitPoints::full(60));
        assert!(skiff.subsystems.is_some());
    }
}
