//! Vehicle subsystem state.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// A damageable vehicle subsystem.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Subsystem {
    Engines,
    Weapons,
    Shields,
    Sensors,
    Comms,
    LifeSupport,
}

impl Subsystem {
    pub const COUNT: usize = 6;

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Functional tier of a subsystem, strictly ordered from healthy to wrecked.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubsystemTier {
    #[default]
    Normal,
    Damaged,
    Disabled,
    Destroyed,
}

impl SubsystemTier {
    /// Next tier down, or `None` when already destroyed.
    pub const fn worsened(self) -> Option<Self> {
        match self {
            Self::Normal => Some(Self::Damaged),
            Self::Damaged => Some(Self::Disabled),
            Self::Disabled => Some(Self::Destroyed),
            Self::Destroyed => None,
        }
    }

    /// Previous tier, or `None` at normal.
    ///
    /// Destroyed still reports `Disabled` here; whether a destroyed
    /// subsystem may be repaired is a rule decided by the caller.
    pub const fn improved(self) -> Option<Self> {
        match self {
            Self::Normal => None,
            Self::Damaged => Some(Self::Normal),
            Self::Disabled => Some(Self::Damaged),
            Self::Destroyed => Some(Self::Disabled),
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Tier of every subsystem on one vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubsystemMap {
    tiers: [SubsystemTier; Subsystem::COUNT],
}

impl SubsystemMap {
    /// All subsystems at normal.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tier(&self, subsystem: Subsystem) -> SubsystemTier {
        self.tiers[subsystem.index()]
    }

    pub fn set_tier(&mut self, subsystem: Subsystem, tier: SubsystemTier) {
        self.tiers[subsystem.index()] = tier;
    }

    pub fn with_tier(mut self, subsystem: Subsystem, tier: SubsystemTier) -> Self {
        self.set_tier(subsystem, tier);
        self
    }

    /// Iterates `(subsystem, tier)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Subsystem, SubsystemTier)> + '_ {
        Subsystem::iter().map(|s| (s, self.tier(s)))
    }

    /// Subsystems that can still take damage.
    pub fn damageable(&self) -> Vec<Subsystem> {
        self.iter()
            .filter(|(_, tier)| *tier != SubsystemTier::Destroyed)
            .map(|(s, _)| s)
            .collect()
    }

    pub fn all_normal(&self) -> bool {
        self.tiers.iter().all(|t| *t == SubsystemTier::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_walk_in_order() {
        let mut tier = SubsystemTier::Normal;
        let mut visited = vec![tier];
        while let Some(next) = tier.worsened() {
            visited.push(next);
            tier = next;
        }
        assert_eq!(
            visited,
            vec![
                SubsystemTier::Normal,
                SubsystemTier::Damaged,
                SubsystemTier::Disabled,
                SubsystemTier::Destroyed
            ]
        );
    }

    #[test]
    fn damageable_excludes_destroyed() {
        let map = SubsystemMap::new().with_tier(Subsystem::Comms, SubsystemTier::Destroyed);
        let damageable = map.damageable();
        assert_eq!(damageable.len(), 5);
        assert!(!damageable.contains(&Subsystem::Comms));
    }
}
