//! Attack roll versus Reflex defense.

use serde::{Deserialize, Serialize};

/// How an attack roll resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitOutcome {
    /// Natural minimum face.
    AutoMiss,
    /// Natural maximum face; also a critical.
    AutoHit,
    Hit,
    Miss,
}

impl HitOutcome {
    pub const fn is_hit(self) -> bool {
        matches!(self, Self::AutoHit | Self::Hit)
    }
}

/// Modifiers that feed one attack roll.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitModifiers {
    pub attack_bonus: i32,
    /// Attacker's condition track penalty, zero or negative.
    pub condition_penalty: i32,
    /// Sum of the attacker's finite subsystem attack penalties, subtracted.
    pub subsystem_penalty: i32,
    /// Target's Reflex defense.
    pub defense: i32,
    pub cover_bonus: i32,
}

/// A resolved attack roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitRoll {
    pub natural: u32,
    pub total: i32,
    pub defense: i32,
    pub outcome: HitOutcome,
}

impl HitRoll {
    /// Natural maximum rolls double damage.
    pub fn is_critical(&self) -> bool {
        self.outcome == HitOutcome::AutoHit
    }
}

/// Resolves `natural` on a die with `faces` faces.
///
/// A natural 1 always misses and a natural maximum always hits. Otherwise
/// the attack hits when `total >= defense + cover`.
pub fn determine_hit(natural: u32, faces: u32, modifiers: HitModifiers) -> HitRoll {
    let natural_i32 = i32::try_from(natural).unwrap_or(i32::MAX);
    let total = natural_i32
        .saturating_add(modifiers.attack_bonus)
        .saturating_add(modifiers.condition_penalty)
        .saturating_sub(modifiers.subsystem_penalty);
    let defense = modifiers.defense.saturating_add(modifiers.cover_bonus);

    let outcome = if natural <= 1 {
        HitOutcome::AutoMiss
    } else if natural >= faces {
        HitOutcome::AutoHit
    } else if total >= defense {
        HitOutcome::Hit
    } else {
        HitOutcome::Miss
    };

    HitRoll {
        natural,
        total,
        defense,
        outcome,
    }
}

/// Concealment miss check on a d100: a roll at or under `chance` misses.
pub fn concealment_misses(chance: u8, roll: u32) -> bool {
    chance > 0 && roll <= u32::from(chance)
}
