use serde::{Deserialize, Serialize};

use crate::state::{ConditionStep, ScaleClass, SizeCategory, Subsystem, SubsystemTier};

/// Oracle providing rules tables.
///
/// Tables define how much damage crosses a scale gap, how hard the
/// condition track bites, and what each subsystem tier costs. They do NOT
/// define feature content (use [`super::ContentOracle`] for that).
pub trait TablesOracle: Send + Sync {
    /// Damage multiplier applied when `attacker` scale hits `target` scale.
    fn scale_factor(&self, attacker: ScaleClass, target: ScaleClass) -> ScaleFactor;

    /// Penalty to attacks, defenses and checks at a condition step.
    fn condition_penalty(&self, step: ConditionStep) -> i32;

    /// Effect of one subsystem sitting at one tier.
    fn subsystem_penalty(&self, subsystem: Subsystem, tier: SubsystemTier) -> SubsystemPenalty;

    /// Reflex and damage threshold adjustments for a size category.
    fn size_modifiers(&self, size: SizeCategory) -> SizeModifiers;

    /// Faces on the attack die.
    fn die_faces(&self) -> u32;

    /// Damage multiplier on a natural maximum attack roll.
    fn critical_multiplier(&self) -> u32;
}

/// Rational damage multiplier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleFactor {
    pub num: u32,
    pub den: u32,
}

impl ScaleFactor {
    pub const IDENTITY: Self = Self::new(1, 1);

    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// Floor-divides the scaled amount. A zero denominator yields zero.
    pub fn apply(&self, raw: u32) -> u32 {
        if self.den == 0 {
            return 0;
        }
        let scaled = u64::from(raw) * u64::from(self.num) / u64::from(self.den);
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}

/// Per-size adjustments.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeModifiers {
    pub reflex: i32,
    pub threshold: i32,
}

impl SizeModifiers {
    pub const fn new(reflex: i32, threshold: i32) -> Self {
        Self { reflex, threshold }
    }
}

/// Effect of a single (subsystem, tier) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsystemPenalty {
    /// Remaining speed as a percentage of base.
    pub speed_percent: u8,
    /// Remaining shield effectiveness as a percentage.
    pub shield_percent: u8,
    /// Finite penalty subtracted from attack rolls.
    pub attack_penalty: i32,
    /// Subsystem no longer functions at all.
    pub offline: bool,
}

impl SubsystemPenalty {
    pub const NONE: Self = Self {
        speed_percent: 100,
        shield_percent: 100,
        attack_penalty: 0,
        offline: false,
    };

    pub const fn speed(percent: u8) -> Self {
        Self {
            speed_percent: percent,
            offline: percent == 0,
            ..Self::NONE
        }
    }

    pub const fn shields(percent: u8) -> Self {
        Self {
            shield_percent: percent,
            offline: percent == 0,
            ..Self::NONE
        }
    }

    pub const fn attack(penalty: i32) -> Self {
        Self {
            attack_penalty: penalty,
            ..Self::NONE
        }
    }

    pub const fn offline() -> Self {
        Self {
            offline: true,
            ..Self::NONE
        }
    }
}

impl Default for SubsystemPenalty {
    fn default() -> Self {
        Self::NONE
    }
}

/// Penalties for Damaged, Disabled and Destroyed, in tier order.
pub type TierPenalties = [SubsystemPenalty; 3];

/// Standard rules tables, loadable from TOML.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesTables {
    /// `scale[attacker][target]`, indexed by [`ScaleClass::index`].
    pub scale: [[ScaleFactor; 3]; 3],
    /// Penalty per condition step 0..=5.
    pub condition_penalties: [i32; 6],
    /// Indexed by [`SizeCategory::index`].
    pub size_modifiers: [SizeModifiers; SizeCategory::COUNT],
    pub engines: TierPenalties,
    pub weapons: TierPenalties,
    pub shields: TierPenalties,
    pub sensors: TierPenalties,
    pub comms: TierPenalties,
    pub life_support: TierPenalties,
    pub die_faces: u32,
    pub critical_multiplier: u32,
}

impl RulesTables {
    fn tiers(&self, subsystem: Subsystem) -> &TierPenalties {
        match subsystem {
            Subsystem::Engines => &self.engines,
            Subsystem::Weapons => &self.weapons,
            Subsystem::Shields => &self.shields,
            Subsystem::Sensors => &self.sensors,
            Subsystem::Comms => &self.comms,
            Subsystem::LifeSupport => &self.life_support,
        }
    }
}

impl Default for RulesTables {
    fn default() -> Self {
        let f = ScaleFactor::new;
        let s = SizeModifiers::new;
        Self {
            scale: [
                // character-scale attacker
                [f(1, 1), f(1, 2), f(1, 10)],
                // vehicle-scale attacker
                [f(2, 1), f(1, 1), f(1, 2)],
                // starship-scale attacker
                [f(10, 1), f(2, 1), f(1, 1)],
            ],
            condition_penalties: [0, -1, -2, -5, -10, 0],
            size_modifiers: [
                s(10, 0),  // fine
                s(5, 0),   // diminutive
                s(2, 0),   // tiny
                s(1, 0),   // small
                s(0, 0),   // medium
                s(-1, 5),  // large
                s(-2, 10), // huge
                s(-5, 20), // gargantuan
                s(-10, 50),
                s(-10, 100),
                s(-10, 200),
                s(-10, 500),
            ],
            engines: [
                SubsystemPenalty::speed(50),
                SubsystemPenalty::speed(0),
                SubsystemPenalty::speed(0),
            ],
            weapons: [
                SubsystemPenalty::attack(2),
                SubsystemPenalty::offline(),
                SubsystemPenalty::offline(),
            ],
            shields: [
                SubsystemPenalty::shields(50),
                SubsystemPenalty::shields(0),
                SubsystemPenalty::shields(0),
            ],
            sensors: [
                SubsystemPenalty::attack(2),
                SubsystemPenalty::attack(5),
                SubsystemPenalty::attack(5),
            ],
            comms: [
                SubsystemPenalty::NONE,
                SubsystemPenalty::offline(),
                SubsystemPenalty::offline(),
            ],
            life_support: [
                SubsystemPenalty::NONE,
                SubsystemPenalty::offline(),
                SubsystemPenalty::offline(),
            ],
            die_faces: 20,
            critical_multiplier: 2,
        }
    }
}

impl TablesOracle for RulesTables {
    fn scale_factor(&self, attacker: ScaleClass, target: ScaleClass) -> ScaleFactor {
        self.scale[attacker.index()][target.index()]
    }

    fn condition_penalty(&self, step: ConditionStep) -> i32 {
        self.condition_penalties
            .get(usize::from(step.0))
            .copied()
            .unwrap_or(0)
    }

    fn subsystem_penalty(&self, subsystem: Subsystem, tier: SubsystemTier) -> SubsystemPenalty {
        match tier {
            SubsystemTier::Normal => SubsystemPenalty::NONE,
            other => self.tiers(subsystem)[other.index() - 1],
        }
    }

    fn size_modifiers(&self, size: SizeCategory) -> SizeModifiers {
        self.size_modifiers[size.index()]
    }

    fn die_faces(&self) -> u32 {
        self.die_faces
    }

    fn critical_multiplier(&self) -> u32 {
        self.critical_multiplier
    }
}
