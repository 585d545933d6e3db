//! Damage packets and the pure arithmetic applied to them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::state::{ConditionStep, EntityId, EntityKind, StatusMarker};

/// Damage type carried by a packet.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DamageType {
    #[default]
    Energy,
    Kinetic,
    /// Moves the condition track two steps and prefers shields and sensors
    /// when escalating subsystems.
    Ion,
    Sonic,
}

impl DamageType {
    pub const fn is_ion(self) -> bool {
        matches!(self, Self::Ion)
    }
}

/// Transient damage on its way to a target.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamagePacket {
    pub amount: u32,
    #[serde(default)]
    pub damage_type: DamageType,
    #[serde(default)]
    pub source: Option<EntityId>,
    /// Exceeding the damage threshold moves the condition track.
    #[serde(default = "default_true")]
    pub condition_shift_eligible: bool,
}

fn default_true() -> bool {
    true
}

impl DamagePacket {
    pub fn new(amount: u32, damage_type: DamageType) -> Self {
        Self {
            amount,
            damage_type,
            source: None,
            condition_shift_eligible: true,
        }
    }

    pub fn from_source(mut self, source: EntityId) -> Self {
        self.source = Some(source);
        self
    }

    /// Damage that never moves the condition track.
    pub fn without_condition_shift(mut self) -> Self {
        self.condition_shift_eligible = false;
        self
    }
}

/// Split of a packet between one shield zone and the hull.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldAbsorption {
    pub absorbed: u32,
    pub overflow: u32,
    /// Zone pool left after absorption.
    pub remaining_pool: u32,
}

/// Absorbs `amount` from a shield zone pool.
///
/// The shield subsystem percentage limits how much of the pool is usable in
/// one hit. Absorbed damage depletes the pool point for point.
pub fn absorb_shields(pool: u32, shield_percent: u8, amount: u32) -> ShieldAbsorption {
    let usable = u64::from(pool) * u64::from(shield_percent.min(100)) / 100;
    let absorbed = u32::try_from(usable)
        .unwrap_or(u32::MAX)
        .min(amount)
        .min(pool);
    ShieldAbsorption {
        absorbed,
        overflow: amount - absorbed,
        remaining_pool: pool - absorbed,
    }
}

/// Whether damage reaching hit points crosses the threshold.
///
/// The threshold is the value above which damage moves the condition track.
pub fn exceeds_threshold(damage: u32, threshold: i32) -> bool {
    i64::from(damage) > i64::from(threshold)
}

/// Condition track steps for a threshold-exceeding hit.
pub fn condition_steps(packet: &DamagePacket) -> u8 {
    if packet.damage_type.is_ion() { 2 } else { 1 }
}

/// Applies a threshold hit to the condition track, capped at helpless.
pub fn shift_condition(step: ConditionStep, packet: &DamagePacket) -> ConditionStep {
    step.shifted(condition_steps(packet))
}

/// Marker for a target left at zero hit points.
///
/// Vehicles are destroyed. Others die when the blow also crossed the
/// threshold and fall unconscious otherwise.
pub fn terminal_marker(kind: EntityKind, hp: u32, threshold_exceeded: bool) -> Option<StatusMarker> {
    if hp > 0 {
        return None;
    }
    Some(if kind.is_vehicle() {
        StatusMarker::Destroyed
    } else if threshold_exceeded {
        StatusMarker::Dead
    } else {
        StatusMarker::Unconscious
    })
}
