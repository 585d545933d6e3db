//! Attack resolution pipeline.
//!
//! ```text
//! Start -> SubsystemPenaltyCheck -> [Blocked]
//!       -> HitDetermination -> ConcealmentCheck -> [Miss]
//!       -> DamageRoll -> ScaleAdjustment
//!       -> ShieldAbsorption -> HpApplication -> ThresholdEvaluation
//!       -> ConditionShift -> SubsystemEscalation -> Hit
//! ```
//!
//! Every stage that ran is recorded on the report. The pipeline reads
//! entities and tables freely but writes only through kernel operations.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::damage::{
    DamagePacket, DamageType, absorb_shields, exceeds_threshold, shift_condition, terminal_marker,
};
use super::dice::DiceFormula;
use super::error::CombatError;
use super::hit::{HitModifiers, HitRoll, concealment_misses, determine_hit};
use super::scale::scale_damage;
use super::subsystem::{Escalation, EscalationRequest, escalate_subsystem};
use crate::kernel::{FieldMap, MutationKernel, MutationOptions};
use crate::state::{
    ConditionStep, EntityId, FieldPath, ShieldZone, StatusMarker, Subsystem,
};

const ATTACK_CONTEXT: u32 = 1;
const CONCEALMENT_CONTEXT: u32 = 2;
const DAMAGE_CONTEXT: u32 = 0x100;

/// Stage of the attack state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackStage {
    Start,
    SubsystemPenaltyCheck,
    Blocked,
    HitDetermination,
    ConcealmentCheck,
    Miss,
    DamageRoll,
    ScaleAdjustment,
    ShieldAbsorption,
    HpApplication,
    ThresholdEvaluation,
    ConditionShift,
    SubsystemEscalation,
    Hit,
}

/// Terminal result of an attack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackOutcome {
    /// The attacker's weapons are offline.
    Blocked,
    Miss,
    Hit,
}

fn default_true() -> bool {
    true
}

/// One attack from `attacker` against `target`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub attacker: EntityId,
    pub target: EntityId,
    pub damage: DiceFormula,
    #[serde(default)]
    pub attack_bonus: i32,
    /// Flat damage added after the dice.
    #[serde(default)]
    pub damage_bonus: i32,
    #[serde(default)]
    pub damage_type: DamageType,
    #[serde(default)]
    pub cover_bonus: i32,
    /// Concealment miss chance in percent.
    #[serde(default)]
    pub concealment: u8,
    /// Skips hit determination and concealment when set.
    #[serde(default)]
    pub forced_hit: Option<bool>,
    #[serde(default)]
    pub shield_zone: ShieldZone,
    #[serde(default = "default_true")]
    pub condition_shift_eligible: bool,
    /// Subsystem the game master wants hit if the threshold is exceeded.
    #[serde(default)]
    pub target_subsystem: Option<Subsystem>,
}

impl AttackRequest {
    pub fn new(attacker: EntityId, target: EntityId, damage: DiceFormula) -> Self {
        Self {
            attacker,
            target,
            damage,
            attack_bonus: 0,
            damage_bonus: 0,
            damage_type: DamageType::default(),
            cover_bonus: 0,
            concealment: 0,
            forced_hit: None,
            shield_zone: ShieldZone::default(),
            condition_shift_eligible: true,
            target_subsystem: None,
        }
    }

    pub fn with_attack_bonus(mut self, bonus: i32) -> Self {
        self.attack_bonus = bonus;
        self
    }

    pub fn with_damage_bonus(mut self, bonus: i32) -> Self {
        self.damage_bonus = bonus;
        self
    }

    pub fn with_damage_type(mut self, damage_type: DamageType) -> Self {
        self.damage_type = damage_type;
        self
    }

    pub fn with_cover(mut self, bonus: i32) -> Self {
        self.cover_bonus = bonus;
        self
    }

    pub fn with_concealment(mut self, percent: u8) -> Self {
        self.concealment = percent;
        self
    }

    pub fn forced(mut self, hit: bool) -> Self {
        self.forced_hit = Some(hit);
        self
    }

    pub fn at_zone(mut self, zone: ShieldZone) -> Self {
        self.shield_zone = zone;
        self
    }

    pub fn targeting(mut self, subsystem: Subsystem) -> Self {
        self.target_subsystem = Some(subsystem);
        self
    }
}

/// What a damage packet did to its target.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageReport {
    pub stages: Vec<AttackStage>,
    pub shield_absorbed: u32,
    /// Hit points actually lost.
    pub hp_damage: u32,
    pub hp_after: u32,
    pub threshold_exceeded: bool,
    pub condition_before: ConditionStep,
    pub condition_after: ConditionStep,
    pub escalation: Option<Escalation>,
    pub marker: Option<StatusMarker>,
}

/// Full trace of one attack.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttackReport {
    pub attacker: EntityId,
    pub target: EntityId,
    pub stages: Vec<AttackStage>,
    pub outcome: AttackOutcome,
    /// `None` when the hit was forced or the attack was blocked.
    pub hit: Option<HitRoll>,
    pub concealment_roll: Option<u32>,
    pub critical: bool,
    pub raw_damage: u32,
    pub scaled_damage: u32,
    pub damage: Option<DamageReport>,
}

impl AttackReport {
    fn start(request: &AttackRequest) -> Self {
        Self {
            attacker: request.attacker,
            target: request.target,
            stages: vec![AttackStage::Start],
            outcome: AttackOutcome::Miss,
            hit: None,
            concealment_roll: None,
            critical: false,
            raw_damage: 0,
            scaled_damage: 0,
            damage: None,
        }
    }

    fn finish(mut self, stage: AttackStage, outcome: AttackOutcome) -> Self {
        self.stages.push(stage);
        self.outcome = outcome;
        self
    }

    pub fn is_hit(&self) -> bool {
        self.outcome == AttackOutcome::Hit
    }
}

/// Resolves attacks and applies damage through a [`MutationKernel`].
#[derive(Clone, Copy, Debug, Default)]
pub struct AttackPipeline;

impl AttackPipeline {
    /// Resolves one attack end to end.
    pub fn resolve(
        kernel: &mut MutationKernel<'_, '_>,
        request: &AttackRequest,
    ) -> Result<AttackReport, CombatError> {
        if request.attacker == request.target {
            return Err(CombatError::SelfTarget(request.attacker));
        }
        let attacker = kernel.entity(request.attacker)?.clone();
        let target = kernel.entity(request.target)?.clone();
        let tables = kernel.env().tables()?;
        let mut report = AttackReport::start(request);

        let mut subsystem_penalty = 0;
        if attacker.is_vehicle() {
            report.stages.push(AttackStage::SubsystemPenaltyCheck);
            let penalties = attacker.derived.subsystems;
            if penalties.weapons_offline() {
                debug!(target: "saga::combat", attacker = %attacker.id, "weapons offline, attack blocked");
                return Ok(report.finish(AttackStage::Blocked, AttackOutcome::Blocked));
            }
            subsystem_penalty = penalties.attack_penalty;
        }

        report.stages.push(AttackStage::HitDetermination);
        let hit = match request.forced_hit {
            Some(forced) => forced,
            None => {
                let faces = tables.die_faces();
                let natural = kernel.roll(attacker.id, ATTACK_CONTEXT, faces)?;
                let roll = determine_hit(
                    natural,
                    faces,
                    HitModifiers {
                        attack_bonus: request.attack_bonus,
                        condition_penalty: attacker.derived.condition_penalty,
                        subsystem_penalty,
                        defense: target.derived.reflex,
                        cover_bonus: request.cover_bonus,
                    },
                );
                report.hit = Some(roll);

                let mut hit = roll.outcome.is_hit();
                if hit && request.concealment > 0 {
                    report.stages.push(AttackStage::ConcealmentCheck);
                    let chance = kernel.roll(attacker.id, CONCEALMENT_CONTEXT, 100)?;
                    report.concealment_roll = Some(chance);
                    hit = !concealment_misses(request.concealment, chance);
                }
                report.critical = hit && roll.is_critical();
                hit
            }
        };

        if !hit {
            debug!(
                target: "saga::combat",
                attacker = %attacker.id,
                defender = %target.id,
                natural = ?report.hit.map(|h| h.natural),
                "attack missed"
            );
            return Ok(report.finish(AttackStage::Miss, AttackOutcome::Miss));
        }

        report.stages.push(AttackStage::DamageRoll);
        let dice = request
            .damage
            .roll_with(|index, sides| kernel.roll(attacker.id, DAMAGE_CONTEXT + index, sides))?;
        let mut raw = u32::try_from((i64::from(dice) + i64::from(request.damage_bonus)).max(0))
            .unwrap_or(u32::MAX);
        if report.critical {
            raw = raw.saturating_mul(tables.critical_multiplier());
        }
        report.raw_damage = raw;

        report.stages.push(AttackStage::ScaleAdjustment);
        report.scaled_damage = scale_damage(tables, attacker.size, target.size, raw);

        let packet = DamagePacket {
            amount: report.scaled_damage,
            damage_type: request.damage_type,
            source: Some(attacker.id),
            condition_shift_eligible: request.condition_shift_eligible,
        };
        let damage = Self::apply_damage(
            kernel,
            target.id,
            &packet,
            request.shield_zone,
            request.target_subsystem,
        )?;
        report.stages.extend(damage.stages.iter().copied());
        report.damage = Some(damage);

        debug!(
            target: "saga::combat",
            attacker = %attacker.id,
            defender = %target.id,
            raw = report.raw_damage,
            scaled = report.scaled_damage,
            critical = report.critical,
            "attack hit"
        );
        Ok(report.finish(AttackStage::Hit, AttackOutcome::Hit))
    }

    /// Applies an already scaled packet to `target`.
    ///
    /// Shields, hit points and the condition track are written in a single
    /// kernel call so the target is recomputed once. Subsystem escalation and
    /// terminal markers follow as their own kernel calls.
    pub fn apply_damage(
        kernel: &mut MutationKernel<'_, '_>,
        target: EntityId,
        packet: &DamagePacket,
        zone: ShieldZone,
        preferred: Option<Subsystem>,
    ) -> Result<DamageReport, CombatError> {
        let entity = kernel.entity(target)?.clone();
        let mut report = DamageReport {
            condition_before: entity.condition,
            condition_after: entity.condition,
            hp_after: entity.hit_points.current,
            ..DamageReport::default()
        };
        let mut fields = FieldMap::new();
        let mut remaining = packet.amount;

        if let Some(shields) = &entity.shields
            && remaining > 0
        {
            report.stages.push(AttackStage::ShieldAbsorption);
            let split = absorb_shields(
                shields.zone(zone),
                entity.derived.subsystems.shield_percent,
                remaining,
            );
            if split.absorbed > 0 {
                fields.insert(
                    FieldPath::ShieldZone(zone).to_string(),
                    split.remaining_pool.into(),
                );
            }
            report.shield_absorbed = split.absorbed;
            remaining = split.overflow;
        }

        report.stages.push(AttackStage::HpApplication);
        let current = entity.hit_points.current;
        report.hp_after = current.saturating_sub(remaining);
        report.hp_damage = current - report.hp_after;
        if report.hp_damage > 0 {
            fields.insert(FieldPath::HpCurrent.to_string(), report.hp_after.into());
        }

        report.stages.push(AttackStage::ThresholdEvaluation);
        report.threshold_exceeded =
            remaining > 0 && exceeds_threshold(remaining, entity.derived.damage_threshold);

        if report.threshold_exceeded && packet.condition_shift_eligible {
            report.stages.push(AttackStage::ConditionShift);
            report.condition_after = shift_condition(entity.condition, packet);
            if report.condition_after != entity.condition {
                fields.insert(
                    FieldPath::ConditionStep.to_string(),
                    report.condition_after.0.into(),
                );
            }
        }

        if !fields.is_empty() {
            kernel.update_entity(target, &fields, MutationOptions::default())?;
        }

        if entity.is_vehicle() && report.threshold_exceeded {
            report.stages.push(AttackStage::SubsystemEscalation);
            report.escalation = escalate_subsystem(
                kernel,
                target,
                EscalationRequest {
                    preferred,
                    ion: packet.damage_type.is_ion(),
                },
            )?;
        }

        if let Some(marker) = terminal_marker(entity.kind, report.hp_after, report.threshold_exceeded)
        {
            kernel.apply_marker(target, marker)?;
            report.marker = Some(marker);
        }

        debug!(
            target: "saga::combat",
            entity = %target,
            absorbed = report.shield_absorbed,
            hp_damage = report.hp_damage,
            threshold_exceeded = report.threshold_exceeded,
            condition = report.condition_after.0,
            "damage applied"
        );
        Ok(report)
    }
}
