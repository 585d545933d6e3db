//! Built-in handlers, one per execution type.
//!
//! Handlers read the entity they act for, but every write goes through the
//! mutation kernel or the attack pipeline.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::types::{AbilityError, AbilityOutcome, ExecutionRequest, ReactionResource};
use crate::combat::{AttackPipeline, AttackRequest, CombatError, DamageType, DiceFormula};
use crate::kernel::{FieldMap, MutationKernel, MutationOptions, MutationPlan, ProgressionDelta};
use crate::state::{EntityId, FieldPath};

/// Executes one kind of ability.
pub trait AbilityHandler: Send + Sync {
    fn execute(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        request: &ExecutionRequest,
    ) -> Result<AbilityOutcome, AbilityError>;
}

/// Decodes the request payload; `null` yields the payload's default.
fn payload<T>(request: &ExecutionRequest) -> Result<T, AbilityError>
where
    T: DeserializeOwned + Default,
{
    if request.payload.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(request.payload.clone()).map_err(|err| AbilityError::Payload {
        ability: request.ability_id.clone(),
        message: err.to_string(),
    })
}

fn write_points(
    kernel: &mut MutationKernel<'_, '_>,
    entity: EntityId,
    path: FieldPath,
    value: u32,
) -> Result<(), AbilityError> {
    let mut fields = FieldMap::new();
    fields.insert(path.to_string(), value.into());
    kernel.update_entity(entity, &fields, MutationOptions::default())?;
    Ok(())
}

fn one() -> u32 {
    1
}

/// Attack made as part of a force power.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerAttack {
    pub damage: DiceFormula,
    #[serde(default)]
    pub attack_bonus: i32,
    #[serde(default)]
    pub damage_type: DamageType,
    #[serde(default)]
    pub forced_hit: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForcePowerPayload {
    #[serde(default = "one")]
    pub force_points: u32,
    #[serde(default)]
    pub attack: Option<PowerAttack>,
    /// Hit points restored to the target, or to the user without one.
    #[serde(default)]
    pub healing: Option<u32>,
}

impl Default for ForcePowerPayload {
    fn default() -> Self {
        Self {
            force_points: 1,
            attack: None,
            healing: None,
        }
    }
}

/// Spends force points, then optionally attacks and heals.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForcePowerHandler;

impl AbilityHandler for ForcePowerHandler {
    fn execute(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        request: &ExecutionRequest,
    ) -> Result<AbilityOutcome, AbilityError> {
        let power: ForcePowerPayload = payload(request)?;
        let available = kernel.entity(request.entity)?.force_points;
        if available < power.force_points {
            return Err(AbilityError::InsufficientForcePoints {
                entity: request.entity,
                needed: power.force_points,
                available,
            });
        }
        // Reject before the debit: a failed activation spends nothing.
        if power.attack.is_some() {
            let Some(target) = request.target else {
                return Err(AbilityError::MissingTarget(request.ability_id.clone()));
            };
            if target == request.entity {
                return Err(CombatError::SelfTarget(request.entity).into());
            }
            kernel.entity(target)?;
            kernel.env().tables().map_err(CombatError::from)?;
            kernel.env().rng().map_err(CombatError::from)?;
        }
        if power.healing.is_some() {
            kernel.entity(request.target.unwrap_or(request.entity))?;
        }

        if power.force_points > 0 {
            write_points(
                kernel,
                request.entity,
                FieldPath::ForcePoints,
                available - power.force_points,
            )?;
        }

        let attack = match (&power.attack, request.target) {
            (Some(strike), Some(target)) => {
                let mut attack = AttackRequest::new(request.entity, target, strike.damage)
                    .with_attack_bonus(strike.attack_bonus)
                    .with_damage_type(strike.damage_type);
                attack.forced_hit = strike.forced_hit;
                Some(AttackPipeline::resolve(kernel, &attack)?)
            }
            _ => None,
        };

        let mut healed = 0;
        if let Some(amount) = power.healing {
            let recipient = request.target.unwrap_or(request.entity);
            let hp = kernel.entity(recipient)?.hit_points;
            let restored = hp.current.saturating_add(amount).min(hp.max);
            healed = restored - hp.current;
            if healed > 0 {
                write_points(kernel, recipient, FieldPath::HpCurrent, restored)?;
            }
        }

        debug!(
            target: "saga::ability",
            entity = %request.entity,
            ability = %request.ability_id,
            spent = power.force_points,
            healed,
            "force power executed"
        );
        Ok(AbilityOutcome::ForcePower {
            force_points_spent: power.force_points,
            attack,
            healed,
        })
    }
}

/// A talent grants content through a progression delta or a full plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TalentPayload {
    pub delta: Option<ProgressionDelta>,
    pub plan: Option<MutationPlan>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TalentHandler;

impl AbilityHandler for TalentHandler {
    fn execute(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        request: &ExecutionRequest,
    ) -> Result<AbilityOutcome, AbilityError> {
        let talent: TalentPayload = payload(request)?;
        let subject = request.target.unwrap_or(request.entity);
        match (talent.delta, talent.plan) {
            (Some(delta), None) => {
                let outcome = kernel.apply_delta(subject, delta, MutationOptions::default())?;
                Ok(AbilityOutcome::from_delta(&outcome))
            }
            (None, Some(plan)) => {
                let outcome = kernel.apply_plan(subject, plan, MutationOptions::default())?;
                Ok(AbilityOutcome::from_plan(&outcome))
            }
            (Some(_), Some(_)) => Err(AbilityError::Payload {
                ability: request.ability_id.clone(),
                message: "a talent carries a delta or a plan, not both".into(),
            }),
            (None, None) => Err(AbilityError::Payload {
                ability: request.ability_id.clone(),
                message: "a talent needs a delta or a plan".into(),
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionPayload {
    pub resource: ReactionResource,
    pub negates_hit: bool,
}

impl Default for ReactionPayload {
    fn default() -> Self {
        Self {
            resource: ReactionResource::Force,
            negates_hit: true,
        }
    }
}

/// Spends one force or destiny point in response to an incoming effect.
///
/// Whether the triggering hit is negated is reported, not enforced; the
/// caller owns the effect being reacted to.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReactionHandler;

impl AbilityHandler for ReactionHandler {
    fn execute(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        request: &ExecutionRequest,
    ) -> Result<AbilityOutcome, AbilityError> {
        let reaction: ReactionPayload = payload(request)?;
        let entity = kernel.entity(request.entity)?;
        let (path, available) = match reaction.resource {
            ReactionResource::Force => (FieldPath::ForcePoints, entity.force_points),
            ReactionResource::Destiny => (FieldPath::DestinyPoints, entity.destiny_points),
        };
        if available == 0 {
            return Err(match reaction.resource {
                ReactionResource::Force => AbilityError::InsufficientForcePoints {
                    entity: request.entity,
                    needed: 1,
                    available,
                },
                ReactionResource::Destiny => AbilityError::InsufficientDestinyPoints {
                    entity: request.entity,
                },
            });
        }

        write_points(kernel, request.entity, path, available - 1)?;
        debug!(
            target: "saga::ability",
            entity = %request.entity,
            ability = %request.ability_id,
            resource = ?reaction.resource,
            "reaction spent"
        );
        Ok(AbilityOutcome::Reaction {
            resource: reaction.resource,
            negates_hit: reaction.negates_hit,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralPayload {
    pub plan: MutationPlan,
}

/// Applies a mutation plan to the target, or to the user without one.
#[derive(Clone, Copy, Debug, Default)]
pub struct GeneralHandler;

impl AbilityHandler for GeneralHandler {
    fn execute(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        request: &ExecutionRequest,
    ) -> Result<AbilityOutcome, AbilityError> {
        let general: GeneralPayload = payload(request)?;
        let subject = request.target.unwrap_or(request.entity);
        let plan = kernel.apply_plan(subject, general.plan, MutationOptions::default())?;
        Ok(AbilityOutcome::General { plan })
    }
}
