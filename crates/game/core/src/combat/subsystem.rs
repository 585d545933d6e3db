//! Vehicle subsystem escalation and repair.
//!
//! A subsystem moves one tier per trigger along
//! `Normal -> Damaged -> Disabled -> Destroyed`. The functions here decide
//! *what* changes; the kernel-facing wrappers at the bottom write the
//! result through a field path so recompute and hooks run as usual.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{CombatError, SubsystemError};
use crate::env::TablesOracle;
use crate::kernel::{FieldMap, MutationKernel, MutationOptions};
use crate::state::{EntityId, FieldPath, Subsystem, SubsystemMap, SubsystemTier};

/// Roll context for subsystem selection seeds.
pub(crate) const PICK_CONTEXT: u32 = 3;

/// Combined effect of every non-normal subsystem on one vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubsystemPenalties {
    /// Lowest remaining speed percentage.
    pub speed_percent: u8,
    /// Lowest remaining shield percentage.
    pub shield_percent: u8,
    /// Sum of finite attack penalties.
    pub attack_penalty: i32,
    /// Subsystems that no longer function, indexed by [`Subsystem::index`].
    pub offline: [bool; Subsystem::COUNT],
}

impl Default for SubsystemPenalties {
    fn default() -> Self {
        Self {
            speed_percent: 100,
            shield_percent: 100,
            attack_penalty: 0,
            offline: [false; Subsystem::COUNT],
        }
    }
}

impl SubsystemPenalties {
    pub fn is_offline(&self, subsystem: Subsystem) -> bool {
        self.offline[subsystem.index()]
    }

    /// Offline weapons block attacks outright.
    pub fn weapons_offline(&self) -> bool {
        self.is_offline(Subsystem::Weapons)
    }
}

/// Folds the penalty of every non-normal subsystem into one summary.
pub fn aggregate_penalties<T>(map: &SubsystemMap, tables: &T) -> SubsystemPenalties
where
    T: TablesOracle + ?Sized,
{
    map.iter()
        .filter(|(_, tier)| *tier != SubsystemTier::Normal)
        .fold(SubsystemPenalties::default(), |mut acc, (subsystem, tier)| {
            let penalty = tables.subsystem_penalty(subsystem, tier);
            acc.speed_percent = acc.speed_percent.min(penalty.speed_percent);
            acc.shield_percent = acc.shield_percent.min(penalty.shield_percent);
            acc.attack_penalty += penalty.attack_penalty;
            acc.offline[subsystem.index()] |= penalty.offline;
            acc
        })
}

/// What should be hit when a vehicle's threshold is exceeded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationRequest {
    /// Subsystem named by the game master. Wins when it can still take damage.
    pub preferred: Option<Subsystem>,
    pub ion: bool,
}

/// One subsystem moved one tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub subsystem: Subsystem,
    pub from: SubsystemTier,
    pub to: SubsystemTier,
}

/// Chooses the subsystem to escalate.
///
/// Order: a damageable preferred subsystem, then for ion damage shields and
/// then sensors, then a uniform pick among the rest. `pick(len)` must return
/// an index below `len`. Returns `None` when everything is destroyed.
pub fn select_subsystem(
    map: &SubsystemMap,
    request: EscalationRequest,
    pick: impl FnOnce(usize) -> usize,
) -> Option<Subsystem> {
    let damageable = map.damageable();
    if damageable.is_empty() {
        return None;
    }
    if let Some(preferred) = request.preferred
        && damageable.contains(&preferred)
    {
        return Some(preferred);
    }
    if request.ion {
        for favored in [Subsystem::Shields, Subsystem::Sensors] {
            if damageable.contains(&favored) {
                return Some(favored);
            }
        }
    }
    let index = pick(damageable.len()).min(damageable.len() - 1);
    Some(damageable[index])
}

/// Advances `subsystem` one tier in `map`.
pub fn escalate(map: &mut SubsystemMap, subsystem: Subsystem) -> Option<Escalation> {
    let from = map.tier(subsystem);
    let to = from.worsened()?;
    map.set_tier(subsystem, to);
    Some(Escalation { subsystem, from, to })
}

/// Moves `subsystem` one tier back toward normal.
///
/// A destroyed subsystem needs full servicing and cannot be field repaired.
/// Repairing a normal subsystem is a no-op.
pub fn repair(
    map: &mut SubsystemMap,
    entity: EntityId,
    subsystem: Subsystem,
) -> Result<Option<SubsystemTier>, SubsystemError> {
    match map.tier(subsystem) {
        SubsystemTier::Destroyed => Err(SubsystemError::RequiresServicing { entity, subsystem }),
        SubsystemTier::Normal => Ok(None),
        tier => {
            let improved = tier.improved().unwrap_or(SubsystemTier::Normal);
            map.set_tier(subsystem, improved);
            Ok(Some(improved))
        }
    }
}

fn vehicle_map(kernel: &MutationKernel<'_, '_>, id: EntityId) -> Result<SubsystemMap, CombatError> {
    kernel
        .entity(id)?
        .subsystems
        .ok_or(CombatError::Subsystem(SubsystemError::NotAVehicle(id)))
}

fn write_tier(
    kernel: &mut MutationKernel<'_, '_>,
    id: EntityId,
    subsystem: Subsystem,
    tier: SubsystemTier,
) -> Result<(), CombatError> {
    let mut fields = FieldMap::new();
    fields.insert(
        FieldPath::Subsystem(subsystem).to_string(),
        tier.to_string().into(),
    );
    kernel.update_entity(id, &fields, MutationOptions::default())?;
    Ok(())
}

/// Escalates one subsystem on vehicle `id` through the kernel.
pub fn escalate_subsystem(
    kernel: &mut MutationKernel<'_, '_>,
    id: EntityId,
    request: EscalationRequest,
) -> Result<Option<Escalation>, CombatError> {
    let mut map = vehicle_map(kernel, id)?;
    let rng = kernel.env().rng()?;
    let seed = kernel.draw_seed(id, PICK_CONTEXT);

    let Some(subsystem) = select_subsystem(&map, request, |len| rng.pick(seed, len)) else {
        debug!(target: "saga::combat", entity = %id, "every subsystem already destroyed");
        return Ok(None);
    };
    let Some(step) = escalate(&mut map, subsystem) else {
        return Ok(None);
    };

    write_tier(kernel, id, subsystem, step.to)?;
    debug!(
        target: "saga::combat",
        entity = %id,
        %subsystem,
        from = %step.from,
        to = %step.to,
        "subsystem escalated"
    );
    Ok(Some(step))
}

/// Repairs one tier of `subsystem` on vehicle `id` through the kernel.
pub fn repair_subsystem(
    kernel: &mut MutationKernel<'_, '_>,
    id: EntityId,
    subsystem: Subsystem,
) -> Result<Option<SubsystemTier>, CombatError> {
    let mut map = vehicle_map(kernel, id)?;
    let Some(tier) = repair(&mut map, id, subsystem)? else {
        return Ok(None);
    };
    write_tier(kernel, id, subsystem, tier)?;
    debug!(target: "saga::combat", entity = %id, %subsystem, %tier, "subsystem repaired");
    Ok(Some(tier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::RulesTables;

    fn wrecked_except(keep: &[Subsystem]) -> SubsystemMap {
        let mut map = SubsystemMap::new();
        for (subsystem, _) in SubsystemMap::new().iter() {
            if !keep.contains(&subsystem) {
                map.set_tier(subsystem, SubsystemTier::Destroyed);
            }
        }
        map
    }

    #[test]
    fn escalation_is_monotonic() {
        let mut map = SubsystemMap::new();
        let tiers: Vec<_> = (0..4)
            .map(|_| escalate(&mut map, Subsystem::Engines).map(|e| e.to))
            .collect();
        assert_eq!(
            tiers,
            vec![
                Some(SubsystemTier::Damaged),
                Some(SubsystemTier::Disabled),
                Some(SubsystemTier::Destroyed),
                None,
            ]
        );
    }

    #[test]
    fn preferred_wins_when_damageable() {
        let map = SubsystemMap::new();
        let request = EscalationRequest {
            preferred: Some(Subsystem::Comms),
            ion: true,
        };
        assert_eq!(select_subsystem(&map, request, |_| 0), Some(Subsystem::Comms));
    }

    #[test]
    fn destroyed_preference_falls_back() {
        let map = SubsystemMap::new().with_tier(Subsystem::Comms, SubsystemTier::Destroyed);
        let request = EscalationRequest {
            preferred: Some(Subsystem::Comms),
            ion: false,
        };
        let picked = select_subsystem(&map, request, |len| len - 1);
        assert_eq!(picked, Some(Subsystem::LifeSupport));
    }

    #[test]
    fn ion_prefers_shields_then_sensors() {
        let ion = EscalationRequest {
            preferred: None,
            ion: true,
        };
        assert_eq!(
            select_subsystem(&SubsystemMap::new(), ion, |_| 0),
            Some(Subsystem::Shields)
        );
        let map = SubsystemMap::new().with_tier(Subsystem::Shields, SubsystemTier::Destroyed);
        assert_eq!(select_subsystem(&map, ion, |_| 0), Some(Subsystem::Sensors));
    }

    #[test]
    fn nothing_left_is_a_noop() {
        let map = wrecked_except(&[]);
        assert_eq!(select_subsystem(&map, EscalationRequest::default(), |_| 0), None);
        let map = wrecked_except(&[Subsystem::Sensors]);
        assert_eq!(
            select_subsystem(&map, EscalationRequest::default(), |_| 3),
            Some(Subsystem::Sensors)
        );
    }

    #[test]
    fn repair_rules() {
        let id = EntityId(1);
        let mut map = SubsystemMap::new().with_tier(Subsystem::Weapons, SubsystemTier::Disabled);
        assert_eq!(
            repair(&mut map, id, Subsystem::Weapons),
            Ok(Some(SubsystemTier::Damaged))
        );
        assert_eq!(repair(&mut map, id, Subsystem::Engines), Ok(None));

        map.set_tier(Subsystem::Sensors, SubsystemTier::Destroyed);
        assert_eq!(
            repair(&mut map, id, Subsystem::Sensors),
            Err(SubsystemError::RequiresServicing {
                entity: id,
                subsystem: Subsystem::Sensors
            })
        );
    }

    #[test]
    fn aggregate_takes_minimums_and_sums() {
        let map = SubsystemMap::new()
            .with_tier(Subsystem::Engines, SubsystemTier::Damaged)
            .with_tier(Subsystem::Weapons, SubsystemTier::Damaged)
            .with_tier(Subsystem::Sensors, SubsystemTier::Disabled)
            .with_tier(Subsystem::Shields, SubsystemTier::Disabled);
        let penalties = aggregate_penalties(&map, &RulesTables::default());
        assert_eq!(penalties.speed_percent, 50);
        assert_eq!(penalties.shield_percent, 0);
        assert_eq!(penalties.attack_penalty, 7);
        assert!(!penalties.weapons_offline());
        assert!(penalties.is_offline(Subsystem::Shields));

        let map = map.with_tier(Subsystem::Weapons, SubsystemTier::Disabled);
        assert!(aggregate_penalties(&map, &RulesTables::default()).weapons_offline());
    }
}
