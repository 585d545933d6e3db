//! Combat resolution.
//!
//! Pure rules live in small modules (`hit`, `scale`, `damage`, `dice`,
//! `subsystem`); [`AttackPipeline`] strings them together and performs every
//! write through the mutation kernel.

pub mod damage;
pub mod dice;
mod error;
pub mod hit;
pub mod pipeline;
pub mod scale;
pub mod subsystem;

pub use damage::{DamagePacket, DamageType, ShieldAbsorption};
pub use dice::{DiceError, DiceFormula};
pub use error::{CombatError, SubsystemError};
pub use hit::{HitModifiers, HitOutcome, HitRoll, determine_hit};
pub use pipeline::{
    AttackOutcome, AttackPipeline, AttackReport, AttackRequest, AttackStage, DamageReport,
};
pub use scale::scale_damage;
pub use subsystem::{
    Escalation, EscalationRequest, SubsystemPenalties, aggregate_penalties, escalate_subsystem,
    repair_subsystem,
};
