//! Typed payloads published on each topic.

use serde::{Deserialize, Serialize};

use saga_core::combat::{AttackReport, DamageReport, Escalation};
use saga_core::transaction::{TransactionKind, TransactionReceipt};
use saga_core::{EntityChanges, EntityId};

use crate::workers::ResetScope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EntityEvent {
    Spawned { entity: EntityId },
    /// Fields one kernel call touched on one entity.
    Changed(EntityChanges),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    AttackResolved(Box<AttackReport>),
    DamageApplied {
        entity: EntityId,
        report: Box<DamageReport>,
    },
    SubsystemEscalated {
        entity: EntityId,
        escalation: Escalation,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AbilityEvent {
    Executed {
        entity: EntityId,
        ability_id: String,
        success: bool,
        limit_blocked: bool,
    },
    LimitsReset { scope: ResetScope },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransactionEvent {
    Settled(Box<TransactionReceipt>),
    /// The transaction failed after validation; `rolled_back` is false when
    /// at least one participant could not be restored.
    Failed {
        kind: TransactionKind,
        step: String,
        rolled_back: bool,
    },
}
