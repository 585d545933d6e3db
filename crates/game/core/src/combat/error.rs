//! Error types for combat resolution.

use super::dice::DiceError;
use crate::env::OracleError;
use crate::error::{ErrorContext, ErrorSeverity, GameError};
use crate::kernel::KernelError;
use crate::state::{EntityId, Subsystem};

/// Subsystem state machine errors.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SubsystemError {
    #[error("{subsystem} on entity {entity} is destroyed and requires servicing")]
    RequiresServicing { entity: EntityId, subsystem: Subsystem },

    #[error("entity {0} has no subsystems")]
    NotAVehicle(EntityId),
}

impl GameError for SubsystemError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::RequiresServicing { .. } => ErrorSeverity::Recoverable,
            Self::NotAVehicle(_) => ErrorSeverity::Validation,
        }
    }

    fn context(&self) -> Option<ErrorContext> {
        match self {
            Self::RequiresServicing { entity, .. } => {
                Some(ErrorContext::new("repair_subsystem").with_entity(*entity))
            }
            Self::NotAVehicle(entity) => Some(ErrorContext::new("subsystem").with_entity(*entity)),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::RequiresServicing { .. } => "SUBSYSTEM_REQUIRES_SERVICING",
            Self::NotAVehicle(_) => "SUBSYSTEM_NOT_A_VEHICLE",
        }
    }
}

/// Errors surfaced by the attack pipeline.
#[derive(Clone, Debug, thiserror::Error)]
pub enum CombatError {
    #[error("entity {0} cannot attack itself")]
    SelfTarget(EntityId),

    #[error(transparent)]
    Dice(#[from] DiceError),

    #[error(transparent)]
    Subsystem(#[from] SubsystemError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl GameError for CombatError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::SelfTarget(_) | Self::Dice(_) => ErrorSeverity::Validation,
            Self::Subsystem(err) => err.severity(),
            Self::Kernel(err) => err.severity(),
            Self::Oracle(err) => err.severity(),
        }
    }

    fn context(&self) -> Option<ErrorContext> {
        match self {
            Self::SelfTarget(id) => Some(ErrorContext::new("resolve_attack").with_entity(*id)),
            Self::Dice(_) => None,
            Self::Subsystem(err) => err.context(),
            Self::Kernel(err) => err.context(),
            Self::Oracle(err) => err.context(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::SelfTarget(_) => "COMBAT_SELF_TARGET",
            Self::Dice(_) => "COMBAT_BAD_DICE",
            Self::Subsystem(err) => err.error_code(),
            Self::Kernel(err) => err.error_code(),
            Self::Oracle(err) => err.error_code(),
        }
    }
}
