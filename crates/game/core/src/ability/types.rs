//! Request, result, and error types for ability execution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::limiter::LimitScope;
use crate::combat::{AttackReport, CombatError};
use crate::error::{ErrorContext, ErrorSeverity, GameError};
use crate::kernel::{DeltaOutcome, KernelError, PlanOutcome};
use crate::state::{EntityFields, EntityId};

/// Which handler an ability is dispatched to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionType {
    ForcePower,
    Talent,
    Reaction,
    General,
    /// A type with no built-in handler. Dispatch succeeds only if one was registered.
    Unknown(String),
}

impl ExecutionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ForcePower => "force_power",
            Self::Talent => "talent",
            Self::Reaction => "reaction",
            Self::General => "general",
            Self::Unknown(name) => name,
        }
    }
}

impl FromStr for ExecutionType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Ok(match normalized.as_str() {
            "force_power" | "forcepower" => Self::ForcePower,
            "talent" => Self::Talent,
            "reaction" => Self::Reaction,
            "general" => Self::General,
            _ => Self::Unknown(s.to_owned()),
        })
    }
}

impl From<String> for ExecutionType {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<ExecutionType> for String {
    fn from(value: ExecutionType) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ability activation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub ability_id: String,
    pub execution_type: ExecutionType,
    pub entity: EntityId,
    #[serde(default)]
    pub target: Option<EntityId>,
    /// Handler-specific parameters.
    #[serde(default)]
    pub payload: Value,
    /// `None` means unlimited.
    #[serde(default)]
    pub limit_scope: Option<LimitScope>,
    #[serde(default)]
    pub max_uses: Option<u32>,
}

impl ExecutionRequest {
    pub fn new(ability_id: impl Into<String>, execution_type: ExecutionType, entity: EntityId) -> Self {
        Self {
            ability_id: ability_id.into(),
            execution_type,
            entity,
            target: None,
            payload: Value::Null,
            limit_scope: None,
            max_uses: None,
        }
    }

    pub fn at(mut self, target: EntityId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn limited(mut self, scope: LimitScope, max_uses: u32) -> Self {
        self.limit_scope = Some(scope);
        self.max_uses = Some(max_uses);
        self
    }

    pub(crate) fn scope(&self) -> LimitScope {
        self.limit_scope.clone().unwrap_or(LimitScope::Unlimited)
    }
}

/// What a handler did.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AbilityOutcome {
    ForcePower {
        force_points_spent: u32,
        attack: Option<AttackReport>,
        healed: u32,
    },
    Talent {
        fields: EntityFields,
        added: usize,
        deleted: usize,
    },
    Reaction {
        resource: ReactionResource,
        negates_hit: bool,
    },
    General {
        plan: PlanOutcome,
    },
    /// Produced by a handler registered from outside this crate.
    Custom { data: Value },
}

impl AbilityOutcome {
    pub(crate) fn from_delta(outcome: &DeltaOutcome) -> Self {
        Self::Talent {
            fields: outcome.fields,
            added: outcome.added.len(),
            deleted: outcome.deleted.len(),
        }
    }

    pub(crate) fn from_plan(outcome: &PlanOutcome) -> Self {
        Self::Talent {
            fields: outcome.fields,
            added: outcome.added.len(),
            deleted: outcome.deleted.len(),
        }
    }
}

/// Resource a reaction spends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionResource {
    #[default]
    Force,
    Destiny,
}

/// Router answer. Rate-limit denials and unknown types are reported here,
/// not as errors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub reason: Option<String>,
    pub limit_blocked: bool,
    pub outcome: Option<AbilityOutcome>,
}

impl ExecutionResult {
    pub fn succeeded(outcome: AbilityOutcome) -> Self {
        Self {
            success: true,
            reason: None,
            limit_blocked: false,
            outcome: Some(outcome),
        }
    }

    pub fn blocked(reason: Option<String>) -> Self {
        Self {
            success: false,
            reason,
            limit_blocked: true,
            outcome: None,
        }
    }

    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
            limit_blocked: false,
            outcome: None,
        }
    }
}

/// Errors surfaced by ability handlers and the router.
#[derive(Clone, Debug, thiserror::Error)]
pub enum AbilityError {
    #[error("invalid ability request: {0}")]
    InvalidRequest(&'static str),

    #[error("entity {entity} needs {needed} force point(s), has {available}")]
    InsufficientForcePoints {
        entity: EntityId,
        needed: u32,
        available: u32,
    },

    #[error("entity {entity} has no destiny points left")]
    InsufficientDestinyPoints { entity: EntityId },

    #[error("ability '{0}' needs a target")]
    MissingTarget(String),

    #[error("malformed payload for '{ability}': {message}")]
    Payload { ability: String, message: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Combat(#[from] CombatError),
}

impl GameError for AbilityError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidRequest(_) | Self::MissingTarget(_) | Self::Payload { .. } => {
                ErrorSeverity::Validation
            }
            Self::InsufficientForcePoints { .. } | Self::InsufficientDestinyPoints { .. } => {
                ErrorSeverity::Recoverable
            }
            Self::Kernel(err) => err.severity(),
            Self::Combat(err) => err.severity(),
        }
    }

    fn context(&self) -> Option<ErrorContext> {
        match self {
            Self::InsufficientForcePoints { entity, .. }
            | Self::InsufficientDestinyPoints { entity } => {
                Some(ErrorContext::new("execute_ability").with_entity(*entity))
            }
            Self::Kernel(err) => err.context(),
            Self::Combat(err) => err.context(),
            _ => None,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "ABILITY_INVALID_REQUEST",
            Self::InsufficientForcePoints { .. } => "ABILITY_INSUFFICIENT_FORCE",
            Self::InsufficientDestinyPoints { .. } => "ABILITY_INSUFFICIENT_DESTINY",
            Self::MissingTarget(_) => "ABILITY_MISSING_TARGET",
            Self::Payload { .. } => "ABILITY_BAD_PAYLOAD",
            Self::Kernel(err) => err.error_code(),
            Self::Combat(err) => err.error_code(),
        }
    }
}
