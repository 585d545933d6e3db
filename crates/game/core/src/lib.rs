//! Deterministic entity mutation and combat rules.
//!
//! `saga-core` owns the canonical rules: the world state, the mutation
//! kernel that is the only writer of that state, and the combat, ability
//! and transaction layers built on top of it. It performs no I/O. Content,
//! rule tables, configuration and dice arrive through the oracle traits in
//! [`env`]; the runtime crate owns a world across calls and serializes
//! concurrent callers onto one kernel.
pub mod ability;
pub mod combat;
pub mod config;
pub mod env;
pub mod error;
pub mod kernel;
pub mod state;
pub mod stats;
pub mod transaction;

pub use ability::{
    AbilityError, AbilityHandler, AbilityOutcome, AbilityRouter, ExecutionRequest,
    ExecutionResult, ExecutionType, HandlerRegistry, LimitDecision, LimitScope, RateLimiter,
};
pub use combat::{
    AttackOutcome, AttackPipeline, AttackReport, AttackRequest, CombatError, DamagePacket,
    DamageType, DiceFormula, SubsystemError,
};
pub use config::{DayScopePolicy, GameConfig};
pub use env::{
    ConfigOracle, ContentOracle, Env, FeatureDefinition, FeatureId, GameEnv, OracleError, PcgRng,
    RngOracle, RulesTables, TablesOracle,
};
pub use error::{ErrorContext, ErrorSeverity, GameError};
pub use kernel::{
    EntityMutator, FieldMap, KernelError, MutationKernel, MutationOptions, MutationOutcome,
    MutationPlan, ProgressionDelta, ValidationError,
};
pub use state::{
    Collection, EntityChanges, EntityFields, EntityId, EntityKind, EntitySnapshot, EntityState,
    RecordData, RecordId, StatusMarker, Subsystem, SubsystemTier, WorldState,
};
pub use stats::DerivedStats;
pub use transaction::{
    PurchaseRequest, SaleRequest, TransactionCoordinator, TransactionError, TransactionReceipt,
    TransferRequest,
};
