//! Async host for a saga world.
//!
//! The runtime owns one [`saga_core::WorldState`] inside a tokio task and
//! serializes every caller onto it through a command channel:
//! - [`WorldHandle`] - cloneable client API (one method per kernel, combat,
//!   ability and transaction operation)
//! - [`KernelWorker`] - the task that owns the world and rate limiter
//! - [`EventBus`] - topic broadcast of entity changes and domain events
//! - [`OracleManager`] - shared content, tables, config and dice
//!
//! Build one with [`Runtime::builder`].
pub mod api;
pub mod events;
pub mod oracle;
pub mod runtime;
pub mod workers;

pub use api::{Result, RuntimeError, WorldHandle};
pub use events::{
    AbilityEvent, CombatEvent, EntityEvent, Event, EventBus, Topic, TransactionEvent,
};
pub use oracle::OracleManager;
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use workers::{Command, KernelWorker, ResetScope};
