//! Topic-based event bus for runtime events.
//!
//! The kernel worker publishes after every command: one `Entity` event per
//! touched entity, plus a domain event for combat, abilities and
//! transactions. Consumers subscribe only to the topics they need.

mod bus;
mod types;

pub use bus::{Event, EventBus, Topic};
pub use types::{AbilityEvent, CombatEvent, EntityEvent, TransactionEvent};
