//! Ability activation: rate limiting and typed dispatch.
//!
//! [`AbilityRouter::execute`] validates a request, asks the [`RateLimiter`]
//! whether it may run, dispatches it to the handler registered for its
//! [`ExecutionType`], and records usage only after the handler succeeded.

mod handlers;
mod limiter;
mod router;
mod types;

pub use handlers::{
    AbilityHandler, ForcePowerHandler, ForcePowerPayload, GeneralHandler, GeneralPayload,
    PowerAttack, ReactionHandler, ReactionPayload, TalentHandler, TalentPayload,
};
pub use limiter::{LimitDecision, LimitScope, RateLimiter};
pub use router::{AbilityRouter, HandlerRegistry};
pub use types::{
    AbilityError, AbilityOutcome, ExecutionRequest, ExecutionResult, ExecutionType,
    ReactionResource,
};
