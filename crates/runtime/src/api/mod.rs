//! Public API surface for runtime consumers.
//!
//! Callers drive the world through [`WorldHandle`] and see failures as
//! [`RuntimeError`].

mod errors;
mod handle;

pub use errors::{Result, RuntimeError};
pub use handle::WorldHandle;
