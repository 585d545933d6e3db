//! Worker tasks that back the runtime orchestration.
//!
//! The kernel worker is the single owner of world state; every mutation a
//! caller requests is queued to it as a [`Command`].

mod kernel;

pub use kernel::{Command, KernelWorker, ResetScope};
