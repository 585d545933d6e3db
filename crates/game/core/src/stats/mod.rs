//! Derived statistics.
//!
//! Persistent entity fields are the single source of truth. Everything in
//! [`DerivedStats`] is a pure function of those fields plus the rules tables,
//! recomputed by the kernel exactly once per mutation operation.

pub mod derived;

pub use derived::DerivedStats;
