use crate::config::{DayScopePolicy, GameConfig};

/// Provides access to runtime configuration values.
pub trait ConfigOracle: Send + Sync {
    /// Upper bound on records per collection on one entity.
    fn max_records_per_collection(&self) -> usize;

    /// Maximum nesting of hooks that re-enter the kernel.
    fn max_hook_depth(&self) -> usize;

    /// How day-scoped rate limits are handled.
    fn day_scope(&self) -> DayScopePolicy;
}

impl ConfigOracle for GameConfig {
    fn max_records_per_collection(&self) -> usize {
        self.max_records_per_collection
    }

    fn max_hook_depth(&self) -> usize {
        self.max_hook_depth
    }

    fn day_scope(&self) -> DayScopePolicy {
        self.day_scope
    }
}
