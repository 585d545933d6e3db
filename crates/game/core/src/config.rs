//! Game configuration constants and tunable parameters.

use serde::{Deserialize, Serialize};

/// How the rate limiter treats the `day` scope.
///
/// Day-long usage is not backed by persistent storage yet. The default keeps
/// the documented fallback to the encounter counter (with a warning);
/// `Reject` denies day-scoped activations instead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayScopePolicy {
    #[default]
    FallbackToEncounter,
    Reject,
}

/// Game configuration constants and tunable parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Upper bound on records per collection on a single entity.
    pub max_records_per_collection: usize,

    /// Maximum nesting of post-mutation hooks that call back into the kernel.
    pub max_hook_depth: usize,

    /// Day-scope rate limit policy.
    pub day_scope: DayScopePolicy,
}

impl GameConfig {
    // ===== compile-time constants =====
    /// Bottom of the condition track (helpless).
    pub const MAX_CONDITION_STEP: u8 = 5;
    /// Maximum simultaneous status markers on an entity.
    pub const MAX_STATUS_MARKERS: usize = 4;

    // ===== runtime-tunable defaults =====
    pub const DEFAULT_MAX_RECORDS_PER_COLLECTION: usize = 64;
    pub const DEFAULT_MAX_HOOK_DEPTH: usize = 8;

    pub fn new() -> Self {
        Self {
            max_records_per_collection: Self::DEFAULT_MAX_RECORDS_PER_COLLECTION,
            max_hook_depth: Self::DEFAULT_MAX_HOOK_DEPTH,
            day_scope: DayScopePolicy::default(),
        }
    }

    pub fn with_record_capacity(mut self, capacity: usize) -> Self {
        self.max_records_per_collection = capacity;
        self
    }

    pub fn with_day_scope(mut self, policy: DayScopePolicy) -> Self {
        self.day_scope = policy;
        self
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new()
    }
}
