//! Per-scope ability activation counters.
//!
//! Counters live here, not on entities. They only reset on explicit scope
//! boundary calls, never as a side effect of a lookup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DayScopePolicy;
use crate::env::ConfigOracle;
use crate::state::EntityId;

/// Reset boundary for an ability's usage counter.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LimitScope {
    Round,
    Encounter,
    /// Not persisted; see [`DayScopePolicy`].
    Day,
    Unlimited,
    /// Unrecognized scope name. Always denied.
    Unknown(String),
}

impl LimitScope {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Round => "round",
            Self::Encounter => "encounter",
            Self::Day => "day",
            Self::Unlimited => "unlimited",
            Self::Unknown(name) => name,
        }
    }
}

impl FromStr for LimitScope {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "round" => Self::Round,
            "encounter" => Self::Encounter,
            "day" => Self::Day,
            "unlimited" => Self::Unlimited,
            _ => Self::Unknown(s.to_owned()),
        })
    }
}

impl From<String> for LimitScope {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(scope) => scope,
            Err(never) => match never {},
        }
    }
}

impl From<LimitScope> for String {
    fn from(value: LimitScope) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Answer from [`RateLimiter::can_activate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitDecision {
    pub allowed: bool,
    /// Human-readable explanation when denied.
    pub reason: Option<String>,
}

impl LimitDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

type Counters = HashMap<EntityId, HashMap<String, u32>>;

/// Counter store a scope resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Store {
    Round,
    Encounter,
}

/// Injectable registry of usage counters.
#[derive(Clone, Debug, Default)]
pub struct RateLimiter {
    round: Counters,
    encounter: Counters,
    day_scope: DayScopePolicy,
}

impl RateLimiter {
    pub fn new(day_scope: DayScopePolicy) -> Self {
        Self {
            day_scope,
            ..Self::default()
        }
    }

    pub fn from_config<C: ConfigOracle + ?Sized>(config: &C) -> Self {
        Self::new(config.day_scope())
    }

    pub fn day_scope(&self) -> DayScopePolicy {
        self.day_scope
    }

    /// Store backing `scope`, or the reason it has none.
    fn store_for(&self, scope: &LimitScope) -> Result<Option<Store>, String> {
        match scope {
            LimitScope::Unlimited => Ok(None),
            LimitScope::Round => Ok(Some(Store::Round)),
            LimitScope::Encounter => Ok(Some(Store::Encounter)),
            LimitScope::Day => match self.day_scope {
                DayScopePolicy::FallbackToEncounter => {
                    warn!(
                        target: "saga::ability",
                        "day scope is not persisted, counting against the encounter"
                    );
                    Ok(Some(Store::Encounter))
                }
                DayScopePolicy::Reject => Err("day-scoped limits are not supported".to_owned()),
            },
            LimitScope::Unknown(name) => {
                warn!(target: "saga::ability", scope = %name, "unknown limit scope");
                Err(format!("unknown limit scope '{name}'"))
            }
        }
    }

    fn counters(&self, store: Store) -> &Counters {
        match store {
            Store::Round => &self.round,
            Store::Encounter => &self.encounter,
        }
    }

    fn count(&self, store: Store, entity: EntityId, ability: &str) -> u32 {
        self.counters(store)
            .get(&entity)
            .and_then(|abilities| abilities.get(ability))
            .copied()
            .unwrap_or(0)
    }

    /// Checks whether `ability` may be used once more within `scope`.
    pub fn can_activate(
        &self,
        entity: EntityId,
        ability: &str,
        scope: &LimitScope,
        max_uses: u32,
    ) -> LimitDecision {
        let store = match self.store_for(scope) {
            Ok(Some(store)) => store,
            Ok(None) => return LimitDecision::allow(),
            Err(reason) => return LimitDecision::deny(reason),
        };
        let used = self.count(store, entity, ability);
        if used >= max_uses {
            return LimitDecision::deny(format!(
                "{ability} already used {used}/{max_uses} times this {scope}"
            ));
        }
        LimitDecision::allow()
    }

    /// Counts one activation and returns the new count.
    ///
    /// Unlimited and unusable scopes record nothing and return 0.
    pub fn record_activation(&mut self, entity: EntityId, ability: &str, scope: &LimitScope) -> u32 {
        let Ok(Some(store)) = self.store_for(scope) else {
            return 0;
        };
        let counters = match store {
            Store::Round => &mut self.round,
            Store::Encounter => &mut self.encounter,
        };
        let count = counters
            .entry(entity)
            .or_default()
            .entry(ability.to_owned())
            .or_insert(0);
        *count += 1;
        debug!(target: "saga::ability", %entity, ability, %scope, count = *count, "activation recorded");
        *count
    }

    /// Current count for `ability` in `scope`.
    pub fn usage(&self, entity: EntityId, ability: &str, scope: &LimitScope) -> u32 {
        match self.store_for(scope) {
            Ok(Some(store)) => self.count(store, entity, ability),
            _ => 0,
        }
    }

    pub fn reset_round_limits(&mut self) {
        debug!(target: "saga::ability", entities = self.round.len(), "round limits reset");
        self.round.clear();
    }

    pub fn reset_encounter_limits(&mut self) {
        debug!(target: "saga::ability", entities = self.encounter.len(), "encounter limits reset");
        self.encounter.clear();
    }

    pub fn reset_all(&mut self) {
        self.round.clear();
        self.encounter.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HERO: EntityId = EntityId(1);

    #[test]
    fn round_limit_resets_on_boundary() {
        let mut limiter = RateLimiter::default();
        let scope = LimitScope::Round;

        assert!(limiter.can_activate(HERO, "rage", &scope, 1).allowed);
        limiter.record_activation(HERO, "rage", &scope);

        let denied = limiter.can_activate(HERO, "rage", &scope, 1);
        assert!(!denied.allowed);
        assert!(denied.reason.unwrap().contains("1/1"));

        limiter.reset_round_limits();
        assert!(limiter.can_activate(HERO, "rage", &scope, 1).allowed);
    }

    #[test]
    fn round_and_encounter_are_independent() {
        let mut limiter = RateLimiter::default();
        limiter.record_activation(HERO, "surge", &LimitScope::Encounter);
        assert_eq!(limiter.usage(HERO, "surge", &LimitScope::Round), 0);
        assert_eq!(limiter.usage(HERO, "surge", &LimitScope::Encounter), 1);

        limiter.reset_round_limits();
        assert!(!limiter.can_activate(HERO, "surge", &LimitScope::Encounter, 1).allowed);
        limiter.reset_encounter_limits();
        assert!(limiter.can_activate(HERO, "surge", &LimitScope::Encounter, 1).allowed);
    }

    #[test]
    fn unlimited_never_records() {
        let mut limiter = RateLimiter::default();
        assert_eq!(limiter.record_activation(HERO, "block", &LimitScope::Unlimited), 0);
        assert!(limiter.can_activate(HERO, "block", &LimitScope::Unlimited, 0).allowed);
    }

    #[test]
    fn unknown_scope_denies() {
        let mut limiter = RateLimiter::default();
        let scope: LimitScope = "fortnight".parse().unwrap();
        let decision = limiter.can_activate(HERO, "nap", &scope, 5);
        assert!(!decision.allowed);
        assert_eq!(decision.reason.as_deref(), Some("unknown limit scope 'fortnight'"));
        assert_eq!(limiter.record_activation(HERO, "nap", &scope), 0);
    }

    #[test]
    fn day_scope_policy() {
        let mut fallback = RateLimiter::new(DayScopePolicy::FallbackToEncounter);
        fallback.record_activation(HERO, "vision", &LimitScope::Day);
        assert_eq!(fallback.usage(HERO, "vision", &LimitScope::Encounter), 1);

        let strict = RateLimiter::new(DayScopePolicy::Reject);
        assert!(!strict.can_activate(HERO, "vision", &LimitScope::Day, 3).allowed);
    }

    #[test]
    fn counters_are_per_entity() {
        let mut limiter = RateLimiter::default();
        limiter.record_activation(HERO, "rage", &LimitScope::Round);
        assert!(limiter.can_activate(EntityId(2), "rage", &LimitScope::Round, 1).allowed);
    }

    #[test]
    fn scope_serde_accepts_any_string() {
        let scope: LimitScope = serde_json::from_str("\"Encounter\"").unwrap();
        assert_eq!(scope, LimitScope::Encounter);
        let scope: LimitScope = serde_json::from_str("\"week\"").unwrap();
        assert_eq!(scope, LimitScope::Unknown("week".into()));
        assert_eq!(serde_json::to_string(&LimitScope::Round).unwrap(), "\"round\"");
    }
}
