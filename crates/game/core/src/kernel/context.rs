//! Per-call options and the reentry guards they drive.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::state::{EntityFields, EntityId};

/// Where a mutation request came from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOrigin {
    /// A caller outside the kernel (UI action, scheduled event, rule trigger).
    #[default]
    Direct,
    /// A data migration. At most one may be in flight per entity.
    Migration,
    /// Issued by a post-mutation hook.
    Hook,
}

/// Options accompanying a field mutation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationOptions {
    pub origin: MutationOrigin,
    /// Suppresses a second write carrying the same key on the same entity
    /// while the first is still in flight.
    pub guard_key: Option<String>,
}

impl MutationOptions {
    pub fn migration() -> Self {
        Self {
            origin: MutationOrigin::Migration,
            guard_key: None,
        }
    }

    pub fn from_hook() -> Self {
        Self {
            origin: MutationOrigin::Hook,
            guard_key: None,
        }
    }

    pub fn guarded(key: impl Into<String>) -> Self {
        Self {
            origin: MutationOrigin::Direct,
            guard_key: Some(key.into()),
        }
    }
}

/// Why a mutation was suppressed instead of applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreventReason {
    /// The same guard key is already being applied to this entity.
    DuplicateGuard(String),
    /// A migration-origin mutation is already running on this entity.
    MigrationReentry,
}

/// Result of a field mutation that passed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationOutcome {
    Applied { entity: EntityId, fields: EntityFields },
    Prevented { entity: EntityId, reason: PreventReason },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    pub fn is_prevented(&self) -> bool {
        matches!(self, Self::Prevented { .. })
    }
}

/// Guards currently held by running operations.
#[derive(Debug, Default)]
pub(super) struct InFlight {
    guards: HashSet<(EntityId, String)>,
    migrations: HashSet<EntityId>,
}

impl InFlight {
    /// Claims the guards `opts` asks for, or reports why it cannot.
    pub(super) fn enter(&mut self, id: EntityId, opts: &MutationOptions) -> Option<PreventReason> {
        if opts.origin == MutationOrigin::Migration && self.migrations.contains(&id) {
            return Some(PreventReason::MigrationReentry);
        }
        if let Some(key) = &opts.guard_key
            && self.guards.contains(&(id, key.clone()))
        {
            return Some(PreventReason::DuplicateGuard(key.clone()));
        }

        if opts.origin == MutationOrigin::Migration {
            self.migrations.insert(id);
        }
        if let Some(key) = &opts.guard_key {
            self.guards.insert((id, key.clone()));
        }
        None
    }

    /// Releases whatever `enter` claimed for the same arguments.
    pub(super) fn leave(&mut self, id: EntityId, opts: &MutationOptions) {
        if opts.origin == MutationOrigin::Migration {
            self.migrations.remove(&id);
        }
        if let Some(key) = &opts.guard_key {
            self.guards.remove(&(id, key.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_blocks_until_released() {
        let mut in_flight = InFlight::default();
        let opts = MutationOptions::guarded("heal");
        assert_eq!(in_flight.enter(EntityId(1), &opts), None);
        assert_eq!(
            in_flight.enter(EntityId(1), &opts),
            Some(PreventReason::DuplicateGuard("heal".into()))
        );
        assert_eq!(in_flight.enter(EntityId(2), &opts), None);
        in_flight.leave(EntityId(1), &opts);
        assert_eq!(in_flight.enter(EntityId(1), &opts), None);
    }

    #[test]
    fn migrations_do_not_nest() {
        let mut in_flight = InFlight::default();
        let opts = MutationOptions::migration();
        assert_eq!(in_flight.enter(EntityId(5), &opts), None);
        assert_eq!(
            in_flight.enter(EntityId(5), &opts),
            Some(PreventReason::MigrationReentry)
        );
        assert_eq!(in_flight.enter(EntityId(5), &MutationOptions::default()), None);
    }
}
