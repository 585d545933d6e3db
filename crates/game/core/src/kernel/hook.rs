//! Post-mutation hooks.
//!
//! Hooks run after an operation's recompute pass, in priority order (lower
//! first). They observe the change bitmask of each touched entity and may
//! issue further kernel calls, which notify hooks again one level deeper.

use std::sync::Arc;

use super::{KernelError, MutationKernel};
use crate::state::{EntityChanges, EntityFields, EntityState, StatusMarker};

/// How a hook failure is handled.
///
/// - Critical hooks must succeed or the triggering operation reports failure
/// - Important hooks log errors but allow continuation
/// - Optional hooks fail silently at debug level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookCriticality {
    Critical,
    Important,
    Optional,
}

/// Reacts to committed entity changes.
pub trait MutationHook: Send + Sync {
    /// Human-readable name for logging and depth errors.
    fn name(&self) -> &'static str;

    /// Lower values execute first.
    fn priority(&self) -> i32 {
        0
    }

    fn criticality(&self) -> HookCriticality {
        HookCriticality::Important
    }

    /// Checks whether this hook cares about `changes` given the entity's committed state.
    fn should_trigger(&self, changes: &EntityChanges, entity: &EntityState) -> bool;

    /// Applies follow-up effects through the kernel.
    fn apply(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        changes: &EntityChanges,
    ) -> Result<(), KernelError>;
}

/// Priority-ordered hook set shared by kernels.
#[derive(Clone)]
pub struct HookRegistry {
    hooks: Arc<[Arc<dyn MutationHook>]>,
}

impl HookRegistry {
    pub fn new(mut hooks: Vec<Arc<dyn MutationHook>>) -> Self {
        hooks.sort_by_key(|h| h.priority());
        Self {
            hooks: hooks.into(),
        }
    }

    /// No hooks at all.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// The standard hook set: [`HelplessHook`].
    pub fn default_hooks() -> Self {
        Self::new(vec![Arc::new(HelplessHook) as Arc<dyn MutationHook>])
    }

    /// Returns a registry with `hook` added in priority position.
    pub fn with(&self, hook: Arc<dyn MutationHook>) -> Self {
        let mut hooks: Vec<_> = self.hooks.iter().cloned().collect();
        hooks.push(hook);
        Self::new(hooks)
    }

    pub(super) fn shared(&self) -> Arc<[Arc<dyn MutationHook>]> {
        Arc::clone(&self.hooks)
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Hook names and priorities in execution order.
    pub fn names(&self) -> impl Iterator<Item = (&'static str, i32)> + '_ {
        self.hooks.iter().map(|h| (h.name(), h.priority()))
    }
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::default_hooks()
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}

/// Marks entities that reached the bottom of the condition track.
///
/// Characters and creatures fall unconscious; vehicles are disabled.
#[derive(Debug)]
pub struct HelplessHook;

impl HelplessHook {
    fn marker_for(entity: &EntityState) -> StatusMarker {
        if entity.is_vehicle() {
            StatusMarker::Disabled
        } else {
            StatusMarker::Unconscious
        }
    }
}

impl MutationHook for HelplessHook {
    fn name(&self) -> &'static str {
        "helpless"
    }

    fn priority(&self) -> i32 {
        -10
    }

    fn criticality(&self) -> HookCriticality {
        HookCriticality::Critical
    }

    fn should_trigger(&self, changes: &EntityChanges, entity: &EntityState) -> bool {
        changes.fields.contains(EntityFields::CONDITION)
            && entity.condition.is_helpless()
            && !entity.markers.has(Self::marker_for(entity))
    }

    fn apply(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        changes: &EntityChanges,
    ) -> Result<(), KernelError> {
        let marker = match kernel.world().entity(changes.id) {
            Some(entity) => Self::marker_for(entity),
            None => return Ok(()),
        };
        kernel.apply_marker(changes.id, marker)?;
        Ok(())
    }
}
