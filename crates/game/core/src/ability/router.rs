//! Dispatches ability requests to handlers behind the rate-limit gate.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use super::handlers::{
    AbilityHandler, ForcePowerHandler, GeneralHandler, ReactionHandler, TalentHandler,
};
use super::limiter::{LimitScope, RateLimiter};
use super::types::{AbilityError, ExecutionRequest, ExecutionResult, ExecutionType};
use crate::kernel::MutationKernel;

/// Handlers keyed by execution type.
#[derive(Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<ExecutionType, Arc<dyn AbilityHandler>>,
}

impl HandlerRegistry {
    pub fn empty() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The four built-in handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(ExecutionType::ForcePower, Arc::new(ForcePowerHandler));
        registry.register(ExecutionType::Talent, Arc::new(TalentHandler));
        registry.register(ExecutionType::Reaction, Arc::new(ReactionHandler));
        registry.register(ExecutionType::General, Arc::new(GeneralHandler));
        registry
    }

    /// Adds or replaces the handler for `kind`.
    pub fn register(&mut self, kind: ExecutionType, handler: Arc<dyn AbilityHandler>) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: &ExecutionType) -> Option<&Arc<dyn AbilityHandler>> {
        self.handlers.get(kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// Validates, rate-limits, and dispatches ability requests.
#[derive(Clone, Debug, Default)]
pub struct AbilityRouter {
    registry: HandlerRegistry,
}

impl AbilityRouter {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry_mut(&mut self) -> &mut HandlerRegistry {
        &mut self.registry
    }

    /// Runs one request: validate, gate, dispatch, record.
    ///
    /// Usage is recorded only after the handler returns `Ok`. A denied
    /// activation or an unhandled type is an unsuccessful result, not an
    /// error; handler failures propagate.
    pub fn execute(
        &self,
        kernel: &mut MutationKernel<'_, '_>,
        limiter: &mut RateLimiter,
        request: &ExecutionRequest,
    ) -> Result<ExecutionResult, AbilityError> {
        validate(kernel, request)?;

        let scope = request.scope();
        let max_uses = request.max_uses.unwrap_or(u32::MAX);
        let decision = limiter.can_activate(request.entity, &request.ability_id, &scope, max_uses);
        if !decision.allowed {
            debug!(
                target: "saga::ability",
                entity = %request.entity,
                ability = %request.ability_id,
                reason = ?decision.reason,
                "activation blocked"
            );
            return Ok(ExecutionResult::blocked(decision.reason));
        }

        let Some(handler) = self.registry.get(&request.execution_type) else {
            warn!(
                target: "saga::ability",
                ability = %request.ability_id,
                kind = %request.execution_type,
                "no handler for execution type"
            );
            return Ok(ExecutionResult::unsupported(format!(
                "unknown execution type '{}'",
                request.execution_type
            )));
        };

        let outcome = handler.execute(kernel, request)?;
        let uses = limiter.record_activation(request.entity, &request.ability_id, &scope);
        debug!(
            target: "saga::ability",
            entity = %request.entity,
            ability = %request.ability_id,
            kind = %request.execution_type,
            uses,
            "ability executed"
        );
        Ok(ExecutionResult::succeeded(outcome))
    }
}

fn validate(
    kernel: &MutationKernel<'_, '_>,
    request: &ExecutionRequest,
) -> Result<(), AbilityError> {
    if request.ability_id.trim().is_empty() {
        return Err(AbilityError::InvalidRequest("ability id is empty"));
    }
    kernel.entity(request.entity)?;
    if let Some(target) = request.target {
        kernel.entity(target)?;
    }
    let limited = !matches!(request.scope(), LimitScope::Unlimited);
    if limited && request.max_uses.is_none() {
        return Err(AbilityError::InvalidRequest("a limited scope needs max_uses"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::ability::{AbilityOutcome, ReactionResource};
    use crate::combat::CombatError;
    use crate::config::GameConfig;
    use crate::env::{GameEnv, RngOracle, RulesTables};
    use crate::kernel::ValidationError;
    use crate::state::{EntityId, EntityState, WorldState};

    struct FixedRng(u32);

    impl RngOracle for FixedRng {
        fn next_u32(&self, _seed: u64) -> u32 {
            self.0
        }
    }

    struct Fixture {
        tables: RulesTables,
        config: GameConfig,
        rng: FixedRng,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tables: RulesTables::default(),
                config: GameConfig::default(),
                rng: FixedRng(19),
            }
        }

        fn env(&self) -> GameEnv<'_> {
            GameEnv::rules_only(&self.tables, &self.config, &self.rng)
        }
    }

    fn jedi(kernel: &mut MutationKernel<'_, '_>, force: u32) -> EntityId {
        kernel
            .spawn(
                EntityState::character("Vessa")
                    .with_hit_points(30)
                    .with_force_points(force),
            )
            .unwrap()
    }

    fn block(entity: EntityId) -> ExecutionRequest {
        ExecutionRequest::new("block", ExecutionType::Reaction, entity)
            .limited(LimitScope::Round, 1)
    }

    #[test]
    fn round_limit_gates_through_router() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let mut limiter = RateLimiter::default();
        let router = AbilityRouter::default();
        let user = jedi(&mut kernel, 5);

        let first = router.execute(&mut kernel, &mut limiter, &block(user)).unwrap();
        assert!(first.success);
        assert_eq!(kernel.entity(user).unwrap().force_points, 4);

        let second = router.execute(&mut kernel, &mut limiter, &block(user)).unwrap();
        assert!(!second.success);
        assert!(second.limit_blocked);
        assert!(second.reason.is_some());
        assert_eq!(kernel.entity(user).unwrap().force_points, 4);

        limiter.reset_round_limits();
        assert!(router.execute(&mut kernel, &mut limiter, &block(user)).unwrap().success);
    }

    #[test]
    fn failed_handler_records_nothing() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let mut limiter = RateLimiter::default();
        let user = jedi(&mut kernel, 0);

        let err = AbilityRouter::default()
            .execute(&mut kernel, &mut limiter, &block(user))
            .unwrap_err();
        assert!(matches!(err, AbilityError::InsufficientForcePoints { .. }));
        assert_eq!(limiter.usage(user, "block", &LimitScope::Round), 0);
    }

    #[test]
    fn unknown_type_is_unsuccessful_and_unrecorded() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let mut limiter = RateLimiter::default();
        let user = jedi(&mut kernel, 1);

        let request = ExecutionRequest::new("chant", ExecutionType::Unknown("ritual".into()), user)
            .limited(LimitScope::Encounter, 2);
        let result = AbilityRouter::default()
            .execute(&mut kernel, &mut limiter, &request)
            .unwrap();
        assert!(!result.success);
        assert!(!result.limit_blocked);
        assert_eq!(limiter.usage(user, "chant", &LimitScope::Encounter), 0);
    }

    struct Ritual;

    impl AbilityHandler for Ritual {
        fn execute(
            &self,
            _kernel: &mut MutationKernel<'_, '_>,
            request: &ExecutionRequest,
        ) -> Result<AbilityOutcome, AbilityError> {
            Ok(AbilityOutcome::Custom {
                data: json!({ "chanted": request.ability_id }),
            })
        }
    }

    #[test]
    fn registered_handler_extends_dispatch() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let mut limiter = RateLimiter::default();
        let user = jedi(&mut kernel, 1);

        let mut router = AbilityRouter::default();
        router
            .registry_mut()
            .register(ExecutionType::Unknown("ritual".into()), Arc::new(Ritual));
        let request = ExecutionRequest::new("chant", ExecutionType::Unknown("ritual".into()), user);
        let result = router.execute(&mut kernel, &mut limiter, &request).unwrap();
        assert!(result.success);
    }

    #[test]
    fn limited_scope_without_max_is_invalid() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let user = jedi(&mut kernel, 1);

        let mut request = block(user);
        request.max_uses = None;
        let err = AbilityRouter::default()
            .execute(&mut kernel, &mut RateLimiter::default(), &request)
            .unwrap_err();
        assert!(matches!(err, AbilityError::InvalidRequest(_)));
    }

    #[test]
    fn missing_target_entity_is_rejected() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let user = jedi(&mut kernel, 1);

        let request = ExecutionRequest::new("push", ExecutionType::ForcePower, user).at(EntityId(99));
        let err = AbilityRouter::default()
            .execute(&mut kernel, &mut RateLimiter::default(), &request)
            .unwrap_err();
        let AbilityError::Kernel(kernel_err) = err else {
            panic!("expected kernel error, got {err:?}");
        };
        assert_eq!(
            kernel_err.as_validation(),
            Some(&ValidationError::EntityNotFound(EntityId(99)))
        );
    }

    #[test]
    fn force_power_attacks_and_heals() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let user = jedi(&mut kernel, 3);
        let droid = kernel
            .spawn(EntityState::creature("Probe").with_hit_points(20))
            .unwrap();

        let lightning = ExecutionRequest::new("lightning", ExecutionType::ForcePower, user)
            .at(droid)
            .with_payload(json!({
                "force_points": 2,
                "attack": { "damage": "1d6", "forced_hit": true }
            }));
        let result = AbilityRouter::default()
            .execute(&mut kernel, &mut RateLimiter::default(), &lightning)
            .unwrap();

        let Some(AbilityOutcome::ForcePower { force_points_spent, attack, .. }) = result.outcome else {
            panic!("expected force power outcome");
        };
        assert_eq!(force_points_spent, 2);
        assert!(attack.unwrap().is_hit());
        assert_eq!(kernel.entity(user).unwrap().force_points, 1);
        // forced hits never crit: d6 shows 2
        assert_eq!(kernel.entity(droid).unwrap().hit_points.current, 18);

        let mend = ExecutionRequest::new("mend", ExecutionType::ForcePower, user)
            .at(droid)
            .with_payload(json!({ "healing": 10 }));
        let result = AbilityRouter::default()
            .execute(&mut kernel, &mut RateLimiter::default(), &mend)
            .unwrap();
        assert!(matches!(
            result.outcome,
            Some(AbilityOutcome::ForcePower { healed: 2, .. })
        ));
        assert_eq!(kernel.entity(droid).unwrap().hit_points.current, 20);
    }

    #[test]
    fn rejected_force_attack_keeps_force_points() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let mut limiter = RateLimiter::default();
        let user = jedi(&mut kernel, 3);

        let backlash = ExecutionRequest::new("backlash", ExecutionType::ForcePower, user)
            .at(user)
            .limited(LimitScope::Encounter, 1)
            .with_payload(json!({ "force_points": 2, "attack": { "damage": "2d6" } }));
        let err = AbilityRouter::default()
            .execute(&mut kernel, &mut limiter, &backlash)
            .unwrap_err();

        assert!(matches!(
            err,
            AbilityError::Combat(CombatError::SelfTarget(id)) if id == user
        ));
        assert_eq!(kernel.entity(user).unwrap().force_points, 3);
        assert_eq!(limiter.usage(user, "backlash", &LimitScope::Encounter), 0);
    }

    #[test]
    fn destiny_reaction_spends_destiny() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let user = kernel
            .spawn(EntityState::character("Ord").with_destiny_points(1))
            .unwrap();

        let request = ExecutionRequest::new("fate", ExecutionType::Reaction, user)
            .with_payload(json!({ "resource": "destiny", "negates_hit": false }));
        let router = AbilityRouter::default();
        let mut limiter = RateLimiter::default();
        let result = router.execute(&mut kernel, &mut limiter, &request).unwrap();
        assert_eq!(
            result.outcome,
            Some(AbilityOutcome::Reaction {
                resource: ReactionResource::Destiny,
                negates_hit: false
            })
        );
        let err = router.execute(&mut kernel, &mut limiter, &request).unwrap_err();
        assert!(matches!(err, AbilityError::InsufficientDestinyPoints { .. }));
    }

    #[test]
    fn general_applies_plan_to_target() {
        let fixture = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fixture.env());
        let user = jedi(&mut kernel, 0);
        let ally = kernel.spawn(EntityState::character("Tam")).unwrap();

        let request = ExecutionRequest::new("rally", ExecutionType::General, user)
            .at(ally)
            .with_payload(json!({ "plan": { "set": { "credits": 75 } } }));
        let result = AbilityRouter::default()
            .execute(&mut kernel, &mut RateLimiter::default(), &request)
            .unwrap();
        assert!(result.success);
        assert_eq!(kernel.entity(ally).unwrap().credits, 75);
        assert_eq!(kernel.entity(user).unwrap().credits, 0);
    }
}
