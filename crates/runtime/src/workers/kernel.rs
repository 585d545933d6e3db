//! Kernel worker that owns the authoritative [`WorldState`].
//!
//! Receives commands from [`WorldHandle`](crate::WorldHandle), runs each one
//! through a fresh [`MutationKernel`], and publishes what changed to the
//! [`EventBus`]. Commands are processed one at a time in arrival order, so
//! callers never observe a half-applied operation.

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use saga_core::ability::{AbilityRouter, ExecutionRequest, ExecutionResult, LimitScope, RateLimiter};
use saga_core::combat::{
    AttackPipeline, AttackReport, AttackRequest, DamagePacket, DamageReport, Escalation,
    EscalationRequest, escalate_subsystem, repair_subsystem,
};
use saga_core::kernel::{
    DeltaOutcome, FieldMap, HookRegistry, MarkerOutcome, MoveOutcome, MutationKernel,
    MutationOptions, MutationOutcome, MutationPlan, PlanOutcome, ProgressionDelta,
};
use saga_core::state::{
    Collection, EntityId, EntityState, FeatureRecord, RecordData, RecordId, ShieldZone,
    StatusMarker, Subsystem, SubsystemTier, WorldState,
};
use saga_core::transaction::{
    PurchaseRequest, SaleRequest, TransactionCoordinator, TransactionError, TransactionKind,
    TransactionReceipt, TransferRequest,
};

use crate::api::{Result, RuntimeError};
use crate::events::{AbilityEvent, CombatEvent, EntityEvent, Event, EventBus, TransactionEvent};
use crate::oracle::OracleManager;

type Reply<T> = oneshot::Sender<Result<T>>;

/// Which ability counters to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetScope {
    Round,
    Encounter,
    All,
}

/// Commands that can be sent to the kernel worker
pub enum Command {
    Spawn {
        entity: Box<EntityState>,
        reply: Reply<EntityId>,
    },
    QueryEntity {
        id: EntityId,
        reply: oneshot::Sender<Option<EntityState>>,
    },
    QueryWorld {
        reply: oneshot::Sender<WorldState>,
    },
    UpdateEntity {
        id: EntityId,
        fields: FieldMap,
        options: MutationOptions,
        reply: Reply<MutationOutcome>,
    },
    CreateRecords {
        id: EntityId,
        collection: Collection,
        records: Vec<RecordData>,
        reply: Reply<Vec<RecordId>>,
    },
    DeleteRecords {
        id: EntityId,
        collection: Collection,
        ids: Vec<RecordId>,
        reply: Reply<Vec<FeatureRecord>>,
    },
    MoveRecords {
        source: EntityId,
        target: EntityId,
        collection: Collection,
        ids: Vec<RecordId>,
        reply: Reply<MoveOutcome>,
    },
    ApplyPlan {
        id: EntityId,
        plan: MutationPlan,
        options: MutationOptions,
        reply: Reply<PlanOutcome>,
    },
    ApplyDelta {
        id: EntityId,
        delta: ProgressionDelta,
        options: MutationOptions,
        reply: Reply<DeltaOutcome>,
    },
    ApplyMarker {
        id: EntityId,
        marker: StatusMarker,
        reply: Reply<MarkerOutcome>,
    },
    Attack {
        request: AttackRequest,
        reply: Reply<AttackReport>,
    },
    ApplyDamage {
        target: EntityId,
        packet: DamagePacket,
        zone: ShieldZone,
        preferred: Option<Subsystem>,
        reply: Reply<DamageReport>,
    },
    EscalateSubsystem {
        id: EntityId,
        request: EscalationRequest,
        reply: Reply<Option<Escalation>>,
    },
    RepairSubsystem {
        id: EntityId,
        subsystem: Subsystem,
        reply: Reply<Option<SubsystemTier>>,
    },
    ExecuteAbility {
        request: Box<ExecutionRequest>,
        reply: Reply<ExecutionResult>,
    },
    QueryUsage {
        entity: EntityId,
        ability: String,
        scope: LimitScope,
        reply: oneshot::Sender<u32>,
    },
    ResetLimits {
        scope: ResetScope,
        reply: oneshot::Sender<()>,
    },
    Purchase {
        request: PurchaseRequest,
        reply: Reply<TransactionReceipt>,
    },
    Sell {
        request: SaleRequest,
        reply: Reply<TransactionReceipt>,
    },
    Transfer {
        request: TransferRequest,
        reply: Reply<TransactionReceipt>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Spawn { .. } => "spawn",
            Command::QueryEntity { .. } => "query_entity",
            Command::QueryWorld { .. } => "query_world",
            Command::UpdateEntity { .. } => "update_entity",
            Command::CreateRecords { .. } => "create_records",
            Command::DeleteRecords { .. } => "delete_records",
            Command::MoveRecords { .. } => "move_records",
            Command::ApplyPlan { .. } => "apply_plan",
            Command::ApplyDelta { .. } => "apply_delta",
            Command::ApplyMarker { .. } => "apply_marker",
            Command::Attack { .. } => "attack",
            Command::ApplyDamage { .. } => "apply_damage",
            Command::EscalateSubsystem { .. } => "escalate_subsystem",
            Command::RepairSubsystem { .. } => "repair_subsystem",
            Command::ExecuteAbility { .. } => "execute_ability",
            Command::QueryUsage { .. } => "query_usage",
            Command::ResetLimits { .. } => "reset_limits",
            Command::Purchase { .. } => "purchase",
            Command::Sell { .. } => "sell",
            Command::Transfer { .. } => "transfer",
        }
    }
}

/// Background task that processes kernel commands.
///
/// The worker is the only owner of the world and of the ability rate
/// limiter. Every command gets its own kernel, and the kernel's change
/// journal is drained into `Entity` events before the reply is sent.
pub struct KernelWorker {
    world: WorldState,
    limiter: RateLimiter,
    router: AbilityRouter,
    hooks: HookRegistry,
    oracles: OracleManager,
    command_rx: mpsc::Receiver<Command>,
    event_bus: EventBus,
}

impl KernelWorker {
    pub fn new(
        world: WorldState,
        oracles: OracleManager,
        router: AbilityRouter,
        hooks: HookRegistry,
        command_rx: mpsc::Receiver<Command>,
        event_bus: EventBus,
    ) -> Self {
        let limiter = RateLimiter::from_config(oracles.config());
        info!(
            target: "runtime::worker",
            entities = world.len(),
            seed = world.game_seed,
            hooks = hooks.len(),
            "kernel worker initialized"
        );

        Self {
            world,
            limiter,
            router,
            hooks,
            oracles,
            command_rx,
            event_bus,
        }
    }

    /// Main worker loop. Returns once every handle has been dropped.
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }
        debug!(target: "runtime::worker", "command channel closed; kernel worker stopping");
    }

    fn handle_command(&mut self, cmd: Command) {
        let command = cmd.name();
        debug!(target: "runtime::worker", command, "processing command");

        match cmd {
            Command::Spawn { entity, reply } => {
                let result = self.with_kernel(|kernel, _, _| kernel.spawn(*entity));
                if let Ok(id) = &result {
                    self.event_bus
                        .publish(Event::Entity(EntityEvent::Spawned { entity: *id }));
                }
                respond(reply, result.map_err(Into::into), command);
            }
            Command::QueryEntity { id, reply } => {
                respond(reply, self.world.entity(id).cloned(), command);
            }
            Command::QueryWorld { reply } => {
                respond(reply, self.world.clone(), command);
            }
            Command::UpdateEntity {
                id,
                fields,
                options,
                reply,
            } => {
                let result =
                    self.with_kernel(|kernel, _, _| kernel.update_entity(id, &fields, options));
                respond(reply, result.map_err(Into::into), command);
            }
            Command::CreateRecords {
                id,
                collection,
                records,
                reply,
            } => {
                let result =
                    self.with_kernel(|kernel, _, _| kernel.create_records(id, collection, records));
                respond(reply, result.map_err(Into::into), command);
            }
            Command::DeleteRecords {
                id,
                collection,
                ids,
                reply,
            } => {
                let result =
                    self.with_kernel(|kernel, _, _| kernel.delete_records(id, collection, &ids));
                respond(reply, result.map_err(Into::into), command);
            }
            Command::MoveRecords {
                source,
                target,
                collection,
                ids,
                reply,
            } => {
                let result = self.with_kernel(|kernel, _, _| {
                    kernel.move_records(source, target, collection, &ids)
                });
                respond(reply, result.map_err(Into::into), command);
            }
            Command::ApplyPlan {
                id,
                plan,
                options,
                reply,
            } => {
                let result = self.with_kernel(|kernel, _, _| kernel.apply_plan(id, plan, options));
                respond(reply, result.map_err(Into::into), command);
            }
            Command::ApplyDelta {
                id,
                delta,
                options,
                reply,
            } => {
                let result =
                    self.with_kernel(|kernel, _, _| kernel.apply_delta(id, delta, options));
                respond(reply, result.map_err(Into::into), command);
            }
            Command::ApplyMarker { id, marker, reply } => {
                let result = self.with_kernel(|kernel, _, _| kernel.apply_marker(id, marker));
                respond(reply, result.map_err(Into::into), command);
            }
            Command::Attack { request, reply } => {
                let result =
                    self.with_kernel(|kernel, _, _| AttackPipeline::resolve(kernel, &request));
                if let Ok(report) = &result {
                    self.event_bus.publish(Event::Combat(CombatEvent::AttackResolved(
                        Box::new(report.clone()),
                    )));
                }
                respond(reply, result.map_err(Into::into), command);
            }
            Command::ApplyDamage {
                target,
                packet,
                zone,
                preferred,
                reply,
            } => {
                let result = self.with_kernel(|kernel, _, _| {
                    AttackPipeline::apply_damage(kernel, target, &packet, zone, preferred)
                });
                if let Ok(report) = &result {
                    self.event_bus.publish(Event::Combat(CombatEvent::DamageApplied {
                        entity: target,
                        report: Box::new(report.clone()),
                    }));
                }
                respond(reply, result.map_err(Into::into), command);
            }
            Command::EscalateSubsystem { id, request, reply } => {
                let result =
                    self.with_kernel(|kernel, _, _| escalate_subsystem(kernel, id, request));
                if let Ok(Some(escalation)) = &result {
                    self.event_bus
                        .publish(Event::Combat(CombatEvent::SubsystemEscalated {
                            entity: id,
                            escalation: *escalation,
                        }));
                }
                respond(reply, result.map_err(Into::into), command);
            }
            Command::RepairSubsystem {
                id,
                subsystem,
                reply,
            } => {
                let result =
                    self.with_kernel(|kernel, _, _| repair_subsystem(kernel, id, subsystem));
                respond(reply, result.map_err(Into::into), command);
            }
            Command::ExecuteAbility { request, reply } => {
                let result = self.with_kernel(|kernel, limiter, router| {
                    router.execute(kernel, limiter, &request)
                });
                if let Ok(outcome) = &result {
                    self.event_bus.publish(Event::Ability(AbilityEvent::Executed {
                        entity: request.entity,
                        ability_id: request.ability_id.clone(),
                        success: outcome.success,
                        limit_blocked: outcome.limit_blocked,
                    }));
                }
                respond(reply, result.map_err(Into::into), command);
            }
            Command::QueryUsage {
                entity,
                ability,
                scope,
                reply,
            } => {
                respond(reply, self.limiter.usage(entity, &ability, &scope), command);
            }
            Command::ResetLimits { scope, reply } => {
                match scope {
                    ResetScope::Round => self.limiter.reset_round_limits(),
                    ResetScope::Encounter => self.limiter.reset_encounter_limits(),
                    ResetScope::All => self.limiter.reset_all(),
                }
                self.event_bus
                    .publish(Event::Ability(AbilityEvent::LimitsReset { scope }));
                respond(reply, (), command);
            }
            Command::Purchase { request, reply } => {
                let result = self.with_kernel(|kernel, _, _| {
                    TransactionCoordinator::purchase_item(kernel, &request)
                });
                let result = self.finish_transaction(TransactionKind::Purchase, result);
                respond(reply, result, command);
            }
            Command::Sell { request, reply } => {
                let result = self
                    .with_kernel(|kernel, _, _| TransactionCoordinator::sell_item(kernel, &request));
                let result = self.finish_transaction(TransactionKind::Sale, result);
                respond(reply, result, command);
            }
            Command::Transfer { request, reply } => {
                let result = self.with_kernel(|kernel, _, _| {
                    TransactionCoordinator::transfer_item(kernel, &request)
                });
                let result = self.finish_transaction(TransactionKind::Transfer, result);
                respond(reply, result, command);
            }
        }
    }

    /// Runs `op` against a kernel over the world, then publishes the
    /// kernel's change journal whether or not `op` succeeded.
    fn with_kernel<T>(
        &mut self,
        op: impl FnOnce(&mut MutationKernel<'_, '_>, &mut RateLimiter, &AbilityRouter) -> T,
    ) -> T {
        let env = self.oracles.as_game_env();
        let mut kernel = MutationKernel::with_hooks(&mut self.world, env, self.hooks.clone());
        let result = op(&mut kernel, &mut self.limiter, &self.router);
        let changes = kernel.take_changes();

        for change in changes {
            self.event_bus
                .publish(Event::Entity(EntityEvent::Changed(change)));
        }
        result
    }

    fn finish_transaction(
        &self,
        kind: TransactionKind,
        result: std::result::Result<TransactionReceipt, TransactionError>,
    ) -> Result<TransactionReceipt> {
        match &result {
            Ok(receipt) => {
                self.event_bus
                    .publish(Event::Transaction(TransactionEvent::Settled(Box::new(
                        receipt.clone(),
                    ))));
            }
            Err(err) => {
                if let Some(step) = err.failed_step() {
                    let rolled_back = !matches!(err, TransactionError::RollbackFailed(_));
                    if !rolled_back {
                        warn!(target: "runtime::worker", %kind, step, "transaction left participants unrestored");
                    }
                    self.event_bus
                        .publish(Event::Transaction(TransactionEvent::Failed {
                            kind,
                            step: step.to_owned(),
                            rolled_back,
                        }));
                }
            }
        }
        result.map_err(RuntimeError::from)
    }
}

fn respond<T>(reply: oneshot::Sender<T>, value: T, command: &'static str) {
    if reply.send(value).is_err() {
        debug!(target: "runtime::worker", command, "reply channel closed (caller dropped)");
    }
}
