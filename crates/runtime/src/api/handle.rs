//! Cloneable handle for interacting with the kernel worker.
//!
//! Each method enqueues a [`Command`] and awaits the worker's reply, so
//! concurrent callers are serialized in the order their commands arrive.
use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc, oneshot};

use saga_core::ability::{ExecutionRequest, ExecutionResult, LimitScope};
use saga_core::combat::{
    AttackReport, AttackRequest, DamagePacket, DamageReport, Escalation, EscalationRequest,
};
use saga_core::kernel::{
    DeltaOutcome, FieldMap, MarkerOutcome, MoveOutcome, MutationOptions, MutationOutcome,
    MutationPlan, PlanOutcome, ProgressionDelta,
};
use saga_core::state::{
    Collection, EntityId, EntityState, FeatureRecord, RecordData, RecordId, ShieldZone,
    StatusMarker, Subsystem, SubsystemTier, WorldState,
};
use saga_core::transaction::{PurchaseRequest, SaleRequest, TransactionReceipt, TransferRequest};

use super::errors::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::workers::{Command, ResetScope};

/// Client-facing handle to the world owned by the kernel worker.
#[derive(Clone)]
pub struct WorldHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl WorldHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self {
            command_tx,
            event_bus,
        }
    }

    /// Subscribe to a specific event topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<Event>> {
        self.event_bus.subscribe_multiple(topics)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ===== queries =====

    /// A copy of one entity, or `None` if it does not exist.
    pub async fn entity(&self, id: EntityId) -> Result<Option<EntityState>> {
        self.request(|reply| Command::QueryEntity { id, reply })
            .await
    }

    /// A copy of the whole world.
    pub async fn world(&self) -> Result<WorldState> {
        self.request(|reply| Command::QueryWorld { reply }).await
    }

    /// Activations of `ability` counted within `scope`.
    pub async fn usage(
        &self,
        entity: EntityId,
        ability: impl Into<String>,
        scope: LimitScope,
    ) -> Result<u32> {
        let ability = ability.into();
        self.request(|reply| Command::QueryUsage {
            entity,
            ability,
            scope,
            reply,
        })
        .await
    }

    // ===== kernel =====

    pub async fn spawn(&self, entity: EntityState) -> Result<EntityId> {
        self.request(|reply| Command::Spawn {
            entity: Box::new(entity),
            reply,
        })
        .await?
    }

    pub async fn update_entity(
        &self,
        id: EntityId,
        fields: FieldMap,
        options: MutationOptions,
    ) -> Result<MutationOutcome> {
        self.request(|reply| Command::UpdateEntity {
            id,
            fields,
            options,
            reply,
        })
        .await?
    }

    pub async fn create_records(
        &self,
        id: EntityId,
        collection: Collection,
        records: Vec<RecordData>,
    ) -> Result<Vec<RecordId>> {
        self.request(|reply| Command::CreateRecords {
            id,
            collection,
            records,
            reply,
        })
        .await?
    }

    pub async fn delete_records(
        &self,
        id: EntityId,
        collection: Collection,
        ids: Vec<RecordId>,
    ) -> Result<Vec<FeatureRecord>> {
        self.request(|reply| Command::DeleteRecords {
            id,
            collection,
            ids,
            reply,
        })
        .await?
    }

    pub async fn move_records(
        &self,
        source: EntityId,
        target: EntityId,
        collection: Collection,
        ids: Vec<RecordId>,
    ) -> Result<MoveOutcome> {
        self.request(|reply| Command::MoveRecords {
            source,
            target,
            collection,
            ids,
            reply,
        })
        .await?
    }

    pub async fn apply_plan(
        &self,
        id: EntityId,
        plan: MutationPlan,
        options: MutationOptions,
    ) -> Result<PlanOutcome> {
        self.request(|reply| Command::ApplyPlan {
            id,
            plan,
            options,
            reply,
        })
        .await?
    }

    pub async fn apply_delta(
        &self,
        id: EntityId,
        delta: ProgressionDelta,
        options: MutationOptions,
    ) -> Result<DeltaOutcome> {
        self.request(|reply| Command::ApplyDelta {
            id,
            delta,
            options,
            reply,
        })
        .await?
    }

    pub async fn apply_marker(&self, id: EntityId, marker: StatusMarker) -> Result<MarkerOutcome> {
        self.request(|reply| Command::ApplyMarker { id, marker, reply })
            .await?
    }

    // ===== combat =====

    pub async fn attack(&self, request: AttackRequest) -> Result<AttackReport> {
        self.request(|reply| Command::Attack { request, reply })
            .await?
    }

    /// Applies an already scaled damage packet, bypassing the hit roll.
    pub async fn apply_damage(
        &self,
        target: EntityId,
        packet: DamagePacket,
        zone: ShieldZone,
        preferred: Option<Subsystem>,
    ) -> Result<DamageReport> {
        self.request(|reply| Command::ApplyDamage {
            target,
            packet,
            zone,
            preferred,
            reply,
        })
        .await?
    }

    pub async fn escalate_subsystem(
        &self,
        id: EntityId,
        request: EscalationRequest,
    ) -> Result<Option<Escalation>> {
        self.request(|reply| Command::EscalateSubsystem { id, request, reply })
            .await?
    }

    pub async fn repair_subsystem(
        &self,
        id: EntityId,
        subsystem: Subsystem,
    ) -> Result<Option<SubsystemTier>> {
        self.request(|reply| Command::RepairSubsystem {
            id,
            subsystem,
            reply,
        })
        .await?
    }

    // ===== abilities =====

    pub async fn execute_ability(&self, request: ExecutionRequest) -> Result<ExecutionResult> {
        self.request(|reply| Command::ExecuteAbility {
            request: Box::new(request),
            reply,
        })
        .await?
    }

    /// Clears ability counters at a round or encounter boundary.
    pub async fn reset_limits(&self, scope: ResetScope) -> Result<()> {
        self.request(|reply| Command::ResetLimits { scope, reply })
            .await
    }

    // ===== transactions =====

    pub async fn purchase_item(&self, request: PurchaseRequest) -> Result<TransactionReceipt> {
        self.request(|reply| Command::Purchase { request, reply })
            .await?
    }

    pub async fn sell_item(&self, request: SaleRequest) -> Result<TransactionReceipt> {
        self.request(|reply| Command::Sell { request, reply })
            .await?
    }

    pub async fn transfer_item(&self, request: TransferRequest) -> Result<TransactionReceipt> {
        self.request(|reply| Command::Transfer { request, reply })
            .await?
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }
}
