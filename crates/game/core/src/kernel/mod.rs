//! The entity mutation kernel.
//!
//! [`MutationKernel`] is the only code path that writes to a
//! [`WorldState`]. Every operation follows the same shape:
//!
//! 1. validate against current state (no side effects on failure)
//! 2. apply the writes
//! 3. recompute derived stats exactly once per touched entity
//! 4. journal the change bitmasks and notify post-mutation hooks
//!
//! The kernel borrows the world mutably for its whole lifetime, so two
//! writers can never interleave on the same world.

mod context;
mod errors;
mod hook;
mod plan;
mod port;
mod progression;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

pub use context::{MutationOptions, MutationOrigin, MutationOutcome, PreventReason};
pub use errors::{
    Bucket, DerivedWriteViolation, KernelError, MutationApplicationError, ValidationError,
};
pub use hook::{HelplessHook, HookCriticality, HookRegistry, MutationHook};
pub use plan::{CreateBucket, CreateEntity, FieldMap, MutationPlan, PlanOutcome};
pub use port::EntityMutator;
pub use progression::{DeltaOutcome, ProgressionDelta};

use context::InFlight;

use crate::env::{FeatureId, GameEnv, compute_seed};
use crate::state::path::is_literal;
use crate::state::{
    ChangeJournal, Collection, EntityChanges, EntityFields, EntityId, EntityRef, EntitySnapshot,
    EntityState, FeatureRecord, FeatureRecords, FieldPath, PathError, RecordData, RecordId,
    RecordUpdate, StatusMarker, WorldState,
};
use crate::stats::DerivedStats;

/// Proof that the holder is the mutation kernel.
///
/// [`WorldState`] requires it for every mutable accessor.
#[derive(Debug)]
pub(crate) struct ActiveMutation {
    _private: (),
}

impl ActiveMutation {
    fn begin() -> Self {
        Self { _private: () }
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        Self::begin()
    }
}

/// Result of [`MutationKernel::apply_marker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerOutcome {
    Applied,
    AlreadyPresent,
}

/// Result of [`MutationKernel::move_records`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub source: EntityId,
    pub target: EntityId,
    pub collection: Collection,
    /// Ids removed from the source.
    pub removed: Vec<RecordId>,
    /// Fresh ids on the target, in the same order.
    pub created: Vec<RecordId>,
}

/// Single-writer gateway for entity state.
pub struct MutationKernel<'w, 'e> {
    world: &'w mut WorldState,
    env: GameEnv<'e>,
    hooks: HookRegistry,
    in_flight: InFlight,
    hook_depth: usize,
    journal: ChangeJournal,
    token: ActiveMutation,
}

type StagedWrites = Vec<(FieldPath, serde_json::Value)>;

impl<'w, 'e> MutationKernel<'w, 'e> {
    /// Creates a kernel with the default hook set.
    pub fn new(world: &'w mut WorldState, env: GameEnv<'e>) -> Self {
        Self::with_hooks(world, env, HookRegistry::default_hooks())
    }

    pub fn with_hooks(world: &'w mut WorldState, env: GameEnv<'e>, hooks: HookRegistry) -> Self {
        Self {
            world,
            env,
            hooks,
            in_flight: InFlight::default(),
            hook_depth: 0,
            journal: ChangeJournal::new(),
            token: ActiveMutation::begin(),
        }
    }

    pub fn world(&self) -> &WorldState {
        self.world
    }

    pub fn env(&self) -> GameEnv<'e> {
        self.env
    }

    pub fn entity(&self, id: EntityId) -> Result<&EntityState, KernelError> {
        self.world
            .entity(id)
            .ok_or_else(|| ValidationError::EntityNotFound(id).into())
    }

    /// Changes accumulated since the last drain.
    pub fn journal(&self) -> &ChangeJournal {
        &self.journal
    }

    pub fn take_changes(&mut self) -> Vec<EntityChanges> {
        self.journal.drain()
    }

    // ===== entity lifecycle =====

    /// Adds a new entity to the world under a freshly allocated id.
    ///
    /// Records carried by `entity` are re-identified from the world allocator.
    pub fn spawn(&mut self, mut entity: EntityState) -> Result<EntityId, KernelError> {
        let id = self.world.allocate_entity_id(&self.token);
        entity.id = id;
        entity
            .check_invariants()
            .map_err(|message| ValidationError::Invariant { entity: id, message })?;

        let carried: Vec<FeatureRecord> = entity.records.iter().map(|(_, r)| r.clone()).collect();
        entity.records = FeatureRecords::new();
        for mut record in carried {
            record.id = self.world.allocate_record_id(&self.token);
            entity.records.push(record);
        }

        let before = entity.clone();
        self.world.put(&self.token, entity);
        let mut changes = self.settle(&[before])?;
        for change in &mut changes {
            change.fields |= EntityFields::CREATED;
        }
        self.journal.record(id, EntityFields::CREATED);
        debug!(target: "saga::kernel", entity = %id, "spawned entity");
        self.notify(&changes)?;
        Ok(id)
    }

    /// Recomputes derived stats for every entity, e.g. after loading a world.
    pub fn recompute_all(&mut self) -> Result<(), KernelError> {
        let befores: Vec<EntityState> = self.world.entities().cloned().collect();
        self.settle(&befores)?;
        Ok(())
    }

    // ===== field mutation =====

    /// Writes persistent fields on one entity.
    ///
    /// Every path is parsed and every value staged on a copy before the
    /// entity is touched. A derived path is a [`DerivedWriteViolation`].
    pub fn update_entity(
        &mut self,
        id: EntityId,
        fields: &FieldMap,
        opts: MutationOptions,
    ) -> Result<MutationOutcome, KernelError> {
        self.entity(id)?;
        if let Some(reason) = self.in_flight.enter(id, &opts) {
            debug!(target: "saga::kernel", entity = %id, ?reason, "mutation prevented");
            return Ok(MutationOutcome::Prevented { entity: id, reason });
        }
        let result = self.update_guarded(id, fields);
        self.in_flight.leave(id, &opts);
        result
    }

    fn update_guarded(
        &mut self,
        id: EntityId,
        fields: &FieldMap,
    ) -> Result<MutationOutcome, KernelError> {
        let writes = self.parse_writes(id, fields)?;
        let before = self.entity(id)?.clone();
        let staged = stage_writes(&before, &writes)?;

        self.world.put(&self.token, staged);
        let changes = self.settle(&[before])?;
        self.notify(&changes)?;

        let fields = primary_fields(&changes, id);
        debug!(target: "saga::kernel", entity = %id, ?fields, "entity updated");
        Ok(MutationOutcome::Applied { entity: id, fields })
    }

    // ===== record operations =====

    pub fn create_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        records: Vec<RecordData>,
    ) -> Result<Vec<RecordId>, KernelError> {
        let before = self.entity(id)?.clone();
        let created = self
            .insert_records(id, collection, records, &BTreeMap::new())
            .map_err(|err| self.fail_if_applying(err))?;
        let changes = self.settle(&[before])?;
        self.notify(&changes)?;
        debug!(target: "saga::kernel", entity = %id, %collection, count = created.len(), "records created");
        Ok(created)
    }

    /// Deletes records. Every id must exist or nothing is deleted.
    pub fn delete_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<Vec<FeatureRecord>, KernelError> {
        let before = self.entity(id)?.clone();
        let removed = self.remove_records(id, collection, ids)?;
        let changes = self.settle(&[before])?;
        self.notify(&changes)?;
        debug!(target: "saga::kernel", entity = %id, %collection, count = removed.len(), "records deleted");
        Ok(removed)
    }

    pub fn update_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        updates: Vec<RecordUpdate>,
    ) -> Result<Vec<RecordId>, KernelError> {
        let before = self.entity(id)?.clone();
        let ids: Vec<RecordId> = updates.iter().map(|u| u.id).collect();
        validate_record_ids(&before, collection, &ids)?;

        let entity = self.entity_mut(id)?;
        for update in updates {
            if let Some(record) = entity.records.find_mut(collection, update.id) {
                if let Some(name) = update.name {
                    record.name = name;
                }
                if let Some(payload) = update.payload {
                    record.payload = payload;
                }
            }
        }

        let changes = self.settle(&[before])?;
        self.notify(&changes)?;
        Ok(ids)
    }

    /// Moves records from `source` to `target`.
    ///
    /// The records are deleted from the source, then recreated on the target
    /// under new ids. Both entities are recomputed exactly once. If creation
    /// fails after the delete, the result is [`KernelError::PartialMove`]
    /// carrying the removed records; the kernel does not put them back.
    pub fn move_records(
        &mut self,
        source: EntityId,
        target: EntityId,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<MoveOutcome, KernelError> {
        if source == target {
            return Err(ValidationError::SameEntity(source).into());
        }
        let before_source = self.entity(source)?.clone();
        let before_target = self.entity(target)?.clone();
        validate_record_ids(&before_source, collection, ids)?;

        let removed = self.remove_records(source, collection, ids)?;
        let data: Vec<RecordData> = removed.iter().map(FeatureRecord::to_data).collect();

        match self.insert_records(target, collection, data, &BTreeMap::new()) {
            Ok(created) => {
                let changes = self.settle(&[before_source, before_target])?;
                self.notify(&changes)?;
                debug!(
                    target: "saga::kernel",
                    %source, %target, %collection, count = created.len(),
                    "records moved"
                );
                Ok(MoveOutcome {
                    source,
                    target,
                    collection,
                    removed: ids.to_vec(),
                    created,
                })
            }
            Err(cause) => {
                self.settle(&[before_source])?;
                error!(
                    target: "saga::kernel",
                    %source, %target, %collection, removed = removed.len(), error = %cause,
                    "move left records detached"
                );
                Err(KernelError::PartialMove {
                    source_entity: source,
                    target,
                    collection,
                    removed,
                    cause: Box::new(cause),
                })
            }
        }
    }

    // ===== plans and deltas =====

    /// Applies a multi-bucket plan in the order create, delete, set, add.
    ///
    /// The plan is validated as a whole first. Temporary ids declared in the
    /// create bucket are rewritten to real ids before any record referencing
    /// them is created. A failure after validation leaves completed steps
    /// applied and reports the failing bucket in a
    /// [`MutationApplicationError`]. A plan suppressed by a reentry guard
    /// reports `prevented` and changes nothing.
    pub fn apply_plan(
        &mut self,
        id: EntityId,
        plan: MutationPlan,
        opts: MutationOptions,
    ) -> Result<PlanOutcome, KernelError> {
        self.entity(id)?;
        if let Some(reason) = self.in_flight.enter(id, &opts) {
            debug!(target: "saga::kernel", entity = %id, ?reason, "plan prevented");
            return Ok(PlanOutcome {
                entity: id,
                prevented: true,
                ..PlanOutcome::default()
            });
        }
        let result = self.apply_plan_guarded(id, plan);
        self.in_flight.leave(id, &opts);
        result
    }

    fn apply_plan_guarded(
        &mut self,
        id: EntityId,
        plan: MutationPlan,
    ) -> Result<PlanOutcome, KernelError> {
        let writes = self.validate_plan(id, &plan)?;
        let before = self.entity(id)?.clone();

        let mut outcome = PlanOutcome {
            entity: id,
            ..PlanOutcome::default()
        };
        let applied = self.apply_plan_steps(id, plan, &writes, &mut outcome);

        let mut befores = vec![before];
        for created in outcome.created.values() {
            if let Some(entity) = self.world.entity(*created) {
                befores.push(entity.clone());
            }
        }
        let mut changes = self.settle(&befores)?;
        for change in &mut changes {
            if outcome.created.values().any(|c| *c == change.id) {
                change.fields |= EntityFields::CREATED;
                self.journal.record(change.id, EntityFields::CREATED);
            }
        }
        outcome.fields = primary_fields(&changes, id);

        match applied {
            Ok(()) => {
                self.notify(&changes)?;
                debug!(
                    target: "saga::kernel",
                    entity = %id,
                    created = outcome.created.len(),
                    deleted = outcome.deleted.len(),
                    added = outcome.added.len(),
                    "plan applied"
                );
                Ok(outcome)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn validate_plan(&self, id: EntityId, plan: &MutationPlan) -> Result<StagedWrites, KernelError> {
        let target = self.entity(id)?;

        let mut temporaries = BTreeSet::new();
        if let Some(create) = &plan.create {
            for entry in &create.entities {
                if entry.temporary_id.is_empty() {
                    return Err(ValidationError::EmptyTemporaryId.into());
                }
                if !temporaries.insert(entry.temporary_id.as_str()) {
                    return Err(
                        ValidationError::DuplicateTemporaryId(entry.temporary_id.clone()).into(),
                    );
                }
            }
        }

        for (collection, ids) in &plan.delete {
            validate_record_ids(target, *collection, ids)?;
        }

        let writes = self.parse_writes(id, &plan.set)?;
        stage_writes(target, &writes)?;

        for records in plan.add.values() {
            for record in records {
                match &record.linked {
                    Some(EntityRef::Temporary(temp)) if !temporaries.contains(temp.as_str()) => {
                        return Err(ValidationError::UnknownTemporaryId(temp.clone()).into());
                    }
                    Some(EntityRef::Id(linked)) => {
                        self.entity(*linked)?;
                    }
                    _ => {}
                }
            }
        }

        Ok(writes)
    }

    fn apply_plan_steps(
        &mut self,
        id: EntityId,
        plan: MutationPlan,
        writes: &StagedWrites,
        outcome: &mut PlanOutcome,
    ) -> Result<(), MutationApplicationError> {
        const OP: &str = "apply_plan";

        if let Some(create) = plan.create {
            for entry in create.entities {
                let new_id = self.world.allocate_entity_id(&self.token);
                let mut entity = entry.data.into_entity();
                entity.id = new_id;
                if let Err(message) = entity.check_invariants() {
                    let cause = KernelError::from(ValidationError::Invariant {
                        entity: new_id,
                        message,
                    });
                    return Err(cause.applying(id, OP, Bucket::Create));
                }
                self.world.put(&self.token, entity);
                outcome.created.insert(entry.temporary_id, new_id);
            }
        }

        for (collection, ids) in &plan.delete {
            let removed = self
                .remove_records(id, *collection, ids)
                .map_err(|err| err.applying(id, OP, Bucket::Delete).for_collection(*collection))?;
            outcome.deleted.extend(removed);
        }

        self.commit_writes(id, OP, writes)?;

        for (collection, records) in plan.add {
            let created = self
                .insert_records(id, collection, records, &outcome.created)
                .map_err(|err| err.applying(id, OP, Bucket::Add).for_collection(collection))?;
            outcome.added.extend(created);
        }

        Ok(())
    }

    /// Applies a progression delta in the order delete, set, add.
    ///
    /// Feature ids in `add` are resolved through the content oracle and set
    /// values must be literals. A delta suppressed by a reentry guard
    /// reports `prevented` and changes nothing.
    pub fn apply_delta(
        &mut self,
        id: EntityId,
        delta: ProgressionDelta,
        opts: MutationOptions,
    ) -> Result<DeltaOutcome, KernelError> {
        self.entity(id)?;
        if let Some(reason) = self.in_flight.enter(id, &opts) {
            debug!(target: "saga::kernel", entity = %id, ?reason, "delta prevented");
            return Ok(DeltaOutcome {
                entity: id,
                prevented: true,
                ..DeltaOutcome::default()
            });
        }
        let result = self.apply_delta_guarded(id, delta);
        self.in_flight.leave(id, &opts);
        result
    }

    fn apply_delta_guarded(
        &mut self,
        id: EntityId,
        delta: ProgressionDelta,
    ) -> Result<DeltaOutcome, KernelError> {
        // validation
        for (path, value) in &delta.set {
            if !is_literal(value) {
                return Err(ValidationError::NonLiteralValue { path: path.clone() }.into());
            }
        }
        let writes = self.parse_writes(id, &delta.set)?;
        let before = self.entity(id)?.clone();
        stage_writes(&before, &writes)?;
        for (collection, ids) in &delta.delete {
            validate_record_ids(&before, *collection, ids)?;
        }
        let grants = self.resolve_features(&delta.add)?;

        // application
        let mut outcome = DeltaOutcome {
            entity: id,
            ..DeltaOutcome::default()
        };
        let applied = self.apply_delta_steps(id, &delta.delete, &writes, grants, &mut outcome);

        let changes = self.settle(&[before])?;
        outcome.fields = primary_fields(&changes, id);
        match applied {
            Ok(()) => {
                self.notify(&changes)?;
                debug!(target: "saga::kernel", entity = %id, added = outcome.added.len(), "delta applied");
                Ok(outcome)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn apply_delta_steps(
        &mut self,
        id: EntityId,
        delete: &BTreeMap<Collection, Vec<RecordId>>,
        writes: &StagedWrites,
        grants: Vec<(Collection, Vec<RecordData>)>,
        outcome: &mut DeltaOutcome,
    ) -> Result<(), MutationApplicationError> {
        const OP: &str = "apply_delta";

        for (collection, ids) in delete {
            let removed = self
                .remove_records(id, *collection, ids)
                .map_err(|err| err.applying(id, OP, Bucket::Delete).for_collection(*collection))?;
            outcome.deleted.extend(removed);
        }
        self.commit_writes(id, OP, writes)?;
        for (collection, records) in grants {
            let created = self
                .insert_records(id, collection, records, &BTreeMap::new())
                .map_err(|err| err.applying(id, OP, Bucket::Add).for_collection(collection))?;
            outcome.added.extend(created);
        }
        Ok(())
    }

    /// Writes staged field values onto the live entity, naming the failing path.
    fn commit_writes(
        &mut self,
        id: EntityId,
        operation: &'static str,
        writes: &StagedWrites,
    ) -> Result<(), MutationApplicationError> {
        if writes.is_empty() {
            return Ok(());
        }
        let mut staged = self
            .entity(id)
            .map_err(|err| err.applying(id, operation, Bucket::Set))?
            .clone();
        for (path, value) in writes {
            path.write(&mut staged, value).map_err(|err| {
                KernelError::from(err)
                    .applying(id, operation, Bucket::Set)
                    .at_path(path.to_string())
            })?;
        }
        staged.check_invariants().map_err(|message| {
            KernelError::from(ValidationError::Invariant { entity: id, message })
                .applying(id, operation, Bucket::Set)
        })?;
        self.world.put(&self.token, staged);
        Ok(())
    }

    fn resolve_features(
        &self,
        add: &BTreeMap<Collection, Vec<FeatureId>>,
    ) -> Result<Vec<(Collection, Vec<RecordData>)>, KernelError> {
        if add.values().all(Vec::is_empty) {
            return Ok(Vec::new());
        }
        let content = self.env.content()?;
        let mut grants = Vec::with_capacity(add.len());
        for (collection, ids) in add {
            let mut records = Vec::with_capacity(ids.len());
            for feature in ids {
                let definition = content
                    .feature(*collection, feature)
                    .filter(|def| def.collection == *collection)
                    .ok_or_else(|| ValidationError::UnknownFeature {
                        collection: *collection,
                        id: feature.clone(),
                    })?;
                records.push(definition.to_record());
            }
            grants.push((*collection, records));
        }
        Ok(grants)
    }

    // ===== markers, restore, dice =====

    /// Applies a status marker. Applying a marker twice is a no-op.
    pub fn apply_marker(
        &mut self,
        id: EntityId,
        marker: StatusMarker,
    ) -> Result<MarkerOutcome, KernelError> {
        let before = self.entity(id)?.clone();
        if before.markers.has(marker) {
            debug!(target: "saga::kernel", entity = %id, %marker, "marker already present");
            return Ok(MarkerOutcome::AlreadyPresent);
        }
        self.entity_mut(id)?.markers.insert(marker);
        let changes = self.settle(&[before])?;
        debug!(target: "saga::kernel", entity = %id, %marker, "marker applied");
        self.notify(&changes)?;
        Ok(MarkerOutcome::Applied)
    }

    /// Replaces an entity with a snapshot copy, recreating it if needed.
    ///
    /// Hooks are not notified: a restore must reproduce the snapshot exactly.
    pub fn restore_entity(&mut self, snapshot: &EntitySnapshot) -> Result<(), KernelError> {
        let id = snapshot.id();
        let before = match self.world.entity(id) {
            Some(entity) => entity.clone(),
            None => snapshot.entity.clone(),
        };
        self.world.put(&self.token, snapshot.entity.clone());
        self.settle(&[before])?;
        self.journal.record(id, EntityFields::RESTORED);
        warn!(target: "saga::kernel", entity = %id, digest = %snapshot.digest, "entity restored from snapshot");
        Ok(())
    }

    /// Draws a fresh deterministic seed for one roll.
    pub fn draw_seed(&mut self, actor: EntityId, context: u32) -> u64 {
        let nonce = self.world.take_roll_nonce(&self.token);
        compute_seed(self.world.game_seed, nonce, actor.0, context)
    }

    /// Rolls a die with `sides` faces through the RNG oracle.
    pub fn roll(&mut self, actor: EntityId, context: u32, sides: u32) -> Result<u32, KernelError> {
        let rng = self.env.rng()?;
        let seed = self.draw_seed(actor, context);
        Ok(rng.roll_die(seed, sides))
    }

    // ===== internals =====

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut EntityState, KernelError> {
        self.world
            .entity_mut(&self.token, id)
            .ok_or_else(|| ValidationError::EntityNotFound(id).into())
    }

    fn parse_writes(&self, id: EntityId, fields: &FieldMap) -> Result<StagedWrites, KernelError> {
        let mut writes = Vec::with_capacity(fields.len());
        for (path, value) in fields {
            match FieldPath::parse(path) {
                Ok(parsed) => writes.push((parsed, value.clone())),
                Err(PathError::Derived { path }) => {
                    error!(target: "saga::kernel", entity = %id, %path, "write to derived field rejected");
                    return Err(DerivedWriteViolation { entity: id, path }.into());
                }
                Err(other) => return Err(other.into()),
            }
        }
        Ok(writes)
    }

    fn insert_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        records: Vec<RecordData>,
        temporaries: &BTreeMap<String, EntityId>,
    ) -> Result<Vec<RecordId>, KernelError> {
        let capacity = self.env.config()?.max_records_per_collection();
        let current = self.entity(id)?.records.len(collection);

        let mut resolved = Vec::with_capacity(records.len());
        for record in records {
            let linked = match record.linked {
                None => None,
                Some(EntityRef::Id(linked)) => {
                    self.entity(linked)?;
                    Some(linked)
                }
                Some(EntityRef::Temporary(temp)) => match temporaries.get(&temp) {
                    Some(real) => Some(*real),
                    None if temporaries.is_empty() => {
                        return Err(ValidationError::UnresolvedTemporary(temp).into());
                    }
                    None => return Err(ValidationError::UnknownTemporaryId(temp).into()),
                },
            };
            resolved.push((record.name, record.payload, linked));
        }

        if current + resolved.len() > capacity {
            let full = KernelError::CollectionFull {
                entity: id,
                collection,
                capacity,
            };
            return Err(MutationApplicationError::new(id, "create_records", full)
                .for_collection(collection)
                .into());
        }

        let mut created = Vec::with_capacity(resolved.len());
        for (name, payload, linked) in resolved {
            let record_id = self.world.allocate_record_id(&self.token);
            self.entity_mut(id)?.records.push(FeatureRecord {
                id: record_id,
                kind: collection,
                name,
                payload,
                linked,
            });
            created.push(record_id);
        }
        Ok(created)
    }

    fn remove_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<Vec<FeatureRecord>, KernelError> {
        validate_record_ids(self.entity(id)?, collection, ids)?;
        let entity = self.entity_mut(id)?;
        Ok(ids
            .iter()
            .filter_map(|record| entity.records.remove(collection, *record))
            .collect())
    }

    /// Recomputes each touched entity once and journals what changed.
    fn settle(&mut self, befores: &[EntityState]) -> Result<Vec<EntityChanges>, KernelError> {
        let tables = self.env.tables()?;
        let mut out = Vec::with_capacity(befores.len());
        for before in befores {
            let Some(entity) = self.world.entity_mut(&self.token, before.id) else {
                continue;
            };
            entity.derived = DerivedStats::compute(entity, tables, before.derived.revision + 1);
            let mut changes = EntityChanges::from_states(before, entity)
                .unwrap_or_else(|| EntityChanges::new(before.id, EntityFields::empty()));
            changes.fields |= EntityFields::DERIVED;
            self.journal.merge(changes);
            out.push(changes);
        }
        Ok(out)
    }

    /// Runs hooks for each change set, one level deeper than the caller.
    fn notify(&mut self, changes: &[EntityChanges]) -> Result<(), KernelError> {
        if self.hooks.is_empty() {
            return Ok(());
        }
        let max_depth = self.env.config()?.max_hook_depth();
        let hooks = self.hooks.shared();

        for change in changes {
            for hook in hooks.iter() {
                let Some(entity) = self.world.entity(change.id) else {
                    break;
                };
                if !hook.should_trigger(change, entity) {
                    continue;
                }
                if self.hook_depth >= max_depth {
                    error!(target: "saga::kernel", hook = hook.name(), depth = self.hook_depth, "hook chain too deep");
                    return Err(KernelError::HookChainTooDeep {
                        hook: hook.name(),
                        depth: self.hook_depth + 1,
                    });
                }

                self.hook_depth += 1;
                let result = hook.apply(self, change);
                self.hook_depth -= 1;

                if let Err(err) = result {
                    self.handle_hook_error(hook.as_ref(), err)?;
                }
            }
        }
        Ok(())
    }

    fn handle_hook_error(&self, hook: &dyn MutationHook, err: KernelError) -> Result<(), KernelError> {
        if matches!(err, KernelError::HookChainTooDeep { .. }) {
            return Err(err);
        }
        match hook.criticality() {
            HookCriticality::Critical => {
                error!(target: "saga::kernel", hook = hook.name(), error = %err, "critical hook failed");
                Err(KernelError::HookFailed {
                    hook: hook.name(),
                    cause: Box::new(err),
                })
            }
            HookCriticality::Important => {
                error!(target: "saga::kernel", hook = hook.name(), error = %err, "hook failed");
                Ok(())
            }
            HookCriticality::Optional => {
                debug!(target: "saga::kernel", hook = hook.name(), error = %err, "optional hook failed");
                Ok(())
            }
        }
    }

    /// Logs an application failure with its full context.
    fn fail(&self, err: MutationApplicationError) -> KernelError {
        error!(
            target: "saga::kernel",
            entity = %err.entity,
            operation = err.operation,
            bucket = ?err.bucket,
            path = ?err.path,
            collection = ?err.collection,
            error = %err.source,
            "mutation step failed"
        );
        KernelError::Application(err)
    }

    fn fail_if_applying(&self, err: KernelError) -> KernelError {
        match err {
            KernelError::Application(app) => self.fail(app),
            other => other,
        }
    }
}

/// Applies writes to a copy of `entity` and checks invariants on the result.
fn stage_writes(entity: &EntityState, writes: &StagedWrites) -> Result<EntityState, KernelError> {
    let mut staged = entity.clone();
    for (path, value) in writes {
        path.write(&mut staged, value)?;
    }
    staged
        .check_invariants()
        .map_err(|message| ValidationError::Invariant {
            entity: entity.id,
            message,
        })?;
    Ok(staged)
}

fn validate_record_ids(
    entity: &EntityState,
    collection: Collection,
    ids: &[RecordId],
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for record in ids {
        if !seen.insert(*record) {
            return Err(ValidationError::DuplicateRecord { record: *record });
        }
        if !entity.records.contains(collection, *record) {
            return Err(ValidationError::RecordNotFound {
                entity: entity.id,
                collection,
                record: *record,
            });
        }
    }
    Ok(())
}

fn primary_fields(changes: &[EntityChanges], id: EntityId) -> EntityFields {
    changes
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.fields)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;
    use crate::config::GameConfig;
    use crate::env::{ContentOracle, Env, FeatureDefinition, PcgRng, RulesTables};
    use crate::state::{EntityKind, EntitySeed};

    #[derive(Default)]
    struct Catalog(BTreeMap<FeatureId, FeatureDefinition>);

    impl Catalog {
        fn with(mut self, collection: Collection, id: &str, name: &str) -> Self {
            self.0.insert(
                FeatureId::from(id),
                FeatureDefinition {
                    id: FeatureId::from(id),
                    collection,
                    name: name.into(),
                    payload: json!({}),
                },
            );
            self
        }
    }

    impl ContentOracle for Catalog {
        fn feature(&self, _collection: Collection, id: &FeatureId) -> Option<FeatureDefinition> {
            self.0.get(id).cloned()
        }
    }

    struct Fixture {
        content: Catalog,
        tables: RulesTables,
        config: GameConfig,
        rng: PcgRng,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_config(GameConfig::default())
        }

        fn with_config(config: GameConfig) -> Self {
            Self {
                content: Catalog::default()
                    .with(Collection::Feats, "feat.toughness", "Toughness")
                    .with(Collection::Talents, "talent.block", "Block"),
                tables: RulesTables::default(),
                config,
                rng: PcgRng,
            }
        }

        fn env(&self) -> GameEnv<'_> {
            Env::with_all(&self.content, &self.tables, &self.config, &self.rng).into_game_env()
        }
    }

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(path, value)| ((*path).to_owned(), value.clone()))
            .collect()
    }

    fn revision(kernel: &MutationKernel<'_, '_>, id: EntityId) -> u64 {
        kernel.world().entity(id).map(|e| e.derived.revision).unwrap_or(0)
    }

    #[test]
    fn update_recomputes_once() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel
            .spawn(EntityState::character("Kell").with_hit_points(20))
            .unwrap();
        assert_eq!(revision(&kernel, hero), 1);

        let outcome = kernel
            .update_entity(
                hero,
                &fields(&[("hp.current", json!(12)), ("defenses.reflex.misc", json!(2))]),
                MutationOptions::default(),
            )
            .unwrap();

        let MutationOutcome::Applied { fields, .. } = outcome else {
            panic!("expected applied outcome");
        };
        assert!(fields.contains(EntityFields::HIT_POINTS | EntityFields::DEFENSES));
        let entity = kernel.world().entity(hero).unwrap();
        assert_eq!(entity.hit_points.current, 12);
        assert_eq!(entity.derived.reflex, 13);
        assert_eq!(entity.derived.revision, 2);
    }

    #[test]
    fn derived_write_rejected_without_side_effects() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let before = kernel.world().entity(hero).unwrap().clone();

        let err = kernel
            .update_entity(
                hero,
                &fields(&[("credits", json!(50)), ("derived.reflex", json!(30))]),
                MutationOptions::default(),
            )
            .unwrap_err();

        assert!(matches!(err, KernelError::DerivedWrite(ref v) if v.path == "derived.reflex"));
        assert_eq!(kernel.world().entity(hero), Some(&before));
    }

    #[test]
    fn invariant_violation_is_validation() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel
            .spawn(EntityState::character("Kell").with_hit_points(10))
            .unwrap();

        let err = kernel
            .update_entity(hero, &fields(&[("hp.current", json!(11))]), MutationOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Validation(ValidationError::Invariant { .. })
        ));
    }

    #[test]
    fn helpless_hook_marks_unconscious() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();

        kernel
            .update_entity(hero, &fields(&[("condition.step", json!(5))]), MutationOptions::default())
            .unwrap();

        let entity = kernel.world().entity(hero).unwrap();
        assert!(entity.markers.has(StatusMarker::Unconscious));
        assert!(
            kernel
                .journal()
                .get(hero)
                .is_some_and(|f| f.contains(EntityFields::MARKERS | EntityFields::CONDITION))
        );
    }

    #[test]
    fn marker_is_idempotent() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let ship = kernel.spawn(EntityState::vehicle("Shuttle")).unwrap();

        assert_eq!(
            kernel.apply_marker(ship, StatusMarker::Disabled).unwrap(),
            MarkerOutcome::Applied
        );
        let rev = revision(&kernel, ship);
        assert_eq!(
            kernel.apply_marker(ship, StatusMarker::Disabled).unwrap(),
            MarkerOutcome::AlreadyPresent
        );
        assert_eq!(revision(&kernel, ship), rev);
    }

    struct EchoHook {
        outcomes: Arc<Mutex<Vec<MutationOutcome>>>,
    }

    impl MutationHook for EchoHook {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn should_trigger(&self, changes: &EntityChanges, _entity: &EntityState) -> bool {
            changes.fields.contains(EntityFields::HIT_POINTS)
        }

        fn apply(
            &self,
            kernel: &mut MutationKernel<'_, '_>,
            changes: &EntityChanges,
        ) -> Result<(), KernelError> {
            let outcome = kernel.update_entity(
                changes.id,
                &fields(&[("hp.current", json!(1))]),
                MutationOptions::guarded("sync"),
            )?;
            if let Ok(mut outcomes) = self.outcomes.lock() {
                outcomes.push(outcome);
            }
            Ok(())
        }
    }

    #[test]
    fn guard_key_prevents_reentry() {
        let fx = Fixture::new();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let hooks = HookRegistry::empty().with(Arc::new(EchoHook {
            outcomes: Arc::clone(&outcomes),
        }));
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::with_hooks(&mut world, fx.env(), hooks);
        let hero = kernel
            .spawn(EntityState::character("Kell").with_hit_points(10))
            .unwrap();

        let outcome = kernel
            .update_entity(hero, &fields(&[("hp.current", json!(5))]), MutationOptions::guarded("sync"))
            .unwrap();

        assert!(outcome.is_applied());
        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0],
            MutationOutcome::Prevented {
                entity: hero,
                reason: PreventReason::DuplicateGuard("sync".into()),
            }
        );
        assert_eq!(kernel.world().entity(hero).unwrap().hit_points.current, 5);
    }

    struct RunawayHook;

    impl MutationHook for RunawayHook {
        fn name(&self) -> &'static str {
            "runaway"
        }

        fn should_trigger(&self, changes: &EntityChanges, _entity: &EntityState) -> bool {
            changes.fields.contains(EntityFields::CREDITS)
        }

        fn apply(
            &self,
            kernel: &mut MutationKernel<'_, '_>,
            changes: &EntityChanges,
        ) -> Result<(), KernelError> {
            let credits = kernel.entity(changes.id)?.credits;
            kernel.update_entity(
                changes.id,
                &fields(&[("credits", json!(credits + 1))]),
                MutationOptions::from_hook(),
            )?;
            Ok(())
        }
    }

    #[test]
    fn hook_chain_depth_is_bounded() {
        let fx = Fixture::new();
        let hooks = HookRegistry::empty().with(Arc::new(RunawayHook));
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::with_hooks(&mut world, fx.env(), hooks);
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();

        let err = kernel
            .update_entity(hero, &fields(&[("credits", json!(1))]), MutationOptions::default())
            .unwrap_err();
        assert!(matches!(err, KernelError::HookChainTooDeep { hook: "runaway", .. }));
    }

    #[test]
    fn plan_runs_create_delete_set_add() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let old = kernel
            .create_records(hero, Collection::Feats, vec![RecordData::new("Dodge")])
            .unwrap()[0];

        let plan = MutationPlan::new()
            .add(
                Collection::Items,
                RecordData::new("Droid Remote").linked_to(EntityRef::Temporary("droid".into())),
            )
            .set("credits", 250)
            .delete(Collection::Feats, old)
            .create("droid", EntitySeed::named("R5", EntityKind::Creature));

        let outcome = kernel.apply_plan(hero, plan, MutationOptions::default()).unwrap();

        let droid = outcome.created["droid"];
        let entity = kernel.world().entity(hero).unwrap();
        assert_eq!(entity.credits, 250);
        assert!(entity.records.get(Collection::Feats).is_empty());
        let remote = entity
            .records
            .find_by_name(Collection::Items, "Droid Remote")
            .unwrap();
        assert_eq!(remote.linked, Some(droid));
        assert_eq!(outcome.deleted.len(), 1);
        assert_eq!(kernel.world().entity(droid).unwrap().name, "R5");
        assert!(
            kernel
                .journal()
                .get(droid)
                .is_some_and(|f| f.contains(EntityFields::CREATED))
        );
    }

    struct NestedPlanHook {
        outcomes: Arc<Mutex<Vec<PlanOutcome>>>,
    }

    impl MutationHook for NestedPlanHook {
        fn name(&self) -> &'static str {
            "nested_plan"
        }

        fn should_trigger(&self, changes: &EntityChanges, _entity: &EntityState) -> bool {
            changes.fields.contains(EntityFields::CREDITS)
        }

        fn apply(
            &self,
            kernel: &mut MutationKernel<'_, '_>,
            changes: &EntityChanges,
        ) -> Result<(), KernelError> {
            let outcome = kernel.apply_plan(
                changes.id,
                MutationPlan::new().set("level", 3),
                MutationOptions::migration(),
            )?;
            if let Ok(mut outcomes) = self.outcomes.lock() {
                outcomes.push(outcome);
            }
            Ok(())
        }
    }

    #[test]
    fn nested_migration_plan_is_prevented() {
        let fx = Fixture::new();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let hooks = HookRegistry::empty().with(Arc::new(NestedPlanHook {
            outcomes: Arc::clone(&outcomes),
        }));
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::with_hooks(&mut world, fx.env(), hooks);
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let level = kernel.world().entity(hero).unwrap().level;

        let outcome = kernel
            .apply_plan(
                hero,
                MutationPlan::new().set("credits", 90),
                MutationOptions::migration(),
            )
            .unwrap();

        assert!(!outcome.prevented);
        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].prevented);
        assert_eq!(outcomes[0].entity, hero);
        assert!(outcomes[0].fields.is_empty());
        let entity = kernel.world().entity(hero).unwrap();
        assert_eq!(entity.credits, 90);
        assert_eq!(entity.level, level);
    }

    #[test]
    fn plan_with_unknown_temporary_changes_nothing() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let before = kernel.world().entity(hero).unwrap().clone();

        let plan = MutationPlan::new()
            .create("droid", EntitySeed::named("R5", EntityKind::Creature))
            .set("credits", 10)
            .add(
                Collection::Items,
                RecordData::new("Remote").linked_to(EntityRef::Temporary("probe".into())),
            );

        let err = kernel.apply_plan(hero, plan, MutationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            KernelError::Validation(ValidationError::UnknownTemporaryId(ref t)) if t == "probe"
        ));
        assert_eq!(kernel.world().len(), 1);
        assert_eq!(kernel.world().entity(hero), Some(&before));
    }

    #[test]
    fn temporary_reference_outside_plan_is_rejected() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();

        let err = kernel
            .create_records(
                hero,
                Collection::Items,
                vec![RecordData::new("Remote").linked_to(EntityRef::Temporary("droid".into()))],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Validation(ValidationError::UnresolvedTemporary(_))
        ));
    }

    #[test]
    fn move_recomputes_both_sides_once() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let ship = kernel.spawn(EntityState::vehicle("Shuttle")).unwrap();
        let blaster = kernel
            .create_records(hero, Collection::Items, vec![RecordData::new("Blaster")])
            .unwrap()[0];
        let (hero_rev, ship_rev) = (revision(&kernel, hero), revision(&kernel, ship));

        let moved = kernel
            .move_records(hero, ship, Collection::Items, &[blaster])
            .unwrap();

        assert_eq!(revision(&kernel, hero), hero_rev + 1);
        assert_eq!(revision(&kernel, ship), ship_rev + 1);
        assert_eq!(moved.removed, vec![blaster]);
        assert_ne!(moved.created[0], blaster);
        let cargo = kernel.world().entity(ship).unwrap();
        assert_eq!(cargo.records.find(Collection::Items, moved.created[0]).unwrap().name, "Blaster");
    }

    #[test]
    fn move_into_full_collection_reports_partial() {
        let fx = Fixture::with_config(GameConfig::default().with_record_capacity(1));
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let ship = kernel.spawn(EntityState::vehicle("Shuttle")).unwrap();
        let blaster = kernel
            .create_records(hero, Collection::Items, vec![RecordData::new("Blaster")])
            .unwrap()[0];
        kernel
            .create_records(ship, Collection::Items, vec![RecordData::new("Medpac")])
            .unwrap();

        let err = kernel
            .move_records(hero, ship, Collection::Items, &[blaster])
            .unwrap_err();

        let KernelError::PartialMove { removed, .. } = err else {
            panic!("expected partial move, got {err:?}");
        };
        assert_eq!(removed[0].name, "Blaster");
        assert!(kernel.world().entity(hero).unwrap().records.get(Collection::Items).is_empty());
    }

    #[test]
    fn move_to_self_is_rejected() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let err = kernel
            .move_records(hero, hero, Collection::Items, &[])
            .unwrap_err();
        assert!(matches!(err, KernelError::Validation(ValidationError::SameEntity(_))));
    }

    #[test]
    fn delta_grants_content() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();

        let delta = ProgressionDelta::new()
            .set("level", 2)
            .grant(Collection::Feats, "feat.toughness");
        let outcome = kernel
            .apply_delta(hero, delta, MutationOptions::default())
            .unwrap();

        assert_eq!(outcome.added.len(), 1);
        let entity = kernel.world().entity(hero).unwrap();
        assert_eq!(entity.level, 2);
        assert!(entity.records.find_by_name(Collection::Feats, "Toughness").is_some());
    }

    #[test]
    fn delta_rejects_wrong_collection_and_objects() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();

        let err = kernel
            .apply_delta(
                hero,
                ProgressionDelta::new().grant(Collection::Talents, "feat.toughness"),
                MutationOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Validation(ValidationError::UnknownFeature { .. })
        ));

        let err = kernel
            .apply_delta(
                hero,
                ProgressionDelta::new().set("name", json!({ "first": "Kell" })),
                MutationOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            KernelError::Validation(ValidationError::NonLiteralValue { .. })
        ));
    }

    #[test]
    fn restore_reproduces_snapshot() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let hero = kernel.spawn(EntityState::character("Kell")).unwrap();
        let snapshot = EntitySnapshot::capture(kernel.world().entity(hero).unwrap()).unwrap();

        kernel
            .update_entity(hero, &fields(&[("credits", json!(900))]), MutationOptions::default())
            .unwrap();
        kernel.restore_entity(&snapshot).unwrap();

        let entity = kernel.world().entity(hero).unwrap();
        assert_eq!(entity.credits, 0);
        assert!(
            kernel
                .journal()
                .get(hero)
                .is_some_and(|f| f.contains(EntityFields::RESTORED))
        );
    }

    #[test]
    fn seeds_advance_the_nonce() {
        let fx = Fixture::new();
        let mut world = WorldState::new(7);
        let mut kernel = MutationKernel::new(&mut world, fx.env());
        let a = kernel.draw_seed(EntityId(1), 0);
        let b = kernel.draw_seed(EntityId(1), 0);
        assert_ne!(a, b);
        assert_eq!(kernel.world().roll_nonce(), 2);
    }
}
