use super::{FieldMap, KernelError, MoveOutcome, MutationKernel, MutationOptions, MutationOutcome};
use crate::state::{
    Collection, EntityId, EntitySnapshot, FeatureRecord, RecordData, RecordId, WorldState,
};

/// The kernel operations multi-entity workflows are built from.
///
/// Implemented by [`MutationKernel`]. Coordinators depend on this trait
/// rather than the kernel itself so a failing step can be injected in tests.
pub trait EntityMutator {
    fn world(&self) -> &WorldState;

    fn update_entity(
        &mut self,
        id: EntityId,
        fields: &FieldMap,
        opts: MutationOptions,
    ) -> Result<MutationOutcome, KernelError>;

    fn create_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        records: Vec<RecordData>,
    ) -> Result<Vec<RecordId>, KernelError>;

    fn delete_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<Vec<FeatureRecord>, KernelError>;

    fn move_records(
        &mut self,
        source: EntityId,
        target: EntityId,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<MoveOutcome, KernelError>;

    fn restore_entity(&mut self, snapshot: &EntitySnapshot) -> Result<(), KernelError>;
}

impl EntityMutator for MutationKernel<'_, '_> {
    fn world(&self) -> &WorldState {
        MutationKernel::world(self)
    }

    fn update_entity(
        &mut self,
        id: EntityId,
        fields: &FieldMap,
        opts: MutationOptions,
    ) -> Result<MutationOutcome, KernelError> {
        MutationKernel::update_entity(self, id, fields, opts)
    }

    fn create_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        records: Vec<RecordData>,
    ) -> Result<Vec<RecordId>, KernelError> {
        MutationKernel::create_records(self, id, collection, records)
    }

    fn delete_records(
        &mut self,
        id: EntityId,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<Vec<FeatureRecord>, KernelError> {
        MutationKernel::delete_records(self, id, collection, ids)
    }

    fn move_records(
        &mut self,
        source: EntityId,
        target: EntityId,
        collection: Collection,
        ids: &[RecordId],
    ) -> Result<MoveOutcome, KernelError> {
        MutationKernel::move_records(self, source, target, collection, ids)
    }

    fn restore_entity(&mut self, snapshot: &EntitySnapshot) -> Result<(), KernelError> {
        MutationKernel::restore_entity(self, snapshot)
    }
}
