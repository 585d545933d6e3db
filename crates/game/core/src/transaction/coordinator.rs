//! Best-effort multi-entity transactions with snapshot rollback.

use chrono::Utc;
use tracing::{debug, error, warn};

use super::error::{RollbackCompoundError, RollbackFailure, TransactionError, TransactionValidation};
use super::types::{
    PurchaseRequest, SaleRequest, TransactionKind, TransactionReceipt, TransferRequest,
};
use crate::kernel::{EntityMutator, FieldMap, KernelError, MutationOptions, ValidationError};
use crate::state::{
    Collection, EntityId, EntitySnapshot, EntityState, FieldPath, RecordData, RecordId, WorldState,
};

/// Purchases, sales and transfers between entities.
///
/// # Atomicity
///
/// These operations are **not atomic**. Each step is an ordinary kernel
/// call, hooks fire as it lands, and another observer of the world could see
/// the intermediate state. When a step fails, every participant is restored
/// from a snapshot taken before the first step and the restore is checked
/// against the snapshot digest. If the restore itself fails the result is
/// [`TransactionError::RollbackFailed`] and the world may hold partial
/// state.
#[derive(Clone, Copy, Debug, Default)]
pub struct TransactionCoordinator;

impl TransactionCoordinator {
    /// Debit buyer, credit seller, delete the item from the seller, create it on the buyer.
    pub fn purchase_item<M>(
        mutator: &mut M,
        request: &PurchaseRequest,
    ) -> Result<TransactionReceipt, TransactionError>
    where
        M: EntityMutator + ?Sized,
    {
        let kind = TransactionKind::Purchase;
        let price = non_negative(request.price)?;
        if request.buyer == request.seller {
            return Err(TransactionValidation::SameParticipant(request.buyer).into());
        }
        let world = mutator.world();
        let buyer = participant(world, request.buyer)?;
        let seller = participant(world, request.seller)?;
        if buyer.credits < price {
            return Err(TransactionValidation::InsufficientCredits {
                buyer: buyer.id,
                credits: buyer.credits,
                price,
            }
            .into());
        }
        can_credit(seller, price)?;
        require_item(seller, request.item)?;
        let snapshots = capture(&[buyer, seller])?;

        let mut step = "";
        let result = run_purchase(mutator, request, price, &mut step);
        let new_item = settle(mutator, kind, step, result, &snapshots)?;

        debug!(
            target: "saga::transaction",
            buyer = %request.buyer,
            seller = %request.seller,
            item = %request.item,
            price,
            "purchase completed"
        );
        Ok(receipt(kind, vec![request.buyer, request.seller], request.item, Some(new_item), price))
    }

    /// Delete the item from the seller, then credit the seller.
    pub fn sell_item<M>(
        mutator: &mut M,
        request: &SaleRequest,
    ) -> Result<TransactionReceipt, TransactionError>
    where
        M: EntityMutator + ?Sized,
    {
        let kind = TransactionKind::Sale;
        let price = non_negative(request.price)?;
        let seller = participant(mutator.world(), request.seller)?;
        can_credit(seller, price)?;
        require_item(seller, request.item)?;
        let snapshots = capture(&[seller])?;

        let mut step = "";
        let result = run_sale(mutator, request, price, &mut step);
        settle(mutator, kind, step, result, &snapshots)?;

        debug!(
            target: "saga::transaction",
            seller = %request.seller,
            item = %request.item,
            price,
            "sale completed"
        );
        Ok(receipt(kind, vec![request.seller], request.item, None, price))
    }

    /// Move the item record from one entity to another.
    pub fn transfer_item<M>(
        mutator: &mut M,
        request: &TransferRequest,
    ) -> Result<TransactionReceipt, TransactionError>
    where
        M: EntityMutator + ?Sized,
    {
        let kind = TransactionKind::Transfer;
        if request.from == request.to {
            return Err(TransactionValidation::SameParticipant(request.from).into());
        }
        let world = mutator.world();
        let from = participant(world, request.from)?;
        let to = participant(world, request.to)?;
        require_item(from, request.item)?;
        let snapshots = capture(&[from, to])?;

        let step = "move_item";
        let result = mutator
            .move_records(request.from, request.to, Collection::Items, &[request.item])
            .and_then(|moved| {
                moved
                    .created
                    .first()
                    .copied()
                    .ok_or_else(|| missing_created(request.to))
            });
        let new_item = settle(mutator, kind, step, result, &snapshots)?;

        debug!(
            target: "saga::transaction",
            from = %request.from,
            to = %request.to,
            item = %request.item,
            "transfer completed"
        );
        Ok(receipt(kind, vec![request.from, request.to], request.item, Some(new_item), 0))
    }
}

fn run_purchase<M>(
    mutator: &mut M,
    request: &PurchaseRequest,
    price: u64,
    step: &mut &'static str,
) -> Result<RecordId, KernelError>
where
    M: EntityMutator + ?Sized,
{
    *step = "debit_buyer";
    adjust_credits(mutator, request.buyer, |credits| credits.checked_sub(price))?;

    *step = "credit_seller";
    adjust_credits(mutator, request.seller, |credits| credits.checked_add(price))?;

    *step = "delete_item";
    let removed = mutator.delete_records(request.seller, Collection::Items, &[request.item])?;

    *step = "create_item";
    let data: Vec<RecordData> = removed.iter().map(|record| record.to_data()).collect();
    let created = mutator.create_records(request.buyer, Collection::Items, data)?;
    created
        .first()
        .copied()
        .ok_or_else(|| missing_created(request.buyer))
}

fn run_sale<M>(
    mutator: &mut M,
    request: &SaleRequest,
    price: u64,
    step: &mut &'static str,
) -> Result<(), KernelError>
where
    M: EntityMutator + ?Sized,
{
    *step = "delete_item";
    mutator.delete_records(request.seller, Collection::Items, &[request.item])?;

    *step = "credit_seller";
    adjust_credits(mutator, request.seller, |credits| credits.checked_add(price))
}

fn adjust_credits<M>(
    mutator: &mut M,
    id: EntityId,
    change: impl FnOnce(u64) -> Option<u64>,
) -> Result<(), KernelError>
where
    M: EntityMutator + ?Sized,
{
    let current = mutator
        .world()
        .entity(id)
        .ok_or(ValidationError::EntityNotFound(id))?
        .credits;
    let updated = change(current).ok_or(ValidationError::Invariant {
        entity: id,
        message: "credits out of range",
    })?;
    let mut fields = FieldMap::new();
    fields.insert(FieldPath::Credits.to_string(), updated.into());
    mutator.update_entity(id, &fields, MutationOptions::default())?;
    Ok(())
}

/// Passes a successful result through, or rolls back and reports the failure.
fn settle<M, T>(
    mutator: &mut M,
    kind: TransactionKind,
    step: &'static str,
    result: Result<T, KernelError>,
    snapshots: &[EntitySnapshot],
) -> Result<T, TransactionError>
where
    M: EntityMutator + ?Sized,
{
    match result {
        Ok(value) => Ok(value),
        Err(cause) => Err(rollback(mutator, kind, step, cause, snapshots)),
    }
}

fn rollback<M>(
    mutator: &mut M,
    kind: TransactionKind,
    step: &'static str,
    cause: KernelError,
    snapshots: &[EntitySnapshot],
) -> TransactionError
where
    M: EntityMutator + ?Sized,
{
    warn!(
        target: "saga::transaction",
        %kind,
        step,
        error = %cause,
        participants = snapshots.len(),
        "step failed, rolling back"
    );

    let mut failures = Vec::new();
    for snapshot in snapshots {
        let id = snapshot.id();
        if let Err(err) = mutator.restore_entity(snapshot) {
            failures.push((id, RollbackFailure::Restore(err)));
            continue;
        }
        let verified = match mutator.world().entity(id) {
            None => Err(RollbackFailure::Missing),
            Some(current) => match snapshot.matches(current) {
                Ok(true) => Ok(()),
                Ok(false) => Err(RollbackFailure::DigestMismatch),
                Err(err) => Err(RollbackFailure::Snapshot(err)),
            },
        };
        if let Err(failure) = verified {
            failures.push((id, failure));
        }
    }

    if failures.is_empty() {
        return TransactionError::Execution { kind, step, cause };
    }
    for (entity, failure) in &failures {
        error!(
            target: "saga::transaction",
            %kind,
            step,
            %entity,
            original = %cause,
            error = %failure,
            "rollback failed"
        );
    }
    TransactionError::RollbackFailed(Box::new(RollbackCompoundError {
        kind,
        step,
        original: cause,
        failures,
    }))
}

fn non_negative(price: i64) -> Result<u64, TransactionValidation> {
    u64::try_from(price).map_err(|_| TransactionValidation::NegativePrice(price))
}

fn participant(world: &WorldState, id: EntityId) -> Result<&EntityState, TransactionValidation> {
    world
        .entity(id)
        .ok_or(TransactionValidation::UnknownParticipant(id))
}

fn can_credit(entity: &EntityState, price: u64) -> Result<(), TransactionValidation> {
    entity
        .credits
        .checked_add(price)
        .map(|_| ())
        .ok_or(TransactionValidation::CreditOverflow {
            entity: entity.id,
            price,
        })
}

fn require_item(owner: &EntityState, item: RecordId) -> Result<(), TransactionValidation> {
    if owner.records.contains(Collection::Items, item) {
        Ok(())
    } else {
        Err(TransactionValidation::ItemNotFound {
            owner: owner.id,
            item,
        })
    }
}

fn capture(participants: &[&EntityState]) -> Result<Vec<EntitySnapshot>, TransactionError> {
    participants
        .iter()
        .map(|entity| EntitySnapshot::capture(entity).map_err(TransactionError::from))
        .collect()
}

fn missing_created(id: EntityId) -> KernelError {
    ValidationError::Invariant {
        entity: id,
        message: "no record was created",
    }
    .into()
}

fn receipt(
    kind: TransactionKind,
    participants: Vec<EntityId>,
    item: RecordId,
    new_item: Option<RecordId>,
    price: u64,
) -> TransactionReceipt {
    TransactionReceipt {
        kind,
        participants,
        item,
        new_item,
        price,
        timestamp: Utc::now(),
    }
}
