//! Drives a running world through `WorldHandle` from multiple callers.

use std::time::Duration;

use saga_core::ability::{ExecutionRequest, ExecutionType, LimitScope};
use saga_core::combat::{AttackRequest, DiceFormula};
use saga_content::ContentFactory;
use saga_core::kernel::{FieldMap, MutationOptions, ProgressionDelta};
use saga_core::state::{
    Collection, EntityFields, EntityId, EntityState, FieldPath, RecordData, WorldState,
};
use saga_core::transaction::{PurchaseRequest, TransactionError};
use saga_runtime::{
    AbilityEvent, EntityEvent, Event, OracleManager, ResetScope, Runtime, RuntimeConfig,
    RuntimeError, Topic, TransactionEvent,
};
use tokio::sync::broadcast;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("runtime=debug,saga=debug")
        .with_test_writer()
        .try_init();
}

async fn start() -> Runtime {
    init_tracing();
    let config = RuntimeConfig {
        world_seed: Some(42),
        ..RuntimeConfig::default()
    };
    Runtime::builder()
        .config(config)
        .build()
        .await
        .expect("runtime should start")
}

async fn next_matching(
    rx: &mut broadcast::Receiver<Event>,
    mut wanted: impl FnMut(&Event) -> bool,
) -> Event {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("bus closed");
            if wanted(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event should arrive")
}

#[tokio::test]
async fn spawn_publishes_and_queries_return_copies() {
    let runtime = start().await;
    let handle = runtime.handle();
    let mut entity_rx = handle.subscribe(Topic::Entity);

    let id = handle
        .spawn(EntityState::character("Kira").with_credits(10))
        .await
        .unwrap();

    let event = next_matching(&mut entity_rx, |e| {
        matches!(e, Event::Entity(EntityEvent::Spawned { .. }))
    })
    .await;
    assert!(matches!(event, Event::Entity(EntityEvent::Spawned { entity }) if entity == id));

    let kira = handle.entity(id).await.unwrap().unwrap();
    assert_eq!(kira.name, "Kira");
    assert_eq!(kira.credits, 10);
    assert!(handle.entity(EntityId(999)).await.unwrap().is_none());
    assert_eq!(handle.world().await.unwrap().len(), 1);

    drop(handle);
    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn concurrent_callers_are_serialized() {
    let runtime = start().await;
    let handle = runtime.handle();
    let hoarder = handle.spawn(EntityState::character("Hoarder")).await.unwrap();

    let tasks: Vec<_> = (0..20)
        .map(|n| {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .create_records(
                        hoarder,
                        Collection::Items,
                        vec![RecordData::new(format!("crate {n}"))],
                    )
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap().len(), 1);
    }

    let hoarder = handle.entity(hoarder).await.unwrap().unwrap();
    assert_eq!(hoarder.records.len(Collection::Items), 20);
    assert!(hoarder.check_invariants().is_ok());
}

#[tokio::test]
async fn kernel_errors_reach_the_caller() {
    let runtime = start().await;
    let handle = runtime.handle();

    let mut fields = FieldMap::new();
    fields.insert(FieldPath::Credits.to_string(), 5.into());
    let err = handle
        .update_entity(EntityId(404), fields, MutationOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn updates_publish_the_change_journal() {
    let runtime = start().await;
    let handle = runtime.handle();
    let mut entity_rx = handle.subscribe(Topic::Entity);
    let smuggler = handle.spawn(EntityState::character("Dash")).await.unwrap();

    let mut fields = FieldMap::new();
    fields.insert(FieldPath::Credits.to_string(), 120.into());
    handle
        .update_entity(smuggler, fields, MutationOptions::default())
        .await
        .unwrap();

    let event = next_matching(&mut entity_rx, |e| {
        matches!(
            e,
            Event::Entity(EntityEvent::Changed(changes))
                if changes.fields.contains(EntityFields::CREDITS)
        )
    })
    .await;
    let Event::Entity(EntityEvent::Changed(changes)) = event else {
        unreachable!();
    };
    assert_eq!(changes.id, smuggler);
    assert_eq!(handle.world().await.unwrap().entity(smuggler).unwrap().credits, 120);
}

#[tokio::test]
async fn attacks_keep_the_target_in_range() {
    let runtime = start().await;
    let handle = runtime.handle();
    let mut combat_rx = handle.subscribe(Topic::Combat);
    let wookiee = handle
        .spawn(EntityState::creature("Wookiee").with_hit_points(40))
        .await
        .unwrap();
    let trooper = handle
        .spawn(EntityState::character("Trooper").with_hit_points(12))
        .await
        .unwrap();

    for _ in 0..10 {
        let report = handle
            .attack(AttackRequest::new(wookiee, trooper, DiceFormula::new(2, 6, 2)))
            .await
            .unwrap();
        assert_eq!(report.target, trooper);
        let target = handle.entity(trooper).await.unwrap().unwrap();
        assert!(target.hit_points.current <= target.hit_points.max);
        assert!(target.check_invariants().is_ok());
    }

    let event = next_matching(&mut combat_rx, |_| true).await;
    assert_eq!(event.topic(), Topic::Combat);
}

#[tokio::test]
async fn round_limits_reset_through_the_handle() {
    let runtime = start().await;
    let handle = runtime.handle();
    let mut ability_rx = handle.subscribe(Topic::Ability);
    let jedi = handle
        .spawn(EntityState::character("Ahsa").with_force_points(3))
        .await
        .unwrap();
    let deflect = ExecutionRequest::new("deflect", ExecutionType::Reaction, jedi)
        .limited(LimitScope::Round, 1);

    assert!(handle.execute_ability(deflect.clone()).await.unwrap().success);
    let blocked = handle.execute_ability(deflect.clone()).await.unwrap();
    assert!(blocked.limit_blocked);
    assert_eq!(
        handle.usage(jedi, "deflect", LimitScope::Round).await.unwrap(),
        1
    );

    handle.reset_limits(ResetScope::Round).await.unwrap();
    assert_eq!(
        handle.usage(jedi, "deflect", LimitScope::Round).await.unwrap(),
        0
    );
    assert!(handle.execute_ability(deflect).await.unwrap().success);
    assert_eq!(handle.entity(jedi).await.unwrap().unwrap().force_points, 1);

    let blocked_event = next_matching(&mut ability_rx, |e| {
        matches!(
            e,
            Event::Ability(AbilityEvent::Executed {
                limit_blocked: true,
                ..
            })
        )
    })
    .await;
    assert_eq!(blocked_event.topic(), Topic::Ability);
}

#[tokio::test]
async fn purchase_settles_and_publishes_a_receipt() {
    let runtime = start().await;
    let handle = runtime.handle();
    let mut tx_rx = handle.subscribe(Topic::Transaction);
    let buyer = handle
        .spawn(EntityState::character("Lando").with_credits(500))
        .await
        .unwrap();
    let seller = handle
        .spawn(EntityState::character("Jawa").with_credits(50))
        .await
        .unwrap();
    let item = handle
        .create_records(seller, Collection::Items, vec![RecordData::new("Power coupling")])
        .await
        .unwrap()[0];

    let receipt = handle
        .purchase_item(PurchaseRequest {
            buyer,
            seller,
            item,
            price: 200,
        })
        .await
        .unwrap();

    assert_eq!(handle.entity(buyer).await.unwrap().unwrap().credits, 300);
    assert_eq!(handle.entity(seller).await.unwrap().unwrap().credits, 250);
    let event = next_matching(&mut tx_rx, |_| true).await;
    match event {
        Event::Transaction(TransactionEvent::Settled(settled)) => {
            assert_eq!(*settled, receipt)
        }
        other => panic!("unexpected event {other:?}"),
    }

    let err = handle
        .purchase_item(PurchaseRequest {
            buyer,
            seller,
            item,
            price: 10_000,
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::Transaction(TransactionError::Validation(_))
    ));
    assert_eq!(handle.entity(buyer).await.unwrap().unwrap().credits, 300);
}

#[tokio::test]
async fn builder_resumes_a_persisted_world() {
    init_tracing();
    let mut veteran = EntityState::character("Vette").with_credits(75);
    veteran.id = EntityId(7);
    let world = WorldState::from_entities(3, [veteran]);

    let runtime = Runtime::builder().world(world).build().await.unwrap();
    let handle = runtime.handle();

    let restored = handle.entity(EntityId(7)).await.unwrap().unwrap();
    assert_eq!(restored.credits, 75);
    let newcomer = handle.spawn(EntityState::character("Rook")).await.unwrap();
    assert!(newcomer.0 > 7);
    assert_eq!(handle.world().await.unwrap().game_seed, 3);
}

#[tokio::test]
async fn loaded_content_backs_progression() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("features.ron"),
        r#"(features: [(id: "feat.weapon_focus", collection: feats, name: "Weapon Focus")])"#,
    )
    .unwrap();
    let bundle = ContentFactory::new(dir.path()).load_all().unwrap();

    let runtime = Runtime::builder()
        .oracles(OracleManager::from_bundle(bundle))
        .build()
        .await
        .unwrap();
    let handle = runtime.handle();
    let hero = handle.spawn(EntityState::character("Tam")).await.unwrap();

    let outcome = handle
        .apply_delta(
            hero,
            ProgressionDelta::new().grant(Collection::Feats, "feat.weapon_focus"),
            MutationOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(outcome.added.len(), 1);
    let hero = handle.entity(hero).await.unwrap().unwrap();
    assert!(
        hero.records
            .find_by_name(Collection::Feats, "Weapon Focus")
            .is_some()
    );
}
