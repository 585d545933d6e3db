//! Loaded content driving progression deltas through the kernel.

use saga_content::FeatureLoader;
use saga_core::ability::{AbilityOutcome, AbilityRouter, ExecutionRequest, ExecutionType, RateLimiter};
use saga_core::env::Env;
use saga_core::kernel::{MutationKernel, MutationOptions, ProgressionDelta};
use saga_core::state::{Collection, EntityState, WorldState};
use saga_core::{GameConfig, PcgRng, RulesTables};
use serde_json::json;

const FEATURES: &str = r#"(
    features: [
        (id: "feat.toughness", collection: feats, name: "Toughness"),
        (id: "talent.block", collection: talents, name: "Block", payload: {"reaction": true}),
    ],
)"#;

#[test]
fn level_up_grants_catalog_features() {
    let catalog = FeatureLoader::parse(FEATURES).unwrap();
    let (tables, config, rng) = (RulesTables::default(), GameConfig::default(), PcgRng);
    let env = Env::with_all(&catalog, &tables, &config, &rng).into_game_env();
    let mut world = WorldState::new(11);
    let mut kernel = MutationKernel::new(&mut world, env);
    let hero = kernel.spawn(EntityState::character("Rex")).unwrap();

    let delta = ProgressionDelta::new()
        .set("level", 2)
        .grant(Collection::Feats, "feat.toughness")
        .grant(Collection::Talents, "talent.block");
    let outcome = kernel
        .apply_delta(hero, delta, MutationOptions::default())
        .unwrap();

    assert_eq!(outcome.added.len(), 2);
    let hero_state = kernel.entity(hero).unwrap();
    assert_eq!(hero_state.level, 2);
    let block = hero_state
        .records
        .find_by_name(Collection::Talents, "Block")
        .unwrap();
    assert_eq!(block.payload, json!({ "reaction": true }));
}

#[test]
fn talent_ability_applies_a_delta() {
    let catalog = FeatureLoader::parse(FEATURES).unwrap();
    let (tables, config, rng) = (RulesTables::default(), GameConfig::default(), PcgRng);
    let env = Env::with_all(&catalog, &tables, &config, &rng).into_game_env();
    let mut world = WorldState::new(11);
    let mut kernel = MutationKernel::new(&mut world, env);
    let hero = kernel.spawn(EntityState::character("Rex")).unwrap();

    let request = ExecutionRequest::new("train", ExecutionType::Talent, hero).with_payload(json!({
        "delta": { "add": { "feats": ["feat.toughness"] } }
    }));
    let result = AbilityRouter::default()
        .execute(&mut kernel, &mut RateLimiter::default(), &request)
        .unwrap();

    assert!(matches!(
        result.outcome,
        Some(AbilityOutcome::Talent { added: 1, .. })
    ));
    assert_eq!(
        kernel.entity(hero).unwrap().records.len(Collection::Feats),
        1
    );
}

#[test]
fn unknown_feature_is_a_validation_error() {
    let catalog = FeatureLoader::parse(FEATURES).unwrap();
    let (tables, config, rng) = (RulesTables::default(), GameConfig::default(), PcgRng);
    let env = Env::with_all(&catalog, &tables, &config, &rng).into_game_env();
    let mut world = WorldState::new(11);
    let mut kernel = MutationKernel::new(&mut world, env);
    let hero = kernel.spawn(EntityState::character("Rex")).unwrap();

    let delta = ProgressionDelta::new().grant(Collection::Feats, "feat.missing");
    let err = kernel
        .apply_delta(hero, delta, MutationOptions::default())
        .unwrap_err();
    assert!(err.as_validation().is_some());
    assert_eq!(kernel.entity(hero).unwrap().records.total(), 0);
}
