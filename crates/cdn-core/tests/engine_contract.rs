//! Contract Test: Engine persistence and pass restarts
//!
//! Constraints verified:
//! - State is persisted after successful passes only
//! - A pass that loses a concurrent-modification race is restarted from a fresh fetch
//! - Restarts are bounded
//! - Remove after disable keeps the state with `enabled = false`
//! - State on disk makes a restarted process idempotent

mod common;

use cdn_core::traits::{ProviderError, ProviderErrorKind, StateStore};
use cdn_core::{DistributionEngine, EngineEvent, Error, FileStateStore, MemoryStateStore, RemoveOutcome};
use common::*;

fn engine(
    provider: &MockDistributionProvider,
    store: &MemoryStateStore,
) -> (DistributionEngine, tokio::sync::mpsc::Receiver<EngineEvent>) {
    DistributionEngine::new(
        Box::new(provider.clone()),
        Box::new(store.clone()),
        fast_engine_config(),
    )
    .expect("engine construction succeeds")
}

fn conflict() -> ProviderError {
    ProviderError::new(ProviderErrorKind::Conflict, "PreconditionFailed", "stale")
}

#[tokio::test]
async fn deploy_persists_state_and_emits_events() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, mut events) = engine(&provider, &store);

    let state = engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap();

    assert_eq!(store.get_state("website").await.unwrap(), Some(state.clone()));
    assert_eq!(
        drain_events(&mut events),
        vec![
            EngineEvent::DeployStarted {
                name: "website".to_string()
            },
            EngineEvent::DistributionCreated {
                name: "website".to_string(),
                id: state.id.clone(),
                url: state.url.clone(),
            },
        ]
    );

    engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap();
    assert_eq!(provider.mutation_count(), 1);
    assert!(drain_events(&mut events).contains(&EngineEvent::DistributionUnchanged {
        name: "website".to_string(),
        id: state.id,
    }));
}

#[tokio::test]
async fn failed_create_leaves_store_untouched() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, mut events) = engine(&provider, &store);
    provider.fail_next(Op::Create, ProviderError::rejected("InvalidArgument", "bad origin"));

    let err = engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap_err();

    assert!(matches!(err, Error::Provider { .. }));
    assert!(store.is_empty().await);
    assert!(matches!(
        drain_events(&mut events).last(),
        Some(EngineEvent::DeployFailed { .. })
    ));
}

#[tokio::test]
async fn failed_update_keeps_previous_state() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, _events) = engine(&provider, &store);

    let first = engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap();
    provider.fail_next(Op::Update, ProviderError::rejected("InvalidOrigin", "nope"));

    assert!(engine.deploy("website", &bucket_inputs("anotherbucket")).await.is_err());
    assert_eq!(store.get_state("website").await.unwrap(), Some(first));
}

#[tokio::test]
async fn concurrent_modification_restarts_the_pass() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, mut events) = engine(&provider, &store);

    let first = engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap();
    let id = first.id.clone();
    provider.fail_next(Op::Update, conflict());

    let state = engine
        .deploy("website", &bucket_inputs("anotherbucket"))
        .await
        .unwrap();

    assert_eq!(state.origins, bucket_inputs("anotherbucket").origins);
    assert_eq!(
        provider.count(|c| matches!(c, Call::GetDistributionConfig { .. })),
        2
    );
    assert_eq!(
        provider.count(|c| matches!(c, Call::UpdateDistribution { .. })),
        2
    );

    // Each submission used the token of the fetch right before it
    let calls = provider.calls();
    let tokens = provider.fetched_tokens();
    let submitted: Vec<String> = calls
        .iter()
        .filter_map(|c| match c {
            Call::UpdateDistribution { if_match, .. } => Some(if_match.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(submitted, tokens);

    assert!(drain_events(&mut events).contains(&EngineEvent::PassRetried {
        name: "website".to_string(),
        attempt: 1,
    }));
    assert_eq!(store.get_state("website").await.unwrap().unwrap().id, id);
}

#[tokio::test]
async fn out_of_band_change_is_picked_up_by_the_next_fetch() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, _events) = engine(&provider, &store);

    let first = engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap();
    provider.touch(&first.id);
    provider.touch(&first.id);

    engine
        .deploy("website", &bucket_inputs("anotherbucket"))
        .await
        .unwrap();

    assert_eq!(provider.update_requests()[0].if_match, "ETAG3");
}

#[tokio::test]
async fn pass_restarts_are_bounded() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, _events) = engine(&provider, &store);

    let first = engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap();
    for _ in 0..3 {
        provider.fail_next(Op::Update, conflict());
    }

    let err = engine
        .deploy("website", &bucket_inputs("anotherbucket"))
        .await
        .unwrap_err();

    assert!(err.is_concurrent_modification());
    // One initial pass plus max_pass_retries restarts
    assert_eq!(
        provider.count(|c| matches!(c, Call::UpdateDistribution { .. })),
        3
    );
    assert_eq!(store.get_state("website").await.unwrap(), Some(first));
}

#[tokio::test]
async fn input_errors_are_not_retried() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, _events) = engine(&provider, &store);

    let err = engine
        .deploy("website", &cdn_core::DistributionInputs::new(vec![]))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::EmptyOriginList));
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn remove_without_state_is_skipped() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, mut events) = engine(&provider, &store);

    assert_eq!(engine.remove("website").await.unwrap(), RemoveOutcome::Skipped);
    assert!(provider.calls().is_empty());
    assert!(drain_events(&mut events).contains(&EngineEvent::RemoveSkipped {
        name: "website".to_string()
    }));
}

#[tokio::test]
async fn remove_after_disable_keeps_state() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, mut events) = engine(&provider, &store);

    let deployed = engine.deploy("website", &bucket_inputs("mybucket")).await.unwrap();

    assert_eq!(engine.remove("website").await.unwrap(), RemoveOutcome::Disabled);
    let kept = engine.state("website").await.unwrap().unwrap();
    assert_eq!(store.get_state("website").await.unwrap(), Some(kept.clone()));
    assert_eq!(kept.id, deployed.id);
    assert!(!kept.enabled);
    assert!(drain_events(&mut events).contains(&EngineEvent::DistributionDisabled {
        name: "website".to_string(),
        id: deployed.id.clone(),
    }));

    assert_eq!(engine.remove("website").await.unwrap(), RemoveOutcome::Deleted);
    assert!(engine.state("website").await.unwrap().is_none());
    assert_eq!(provider.distribution_count(), 0);
    assert!(drain_events(&mut events).contains(&EngineEvent::DistributionDeleted {
        name: "website".to_string(),
        id: deployed.id,
    }));
}

#[tokio::test]
async fn remove_of_disabled_deployment_deletes_directly() {
    let provider = MockDistributionProvider::new();
    let store = MemoryStateStore::new();
    let (engine, _events) = engine(&provider, &store);

    engine
        .deploy("website", &bucket_inputs("mybucket").with_enabled(false))
        .await
        .unwrap();

    assert_eq!(engine.remove("website").await.unwrap(), RemoveOutcome::Deleted);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn file_state_makes_restarted_process_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let provider = MockDistributionProvider::new();

    {
        let store = FileStateStore::new(&path).await.unwrap();
        let (engine, _events) =
            DistributionEngine::new(Box::new(provider.clone()), Box::new(store), fast_engine_config())
                .unwrap();
        engine.deploy("website", &private_bucket_inputs("mybucket")).await.unwrap();
    }

    let store = FileStateStore::new(&path).await.unwrap();
    let (engine, _events) =
        DistributionEngine::new(Box::new(provider.clone()), Box::new(store), fast_engine_config())
            .unwrap();
    let calls_before = provider.calls().len();

    engine.deploy("website", &private_bucket_inputs("mybucket")).await.unwrap();

    assert_eq!(provider.calls().len(), calls_before);
    assert_eq!(provider.distribution_count(), 1);
}
