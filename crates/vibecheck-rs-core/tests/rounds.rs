//! Round/output lifecycle integration tests.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use vibecheck_rs_core::{
    AppStore, GenerationClient, LazyBackend, Registry, RetryPolicy, RoundManager, Selection,
};
use vibecheck_rs_protocol::{
    GenerationBackend, GenerationError, OutputStatus, RawResponse, Round,
};
use vibecheck_rs_test_utils::{FixedBackend, GatedBackend, ScriptedBackend, StaticSecret};

fn manager_with_policy(
    backend: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
    concurrency: usize,
) -> RoundManager {
    let registry = Arc::new(Registry::default());
    let selection = Selection::initial(&registry);
    let store = AppStore::new(registry, selection);
    let client = GenerationClient::with_policy(backend, policy, concurrency);
    RoundManager::new(store, client)
}

fn manager(backend: Arc<dyn GenerationBackend>) -> RoundManager {
    manager_with_policy(backend, RetryPolicy::default(), 9)
}

fn statuses(round: &Round) -> Vec<OutputStatus> {
    round.outputs.iter().map(|output| output.status()).collect()
}

/// Submitting "a cat" with batch 3 on flash publishes three busy flash slots.
#[tokio::test]
async fn submit_publishes_pending_round_before_dispatch() {
    let backend = Arc::new(GatedBackend::new("function setup() {}"));
    let manager = manager(backend.clone());

    let handle = manager.submit_round("a cat", None).expect("handle");
    let feed = manager.store().feed();
    assert_eq!(feed.len(), 1);
    let round = &feed[0];
    assert_eq!(round.id, handle.round_id());
    assert_eq!(round.prompt, "a cat");
    assert_eq!(round.output_mode, "p5");
    assert_eq!(round.outputs.len(), 3);
    assert!(round.outputs.iter().all(|output| output.is_busy && output.model == "flash"));
    assert_eq!(manager.store().prompt_history(), vec!["a cat".to_string()]);

    backend.release(3);
    handle.settled().await;
    let round = manager.store().round(round.id).expect("round");
    assert_eq!(statuses(&round), vec![OutputStatus::Succeeded; 3]);
    assert!(
        round
            .outputs
            .iter()
            .all(|output| output.output_data.as_deref() == Some("function setup() {}"))
    );
}

/// K slots always end in K terminal states, whatever each slot's outcome.
#[tokio::test]
async fn every_slot_reaches_a_terminal_state() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Ok(RawResponse::Text("one".to_string())),
        Err(GenerationError::Backend("boom".to_string())),
        Err(GenerationError::Cancelled),
        Ok(RawResponse::Text("two".to_string())),
    ]));
    let policy = RetryPolicy {
        max_attempts: 1,
        ..RetryPolicy::default()
    };
    let manager = manager_with_policy(backend, policy, 9);
    manager.store().set_batch_size(4).expect("size");

    let handle = manager.submit_round("shapes", None).expect("handle");
    let round_id = handle.round_id();
    handle.settled().await;

    let round = manager.store().round(round_id).expect("round");
    assert!(round.is_settled());
    let statuses = statuses(&round);
    let count = |status: OutputStatus| statuses.iter().filter(|s| **s == status).count();
    assert_eq!(count(OutputStatus::Succeeded), 2);
    assert_eq!(count(OutputStatus::Failed), 1);
    assert_eq!(count(OutputStatus::Empty), 1);
    assert!(round.outputs.iter().all(|output| output.total_time_ms.is_some()));
}

/// Completions for a removed round leave the feed untouched.
#[tokio::test]
async fn late_completion_after_removal_is_noop() {
    let backend = Arc::new(GatedBackend::new("late"));
    let manager = manager(backend.clone());

    let removed = manager.submit_round("first", None).expect("first");
    let kept = manager.submit_round("second", None).expect("second");
    let (removed_id, kept_id) = (removed.round_id(), kept.round_id());
    assert!(manager.remove_round(removed_id));

    backend.release(6);
    removed.settled().await;
    kept.settled().await;

    let feed = manager.store().feed();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].id, kept_id);
    assert_eq!(statuses(&feed[0]), vec![OutputStatus::Succeeded; 3]);
    assert_eq!(backend.calls(), 6);
}

/// Reset clears the feed; in-flight work finishes without resurrecting rounds.
#[tokio::test]
async fn reset_discards_in_flight_rounds() {
    let backend = Arc::new(GatedBackend::new("late"));
    let manager = manager(backend.clone());

    let handle = manager.submit_round("a cat", None).expect("handle");
    assert_eq!(manager.reset(), 1);
    backend.release(3);
    handle.settled().await;

    assert!(manager.store().feed().is_empty());
    assert_eq!(backend.calls(), 3);
}

/// Versus mode with nothing selected ignores the submission entirely.
#[tokio::test]
async fn empty_versus_selection_is_noop() {
    let backend = Arc::new(FixedBackend::text("unused"));
    let manager = manager(backend.clone());
    manager.store().set_batch_mode(false);
    manager.store().set_versus_models::<&str>(&[]);

    assert!(manager.submit_round("a cat", None).is_none());
    assert!(manager.store().feed().is_empty());
    assert!(manager.store().prompt_history().is_empty());
    assert_eq!(backend.calls(), 0);
}

/// Eighteen slots never put more than nine calls in flight.
#[tokio::test]
async fn concurrency_is_capped_across_rounds() {
    let backend = Arc::new(GatedBackend::new("ok"));
    let manager = manager(backend.clone());
    manager.store().set_batch_size(9).expect("size");

    let first = manager.submit_round("one", None).expect("first");
    let second = manager.submit_round("two", None).expect("second");
    assert_eq!(first.slots() + second.slots(), 18);

    backend.wait_for_calls(9).await;
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
    assert_eq!(backend.calls(), 9);
    assert_eq!(backend.in_flight(), 9);
    assert_eq!(manager.client().available_permits(), 0);

    backend.release(18);
    first.settled().await;
    second.settled().await;
    assert_eq!(backend.calls(), 18);
    assert!(backend.peak() <= 9);
    assert_eq!(manager.client().available_permits(), 9);
}

/// Versus slots follow selection order and carry each model's thinking flags.
#[tokio::test]
async fn versus_round_dispatches_one_slot_per_model() {
    let backend = Arc::new(FixedBackend::text("<svg/>"));
    let manager = manager(backend.clone());
    manager.store().set_output_mode("svg").expect("mode");
    manager.store().set_batch_mode(false);

    let handle = manager.submit_round("a dog", None).expect("handle");
    let round_id = handle.round_id();
    handle.settled().await;

    let round = manager.store().round(round_id).expect("round");
    let models: Vec<_> = round.outputs.iter().map(|output| output.model.as_str()).collect();
    assert_eq!(models, vec!["flash", "flash-thinking"]);
    assert!(round.outputs.iter().all(|output| !output.is_batch));

    let mut thinking: Vec<_> = backend
        .requests()
        .iter()
        .map(|request| (request.model.clone(), request.thinking, request.thinking_capable))
        .collect();
    thinking.sort();
    assert_eq!(
        thinking,
        vec![
            ("gemini-2.5-flash".to_string(), false, true),
            ("gemini-2.5-flash".to_string(), true, true),
        ]
    );
    let svg = manager.store().registry().require_mode("svg").expect("svg");
    assert!(
        backend
            .requests()
            .iter()
            .all(|request| request.system_instruction == svg.system_instruction)
    );
}

/// Image mode sends the input image and stores data URIs.
#[tokio::test]
async fn image_round_uses_image_model_and_input() {
    let backend = Arc::new(FixedBackend::image("image/png", "QUJD"));
    let manager = manager(backend.clone());
    manager.store().set_output_mode("image").expect("mode");
    manager.store().set_batch_size(1).expect("size");

    let image = "data:image/png;base64,SU5QVVQ=".to_string();
    let handle = manager
        .submit_round("make it blue", Some(image.clone()))
        .expect("handle");
    let round_id = handle.round_id();
    handle.settled().await;

    let round = manager.store().round(round_id).expect("round");
    assert_eq!(round.outputs[0].model, "image-editor");
    assert_eq!(
        round.outputs[0].output_data.as_deref(),
        Some("data:image/png;base64,QUJD")
    );
    let requests = backend.requests();
    assert_eq!(requests[0].model, "gemini-2.5-flash-image-preview");
    assert!(requests[0].image_output);
    assert_eq!(requests[0].prompt_image.as_deref(), Some(image.as_str()));
}

/// Without an API key every slot fails and the key is looked up once.
#[tokio::test]
async fn missing_credential_fails_slots() {
    let secrets = Arc::new(StaticSecret::missing());
    let backend = Arc::new(LazyBackend::new(secrets.clone(), |_| {
        Arc::new(FixedBackend::text("unused")) as Arc<dyn GenerationBackend>
    }));
    let manager = manager(backend);

    let handle = manager.submit_round("a cat", None).expect("handle");
    let round_id = handle.round_id();
    handle.settled().await;

    let round = manager.store().round(round_id).expect("round");
    assert_eq!(statuses(&round), vec![OutputStatus::Failed; 3]);
    assert_eq!(secrets.calls(), 1);
}

/// Elapsed time includes retries and backoff.
#[tokio::test(start_paused = true)]
async fn total_time_covers_retries() {
    let backend = Arc::new(ScriptedBackend::new(vec![
        Err(GenerationError::Backend("503".to_string())),
        Ok(RawResponse::Text("ok".to_string())),
    ]));
    let manager = manager(backend);
    manager.store().set_batch_size(1).expect("size");

    let handle = manager.submit_round("retry me", None).expect("handle");
    let round_id = handle.round_id();
    handle.settled().await;

    let round = manager.store().round(round_id).expect("round");
    assert_eq!(round.outputs[0].status(), OutputStatus::Succeeded);
    assert!(round.outputs[0].total_time_ms.unwrap_or_default() >= 1_233);
}
