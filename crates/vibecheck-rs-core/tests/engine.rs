//! Engine wiring tests: config-driven selection and history persistence.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::tempdir;
use vibecheck_rs_config::{MAX_BATCH_SIZE, VibecheckConfig};
use vibecheck_rs_core::{Vibecheck, VibecheckCoreError};
use vibecheck_rs_protocol::{FeedEventPayload, OutputStatus};
use vibecheck_rs_test_utils::{FixedBackend, RecordingSink};

fn config_with_history(path: &std::path::Path) -> VibecheckConfig {
    let mut config = VibecheckConfig::default();
    config.history.path = Some(path.display().to_string());
    config
}

#[tokio::test]
async fn history_survives_engine_restart() {
    let temp = tempdir().expect("tempdir");
    let path = temp.path().join("settings.json");

    let engine = Vibecheck::new(
        config_with_history(&path),
        None,
        Some(Arc::new(FixedBackend::text("ok"))),
        None,
        None,
    )
    .expect("engine");
    let handle = engine.submit_round("a cat", None).expect("handle");
    handle.settled().await;
    let handle = engine.submit_round("a dog", None).expect("handle");
    handle.settled().await;
    assert_eq!(engine.store().feed().len(), 2);

    let restarted = Vibecheck::new(
        config_with_history(&path),
        None,
        Some(Arc::new(FixedBackend::text("ok"))),
        None,
        None,
    )
    .expect("engine");
    assert_eq!(
        restarted.store().prompt_history(),
        vec!["a dog".to_string(), "a cat".to_string()]
    );
    assert!(restarted.store().feed().is_empty());
}

#[tokio::test]
async fn session_config_sets_initial_selection() {
    let mut config = VibecheckConfig::default();
    config.history.enabled = false;
    config.session.output_mode = Some("svg".to_string());
    config.session.batch_size = 2;
    config.session.batch_model = Some("flash-thinking".to_string());

    let sink = Arc::new(RecordingSink::default());
    let backend = Arc::new(FixedBackend::text("<svg/>"));
    let engine = Vibecheck::new(config, None, Some(backend.clone()), None, Some(sink.clone()))
        .expect("engine");

    let handle = engine.submit_round("circles", None).expect("handle");
    let round_id = handle.round_id();
    handle.settled().await;

    let round = engine.store().round(round_id).expect("round");
    assert_eq!(round.output_mode, "svg");
    assert_eq!(round.outputs.len(), 2);
    assert!(round.outputs.iter().all(|output| output.model == "flash-thinking"));
    assert!(
        round
            .outputs
            .iter()
            .all(|output| output.status() == OutputStatus::Succeeded)
    );
    assert!(backend.requests().iter().all(|request| request.thinking));

    let settled = sink
        .payloads()
        .into_iter()
        .filter(|payload| matches!(payload, FeedEventPayload::OutputSettled { .. }))
        .count();
    assert_eq!(settled, 2);
}

#[test]
fn unknown_session_mode_is_rejected() {
    let mut config = VibecheckConfig::default();
    config.history.enabled = false;
    config.session.output_mode = Some("watercolor".to_string());

    let result = Vibecheck::new(config, None, Some(Arc::new(FixedBackend::text("ok"))), None, None);
    assert!(matches!(result, Err(VibecheckCoreError::UnknownMode(mode)) if mode == "watercolor"));
}

#[test]
fn out_of_range_batch_size_is_rejected() {
    for batch_size in [0, MAX_BATCH_SIZE + 1, 50] {
        let mut config = VibecheckConfig::default();
        config.history.enabled = false;
        config.session.batch_size = batch_size;

        let result =
            Vibecheck::new(config, None, Some(Arc::new(FixedBackend::text("ok"))), None, None);
        assert!(
            matches!(result, Err(VibecheckCoreError::Config(_))),
            "batch_size={batch_size} accepted"
        );
    }
}

#[test]
fn zero_concurrency_is_rejected() {
    let mut config = VibecheckConfig::default();
    config.history.enabled = false;
    config.generation.concurrency = 0;

    let result = Vibecheck::new(config, None, Some(Arc::new(FixedBackend::text("ok"))), None, None);
    assert!(matches!(result, Err(VibecheckCoreError::Config(_))));
}
