//! Application state store: feed, selection, and prompt history behind one lock.
//!
//! Every mutation takes the write lock for its whole read-modify-write, so
//! concurrent slot completions and user actions never interleave. Events are
//! emitted while the lock is held; sinks must not call back into the store.
//! History is written to the settings store after the lock is released.

use crate::error::VibecheckCoreError;
use crate::history::PromptHistory;
use crate::registry::Registry;
use crate::rounds::build_round;
use crate::selection::Selection;
use crate::state::{PersistedState, SettingsStore};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use vibecheck_rs_protocol::{
    EventSink, FeedEvent, FeedEventPayload, Output, OutputId, Round, RoundId, SlotOutcome,
};

/// Observable application state.
#[derive(Debug, Clone, Serialize)]
pub struct AppState {
    /// Rounds, newest first.
    pub feed: Vec<Round>,
    /// Mode and model selection.
    pub selection: Selection,
    /// Submitted prompts, newest first.
    pub prompt_history: PromptHistory,
}

/// Shared handle to the application state. Clones observe the same state.
#[derive(Clone)]
pub struct AppStore {
    state: Arc<RwLock<AppState>>,
    registry: Arc<Registry>,
    sink: Option<Arc<dyn EventSink>>,
    settings: Option<Arc<dyn SettingsStore>>,
    history_writer: Arc<HistoryWriter>,
}

/// Orders history saves made outside the state lock.
///
/// Snapshots are numbered while the write lock is held; a snapshot older than
/// the last one written is skipped.
#[derive(Debug, Default)]
struct HistoryWriter {
    staged: AtomicU64,
    written: Mutex<u64>,
}

/// History entries captured under the write lock, waiting to be saved.
#[derive(Debug)]
struct StagedHistory {
    revision: u64,
    entries: Vec<String>,
}

impl HistoryWriter {
    fn stage(&self, entries: Vec<String>) -> StagedHistory {
        let revision = self.staged.fetch_add(1, Ordering::SeqCst) + 1;
        StagedHistory { revision, entries }
    }
}

impl AppStore {
    /// Create a store with an empty feed and history.
    pub fn new(registry: Arc<Registry>, selection: Selection) -> Self {
        Self {
            state: Arc::new(RwLock::new(AppState {
                feed: Vec::new(),
                selection,
                prompt_history: PromptHistory::default(),
            })),
            registry,
            sink: None,
            settings: None,
            history_writer: Arc::new(HistoryWriter::default()),
        }
    }

    /// Attach an event sink.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Change the history capacity, trimming existing entries.
    pub fn with_history_capacity(self, capacity: usize) -> Self {
        {
            let mut state = self.state.write();
            let entries = state.prompt_history.entries().to_vec();
            state.prompt_history = PromptHistory::from_entries(entries, capacity);
        }
        self
    }

    /// Attach persistence and hydrate the prompt history from it.
    ///
    /// A failed load is logged and the store starts with an empty history.
    pub fn with_settings(mut self, settings: Arc<dyn SettingsStore>) -> Self {
        match settings.load() {
            Ok(Some(persisted)) => {
                let mut state = self.state.write();
                let capacity = state.prompt_history.capacity();
                state.prompt_history =
                    PromptHistory::from_entries(persisted.prompt_history, capacity);
                info!(
                    "hydrated prompt history (entries={})",
                    state.prompt_history.len()
                );
            }
            Ok(None) => debug!("no persisted settings found"),
            Err(err) => warn!("failed to load persisted settings: {err}"),
        }
        self.settings = Some(settings);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Clone of the whole state.
    pub fn snapshot(&self) -> AppState {
        self.state.read().clone()
    }

    /// Clone of the feed, newest first.
    pub fn feed(&self) -> Vec<Round> {
        self.state.read().feed.clone()
    }

    /// Clone of a single round.
    pub fn round(&self, round_id: RoundId) -> Option<Round> {
        self.state
            .read()
            .feed
            .iter()
            .find(|round| round.id == round_id)
            .cloned()
    }

    pub fn selection(&self) -> Selection {
        self.state.read().selection.clone()
    }

    /// Prompt history entries, newest first.
    pub fn prompt_history(&self) -> Vec<String> {
        self.state.read().prompt_history.entries().to_vec()
    }

    /// Record the prompt and publish a pending round for the current selection.
    ///
    /// Checking the selection, recording history, building the round and
    /// inserting it at the front of the feed happen under one write guard.
    /// Returns `None` without touching history or the feed when versus mode
    /// has no active model.
    pub fn open_round(&self, prompt: String, prompt_image: Option<String>) -> Option<Round> {
        let (round, staged) = {
            let mut state = self.state.write();
            let selection = &state.selection;
            if !selection.batch_mode && !selection.has_active_versus_model() {
                debug!("no active versus model; ignoring submission");
                return None;
            }
            let Some(mode) = self.registry.mode(&selection.output_mode) else {
                warn!(
                    "selected mode missing from registry (mode={})",
                    selection.output_mode
                );
                return None;
            };
            let round = build_round(selection, mode, prompt, prompt_image);
            let staged = self.record_locked(&mut state, &round.prompt);
            let (round_id, slots) = (round.id, round.outputs.len());
            state.feed.insert(0, round.clone());
            info!("published round (round_id={}, slots={})", round_id, slots);
            self.emit(FeedEventPayload::RoundAdded { round_id, slots });
            (round, staged)
        };
        if let Some(staged) = staged {
            self.persist(staged);
        }
        Some(round)
    }

    /// Insert a freshly built round at the front of the feed.
    pub fn publish_round(&self, round: Round) {
        let mut state = self.state.write();
        let round_id = round.id;
        let slots = round.outputs.len();
        state.feed.insert(0, round);
        info!("published round (round_id={}, slots={})", round_id, slots);
        self.emit(FeedEventPayload::RoundAdded { round_id, slots });
    }

    /// Apply a terminal result to one slot.
    ///
    /// Returns false without touching the feed when the round is gone, the
    /// slot at `index` is not `output_id`, or the slot already settled.
    pub fn settle_output(
        &self,
        round_id: RoundId,
        index: usize,
        output_id: OutputId,
        outcome: SlotOutcome,
        total_time_ms: u64,
    ) -> bool {
        let mut state = self.state.write();
        let Some(round) = state.feed.iter_mut().find(|round| round.id == round_id) else {
            debug!(
                "dropping completion for absent round (round_id={}, index={})",
                round_id, index
            );
            return false;
        };
        let Some(output) = round
            .outputs
            .get_mut(index)
            .filter(|output| output.id == output_id)
        else {
            warn!(
                "dropping completion for unknown slot (round_id={}, index={}, output_id={})",
                round_id, index, output_id
            );
            return false;
        };
        if !output.settle(outcome, total_time_ms) {
            debug!(
                "slot already settled (round_id={}, index={})",
                round_id, index
            );
            return false;
        }
        let status = output.status();
        debug!(
            "settled slot (round_id={}, index={}, status={:?}, total_time_ms={})",
            round_id, index, status, total_time_ms
        );
        self.emit(FeedEventPayload::OutputSettled {
            round_id,
            index,
            output_id,
            status,
        });
        true
    }

    /// Delete a round. In-flight slots keep running and their results are dropped.
    pub fn remove_round(&self, round_id: RoundId) -> bool {
        let mut state = self.state.write();
        let before = state.feed.len();
        state.feed.retain(|round| round.id != round_id);
        let removed = state.feed.len() != before;
        if removed {
            info!("removed round (round_id={})", round_id);
            self.emit(FeedEventPayload::RoundRemoved { round_id });
        } else {
            debug!("round not in feed (round_id={})", round_id);
        }
        removed
    }

    /// Clear the feed, returning the number of rounds dropped.
    pub fn reset(&self) -> usize {
        let mut state = self.state.write();
        let rounds = state.feed.len();
        state.feed.clear();
        info!("reset feed (rounds={})", rounds);
        self.emit(FeedEventPayload::FeedCleared { rounds });
        rounds
    }

    /// Move a prompt to the front of the history and persist it.
    ///
    /// Persistence failures are logged; the in-memory history still changes.
    pub fn record_prompt(&self, prompt: &str) {
        let staged = {
            let mut state = self.state.write();
            self.record_locked(&mut state, prompt)
        };
        if let Some(staged) = staged {
            self.persist(staged);
        }
    }

    /// Drop every prompt history entry and persist the empty list.
    pub fn clear_prompt_history(&self) {
        let staged = {
            let mut state = self.state.write();
            state.prompt_history.clear();
            info!("cleared prompt history");
            self.emit(FeedEventPayload::HistoryChanged { entries: 0 });
            self.history_writer.stage(Vec::new())
        };
        self.persist(staged);
    }

    pub fn set_output_mode(&self, mode: &str) -> Result<(), VibecheckCoreError> {
        let mut state = self.state.write();
        state.selection.set_output_mode(mode, &self.registry)?;
        self.emit_selection(&state.selection);
        Ok(())
    }

    pub fn set_batch_mode(&self, active: bool) {
        let mut state = self.state.write();
        state.selection.set_batch_mode(active, &self.registry);
        self.emit_selection(&state.selection);
    }

    pub fn set_batch_model(&self, model: &str) -> Result<(), VibecheckCoreError> {
        let mut state = self.state.write();
        state.selection.set_batch_model(model, &self.registry)?;
        self.emit_selection(&state.selection);
        Ok(())
    }

    pub fn set_batch_size(&self, size: usize) -> Result<(), VibecheckCoreError> {
        let mut state = self.state.write();
        state.selection.set_batch_size(size)?;
        self.emit_selection(&state.selection);
        Ok(())
    }

    /// Toggle one versus model.
    pub fn set_versus_model(&self, model: &str, active: bool) -> Result<(), VibecheckCoreError> {
        self.registry.require_model(model)?;
        let mut state = self.state.write();
        state.selection.set_versus_model(model, active);
        self.emit_selection(&state.selection);
        Ok(())
    }

    /// Replace the active versus set; unknown ids are ignored.
    pub fn set_versus_models<S: AsRef<str>>(&self, models: &[S]) {
        let mut state = self.state.write();
        state.selection.set_versus_models(models);
        self.emit_selection(&state.selection);
    }

    pub fn rate_output(&self, round_id: RoundId, index: usize, rating: i32) -> bool {
        self.annotate(round_id, index, |output| output.rating = rating)
    }

    pub fn set_favorite(&self, round_id: RoundId, index: usize, favorite: bool) -> bool {
        self.annotate(round_id, index, |output| output.is_favorite = favorite)
    }

    pub fn set_comment(&self, round_id: RoundId, index: usize, comment: impl Into<String>) -> bool {
        let comment = comment.into();
        self.annotate(round_id, index, move |output| output.comments = comment)
    }

    fn annotate(
        &self,
        round_id: RoundId,
        index: usize,
        apply: impl FnOnce(&mut Output),
    ) -> bool {
        let mut state = self.state.write();
        let Some(output) = state
            .feed
            .iter_mut()
            .find(|round| round.id == round_id)
            .and_then(|round| round.outputs.get_mut(index))
        else {
            debug!(
                "annotation target missing (round_id={}, index={})",
                round_id, index
            );
            return false;
        };
        apply(output);
        self.emit(FeedEventPayload::OutputAnnotated { round_id, index });
        true
    }

    fn record_locked(&self, state: &mut AppState, prompt: &str) -> Option<StagedHistory> {
        if !state.prompt_history.record(prompt) {
            return None;
        }
        self.emit(FeedEventPayload::HistoryChanged {
            entries: state.prompt_history.len(),
        });
        Some(
            self.history_writer
                .stage(state.prompt_history.entries().to_vec()),
        )
    }

    fn persist(&self, staged: StagedHistory) {
        let Some(settings) = &self.settings else {
            return;
        };
        let mut written = self.history_writer.written.lock();
        if staged.revision <= *written {
            debug!(
                "skipping stale history save (revision={}, written={})",
                staged.revision, *written
            );
            return;
        }
        *written = staged.revision;
        let prompt_history = staged.entries;
        if let Err(err) = settings.save(&PersistedState { prompt_history }) {
            warn!("failed to persist prompt history: {err}");
        }
    }

    fn emit_selection(&self, selection: &Selection) {
        self.emit(FeedEventPayload::SelectionChanged {
            output_mode: selection.output_mode.clone(),
            batch_mode: selection.batch_mode,
        });
    }

    fn emit(&self, payload: FeedEventPayload) {
        if let Some(sink) = &self.sink {
            sink.emit(FeedEvent::new(payload));
        }
    }
}
