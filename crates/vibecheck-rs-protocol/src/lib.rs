//! Shared data model for Vibecheck rounds, feed events, and the generation boundary.

mod generation;

pub use generation::{
    GenerationBackend, GenerationError, GenerationRequest, RawResponse, SecretSource,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a round.
pub type RoundId = Uuid;
/// Unique identifier for an output slot.
pub type OutputId = Uuid;
/// Registry key for a generation model (e.g. `flash`).
pub type ModelId = String;
/// Registry key for an output mode (e.g. `p5`).
pub type ModeId = String;

/// One user submission and its fixed set of output slots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Round {
    /// Round identifier.
    pub id: RoundId,
    /// Prompt text as submitted.
    pub prompt: String,
    /// Optional input image as a data URI.
    pub prompt_image: Option<String>,
    /// Mode active when the round was created.
    pub output_mode: ModeId,
    /// System instruction snapshot taken from the mode at creation time.
    pub system_instruction: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Output slots; the length never changes after creation.
    pub outputs: Vec<Output>,
}

impl Round {
    /// Count the slots that are still waiting for a result.
    pub fn pending_count(&self) -> usize {
        self.outputs.iter().filter(|output| output.is_busy).count()
    }

    /// Whether every slot has reached a terminal state.
    pub fn is_settled(&self) -> bool {
        self.pending_count() == 0
    }
}

/// One generation attempt inside a round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Output {
    /// Output identifier.
    pub id: OutputId,
    /// Model registry key used for this slot.
    pub model: ModelId,
    /// Whether the slot was created in batch mode.
    pub is_batch: bool,
    /// Mode the slot was generated for.
    pub output_mode: ModeId,
    /// True until the slot settles.
    pub is_busy: bool,
    /// True when the slot settled with an error.
    pub got_error: bool,
    /// Dispatch timestamp.
    pub started_at: DateTime<Utc>,
    /// Settlement timestamp.
    pub completed_at: Option<DateTime<Utc>>,
    /// Elapsed wall time between dispatch and settlement.
    pub total_time_ms: Option<u64>,
    /// Generated text or image data URI.
    pub output_data: Option<String>,
    /// User rating.
    pub rating: i32,
    /// User favorite flag.
    pub is_favorite: bool,
    /// Free-text user comment.
    pub comments: String,
}

/// Terminal result applied to a pending slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// Generation finished; `None` means it was cancelled and there is nothing to show.
    Completed(Option<String>),
    /// Generation failed after all attempts.
    Failed,
}

/// Coarse lifecycle state of an output slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputStatus {
    Pending,
    Succeeded,
    Empty,
    Failed,
}

impl Output {
    /// Create a pending slot for the given model and mode.
    pub fn pending(
        model: impl Into<ModelId>,
        output_mode: impl Into<ModeId>,
        is_batch: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            model: model.into(),
            is_batch,
            output_mode: output_mode.into(),
            is_busy: true,
            got_error: false,
            started_at: Utc::now(),
            completed_at: None,
            total_time_ms: None,
            output_data: None,
            rating: 0,
            is_favorite: false,
            comments: String::new(),
        }
    }

    /// Report the slot lifecycle state.
    pub fn status(&self) -> OutputStatus {
        if self.is_busy {
            OutputStatus::Pending
        } else if self.got_error {
            OutputStatus::Failed
        } else if self.output_data.is_some() {
            OutputStatus::Succeeded
        } else {
            OutputStatus::Empty
        }
    }

    /// Move a pending slot into its terminal state.
    ///
    /// Returns `false` and leaves the slot untouched when it has already settled.
    pub fn settle(&mut self, outcome: SlotOutcome, total_time_ms: u64) -> bool {
        if !self.is_busy {
            return false;
        }
        self.is_busy = false;
        self.completed_at = Some(Utc::now());
        self.total_time_ms = Some(total_time_ms);
        match outcome {
            SlotOutcome::Completed(data) => {
                self.got_error = false;
                self.output_data = data;
            }
            SlotOutcome::Failed => {
                self.got_error = true;
                self.output_data = None;
            }
        }
        true
    }
}

/// Wrapper for events emitted by the application store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedEvent {
    /// Unique id for the event.
    pub id: Uuid,
    /// Timestamp when the event was created.
    pub created_at: DateTime<Utc>,
    /// Event payload content.
    pub payload: FeedEventPayload,
}

impl FeedEvent {
    /// Stamp a payload with a fresh id and the current time.
    pub fn new(payload: FeedEventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            payload,
        }
    }
}

/// All state changes observable by a UI.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum FeedEventPayload {
    /// A round was published at the front of the feed.
    RoundAdded { round_id: RoundId, slots: usize },
    /// A slot reached its terminal state.
    OutputSettled {
        round_id: RoundId,
        index: usize,
        output_id: OutputId,
        status: OutputStatus,
    },
    /// Rating, favorite or comment changed on a slot.
    OutputAnnotated { round_id: RoundId, index: usize },
    /// A round was removed from the feed.
    RoundRemoved { round_id: RoundId },
    /// The whole feed was cleared.
    FeedCleared { rounds: usize },
    /// Mode or model selection changed.
    SelectionChanged { output_mode: ModeId, batch_mode: bool },
    /// Prompt history changed.
    HistoryChanged { entries: usize },
}

/// Sink interface for store events.
pub trait EventSink: Send + Sync {
    /// Emit an event to downstream listeners.
    fn emit(&self, event: FeedEvent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pending_output_settles_once() {
        let mut output = Output::pending("flash", "p5", true);
        assert_eq!(output.status(), OutputStatus::Pending);

        assert!(output.settle(SlotOutcome::Completed(Some("code".to_string())), 12));
        assert_eq!(output.status(), OutputStatus::Succeeded);
        assert_eq!(output.total_time_ms, Some(12));

        assert!(!output.settle(SlotOutcome::Failed, 40));
        assert_eq!(output.status(), OutputStatus::Succeeded);
        assert_eq!(output.output_data.as_deref(), Some("code"));
        assert_eq!(output.total_time_ms, Some(12));
    }

    #[test]
    fn cancelled_output_is_empty_not_failed() {
        let mut output = Output::pending("flash", "svg", false);
        output.settle(SlotOutcome::Completed(None), 3);
        assert_eq!(output.status(), OutputStatus::Empty);
        assert!(!output.got_error);
        assert!(!output.is_busy);
    }

    #[test]
    fn round_reports_pending_slots() {
        let mut round = Round {
            id: Uuid::new_v4(),
            prompt: "a cat".to_string(),
            prompt_image: None,
            output_mode: "p5".to_string(),
            system_instruction: String::new(),
            created_at: Utc::now(),
            outputs: vec![
                Output::pending("flash", "p5", true),
                Output::pending("flash", "p5", true),
            ],
        };
        assert_eq!(round.pending_count(), 2);
        round.outputs[1].settle(SlotOutcome::Failed, 1);
        assert_eq!(round.pending_count(), 1);
        assert!(!round.is_settled());
    }

    #[test]
    fn event_payload_uses_tagged_json() {
        let round_id = Uuid::new_v4();
        let event = FeedEvent::new(FeedEventPayload::RoundRemoved { round_id });
        let encoded = serde_json::to_value(&event).expect("serialize");
        assert_eq!(encoded["payload"]["type"], "round_removed");
        let decoded: FeedEvent = serde_json::from_value(encoded).expect("deserialize");
        assert_eq!(decoded.payload, FeedEventPayload::RoundRemoved { round_id });
    }
}
