//! Round/output manager: fans a prompt out into slots and settles each slot once.

use crate::client::GenerationClient;
use crate::registry::ModeInfo;
use crate::selection::Selection;
use crate::store::AppStore;
use chrono::Utc;
use futures_util::future::join_all;
use log::{info, warn};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;
use vibecheck_rs_protocol::{
    GenerationRequest, ModelId, Output, OutputId, Round, RoundId, SlotOutcome,
};

/// Handle to the slot tasks of a submitted round.
///
/// Dropping the handle detaches the tasks; it never cancels them.
pub struct RoundHandle {
    round_id: RoundId,
    tasks: Vec<JoinHandle<()>>,
}

impl RoundHandle {
    pub fn round_id(&self) -> RoundId {
        self.round_id
    }

    /// Number of slots dispatched for the round.
    pub fn slots(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until every slot task has finished.
    pub async fn settled(self) {
        for result in join_all(self.tasks).await {
            if let Err(err) = result {
                warn!(
                    "slot task ended abnormally (round_id={}): {}",
                    self.round_id, err
                );
            }
        }
    }
}

/// Owns round creation and slot dispatch; all feed writes go through the store.
#[derive(Clone)]
pub struct RoundManager {
    store: AppStore,
    client: GenerationClient,
}

impl RoundManager {
    pub fn new(store: AppStore, client: GenerationClient) -> Self {
        Self { store, client }
    }

    pub fn store(&self) -> &AppStore {
        &self.store
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    /// Submit a prompt under the current selection.
    ///
    /// Returns `None` without touching history or the feed when versus mode
    /// has no active model. The round is in the feed, all slots pending,
    /// before any slot is dispatched. Must be called within a Tokio runtime.
    pub fn submit_round(
        &self,
        prompt: impl Into<String>,
        prompt_image: Option<String>,
    ) -> Option<RoundHandle> {
        let round = self.store.open_round(prompt.into(), prompt_image)?;
        let image_output = self.store.registry().mode_requires_image(&round.output_mode);
        let requests: Vec<(usize, OutputId, Option<GenerationRequest>)> = round
            .outputs
            .iter()
            .enumerate()
            .map(|(index, output)| {
                let request = self.request_for(&round, image_output, &output.model);
                (index, output.id, request)
            })
            .collect();
        let round_id = round.id;
        info!(
            "dispatching round (round_id={}, mode={}, slots={})",
            round_id,
            round.output_mode,
            requests.len()
        );

        let tasks = requests
            .into_iter()
            .map(|(index, output_id, request)| self.dispatch(round_id, index, output_id, request))
            .collect();
        Some(RoundHandle { round_id, tasks })
    }

    /// Delete a round; its in-flight slots finish and are discarded.
    pub fn remove_round(&self, round_id: RoundId) -> bool {
        self.store.remove_round(round_id)
    }

    /// Clear the feed; in-flight slots finish and are discarded.
    pub fn reset(&self) -> usize {
        self.store.reset()
    }

    fn request_for(
        &self,
        round: &Round,
        image_output: bool,
        model: &str,
    ) -> Option<GenerationRequest> {
        let Some(info) = self.store.registry().model(model) else {
            warn!("slot model missing from registry (model={})", model);
            return None;
        };
        Some(GenerationRequest {
            model: info.model_string.clone(),
            system_instruction: round.system_instruction.clone(),
            prompt: round.prompt.clone(),
            prompt_image: round.prompt_image.clone(),
            image_output,
            thinking: info.thinking,
            thinking_capable: info.thinking_capable,
        })
    }

    fn dispatch(
        &self,
        round_id: RoundId,
        index: usize,
        output_id: OutputId,
        request: Option<GenerationRequest>,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        let client = self.client.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match request {
                Some(request) => match client.generate(&request).await {
                    Ok(data) => SlotOutcome::Completed(data),
                    Err(err) => {
                        warn!(
                            "slot generation failed (round_id={}, index={}): {}",
                            round_id, index, err
                        );
                        SlotOutcome::Failed
                    }
                },
                None => SlotOutcome::Failed,
            };
            let total_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            store.settle_output(round_id, index, output_id, outcome, total_time_ms);
        })
    }
}

/// Build a round with every slot pending: `batch_size` copies of the batch
/// model, or one slot per active versus model in selection order.
pub(crate) fn build_round(
    selection: &Selection,
    mode: &ModeInfo,
    prompt: String,
    prompt_image: Option<String>,
) -> Round {
    let models: Vec<ModelId> = if selection.batch_mode {
        vec![selection.batch_model.clone(); selection.batch_size]
    } else {
        selection.active_versus_models()
    };
    Round {
        id: Uuid::new_v4(),
        prompt,
        prompt_image,
        output_mode: mode.id.clone(),
        system_instruction: mode.system_instruction.clone(),
        created_at: Utc::now(),
        outputs: models
            .into_iter()
            .map(|model| Output::pending(model, mode.id.clone(), selection.batch_mode))
            .collect(),
    }
}
