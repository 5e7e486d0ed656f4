//! Mode and model selection state machine.
//!
//! Every transition that can break mode/model compatibility funnels through
//! [`reconcile`], so the invariant lives in one place.

use crate::error::VibecheckCoreError;
use crate::registry::Registry;
use log::debug;
use serde::Serialize;
use vibecheck_rs_config::{MAX_BATCH_SIZE, SessionConfig};
use vibecheck_rs_protocol::{ModeId, ModelId};

/// One model toggle in versus mode.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VersusEntry {
    /// Model registry key.
    pub model: ModelId,
    /// Whether the model gets a slot in the next round.
    pub active: bool,
}

/// Current mode/model selection.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Selection {
    /// Active output mode.
    pub output_mode: ModeId,
    /// Batch (N outputs, one model) vs versus (one output per model).
    pub batch_mode: bool,
    /// Number of slots in batch mode.
    pub batch_size: usize,
    /// Model used for every batch slot.
    pub batch_model: ModelId,
    /// Versus toggles in registry order.
    pub versus_models: Vec<VersusEntry>,
}

impl Selection {
    /// Default selection: first mode, batch of 3 on the first model, every
    /// text model active for versus.
    pub fn initial(registry: &Registry) -> Self {
        let mut selection = Self {
            output_mode: registry.first_mode().id.clone(),
            batch_mode: true,
            batch_size: 3,
            batch_model: registry.first_model().id.clone(),
            versus_models: registry
                .models()
                .iter()
                .filter(|model| !model.image_output)
                .map(|model| VersusEntry {
                    model: model.id.clone(),
                    active: true,
                })
                .collect(),
        };
        reconcile(&mut selection, registry);
        selection
    }

    /// Build the initial selection from session config overrides.
    pub fn from_config(
        config: &SessionConfig,
        registry: &Registry,
    ) -> Result<Self, VibecheckCoreError> {
        let mut selection = Self::initial(registry);
        if let Some(mode) = &config.output_mode {
            selection.output_mode = registry.require_mode(mode)?.id.clone();
        }
        if let Some(model) = &config.batch_model {
            selection.batch_model = registry.require_model(model)?.id.clone();
        }
        selection.batch_mode = config.batch_mode;
        selection.set_batch_size(config.batch_size)?;
        reconcile(&mut selection, registry);
        Ok(selection)
    }

    /// Ids of versus models that are currently active, in order.
    pub fn active_versus_models(&self) -> Vec<ModelId> {
        self.versus_models
            .iter()
            .filter(|entry| entry.active)
            .map(|entry| entry.model.clone())
            .collect()
    }

    /// Whether at least one versus model is active.
    pub fn has_active_versus_model(&self) -> bool {
        self.versus_models.iter().any(|entry| entry.active)
    }

    /// Whether the given model is toggled on for versus mode.
    pub fn is_versus_active(&self, model: &str) -> bool {
        self.versus_models
            .iter()
            .any(|entry| entry.model == model && entry.active)
    }

    /// Switch output mode, forcing batch mode for image modes.
    pub fn set_output_mode(
        &mut self,
        mode: &str,
        registry: &Registry,
    ) -> Result<(), VibecheckCoreError> {
        self.output_mode = registry.require_mode(mode)?.id.clone();
        reconcile(self, registry);
        Ok(())
    }

    /// Toggle batch mode. Leaving batch mode from an image mode falls back to
    /// the first registry mode.
    pub fn set_batch_mode(&mut self, active: bool, registry: &Registry) {
        self.batch_mode = active;
        if !active && registry.mode_requires_image(&self.output_mode) {
            debug!(
                "leaving batch mode from image mode; resetting mode (from={}, to={})",
                self.output_mode,
                registry.first_mode().id
            );
            self.output_mode = registry.first_mode().id.clone();
        }
        reconcile(self, registry);
    }

    /// Replace the batch model.
    pub fn set_batch_model(
        &mut self,
        model: &str,
        registry: &Registry,
    ) -> Result<(), VibecheckCoreError> {
        self.batch_model = registry.require_model(model)?.id.clone();
        Ok(())
    }

    /// Replace the batch size; sizes outside `1..=MAX_BATCH_SIZE` are rejected.
    pub fn set_batch_size(&mut self, size: usize) -> Result<(), VibecheckCoreError> {
        if !(1..=MAX_BATCH_SIZE).contains(&size) {
            return Err(VibecheckCoreError::InvalidBatchSize {
                size,
                max: MAX_BATCH_SIZE,
            });
        }
        self.batch_size = size;
        Ok(())
    }

    /// Toggle a single versus model, adding it when not yet listed.
    pub fn set_versus_model(&mut self, model: &str, active: bool) {
        match self
            .versus_models
            .iter_mut()
            .find(|entry| entry.model == model)
        {
            Some(entry) => entry.active = active,
            None => self.versus_models.push(VersusEntry {
                model: model.to_string(),
                active,
            }),
        }
    }

    /// Replace the active versus set wholesale. Unlisted ids are ignored.
    pub fn set_versus_models<S: AsRef<str>>(&mut self, models: &[S]) {
        for entry in &mut self.versus_models {
            entry.active = models.iter().any(|model| model.as_ref() == entry.model);
        }
    }
}

/// Restore mode/model compatibility after a transition.
///
/// Image modes force batch mode. In batch mode an incompatible batch model is
/// replaced with the first compatible registry model. In versus mode
/// incompatible models are deselected, and if nothing remains active the
/// first compatible registry model is selected.
pub fn reconcile(selection: &mut Selection, registry: &Registry) {
    let image_mode = registry.mode_requires_image(&selection.output_mode);
    if image_mode && !selection.batch_mode {
        debug!(
            "image mode requires batch mode (mode={})",
            selection.output_mode
        );
        selection.batch_mode = true;
    }

    if selection.batch_mode {
        if !registry.is_compatible(&selection.batch_model, image_mode)
            && let Some(model) = registry.first_compatible_model(image_mode)
        {
            debug!(
                "substituting batch model (from={}, to={})",
                selection.batch_model, model.id
            );
            selection.batch_model = model.id.clone();
        }
        return;
    }

    for entry in &mut selection.versus_models {
        if entry.active && !registry.is_compatible(&entry.model, image_mode) {
            debug!("deselecting incompatible versus model (model={})", entry.model);
            entry.active = false;
        }
    }
    if !selection.has_active_versus_model()
        && let Some(model) = registry.first_compatible_model(image_mode)
    {
        let id = model.id.clone();
        debug!("selecting fallback versus model (model={})", id);
        selection.set_versus_model(&id, true);
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, VersusEntry, reconcile};
    use crate::registry::Registry;
    use pretty_assertions::assert_eq;
    use vibecheck_rs_config::{MAX_BATCH_SIZE, SessionConfig};

    #[test]
    fn initial_selection_matches_defaults() {
        let registry = Registry::default();
        let selection = Selection::initial(&registry);
        assert_eq!(selection.output_mode, "p5");
        assert!(selection.batch_mode);
        assert_eq!(selection.batch_size, 3);
        assert_eq!(selection.batch_model, "flash");
        assert_eq!(
            selection.active_versus_models(),
            vec!["flash".to_string(), "flash-thinking".to_string()]
        );
    }

    #[test]
    fn image_mode_in_versus_forces_batch_and_image_model() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        selection.set_batch_mode(false, &registry);
        assert!(!selection.batch_mode);

        selection.set_output_mode("image", &registry).expect("mode");
        assert!(selection.batch_mode);
        assert_eq!(selection.batch_model, "image-editor");
    }

    #[test]
    fn leaving_image_mode_substitutes_text_model() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        selection.set_output_mode("image", &registry).expect("image");
        assert_eq!(selection.batch_model, "image-editor");

        selection.set_output_mode("svg", &registry).expect("svg");
        assert!(selection.batch_mode);
        assert_eq!(selection.batch_model, "flash");
    }

    #[test]
    fn compatible_batch_model_is_kept() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        selection
            .set_batch_model("flash-thinking", &registry)
            .expect("model");
        selection.set_output_mode("html", &registry).expect("html");
        assert_eq!(selection.batch_model, "flash-thinking");
    }

    #[test]
    fn leaving_batch_mode_from_image_mode_resets_mode() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        selection.set_output_mode("image", &registry).expect("image");
        selection.set_batch_mode(false, &registry);
        assert_eq!(selection.output_mode, "p5");
        assert!(!selection.batch_mode);
        assert!(selection.has_active_versus_model());
    }

    #[test]
    fn versus_reconcile_deselects_incompatible_and_selects_fallback() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        selection.batch_mode = false;
        selection.versus_models = vec![
            VersusEntry {
                model: "flash".to_string(),
                active: false,
            },
            VersusEntry {
                model: "image-editor".to_string(),
                active: true,
            },
        ];
        reconcile(&mut selection, &registry);
        assert!(!selection.is_versus_active("image-editor"));
        assert_eq!(selection.active_versus_models(), vec!["flash".to_string()]);
    }

    #[test]
    fn set_versus_models_replaces_active_set() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        selection.set_versus_models(&["flash-thinking", "not-a-model"]);
        assert_eq!(
            selection.active_versus_models(),
            vec!["flash-thinking".to_string()]
        );
        selection.set_versus_models::<&str>(&[]);
        assert!(!selection.has_active_versus_model());
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        assert!(selection.set_output_mode("midi", &registry).is_err());
        assert!(selection.set_batch_model("gpt", &registry).is_err());
        assert_eq!(selection.output_mode, "p5");
        assert_eq!(selection.batch_model, "flash");
    }

    #[test]
    fn from_config_applies_overrides_then_reconciles() {
        let registry = Registry::default();
        let config = SessionConfig {
            output_mode: Some("image".to_string()),
            batch_mode: false,
            batch_size: 5,
            batch_model: Some("flash".to_string()),
        };
        let selection = Selection::from_config(&config, &registry).expect("selection");
        assert!(selection.batch_mode);
        assert_eq!(selection.batch_size, 5);
        assert_eq!(selection.batch_model, "image-editor");
    }

    #[test]
    fn batch_size_is_bounded() {
        let registry = Registry::default();
        let mut selection = Selection::initial(&registry);
        assert!(selection.set_batch_size(0).is_err());
        assert!(selection.set_batch_size(MAX_BATCH_SIZE + 1).is_err());
        assert_eq!(selection.batch_size, 3);
        selection.set_batch_size(MAX_BATCH_SIZE).expect("size");
        assert_eq!(selection.batch_size, MAX_BATCH_SIZE);
    }

    #[test]
    fn from_config_rejects_out_of_range_batch_size() {
        let registry = Registry::default();
        let config = SessionConfig {
            batch_size: 0,
            ..SessionConfig::default()
        };
        assert!(Selection::from_config(&config, &registry).is_err());
    }
}
