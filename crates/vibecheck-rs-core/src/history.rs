//! Most-recent-first prompt history.

use serde::{Deserialize, Serialize};

/// Default number of prompts kept.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Deduplicated prompt list, newest first, bounded by `capacity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptHistory {
    entries: Vec<String>,
    #[serde(skip, default = "default_capacity")]
    capacity: usize,
}

fn default_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl Default for PromptHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }
}

impl PromptHistory {
    /// Create an empty history with the given capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
        }
    }

    /// Rebuild a history from persisted entries, re-applying dedupe and cap.
    pub fn from_entries(entries: Vec<String>, capacity: usize) -> Self {
        let mut history = Self::with_capacity(capacity);
        for entry in entries.into_iter().rev() {
            history.record(&entry);
        }
        history
    }

    /// Move `prompt` to the front. Empty prompts are ignored.
    ///
    /// Returns true when the history changed.
    pub fn record(&mut self, prompt: &str) -> bool {
        if prompt.is_empty() {
            return false;
        }
        if self.entries.first().is_some_and(|first| first == prompt) {
            return false;
        }
        self.entries.retain(|entry| entry != prompt);
        self.entries.insert(0, prompt.to_string());
        self.entries.truncate(self.capacity);
        true
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries, newest first.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::PromptHistory;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_moves_existing_prompt_to_front() {
        let mut history = PromptHistory::default();
        history.record("a");
        history.record("b");
        history.record("a");
        assert_eq!(history.entries(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn record_caps_entries() {
        let mut history = PromptHistory::default();
        for idx in 0..60 {
            history.record(&format!("prompt {idx}"));
        }
        assert_eq!(history.len(), 50);
        assert_eq!(history.entries()[0], "prompt 59");
        assert_eq!(history.entries()[49], "prompt 10");
    }

    #[test]
    fn empty_prompt_is_ignored() {
        let mut history = PromptHistory::default();
        assert!(!history.record(""));
        assert!(history.is_empty());
    }

    #[test]
    fn repeated_front_prompt_reports_no_change() {
        let mut history = PromptHistory::default();
        assert!(history.record("same"));
        assert!(!history.record("same"));
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn from_entries_preserves_order_and_dedupes() {
        let entries = vec![
            "newest".to_string(),
            "middle".to_string(),
            "newest".to_string(),
            "oldest".to_string(),
        ];
        let history = PromptHistory::from_entries(entries, 2);
        assert_eq!(
            history.entries(),
            ["newest".to_string(), "middle".to_string()]
        );
    }
}
