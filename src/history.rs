//! Phrase history: most-recent-first, unique by text, capped at
//! [`MAX_ENTRIES`].

use crate::error::HistoryError;
use crate::storage::{KeyValueStore, HISTORY_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const MAX_ENTRIES: usize = 50;

/// Default file name for exported history.
pub const EXPORT_FILE_NAME: &str = "pronounce-history.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub ts: i64,
}

/// In-memory history value. Every mutation keeps the ordering, uniqueness
/// and capacity invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts `text` at the front. Returns false (and changes nothing) for
    /// blank text.
    pub fn append(&mut self, text: &str, ts: i64) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        self.entries.retain(|e| e.text != text);
        self.entries.insert(
            0,
            HistoryEntry {
                text: text.to_string(),
                ts,
            },
        );
        self.entries.truncate(MAX_ENTRIES);
        true
    }

    /// Removes the entry at `index`; out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) -> Option<HistoryEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Validates a JSON value as a list of entries. Duplicates after the
    /// first occurrence and anything past the cap are dropped.
    pub fn from_json(value: &Value) -> Result<Self, HistoryError> {
        let items = value.as_array().ok_or(HistoryError::NotAList)?;

        let mut entries: Vec<HistoryEntry> = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let entry: HistoryEntry =
                serde_json::from_value(item.clone()).map_err(|e| HistoryError::InvalidEntry {
                    index,
                    reason: e.to_string(),
                })?;
            if entry.text.trim().is_empty() {
                return Err(HistoryError::InvalidEntry {
                    index,
                    reason: "text is empty".to_string(),
                });
            }
            if !entries.iter().any(|e| e.text == entry.text) {
                entries.push(entry);
            }
        }
        entries.truncate(MAX_ENTRIES);
        Ok(Self { entries })
    }

    pub fn to_json(&self) -> String {
        // Vec<HistoryEntry> of plain strings and integers always encodes
        serde_json::to_string(&self.entries).unwrap_or_else(|_| "[]".to_string())
    }
}

/// History persisted under [`HISTORY_KEY`]. Every operation reads the
/// current stored value and writes back immediately.
#[derive(Clone)]
pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Reads the stored history. Missing or corrupt data reads as empty.
    pub fn load(&self) -> History {
        let raw = match self.store.get(HISTORY_KEY) {
            Some(raw) => raw,
            None => return History::new(),
        };
        let parsed = serde_json::from_str::<Value>(&raw)
            .map_err(HistoryError::from)
            .and_then(|value| History::from_json(&value));
        match parsed {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to parse history, resetting to empty: {}", e);
                History::new()
            }
        }
    }

    pub fn save(&self, history: &History) -> Result<(), HistoryError> {
        self.store.set(HISTORY_KEY, &history.to_json())?;
        Ok(())
    }

    pub fn list(&self) -> Vec<HistoryEntry> {
        self.load().entries
    }

    pub fn append(&self, text: &str) -> Result<(), HistoryError> {
        let mut history = self.load();
        if history.append(text, chrono::Utc::now().timestamp_millis()) {
            debug!("History: saved '{}' ({} entries)", text, history.len());
            self.save(&history)?;
        }
        Ok(())
    }

    pub fn remove(&self, index: usize) -> Result<(), HistoryError> {
        let mut history = self.load();
        if let Some(removed) = history.remove(index) {
            debug!("History: removed '{}'", removed.text);
            self.save(&history)?;
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), HistoryError> {
        self.save(&History::new())
    }

    /// Replaces the stored history wholesale. On invalid input nothing is
    /// written. Returns the number of entries stored.
    pub fn replace(&self, value: &Value) -> Result<usize, HistoryError> {
        let history = History::from_json(value)?;
        self.save(&history)?;
        Ok(history.len())
    }
}
