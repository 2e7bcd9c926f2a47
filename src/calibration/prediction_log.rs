//! Prediction Log - bounded history of (predicted, actual) pairs
//!
//! - FIFO eviction once `capacity` is exceeded (oldest first)
//! - lazily hydrated from the store on first use
//! - write-through: every mutation flushes the whole array under
//!   [`PREDICTION_LOG_KEY`]; a failed flush is logged and the cache stays
//!   authoritative
//!
//! The cache mutex is held across store calls, so hydration and flushes for
//! the key never overlap.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::Mutex;

use super::Prediction;
use crate::clock::{Clock, SystemClock};
use crate::sanitize::clamp_probability;
use crate::store::KeyValueStore;

pub const PREDICTION_LOG_KEY: &str = "prediction_log";
pub const DEFAULT_CAPACITY: usize = 10_000;

pub struct PredictionLog {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    cache: Mutex<Option<VecDeque<Prediction>>>,
}

impl PredictionLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            capacity: capacity.max(1),
            cache: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // ========== Writes ==========

    /// Append with the current timestamp. Non-finite predictions are dropped.
    pub async fn log(&self, word: &str, predicted: f64, actual: bool) -> bool {
        let Some(predicted) = clamp_probability(predicted) else {
            tracing::warn!(word = %word, predicted, "dropping non-finite prediction");
            return false;
        };
        self.log_prediction(Prediction {
            predicted,
            actual: actual as u8,
            word: Some(word.to_string()),
            timestamp: Some(self.clock.now_ms()),
        })
        .await;
        true
    }

    pub async fn log_prediction(&self, prediction: Prediction) {
        let mut guard = self.cache.lock().await;
        let entries = self.hydrated(&mut guard).await;

        entries.push_back(prediction);
        while entries.len() > self.capacity {
            entries.pop_front();
        }

        self.flush(entries).await;
    }

    pub async fn clear(&self) {
        let mut guard = self.cache.lock().await;
        *guard = Some(VecDeque::new());
        if let Err(err) = self.store.remove(PREDICTION_LOG_KEY).await {
            tracing::warn!(error = %err, key = PREDICTION_LOG_KEY, "prediction log clear failed");
        }
    }

    // ========== Reads ==========

    /// Last `n` entries, newest first
    pub async fn recent(&self, n: usize) -> Vec<Prediction> {
        let mut guard = self.cache.lock().await;
        let entries = self.hydrated(&mut guard).await;
        entries.iter().rev().take(n).cloned().collect()
    }

    /// Entries with `start <= timestamp <= end`, oldest first
    pub async fn by_time_range(&self, start: i64, end: i64) -> Vec<Prediction> {
        let mut guard = self.cache.lock().await;
        let entries = self.hydrated(&mut guard).await;
        entries
            .iter()
            .filter(|p| p.timestamp.is_some_and(|ts| ts >= start && ts <= end))
            .cloned()
            .collect()
    }

    pub async fn by_item(&self, word: &str) -> Vec<Prediction> {
        let mut guard = self.cache.lock().await;
        let entries = self.hydrated(&mut guard).await;
        entries
            .iter()
            .filter(|p| p.word.as_deref() == Some(word))
            .cloned()
            .collect()
    }

    pub async fn all(&self) -> Vec<Prediction> {
        let mut guard = self.cache.lock().await;
        self.hydrated(&mut guard).await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        let mut guard = self.cache.lock().await;
        self.hydrated(&mut guard).await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // ========== Persistence ==========

    async fn hydrated<'a>(
        &self,
        slot: &'a mut Option<VecDeque<Prediction>>,
    ) -> &'a mut VecDeque<Prediction> {
        if slot.is_none() {
            let loaded = self.load().await;
            tracing::debug!(entries = loaded.len(), "prediction log hydrated");
            *slot = Some(loaded);
        }
        slot.get_or_insert_with(VecDeque::new)
    }

    async fn load(&self) -> VecDeque<Prediction> {
        match self.store.get(PREDICTION_LOG_KEY).await {
            Ok(Some(raw)) => parse_history(&raw, self.capacity),
            Ok(None) => VecDeque::new(),
            Err(err) => {
                tracing::warn!(error = %err, key = PREDICTION_LOG_KEY, "prediction log unavailable, starting empty");
                VecDeque::new()
            }
        }
    }

    async fn flush(&self, entries: &VecDeque<Prediction>) {
        let payload = match serde_json::to_string(entries) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(error = %err, "prediction log serialization failed");
                return;
            }
        };
        if let Err(err) = self.store.put(PREDICTION_LOG_KEY, payload).await {
            tracing::warn!(error = %err, key = PREDICTION_LOG_KEY, "prediction log write failed, keeping in-memory history");
        }
    }
}

/// Anything but a JSON array is "no history"; unreadable entries are skipped
fn parse_history(raw: &str, capacity: usize) -> VecDeque<Prediction> {
    let items = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(_) => {
            tracing::warn!(key = PREDICTION_LOG_KEY, "persisted prediction log is not an array, ignoring");
            return VecDeque::new();
        }
        Err(err) => {
            tracing::warn!(error = %err, key = PREDICTION_LOG_KEY, "persisted prediction log unreadable, ignoring");
            return VecDeque::new();
        }
    };

    let mut history: VecDeque<Prediction> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value::<Prediction>(item).ok())
        .filter_map(|mut p| {
            p.predicted = clamp_probability(p.predicted)?;
            p.actual = p.actual.min(1);
            Some(p)
        })
        .collect();

    while history.len() > capacity {
        history.pop_front();
    }
    history
}
