//! Per-item progress records and the derived question view
//!
//! One [`WordProgress`] record per item, stored under `progress:<word>`.
//! Each learning mode keeps an independent [`ModeProgress`] inside it, so
//! the mode never leaks into the storage key.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::learning_utils::{
    accuracy_percent, calculate_optimal_interval, days_between, forgetting_risk,
};
use crate::retention::RetentionStatus;
use crate::store::{KeyValueStore, StoreError};
use crate::types::{LearningMode, QuestionCategory};

const PROGRESS_KEY_PREFIX: &str = "progress:";
const DEFAULT_EASINESS: f64 = 2.5;

pub fn progress_key(word: &str) -> String {
    format!("{PROGRESS_KEY_PREFIX}{word}")
}

// ==================== Persisted Records ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModeProgress {
    pub correct_count: u32,
    pub incorrect_count: u32,
    /// Consecutive correct answers
    pub streak: u32,
    pub last_correct: Option<bool>,
    pub last_studied: Option<i64>,
    /// Days, from the streak-based interval model; unset while the streak is 0
    pub expected_interval: Option<f64>,
    pub retention: Option<RetentionStatus>,
}

impl ModeProgress {
    pub fn total_attempts(&self) -> u32 {
        self.correct_count + self.incorrect_count
    }

    pub fn accuracy(&self) -> f64 {
        accuracy_percent(self.correct_count, self.total_attempts())
    }

    pub fn record_answer(&mut self, is_correct: bool, now: i64) {
        if is_correct {
            self.correct_count += 1;
            self.streak += 1;
        } else {
            self.incorrect_count += 1;
            self.streak = 0;
        }
        self.last_correct = Some(is_correct);
        self.last_studied = Some(now);

        let interval = calculate_optimal_interval(self.streak, DEFAULT_EASINESS);
        self.expected_interval = (interval > 0).then_some(interval as f64);
    }

    pub fn category(&self, mastery_streak: u32) -> QuestionCategory {
        if self.total_attempts() == 0 {
            QuestionCategory::New
        } else if self.last_correct == Some(false) {
            QuestionCategory::Incorrect
        } else if self.streak >= mastery_streak {
            QuestionCategory::Mastered
        } else {
            QuestionCategory::StillLearning
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordProgress {
    pub word: String,
    #[serde(default)]
    pub modes: BTreeMap<LearningMode, ModeProgress>,
}

impl WordProgress {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            modes: BTreeMap::new(),
        }
    }

    pub fn mode(&self, mode: LearningMode) -> Option<&ModeProgress> {
        self.modes.get(&mode)
    }

    pub fn mode_mut(&mut self, mode: LearningMode) -> &mut ModeProgress {
        self.modes.entry(mode).or_default()
    }
}

// ==================== Derived View ====================

/// Read-only view recomputed on every query, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStatus {
    pub word: String,
    pub mode: LearningMode,
    pub category: QuestionCategory,
    /// Lower is more urgent; filled in by the active strategy
    pub priority: f64,
    /// 0-100
    pub accuracy: f64,
    pub streak: u32,
    pub total_attempts: u32,
    pub last_studied: Option<i64>,
    pub days_since_study: f64,
    pub forgetting_risk: f64,
}

impl QuestionStatus {
    pub fn derive(
        word: &str,
        mode: LearningMode,
        progress: Option<&ModeProgress>,
        now: i64,
        mastery_streak: u32,
    ) -> Self {
        let Some(progress) = progress.filter(|p| p.total_attempts() > 0) else {
            return Self::new_item(word, mode);
        };

        let accuracy = progress.accuracy();
        let days_since_study = progress
            .last_studied
            .map(|ts| days_between(ts, now))
            .unwrap_or(0.0);

        Self {
            word: word.to_string(),
            mode,
            category: progress.category(mastery_streak),
            priority: 0.0,
            accuracy,
            streak: progress.streak,
            total_attempts: progress.total_attempts(),
            last_studied: progress.last_studied,
            days_since_study,
            forgetting_risk: forgetting_risk(days_since_study, progress.expected_interval, accuracy),
        }
    }

    pub fn new_item(word: &str, mode: LearningMode) -> Self {
        Self {
            word: word.to_string(),
            mode,
            category: QuestionCategory::New,
            priority: 0.0,
            accuracy: 0.0,
            streak: 0,
            total_attempts: 0,
            last_studied: None,
            days_since_study: 0.0,
            forgetting_risk: 0.0,
        }
    }
}

// ==================== Repository ====================

/// Write-through cache over the progress store.
///
/// The cache is authoritative for the session: a failed write is logged
/// and the in-memory record keeps serving reads.
///
/// A failed read leaves the key unverified. Unverified keys are re-read on
/// every `load` and never written, so a record built without seeing the
/// stored one cannot replace it. Once a read succeeds the stored modes take
/// precedence and modes only touched in memory are kept.
pub struct ProgressRepository {
    store: Arc<dyn KeyValueStore>,
    cache: HashMap<String, WordProgress>,
    unverified: HashSet<String>,
}

impl ProgressRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            cache: HashMap::new(),
            unverified: HashSet::new(),
        }
    }

    /// Cached or stored record; `None` for unknown or malformed records.
    /// While the store cannot be read, falls back to the in-memory record.
    pub async fn load(&mut self, word: &str) -> Option<WordProgress> {
        if !self.unverified.contains(word) {
            if let Some(cached) = self.cache.get(word) {
                return Some(cached.clone());
            }
        }

        let key = progress_key(word);
        let stored = match self.fetch(&key).await {
            Ok(record) => record,
            Err(StoreError::Corrupted { reason, .. }) => {
                tracing::warn!(key = %key, reason = %reason, "malformed progress record, treating as new");
                None
            }
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "progress record unavailable, writes deferred");
                self.unverified.insert(word.to_string());
                return self.cache.get(word).cloned();
            }
        };

        let pending = if self.unverified.remove(word) {
            self.cache.remove(word)
        } else {
            None
        };

        let record = match (stored, pending) {
            (Some(mut stored), Some(pending)) => {
                for (mode, progress) in pending.modes {
                    stored.modes.entry(mode).or_insert(progress);
                }
                tracing::info!(key = %key, "progress record readable again, stored modes kept");
                Some(stored)
            }
            (stored, pending) => stored.or(pending),
        };

        if let Some(record) = &record {
            tracing::debug!(key = %key, "progress record hydrated");
            self.cache.insert(word.to_string(), record.clone());
        }
        record
    }

    async fn fetch(&self, key: &str) -> Result<Option<WordProgress>, StoreError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str::<WordProgress>(&raw)
            .map(Some)
            .map_err(|e| StoreError::Corrupted {
                key: key.to_string(),
                reason: e.to_string(),
            })
    }

    /// False once a read of `word` failed and no read has succeeded since
    pub fn is_verified(&self, word: &str) -> bool {
        !self.unverified.contains(word)
    }

    /// Update the cache, then persist. Returns `false` when nothing was written.
    pub async fn save(&mut self, progress: WordProgress) -> bool {
        let key = progress_key(&progress.word);
        if self.unverified.contains(&progress.word) {
            tracing::warn!(key = %key, "stored progress not yet readable, keeping update in memory");
            self.cache.insert(progress.word.clone(), progress);
            return false;
        }

        let payload = serde_json::to_string(&progress);
        self.cache.insert(progress.word.clone(), progress);

        let result = match payload {
            Ok(payload) => self.store.put(&key, payload).await,
            Err(err) => Err(StoreError::from(err)),
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, key = %key, "progress write failed, keeping in-memory state");
                false
            }
        }
    }

    pub fn cached(&self, word: &str) -> Option<&WordProgress> {
        self.cache.get(word)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.unverified.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::store::{MemoryStore, StoreResult};
    use crate::types::DAY_MS;

    /// Memory store whose next `failures` reads fail
    struct FlakyStore {
        inner: MemoryStore,
        failures: AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("read timed out".into()));
            }
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, value: String) -> StoreResult<()> {
            self.inner.put(key, value).await
        }

        async fn remove(&self, key: &str) -> StoreResult<()> {
            self.inner.remove(key).await
        }

        async fn clear(&self) -> StoreResult<()> {
            self.inner.clear().await
        }
    }

    #[test]
    fn test_category_rules() {
        let mut p = ModeProgress::default();
        assert_eq!(p.category(3), QuestionCategory::New);

        p.record_answer(false, 0);
        assert_eq!(p.category(3), QuestionCategory::Incorrect);

        p.record_answer(true, 1);
        assert_eq!(p.category(3), QuestionCategory::StillLearning);

        p.record_answer(true, 2);
        p.record_answer(true, 3);
        assert_eq!(p.category(3), QuestionCategory::Mastered);
        assert_eq!(p.expected_interval, Some(7.0));
    }

    #[test]
    fn test_wrong_answer_clears_expected_interval() {
        let mut p = ModeProgress::default();
        p.record_answer(true, 0);
        assert_eq!(p.expected_interval, Some(1.0));
        p.record_answer(false, 1);
        assert_eq!(p.expected_interval, None);
        assert_eq!(p.streak, 0);
    }

    #[test]
    fn test_derive_question_status() {
        let mut p = ModeProgress::default();
        p.record_answer(true, 0);
        p.record_answer(false, DAY_MS);

        let q = QuestionStatus::derive("fox", LearningMode::Memorization, Some(&p), 3 * DAY_MS, 3);
        assert_eq!(q.category, QuestionCategory::Incorrect);
        assert_eq!(q.accuracy, 50.0);
        assert_eq!(q.days_since_study, 2.0);
        // 2 days / 1 day * 100 + 0.5 * 50
        assert_eq!(q.forgetting_risk, 225.0);
        assert_eq!(q.last_studied, Some(DAY_MS));
    }

    #[test]
    fn test_modes_are_independent() {
        let mut record = WordProgress::new("fox");
        record.mode_mut(LearningMode::Spelling).record_answer(false, 0);

        let spelling = QuestionStatus::derive("fox", LearningMode::Spelling, record.mode(LearningMode::Spelling), 0, 3);
        let grammar = QuestionStatus::derive("fox", LearningMode::Grammar, record.mode(LearningMode::Grammar), 0, 3);
        assert_eq!(spelling.category, QuestionCategory::Incorrect);
        assert_eq!(grammar.category, QuestionCategory::New);
    }

    #[tokio::test]
    async fn test_repository_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let mut repo = ProgressRepository::new(store.clone());

        let mut record = WordProgress::new("fox");
        record.mode_mut(LearningMode::Memorization).record_answer(true, 10);
        assert!(repo.save(record.clone()).await);
        assert!(store.raw("progress:fox").is_some());

        let mut fresh = ProgressRepository::new(store);
        assert_eq!(fresh.load("fox").await, Some(record));
    }

    #[tokio::test]
    async fn test_malformed_record_is_absent() {
        let store = Arc::new(MemoryStore::new());
        store.put("progress:fox", "{not json".into()).await.unwrap();

        let mut repo = ProgressRepository::new(store);
        assert!(repo.load("fox").await.is_none());
        assert!(repo.load("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_failed_read_never_overwrites_stored_record() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(0),
        });
        let mut stored = WordProgress::new("fox");
        for ts in 0..5 {
            stored.mode_mut(LearningMode::Grammar).record_answer(true, ts);
        }
        store
            .put("progress:fox", serde_json::to_string(&stored).unwrap())
            .await
            .unwrap();

        let mut repo = ProgressRepository::new(store.clone());
        store.failures.store(1, Ordering::SeqCst);
        assert!(repo.load("fox").await.is_none());
        assert!(!repo.is_verified("fox"));

        let mut local = WordProgress::new("fox");
        local.mode_mut(LearningMode::Memorization).record_answer(false, 10);
        assert!(!repo.save(local).await);
        let raw = store.inner.raw("progress:fox").unwrap();
        assert_eq!(serde_json::from_str::<WordProgress>(&raw).unwrap(), stored);

        // next read succeeds: stored grammar kept, memory-only mode merged in
        let merged = repo.load("fox").await.unwrap();
        assert!(repo.is_verified("fox"));
        assert_eq!(merged.mode(LearningMode::Grammar).unwrap().correct_count, 5);
        assert_eq!(merged.mode(LearningMode::Memorization).unwrap().incorrect_count, 1);

        assert!(repo.save(merged.clone()).await);
        let raw = store.inner.raw("progress:fox").unwrap();
        assert_eq!(serde_json::from_str::<WordProgress>(&raw).unwrap(), merged);
    }

    #[tokio::test]
    async fn test_stored_mode_wins_over_memory_only_copy() {
        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(0),
        });
        let mut stored = WordProgress::new("fox");
        stored.mode_mut(LearningMode::Memorization).record_answer(true, 0);
        stored.mode_mut(LearningMode::Memorization).record_answer(true, 1);
        store
            .put("progress:fox", serde_json::to_string(&stored).unwrap())
            .await
            .unwrap();

        let mut repo = ProgressRepository::new(store.clone());
        store.failures.store(1, Ordering::SeqCst);
        assert!(repo.load("fox").await.is_none());

        let mut local = WordProgress::new("fox");
        local.mode_mut(LearningMode::Memorization).record_answer(false, 5);
        repo.save(local).await;

        let merged = repo.load("fox").await.unwrap();
        assert_eq!(merged, stored);
    }
}
