//! Scheduler - the public scheduling surface for one learning mode
//!
//! Composes the retention model, the mode's priority strategy, the progress
//! repository and (optionally) the prediction log. Everything is owned by a
//! single session; the only awaits are at the store boundary.
//!
//! Retention statuses are persisted inside each item's mode progress, so any
//! query touching an item hydrates it from the store first.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::calibration::{CalibrationMonitor, PredictionLog};
use crate::clock::{Clock, SystemClock};
use crate::config::SchedulerConfig;
use crate::progress::{ProgressRepository, QuestionStatus, WordProgress};
use crate::retention::{
    ConsolidationReport, RetentionModel, RetentionStatus, DEFAULT_HORIZONS,
    DEFAULT_HORIZON_WEIGHTS,
};
use crate::store::KeyValueStore;
use crate::strategy::{strategy_for, PriorityContext, PriorityStrategy};
use crate::types::{LearningLimits, LearningMode, QuestionCategory, ReviewResult, SessionStats};

pub const DEFAULT_SCHEDULE_DAYS: u32 = 7;

pub struct Scheduler {
    mode: LearningMode,
    config: SchedulerConfig,
    strategy: Box<dyn PriorityStrategy>,
    retention: RetentionModel,
    repository: ProgressRepository,
    rng: ChaCha8Rng,
    clock: Arc<dyn Clock>,
    session: SessionStats,
    /// Category each item held after its last answer this session
    seen: HashMap<String, QuestionCategory>,
    review_focus: bool,
    limit_crossed: bool,
    prediction_log: Option<Arc<PredictionLog>>,
}

impl Scheduler {
    pub fn new(mode: LearningMode, store: Arc<dyn KeyValueStore>, config: SchedulerConfig) -> Self {
        let config = config.validate();
        let seed = config.rng_seed.unwrap_or_else(rand::random);

        tracing::debug!(mode = %mode.as_str(), seed, "scheduler created");

        Self {
            mode,
            strategy: strategy_for(mode),
            retention: RetentionModel::new(config.retention.clone()),
            repository: ProgressRepository::new(store),
            rng: ChaCha8Rng::seed_from_u64(seed),
            clock: Arc::new(SystemClock),
            session: SessionStats::default(),
            seen: HashMap::new(),
            review_focus: false,
            limit_crossed: false,
            prediction_log: None,
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reseed the tie-break RNG
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn with_prediction_log(mut self, log: Arc<PredictionLog>) -> Self {
        self.prediction_log = Some(log);
        self
    }

    pub fn mode(&self) -> LearningMode {
        self.mode
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn retention(&self) -> &RetentionModel {
        &self.retention
    }

    pub fn prediction_log(&self) -> Option<&Arc<PredictionLog>> {
        self.prediction_log.as_ref()
    }

    /// Auditor over the attached prediction log, using the configured bin count
    pub fn calibration_monitor(&self) -> Option<CalibrationMonitor> {
        self.prediction_log
            .as_ref()
            .map(|log| CalibrationMonitor::with_bins(log.clone(), self.config.calibration_bins))
    }

    // ==================== Hydration ====================

    /// Load the item and adopt its persisted retention status. A status built
    /// while the store was unreadable is replaced once the read succeeds.
    async fn hydrate(&mut self, word: &str) -> Option<WordProgress> {
        let was_verified = self.repository.is_verified(word);
        let record = self.repository.load(word).await;
        let recovered = !was_verified && self.repository.is_verified(word);

        if self.retention.peek(word).is_none() || recovered {
            let persisted = record
                .as_ref()
                .and_then(|r| r.mode(self.mode))
                .and_then(|p| p.retention.clone());
            if let Some(status) = persisted {
                self.retention.restore(word, status);
            }
        }
        record
    }

    async fn hydrate_all<S: AsRef<str>>(&mut self, words: &[S]) {
        for word in words {
            self.hydrate(word.as_ref()).await;
        }
    }

    /// Current derived view of each candidate, in input order
    pub async fn question_statuses<S: AsRef<str>>(&mut self, words: &[S]) -> Vec<QuestionStatus> {
        let now = self.clock.now_ms();
        let mut statuses = Vec::with_capacity(words.len());

        for word in words {
            let word = word.as_ref();
            let record = self.hydrate(word).await;
            let progress = record.as_ref().and_then(|r| r.mode(self.mode));
            statuses.push(QuestionStatus::derive(
                word,
                self.mode,
                progress,
                now,
                self.config.mastery_streak,
            ));
        }
        statuses
    }

    pub async fn get_status(&mut self, word: &str) -> RetentionStatus {
        self.hydrate(word).await;
        let now = self.clock.now_ms();
        self.retention.get_status(word, now).clone()
    }

    // ==================== Prioritisation ====================

    /// Order candidates for presentation. Uses the session's own stats when
    /// `stats` is `None`.
    pub async fn sort_questions<S: AsRef<str>>(
        &mut self,
        words: &[S],
        limits: &LearningLimits,
        stats: Option<&SessionStats>,
    ) -> Vec<QuestionStatus> {
        if words.is_empty() {
            return Vec::new();
        }

        let statuses = self.question_statuses(words).await;
        let stats = stats.cloned().unwrap_or_else(|| self.session.clone());

        let crossed = self.strategy.should_enter_review_mode(&stats, limits);
        if crossed != self.limit_crossed {
            tracing::info!(
                mode = %self.mode.as_str(),
                still_learning = stats.still_learning,
                incorrect = stats.incorrect,
                studied = stats.studied,
                "{}",
                if crossed { "session limit reached, prioritising review" } else { "session back under limits" }
            );
            self.limit_crossed = crossed;
        }

        self.strategy
            .sort_questions(statuses, limits, Some(&stats), self.review_focus, &mut self.rng)
    }

    pub fn should_enter_review_mode(&self, stats: &SessionStats, limits: &LearningLimits) -> bool {
        self.strategy.should_enter_review_mode(stats, limits)
    }

    pub fn question_priority(
        &self,
        question: &QuestionStatus,
        limits: &LearningLimits,
        stats: Option<&SessionStats>,
    ) -> f64 {
        let stats = stats.unwrap_or(&self.session);
        let ctx = PriorityContext::new(stats, limits, self.review_focus);
        self.strategy.question_priority(question, &ctx)
    }

    /// Switch near-exclusive drilling of weak items on or off
    pub fn set_review_focus(&mut self, enabled: bool) {
        if enabled != self.review_focus {
            tracing::info!(mode = %self.mode.as_str(), enabled, "review focus toggled");
        }
        self.review_focus = enabled;
    }

    pub fn review_focus(&self) -> bool {
        self.review_focus
    }

    // ==================== Outcomes ====================

    /// Record an answer given now
    pub async fn record_outcome(
        &mut self,
        word: &str,
        is_correct: bool,
        response_time_ms: f64,
        confidence: u8,
    ) -> RetentionStatus {
        let result = ReviewResult {
            is_correct,
            response_time_ms,
            confidence,
            timestamp: self.clock.now_ms(),
        };
        self.record_review(word, result).await
    }

    /// Apply one review to retention, progress and session state.
    ///
    /// The stored record is never replaced by one built without reading it:
    /// while the store is unreadable the update stays in memory.
    ///
    /// The recall prediction is taken before the update so the logged pair
    /// measures what the model believed when the item was shown.
    pub async fn record_review(&mut self, word: &str, result: ReviewResult) -> RetentionStatus {
        let mut record = self.hydrate(word).await;
        if !self.repository.is_verified(word) {
            // one retry; if the store stays unreadable the update is kept in memory only
            record = self.hydrate(word).await;
        }
        let predicted = self.retention.predict_recall(word, result.timestamp);

        let status = self.retention.record_review(word, &result);

        let mut record = record.unwrap_or_else(|| WordProgress::new(word));
        let progress = record.mode_mut(self.mode);
        progress.record_answer(result.is_correct, result.timestamp);
        progress.retention = Some(status.clone());
        let category = progress.category(self.config.mastery_streak);

        self.repository.save(record).await;

        let previous = self.seen.insert(word.to_string(), category);
        self.session.record_transition(previous, category);

        if self.config.log_predictions {
            if let (Some(log), Some(predicted)) = (&self.prediction_log, predicted) {
                log.log(word, predicted, result.is_correct).await;
            }
        }

        tracing::debug!(
            word = %word,
            correct = result.is_correct,
            interval = status.sm2.interval,
            ease_factor = status.sm2.ease_factor,
            category = ?category,
            "review recorded"
        );
        status
    }

    // ==================== Review Planning ====================

    pub async fn get_due_words<S: AsRef<str>>(&mut self, words: &[S], now: Option<i64>) -> Vec<String> {
        self.hydrate_all(words).await;
        let now = now.unwrap_or_else(|| self.clock.now_ms());
        self.retention.get_due_words(words, now)
    }

    pub async fn get_review_schedule<S: AsRef<str>>(
        &mut self,
        words: &[S],
        days: Option<u32>,
    ) -> BTreeMap<String, Vec<i64>> {
        self.hydrate_all(words).await;
        let now = self.clock.now_ms();
        self.retention
            .get_review_schedule(words, days.unwrap_or(DEFAULT_SCHEDULE_DAYS), now)
    }

    pub async fn evaluate_consolidation(
        &mut self,
        word: &str,
        now: Option<i64>,
        horizons: Option<&[u32]>,
        weights: Option<&[f64]>,
    ) -> ConsolidationReport {
        self.hydrate(word).await;
        let now = now.unwrap_or_else(|| self.clock.now_ms());
        let status = self.retention.get_status(word, now).clone();
        self.retention.evaluate_consolidation(
            &status,
            now,
            horizons.unwrap_or(&DEFAULT_HORIZONS),
            weights.unwrap_or(&DEFAULT_HORIZON_WEIGHTS),
        )
    }

    // ==================== Session ====================

    pub fn session_stats(&self) -> &SessionStats {
        &self.session
    }

    pub fn reset_session(&mut self) {
        self.session = SessionStats::default();
        self.seen.clear();
        self.review_focus = false;
        self.limit_crossed = false;
    }

    /// Drop in-memory retention and progress; persisted records are untouched
    pub fn reset_retention(&mut self) {
        self.retention.reset();
        self.repository.clear_cache();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::store::MemoryStore;
    use crate::types::DAY_MS;

    fn scheduler(store: Arc<MemoryStore>, clock: &SimulatedClock) -> Scheduler {
        Scheduler::new(LearningMode::Memorization, store, SchedulerConfig::default())
            .with_clock(Arc::new(clock.clone()))
            .with_seed(11)
    }

    #[tokio::test]
    async fn test_empty_candidates() {
        let clock = SimulatedClock::default();
        let mut s = scheduler(Arc::new(MemoryStore::new()), &clock);
        let empty: [&str; 0] = [];
        assert!(s.sort_questions(&empty, &LearningLimits::default(), None).await.is_empty());
        assert!(s.get_due_words(&empty, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_session_transitions() {
        let clock = SimulatedClock::default();
        let mut s = scheduler(Arc::new(MemoryStore::new()), &clock);

        s.record_outcome("fox", false, 1200.0, 3).await;
        assert_eq!(s.session_stats().incorrect, 1);

        s.record_outcome("fox", true, 1200.0, 4).await;
        let stats = s.session_stats();
        assert_eq!(stats.incorrect, 0);
        assert_eq!(stats.still_learning, 1);
        assert_eq!(stats.studied, 2);

        s.reset_session();
        assert_eq!(s.session_stats(), &SessionStats::default());
    }

    #[tokio::test]
    async fn test_retention_survives_restart() {
        let store = Arc::new(MemoryStore::new());
        let clock = SimulatedClock::default();
        {
            let mut s = scheduler(store.clone(), &clock);
            s.record_outcome("fox", true, 1000.0, 5).await;
            s.record_outcome("fox", true, 1000.0, 5).await;
        }

        let mut reopened = scheduler(store, &clock);
        let status = reopened.get_status("fox").await;
        assert_eq!(status.sm2.repetition, 2);
        assert_eq!(status.sm2.interval, 6);
    }

    #[tokio::test]
    async fn test_due_words_use_clock() {
        let clock = SimulatedClock::default();
        let mut s = scheduler(Arc::new(MemoryStore::new()), &clock);
        s.record_outcome("fox", true, 1000.0, 5).await;

        assert!(s.get_due_words(&["fox"], None).await.is_empty());
        clock.advance_days(2);
        assert_eq!(s.get_due_words(&["fox"], None).await, vec!["fox"]);
        assert_eq!(s.get_due_words(&["fox"], Some(DAY_MS / 2)).await, Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_default_schedule_horizon() {
        let clock = SimulatedClock::default();
        let mut s = scheduler(Arc::new(MemoryStore::new()), &clock);
        s.record_outcome("fox", true, 1000.0, 5).await;

        let schedule = s.get_review_schedule(&["fox", "owl"], None).await;
        assert_eq!(schedule["fox"].len(), 7);
        assert!(schedule["owl"].is_empty());
    }

    #[tokio::test]
    async fn test_review_focus_reorders() {
        let clock = SimulatedClock::default();
        let mut s = scheduler(Arc::new(MemoryStore::new()), &clock);
        for _ in 0..3 {
            s.record_outcome("known", true, 1000.0, 5).await;
        }
        s.record_outcome("shaky", false, 1000.0, 2).await;

        s.set_review_focus(true);
        let sorted = s
            .sort_questions(&["fresh", "known", "shaky"], &LearningLimits::default(), None)
            .await;
        let words: Vec<&str> = sorted.iter().map(|q| q.word.as_str()).collect();
        assert_eq!(words, vec!["shaky", "fresh", "known"]);
    }
}
