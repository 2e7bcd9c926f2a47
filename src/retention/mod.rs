//! Retention Model - per-item SM-2 state plus a forgetting-curve estimate
//!
//! Core formulas:
//! - Recall estimate: R = exp(-k * t / I)
//!   - t: days since last review
//!   - I: current SM-2 interval (days)
//!   - k: decay constant (default 0.5)
//!   - before the due date R is clamped to [0.1, 1.0]
//!   - once overdue t is extended by the overdue days and R is clamped to
//!     [0.05, 0.9], so an overdue item never reads as fully retained
//!
//! - Forgetting index: F = 1 + 2w + p_rt + min(0.3c, 1.5), clamped to [0.5, 5]
//!   - w: wrong-answer rate
//!   - p_rt: max(0, (avg_rt - 2000) / 5000)
//!   - c: consecutive wrong answers

pub mod sm2;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::RetentionConfig;
use crate::sanitize::sanitize_retention_status;
use crate::types::{ReviewResult, DAY_MS};

pub use sm2::Sm2State;

// ==================== Constants ====================

const MIN_RETENTION: f64 = 0.1;
const MAX_RETENTION: f64 = 1.0;
const MIN_OVERDUE_RETENTION: f64 = 0.05;
const MAX_OVERDUE_RETENTION: f64 = 0.9;

pub const MIN_FORGETTING_INDEX: f64 = 0.5;
pub const MAX_FORGETTING_INDEX: f64 = 5.0;

const RESPONSE_TIME_BASELINE_MS: f64 = 2000.0;
const RESPONSE_TIME_SCALE_MS: f64 = 5000.0;
const WRONG_STREAK_WEIGHT: f64 = 0.3;
const WRONG_STREAK_CAP: f64 = 1.5;

pub const DEFAULT_HORIZONS: [u32; 2] = [1, 7];
pub const DEFAULT_HORIZON_WEIGHTS: [f64; 2] = [0.5, 0.5];

// ==================== Data Structures ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionStatus {
    pub last_review_date: i64,
    pub next_review_date: i64,
    pub sm2: Sm2State,
    /// Estimated recall probability, (0, 1]
    pub retention_rate: f64,
    /// Higher means the item is forgotten faster, >= 0.5
    pub forgetting_index: f64,
    pub total_reviews: u32,
    pub total_correct: u32,
    pub consecutive_correct: u32,
    pub consecutive_wrong: u32,
    pub average_response_time: f64,
    pub last_response_time: f64,
}

impl RetentionStatus {
    pub fn new(now: i64, config: &RetentionConfig) -> Self {
        Self {
            last_review_date: now,
            next_review_date: now,
            sm2: Sm2State::new(config),
            retention_rate: 1.0,
            forgetting_index: 1.0,
            total_reviews: 0,
            total_correct: 0,
            consecutive_correct: 0,
            consecutive_wrong: 0,
            average_response_time: 0.0,
            last_response_time: 0.0,
        }
    }

    pub fn is_reviewed(&self) -> bool {
        self.total_reviews > 0
    }

    pub fn is_due(&self, now: i64) -> bool {
        now >= self.next_review_date
    }
}

/// Retention projected at several future horizons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    /// horizon (days) -> projected retention
    pub retention_at_horizon: BTreeMap<u32, f64>,
    pub composite_retention: f64,
}

// ==================== Model ====================

#[derive(Debug, Clone, Default)]
pub struct RetentionModel {
    config: RetentionConfig,
    statuses: HashMap<String, RetentionStatus>,
}

impl RetentionModel {
    pub fn new(config: RetentionConfig) -> Self {
        Self {
            config,
            statuses: HashMap::new(),
        }
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Existing status, or a freshly initialised default
    pub fn get_status(&mut self, word: &str, now: i64) -> &RetentionStatus {
        let config = &self.config;
        self.statuses
            .entry(word.to_string())
            .or_insert_with(|| RetentionStatus::new(now, config))
    }

    pub fn peek(&self, word: &str) -> Option<&RetentionStatus> {
        self.statuses.get(word)
    }

    /// Adopt a persisted status; out-of-range fields are repaired
    pub fn restore(&mut self, word: &str, mut status: RetentionStatus) {
        if sanitize_retention_status(&mut status, &self.config) {
            tracing::warn!(word = %word, "repaired malformed retention status");
        }
        self.statuses.insert(word.to_string(), status);
    }

    /// Explicit bulk reset
    pub fn reset(&mut self) {
        self.statuses.clear();
    }

    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    pub fn record_review(&mut self, word: &str, result: &ReviewResult) -> RetentionStatus {
        let Self { config, statuses } = self;
        let config: &RetentionConfig = config;
        let status = statuses
            .entry(word.to_string())
            .or_insert_with(|| RetentionStatus::new(result.timestamp, config));

        let response_time = if result.response_time_ms.is_finite() {
            result.response_time_ms.max(0.0)
        } else {
            0.0
        };

        status.total_reviews += 1;
        status.average_response_time = if status.total_reviews == 1 {
            response_time
        } else {
            status.average_response_time * (1.0 - config.response_time_alpha)
                + response_time * config.response_time_alpha
        };
        status.last_response_time = response_time;
        status.last_review_date = result.timestamp;

        if result.is_correct {
            status.total_correct += 1;
            status.consecutive_correct += 1;
            status.consecutive_wrong = 0;

            let quality = sm2::quality_from_confidence(result.confidence);
            sm2::apply_correct(&mut status.sm2, quality, config);

            let slow = status.last_response_time > config.slow_response_ms
                && status.last_response_time
                    > config.slow_response_ratio * status.average_response_time;
            if slow {
                status.sm2.interval =
                    sm2::apply_slow_penalty(status.sm2.interval, config.slow_response_penalty);
            }
        } else {
            status.consecutive_wrong += 1;
            status.consecutive_correct = 0;
            sm2::apply_incorrect(&mut status.sm2, config);
        }

        status.next_review_date = status.last_review_date + status.sm2.interval as i64 * DAY_MS;
        status.retention_rate = estimate_retention(status, result.timestamp, config.decay_constant);
        status.forgetting_index = calculate_forgetting_index(status);

        status.clone()
    }

    pub fn estimate_retention_rate(&self, status: &RetentionStatus, now: i64) -> f64 {
        estimate_retention(status, now, self.config.decay_constant)
    }

    /// Recall probability for a reviewed item; `None` when there is no history
    pub fn predict_recall(&self, word: &str, now: i64) -> Option<f64> {
        self.statuses
            .get(word)
            .filter(|s| s.is_reviewed())
            .map(|s| self.estimate_retention_rate(s, now))
    }

    /// Reviewed items with `now >= next_review_date`, most overdue-and-forgettable first
    pub fn get_due_words<S: AsRef<str>>(&self, candidates: &[S], now: i64) -> Vec<String> {
        let mut due: Vec<(&str, f64)> = candidates
            .iter()
            .filter_map(|word| {
                let word = word.as_ref();
                let status = self.statuses.get(word)?;
                if !status.is_reviewed() || !status.is_due(now) {
                    return None;
                }
                let days_past_due = (now - status.next_review_date) as f64 / DAY_MS as f64;
                Some((word, days_past_due * status.forgetting_index))
            })
            .collect();

        // stable: equal keys keep input order
        due.sort_by(|a, b| b.1.total_cmp(&a.1));
        due.into_iter().map(|(word, _)| word.to_string()).collect()
    }

    /// Future due dates within the horizon, assuming the current interval stays flat
    pub fn get_review_schedule<S: AsRef<str>>(
        &self,
        candidates: &[S],
        horizon_days: u32,
        now: i64,
    ) -> BTreeMap<String, Vec<i64>> {
        let end = now + horizon_days as i64 * DAY_MS;

        candidates
            .iter()
            .map(|word| {
                let word = word.as_ref();
                let dates = match self.statuses.get(word) {
                    Some(status) if status.is_reviewed() => {
                        let step = status.sm2.interval.max(1) as i64 * DAY_MS;
                        let mut dates = Vec::new();
                        let mut date = status.next_review_date;
                        while date <= end {
                            dates.push(date);
                            date += step;
                        }
                        dates
                    }
                    _ => Vec::new(),
                };
                (word.to_string(), dates)
            })
            .collect()
    }

    /// Retention projected `h` days past `now` for each horizon, plus a weighted composite
    pub fn evaluate_consolidation(
        &self,
        status: &RetentionStatus,
        now: i64,
        horizons: &[u32],
        weights: &[f64],
    ) -> ConsolidationReport {
        if horizons.is_empty() {
            let current = self.estimate_retention_rate(status, now);
            return ConsolidationReport {
                retention_at_horizon: BTreeMap::new(),
                composite_retention: current,
            };
        }

        let values: Vec<f64> = horizons
            .iter()
            .map(|&h| self.estimate_retention_rate(status, now + h as i64 * DAY_MS))
            .collect();

        let weights = normalize_weights(weights, horizons.len());
        let composite: f64 = values.iter().zip(&weights).map(|(v, w)| v * w).sum();

        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        ConsolidationReport {
            retention_at_horizon: horizons.iter().copied().zip(values).collect(),
            composite_retention: composite.clamp(lo, hi),
        }
    }
}

// ==================== Pure Functions ====================

pub fn estimate_retention(status: &RetentionStatus, now: i64, decay_constant: f64) -> f64 {
    if !status.is_reviewed() {
        return status.retention_rate;
    }

    let interval = status.sm2.interval.max(1) as f64;
    let days_since = ((now - status.last_review_date) as f64 / DAY_MS as f64).max(0.0);

    if now <= status.next_review_date {
        (-decay_constant * days_since / interval)
            .exp()
            .clamp(MIN_RETENTION, MAX_RETENTION)
    } else {
        let overdue_days = (now - status.next_review_date) as f64 / DAY_MS as f64;
        (-decay_constant * (days_since + overdue_days) / interval)
            .exp()
            .clamp(MIN_OVERDUE_RETENTION, MAX_OVERDUE_RETENTION)
    }
}

pub fn calculate_forgetting_index(status: &RetentionStatus) -> f64 {
    let wrong_rate = if status.total_reviews == 0 {
        0.0
    } else {
        1.0 - status.total_correct as f64 / status.total_reviews as f64
    };
    let response_time_penalty =
        ((status.average_response_time - RESPONSE_TIME_BASELINE_MS) / RESPONSE_TIME_SCALE_MS)
            .max(0.0);
    let streak_penalty = (status.consecutive_wrong as f64 * WRONG_STREAK_WEIGHT).min(WRONG_STREAK_CAP);

    (1.0 + wrong_rate * 2.0 + response_time_penalty + streak_penalty)
        .clamp(MIN_FORGETTING_INDEX, MAX_FORGETTING_INDEX)
}

/// Non-negative weights summing to 1; equal weights when unusable
fn normalize_weights(weights: &[f64], n: usize) -> Vec<f64> {
    let equal = vec![1.0 / n as f64; n];
    if weights.len() != n {
        return equal;
    }
    let cleaned: Vec<f64> = weights
        .iter()
        .map(|w| if w.is_finite() { w.max(0.0) } else { 0.0 })
        .collect();
    let sum: f64 = cleaned.iter().sum();
    if sum <= 0.0 {
        return equal;
    }
    cleaned.into_iter().map(|w| w / sum).collect()
}
