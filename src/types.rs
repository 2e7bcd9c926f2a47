//! Common Types and Constants
//!
//! Shared data structures used across the scheduling modules.

use serde::{Deserialize, Serialize};

// ==================== Constants ====================

/// Milliseconds in one day
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Numerical stability epsilon
pub const EPSILON: f64 = 1e-10;

/// Upper bound for any interval expressed in days
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Consecutive correct answers before an item counts as mastered
pub const DEFAULT_MASTERY_STREAK: u32 = 3;

// ==================== Learning Mode ====================

/// Learning mode; each item keeps an independent state per mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningMode {
    Memorization,
    Translation,
    Spelling,
    Grammar,
}

impl LearningMode {
    pub fn all() -> &'static [LearningMode] {
        &[
            LearningMode::Memorization,
            LearningMode::Translation,
            LearningMode::Spelling,
            LearningMode::Grammar,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LearningMode::Memorization => "memorization",
            LearningMode::Translation => "translation",
            LearningMode::Spelling => "spelling",
            LearningMode::Grammar => "grammar",
        }
    }
}

impl std::str::FromStr for LearningMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memorization" => Ok(LearningMode::Memorization),
            "translation" => Ok(LearningMode::Translation),
            "spelling" => Ok(LearningMode::Spelling),
            "grammar" => Ok(LearningMode::Grammar),
            other => Err(format!("unknown learning mode: {other}")),
        }
    }
}

// ==================== Question Category ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    New,
    StillLearning,
    Incorrect,
    Mastered,
}

// ==================== Session ====================

/// Per-session category counts. Transient, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub new: u32,
    pub still_learning: u32,
    pub incorrect: u32,
    pub mastered: u32,
    /// Answers given in this session
    pub studied: u32,
}

impl SessionStats {
    pub fn count(&self, category: QuestionCategory) -> u32 {
        match category {
            QuestionCategory::New => self.new,
            QuestionCategory::StillLearning => self.still_learning,
            QuestionCategory::Incorrect => self.incorrect,
            QuestionCategory::Mastered => self.mastered,
        }
    }

    fn slot(&mut self, category: QuestionCategory) -> &mut u32 {
        match category {
            QuestionCategory::New => &mut self.new,
            QuestionCategory::StillLearning => &mut self.still_learning,
            QuestionCategory::Incorrect => &mut self.incorrect,
            QuestionCategory::Mastered => &mut self.mastered,
        }
    }

    /// Move one item between categories after an answer.
    /// `from` is `None` the first time the item is seen in this session.
    pub fn record_transition(&mut self, from: Option<QuestionCategory>, to: QuestionCategory) {
        if let Some(prev) = from {
            let slot = self.slot(prev);
            *slot = slot.saturating_sub(1);
        }
        *self.slot(to) += 1;
        self.studied += 1;
    }

    /// `(still_learning + incorrect) / studied`, 0 before the first answer
    pub fn review_ratio(&self) -> f64 {
        if self.studied == 0 {
            return 0.0;
        }
        (self.still_learning + self.incorrect) as f64 / self.studied as f64
    }
}

/// Nominal per-session caps; 0 means unlimited
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearningLimits {
    /// Cap on still-learning items
    pub learning_limit: u32,
    /// Cap on incorrect items
    pub review_limit: u32,
}

impl LearningLimits {
    pub fn new(learning_limit: u32, review_limit: u32) -> Self {
        Self {
            learning_limit,
            review_limit,
        }
    }
}

// ==================== Review ====================

/// One answered question
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    pub is_correct: bool,
    /// Response time in milliseconds
    pub response_time_ms: f64,
    /// Self-reported confidence, 1-5
    pub confidence: u8,
    /// Review time, ms epoch
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_moves_counts() {
        let mut stats = SessionStats::default();
        stats.record_transition(None, QuestionCategory::Incorrect);
        stats.record_transition(Some(QuestionCategory::Incorrect), QuestionCategory::StillLearning);

        assert_eq!(stats.incorrect, 0);
        assert_eq!(stats.still_learning, 1);
        assert_eq!(stats.studied, 2);
    }

    #[test]
    fn test_review_ratio_empty_session() {
        assert_eq!(SessionStats::default().review_ratio(), 0.0);
    }

    #[test]
    fn test_mode_round_trip_names() {
        for mode in LearningMode::all() {
            let parsed: LearningMode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, *mode);
        }
        assert!("listening".parse::<LearningMode>().is_err());
    }
}
