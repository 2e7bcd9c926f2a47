use super::{PriorityContext, PriorityStrategy};
use crate::progress::QuestionStatus;
use crate::types::{LearningMode, QuestionCategory};

// Forgetting-risk thresholds
const EMERGENCY_RISK: f64 = 150.0;
const HIGH_RISK: f64 = 100.0;
const MASTERED_RISK: f64 = 50.0;

// Normal-mode priorities
const EMERGENCY_PRIORITY: f64 = 0.1;
const HIGH_RISK_PRIORITY: f64 = 0.2;
const INCORRECT_CAP: f64 = 0.3;
const STILL_LEARNING_CAP: f64 = 0.8;
const MASTERED_AT_RISK: f64 = 2.0;
const MASTERED_DEFERRED: f64 = 4.5;
const NEW_SUPPRESSED: f64 = 5.0;
const NEW_DEFAULT: f64 = 3.5;

/// Review ratio at which new material is held back
const NEW_SUPPRESSION_RATIO: f64 = 0.2;

// Priorities once an effective limit is crossed
const INCORRECT_AT_LIMIT: f64 = 0.0;
const STILL_LEARNING_AT_LIMIT: f64 = 0.05;

/// Forgetting-risk driven ordering for memorization, translation and spelling
#[derive(Debug, Clone, Copy)]
pub struct MemorizationStrategy {
    mode: LearningMode,
}

impl MemorizationStrategy {
    pub fn new(mode: LearningMode) -> Self {
        Self { mode }
    }

    fn review_focus_priority(category: QuestionCategory) -> f64 {
        match category {
            QuestionCategory::Incorrect => 0.0,
            QuestionCategory::StillLearning => 0.5,
            QuestionCategory::Mastered => 10.0,
            QuestionCategory::New => 8.0,
        }
    }

    fn normal_priority(question: &QuestionStatus, ctx: &PriorityContext) -> f64 {
        let risk = question.forgetting_risk;

        let mut priority = if risk >= EMERGENCY_RISK {
            EMERGENCY_PRIORITY
        } else if risk >= HIGH_RISK {
            HIGH_RISK_PRIORITY
        } else {
            match question.category {
                QuestionCategory::Incorrect => INCORRECT_CAP,
                QuestionCategory::StillLearning => STILL_LEARNING_CAP,
                QuestionCategory::Mastered if risk >= MASTERED_RISK => MASTERED_AT_RISK,
                QuestionCategory::Mastered => MASTERED_DEFERRED,
                QuestionCategory::New if ctx.stats.review_ratio() >= NEW_SUPPRESSION_RATIO => {
                    NEW_SUPPRESSED
                }
                QuestionCategory::New => NEW_DEFAULT,
            }
        };

        match question.category {
            QuestionCategory::Incorrect => priority = priority.min(INCORRECT_CAP),
            QuestionCategory::StillLearning => priority = priority.min(STILL_LEARNING_CAP),
            _ => {}
        }

        if ctx.limit_crossed() {
            match question.category {
                QuestionCategory::Incorrect => priority = priority.min(INCORRECT_AT_LIMIT),
                QuestionCategory::StillLearning => {
                    priority = priority.min(STILL_LEARNING_AT_LIMIT)
                }
                _ => {}
            }
        }

        priority
    }
}

impl Default for MemorizationStrategy {
    fn default() -> Self {
        Self::new(LearningMode::Memorization)
    }
}

impl PriorityStrategy for MemorizationStrategy {
    fn mode(&self) -> LearningMode {
        self.mode
    }

    fn question_priority(&self, question: &QuestionStatus, ctx: &PriorityContext) -> f64 {
        if ctx.review_focus {
            Self::review_focus_priority(question.category)
        } else {
            Self::normal_priority(question, ctx)
        }
    }
}
