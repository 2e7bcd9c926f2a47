//! Priority strategies
//!
//! A strategy turns a [`QuestionStatus`] into a scalar priority (lower is
//! shown sooner) and orders a candidate pool. One strategy is selected per
//! [`LearningMode`] at construction time.
//!
//! Ordering is priority ascending, then `last_studied` ascending (never
//! studied first), then a random key from the injected RNG so equally ranked
//! items do not starve each other.

mod grammar;
mod memorization;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::learning_utils::limit_reached;
use crate::progress::QuestionStatus;
use crate::types::{LearningLimits, LearningMode, SessionStats};

pub use grammar::GrammarStrategy;
pub use memorization::MemorizationStrategy;

/// Everything a priority rule may look at besides the question itself
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityContext {
    pub stats: SessionStats,
    pub limits: LearningLimits,
    /// Near-exclusive drilling of weak items, switched on by the session driver
    pub review_focus: bool,
    pub learning_limit_reached: bool,
    pub review_limit_reached: bool,
}

impl PriorityContext {
    pub fn new(stats: &SessionStats, limits: &LearningLimits, review_focus: bool) -> Self {
        Self {
            stats: stats.clone(),
            limits: *limits,
            review_focus,
            learning_limit_reached: limit_reached(
                stats.still_learning,
                limits.learning_limit,
                stats.studied,
            ),
            review_limit_reached: limit_reached(stats.incorrect, limits.review_limit, stats.studied),
        }
    }

    pub fn limit_crossed(&self) -> bool {
        self.learning_limit_reached || self.review_limit_reached
    }
}

pub trait PriorityStrategy: Send + Sync {
    fn mode(&self) -> LearningMode;

    fn question_priority(&self, question: &QuestionStatus, ctx: &PriorityContext) -> f64;

    /// True once still-learning or incorrect counts reach their effective limit
    fn should_enter_review_mode(&self, stats: &SessionStats, limits: &LearningLimits) -> bool {
        PriorityContext::new(stats, limits, false).limit_crossed()
    }

    fn sort_questions(
        &self,
        questions: Vec<QuestionStatus>,
        limits: &LearningLimits,
        stats: Option<&SessionStats>,
        review_focus: bool,
        rng: &mut dyn RngCore,
    ) -> Vec<QuestionStatus> {
        let stats = stats.cloned().unwrap_or_default();
        let ctx = PriorityContext::new(&stats, limits, review_focus);
        sort_by_priority(self, questions, &ctx, rng)
    }
}

/// Assign priorities and apply the three-level ordering
pub fn sort_by_priority<S: PriorityStrategy + ?Sized>(
    strategy: &S,
    questions: Vec<QuestionStatus>,
    ctx: &PriorityContext,
    rng: &mut dyn RngCore,
) -> Vec<QuestionStatus> {
    let mut keyed: Vec<(QuestionStatus, u64)> = questions
        .into_iter()
        .map(|mut q| {
            q.priority = strategy.question_priority(&q, ctx);
            (q, rng.next_u64())
        })
        .collect();

    keyed.sort_by(|(a, tie_a), (b, tie_b)| {
        a.priority
            .total_cmp(&b.priority)
            .then_with(|| a.last_studied.cmp(&b.last_studied))
            .then_with(|| tie_a.cmp(tie_b))
    });

    keyed.into_iter().map(|(q, _)| q).collect()
}

pub fn strategy_for(mode: LearningMode) -> Box<dyn PriorityStrategy> {
    match mode {
        LearningMode::Grammar => Box::new(GrammarStrategy),
        LearningMode::Memorization | LearningMode::Translation | LearningMode::Spelling => {
            Box::new(MemorizationStrategy::new(mode))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QuestionCategory;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn question(word: &str, category: QuestionCategory, last_studied: Option<i64>) -> QuestionStatus {
        let mut q = QuestionStatus::new_item(word, LearningMode::Memorization);
        q.category = category;
        q.last_studied = last_studied;
        q.total_attempts = if category == QuestionCategory::New { 0 } else { 1 };
        q
    }

    #[test]
    fn test_strategy_selection() {
        assert_eq!(strategy_for(LearningMode::Grammar).mode(), LearningMode::Grammar);
        assert_eq!(strategy_for(LearningMode::Spelling).mode(), LearningMode::Spelling);
        assert_eq!(strategy_for(LearningMode::Translation).mode(), LearningMode::Translation);
    }

    #[test]
    fn test_review_mode_uses_effective_limits() {
        let strategy = strategy_for(LearningMode::Memorization);
        let limits = LearningLimits::new(30, 0);

        let mut stats = SessionStats {
            still_learning: 22,
            studied: 10,
            ..Default::default()
        };
        assert!(!strategy.should_enter_review_mode(&stats, &limits));

        stats.still_learning = 23;
        assert!(strategy.should_enter_review_mode(&stats, &limits));

        // later in the session the cap relaxes to the nominal target
        stats.studied = 40;
        assert!(!strategy.should_enter_review_mode(&stats, &limits));

        stats.incorrect = 500;
        assert!(!strategy.should_enter_review_mode(&stats, &limits));
    }

    #[test]
    fn test_tie_break_prefers_older_then_seeded_random() {
        let strategy = strategy_for(LearningMode::Memorization);
        let pool = vec![
            question("recent", QuestionCategory::StillLearning, Some(2_000)),
            question("old", QuestionCategory::StillLearning, Some(1_000)),
        ];
        let sorted = strategy.sort_questions(
            pool,
            &LearningLimits::default(),
            None,
            false,
            &mut ChaCha8Rng::seed_from_u64(7),
        );
        assert_eq!(sorted[0].word, "old");

        let same: Vec<QuestionStatus> = (0..20)
            .map(|i| question(&format!("w{i}"), QuestionCategory::StillLearning, Some(1_000)))
            .collect();
        let run = |seed| {
            strategy
                .sort_questions(
                    same.clone(),
                    &LearningLimits::default(),
                    None,
                    false,
                    &mut ChaCha8Rng::seed_from_u64(seed),
                )
                .into_iter()
                .map(|q| q.word)
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
        assert_ne!(run(42), run(43));
    }
}
