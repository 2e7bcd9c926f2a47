use super::{PriorityContext, PriorityStrategy};
use crate::progress::QuestionStatus;
use crate::types::LearningMode;

const WEAK_ACCURACY: f64 = 50.0;
const SHAKY_ACCURACY: f64 = 80.0;

/// Accuracy-threshold ordering for grammar drills
#[derive(Debug, Clone, Copy, Default)]
pub struct GrammarStrategy;

impl PriorityStrategy for GrammarStrategy {
    fn mode(&self) -> LearningMode {
        LearningMode::Grammar
    }

    fn question_priority(&self, question: &QuestionStatus, _ctx: &PriorityContext) -> f64 {
        if question.accuracy < WEAK_ACCURACY {
            1.0
        } else if question.accuracy < SHAKY_ACCURACY {
            2.0
        } else {
            5.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::LearningLimits;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn question(word: &str, accuracy: f64, last_studied: Option<i64>) -> QuestionStatus {
        let mut q = QuestionStatus::new_item(word, LearningMode::Grammar);
        q.accuracy = accuracy;
        q.last_studied = last_studied;
        q
    }

    #[test]
    fn test_accuracy_bands() {
        let ctx = PriorityContext::default();
        assert_eq!(GrammarStrategy.question_priority(&question("a", 49.9, None), &ctx), 1.0);
        assert_eq!(GrammarStrategy.question_priority(&question("a", 50.0, None), &ctx), 2.0);
        assert_eq!(GrammarStrategy.question_priority(&question("a", 79.9, None), &ctx), 2.0);
        assert_eq!(GrammarStrategy.question_priority(&question("a", 80.0, None), &ctx), 5.0);
    }

    #[test]
    fn test_review_focus_does_not_change_grammar() {
        let ctx = PriorityContext {
            review_focus: true,
            ..Default::default()
        };
        assert_eq!(GrammarStrategy.question_priority(&question("a", 90.0, None), &ctx), 5.0);
    }

    #[test]
    fn test_two_stage_tie_break() {
        let pool = vec![
            question("solid", 95.0, Some(10)),
            question("newer", 30.0, Some(500)),
            question("older", 30.0, Some(100)),
        ];
        let sorted = GrammarStrategy.sort_questions(
            pool,
            &LearningLimits::default(),
            None,
            false,
            &mut ChaCha8Rng::seed_from_u64(3),
        );
        let words: Vec<&str> = sorted.iter().map(|q| q.word.as_str()).collect();
        assert_eq!(words, vec!["older", "newer", "solid"]);
    }
}
