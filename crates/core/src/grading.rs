use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Exam, GradeOutcome, Submission};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradingError {
    #[error("passing score must be between 0 and 100, got {provided}")]
    InvalidPassingScore { provided: u32 },

    #[error("exam has no questions to grade")]
    NoQuestions,
}

//
// ─── PASSING POLICY ────────────────────────────────────────────────────────────
//

/// Deployment-supplied threshold deciding `passed`.
///
/// # Examples
///
/// ```
/// # use course_core::grading::PassingPolicy;
/// let policy = PassingPolicy::new(60)?;
/// assert!(policy.is_passing(60));
/// assert!(!policy.is_passing(59));
/// # Ok::<(), course_core::grading::GradingError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassingPolicy {
    threshold: u8,
}

impl PassingPolicy {
    /// # Errors
    ///
    /// Returns `GradingError::InvalidPassingScore` above 100.
    pub fn new(threshold: u32) -> Result<Self, GradingError> {
        u8::try_from(threshold)
            .ok()
            .filter(|t| *t <= 100)
            .map(|threshold| Self { threshold })
            .ok_or(GradingError::InvalidPassingScore {
                provided: threshold,
            })
    }

    #[must_use]
    pub fn threshold(&self) -> u8 {
        self.threshold
    }

    #[must_use]
    pub fn is_passing(&self, score: u8) -> bool {
        score >= self.threshold
    }
}

/// `round(correct / total * 100)` with halves rounded up, in integer arithmetic.
///
/// Returns 0 when `total` is 0.
#[must_use]
pub fn score_percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Stateless scorer of submissions against persisted exams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GradingEngine {
    policy: PassingPolicy,
}

impl GradingEngine {
    #[must_use]
    pub fn new(policy: PassingPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> PassingPolicy {
        self.policy
    }

    /// Grade `submission` against `exam`.
    ///
    /// Missing answers, and choices naming an option that is not marked
    /// correct (or not part of the question at all), count as incorrect.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::NoQuestions` for an exam without questions.
    pub fn grade(&self, exam: &Exam, submission: &Submission) -> Result<GradeOutcome, GradingError> {
        let total = exam.question_count();
        if total == 0 {
            return Err(GradingError::NoQuestions);
        }

        let correct = exam
            .questions()
            .iter()
            .filter(|question| {
                submission
                    .choice(question.id)
                    .is_some_and(|option| question.is_correct_choice(option))
            })
            .count();

        let total_questions = u32::try_from(total).unwrap_or(u32::MAX);
        let correct_answers = u32::try_from(correct).unwrap_or(u32::MAX);
        let score = score_percent(correct_answers, total_questions);

        Ok(GradeOutcome {
            score,
            correct_answers,
            total_questions,
            passed: self.policy.is_passing(score),
        })
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::exam::tests::sample_exam;
    use crate::model::{ExamId, ModuleId, OptionId, QuestionId};
    use crate::time::fixed_now;

    fn engine(threshold: u32) -> GradingEngine {
        GradingEngine::new(PassingPolicy::new(threshold).unwrap())
    }

    #[test]
    fn three_of_four_scores_seventy_five() {
        let exam = sample_exam(4);
        let mut submission = Submission::new();
        submission.choose(QuestionId::new(1), OptionId::new(11));
        submission.choose(QuestionId::new(2), OptionId::new(21));
        submission.choose(QuestionId::new(3), OptionId::new(31));
        submission.choose(QuestionId::new(4), OptionId::new(42));

        let outcome = engine(70).grade(&exam, &submission).unwrap();
        assert_eq!(outcome.score, 75);
        assert_eq!(outcome.correct_answers, 3);
        assert_eq!(outcome.total_questions, 4);
        assert!(outcome.passed);

        let again = engine(70).grade(&exam, &submission).unwrap();
        assert_eq!(outcome, again);
    }

    #[test]
    fn missing_and_unknown_answers_are_incorrect() {
        let exam = sample_exam(3);
        let mut submission = Submission::new();
        submission.choose(QuestionId::new(1), OptionId::new(11));
        submission.choose(QuestionId::new(2), OptionId::new(999));

        let outcome = engine(50).grade(&exam, &submission).unwrap();
        assert_eq!(outcome.correct_answers, 1);
        assert_eq!(outcome.score, 33);
        assert!(!outcome.passed);
    }

    #[test]
    fn passed_follows_configured_threshold() {
        let exam = sample_exam(2);
        let mut submission = Submission::new();
        submission.choose(QuestionId::new(1), OptionId::new(11));

        assert!(engine(50).grade(&exam, &submission).unwrap().passed);
        assert!(!engine(51).grade(&exam, &submission).unwrap().passed);
    }

    #[test]
    fn empty_exam_is_a_precondition_violation() {
        let exam = Exam::from_persisted(
            ExamId::new(1),
            ModuleId::new(1),
            "Empty",
            Vec::new(),
            fixed_now(),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(
            engine(50).grade(&exam, &Submission::new()).unwrap_err(),
            GradingError::NoQuestions
        );
    }

    #[test]
    fn score_rounds_half_up_and_stays_in_range() {
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(0, 7), 0);
        assert_eq!(score_percent(7, 7), 100);
        assert_eq!(score_percent(0, 0), 0);
        for total in 1..=40_u32 {
            for correct in 0..=total {
                let score = i64::from(score_percent(correct, total));
                let (correct, total) = (i64::from(correct), i64::from(total));
                assert!(score <= 100);
                // within half a point of the exact percentage
                assert!(2 * (score * total - 100 * correct).abs() <= total);
            }
        }
    }

    #[test]
    fn policy_rejects_threshold_above_hundred() {
        assert_eq!(
            PassingPolicy::new(101).unwrap_err(),
            GradingError::InvalidPassingScore { provided: 101 }
        );
        assert_eq!(PassingPolicy::new(0).unwrap().threshold(), 0);
    }
}
