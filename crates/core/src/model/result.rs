use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ExamId, ResultId, StudentId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResultError {
    #[error("score must be between 0 and 100, got {0}")]
    ScoreOutOfRange(u32),

    #[error("correct answers ({correct}) exceed total questions ({total})")]
    CountMismatch { correct: u32, total: u32 },

    #[error("attempt numbers start at 1")]
    InvalidAttempt,
}

/// Score fields computed by the grading engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeOutcome {
    pub score: u8,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub passed: bool,
}

/// A graded submission that the result store has not numbered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradedAttempt {
    pub exam_id: ExamId,
    pub student_id: StudentId,
    pub outcome: GradeOutcome,
    pub attempt: u32,
    pub submitted_at: DateTime<Utc>,
}

impl GradedAttempt {
    #[must_use]
    pub fn assign_id(self, id: ResultId) -> ExamResult {
        ExamResult {
            id,
            exam_id: self.exam_id,
            student_id: self.student_id,
            outcome: self.outcome,
            attempt: self.attempt,
            submitted_at: self.submitted_at,
        }
    }
}

/// Immutable graded outcome of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    id: ResultId,
    exam_id: ExamId,
    student_id: StudentId,
    outcome: GradeOutcome,
    attempt: u32,
    submitted_at: DateTime<Utc>,
}

impl ExamResult {
    /// Rehydrate a result from the result store.
    ///
    /// # Errors
    ///
    /// Returns `ResultError` if the stored counters are inconsistent.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: ResultId,
        exam_id: ExamId,
        student_id: StudentId,
        score: u32,
        correct_answers: u32,
        total_questions: u32,
        passed: bool,
        attempt: u32,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, ResultError> {
        let score = u8::try_from(score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or(ResultError::ScoreOutOfRange(score))?;
        if correct_answers > total_questions {
            return Err(ResultError::CountMismatch {
                correct: correct_answers,
                total: total_questions,
            });
        }
        if attempt == 0 {
            return Err(ResultError::InvalidAttempt);
        }

        Ok(Self {
            id,
            exam_id,
            student_id,
            outcome: GradeOutcome {
                score,
                correct_answers,
                total_questions,
                passed,
            },
            attempt,
            submitted_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> ResultId {
        self.id
    }

    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.exam_id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn outcome(&self) -> GradeOutcome {
        self.outcome
    }

    #[must_use]
    pub fn score(&self) -> u8 {
        self.outcome.score
    }

    #[must_use]
    pub fn correct_answers(&self) -> u32 {
        self.outcome.correct_answers
    }

    #[must_use]
    pub fn total_questions(&self) -> u32 {
        self.outcome.total_questions
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome.passed
    }

    /// 1-based attempt number of this result for its (student, exam) pair.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    #[must_use]
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }
}

/// Highest-scoring result; the earliest attempt wins ties.
#[must_use]
pub fn best_result(results: &[ExamResult]) -> Option<&ExamResult> {
    results
        .iter()
        .min_by_key(|r| (std::cmp::Reverse(r.score()), r.attempt()))
}
