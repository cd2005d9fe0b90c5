use std::sync::Arc;

use course_core::grading::GradingEngine;
use course_core::model::{
    Exam, ExamId, ExamResult, GradedAttempt, ModuleId, OptionId, QuestionId, StudentId,
    SubjectId, Submission, best_result,
};
use storage::repository::{ExamRepository, ResultRepository, StorageError};

use crate::Clock;
use crate::error::ExamSessionError;
use crate::invalidation::{CacheKey, InvalidationBus};
use crate::progress_service::ProgressService;

/// One student's pass through an exam, from first choice to submission.
///
/// Holds at most one submission: once `ExamService::submit` succeeds the
/// attempt is closed.
#[derive(Debug, Clone)]
pub struct ExamAttempt {
    exam: Exam,
    student_id: StudentId,
    submission: Submission,
    result: Option<ExamResult>,
}

impl ExamAttempt {
    #[must_use]
    pub fn exam(&self) -> &Exam {
        &self.exam
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    /// Record a choice. Ignored for options that do not belong to the
    /// question, and after submission.
    pub fn choose(&mut self, question_id: QuestionId, option_id: OptionId) -> bool {
        let belongs = self
            .exam
            .question(question_id)
            .is_some_and(|q| q.has_option(option_id));
        if !belongs || self.is_submitted() {
            return false;
        }
        self.submission.choose(question_id, option_id);
        true
    }

    #[must_use]
    pub fn unanswered(&self) -> Vec<QuestionId> {
        self.submission.unanswered(&self.exam)
    }

    /// Every question has a chosen option; the submit gate.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.submission.is_complete_for(&self.exam)
    }

    #[must_use]
    pub fn is_submitted(&self) -> bool {
        self.result.is_some()
    }

    #[must_use]
    pub fn result(&self) -> Option<&ExamResult> {
        self.result.as_ref()
    }
}

/// Exam taking: starting attempts, grading submissions, result history and
/// availability.
#[derive(Clone)]
pub struct ExamService {
    clock: Clock,
    engine: GradingEngine,
    max_attempts: Option<u32>,
    exams: Arc<dyn ExamRepository>,
    results: Arc<dyn ResultRepository>,
    progress: Arc<ProgressService>,
    bus: InvalidationBus,
}

impl ExamService {
    #[must_use]
    pub fn new(
        clock: Clock,
        engine: GradingEngine,
        exams: Arc<dyn ExamRepository>,
        results: Arc<dyn ResultRepository>,
        progress: Arc<ProgressService>,
        bus: InvalidationBus,
    ) -> Self {
        Self {
            clock,
            engine,
            max_attempts: None,
            exams,
            results,
            progress,
            bus,
        }
    }

    /// Limit results per (student, exam). `None` allows unlimited retakes.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Open an attempt at the exam of `module_id`.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::NoExam` if the module has no exam.
    /// Returns `ExamSessionError::RetakeLimitReached` if no attempts remain.
    /// Returns `ExamSessionError::Storage` if repository access fails.
    pub async fn start_attempt(
        &self,
        student_id: StudentId,
        module_id: ModuleId,
    ) -> Result<ExamAttempt, ExamSessionError> {
        let exam = self
            .exams
            .exam_for_module(module_id)
            .await?
            .ok_or(ExamSessionError::NoExam(module_id))?;
        self.next_attempt_number(student_id, exam.id()).await?;

        Ok(ExamAttempt {
            exam,
            student_id,
            submission: Submission::new(),
            result: None,
        })
    }

    /// Grade and persist the attempt's submission.
    ///
    /// The `&mut` borrow keeps a single submit in flight per attempt. On
    /// failure the attempt stays open so the student can retry.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::AlreadySubmitted` for a closed attempt.
    /// Returns `ExamSessionError::Incomplete` if any question is unanswered.
    /// Returns `ExamSessionError::RetakeLimitReached` if no attempts remain.
    /// Returns `ExamSessionError::Grading` if the exam cannot be graded.
    /// Returns `ExamSessionError::Storage` if repository access fails.
    pub async fn submit(&self, attempt: &mut ExamAttempt) -> Result<ExamResult, ExamSessionError> {
        if attempt.is_submitted() {
            return Err(ExamSessionError::AlreadySubmitted);
        }
        if !attempt.is_complete() {
            return Err(ExamSessionError::Incomplete {
                missing: attempt.unanswered(),
            });
        }

        let exam_id = attempt.exam.id();
        let student_id = attempt.student_id;
        let outcome = self.engine.grade(&attempt.exam, &attempt.submission)?;
        let number = self.next_attempt_number(student_id, exam_id).await?;

        let graded = GradedAttempt {
            exam_id,
            student_id,
            outcome,
            attempt: number,
            submitted_at: self.clock.now(),
        };
        let result = self
            .results
            .append_result(&graded)
            .await
            .map_err(|e| match e {
                StorageError::Conflict => ExamSessionError::AlreadySubmitted,
                other => other.into(),
            })?;

        tracing::info!(
            %exam_id,
            %student_id,
            attempt = number,
            score = outcome.score,
            passed = outcome.passed,
            "exam submitted"
        );
        self.bus.publish([CacheKey::ExamResults {
            student_id,
            exam_id,
        }]);
        attempt.result = Some(result.clone());
        Ok(result)
    }

    async fn next_attempt_number(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> Result<u32, ExamSessionError> {
        let taken = self.results.results_for(student_id, exam_id).await?.len();
        let taken = u32::try_from(taken).unwrap_or(u32::MAX);
        if let Some(max) = self.max_attempts {
            if taken >= max {
                return Err(ExamSessionError::RetakeLimitReached { max });
            }
        }
        Ok(taken.saturating_add(1))
    }

    /// Results of a student for an exam, oldest attempt first.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Storage` if repository access fails.
    pub async fn history(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> Result<Vec<ExamResult>, ExamSessionError> {
        Ok(self.results.results_for(student_id, exam_id).await?)
    }

    /// # Errors
    ///
    /// Returns `ExamSessionError::Storage` if repository access fails.
    pub async fn best_result(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> Result<Option<ExamResult>, ExamSessionError> {
        let history = self.history(student_id, exam_id).await?;
        Ok(best_result(&history).cloned())
    }

    /// Exams of modules the student has reached in `subject_id`, in module order.
    ///
    /// # Errors
    ///
    /// Returns `ExamSessionError::Progress` or `ExamSessionError::Storage` if
    /// repository access fails.
    pub async fn available_exams(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<Vec<Exam>, ExamSessionError> {
        let Some(sequence) = self.progress.sequence(student_id, subject_id).await? else {
            return Ok(Vec::new());
        };

        let mut exams = Vec::new();
        for module in sequence.outline().modules() {
            if !sequence.is_module_reachable(module.module.id) {
                continue;
            }
            if let Some(exam) = self.exams.exam_for_module(module.module.id).await? {
                exams.push(exam);
            }
        }
        Ok(exams)
    }
}
