//! Shared error types for the services crate.

use thiserror::Error;

use course_core::grading::GradingError;
use course_core::model::{ChapterId, ExamDraftError, ExamId, ModuleId, QuestionId, SubjectId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `ExamAuthoringService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamAuthoringError {
    /// The draft failed validation; nothing was sent to storage.
    #[error(transparent)]
    Draft(#[from] ExamDraftError),
    #[error("module {module_id} already has an exam")]
    DuplicateExam { module_id: ModuleId },
    #[error("exam {0} not found")]
    ExamNotFound(ExamId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while taking and submitting an exam.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExamSessionError {
    #[error("module {0} has no exam")]
    NoExam(ModuleId),
    #[error("{} question(s) left unanswered", .missing.len())]
    Incomplete { missing: Vec<QuestionId> },
    #[error("attempt already submitted")]
    AlreadySubmitted,
    #[error("retake limit of {max} attempt(s) reached")]
    RetakeLimitReached { max: u32 },
    #[error(transparent)]
    Grading(#[from] GradingError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `ProgressService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("chapter {0} is not part of any subject")]
    UnknownChapter(ChapterId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ProgressError {
    /// Whether the user may simply retry the action.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, ProgressError::Storage(e) if e.is_transient())
    }
}

/// Errors emitted by `CoursePlayer`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlayerError {
    #[error("subject {0} not found")]
    UnknownSubject(SubjectId),
    #[error("chapter {0} is not published in this course")]
    ChapterNotInCourse(ChapterId),
    #[error(transparent)]
    Progress(#[from] ProgressError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
