use thiserror::Error;

use crate::grading::GradingError;
use crate::model::{CourseError, ExamDraftError, ExamError, ResultError};

/// Any domain rule violation raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Draft(#[from] ExamDraftError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Result(#[from] ResultError),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Grading(#[from] GradingError),
}
