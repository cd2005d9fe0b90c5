pub mod course;
pub(crate) mod exam;
mod exam_draft;
mod ids;
mod progress;
mod result;
mod submission;

pub use course::{
    Chapter, ContentKind, CourseError, CourseOutline, Module, ModuleOutline, Subject,
};
pub use exam::{AnswerOption, Exam, ExamError, FALSE_LABEL, Question, QuestionKind, TRUE_LABEL};
pub use exam_draft::{
    AnswerChoices, DEFAULT_CHOICE_COUNT, DraftOption, ExamDraft, ExamDraftError, MAX_OPTIONS,
    MIN_OPTIONS, QuestionDraft, ValidatedExam, ValidatedQuestion,
};
pub use ids::{
    ChapterId, ExamId, ModuleId, OptionId, ParseIdError, QuestionId, ResultId, StudentId,
    SubjectId,
};
pub use progress::{ChapterProgress, SubjectProgress, completion_percentage};
pub use result::{ExamResult, GradeOutcome, GradedAttempt, ResultError, best_result};
pub use submission::{Answer, Submission};
