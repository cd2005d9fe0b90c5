use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    AnswerOption, Chapter, ChapterId, ChapterProgress, CourseOutline, Exam, ExamId, ExamResult,
    GradedAttempt, Module, ModuleId, OptionId, Question, QuestionId, ResultId, StudentId, Subject,
    SubjectId, ValidatedExam,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// Failures worth retrying by the user: the request never reached a
    /// decision.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Connection(_))
    }
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

/// Exam store. Holds at most one exam per module.
#[async_trait]
pub trait ExamRepository: Send + Sync {
    /// Persist a new exam for `module_id`, assigning exam, question and option ids.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the module already has an exam.
    async fn create_exam(
        &self,
        module_id: ModuleId,
        exam: &ValidatedExam,
        now: DateTime<Utc>,
    ) -> Result<Exam, StorageError>;

    /// Replace title and questions of an existing exam.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam does not exist.
    async fn update_exam(
        &self,
        id: ExamId,
        exam: &ValidatedExam,
        now: DateTime<Utc>,
    ) -> Result<Exam, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn exam_for_module(&self, module_id: ModuleId) -> Result<Option<Exam>, StorageError>;

    /// Delete an exam together with its result history.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the exam does not exist.
    async fn delete_exam(&self, id: ExamId) -> Result<(), StorageError>;
}

/// Append-only store of graded submissions.
#[async_trait]
pub trait ResultRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the attempt number is already taken.
    async fn append_result(&self, attempt: &GradedAttempt) -> Result<ExamResult, StorageError>;

    /// Results of one student for one exam, oldest attempt first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn results_for(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> Result<Vec<ExamResult>, StorageError>;
}

/// Chapter completion records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Record a completion. Returns false, leaving the stored record untouched,
    /// when the chapter was already completed by that student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn complete_chapter(&self, record: &ChapterProgress) -> Result<bool, StorageError>;

    /// Completion records of `student_id` among `chapters`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn completions(
        &self,
        student_id: StudentId,
        chapters: &[ChapterId],
    ) -> Result<Vec<ChapterProgress>, StorageError>;
}

/// Content structure provider.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError>;

    /// Full outline (published or not) of a subject, `None` for unknown subjects.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn outline(&self, subject_id: SubjectId) -> Result<Option<CourseOutline>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on adapter failures.
    async fn subject_of_chapter(
        &self,
        chapter_id: ChapterId,
    ) -> Result<Option<SubjectId>, StorageError>;

}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct ExamTable {
    exams: HashMap<ExamId, Exam>,
    next_exam: u64,
    next_question: u64,
    next_option: u64,
}

impl ExamTable {
    fn build(
        &mut self,
        id: ExamId,
        module_id: ModuleId,
        exam: &ValidatedExam,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Exam, StorageError> {
        let mut questions = Vec::with_capacity(exam.questions.len());
        for question in &exam.questions {
            self.next_question += 1;
            let question_id = QuestionId::new(self.next_question);
            let mut options = Vec::with_capacity(question.options.len());
            for (text, is_correct) in question.flagged_options() {
                self.next_option += 1;
                options.push(AnswerOption {
                    id: OptionId::new(self.next_option),
                    text: text.to_owned(),
                    is_correct,
                });
            }
            questions.push(Question {
                id: question_id,
                text: question.text.clone(),
                kind: question.kind,
                options,
            });
        }
        Exam::from_persisted(id, module_id, exam.title.clone(), questions, created_at, updated_at)
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}

#[derive(Default)]
struct ResultTable {
    results: Vec<ExamResult>,
    next_result: u64,
}

#[derive(Default)]
struct CourseTable {
    subjects: HashMap<SubjectId, Subject>,
    modules: HashMap<ModuleId, Module>,
    chapters: HashMap<ChapterId, Chapter>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    exams: Arc<Mutex<ExamTable>>,
    results: Arc<Mutex<ResultTable>>,
    progress: Arc<Mutex<HashMap<(StudentId, ChapterId), ChapterProgress>>>,
    courses: Arc<Mutex<CourseTable>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExamRepository for InMemoryRepository {
    async fn create_exam(
        &self,
        module_id: ModuleId,
        exam: &ValidatedExam,
        now: DateTime<Utc>,
    ) -> Result<Exam, StorageError> {
        let mut guard = lock(&self.exams)?;
        if guard.exams.values().any(|e| e.module_id() == module_id) {
            return Err(StorageError::Conflict);
        }
        guard.next_exam += 1;
        let id = ExamId::new(guard.next_exam);
        let created = guard.build(id, module_id, exam, now, now)?;
        guard.exams.insert(id, created.clone());
        Ok(created)
    }

    async fn update_exam(
        &self,
        id: ExamId,
        exam: &ValidatedExam,
        now: DateTime<Utc>,
    ) -> Result<Exam, StorageError> {
        let mut guard = lock(&self.exams)?;
        let existing = guard.exams.get(&id).ok_or(StorageError::NotFound)?;
        let (module_id, created_at) = (existing.module_id(), existing.created_at());
        let updated = guard.build(id, module_id, exam, created_at, now)?;
        guard.exams.insert(id, updated.clone());
        Ok(updated)
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError> {
        Ok(lock(&self.exams)?.exams.get(&id).cloned())
    }

    async fn exam_for_module(&self, module_id: ModuleId) -> Result<Option<Exam>, StorageError> {
        Ok(lock(&self.exams)?
            .exams
            .values()
            .find(|e| e.module_id() == module_id)
            .cloned())
    }

    async fn delete_exam(&self, id: ExamId) -> Result<(), StorageError> {
        lock(&self.exams)?
            .exams
            .remove(&id)
            .ok_or(StorageError::NotFound)?;
        lock(&self.results)?
            .results
            .retain(|r| r.exam_id() != id);
        Ok(())
    }
}

#[async_trait]
impl ResultRepository for InMemoryRepository {
    async fn append_result(&self, attempt: &GradedAttempt) -> Result<ExamResult, StorageError> {
        let mut guard = lock(&self.results)?;
        let taken = guard.results.iter().any(|r| {
            r.student_id() == attempt.student_id
                && r.exam_id() == attempt.exam_id
                && r.attempt() == attempt.attempt
        });
        if taken {
            return Err(StorageError::Conflict);
        }
        guard.next_result += 1;
        let id = ResultId::new(guard.next_result);
        let result = attempt.clone().assign_id(id);
        guard.results.push(result.clone());
        Ok(result)
    }

    async fn results_for(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> Result<Vec<ExamResult>, StorageError> {
        let guard = lock(&self.results)?;
        let mut results: Vec<ExamResult> = guard
            .results
            .iter()
            .filter(|r| r.student_id() == student_id && r.exam_id() == exam_id)
            .cloned()
            .collect();
        results.sort_by_key(ExamResult::attempt);
        Ok(results)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn complete_chapter(&self, record: &ChapterProgress) -> Result<bool, StorageError> {
        let mut guard = lock(&self.progress)?;
        let key = (record.student_id, record.chapter_id);
        if guard.contains_key(&key) {
            return Ok(false);
        }
        guard.insert(key, record.clone());
        Ok(true)
    }

    async fn completions(
        &self,
        student_id: StudentId,
        chapters: &[ChapterId],
    ) -> Result<Vec<ChapterProgress>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(chapters
            .iter()
            .filter_map(|chapter| guard.get(&(student_id, *chapter)).cloned())
            .collect())
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        lock(&self.courses)?
            .subjects
            .insert(subject.id, subject.clone());
        Ok(())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        let mut guard = lock(&self.courses)?;
        if !guard.subjects.contains_key(&module.subject_id) {
            return Err(StorageError::NotFound);
        }
        guard.modules.insert(module.id, module.clone());
        Ok(())
    }

    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        let mut guard = lock(&self.courses)?;
        if !guard.modules.contains_key(&chapter.module_id) {
            return Err(StorageError::NotFound);
        }
        guard.chapters.insert(chapter.id, chapter.clone());
        Ok(())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let guard = lock(&self.courses)?;
        let mut subjects: Vec<Subject> = guard.subjects.values().cloned().collect();
        subjects.sort_by_key(|s| s.id);
        Ok(subjects)
    }

    async fn outline(&self, subject_id: SubjectId) -> Result<Option<CourseOutline>, StorageError> {
        let guard = lock(&self.courses)?;
        if !guard.subjects.contains_key(&subject_id) {
            return Ok(None);
        }
        let modules: Vec<Module> = guard
            .modules
            .values()
            .filter(|m| m.subject_id == subject_id)
            .cloned()
            .collect();
        let chapters = guard
            .chapters
            .values()
            .filter(|c| modules.iter().any(|m| m.id == c.module_id))
            .cloned()
            .collect();
        Ok(Some(CourseOutline::new(subject_id, modules, chapters)))
    }

    async fn subject_of_chapter(
        &self,
        chapter_id: ChapterId,
    ) -> Result<Option<SubjectId>, StorageError> {
        let guard = lock(&self.courses)?;
        Ok(guard
            .chapters
            .get(&chapter_id)
            .and_then(|c| guard.modules.get(&c.module_id))
            .map(|m| m.subject_id))
    }
}

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub exams: Arc<dyn ExamRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub courses: Arc<dyn CourseRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            exams: Arc::new(repo.clone()),
            results: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            courses: Arc::new(repo),
        }
    }
}
