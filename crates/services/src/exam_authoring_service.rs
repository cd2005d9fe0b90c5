use std::sync::Arc;

use course_core::model::{Exam, ExamDraft, ExamId, ModuleId};
use storage::repository::{ExamRepository, StorageError};

use crate::Clock;
use crate::error::ExamAuthoringError;
use crate::invalidation::{CacheKey, InvalidationBus};

/// Whether a save creates a module's exam or rewrites an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthoringMode {
    Create { module_id: ModuleId },
    Edit { exam_id: ExamId },
}

/// Gates exam drafts through validation before they reach the exam store.
#[derive(Clone)]
pub struct ExamAuthoringService {
    clock: Clock,
    exams: Arc<dyn ExamRepository>,
    bus: InvalidationBus,
}

impl ExamAuthoringService {
    #[must_use]
    pub fn new(clock: Clock, exams: Arc<dyn ExamRepository>, bus: InvalidationBus) -> Self {
        Self { clock, exams, bus }
    }

    /// Draft to start editing from: blank when creating, seeded from the
    /// persisted exam when editing.
    ///
    /// # Errors
    ///
    /// Returns `ExamAuthoringError::ExamNotFound` when editing a missing exam.
    /// Returns `ExamAuthoringError::Storage` if repository access fails.
    pub async fn open_draft(&self, mode: AuthoringMode) -> Result<ExamDraft, ExamAuthoringError> {
        match mode {
            AuthoringMode::Create { .. } => Ok(ExamDraft::default()),
            AuthoringMode::Edit { exam_id } => {
                let exam = self
                    .exams
                    .get_exam(exam_id)
                    .await?
                    .ok_or(ExamAuthoringError::ExamNotFound(exam_id))?;
                Ok(ExamDraft::from_exam(&exam))
            }
        }
    }

    /// Validate and persist a draft.
    ///
    /// The draft is left untouched so the author can correct it after a
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns `ExamAuthoringError::Draft` if the draft is invalid; storage is
    /// not contacted in that case.
    /// Returns `ExamAuthoringError::DuplicateExam` if the module already has an exam.
    /// Returns `ExamAuthoringError::ExamNotFound` when editing a missing exam.
    /// Returns `ExamAuthoringError::Storage` for other repository failures.
    pub async fn save(
        &self,
        mode: AuthoringMode,
        draft: &ExamDraft,
    ) -> Result<Exam, ExamAuthoringError> {
        let validated = draft.validate()?;
        let now = self.clock.now();

        let exam = match mode {
            AuthoringMode::Create { module_id } => self
                .exams
                .create_exam(module_id, &validated, now)
                .await
                .map_err(|e| match e {
                    StorageError::Conflict => {
                        tracing::info!(%module_id, "rejected second exam for module");
                        ExamAuthoringError::DuplicateExam { module_id }
                    }
                    other => other.into(),
                })?,
            AuthoringMode::Edit { exam_id } => self
                .exams
                .update_exam(exam_id, &validated, now)
                .await
                .map_err(|e| match e {
                    StorageError::NotFound => ExamAuthoringError::ExamNotFound(exam_id),
                    other => other.into(),
                })?,
        };

        tracing::info!(
            exam_id = %exam.id(),
            module_id = %exam.module_id(),
            questions = exam.question_count(),
            "exam saved"
        );
        self.bus.publish([CacheKey::ExamForModule {
            module_id: exam.module_id(),
        }]);
        Ok(exam)
    }

    /// Delete an exam and its result history.
    ///
    /// # Errors
    ///
    /// Returns `ExamAuthoringError::ExamNotFound` if the exam does not exist.
    /// Returns `ExamAuthoringError::Storage` if repository access fails.
    pub async fn delete_exam(&self, exam_id: ExamId) -> Result<(), ExamAuthoringError> {
        let exam = self
            .exams
            .get_exam(exam_id)
            .await?
            .ok_or(ExamAuthoringError::ExamNotFound(exam_id))?;
        self.exams.delete_exam(exam_id).await.map_err(|e| match e {
            StorageError::NotFound => ExamAuthoringError::ExamNotFound(exam_id),
            other => other.into(),
        })?;

        tracing::info!(%exam_id, "exam deleted");
        self.bus.publish([
            CacheKey::ExamForModule {
                module_id: exam.module_id(),
            },
            CacheKey::AllExamResults { exam_id },
        ]);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `ExamAuthoringError::Storage` if repository access fails.
    pub async fn exam_for_module(
        &self,
        module_id: ModuleId,
    ) -> Result<Option<Exam>, ExamAuthoringError> {
        Ok(self.exams.exam_for_module(module_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use course_core::model::{ExamDraftError, QuestionDraft, QuestionKind, ValidatedExam};
    use course_core::time::fixed_now;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::InMemoryRepository;

    fn service(repo: InMemoryRepository) -> ExamAuthoringService {
        ExamAuthoringService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(repo),
            InvalidationBus::default(),
        )
    }

    fn valid_draft(title: &str) -> ExamDraft {
        let mut draft = ExamDraft::new(title);
        let mut q = QuestionDraft::new(QuestionKind::TrueFalse);
        q.set_text("Rust has a borrow checker");
        q.mark_correct(0);
        draft.push_question(q);
        draft
    }

    /// Counts calls so tests can prove storage was never reached.
    #[derive(Default)]
    struct CountingExams {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ExamRepository for CountingExams {
        async fn create_exam(
            &self,
            _: ModuleId,
            _: &ValidatedExam,
            _: DateTime<Utc>,
        ) -> Result<Exam, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Connection("offline".into()))
        }

        async fn update_exam(
            &self,
            _: ExamId,
            _: &ValidatedExam,
            _: DateTime<Utc>,
        ) -> Result<Exam, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(StorageError::Connection("offline".into()))
        }

        async fn get_exam(&self, _: ExamId) -> Result<Option<Exam>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn exam_for_module(&self, _: ModuleId) -> Result<Option<Exam>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn delete_exam(&self, _: ExamId) -> Result<(), StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn invalid_draft_never_reaches_storage() {
        let exams = Arc::new(CountingExams::default());
        let service = ExamAuthoringService::new(
            Clock::Fixed(fixed_now()),
            Arc::clone(&exams) as Arc<dyn ExamRepository>,
            InvalidationBus::default(),
        );

        let err = service
            .save(
                AuthoringMode::Create {
                    module_id: ModuleId::new(1),
                },
                &ExamDraft::new("   "),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExamAuthoringError::Draft(ExamDraftError::EmptyTitle)
        ));
        assert_eq!(exams.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transient_failure_is_surfaced_as_storage_error() {
        let service = ExamAuthoringService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(CountingExams::default()),
            InvalidationBus::default(),
        );
        let err = service
            .save(
                AuthoringMode::Create {
                    module_id: ModuleId::new(1),
                },
                &valid_draft("Quiz"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ExamAuthoringError::Storage(StorageError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn second_exam_for_module_is_a_domain_conflict() {
        let service = service(InMemoryRepository::new());
        let create = AuthoringMode::Create {
            module_id: ModuleId::new(4),
        };
        let exam = service.save(create, &valid_draft(" Quiz ")).await.unwrap();
        assert_eq!(exam.title(), "Quiz");

        let draft = valid_draft("Another");
        let err = service.save(create, &draft).await.unwrap_err();
        assert!(matches!(
            err,
            ExamAuthoringError::DuplicateExam { module_id } if module_id == ModuleId::new(4)
        ));
        assert_eq!(draft.title(), "Another");
    }

    #[tokio::test]
    async fn edit_round_trips_through_draft() {
        let service = service(InMemoryRepository::new());
        let exam = service
            .save(
                AuthoringMode::Create {
                    module_id: ModuleId::new(1),
                },
                &valid_draft("Quiz"),
            )
            .await
            .unwrap();

        let edit = AuthoringMode::Edit { exam_id: exam.id() };
        let mut draft = service.open_draft(edit).await.unwrap();
        assert_eq!(draft.title(), "Quiz");
        let index = draft.add_question(QuestionKind::MultipleChoice);
        let question = draft.question_mut(index).unwrap();
        question.set_text("Pick one");
        for i in 0..question.option_count() {
            question.set_option_text(i, format!("choice {i}"));
        }
        question.mark_correct(2);

        let updated = service.save(edit, &draft).await.unwrap();
        assert_eq!(updated.id(), exam.id());
        assert_eq!(updated.question_count(), 2);
        assert!(updated.questions()[1].options[2].is_correct);
    }

    #[tokio::test]
    async fn delete_publishes_invalidations() {
        let repo = InMemoryRepository::new();
        let bus = InvalidationBus::default();
        let mut rx = bus.subscribe();
        let service = ExamAuthoringService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(repo),
            bus,
        );
        let exam = service
            .save(
                AuthoringMode::Create {
                    module_id: ModuleId::new(2),
                },
                &valid_draft("Quiz"),
            )
            .await
            .unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            CacheKey::ExamForModule {
                module_id: ModuleId::new(2)
            }
        );

        service.delete_exam(exam.id()).await.unwrap();
        assert_eq!(
            rx.recv().await.unwrap(),
            CacheKey::ExamForModule {
                module_id: ModuleId::new(2)
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            CacheKey::AllExamResults { exam_id: exam.id() }
        );
        assert!(
            service
                .exam_for_module(ModuleId::new(2))
                .await
                .unwrap()
                .is_none()
        );
        assert!(matches!(
            service.delete_exam(exam.id()).await.unwrap_err(),
            ExamAuthoringError::ExamNotFound(_)
        ));
    }
}
