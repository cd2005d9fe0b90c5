use std::sync::Arc;

use course_core::grading::{GradingEngine, PassingPolicy};
use course_core::model::{StudentId, SubjectId};
use storage::repository::Storage;

use crate::Clock;
use crate::config::AppConfig;
use crate::error::{AppServicesError, PlayerError};
use crate::exam_authoring_service::ExamAuthoringService;
use crate::exam_service::ExamService;
use crate::invalidation::InvalidationBus;
use crate::player::CoursePlayer;
use crate::progress_service::ProgressService;

/// Assembles app-facing services over one storage backend and one
/// invalidation bus.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    bus: InvalidationBus,
    authoring: Arc<ExamAuthoringService>,
    exams: Arc<ExamService>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: &AppConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        Ok(Self::with_storage(
            storage,
            clock,
            config.passing_policy,
            config.max_attempts,
        ))
    }

    #[must_use]
    pub fn with_storage(
        storage: Storage,
        clock: Clock,
        policy: PassingPolicy,
        max_attempts: Option<u32>,
    ) -> Self {
        let bus = InvalidationBus::default();
        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.progress),
            Arc::clone(&storage.courses),
            bus.clone(),
        ));
        let authoring = Arc::new(ExamAuthoringService::new(
            clock,
            Arc::clone(&storage.exams),
            bus.clone(),
        ));
        let exams = Arc::new(
            ExamService::new(
                clock,
                GradingEngine::new(policy),
                Arc::clone(&storage.exams),
                Arc::clone(&storage.results),
                Arc::clone(&progress),
                bus.clone(),
            )
            .with_max_attempts(max_attempts),
        );

        Self {
            storage,
            bus,
            authoring,
            exams,
            progress,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn bus(&self) -> &InvalidationBus {
        &self.bus
    }

    #[must_use]
    pub fn authoring(&self) -> Arc<ExamAuthoringService> {
        Arc::clone(&self.authoring)
    }

    #[must_use]
    pub fn exams(&self) -> Arc<ExamService> {
        Arc::clone(&self.exams)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    /// Open the course player of `student_id` in `subject_id`.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError` if the subject is unknown or progress cannot be read.
    pub async fn player(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<CoursePlayer, PlayerError> {
        CoursePlayer::open(self.progress(), student_id, subject_id).await
    }
}
