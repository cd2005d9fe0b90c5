use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use course_core::model::{
    ChapterId, ChapterProgress, CourseOutline, StudentId, SubjectId, SubjectProgress,
};
use course_core::sequencer::CourseSequence;
use futures::stream::{FuturesUnordered, StreamExt};
use storage::repository::{CourseRepository, ProgressRepository, StorageError};

use crate::Clock;
use crate::error::ProgressError;
use crate::invalidation::{CacheKey, InvalidationBus};

/// Chapter completion writes and derived subject progress reads.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    progress: Arc<dyn ProgressRepository>,
    courses: Arc<dyn CourseRepository>,
    bus: InvalidationBus,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        progress: Arc<dyn ProgressRepository>,
        courses: Arc<dyn CourseRepository>,
        bus: InvalidationBus,
    ) -> Self {
        Self {
            clock,
            progress,
            courses,
            bus,
        }
    }

    /// Mark `chapter_id` completed for `student_id`.
    ///
    /// Returns true only for the first completion; later calls leave the
    /// stored record and the invalidation bus untouched.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::UnknownChapter` if the chapter belongs to no subject.
    /// Returns `ProgressError::Storage` if repository access fails.
    pub async fn complete_chapter(
        &self,
        student_id: StudentId,
        chapter_id: ChapterId,
    ) -> Result<bool, ProgressError> {
        let subject_id = self
            .courses
            .subject_of_chapter(chapter_id)
            .await?
            .ok_or(ProgressError::UnknownChapter(chapter_id))?;

        let record = ChapterProgress::completed(student_id, chapter_id, self.clock.now());
        let inserted = self.progress.complete_chapter(&record).await?;
        if !inserted {
            tracing::debug!(%student_id, %chapter_id, "chapter already completed");
            return Ok(false);
        }

        tracing::info!(%student_id, %chapter_id, %subject_id, "chapter completed");
        self.bus.publish([
            CacheKey::SubjectProgress {
                student_id,
                subject_id,
            },
            CacheKey::SubjectProgressList { student_id },
        ]);
        Ok(true)
    }

    /// Derived progress of one student in one subject, recomputed from the
    /// currently published chapters.
    ///
    /// Missing data (unknown subject, no records) reads as zero progress.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` for failures other than `NotFound`.
    pub async fn get_subject_progress(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<SubjectProgress, ProgressError> {
        match self.load(student_id, subject_id).await? {
            Some((_, progress)) => Ok(progress),
            None => Ok(SubjectProgress::empty(student_id, subject_id, 0)),
        }
    }

    /// Fan out `get_subject_progress` over several subjects.
    ///
    /// Subjects whose read fails are left out of the map and logged.
    pub async fn get_multiple_subjects_progress(
        &self,
        student_id: StudentId,
        subject_ids: &[SubjectId],
    ) -> BTreeMap<SubjectId, SubjectProgress> {
        let unique: BTreeSet<SubjectId> = subject_ids.iter().copied().collect();
        let mut pending: FuturesUnordered<_> = unique
            .into_iter()
            .map(|subject_id| async move {
                (
                    subject_id,
                    self.get_subject_progress(student_id, subject_id).await,
                )
            })
            .collect();

        let mut out = BTreeMap::new();
        while let Some((subject_id, result)) = pending.next().await {
            match result {
                Ok(progress) => {
                    out.insert(subject_id, progress);
                }
                Err(e) => {
                    tracing::warn!(%student_id, %subject_id, error = %e, "subject progress unavailable");
                }
            }
        }
        out
    }

    /// Sequence over the subject's published chapters for `student_id`, or
    /// `None` when the subject does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Storage` for failures other than `NotFound`.
    pub async fn sequence(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<Option<CourseSequence>, ProgressError> {
        Ok(self
            .load(student_id, subject_id)
            .await?
            .map(|(outline, progress)| CourseSequence::from_progress(&outline, &progress)))
    }

    async fn load(
        &self,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<Option<(CourseOutline, SubjectProgress)>, ProgressError> {
        let outline = match self.courses.outline(subject_id).await {
            Ok(Some(outline)) => outline,
            Ok(None) | Err(StorageError::NotFound) => {
                tracing::debug!(%subject_id, "subject not found; reporting zero progress");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let chapter_ids: Vec<ChapterId> = outline.published().chapters().map(|c| c.id).collect();
        let records = match self.progress.completions(student_id, &chapter_ids).await {
            Ok(records) => records,
            Err(StorageError::NotFound) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let progress = SubjectProgress::derive(student_id, &outline, &records);
        Ok(Some((outline, progress)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::{Chapter, ContentKind, Module, ModuleId, Subject};
    use course_core::time::fixed_now;
    use storage::repository::InMemoryRepository;

    async fn seeded(chapters: u64) -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_subject(&Subject::new(SubjectId::new(1), "History").unwrap())
            .await
            .unwrap();
        repo.upsert_module(&Module {
            id: ModuleId::new(1),
            subject_id: SubjectId::new(1),
            title: "Antiquity".into(),
            position: 1,
            published: true,
        })
        .await
        .unwrap();
        for n in 1..=chapters {
            repo.upsert_chapter(&Chapter {
                id: ChapterId::new(n),
                module_id: ModuleId::new(1),
                title: format!("Chapter {n}"),
                position: u32::try_from(n).unwrap(),
                content: ContentKind::Content,
                published: true,
            })
            .await
            .unwrap();
        }
        repo
    }

    fn service(repo: &InMemoryRepository, bus: InvalidationBus) -> ProgressService {
        ProgressService::new(
            Clock::Fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            bus,
        )
    }

    #[tokio::test]
    async fn repeated_completion_is_a_silent_no_op() {
        let repo = seeded(4).await;
        let bus = InvalidationBus::default();
        let mut rx = bus.subscribe();
        let service = service(&repo, bus);
        let student = StudentId::new(9);

        assert!(service.complete_chapter(student, ChapterId::new(2)).await.unwrap());
        let once = service
            .get_subject_progress(student, SubjectId::new(1))
            .await
            .unwrap();
        assert!(!service.complete_chapter(student, ChapterId::new(2)).await.unwrap());
        let twice = service
            .get_subject_progress(student, SubjectId::new(1))
            .await
            .unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.completed_chapters(), 1);
        assert_eq!(twice.percentage(), 25);

        // only the first completion invalidates
        assert!(rx.recv().await.is_ok());
        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unknown_subject_reads_as_zero_progress() {
        let repo = InMemoryRepository::new();
        let service = service(&repo, InvalidationBus::default());
        let progress = service
            .get_subject_progress(StudentId::new(1), SubjectId::new(77))
            .await
            .unwrap();
        assert_eq!(progress.percentage(), 0);
        assert!(!progress.has_progress());
        assert!(
            service
                .sequence(StudentId::new(1), SubjectId::new(77))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn unknown_chapter_is_rejected() {
        let repo = seeded(1).await;
        let service = service(&repo, InvalidationBus::default());
        let err = service
            .complete_chapter(StudentId::new(1), ChapterId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::UnknownChapter(_)));
    }

    #[tokio::test]
    async fn percentage_follows_publishing_changes() {
        let repo = seeded(4).await;
        let service = service(&repo, InvalidationBus::default());
        let student = StudentId::new(1);
        service.complete_chapter(student, ChapterId::new(1)).await.unwrap();
        service.complete_chapter(student, ChapterId::new(4)).await.unwrap();

        let before = service
            .get_subject_progress(student, SubjectId::new(1))
            .await
            .unwrap();
        assert_eq!(before.percentage(), 50);

        repo.upsert_chapter(&Chapter {
            id: ChapterId::new(4),
            module_id: ModuleId::new(1),
            title: "Chapter 4".into(),
            position: 4,
            content: ContentKind::Content,
            published: false,
        })
        .await
        .unwrap();

        let after = service
            .get_subject_progress(student, SubjectId::new(1))
            .await
            .unwrap();
        assert_eq!(after.total_chapters(), 3);
        assert_eq!(after.percentage(), 33);
    }
}
