use std::collections::BTreeSet;
use std::sync::Arc;

use course_core::model::{Chapter, ChapterId, ModuleId, StudentId, SubjectId};
use course_core::sequencer::{ChapterState, CourseSequence};

use crate::error::PlayerError;
use crate::progress_service::ProgressService;

/// Content viewer state for one student in one subject.
///
/// Local completion state only changes after the progress store has
/// acknowledged the write.
pub struct CoursePlayer {
    student_id: StudentId,
    subject_id: SubjectId,
    progress: Arc<ProgressService>,
    sequence: CourseSequence,
    selected: Option<ChapterId>,
    expanded: BTreeSet<ModuleId>,
}

impl CoursePlayer {
    /// Load the sequence and select the current chapter, or the first one
    /// when everything is completed.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::UnknownSubject` if the subject does not exist.
    /// Returns `PlayerError::Progress` if repository access fails.
    pub async fn open(
        progress: Arc<ProgressService>,
        student_id: StudentId,
        subject_id: SubjectId,
    ) -> Result<Self, PlayerError> {
        let sequence = progress
            .sequence(student_id, subject_id)
            .await?
            .ok_or(PlayerError::UnknownSubject(subject_id))?;

        let mut player = Self {
            student_id,
            subject_id,
            progress,
            selected: None,
            expanded: BTreeSet::new(),
            sequence,
        };
        let start = player.sequence.current().or(player.sequence.first());
        if let Some(chapter) = start {
            player.show(chapter);
        }
        Ok(player)
    }

    fn show(&mut self, chapter_id: ChapterId) {
        self.selected = Some(chapter_id);
        if let Some(module_id) = self.sequence.module_of(chapter_id) {
            self.expanded.insert(module_id);
        }
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn sequence(&self) -> &CourseSequence {
        &self.sequence
    }

    #[must_use]
    pub fn selected(&self) -> Option<ChapterId> {
        self.selected
    }

    #[must_use]
    pub fn selected_chapter(&self) -> Option<&Chapter> {
        self.selected
            .and_then(|id| self.sequence.outline().chapter(id))
    }

    #[must_use]
    pub fn state_of(&self, chapter_id: ChapterId) -> ChapterState {
        self.sequence.state_of(chapter_id)
    }

    #[must_use]
    pub fn is_expanded(&self, module_id: ModuleId) -> bool {
        self.expanded.contains(&module_id)
    }

    /// Flip a module's expanded state. Returns the new state.
    pub fn toggle_module(&mut self, module_id: ModuleId) -> bool {
        if self.expanded.remove(&module_id) {
            false
        } else {
            self.expanded.insert(module_id);
            true
        }
    }

    /// Open any published chapter directly.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::ChapterNotInCourse` for chapters outside the
    /// published sequence.
    pub fn select(&mut self, chapter_id: ChapterId) -> Result<(), PlayerError> {
        if self.sequence.state_of(chapter_id) == ChapterState::Locked {
            return Err(PlayerError::ChapterNotInCourse(chapter_id));
        }
        self.show(chapter_id);
        Ok(())
    }

    /// Complete the selected chapter if needed, then move to the next one.
    ///
    /// Returns the newly selected chapter, or `None` when the selection stays
    /// on the last chapter.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Progress` if the completion cannot be stored; the
    /// selection is left unchanged.
    pub async fn next(&mut self) -> Result<Option<ChapterId>, PlayerError> {
        let Some(selected) = self.selected else {
            return Ok(None);
        };

        if !self.sequence.is_completed(selected) {
            self.progress
                .complete_chapter(self.student_id, selected)
                .await?;
            self.sequence.mark_completed(selected);
        }

        let next = self.sequence.next_after(selected);
        if let Some(chapter_id) = next {
            self.show(chapter_id);
        }
        Ok(next)
    }

    /// Natural end of the selected content; same protocol as `next`.
    ///
    /// # Errors
    ///
    /// Returns `PlayerError::Progress` if the completion cannot be stored.
    pub async fn on_content_finished(&mut self) -> Result<Option<ChapterId>, PlayerError> {
        tracing::debug!(
            student_id = %self.student_id,
            chapter_id = ?self.selected,
            "content finished; auto-advancing"
        );
        self.next().await
    }

    /// Move back one chapter without touching progress.
    pub fn previous(&mut self) -> Option<ChapterId> {
        let previous = self
            .selected
            .and_then(|selected| self.sequence.previous_before(selected));
        if let Some(chapter_id) = previous {
            self.show(chapter_id);
        }
        previous
    }

    /// Whether the exam of `module_id` may be offered to the student.
    #[must_use]
    pub fn exam_available(&self, module_id: ModuleId) -> bool {
        self.sequence.is_module_reachable(module_id)
    }
}
