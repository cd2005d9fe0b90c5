use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::course::CourseOutline;
use crate::model::ids::{ChapterId, StudentId, SubjectId};

/// Completion record of one chapter for one student.
///
/// Records exist only once a chapter has been completed and are never
/// flipped back to incomplete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterProgress {
    pub student_id: StudentId,
    pub chapter_id: ChapterId,
    pub completed: bool,
    pub completed_at: DateTime<Utc>,
}

impl ChapterProgress {
    #[must_use]
    pub fn completed(student_id: StudentId, chapter_id: ChapterId, at: DateTime<Utc>) -> Self {
        Self {
            student_id,
            chapter_id,
            completed: true,
            completed_at: at,
        }
    }
}

/// `floor(completed / total * 100)`, or 0 when there is nothing to complete.
#[must_use]
pub fn completion_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = completed.min(total) * 100 / total;
    u8::try_from(pct).unwrap_or(100)
}

/// Derived completion metric for a (student, subject) pair. Always computed
/// from the subject's currently published chapters, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProgress {
    student_id: StudentId,
    subject_id: SubjectId,
    total_chapters: usize,
    completed_chapter_ids: BTreeSet<ChapterId>,
    percentage: u8,
    last_activity: Option<DateTime<Utc>>,
}

impl SubjectProgress {
    /// The "no progress yet" value.
    #[must_use]
    pub fn empty(student_id: StudentId, subject_id: SubjectId, total_chapters: usize) -> Self {
        Self {
            student_id,
            subject_id,
            total_chapters,
            completed_chapter_ids: BTreeSet::new(),
            percentage: 0,
            last_activity: None,
        }
    }

    /// Intersect the student's completion records with the published chapters
    /// of `outline`.
    #[must_use]
    pub fn derive(student_id: StudentId, outline: &CourseOutline, records: &[ChapterProgress]) -> Self {
        let published = outline.published();
        let visible: BTreeSet<ChapterId> = published.chapters().map(|c| c.id).collect();

        let counted: Vec<&ChapterProgress> = records
            .iter()
            .filter(|r| r.student_id == student_id && r.completed && visible.contains(&r.chapter_id))
            .collect();

        let completed_chapter_ids: BTreeSet<ChapterId> =
            counted.iter().map(|r| r.chapter_id).collect();
        let last_activity = counted.iter().map(|r| r.completed_at).max();

        Self {
            student_id,
            subject_id: outline.subject_id(),
            total_chapters: visible.len(),
            percentage: completion_percentage(completed_chapter_ids.len(), visible.len()),
            completed_chapter_ids,
            last_activity,
        }
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn total_chapters(&self) -> usize {
        self.total_chapters
    }

    #[must_use]
    pub fn completed_chapters(&self) -> usize {
        self.completed_chapter_ids.len()
    }

    #[must_use]
    pub fn percentage(&self) -> u8 {
        self.percentage
    }

    #[must_use]
    pub fn completed_chapter_ids(&self) -> &BTreeSet<ChapterId> {
        &self.completed_chapter_ids
    }

    #[must_use]
    pub fn is_chapter_completed(&self, chapter_id: ChapterId) -> bool {
        self.completed_chapter_ids.contains(&chapter_id)
    }

    #[must_use]
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_activity
    }

    #[must_use]
    pub fn has_progress(&self) -> bool {
        !self.completed_chapter_ids.is_empty()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_chapters > 0 && self.completed_chapters() == self.total_chapters
    }
}
