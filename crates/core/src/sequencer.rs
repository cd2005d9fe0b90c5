use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{ChapterId, CourseOutline, ModuleId, SubjectProgress};

/// Derived viewing state of a chapter for one student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChapterState {
    /// Not part of the published sequence.
    Locked,
    /// Not completed; may be opened directly.
    Available,
    /// First incomplete chapter in sequence order.
    Current,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleState {
    pub module_id: ModuleId,
    pub total_chapters: usize,
    pub completed_chapters: usize,
    /// False for modules without chapters.
    pub is_complete: bool,
}

/// Published chapters of a subject in (module order, chapter order), combined
/// with one student's completed-chapter set.
///
/// `current` is a navigation hint, not an access gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseSequence {
    outline: CourseOutline,
    order: Vec<(ModuleId, ChapterId)>,
    completed: BTreeSet<ChapterId>,
    current: Option<usize>,
}

impl CourseSequence {
    /// Build the sequence over the published part of `outline`.
    ///
    /// Completed ids that are not published are kept but have no effect.
    #[must_use]
    pub fn new(outline: &CourseOutline, completed: &BTreeSet<ChapterId>) -> Self {
        let outline = outline.published();
        let order = outline
            .modules()
            .iter()
            .flat_map(|m| m.chapters.iter().map(move |c| (m.module.id, c.id)))
            .collect();
        let mut sequence = Self {
            outline,
            order,
            completed: completed.clone(),
            current: None,
        };
        sequence.recompute_current();
        sequence
    }

    #[must_use]
    pub fn from_progress(outline: &CourseOutline, progress: &SubjectProgress) -> Self {
        Self::new(outline, progress.completed_chapter_ids())
    }

    fn recompute_current(&mut self) {
        self.current = self
            .order
            .iter()
            .position(|(_, chapter)| !self.completed.contains(chapter));
    }

    fn index_of(&self, chapter_id: ChapterId) -> Option<usize> {
        self.order.iter().position(|(_, c)| *c == chapter_id)
    }

    /// Published outline the sequence walks.
    #[must_use]
    pub fn outline(&self) -> &CourseOutline {
        &self.outline
    }

    pub fn chapter_ids(&self) -> impl Iterator<Item = ChapterId> + '_ {
        self.order.iter().map(|(_, c)| *c)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<ChapterId> {
        self.order.first().map(|(_, c)| *c)
    }

    #[must_use]
    pub fn last(&self) -> Option<ChapterId> {
        self.order.last().map(|(_, c)| *c)
    }

    /// The first incomplete chapter, or `None` once everything is completed.
    #[must_use]
    pub fn current(&self) -> Option<ChapterId> {
        self.current.map(|i| self.order[i].1)
    }

    #[must_use]
    pub fn is_completed(&self, chapter_id: ChapterId) -> bool {
        self.completed.contains(&chapter_id)
    }

    #[must_use]
    pub fn state_of(&self, chapter_id: ChapterId) -> ChapterState {
        match self.index_of(chapter_id) {
            None => ChapterState::Locked,
            Some(_) if self.completed.contains(&chapter_id) => ChapterState::Completed,
            Some(i) if Some(i) == self.current => ChapterState::Current,
            Some(_) => ChapterState::Available,
        }
    }

    #[must_use]
    pub fn next_after(&self, chapter_id: ChapterId) -> Option<ChapterId> {
        let i = self.index_of(chapter_id)?;
        self.order.get(i + 1).map(|(_, c)| *c)
    }

    #[must_use]
    pub fn previous_before(&self, chapter_id: ChapterId) -> Option<ChapterId> {
        let i = self.index_of(chapter_id)?;
        i.checked_sub(1).map(|p| self.order[p].1)
    }

    #[must_use]
    pub fn module_of(&self, chapter_id: ChapterId) -> Option<ModuleId> {
        self.order
            .iter()
            .find(|(_, c)| *c == chapter_id)
            .map(|(m, _)| *m)
    }

    #[must_use]
    pub fn module_state(&self, module_id: ModuleId) -> Option<ModuleState> {
        let module = self.outline.module(module_id)?;
        let total_chapters = module.chapters.len();
        let completed_chapters = module
            .chapters
            .iter()
            .filter(|c| self.completed.contains(&c.id))
            .count();
        Some(ModuleState {
            module_id,
            total_chapters,
            completed_chapters,
            is_complete: total_chapters > 0 && completed_chapters == total_chapters,
        })
    }

    #[must_use]
    pub fn is_module_complete(&self, module_id: ModuleId) -> bool {
        self.module_state(module_id).is_some_and(|s| s.is_complete)
    }

    /// Whether a module has been reached in the sequence: it has published
    /// chapters and does not come after the module holding the current chapter.
    #[must_use]
    pub fn is_module_reachable(&self, module_id: ModuleId) -> bool {
        let Some(position) = self
            .outline
            .modules()
            .iter()
            .position(|m| m.module.id == module_id)
        else {
            return false;
        };
        if self.outline.modules()[position].chapters.is_empty() {
            return false;
        }
        let Some(current) = self.current() else {
            return true;
        };
        self.module_of(current)
            .and_then(|m| self.outline.modules().iter().position(|o| o.module.id == m))
            .is_some_and(|current_position| position <= current_position)
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.order.is_empty() && self.current.is_none()
    }

    /// Record a completion acknowledged by the progress store.
    ///
    /// Returns false if the chapter was already completed.
    pub fn mark_completed(&mut self, chapter_id: ChapterId) -> bool {
        let inserted = self.completed.insert(chapter_id);
        if inserted {
            self.recompute_current();
        }
        inserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SubjectId;
    use crate::model::course::tests::{chapter, module, outline};

    fn completed(ids: &[u64]) -> BTreeSet<ChapterId> {
        ids.iter().copied().map(ChapterId::new).collect()
    }

    #[test]
    fn current_is_first_incomplete_chapter() {
        let sequence = CourseSequence::new(&outline(2, 3), &completed(&[101, 102]));
        assert_eq!(sequence.current(), Some(ChapterId::new(103)));
        assert_eq!(sequence.state_of(ChapterId::new(101)), ChapterState::Completed);
        assert_eq!(sequence.state_of(ChapterId::new(103)), ChapterState::Current);
        assert_eq!(sequence.state_of(ChapterId::new(201)), ChapterState::Available);
        assert_eq!(sequence.state_of(ChapterId::new(999)), ChapterState::Locked);
    }

    #[test]
    fn completed_prefix_moves_current_across_modules() {
        let sequence = CourseSequence::new(&outline(2, 3), &completed(&[101, 102, 103]));
        assert_eq!(sequence.current(), Some(ChapterId::new(201)));
    }

    #[test]
    fn out_of_order_completion_keeps_earliest_gap_current() {
        let sequence = CourseSequence::new(&outline(1, 4), &completed(&[102, 103]));
        assert_eq!(sequence.current(), Some(ChapterId::new(101)));
        let currents = sequence
            .chapter_ids()
            .filter(|c| sequence.state_of(*c) == ChapterState::Current)
            .count();
        assert_eq!(currents, 1);
    }

    #[test]
    fn no_current_when_everything_completed() {
        let sequence = CourseSequence::new(&outline(1, 2), &completed(&[101, 102]));
        assert_eq!(sequence.current(), None);
        assert!(sequence.is_complete());
    }

    #[test]
    fn ten_chapters_without_progress_start_at_first() {
        let sequence = CourseSequence::new(&outline(2, 5), &BTreeSet::new());
        assert_eq!(sequence.len(), 10);
        assert_eq!(sequence.current(), sequence.first());
    }

    #[test]
    fn next_and_previous_follow_sequence_order() {
        let sequence = CourseSequence::new(&outline(2, 2), &BTreeSet::new());
        assert_eq!(sequence.next_after(ChapterId::new(102)), Some(ChapterId::new(201)));
        assert_eq!(sequence.next_after(ChapterId::new(202)), None);
        assert_eq!(sequence.previous_before(ChapterId::new(201)), Some(ChapterId::new(102)));
        assert_eq!(sequence.previous_before(ChapterId::new(101)), None);
    }

    #[test]
    fn empty_module_is_never_complete() {
        let outline = CourseOutline::new(
            SubjectId::new(1),
            vec![module(1, 1), module(2, 2)],
            vec![chapter(11, 1, 1)],
        );
        let sequence = CourseSequence::new(&outline, &completed(&[11]));
        assert!(sequence.is_module_complete(ModuleId::new(1)));
        assert!(!sequence.is_module_complete(ModuleId::new(2)));
        assert_eq!(
            sequence.module_state(ModuleId::new(2)).unwrap().total_chapters,
            0
        );
    }

    #[test]
    fn unpublished_chapters_do_not_participate() {
        let mut hidden = chapter(12, 1, 2);
        hidden.published = false;
        let outline = CourseOutline::new(
            SubjectId::new(1),
            vec![module(1, 1)],
            vec![chapter(11, 1, 1), hidden, chapter(13, 1, 3)],
        );
        let sequence = CourseSequence::new(&outline, &completed(&[11]));
        assert_eq!(sequence.current(), Some(ChapterId::new(13)));
        assert_eq!(sequence.state_of(ChapterId::new(12)), ChapterState::Locked);
        assert_eq!(sequence.next_after(ChapterId::new(11)), Some(ChapterId::new(13)));
    }

    #[test]
    fn modules_up_to_current_are_reachable() {
        let sequence = CourseSequence::new(&outline(3, 2), &completed(&[101, 102]));
        assert!(sequence.is_module_reachable(ModuleId::new(1)));
        assert!(sequence.is_module_reachable(ModuleId::new(2)));
        assert!(!sequence.is_module_reachable(ModuleId::new(3)));
        assert!(!sequence.is_module_reachable(ModuleId::new(9)));
    }

    #[test]
    fn mark_completed_is_idempotent_and_advances_current() {
        let mut sequence = CourseSequence::new(&outline(1, 3), &BTreeSet::new());
        assert!(sequence.mark_completed(ChapterId::new(101)));
        assert!(!sequence.mark_completed(ChapterId::new(101)));
        assert_eq!(sequence.current(), Some(ChapterId::new(102)));
    }
}
