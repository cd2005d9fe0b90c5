use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ChapterId, ModuleId, SubjectId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("unknown content kind: {0}")]
    UnknownContentKind(String),

    #[error("name cannot be empty")]
    EmptyName,
}

/// What a chapter delivers to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Video,
    Pdf,
    Content,
}

impl ContentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Video => "video",
            ContentKind::Pdf => "pdf",
            ContentKind::Content => "content",
        }
    }

    /// # Errors
    ///
    /// Returns `CourseError::UnknownContentKind` for unrecognized values.
    pub fn parse(value: &str) -> Result<Self, CourseError> {
        match value {
            "video" => Ok(Self::Video),
            "pdf" => Ok(Self::Pdf),
            "content" => Ok(Self::Content),
            other => Err(CourseError::UnknownContentKind(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
}

impl Subject {
    /// # Errors
    ///
    /// Returns `CourseError::EmptyName` if the name is blank.
    pub fn new(id: SubjectId, name: impl Into<String>) -> Result<Self, CourseError> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(CourseError::EmptyName);
        }
        Ok(Self {
            id,
            name: name.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,
    pub subject_id: SubjectId,
    pub title: String,
    pub position: u32,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: ChapterId,
    pub module_id: ModuleId,
    pub title: String,
    /// Order index within the module.
    pub position: u32,
    pub content: ContentKind,
    pub published: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleOutline {
    pub module: Module,
    pub chapters: Vec<Chapter>,
}

/// Ordered module/chapter structure of one subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseOutline {
    subject_id: SubjectId,
    modules: Vec<ModuleOutline>,
}

impl CourseOutline {
    /// Group chapters under their modules, ordering both by (position, id).
    ///
    /// Modules of other subjects and chapters of unknown modules are dropped.
    #[must_use]
    pub fn new(subject_id: SubjectId, modules: Vec<Module>, chapters: Vec<Chapter>) -> Self {
        let mut modules: Vec<ModuleOutline> = modules
            .into_iter()
            .filter(|m| m.subject_id == subject_id)
            .map(|module| ModuleOutline {
                module,
                chapters: Vec::new(),
            })
            .collect();
        modules.sort_by_key(|m| (m.module.position, m.module.id));

        for chapter in chapters {
            if let Some(outline) = modules
                .iter_mut()
                .find(|m| m.module.id == chapter.module_id)
            {
                outline.chapters.push(chapter);
            }
        }
        for outline in &mut modules {
            outline.chapters.sort_by_key(|c| (c.position, c.id));
        }

        Self {
            subject_id,
            modules,
        }
    }

    /// The part of the outline a student can see: published modules holding
    /// their published chapters.
    #[must_use]
    pub fn published(&self) -> Self {
        let modules = self
            .modules
            .iter()
            .filter(|m| m.module.published)
            .map(|m| ModuleOutline {
                module: m.module.clone(),
                chapters: m.chapters.iter().filter(|c| c.published).cloned().collect(),
            })
            .collect();
        Self {
            subject_id: self.subject_id,
            modules,
        }
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn modules(&self) -> &[ModuleOutline] {
        &self.modules
    }

    /// Chapters in (module order, chapter order) sequence.
    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> {
        self.modules.iter().flat_map(|m| m.chapters.iter())
    }

    #[must_use]
    pub fn chapter_count(&self) -> usize {
        self.modules.iter().map(|m| m.chapters.len()).sum()
    }

    #[must_use]
    pub fn chapter(&self, id: ChapterId) -> Option<&Chapter> {
        self.chapters().find(|c| c.id == id)
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&ModuleOutline> {
        self.modules.iter().find(|m| m.module.id == id)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn module(id: u64, position: u32) -> Module {
        Module {
            id: ModuleId::new(id),
            subject_id: SubjectId::new(1),
            title: format!("Module {id}"),
            position,
            published: true,
        }
    }

    pub(crate) fn chapter(id: u64, module_id: u64, position: u32) -> Chapter {
        Chapter {
            id: ChapterId::new(id),
            module_id: ModuleId::new(module_id),
            title: format!("Chapter {id}"),
            position,
            content: ContentKind::Video,
            published: true,
        }
    }

    /// Subject 1 with `modules` modules of `per_module` chapters each.
    /// Chapter ids are `module * 100 + n`.
    pub(crate) fn outline(modules: u64, per_module: u64) -> CourseOutline {
        let mods = (1..=modules)
            .map(|m| module(m, u32::try_from(m).unwrap()))
            .collect();
        let chapters = (1..=modules)
            .flat_map(|m| (1..=per_module).map(move |n| chapter(m * 100 + n, m, u32::try_from(n).unwrap())))
            .collect();
        CourseOutline::new(SubjectId::new(1), mods, chapters)
    }

    #[test]
    fn outline_orders_modules_and_chapters_by_position() {
        let modules = vec![module(2, 1), module(1, 2)];
        let chapters = vec![chapter(10, 1, 2), chapter(11, 1, 1), chapter(20, 2, 5)];
        let outline = CourseOutline::new(SubjectId::new(1), modules, chapters);

        let order: Vec<_> = outline.chapters().map(|c| c.id.value()).collect();
        assert_eq!(order, vec![20, 11, 10]);
    }

    #[test]
    fn outline_drops_foreign_modules_and_orphan_chapters() {
        let mut foreign = module(9, 1);
        foreign.subject_id = SubjectId::new(2);
        let outline = CourseOutline::new(
            SubjectId::new(1),
            vec![module(1, 1), foreign],
            vec![chapter(1, 1, 1), chapter(2, 9, 1), chapter(3, 7, 1)],
        );
        assert_eq!(outline.modules().len(), 1);
        assert_eq!(outline.chapter_count(), 1);
    }

    #[test]
    fn published_view_hides_drafts() {
        let mut hidden_module = module(2, 2);
        hidden_module.published = false;
        let mut hidden_chapter = chapter(12, 1, 2);
        hidden_chapter.published = false;

        let outline = CourseOutline::new(
            SubjectId::new(1),
            vec![module(1, 1), hidden_module],
            vec![chapter(11, 1, 1), hidden_chapter, chapter(21, 2, 1)],
        )
        .published();

        let ids: Vec<_> = outline.chapters().map(|c| c.id.value()).collect();
        assert_eq!(ids, vec![11]);
        assert!(outline.module(ModuleId::new(2)).is_none());
    }

    #[test]
    fn content_kind_parse() {
        assert_eq!(ContentKind::parse("pdf").unwrap(), ContentKind::Pdf);
        assert!(ContentKind::parse("audio").is_err());
    }

    #[test]
    fn subject_name_is_trimmed() {
        assert_eq!(Subject::new(SubjectId::new(1), " Math ").unwrap().name, "Math");
        assert_eq!(
            Subject::new(SubjectId::new(1), "  ").unwrap_err(),
            CourseError::EmptyName
        );
    }
}
