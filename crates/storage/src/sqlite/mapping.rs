use course_core::model::{
    Chapter, ChapterId, ChapterProgress, ContentKind, ExamId, ExamResult, Module, ModuleId,
    ResultId, StudentId, SubjectId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps a failed write. Constraint violations become domain errors, anything
/// else is treated as a connection problem.
pub(crate) fn write_err(e: sqlx::Error) -> StorageError {
    if let Some(db) = e.as_database_error() {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn conn(e: sqlx::Error) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn i64_to_u32(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn u64_col(row: &SqliteRow, field: &'static str) -> Result<u64, StorageError> {
    i64_to_u64(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn u32_col(row: &SqliteRow, field: &'static str) -> Result<u32, StorageError> {
    i64_to_u32(field, row.try_get::<i64, _>(field).map_err(ser)?)
}

pub(crate) fn bool_col(row: &SqliteRow, field: &'static str) -> Result<bool, StorageError> {
    Ok(row.try_get::<i64, _>(field).map_err(ser)? != 0)
}

pub(crate) fn map_module_row(row: &SqliteRow) -> Result<Module, StorageError> {
    Ok(Module {
        id: ModuleId::new(u64_col(row, "id")?),
        subject_id: SubjectId::new(u64_col(row, "subject_id")?),
        title: row.try_get("title").map_err(ser)?,
        position: u32_col(row, "position")?,
        published: bool_col(row, "published")?,
    })
}

pub(crate) fn map_chapter_row(row: &SqliteRow) -> Result<Chapter, StorageError> {
    let content: String = row.try_get("content").map_err(ser)?;
    Ok(Chapter {
        id: ChapterId::new(u64_col(row, "id")?),
        module_id: ModuleId::new(u64_col(row, "module_id")?),
        title: row.try_get("title").map_err(ser)?,
        position: u32_col(row, "position")?,
        content: ContentKind::parse(&content).map_err(ser)?,
        published: bool_col(row, "published")?,
    })
}

pub(crate) fn map_result_row(row: &SqliteRow) -> Result<ExamResult, StorageError> {
    ExamResult::from_persisted(
        ResultId::new(u64_col(row, "id")?),
        ExamId::new(u64_col(row, "exam_id")?),
        StudentId::new(u64_col(row, "student_id")?),
        u32_col(row, "score")?,
        u32_col(row, "correct_answers")?,
        u32_col(row, "total_questions")?,
        bool_col(row, "passed")?,
        u32_col(row, "attempt")?,
        row.try_get("submitted_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ChapterProgress, StorageError> {
    Ok(ChapterProgress::completed(
        StudentId::new(u64_col(row, "student_id")?),
        ChapterId::new(u64_col(row, "chapter_id")?),
        row.try_get("completed_at").map_err(ser)?,
    ))
}

/// `?start, ?start+1, ...` placeholders for an `IN (...)` list.
pub(crate) fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_are_numbered_from_start() {
        assert_eq!(placeholders(2, 3), "?2, ?3, ?4");
        assert_eq!(placeholders(1, 0), "");
    }

    #[test]
    fn id_overflow_is_a_serialization_error() {
        assert!(matches!(
            id_i64("exam_id", u64::MAX),
            Err(StorageError::Serialization(_))
        ));
        assert_eq!(id_i64("exam_id", 7).unwrap(), 7);
    }
}
