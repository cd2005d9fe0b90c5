use course_core::model::{
    Chapter, ChapterId, CourseOutline, Module, Subject, SubjectId,
};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, id_i64, map_chapter_row, map_module_row, ser, u64_col, write_err,
};
use crate::repository::{CourseRepository, StorageError};

fn subject_id_from(value: Option<i64>) -> Result<Option<SubjectId>, StorageError> {
    value
        .map(|v| u64::try_from(v).map(SubjectId::new).map_err(ser))
        .transpose()
}

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn upsert_subject(&self, subject: &Subject) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO subjects (id, name) VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET name = excluded.name
            ",
        )
        .bind(id_i64("subject_id", subject.id.value())?)
        .bind(subject.name.as_str())
        .execute(self.pool())
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO modules (id, subject_id, title, position, published)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                subject_id = excluded.subject_id,
                title = excluded.title,
                position = excluded.position,
                published = excluded.published
            ",
        )
        .bind(id_i64("module_id", module.id.value())?)
        .bind(id_i64("subject_id", module.subject_id.value())?)
        .bind(module.title.as_str())
        .bind(i64::from(module.position))
        .bind(i64::from(module.published))
        .execute(self.pool())
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn upsert_chapter(&self, chapter: &Chapter) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO chapters (id, module_id, title, position, content, published)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                module_id = excluded.module_id,
                title = excluded.title,
                position = excluded.position,
                content = excluded.content,
                published = excluded.published
            ",
        )
        .bind(id_i64("chapter_id", chapter.id.value())?)
        .bind(id_i64("module_id", chapter.module_id.value())?)
        .bind(chapter.title.as_str())
        .bind(i64::from(chapter.position))
        .bind(chapter.content.as_str())
        .bind(i64::from(chapter.published))
        .execute(self.pool())
        .await
        .map_err(write_err)?;
        Ok(())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query("SELECT id, name FROM subjects ORDER BY id ASC")
            .fetch_all(self.pool())
            .await
            .map_err(conn)?;

        let mut subjects = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name").map_err(ser)?;
            subjects.push(Subject::new(SubjectId::new(u64_col(&row, "id")?), name).map_err(ser)?);
        }
        Ok(subjects)
    }

    async fn outline(&self, subject_id: SubjectId) -> Result<Option<CourseOutline>, StorageError> {
        let subject = id_i64("subject_id", subject_id.value())?;

        let exists = sqlx::query("SELECT 1 FROM subjects WHERE id = ?1")
            .bind(subject)
            .fetch_optional(self.pool())
            .await
            .map_err(conn)?;
        if exists.is_none() {
            return Ok(None);
        }

        let module_rows = sqlx::query(
            r"
            SELECT id, subject_id, title, position, published
            FROM modules
            WHERE subject_id = ?1
            ",
        )
        .bind(subject)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let chapter_rows = sqlx::query(
            r"
            SELECT c.id, c.module_id, c.title, c.position, c.content, c.published
            FROM chapters c
            JOIN modules m ON m.id = c.module_id
            WHERE m.subject_id = ?1
            ",
        )
        .bind(subject)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let modules = module_rows
            .iter()
            .map(map_module_row)
            .collect::<Result<Vec<_>, _>>()?;
        let chapters = chapter_rows
            .iter()
            .map(map_chapter_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CourseOutline::new(subject_id, modules, chapters)))
    }

    async fn subject_of_chapter(
        &self,
        chapter_id: ChapterId,
    ) -> Result<Option<SubjectId>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT m.subject_id
            FROM chapters c
            JOIN modules m ON m.id = c.module_id
            WHERE c.id = ?1
            ",
        )
        .bind(id_i64("chapter_id", chapter_id.value())?)
        .fetch_optional(self.pool())
        .await
        .map_err(conn)?;

        subject_id_from(
            row.map(|r| r.try_get::<i64, _>("subject_id"))
                .transpose()
                .map_err(ser)?,
        )
    }
}
