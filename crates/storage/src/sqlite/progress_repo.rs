use course_core::model::{ChapterId, ChapterProgress, StudentId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_progress_row, placeholders, write_err};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn complete_chapter(&self, record: &ChapterProgress) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO chapter_progress (student_id, chapter_id, completed_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(student_id, chapter_id) DO NOTHING
            ",
        )
        .bind(id_i64("student_id", record.student_id.value())?)
        .bind(id_i64("chapter_id", record.chapter_id.value())?)
        .bind(record.completed_at)
        .execute(self.pool())
        .await
        .map_err(write_err)?;

        Ok(res.rows_affected() == 1)
    }

    async fn completions(
        &self,
        student_id: StudentId,
        chapters: &[ChapterId],
    ) -> Result<Vec<ChapterProgress>, StorageError> {
        if chapters.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r"
            SELECT student_id, chapter_id, completed_at
            FROM chapter_progress
            WHERE student_id = ?1 AND chapter_id IN ({})
            ORDER BY completed_at ASC
            ",
            placeholders(2, chapters.len())
        );

        let mut q = sqlx::query(&sql).bind(id_i64("student_id", student_id.value())?);
        for chapter in chapters {
            q = q.bind(id_i64("chapter_id", chapter.value())?);
        }

        let rows = q.fetch_all(self.pool()).await.map_err(conn)?;
        rows.iter().map(map_progress_row).collect()
    }
}
