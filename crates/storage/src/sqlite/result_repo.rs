use course_core::model::{ExamId, ExamResult, GradedAttempt, ResultId, StudentId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_result_row, ser, write_err};
use crate::repository::{ResultRepository, StorageError};

#[async_trait::async_trait]
impl ResultRepository for SqliteRepository {
    async fn append_result(&self, attempt: &GradedAttempt) -> Result<ExamResult, StorageError> {
        let outcome = attempt.outcome;
        let res = sqlx::query(
            r"
            INSERT INTO exam_results (
                exam_id, student_id, score, correct_answers, total_questions,
                passed, attempt, submitted_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(id_i64("exam_id", attempt.exam_id.value())?)
        .bind(id_i64("student_id", attempt.student_id.value())?)
        .bind(i64::from(outcome.score))
        .bind(i64::from(outcome.correct_answers))
        .bind(i64::from(outcome.total_questions))
        .bind(i64::from(outcome.passed))
        .bind(i64::from(attempt.attempt))
        .bind(attempt.submitted_at)
        .execute(self.pool())
        .await
        .map_err(write_err)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(attempt.clone().assign_id(ResultId::new(id)))
    }

    async fn results_for(
        &self,
        student_id: StudentId,
        exam_id: ExamId,
    ) -> Result<Vec<ExamResult>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                id, exam_id, student_id, score, correct_answers, total_questions,
                passed, attempt, submitted_at
            FROM exam_results
            WHERE student_id = ?1 AND exam_id = ?2
            ORDER BY attempt ASC
            ",
        )
        .bind(id_i64("student_id", student_id.value())?)
        .bind(id_i64("exam_id", exam_id.value())?)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        rows.iter().map(map_result_row).collect()
    }
}
