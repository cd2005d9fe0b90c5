use chrono::{DateTime, Utc};
use course_core::model::{
    AnswerOption, Exam, ExamId, ModuleId, OptionId, Question, QuestionId, QuestionKind,
    ValidatedExam,
};
use sqlx::{Row, SqliteConnection};

use super::SqliteRepository;
use super::mapping::{bool_col, conn, id_i64, ser, u64_col, write_err};
use crate::repository::{ExamRepository, StorageError};

async fn insert_questions(
    tx: &mut SqliteConnection,
    exam_id: i64,
    exam: &ValidatedExam,
) -> Result<(), StorageError> {
    for (q_pos, question) in exam.questions.iter().enumerate() {
        let res = sqlx::query(
            r"
            INSERT INTO questions (exam_id, position, text, kind)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(exam_id)
        .bind(i64::try_from(q_pos).map_err(ser)?)
        .bind(question.text.as_str())
        .bind(question.kind.as_str())
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;
        let question_id = res.last_insert_rowid();

        for (o_pos, (text, is_correct)) in question.flagged_options().enumerate() {
            sqlx::query(
                r"
                INSERT INTO options (question_id, position, text, is_correct)
                VALUES (?1, ?2, ?3, ?4)
                ",
            )
            .bind(question_id)
            .bind(i64::try_from(o_pos).map_err(ser)?)
            .bind(text)
            .bind(i64::from(is_correct))
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        }
    }
    Ok(())
}

impl SqliteRepository {
    async fn load_questions(&self, exam_id: i64) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                q.id AS question_id, q.text AS question_text, q.kind,
                o.id AS option_id, o.text AS option_text, o.is_correct
            FROM questions q
            JOIN options o ON o.question_id = q.id
            WHERE q.exam_id = ?1
            ORDER BY q.position ASC, o.position ASC
            ",
        )
        .bind(exam_id)
        .fetch_all(self.pool())
        .await
        .map_err(conn)?;

        let mut questions: Vec<Question> = Vec::new();
        for row in rows {
            let question_id = QuestionId::new(u64_col(&row, "question_id")?);
            let option = AnswerOption {
                id: OptionId::new(u64_col(&row, "option_id")?),
                text: row.try_get("option_text").map_err(ser)?,
                is_correct: bool_col(&row, "is_correct")?,
            };
            match questions.last_mut() {
                Some(last) if last.id == question_id => last.options.push(option),
                _ => {
                    let kind: String = row.try_get("kind").map_err(ser)?;
                    questions.push(Question {
                        id: question_id,
                        text: row.try_get("question_text").map_err(ser)?,
                        kind: QuestionKind::parse(&kind).map_err(ser)?,
                        options: vec![option],
                    });
                }
            }
        }
        Ok(questions)
    }

    async fn load_exam(&self, sql: &str, key: i64) -> Result<Option<Exam>, StorageError> {
        let Some(row) = sqlx::query(sql)
            .bind(key)
            .fetch_optional(self.pool())
            .await
            .map_err(conn)?
        else {
            return Ok(None);
        };

        let id: i64 = row.try_get("id").map_err(ser)?;
        let questions = self.load_questions(id).await?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(ser)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;

        Exam::from_persisted(
            ExamId::new(u64_col(&row, "id")?),
            ModuleId::new(u64_col(&row, "module_id")?),
            row.try_get::<String, _>("title").map_err(ser)?,
            questions,
            created_at,
            updated_at,
        )
        .map(Some)
        .map_err(ser)
    }
}

#[async_trait::async_trait]
impl ExamRepository for SqliteRepository {
    async fn create_exam(
        &self,
        module_id: ModuleId,
        exam: &ValidatedExam,
        now: DateTime<Utc>,
    ) -> Result<Exam, StorageError> {
        let mut tx = self.pool().begin().await.map_err(conn)?;

        let res = sqlx::query(
            r"
            INSERT INTO exams (module_id, title, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?3)
            ",
        )
        .bind(id_i64("module_id", module_id.value())?)
        .bind(exam.title.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(write_err)?;
        let exam_id = res.last_insert_rowid();

        insert_questions(&mut tx, exam_id, exam).await?;
        tx.commit().await.map_err(conn)?;

        tracing::debug!(exam_id, module_id = %module_id, "exam created");
        self.get_exam(ExamId::new(u64::try_from(exam_id).map_err(ser)?))
            .await?
            .ok_or(StorageError::NotFound)
    }

    async fn update_exam(
        &self,
        id: ExamId,
        exam: &ValidatedExam,
        now: DateTime<Utc>,
    ) -> Result<Exam, StorageError> {
        let exam_id = id_i64("exam_id", id.value())?;
        let mut tx = self.pool().begin().await.map_err(conn)?;

        let res = sqlx::query("UPDATE exams SET title = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(exam.title.as_str())
            .bind(now)
            .bind(exam_id)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }

        // options go with their questions
        sqlx::query("DELETE FROM questions WHERE exam_id = ?1")
            .bind(exam_id)
            .execute(&mut *tx)
            .await
            .map_err(write_err)?;
        insert_questions(&mut tx, exam_id, exam).await?;
        tx.commit().await.map_err(conn)?;

        tracing::debug!(exam_id, "exam updated");
        self.get_exam(id).await?.ok_or(StorageError::NotFound)
    }

    async fn get_exam(&self, id: ExamId) -> Result<Option<Exam>, StorageError> {
        self.load_exam(
            "SELECT id, module_id, title, created_at, updated_at FROM exams WHERE id = ?1",
            id_i64("exam_id", id.value())?,
        )
        .await
    }

    async fn exam_for_module(&self, module_id: ModuleId) -> Result<Option<Exam>, StorageError> {
        self.load_exam(
            "SELECT id, module_id, title, created_at, updated_at FROM exams WHERE module_id = ?1",
            id_i64("module_id", module_id.value())?,
        )
        .await
    }

    async fn delete_exam(&self, id: ExamId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM exams WHERE id = ?1")
            .bind(id_i64("exam_id", id.value())?)
            .execute(self.pool())
            .await
            .map_err(write_err)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        tracing::debug!(exam_id = %id, "exam deleted with its results");
        Ok(())
    }
}
