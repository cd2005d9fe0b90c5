use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS subjects (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS modules (
            id INTEGER PRIMARY KEY,
            subject_id INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            published INTEGER NOT NULL CHECK (published IN (0, 1))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS chapters (
            id INTEGER PRIMARY KEY,
            module_id INTEGER NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            position INTEGER NOT NULL CHECK (position >= 0),
            content TEXT NOT NULL CHECK (content IN ('video', 'pdf', 'content')),
            published INTEGER NOT NULL CHECK (published IN (0, 1))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            module_id INTEGER NOT NULL UNIQUE,
            title TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            exam_id INTEGER NOT NULL REFERENCES exams(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('multiple_choice', 'true_false'))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS options (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            text TEXT NOT NULL,
            is_correct INTEGER NOT NULL CHECK (is_correct IN (0, 1))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS exam_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            exam_id INTEGER NOT NULL REFERENCES exams(id) ON DELETE CASCADE,
            student_id INTEGER NOT NULL,
            score INTEGER NOT NULL CHECK (score BETWEEN 0 AND 100),
            correct_answers INTEGER NOT NULL CHECK (correct_answers >= 0),
            total_questions INTEGER NOT NULL CHECK (total_questions >= correct_answers),
            passed INTEGER NOT NULL CHECK (passed IN (0, 1)),
            attempt INTEGER NOT NULL CHECK (attempt >= 1),
            submitted_at TEXT NOT NULL,
            UNIQUE (student_id, exam_id, attempt)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS chapter_progress (
            student_id INTEGER NOT NULL,
            chapter_id INTEGER NOT NULL,
            completed_at TEXT NOT NULL,
            PRIMARY KEY (student_id, chapter_id)
        );
    ",
    "CREATE INDEX IF NOT EXISTS idx_modules_subject ON modules(subject_id, position);",
    "CREATE INDEX IF NOT EXISTS idx_chapters_module ON chapters(module_id, position);",
    "CREATE INDEX IF NOT EXISTS idx_questions_exam ON questions(exam_id, position);",
    "CREATE INDEX IF NOT EXISTS idx_options_question ON options(question_id, position);",
];

/// Runs versioned migrations, each inside its own transaction.
///
/// Version 1 creates the course structure, exams with their questions and
/// options, exam results and chapter progress.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1.iter().copied() {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
