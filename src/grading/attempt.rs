//! Attempt resolution and answer storage.
//! Every function runs on the caller's connection so the grading flow can keep
//! it inside one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::models::{
    attempt::{Answer, Attempt},
    exam::Choice,
};

pub(crate) const ATTEMPT_COLUMNS: &str =
    "id, student_id, exam_id, score, is_passed, started_at, finished_at";

const ANSWER_COLUMNS: &str = "id, attempt_id, question_id, selected_option, is_correct";

/// The newest unfinished attempt of (student, exam), if any.
pub async fn find_open_attempt(
    conn: &mut SqliteConnection,
    student_id: i64,
    exam_id: i64,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts
         WHERE student_id = $1 AND exam_id = $2 AND finished_at IS NULL
         ORDER BY id DESC
         LIMIT 1"
    ))
    .bind(student_id)
    .bind(exam_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Returns the open attempt for (student, exam), creating one started at `now`
/// when none exists.
pub async fn resolve_open_attempt(
    conn: &mut SqliteConnection,
    student_id: i64,
    exam_id: i64,
    now: DateTime<Utc>,
) -> Result<Attempt, sqlx::Error> {
    if let Some(attempt) = find_open_attempt(conn, student_id, exam_id).await? {
        return Ok(attempt);
    }

    let attempt = sqlx::query_as::<_, Attempt>(&format!(
        "INSERT INTO attempts (student_id, exam_id, is_passed, started_at)
         VALUES ($1, $2, 0, $3)
         RETURNING {ATTEMPT_COLUMNS}"
    ))
    .bind(student_id)
    .bind(exam_id)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(attempt_id = attempt.id, student_id, exam_id, "Opened exam attempt");

    Ok(attempt)
}

pub async fn find_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE id = $1"
    ))
    .bind(attempt_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Stores the answer for (attempt, question), overwriting any earlier one.
pub async fn upsert_answer(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    question_id: i64,
    selected: Choice,
    is_correct: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO answers (attempt_id, question_id, selected_option, is_correct)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (attempt_id, question_id) DO UPDATE SET
             selected_option = excluded.selected_option,
             is_correct = excluded.is_correct",
    )
    .bind(attempt_id)
    .bind(question_id)
    .bind(selected)
    .bind(is_correct)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list_answers(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {ANSWER_COLUMNS} FROM answers WHERE attempt_id = $1 ORDER BY question_id"
    ))
    .bind(attempt_id)
    .fetch_all(&mut *conn)
    .await
}

/// Stored choices of an attempt keyed by question id.
pub async fn answer_map(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<HashMap<i64, Choice>, sqlx::Error> {
    let answers = list_answers(conn, attempt_id).await?;
    Ok(answers
        .into_iter()
        .map(|a| (a.question_id, a.selected_option))
        .collect())
}
