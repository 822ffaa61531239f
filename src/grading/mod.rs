//! Exam grading and certification.
//!
//! `submit_exam` runs resolve → normalize → upsert answers → score → finish →
//! certify inside a single write transaction, then notifies the student once
//! the transaction has committed.

pub mod attempt;
pub mod normalize;
pub mod outcome;
pub mod score;

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptDetail, SubmitExamResponse, SubmittedAnswer},
        exam::{Exam, Question},
        notification::{NewNotification, NotificationKind},
    },
    notifier,
};

pub(crate) const EXAM_COLUMNS: &str =
    "id, course_id, title, description, time_limit, published_at";

pub(crate) const QUESTION_COLUMNS: &str = "\
    id, exam_id, question_text, option_a, option_b, option_c, option_d, \
    correct_option, mark";

/// Grading knobs taken from configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct GradingPolicy {
    /// Reject answers that match no choice instead of coercing them to `A`.
    pub strict_answer_matching: bool,
}

/// Opens a transaction that takes SQLite's write lock up front.
///
/// Concurrent writers queue on the busy timeout instead of failing when a
/// deferred transaction tries to upgrade its read lock.
pub(crate) async fn begin_write(
    pool: &SqlitePool,
) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    pool.begin_with("BEGIN IMMEDIATE").await
}

pub async fn find_exam(
    conn: &mut SqliteConnection,
    exam_id: i64,
) -> Result<Option<Exam>, sqlx::Error> {
    sqlx::query_as::<_, Exam>(&format!("SELECT {EXAM_COLUMNS} FROM exams WHERE id = $1"))
        .bind(exam_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn list_questions(
    conn: &mut SqliteConnection,
    exam_id: i64,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE exam_id = $1 ORDER BY id"
    ))
    .bind(exam_id)
    .fetch_all(&mut *conn)
    .await
}

async fn require_exam(conn: &mut SqliteConnection, exam_id: i64) -> Result<Exam, AppError> {
    find_exam(conn, exam_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
}

/// Normalizes and stores each submitted answer against the exam's questions.
///
/// Fails on the first answer that references a question outside the exam, or
/// (in strict mode) on the first answer matching no choice.
async fn store_answers(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    questions: &[Question],
    answers: &[SubmittedAnswer],
    policy: GradingPolicy,
) -> Result<(), AppError> {
    let by_id: HashMap<i64, &Question> = questions.iter().map(|q| (q.id, q)).collect();

    for answer in answers {
        let question = by_id.get(&answer.question).ok_or_else(|| {
            AppError::NotFound(format!("Question {} not found in this exam", answer.question))
        })?;

        let normalized = normalize::normalize_answer(&answer.selected_option, question.options());
        if normalized.is_fallback() {
            if policy.strict_answer_matching {
                return Err(AppError::BadRequest(format!(
                    "Selected option '{}' matches no choice of question {}",
                    answer.selected_option, question.id
                )));
            }
            tracing::debug!(
                question_id = question.id,
                raw = %answer.selected_option,
                choice = normalized.choice.as_str(),
                "Unrecognized option coerced to fallback choice"
            );
        }

        let is_correct = normalized.choice == question.correct_option;
        attempt::upsert_answer(conn, attempt_id, question.id, normalized.choice, is_correct).await?;
    }

    Ok(())
}

/// Opens (or resumes) the student's attempt at an exam.
pub async fn start_attempt(
    pool: &SqlitePool,
    student_id: i64,
    exam_id: i64,
) -> Result<Attempt, AppError> {
    let mut tx = begin_write(pool).await?;
    require_exam(&mut tx, exam_id).await?;
    let attempt = attempt::resolve_open_attempt(&mut tx, student_id, exam_id, Utc::now()).await?;
    tx.commit().await?;
    Ok(attempt)
}

/// Saves answers into an open attempt without grading it.
pub async fn save_answers(
    pool: &SqlitePool,
    student_id: i64,
    attempt_id: i64,
    answers: &[SubmittedAnswer],
    policy: GradingPolicy,
) -> Result<AttemptDetail, AppError> {
    let mut tx = begin_write(pool).await?;

    let current = attempt::find_attempt(&mut tx, attempt_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;

    if current.student_id != student_id {
        return Err(AppError::Forbidden(
            "You cannot answer another student's attempt".to_string(),
        ));
    }
    if !current.is_open() {
        return Err(AppError::Conflict("Attempt is already finished".to_string()));
    }

    let questions = list_questions(&mut tx, current.exam_id).await?;
    store_answers(&mut tx, current.id, &questions, answers, policy).await?;
    let answers = attempt::list_answers(&mut tx, current.id).await?;

    tx.commit().await?;

    Ok(AttemptDetail {
        attempt: current,
        answers,
    })
}

/// Grades a submission for (student, exam) and records the outcome.
///
/// The open attempt is looked up before the write lock is taken, so a request
/// that loses a race with a concurrent submit of the same attempt gets 409.
pub async fn submit_exam(
    pool: &SqlitePool,
    student_id: i64,
    exam_id: i64,
    answers: &[SubmittedAnswer],
    policy: GradingPolicy,
) -> Result<SubmitExamResponse, AppError> {
    let seen = {
        let mut conn = pool.acquire().await?;
        attempt::find_open_attempt(&mut conn, student_id, exam_id).await?
    };

    submit_attempt(
        pool,
        student_id,
        exam_id,
        seen.map(|a| a.id),
        answers,
        policy,
    )
    .await
}

/// Grades a submission against `expected`, or against the open (or a new)
/// attempt when `expected` is `None`.
///
/// `expected` must still be open once the write lock is held, otherwise 409.
/// Nothing is persisted when any step fails. A passing attempt receives exactly
/// one certificate. The student is notified of the result after commit.
pub async fn submit_attempt(
    pool: &SqlitePool,
    student_id: i64,
    exam_id: i64,
    expected: Option<i64>,
    answers: &[SubmittedAnswer],
    policy: GradingPolicy,
) -> Result<SubmitExamResponse, AppError> {
    let mut tx = begin_write(pool).await?;
    let now = Utc::now();

    let exam = require_exam(&mut tx, exam_id).await?;
    let questions = list_questions(&mut tx, exam.id).await?;

    let current = match expected {
        Some(attempt_id) => {
            let current = attempt::find_attempt(&mut tx, attempt_id)
                .await?
                .filter(|a| a.student_id == student_id && a.exam_id == exam.id)
                .ok_or_else(|| AppError::NotFound("Attempt not found".to_string()))?;
            if !current.is_open() {
                return Err(AppError::Conflict("Attempt was already submitted".to_string()));
            }
            current
        }
        None => attempt::resolve_open_attempt(&mut tx, student_id, exam.id, now).await?,
    };

    store_answers(&mut tx, current.id, &questions, answers, policy).await?;

    let stored = attempt::answer_map(&mut tx, current.id).await?;
    let card = score::score_answers(&questions, &stored);

    if !outcome::finish_attempt(&mut tx, current.id, &card, now).await? {
        return Err(AppError::Conflict("Attempt was already submitted".to_string()));
    }

    let certificate = if card.is_passed {
        Some(outcome::issue_certificate(&mut tx, &current, now).await?)
    } else {
        None
    };

    tx.commit().await?;

    tracing::info!(
        attempt_id = current.id,
        student_id,
        exam_id,
        score = card.score,
        passed = card.is_passed,
        "Graded exam submission"
    );

    let code = certificate.as_ref().map(|c| c.certificate_code.as_str());
    notifier::dispatch(pool, result_notification(student_id, &exam, &card, code)).await;

    Ok(SubmitExamResponse {
        attempt_id: current.id,
        score: card.score,
        earned_points: card.earned_points,
        total_points: card.total_points,
        correct_count: card.correct_count,
        is_passed: card.is_passed,
        certificate_code: certificate.map(|c| c.certificate_code),
    })
}

fn result_notification(
    student_id: i64,
    exam: &Exam,
    card: &score::ScoreCard,
    certificate_code: Option<&str>,
) -> NewNotification {
    let (verdict, kind) = if card.is_passed {
        ("passed", NotificationKind::Success)
    } else {
        ("failed", NotificationKind::Warning)
    };

    let mut message = format!(
        "You {} the exam '{}' with a score of {:.1}%",
        verdict, exam.title, card.score
    );
    if let Some(code) = certificate_code {
        message.push_str(&format!(". Certificate code: {}", code));
    }

    NewNotification {
        user_id: student_id,
        title: "Exam Results".to_string(),
        message,
        kind,
    }
}
