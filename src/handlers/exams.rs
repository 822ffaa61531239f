// src/handlers/exams.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};

use crate::{
    config::Config,
    error::AppError,
    grading::{self, GradingPolicy, QUESTION_COLUMNS},
    models::{
        attempt::{SubmissionRow, SubmitExamRequest},
        exam::{
            CreateExamRequest, ExamDetail, ExamSummary, Question, QuestionInput, QuestionView,
            UpdateExamRequest,
        },
        notification::{NewNotification, NotificationKind},
        user::Role,
    },
    notifier,
    utils::{html::clean_optional, json::ValidatedJson, jwt::Claims},
};

use super::courses::find_course;

const SUMMARY_SELECT: &str = r#"
    SELECT
        e.id, e.course_id, c.title AS course_title, c.instructor_id,
        e.title, e.description, e.time_limit, e.published_at,
        (SELECT COUNT(*) FROM questions q WHERE q.exam_id = e.id) AS question_count,
        (SELECT COALESCE(SUM(q.mark), 0) FROM questions q WHERE q.exam_id = e.id) AS total_marks
    FROM exams e
    JOIN courses c ON c.id = e.course_id
"#;

async fn find_summary(pool: &SqlitePool, exam_id: i64) -> Result<ExamSummary, AppError> {
    sqlx::query_as::<_, ExamSummary>(&format!("{SUMMARY_SELECT} WHERE e.id = $1"))
        .bind(exam_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))
}

async fn insert_question(
    conn: &mut SqliteConnection,
    exam_id: i64,
    input: &QuestionInput,
) -> Result<Question, AppError> {
    let correct = input.correct_choice().ok_or(AppError::BadRequest(
        "correct_option must be one of A, B, C, D".to_string(),
    ))?;

    let question = sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions
            (exam_id, question_text, option_a, option_b, option_c, option_d, correct_option, mark)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(exam_id)
    .bind(input.question_text.trim())
    .bind(input.options[0].trim())
    .bind(input.options[1].trim())
    .bind(input.options[2].trim())
    .bind(input.options[3].trim())
    .bind(correct)
    .bind(input.mark)
    .fetch_one(&mut *conn)
    .await?;

    Ok(question)
}

/// Lists exams visible to the caller.
/// Instructors see the exams of their own courses; everyone else sees all.
pub async fn list_exams(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let exams = match claims.role {
        Role::Instructor => {
            sqlx::query_as::<_, ExamSummary>(&format!(
                "{SUMMARY_SELECT} WHERE c.instructor_id = $1 ORDER BY e.published_at DESC, e.id DESC"
            ))
            .bind(claims.user_id()?)
            .fetch_all(&pool)
            .await?
        }
        Role::Student | Role::Admin => {
            sqlx::query_as::<_, ExamSummary>(&format!(
                "{SUMMARY_SELECT} ORDER BY e.published_at DESC, e.id DESC"
            ))
            .fetch_all(&pool)
            .await?
        }
    };

    Ok(Json(exams))
}

/// Exam with its questions. Correct options are only revealed to the owner.
pub async fn get_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = find_summary(&pool, id).await?;
    let reveal = claims.ensure_manages(summary.instructor_id).is_ok();

    let mut conn = pool.acquire().await?;
    let questions = grading::list_questions(&mut conn, id).await?;

    Ok(Json(ExamDetail {
        summary,
        questions: questions
            .into_iter()
            .map(|q| QuestionView::from_question(q, reveal))
            .collect(),
    }))
}

/// Creates an exam with nested questions in one transaction.
pub async fn create_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = find_course(&pool, payload.course_id).await?;
    claims.ensure_manages(course.instructor_id)?;

    let mut tx = pool.begin().await?;

    let exam_id: i64 = sqlx::query_scalar(
        "INSERT INTO exams (course_id, title, description, time_limit, published_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING id",
    )
    .bind(course.id)
    .bind(payload.title.trim())
    .bind(clean_optional(payload.description.as_deref()))
    .bind(payload.time_limit.unwrap_or(30))
    .bind(chrono::Utc::now())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create exam: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for input in &payload.questions {
        insert_question(&mut tx, exam_id, input).await?;
    }

    tx.commit().await?;

    tracing::info!(exam_id, questions = payload.questions.len(), "Created exam");

    // Students who have started the course hear about the new exam.
    let followers: Vec<i64> = sqlx::query_scalar(
        "SELECT DISTINCT lp.student_id
         FROM lesson_progress lp
         JOIN lessons l ON l.id = lp.lesson_id
         WHERE l.course_id = $1",
    )
    .bind(course.id)
    .fetch_all(&pool)
    .await?;

    for student_id in followers {
        notifier::dispatch(
            &pool,
            NewNotification {
                user_id: student_id,
                title: "New Exam Available".to_string(),
                message: format!(
                    "A new exam '{}' has been published for {}",
                    payload.title.trim(),
                    course.title
                ),
                kind: NotificationKind::Info,
            },
        )
        .await;
    }

    let summary = find_summary(&pool, exam_id).await?;
    Ok((StatusCode::CREATED, Json(summary)))
}

/// Updates exam fields. Questions are managed separately.
pub async fn update_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let summary = find_summary(&pool, id).await?;
    claims.ensure_manages(summary.instructor_id)?;

    if payload.title.is_none() && payload.description.is_none() && payload.time_limit.is_none() {
        return Ok(Json(summary));
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE exams SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title.trim().to_string());
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(clean_optional(Some(description.as_str())));
    }

    if let Some(time_limit) = payload.time_limit {
        separated.push("time_limit = ");
        separated.push_bind_unseparated(time_limit);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update exam: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(find_summary(&pool, id).await?))
}

/// Deletes an exam together with its questions, attempts and certificates.
pub async fn delete_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = find_summary(&pool, id).await?;
    claims.ensure_manages(summary.instructor_id)?;

    sqlx::query("DELETE FROM exams WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete exam: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Adds one question to an existing exam.
pub async fn add_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<QuestionInput>,
) -> Result<impl IntoResponse, AppError> {
    let summary = find_summary(&pool, exam_id).await?;
    claims.ensure_manages(summary.instructor_id)?;

    let mut conn = pool.acquire().await?;
    let question = insert_question(&mut conn, exam_id, &payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(QuestionView::from_question(question, true)),
    ))
}

/// Deletes a question by ID.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam_id: i64 = sqlx::query_scalar("SELECT exam_id FROM questions WHERE id = $1")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let summary = find_summary(&pool, exam_id).await?;
    claims.ensure_manages(summary.instructor_id)?;

    sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Opens or resumes the caller's attempt at an exam.
pub async fn start_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = grading::start_attempt(&pool, claims.user_id()?, exam_id).await?;
    Ok(Json(attempt))
}

/// Submits the caller's answers, grades the attempt and issues a certificate on pass.
pub async fn submit_exam(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    ValidatedJson(req): ValidatedJson<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let policy = GradingPolicy {
        strict_answer_matching: config.strict_answer_matching,
    };

    let result =
        grading::submit_exam(&pool, claims.user_id()?, exam_id, &req.answers, policy).await?;

    Ok(Json(result))
}

/// Lists every attempt at an exam with earned/total points. Owner only.
pub async fn list_submissions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = find_summary(&pool, exam_id).await?;
    claims.ensure_manages(summary.instructor_id)?;

    let rows = sqlx::query_as::<_, SubmissionRow>(
        r#"
        SELECT
            a.id,
            a.student_id,
            u.username AS student_name,
            (SELECT COALESCE(SUM(q.mark), 0)
               FROM answers an
               JOIN questions q ON q.id = an.question_id
              WHERE an.attempt_id = a.id AND an.is_correct = 1) AS earned_points,
            $2 AS total_points,
            ROUND(COALESCE(a.score, 0.0), 2) AS percentage,
            a.is_passed,
            a.finished_at AS submitted_at
        FROM attempts a
        JOIN users u ON u.id = a.student_id
        WHERE a.exam_id = $1
        ORDER BY a.id
        "#,
    )
    .bind(exam_id)
    .bind(summary.total_marks)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list submissions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(rows))
}
