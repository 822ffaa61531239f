// src/handlers/attempts.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    config::Config,
    error::AppError,
    grading::{self, GradingPolicy, attempt::ATTEMPT_COLUMNS},
    models::{
        attempt::{Attempt, AttemptDetail, SubmitExamRequest},
        user::Role,
    },
    utils::{json::ValidatedJson, jwt::Claims},
};

/// Students see their own attempts; instructors and admins see all.
pub async fn list_attempts(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let attempts = match claims.role {
        Role::Student => {
            sqlx::query_as::<_, Attempt>(&format!(
                "SELECT {ATTEMPT_COLUMNS} FROM attempts WHERE student_id = $1 ORDER BY id DESC"
            ))
            .bind(claims.user_id()?)
            .fetch_all(&pool)
            .await?
        }
        Role::Instructor | Role::Admin => {
            sqlx::query_as::<_, Attempt>(&format!(
                "SELECT {ATTEMPT_COLUMNS} FROM attempts ORDER BY id DESC"
            ))
            .fetch_all(&pool)
            .await?
        }
    };

    Ok(Json(attempts))
}

/// Attempt with its stored answers.
pub async fn get_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut conn = pool.acquire().await?;

    let attempt = grading::attempt::find_attempt(&mut conn, id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    match claims.role {
        Role::Student => {
            if attempt.student_id != claims.user_id()? {
                return Err(AppError::Forbidden(
                    "You can only view your own attempts".to_string(),
                ));
            }
        }
        Role::Instructor | Role::Admin => {}
    }

    let answers = grading::attempt::list_answers(&mut conn, attempt.id).await?;

    Ok(Json(AttemptDetail { attempt, answers }))
}

/// Autosaves answers into the caller's open attempt without grading it.
pub async fn save_answers(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    ValidatedJson(req): ValidatedJson<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let policy = GradingPolicy {
        strict_answer_matching: config.strict_answer_matching,
    };

    let detail = grading::save_answers(&pool, claims.user_id()?, id, &req.answers, policy).await?;

    Ok(Json(detail))
}
