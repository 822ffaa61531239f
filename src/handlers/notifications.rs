// src/handlers/notifications.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{error::AppError, models::notification::Notification, utils::jwt::Claims};

/// The caller's notifications, newest first.
pub async fn list_notifications(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let notifications = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, title, message, kind, is_read, created_at
        FROM notifications
        WHERE user_id = $1
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list notifications: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(notifications))
}

/// Marks one of the caller's notifications as read.
pub async fn mark_as_read(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(claims.user_id()?)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(Json(json!({ "id": id, "is_read": true })))
}

/// Marks all of the caller's unread notifications as read.
pub async fn mark_all_as_read(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = $1 AND is_read = 0")
        .bind(claims.user_id()?)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "updated": result.rows_affected() })))
}
