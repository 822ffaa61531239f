// src/notifier.rs

use sqlx::{SqliteExecutor, SqlitePool};

use crate::models::notification::{NewNotification, Notification};

/// Persists an unread notification for `new.user_id`.
pub async fn notify<'e, E>(executor: E, new: &NewNotification) -> Result<Notification, sqlx::Error>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query_as::<_, Notification>(
        "INSERT INTO notifications (user_id, title, message, kind, is_read, created_at)
         VALUES ($1, $2, $3, $4, 0, $5)
         RETURNING id, user_id, title, message, kind, is_read, created_at",
    )
    .bind(new.user_id)
    .bind(&new.title)
    .bind(&new.message)
    .bind(new.kind)
    .bind(chrono::Utc::now())
    .fetch_one(executor)
    .await
}

/// Fire-and-forget delivery: failures are logged, never returned.
pub async fn dispatch(pool: &SqlitePool, new: NewNotification) {
    if let Err(e) = notify(pool, &new).await {
        tracing::warn!(
            user_id = new.user_id,
            title = %new.title,
            "Failed to deliver notification: {:?}",
            e
        );
    }
}
