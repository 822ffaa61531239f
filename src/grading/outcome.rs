//! Persists grading results: finishing an attempt and issuing its certificate.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    config::{CERTIFICATE_CODE_ATTEMPTS, CERTIFICATE_CODE_LENGTH},
    error::AppError,
    grading::score::ScoreCard,
    models::{attempt::Attempt, certificate::Certificate},
    utils::codes::generate_code,
};

const CERTIFICATE_COLUMNS: &str =
    "id, attempt_id, student_id, exam_id, certificate_code, verification_code, issued_at";

/// Moves an open attempt to FINISHED with the given score card.
///
/// Compare-and-swap on `finished_at IS NULL`: returns `false` when the attempt
/// was already finished, in which case nothing is written.
pub async fn finish_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
    card: &ScoreCard,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE attempts SET score = $1, is_passed = $2, finished_at = $3
         WHERE id = $4 AND finished_at IS NULL",
    )
    .bind(card.score)
    .bind(card.is_passed)
    .bind(now)
    .bind(attempt_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn find_certificate_for_attempt(
    conn: &mut SqliteConnection,
    attempt_id: i64,
) -> Result<Option<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(&format!(
        "SELECT {CERTIFICATE_COLUMNS} FROM certificates WHERE attempt_id = $1"
    ))
    .bind(attempt_id)
    .fetch_optional(&mut *conn)
    .await
}

async fn code_in_use(conn: &mut SqliteConnection, code: &str) -> Result<bool, sqlx::Error> {
    let hit: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM certificates WHERE certificate_code = $1 OR verification_code = $1 LIMIT 1",
    )
    .bind(code)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(hit.is_some())
}

/// Draws a code that is not yet used by any certificate, in either column.
async fn fresh_code(
    conn: &mut SqliteConnection,
    taken: Option<&str>,
) -> Result<Option<String>, sqlx::Error> {
    for _ in 0..CERTIFICATE_CODE_ATTEMPTS {
        let code = generate_code(CERTIFICATE_CODE_LENGTH);
        if Some(code.as_str()) == taken {
            continue;
        }
        if !code_in_use(conn, &code).await? {
            return Ok(Some(code));
        }
    }
    Ok(None)
}

/// Issues the certificate for a passing attempt, once.
///
/// Returns the existing certificate when the attempt already has one.
pub async fn issue_certificate(
    conn: &mut SqliteConnection,
    attempt: &Attempt,
    now: DateTime<Utc>,
) -> Result<Certificate, AppError> {
    if let Some(existing) = find_certificate_for_attempt(conn, attempt.id).await? {
        return Ok(existing);
    }

    let certificate_code = fresh_code(conn, None).await?.ok_or_else(exhausted)?;
    let verification_code = fresh_code(conn, Some(&certificate_code))
        .await?
        .ok_or_else(exhausted)?;

    let inserted = sqlx::query_as::<_, Certificate>(&format!(
        "INSERT INTO certificates
            (attempt_id, student_id, exam_id, certificate_code, verification_code, issued_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (attempt_id) DO NOTHING
         RETURNING {CERTIFICATE_COLUMNS}"
    ))
    .bind(attempt.id)
    .bind(attempt.student_id)
    .bind(attempt.exam_id)
    .bind(&certificate_code)
    .bind(&verification_code)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| AppError::conflict_on_unique(e, "Certificate code collision, please retry"))?;

    match inserted {
        Some(certificate) => {
            tracing::info!(
                attempt_id = attempt.id,
                certificate_code = %certificate.certificate_code,
                "Issued certificate"
            );
            Ok(certificate)
        }
        None => find_certificate_for_attempt(conn, attempt.id)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Certificate vanished after conflict".to_string())),
    }
}

fn exhausted() -> AppError {
    AppError::InternalServerError("Could not generate a unique certificate code".to_string())
}
