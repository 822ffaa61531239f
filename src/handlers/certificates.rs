// src/handlers/certificates.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{certificate::CertificateView, user::Role},
    utils::jwt::Claims,
};

const VIEW_SELECT: &str = r#"
    SELECT
        ct.id, ct.attempt_id, ct.student_id, u.username AS student_name,
        ct.exam_id, e.title AS exam_title, c.title AS course_title, a.score,
        ct.certificate_code, ct.verification_code, ct.issued_at
    FROM certificates ct
    JOIN users u ON u.id = ct.student_id
    JOIN exams e ON e.id = ct.exam_id
    JOIN courses c ON c.id = e.course_id
    JOIN attempts a ON a.id = ct.attempt_id
"#;

/// Students see their own certificates; instructors and admins see all.
pub async fn list_certificates(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let certificates = match claims.role {
        Role::Student => {
            sqlx::query_as::<_, CertificateView>(&format!(
                "{VIEW_SELECT} WHERE ct.student_id = $1 ORDER BY ct.issued_at DESC, ct.id DESC"
            ))
            .bind(claims.user_id()?)
            .fetch_all(&pool)
            .await?
        }
        Role::Instructor | Role::Admin => {
            sqlx::query_as::<_, CertificateView>(&format!(
                "{VIEW_SELECT} ORDER BY ct.issued_at DESC, ct.id DESC"
            ))
            .fetch_all(&pool)
            .await?
        }
    };

    Ok(Json(certificates))
}

/// Public lookup of a certificate by its verification code.
pub async fn verify_certificate(
    State(pool): State<SqlitePool>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let code = code.trim().to_uppercase();

    let certificate = sqlx::query_as::<_, CertificateView>(&format!(
        "{VIEW_SELECT} WHERE ct.verification_code = $1"
    ))
    .bind(&code)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("No certificate matches this code".to_string()))?;

    Ok(Json(certificate))
}
