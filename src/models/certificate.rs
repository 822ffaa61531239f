// src/models/certificate.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'certificates' table. One-to-one with a passing attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Certificate {
    pub id: i64,
    pub attempt_id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    pub certificate_code: String,
    pub verification_code: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

/// Certificate joined with student and exam names.
#[derive(Debug, Serialize, FromRow)]
pub struct CertificateView {
    pub id: i64,
    pub attempt_id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub exam_id: i64,
    pub exam_title: String,
    pub course_title: String,
    pub score: Option<f64>,
    pub certificate_code: String,
    pub verification_code: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}
