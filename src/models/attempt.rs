// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::exam::Choice;

/// Represents the 'attempts' table.
/// Open while `finished_at` is NULL; score and pass flag are fixed once finished.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub student_id: i64,
    pub exam_id: i64,
    /// Percentage in [0, 100]. NULL until the attempt is finished.
    pub score: Option<f64>,
    pub is_passed: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Attempt {
    pub fn is_open(&self) -> bool {
        self.finished_at.is_none()
    }
}

/// Represents the 'answers' table. One row per (attempt, question).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub selected_option: Choice,
    pub is_correct: bool,
}

#[derive(Debug, Serialize)]
pub struct AttemptDetail {
    #[serde(flatten)]
    pub attempt: Attempt,
    pub answers: Vec<Answer>,
}

/// One submitted `{question, selected_option}` pair.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmittedAnswer {
    #[serde(alias = "question_id")]
    pub question: i64,
    /// Either a choice letter or the literal option text.
    #[validate(length(max = 1000))]
    pub selected_option: String,
}

/// DTO for submitting (or autosaving) exam answers.
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitExamRequest {
    #[serde(default)]
    #[validate(nested)]
    pub answers: Vec<SubmittedAnswer>,
}

/// Result of a graded submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitExamResponse {
    pub attempt_id: i64,
    pub score: f64,
    pub earned_points: i64,
    pub total_points: i64,
    pub correct_count: usize,
    pub is_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_code: Option<String>,
}

/// Instructor view of one attempt of an exam.
#[derive(Debug, Serialize, FromRow)]
pub struct SubmissionRow {
    pub id: i64,
    pub student_id: i64,
    pub student_name: String,
    pub earned_points: i64,
    pub total_points: i64,
    pub percentage: f64,
    pub is_passed: bool,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}
