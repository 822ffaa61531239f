// src/models/course.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub instructor_id: i64,
    pub title: String,

    /// Sanitized HTML.
    pub description: String,

    /// Price in the smallest currency unit.
    pub price_cents: i64,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'lessons' table. Ordered by `position` within a course.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub video_url: Option<String>,
    pub position: i64,
}

/// Course joined with its instructor name and lessons.
#[derive(Debug, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub course: Course,
    pub instructor_name: String,
    pub lessons: Vec<Lesson>,
}

/// Row for course listings.
#[derive(Debug, Serialize, FromRow)]
pub struct CourseSummary {
    pub id: i64,
    pub title: String,
    pub instructor_id: i64,
    pub instructor_name: String,
    pub price_cents: i64,
    pub lesson_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 255, message = "Title length must be between 1 and 255 chars"))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price_cents: Option<i64>,
}

/// DTO for adding a lesson to a course.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(custom(function = validate_video_url))]
    pub video_url: Option<String>,
    /// Appended after the last lesson when omitted.
    #[validate(range(min = 1))]
    pub position: Option<i64>,
}

/// Represents the 'lesson_progress' table: one row per (student, lesson).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LessonProgress {
    pub id: i64,
    pub student_id: i64,
    pub lesson_id: i64,
    pub progress_percent: i64,
    pub is_completed: bool,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for reporting progress on a lesson.
/// Reaching 100 percent, or `is_completed: true`, completes the lesson.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProgressRequest {
    #[validate(range(min = 0, max = 100, message = "Progress must be between 0 and 100"))]
    pub progress_percent: Option<i64>,
    pub is_completed: Option<bool>,
}

impl UpdateProgressRequest {
    pub fn completes(&self) -> bool {
        self.is_completed == Some(true) || self.progress_percent == Some(100)
    }

    /// Percentage to store; completion always records 100.
    pub fn percent(&self) -> i64 {
        if self.completes() {
            100
        } else {
            self.progress_percent.unwrap_or(0)
        }
    }
}

/// The caller's progress through one course.
#[derive(Debug, Serialize)]
pub struct CourseProgress {
    pub course_id: i64,
    pub total_lessons: i64,
    pub completed_lessons: i64,
    /// Completed lessons over all lessons, in percent.
    pub progress_percent: f64,
    pub lessons: Vec<LessonProgress>,
}

/// Only absolute http(s) URLs are accepted for lesson videos.
fn validate_video_url(raw: &str) -> Result<(), validator::ValidationError> {
    let url = Url::parse(raw).map_err(|_| validator::ValidationError::new("invalid_url"))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(validator::ValidationError::new("unsupported_url_scheme")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_progress_completes_the_lesson() {
        let req = UpdateProgressRequest {
            progress_percent: Some(100),
            is_completed: None,
        };
        assert!(req.completes());

        let flagged = UpdateProgressRequest {
            progress_percent: Some(40),
            is_completed: Some(true),
        };
        assert!(flagged.completes());
        assert_eq!(flagged.percent(), 100);

        let partial = UpdateProgressRequest {
            progress_percent: Some(40),
            is_completed: Some(false),
        };
        assert!(!partial.completes());
        assert_eq!(partial.percent(), 40);
    }

    #[test]
    fn test_progress_range_is_validated() {
        let req = UpdateProgressRequest {
            progress_percent: Some(150),
            is_completed: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_video_url_validation() {
        assert!(validate_video_url("https://videos.example.com/intro.mp4").is_ok());
        assert!(validate_video_url("ftp://example.com/intro.mp4").is_err());
        assert!(validate_video_url("not a url").is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        let req = CreateCourseRequest {
            title: "Rust".to_string(),
            description: None,
            price_cents: Some(-1),
        };
        assert!(req.validate().is_err());
    }
}
