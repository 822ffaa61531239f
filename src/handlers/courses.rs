// src/handlers/courses.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    grading::{begin_write, score::percentage},
    models::{
        course::{
            Course, CourseDetail, CourseProgress, CourseSummary, CreateCourseRequest,
            CreateLessonRequest, Lesson, LessonProgress, UpdateProgressRequest,
        },
        notification::{NewNotification, NotificationKind},
    },
    notifier,
    utils::{
        html::{clean_html, clean_optional},
        json::ValidatedJson,
        jwt::Claims,
    },
};

const COURSE_COLUMNS: &str = "id, instructor_id, title, description, price_cents, created_at";
const LESSON_COLUMNS: &str = "id, course_id, title, description, video_url, position";
const PROGRESS_COLUMNS: &str =
    "id, student_id, lesson_id, progress_percent, is_completed, completed_at, updated_at";

/// Completed-lesson totals that earn an achievement notification.
const PROGRESS_MILESTONES: [i64; 4] = [1, 3, 5, 10];

pub(crate) async fn find_course(pool: &SqlitePool, id: i64) -> Result<Course, AppError> {
    sqlx::query_as::<_, Course>(&format!("SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))
}

/// Lists all courses, newest first.
pub async fn list_courses(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, CourseSummary>(
        r#"
        SELECT
            c.id, c.title, c.instructor_id, u.username AS instructor_name,
            c.price_cents, c.created_at,
            (SELECT COUNT(*) FROM lessons l WHERE l.course_id = c.id) AS lesson_count
        FROM courses c
        JOIN users u ON u.id = c.instructor_id
        ORDER BY c.created_at DESC, c.id DESC
        "#,
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list courses: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(courses))
}

/// Course with its instructor name and ordered lessons.
pub async fn get_course(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = find_course(&pool, id).await?;

    let instructor_name: String = sqlx::query_scalar("SELECT username FROM users WHERE id = $1")
        .bind(course.instructor_id)
        .fetch_one(&pool)
        .await?;

    let lessons = sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE course_id = $1 ORDER BY position"
    ))
    .bind(id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(CourseDetail {
        course,
        instructor_name,
        lessons,
    }))
}

/// Creates a course owned by the calling instructor.
pub async fn create_course(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    ValidatedJson(payload): ValidatedJson<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let description = payload
        .description
        .as_deref()
        .map(clean_html)
        .unwrap_or_default();

    let course = sqlx::query_as::<_, Course>(&format!(
        "INSERT INTO courses (instructor_id, title, description, price_cents, created_at)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COURSE_COLUMNS}"
    ))
    .bind(claims.user_id()?)
    .bind(payload.title.trim())
    .bind(description)
    .bind(payload.price_cents.unwrap_or(0))
    .bind(chrono::Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create course: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(course)))
}

/// Adds a lesson to a course owned by the caller.
/// Without an explicit position the lesson is appended.
pub async fn create_lesson(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course = find_course(&pool, course_id).await?;
    claims.ensure_manages(course.instructor_id)?;

    let position = match payload.position {
        Some(position) => position,
        None => {
            let last: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(position), 0) FROM lessons WHERE course_id = $1",
            )
            .bind(course.id)
            .fetch_one(&pool)
            .await?;
            last + 1
        }
    };

    let lesson = sqlx::query_as::<_, Lesson>(&format!(
        "INSERT INTO lessons (course_id, title, description, video_url, position)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {LESSON_COLUMNS}"
    ))
    .bind(course.id)
    .bind(payload.title.trim())
    .bind(clean_optional(payload.description.as_deref()))
    .bind(payload.video_url.as_deref())
    .bind(position)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        AppError::conflict_on_unique(e, format!("Position {} is already taken", position))
    })?;

    Ok((StatusCode::CREATED, Json(lesson)))
}

/// Records the caller's progress on a lesson.
/// Progress never moves backwards and a completed lesson stays completed.
pub async fn update_progress(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(lesson_id): Path<i64>,
    ValidatedJson(payload): ValidatedJson<UpdateProgressRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.progress_percent.is_none() && payload.is_completed.is_none() {
        return Err(AppError::BadRequest(
            "Provide progress_percent or is_completed".to_string(),
        ));
    }

    let student_id = claims.user_id()?;
    let completes = payload.completes();
    let now = chrono::Utc::now();

    let mut tx = begin_write(&pool).await?;

    let lesson: Option<i64> = sqlx::query_scalar("SELECT id FROM lessons WHERE id = $1")
        .bind(lesson_id)
        .fetch_optional(&mut *tx)
        .await?;
    if lesson.is_none() {
        return Err(AppError::NotFound("Lesson not found".to_string()));
    }

    let was_completed: bool = sqlx::query_scalar(
        "SELECT is_completed FROM lesson_progress WHERE student_id = $1 AND lesson_id = $2",
    )
    .bind(student_id)
    .bind(lesson_id)
    .fetch_optional(&mut *tx)
    .await?
    .unwrap_or(false);

    let progress = sqlx::query_as::<_, LessonProgress>(&format!(
        "INSERT INTO lesson_progress
            (student_id, lesson_id, progress_percent, is_completed, completed_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6)
         ON CONFLICT (student_id, lesson_id) DO UPDATE SET
             progress_percent = MAX(lesson_progress.progress_percent, excluded.progress_percent),
             is_completed = lesson_progress.is_completed OR excluded.is_completed,
             completed_at = COALESCE(lesson_progress.completed_at, excluded.completed_at),
             updated_at = excluded.updated_at
         RETURNING {PROGRESS_COLUMNS}"
    ))
    .bind(student_id)
    .bind(lesson_id)
    .bind(payload.percent())
    .bind(completes)
    .bind(completes.then_some(now))
    .bind(now)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to record lesson progress: {:?}", e);
        AppError::from(e)
    })?;

    let completed_total: Option<i64> = if completes && !was_completed {
        Some(
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM lesson_progress WHERE student_id = $1 AND is_completed = 1",
            )
            .bind(student_id)
            .fetch_one(&mut *tx)
            .await?,
        )
    } else {
        None
    };

    tx.commit().await?;

    if let Some(total) = completed_total.filter(|t| PROGRESS_MILESTONES.contains(t)) {
        let noun = if total == 1 { "lesson" } else { "lessons" };
        notifier::dispatch(
            &pool,
            NewNotification {
                user_id: student_id,
                title: "New Achievement".to_string(),
                message: format!("You have completed {} {} so far. Keep it up!", total, noun),
                kind: NotificationKind::Success,
            },
        )
        .await;
    }

    Ok(Json(progress))
}

/// The caller's progress through a course, lesson by lesson.
pub async fn course_progress(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(course_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = find_course(&pool, course_id).await?;

    let total_lessons: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM lessons WHERE course_id = $1")
            .bind(course.id)
            .fetch_one(&pool)
            .await?;

    let lessons = sqlx::query_as::<_, LessonProgress>(
        r#"
        SELECT lp.id, lp.student_id, lp.lesson_id, lp.progress_percent,
               lp.is_completed, lp.completed_at, lp.updated_at
        FROM lesson_progress lp
        JOIN lessons l ON l.id = lp.lesson_id
        WHERE l.course_id = $1 AND lp.student_id = $2
        ORDER BY l.position
        "#,
    )
    .bind(course.id)
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    let completed_lessons = lessons.iter().filter(|p| p.is_completed).count() as i64;

    Ok(Json(CourseProgress {
        course_id: course.id,
        total_lessons,
        completed_lessons,
        progress_percent: percentage(completed_lessons, total_lessons),
        lessons,
    }))
}
