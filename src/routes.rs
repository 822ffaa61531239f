// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, auth, certificates, courses, exams, notifications},
    state::AppState,
    utils::jwt::{auth_middleware, instructor_middleware, student_middleware},
};

/// Assembles the main application router.
///
/// * Public routes: registration, login, the course catalogue and certificate verification.
/// * Everything else sits behind `auth_middleware`; role gates run inside it.
/// * Applies global middleware (Trace, CORS) and injects `AppState`.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin([
            HeaderValue::from_static("http://localhost:3000"),
            HeaderValue::from_static("http://127.0.0.1:3000"),
        ])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/courses", get(courses::list_courses))
        .route("/courses/{id}", get(courses::get_course))
        .route(
            "/certificates/verify/{code}",
            get(certificates::verify_certificate),
        );

    let instructor_routes = Router::new()
        .route("/courses", post(courses::create_course))
        .route("/courses/{id}/lessons", post(courses::create_lesson))
        .route("/exams", post(exams::create_exam))
        .route(
            "/exams/{id}",
            put(exams::update_exam).delete(exams::delete_exam),
        )
        .route("/exams/{id}/questions", post(exams::add_question))
        .route("/exams/{id}/submissions", get(exams::list_submissions))
        .route("/questions/{id}", delete(exams::delete_question))
        .route_layer(middleware::from_fn(instructor_middleware));

    let student_routes = Router::new()
        .route("/exams/{id}/start", post(exams::start_attempt))
        .route("/exams/{id}/submit", post(exams::submit_exam))
        .route("/attempts/{id}/answers", put(attempts::save_answers))
        .route("/lessons/{id}/progress", put(courses::update_progress))
        .route("/courses/{id}/progress", get(courses::course_progress))
        .route_layer(middleware::from_fn(student_middleware));

    // Auth runs first, then the role gates of the merged groups.
    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/exams", get(exams::list_exams))
        .route("/exams/{id}", get(exams::get_exam))
        .route("/attempts", get(attempts::list_attempts))
        .route("/attempts/{id}", get(attempts::get_attempt))
        .route("/certificates", get(certificates::list_certificates))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/{id}/read",
            post(notifications::mark_as_read),
        )
        .route(
            "/notifications/read-all",
            post(notifications::mark_all_as_read),
        )
        .merge(instructor_routes)
        .merge(student_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
