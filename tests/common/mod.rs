// tests/common/mod.rs

#![allow(dead_code)]

use std::{path::PathBuf, time::Duration};

use lms_backend::{config::Config, models::user::Role, routes, state::AppState, utils::jwt::sign_jwt};
use serde_json::{Value, json};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub struct TestApp {
    pub address: String,
    pub pool: SqlitePool,
    pub config: Config,
    pub client: reqwest::Client,
}

/// Spawns the app on a random port over a fresh in-memory database.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(false).await
}

pub async fn spawn_app_with(strict_answer_matching: bool) -> TestApp {
    // One connection that never expires: the in-memory database lives with it.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        log_dir: "logs".to_string(),
        bind_addr: ([127, 0, 0, 1], 0).into(),
        strict_answer_matching,
        admin_email: None,
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
    };
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        pool,
        config,
        client: reqwest::Client::new(),
    }
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.address, path)
    }

    /// Inserts a user directly and returns its id with a signed token.
    pub async fn seed_user(&self, role: Role) -> (i64, String) {
        let tag = uuid::Uuid::new_v4().simple().to_string();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (email, username, password, role, created_at)
             VALUES ($1, $2, 'not-a-real-hash', $3, $4)
             RETURNING id",
        )
        .bind(format!("{}@example.com", tag))
        .bind(format!("user_{}", &tag[..12]))
        .bind(role)
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await
        .expect("Failed to seed user");

        let token = sign_jwt(id, role, &self.config.jwt_secret, 600).unwrap();
        (id, token)
    }

    pub async fn create_course(&self, token: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/courses"))
            .bearer_auth(token)
            .json(&json!({
                "title": "Rust for Backend Developers",
                "description": "<p>Ownership, async and <script>alert(1)</script>axum</p>",
                "price_cents": 4900
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_exam(&self, token: &str, course_id: i64, questions: Value) -> i64 {
        let response = self
            .client
            .post(self.url("/exams"))
            .bearer_auth(token)
            .json(&json!({
                "course_id": course_id,
                "title": "Ownership basics",
                "questions": questions
            }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn create_lesson(&self, token: &str, course_id: i64, title: &str) -> i64 {
        let response = self
            .client
            .post(self.url(&format!("/courses/{}/lessons", course_id)))
            .bearer_auth(token)
            .json(&json!({ "title": title }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status().as_u16(), 201);

        let body: Value = response.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }

    pub async fn question_ids(&self, exam_id: i64) -> Vec<i64> {
        sqlx::query_scalar("SELECT id FROM questions WHERE exam_id = $1 ORDER BY id")
            .bind(exam_id)
            .fetch_all(&self.pool)
            .await
            .unwrap()
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }

    pub async fn submit(&self, token: &str, exam_id: i64, answers: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/exams/{}/submit", exam_id)))
            .bearer_auth(token)
            .json(&json!({ "answers": answers }))
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// Two single-mark questions; the first is answered by `A`, the second by `B`.
pub fn two_questions() -> Value {
    json!([
        {
            "question_text": "Which keyword introduces a binding?",
            "options": ["let", "mut", "static", "ref"],
            "correct_option": "A"
        },
        {
            "question_text": "Which type puts a value on the heap?",
            "options": ["Rc", "Box", "Arc", "Cell"],
            "correct_option": "b"
        }
    ])
}

/// An instructor-owned exam built from `two_questions`.
/// Returns (instructor token, exam id, question ids).
pub async fn seeded_exam(app: &TestApp) -> (String, i64, Vec<i64>) {
    let (_, instructor) = app.seed_user(Role::Instructor).await;
    let course_id = app.create_course(&instructor).await;
    let exam_id = app.create_exam(&instructor, course_id, two_questions()).await;
    let questions = app.question_ids(exam_id).await;
    (instructor, exam_id, questions)
}

/// A database file with several pooled connections, for tests that need
/// writers to actually contend for SQLite's lock.
pub struct FileDb {
    pub pool: SqlitePool,
    path: PathBuf,
}

impl FileDb {
    pub async fn new() -> Self {
        let path = std::env::temp_dir().join(format!("lms-test-{}.db", uuid::Uuid::new_v4()));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .expect("Failed to open SQLite file");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to migrate database");

        FileDb { pool, path }
    }

    /// Seeds a student and a two-question exam (answers A and B).
    /// Returns (student id, exam id, question ids).
    pub async fn seed_exam(&self) -> (i64, i64, Vec<i64>) {
        let now = chrono::Utc::now();
        let mut user_ids = Vec::new();
        for (name, role) in [("lecturer", Role::Instructor), ("learner", Role::Student)] {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO users (email, username, password, role, created_at)
                 VALUES ($1, $2, 'not-a-real-hash', $3, $4)
                 RETURNING id",
            )
            .bind(format!("{}@example.com", name))
            .bind(name)
            .bind(role)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .unwrap();
            user_ids.push(id);
        }

        let course_id: i64 = sqlx::query_scalar(
            "INSERT INTO courses (instructor_id, title, description, price_cents, created_at)
             VALUES ($1, 'Concurrency', '', 0, $2)
             RETURNING id",
        )
        .bind(user_ids[0])
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        let exam_id: i64 = sqlx::query_scalar(
            "INSERT INTO exams (course_id, title, time_limit, published_at)
             VALUES ($1, 'Locks', 30, $2)
             RETURNING id",
        )
        .bind(course_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .unwrap();

        let mut question_ids = Vec::new();
        for correct in ["A", "B"] {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO questions
                    (exam_id, question_text, option_a, option_b, option_c, option_d,
                     correct_option, mark)
                 VALUES ($1, 'Pick one', 'w', 'x', 'y', 'z', $2, 1)
                 RETURNING id",
            )
            .bind(exam_id)
            .bind(correct)
            .fetch_one(&self.pool)
            .await
            .unwrap();
            question_ids.push(id);
        }

        (user_ids[1], exam_id, question_ids)
    }

    pub async fn count(&self, sql: &str) -> i64 {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await.unwrap()
    }

    pub async fn cleanup(self) {
        self.pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}
