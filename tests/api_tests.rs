// tests/api_tests.rs

mod common;

use common::{seeded_exam, spawn_app, two_questions};
use lms_backend::models::user::Role;
use serde_json::{Value, json};

fn unique_email() -> String {
    format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .client
        .get(&format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    // Arrange
    let app = spawn_app().await;
    let email = unique_email();

    // Act
    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "email": email,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], email.as_str());
    assert_eq!(body["role"], "student");
    // Username falls back to the email's local part.
    assert_eq!(body["username"], email.split('@').next().unwrap());
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn register_fails_validation() {
    // Arrange
    let app = spawn_app().await;

    // Act: Send an address that is not an email
    let response = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({
            "email": "not-an-email",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn register_rejects_duplicates_and_admins() {
    // Arrange
    let app = spawn_app().await;
    let email = unique_email();
    let payload = json!({ "email": email, "password": "password123", "role": "instructor" });

    // Act
    let first = app
        .client
        .post(app.url("/auth/register"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    let second = app
        .client
        .post(app.url("/auth/register"))
        .json(&payload)
        .send()
        .await
        .unwrap();
    let admin = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({ "email": unique_email(), "password": "password123", "role": "admin" }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 409);
    assert_eq!(admin.status().as_u16(), 403);
}

#[tokio::test]
async fn login_and_me_flow() {
    // Arrange
    let app = spawn_app().await;
    let email = unique_email();
    let password = "password123";

    app.client
        .post(app.url("/auth/register"))
        .json(&json!({ "email": email, "username": "ferris", "password": password }))
        .send()
        .await
        .expect("Register failed");

    // Act
    let login_resp: Value = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": email.to_uppercase(), "password": password }))
        .send()
        .await
        .expect("Login failed")
        .json()
        .await
        .expect("Failed to parse login json");

    let token = login_resp["token"].as_str().expect("Token not found");

    let me = app
        .client
        .get(app.url("/auth/me"))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap();

    let wrong_password = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": email, "password": "nope1234" }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(login_resp["type"], "Bearer");
    assert_eq!(login_resp["user"]["username"], "ferris");
    assert_eq!(me.status().as_u16(), 200);
    let me: Value = me.json().await.unwrap();
    assert_eq!(me["email"], email.as_str());
    assert_eq!(wrong_password.status().as_u16(), 401);
}

#[tokio::test]
async fn protected_routes_require_a_valid_token() {
    let app = spawn_app().await;

    let missing = app.client.get(app.url("/auth/me")).send().await.unwrap();
    let garbage = app
        .client
        .get(app.url("/notifications"))
        .bearer_auth("not.a.jwt")
        .send()
        .await
        .unwrap();

    assert_eq!(missing.status().as_u16(), 401);
    assert_eq!(garbage.status().as_u16(), 401);
}

#[tokio::test]
async fn students_cannot_author_courses() {
    // Arrange
    let app = spawn_app().await;
    let (_, student) = app.seed_user(Role::Student).await;

    // Act
    let response = app
        .client
        .post(app.url("/courses"))
        .bearer_auth(&student)
        .json(&json!({ "title": "Sneaky course" }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn course_catalogue_with_lessons() {
    // Arrange
    let app = spawn_app().await;
    let (_, instructor) = app.seed_user(Role::Instructor).await;
    let (_, rival) = app.seed_user(Role::Instructor).await;
    let course_id = app.create_course(&instructor).await;
    let lessons_url = app.url(&format!("/courses/{}/lessons", course_id));

    // Act
    let first = app
        .client
        .post(&lessons_url)
        .bearer_auth(&instructor)
        .json(&json!({ "title": "Borrowing", "video_url": "https://videos.example.com/1.mp4" }))
        .send()
        .await
        .unwrap();
    let second = app
        .client
        .post(&lessons_url)
        .bearer_auth(&instructor)
        .json(&json!({ "title": "Lifetimes" }))
        .send()
        .await
        .unwrap();
    let clash = app
        .client
        .post(&lessons_url)
        .bearer_auth(&instructor)
        .json(&json!({ "title": "Traits", "position": 1 }))
        .send()
        .await
        .unwrap();
    let bad_url = app
        .client
        .post(&lessons_url)
        .bearer_auth(&instructor)
        .json(&json!({ "title": "Traits", "video_url": "ftp://example.com/x" }))
        .send()
        .await
        .unwrap();
    let foreign = app
        .client
        .post(&lessons_url)
        .bearer_auth(&rival)
        .json(&json!({ "title": "Hijack" }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(first.status().as_u16(), 201);
    assert_eq!(second.status().as_u16(), 201);
    assert_eq!(clash.status().as_u16(), 409);
    assert_eq!(bad_url.status().as_u16(), 400);
    assert_eq!(foreign.status().as_u16(), 403);

    let detail: Value = app
        .client
        .get(app.url(&format!("/courses/{}", course_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let lessons = detail["lessons"].as_array().unwrap();
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[1]["title"], "Lifetimes");
    assert_eq!(lessons[1]["position"], 2);
    // Script tags are stripped from descriptions.
    assert!(!detail["description"].as_str().unwrap().contains("<script>"));

    let listed: Vec<Value> = app
        .client
        .get(app.url("/courses"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["lesson_count"], 2);

    let missing = app.client.get(app.url("/courses/9999")).send().await.unwrap();
    assert_eq!(missing.status().as_u16(), 404);
}

#[tokio::test]
async fn exam_questions_need_four_options() {
    // Arrange
    let app = spawn_app().await;
    let (_, instructor) = app.seed_user(Role::Instructor).await;
    let course_id = app.create_course(&instructor).await;

    // Act
    let response = app
        .client
        .post(app.url("/exams"))
        .bearer_auth(&instructor)
        .json(&json!({
            "course_id": course_id,
            "title": "Broken exam",
            "questions": [{
                "question_text": "Pick one",
                "options": ["a", "b", "c"],
                "correct_option": "A"
            }]
        }))
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(app.count("SELECT COUNT(*) FROM exams").await, 0);
}

#[tokio::test]
async fn answers_are_only_revealed_to_the_owner() {
    // Arrange
    let app = spawn_app().await;
    let (instructor, exam_id, _) = seeded_exam(&app).await;
    let (_, student) = app.seed_user(Role::Student).await;
    let url = app.url(&format!("/exams/{}", exam_id));

    // Act
    let owner_view: Value = app
        .client
        .get(&url)
        .bearer_auth(&instructor)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let student_view: Value = app
        .client
        .get(&url)
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(owner_view["question_count"], 2);
    assert_eq!(owner_view["total_marks"], 2);
    assert_eq!(owner_view["questions"][1]["correct_option"], "B");
    assert_eq!(student_view["questions"].as_array().unwrap().len(), 2);
    assert!(student_view["questions"][0].get("correct_option").is_none());
    assert_eq!(student_view["questions"][1]["options"][1], "Box");
}

#[tokio::test]
async fn exam_management_is_owner_scoped() {
    // Arrange
    let app = spawn_app().await;
    let (instructor, exam_id, questions) = seeded_exam(&app).await;
    let (_, rival) = app.seed_user(Role::Instructor).await;
    let (_, admin) = app.seed_user(Role::Admin).await;
    let exam_url = app.url(&format!("/exams/{}", exam_id));

    // Act
    let rename = app
        .client
        .put(&exam_url)
        .bearer_auth(&instructor)
        .json(&json!({ "title": "Ownership and borrowing", "time_limit": 45 }))
        .send()
        .await
        .unwrap();
    let added = app
        .client
        .post(app.url(&format!("/exams/{}/questions", exam_id)))
        .bearer_auth(&instructor)
        .json(&json!({
            "text": "Which trait enables `?` conversions?",
            "options": ["From", "Into", "AsRef", "Deref"],
            "correctAnswer": "A",
            "points": 3
        }))
        .send()
        .await
        .unwrap();
    let rival_delete = app
        .client
        .delete(app.url(&format!("/questions/{}", questions[0])))
        .bearer_auth(&rival)
        .send()
        .await
        .unwrap();
    let owner_delete = app
        .client
        .delete(app.url(&format!("/questions/{}", questions[0])))
        .bearer_auth(&instructor)
        .send()
        .await
        .unwrap();
    let rival_exam_delete = app
        .client
        .delete(&exam_url)
        .bearer_auth(&rival)
        .send()
        .await
        .unwrap();

    // Assert
    assert_eq!(rename.status().as_u16(), 200);
    let renamed: Value = rename.json().await.unwrap();
    assert_eq!(renamed["title"], "Ownership and borrowing");
    assert_eq!(renamed["time_limit"], 45);
    assert_eq!(added.status().as_u16(), 201);
    let added: Value = added.json().await.unwrap();
    assert_eq!(added["mark"], 3);
    assert_eq!(rival_delete.status().as_u16(), 403);
    assert_eq!(owner_delete.status().as_u16(), 204);
    assert_eq!(rival_exam_delete.status().as_u16(), 403);

    // Admins may manage any exam.
    let admin_delete = app
        .client
        .delete(&exam_url)
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(admin_delete.status().as_u16(), 204);
    assert_eq!(app.count("SELECT COUNT(*) FROM questions").await, 0);
}

#[tokio::test]
async fn instructors_list_only_their_exams() {
    // Arrange
    let app = spawn_app().await;
    let (instructor, _, _) = seeded_exam(&app).await;
    let (_, rival) = app.seed_user(Role::Instructor).await;
    let rival_course = app.create_course(&rival).await;
    app.create_exam(&rival, rival_course, two_questions()).await;
    let (_, student) = app.seed_user(Role::Student).await;

    // Act
    let own: Vec<Value> = app
        .client
        .get(app.url("/exams"))
        .bearer_auth(&instructor)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let everything: Vec<Value> = app
        .client
        .get(app.url("/exams"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(own.len(), 1);
    assert_eq!(everything.len(), 2);
}

#[tokio::test]
async fn lesson_progress_is_tracked_per_course() {
    // Arrange
    let app = spawn_app().await;
    let (_, instructor) = app.seed_user(Role::Instructor).await;
    let (_, student) = app.seed_user(Role::Student).await;
    let course_id = app.create_course(&instructor).await;
    let first = app.create_lesson(&instructor, course_id, "Borrowing").await;
    app.create_lesson(&instructor, course_id, "Lifetimes").await;

    let put = |token: &str, lesson_id: i64, body: Value| {
        app.client
            .put(app.url(&format!("/lessons/{}/progress", lesson_id)))
            .bearer_auth(token)
            .json(&body)
            .send()
    };

    // Act: partial progress, completion, then a lower value.
    let partial: Value = put(&student, first, json!({ "progress_percent": 40 }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let done = put(&student, first, json!({ "is_completed": true })).await.unwrap();
    assert_eq!(done.status().as_u16(), 200);
    let done: Value = done.json().await.unwrap();
    let later: Value = put(&student, first, json!({ "progress_percent": 30 }))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(partial["progress_percent"], 40);
    assert_eq!(partial["is_completed"], false);
    assert!(partial["completed_at"].is_null());

    assert_eq!(done["progress_percent"], 100);
    assert_eq!(done["is_completed"], true);
    assert!(done["completed_at"].is_string());

    assert_eq!(later["progress_percent"], 100);
    assert_eq!(later["is_completed"], true);
    assert_eq!(later["completed_at"], done["completed_at"]);

    for body in [json!({ "progress_percent": 150 }), json!({})] {
        let rejected = put(&student, first, body).await.unwrap();
        assert_eq!(rejected.status().as_u16(), 400);
    }
    let forbidden = put(&instructor, first, json!({ "progress_percent": 10 }))
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
    let missing = put(&student, 999_999, json!({ "progress_percent": 10 }))
        .await
        .unwrap();
    assert_eq!(missing.status().as_u16(), 404);

    let summary: Value = app
        .client
        .get(app.url(&format!("/courses/{}/progress", course_id)))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["total_lessons"], 2);
    assert_eq!(summary["completed_lessons"], 1);
    assert_eq!(summary["progress_percent"].as_f64(), Some(50.0));
    assert_eq!(summary["lessons"].as_array().unwrap().len(), 1);

    let inbox: Vec<Value> = app
        .client
        .get(app.url("/notifications"))
        .bearer_auth(&student)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["title"], "New Achievement");
    assert_eq!(inbox[0]["kind"], "success");
}

#[tokio::test]
async fn students_following_a_course_hear_about_new_exams() {
    // Arrange
    let app = spawn_app().await;
    let (_, instructor) = app.seed_user(Role::Instructor).await;
    let (_, follower) = app.seed_user(Role::Student).await;
    let (_, bystander) = app.seed_user(Role::Student).await;
    let course_id = app.create_course(&instructor).await;
    let lesson_id = app.create_lesson(&instructor, course_id, "Borrowing").await;

    let response = app
        .client
        .put(app.url(&format!("/lessons/{}/progress", lesson_id)))
        .bearer_auth(&follower)
        .json(&json!({ "progress_percent": 20 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Act
    app.create_exam(&instructor, course_id, two_questions()).await;

    // Assert
    let inbox = |token: String| {
        let request = app.client.get(app.url("/notifications")).bearer_auth(token);
        async move {
            request
                .send()
                .await
                .unwrap()
                .json::<Vec<Value>>()
                .await
                .unwrap()
        }
    };

    let followed = inbox(follower).await;
    assert_eq!(followed.len(), 1);
    assert_eq!(followed[0]["title"], "New Exam Available");
    assert_eq!(followed[0]["kind"], "info");
    assert!(
        followed[0]["message"]
            .as_str()
            .unwrap()
            .contains("Ownership basics")
    );

    assert!(inbox(bystander).await.is_empty());
}
