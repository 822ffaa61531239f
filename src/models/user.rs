// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Platform role. Stored lowercase in `users.role` and carried in JWT claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl Role {
    /// Whether a caller with this role may pass a gate that requires `required`.
    ///
    /// Admins pass instructor and admin gates. Exam taking stays student-only.
    pub fn satisfies(self, required: Role) -> bool {
        match (self, required) {
            (Role::Student, Role::Student) => true,
            (Role::Student, Role::Instructor | Role::Admin) => false,
            (Role::Instructor, Role::Instructor) => true,
            (Role::Instructor, Role::Student | Role::Admin) => false,
            (Role::Admin, Role::Instructor | Role::Admin) => true,
            (Role::Admin, Role::Student) => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique login identifier.
    pub email: String,

    /// Unique display name.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    pub role: Role,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    /// Derived from the email's local part when omitted.
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: Option<String>,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    /// 'student' (default) or 'instructor'. Admins are seeded, never registered.
    pub role: Option<Role>,
}

impl CreateUserRequest {
    pub fn resolved_username(&self) -> String {
        match &self.username {
            Some(name) => name.trim().to_string(),
            None => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 254))]
    pub email: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
