// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One of the four fixed answer identifiers of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
pub enum Choice {
    A,
    B,
    C,
    D,
}

impl Choice {
    /// Fixed order used when matching option texts.
    pub const ALL: [Choice; 4] = [Choice::A, Choice::B, Choice::C, Choice::D];

    /// Parses an exact identifier. Callers upper-case and trim first.
    pub fn from_letter(letter: &str) -> Option<Choice> {
        match letter {
            "A" => Some(Choice::A),
            "B" => Some(Choice::B),
            "C" => Some(Choice::C),
            "D" => Some(Choice::D),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Choice::A => "A",
            Choice::B => "B",
            Choice::C => "C",
            Choice::D => "D",
        }
    }
}

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,

    /// Minutes.
    pub time_limit: i64,

    pub published_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub exam_id: i64,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: Choice,

    /// Points awarded for a correct answer. Always >= 1.
    pub mark: i64,
}

impl Question {
    /// Option texts in A–D order.
    pub fn options(&self) -> [&str; 4] {
        [
            self.option_a.as_str(),
            self.option_b.as_str(),
            self.option_c.as_str(),
            self.option_d.as_str(),
        ]
    }
}

/// DTO for sending a question to clients.
/// `correct_option` is only filled in for the owning instructor.
#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: i64,
    pub question_text: String,
    pub options: [String; 4],
    pub mark: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option: Option<Choice>,
}

impl QuestionView {
    pub fn from_question(q: Question, reveal_answer: bool) -> Self {
        Self {
            id: q.id,
            correct_option: reveal_answer.then_some(q.correct_option),
            mark: q.mark,
            question_text: q.question_text,
            options: [q.option_a, q.option_b, q.option_c, q.option_d],
        }
    }
}

/// Exam row enriched with course and question aggregates.
#[derive(Debug, Serialize, FromRow)]
pub struct ExamSummary {
    pub id: i64,
    pub course_id: i64,
    pub course_title: String,
    pub instructor_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub time_limit: i64,
    pub published_at: chrono::DateTime<chrono::Utc>,
    pub question_count: i64,
    /// Sum of question marks.
    pub total_marks: i64,
}

#[derive(Debug, Serialize)]
pub struct ExamDetail {
    #[serde(flatten)]
    pub summary: ExamSummary,
    pub questions: Vec<QuestionView>,
}

/// DTO for a question in exam authoring.
#[derive(Debug, Deserialize, Validate)]
pub struct QuestionInput {
    #[serde(alias = "text")]
    #[validate(length(min = 1, max = 5000))]
    pub question_text: String,

    /// Exactly four option texts, A–D.
    #[validate(custom(function = validate_four_options))]
    pub options: Vec<String>,

    /// 'A'..'D', case-insensitive.
    #[serde(alias = "correctAnswer")]
    #[validate(custom(function = validate_choice_letter))]
    pub correct_option: String,

    #[serde(alias = "points", default = "default_mark")]
    #[validate(range(min = 1, max = 1000))]
    pub mark: i64,
}

impl QuestionInput {
    pub fn correct_choice(&self) -> Option<Choice> {
        Choice::from_letter(self.correct_option.trim().to_uppercase().as_str())
    }
}

fn default_mark() -> i64 {
    1
}

fn validate_four_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() != 4 {
        return Err(validator::ValidationError::new("exactly_four_options_required"));
    }
    for opt in options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 255 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

fn validate_choice_letter(letter: &str) -> Result<(), validator::ValidationError> {
    match Choice::from_letter(letter.trim().to_uppercase().as_str()) {
        Some(_) => Ok(()),
        None => Err(validator::ValidationError::new("correct_option_must_be_a_to_d")),
    }
}

/// DTO for creating an exam with nested questions.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    pub course_id: i64,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    /// Minutes, defaults to 30.
    #[validate(range(min = 1, max = 1440))]
    pub time_limit: Option<i64>,
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// DTO for updating an exam. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateExamRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    #[validate(length(max = 10000))]
    pub description: Option<String>,
    #[validate(range(min = 1, max = 1440))]
    pub time_limit: Option<i64>,
}
