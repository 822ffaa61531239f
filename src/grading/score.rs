use std::collections::HashMap;

use crate::{
    config::PASSING_SCORE_PERCENTAGE,
    models::exam::{Choice, Question},
};

/// Outcome of scoring one attempt against its exam.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreCard {
    pub earned_points: i64,
    pub total_points: i64,
    pub correct_count: usize,
    /// Percentage in [0, 100].
    pub score: f64,
    pub is_passed: bool,
}

/// Percentage of `earned` over `total`; 0 when the exam carries no marks.
pub fn percentage(earned: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    ((earned as f64 / total as f64) * 100.0).clamp(0.0, 100.0)
}

pub fn is_passing(score: f64) -> bool {
    score >= PASSING_SCORE_PERCENTAGE
}

/// Scores normalized answers (keyed by question id) against every question of the exam.
/// Unanswered questions earn nothing but still count toward the total.
pub fn score_answers(questions: &[Question], answers: &HashMap<i64, Choice>) -> ScoreCard {
    let mut earned_points = 0;
    let mut total_points = 0;
    let mut correct_count = 0;

    for question in questions {
        total_points += question.mark;

        if answers.get(&question.id) == Some(&question.correct_option) {
            earned_points += question.mark;
            correct_count += 1;
        }
    }

    let score = percentage(earned_points, total_points);

    ScoreCard {
        earned_points,
        total_points,
        correct_count,
        score,
        is_passed: is_passing(score),
    }
}
