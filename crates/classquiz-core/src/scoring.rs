//! Percentage scoring of an answer vector.

use crate::model::{AnswerVector, Question};

/// Number of answers that exactly match the question's correct answer.
///
/// Unanswered slots never match, even when a question has no correct answer.
pub fn count_correct(questions: &[Question], answers: &AnswerVector) -> usize {
    questions
        .iter()
        .enumerate()
        .filter(|(i, q)| answers.get(*i).is_some_and(|a| q.is_correct(a)))
        .count()
}

/// Score as a rounded percentage in `0..=100`.
///
/// Rounds half up. A quiz with no questions scores 0.
pub fn score(questions: &[Question], answers: &AnswerVector) -> u8 {
    percentage(count_correct(questions, answers), questions.len())
}

/// `round(part / whole * 100)` with half-up rounding; 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    let part = part.min(whole) as u64;
    let whole = whole as u64;
    ((part * 200 + whole) / (whole * 2)) as u8
}
