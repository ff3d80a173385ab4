//! The `classquiz score` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use classquiz_core::model::AnswerVector;
use classquiz_core::parser::load_quiz_document;
use classquiz_core::scoring::{count_correct, percentage};

pub fn execute(quiz_path: PathBuf, answers_path: PathBuf) -> Result<()> {
    let doc = load_quiz_document(&quiz_path)?;
    let questions = doc.assessable_questions()?;

    let content = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("failed to read answers: {}", answers_path.display()))?;
    let answers: AnswerVector = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse answers: {}", answers_path.display()))?;

    if answers.len() != questions.len() {
        eprintln!(
            "Note: {} answers for {} questions; missing answers count as wrong.",
            answers.len(),
            questions.len()
        );
    }

    let correct = count_correct(&questions, &answers);
    println!(
        "Score: {}% ({correct}/{} correct, {} answered)",
        percentage(correct, questions.len()),
        questions.len(),
        answers.answered_count()
    );

    Ok(())
}
