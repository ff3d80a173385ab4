//! The `classquiz validate` command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use classquiz_core::parser::{load_quiz_document, validate_questions};

pub fn execute(quiz_path: PathBuf) -> Result<()> {
    let files = if quiz_path.is_dir() {
        quiz_files(&quiz_path)?
    } else {
        vec![quiz_path]
    };

    let mut total_warnings = 0;

    for file in &files {
        let doc = load_quiz_document(file)?;
        let Some(questions) = doc.questions() else {
            println!("Quiz: {} (unreadable payload)", doc.title());
            println!("  WARNING: quiz payload is not a question list");
            total_warnings += 1;
            continue;
        };

        println!("Quiz: {} ({} questions)", doc.title(), questions.len());

        let warnings = validate_questions(&questions);
        for w in &warnings {
            let prefix = w
                .question
                .map(|i| format!("  [Q{}]", i + 1))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All quizzes valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}

fn quiz_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
