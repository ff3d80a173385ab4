//! Quiz payload normalization.
//!
//! Turns whatever shape the quiz generator produced into the canonical
//! question sequence, loads quiz documents from disk, and validates them.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

use crate::model::{Question, QuizDocument};

/// The accepted quiz payload shapes, tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuizPayload {
    /// A bare question array.
    Questions(Vec<Value>),
    /// An object wrapping the array in a `quiz` field.
    Nested { quiz: Vec<Value> },
    /// A JSON document serialized into a string.
    Encoded(String),
}

/// Shapes accepted inside an encoded string. No further nesting of strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EncodedPayload {
    Questions(Vec<Value>),
    Nested { quiz: Vec<Value> },
}

/// Normalize a quiz payload into the canonical question sequence.
///
/// Returns `None` when no question array can be found. Never panics.
pub fn normalize(payload: &Value) -> Option<Vec<Question>> {
    let items = match QuizPayload::deserialize(payload) {
        Ok(QuizPayload::Questions(items)) | Ok(QuizPayload::Nested { quiz: items }) => items,
        Ok(QuizPayload::Encoded(text)) => decode_encoded(&text)?,
        Err(_) => {
            tracing::debug!("quiz payload has no recognizable question array");
            return None;
        }
    };

    Some(items.iter().map(Question::from_value).collect())
}

/// Normalize a payload given as raw JSON text.
pub fn normalize_str(text: &str) -> Option<Vec<Question>> {
    let items = decode_encoded(text)?;
    Some(items.iter().map(Question::from_value).collect())
}

fn decode_encoded(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<EncodedPayload>(text) {
        Ok(EncodedPayload::Questions(items)) | Ok(EncodedPayload::Nested { quiz: items }) => {
            Some(items)
        }
        Err(e) => {
            tracing::debug!("failed to decode encoded quiz payload: {e}");
            None
        }
    }
}

/// Load a quiz from a JSON file.
///
/// Accepts a full quiz document (an object with `id` and `quiz`) or a bare
/// payload, which is wrapped in a document named after the file stem.
pub fn load_quiz_document(path: &Path) -> Result<QuizDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read quiz file: {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse JSON: {}", path.display()))?;

    let is_document = value
        .as_object()
        .is_some_and(|obj| obj.contains_key("id") && obj.contains_key("quiz"));

    if is_document {
        return serde_json::from_value(value)
            .with_context(|| format!("invalid quiz document: {}", path.display()));
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(QuizDocument {
        id: stem.clone(),
        file_name: Some(stem),
        quiz: value,
        ..Default::default()
    })
}

/// A warning from quiz validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// Zero-based question index (if applicable).
    pub question: Option<usize>,
    /// Warning message.
    pub message: String,
}

/// Validate normalized questions for common authoring issues.
pub fn validate_questions(questions: &[Question]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if questions.is_empty() {
        warnings.push(ValidationWarning {
            question: None,
            message: "quiz contains no questions".into(),
        });
    }

    for (index, question) in questions.iter().enumerate() {
        let mut warn = |message: String| {
            warnings.push(ValidationWarning {
                question: Some(index),
                message,
            })
        };

        if question.text.trim().is_empty() {
            warn("question text is empty".into());
        }

        if question.options.is_empty() {
            warn("question has no options and cannot be answered".into());
        }

        let mut seen = std::collections::HashSet::new();
        for option in &question.options {
            if !seen.insert(option.as_str()) {
                warn(format!("duplicate option: {option}"));
            }
        }

        match &question.correct_answer {
            None => warn("no correct answer; this question can never score".into()),
            Some(answer) if !question.has_option(answer) => {
                warn(format!("correct answer '{answer}' is not one of the options"))
            }
            Some(_) => {}
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!([
            {
                "question": "What is 2 + 2?",
                "options": ["3", "4", "5"],
                "correct_answer": "4",
                "explanation": "Basic arithmetic."
            },
            {
                "question": "Rust's package manager?",
                "options": ["npm", "cargo"],
                "answer": "cargo"
            }
        ])
    }

    #[test]
    fn normalize_bare_array() {
        let questions = normalize(&sample()).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].text, "What is 2 + 2?");
        assert_eq!(questions[1].correct_answer.as_deref(), Some("cargo"));
    }

    #[test]
    fn normalize_nested_object() {
        let questions = normalize(&json!({ "quiz": sample(), "title": "ignored" })).unwrap();
        assert_eq!(questions.len(), 2);
    }

    #[test]
    fn normalize_encoded_string() {
        let encoded = Value::String(sample().to_string());
        assert_eq!(normalize(&encoded).unwrap().len(), 2);

        let nested = Value::String(json!({ "quiz": sample() }).to_string());
        assert_eq!(normalize(&nested).unwrap().len(), 2);
    }

    #[test]
    fn normalize_roundtrip_preserves_questions() {
        let questions = normalize(&sample()).unwrap();
        let serialized = serde_json::to_string(&questions).unwrap();
        assert_eq!(normalize_str(&serialized).unwrap(), questions);
    }

    #[test]
    fn normalize_is_total() {
        for payload in [
            Value::Null,
            json!({}),
            json!(7),
            json!(true),
            json!({ "quiz": "not an array" }),
            json!({ "quiz": { "quiz": [] } }),
            Value::String("{ not json".into()),
            Value::String("\"double encoded\"".into()),
            Value::String("{\"quiz\": 3}".into()),
        ] {
            assert!(normalize(&payload).is_none(), "expected None for {payload}");
        }
    }

    #[test]
    fn normalize_keeps_empty_array_distinct_from_none() {
        assert_eq!(normalize(&json!([])), Some(vec![]));
        assert_eq!(normalize_str("[]"), Some(vec![]));
    }

    #[test]
    fn validate_flags_authoring_issues() {
        let questions = normalize(&json!([
            { "question": "", "options": ["a", "a"], "correct_answer": "b" },
            { "question": "No options", "options": [] }
        ]))
        .unwrap();

        let warnings = validate_questions(&questions);
        let messages: Vec<&str> = warnings.iter().map(|w| w.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("text is empty")));
        assert!(messages.iter().any(|m| m.contains("duplicate option")));
        assert!(messages.iter().any(|m| m.contains("not one of the options")));
        assert!(messages.iter().any(|m| m.contains("no options")));
        assert!(messages.iter().any(|m| m.contains("never score")));
    }

    #[test]
    fn load_document_and_bare_payload() {
        let dir = tempfile::tempdir().unwrap();

        let doc_path = dir.path().join("doc.json");
        std::fs::write(
            &doc_path,
            json!({ "id": "quiz-7", "fileName": "week1.pdf", "quiz": sample() }).to_string(),
        )
        .unwrap();
        let doc = load_quiz_document(&doc_path).unwrap();
        assert_eq!(doc.id, "quiz-7");
        assert_eq!(doc.questions().unwrap().len(), 2);

        let bare_path = dir.path().join("week2.json");
        std::fs::write(&bare_path, sample().to_string()).unwrap();
        let bare = load_quiz_document(&bare_path).unwrap();
        assert_eq!(bare.id, "week2");
        assert_eq!(bare.questions().unwrap().len(), 2);
    }

    #[test]
    fn load_malformed_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(load_quiz_document(&path).is_err());
    }
}
