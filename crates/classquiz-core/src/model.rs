//! Core data model types for classquiz.
//!
//! These are the types shared by the normalizer, the assessment session, the
//! result store and the aggregator: quiz documents, canonical questions,
//! answer vectors and persisted attempts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::SessionError;
use crate::parser;
use crate::session::Completion;

/// A quiz document as produced by the generation/storage collaborator.
///
/// Only `quiz` matters to the engine; it may hold a question array, a
/// JSON-encoded string of one, or an object with a nested `quiz` array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuizDocument {
    /// Quiz identifier.
    #[serde(default)]
    pub id: String,
    /// Name of the source file the quiz was generated from.
    #[serde(default, rename = "fileName", alias = "file_name")]
    pub file_name: Option<String>,
    /// Instructions given to the generator.
    #[serde(default)]
    pub instructions: Option<String>,
    /// Class the quiz belongs to.
    #[serde(default, rename = "classId", alias = "class_id")]
    pub class_id: Option<String>,
    /// Raw quiz payload, normalized on demand.
    #[serde(default)]
    pub quiz: Value,
    /// Any other fields the collaborator attached.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl QuizDocument {
    /// Normalize the `quiz` payload into the canonical question sequence.
    pub fn questions(&self) -> Option<Vec<Question>> {
        parser::normalize(&self.quiz)
    }

    /// Questions suitable for an assessment session.
    ///
    /// An unparseable payload and a zero-question payload are both reported
    /// as [`SessionError::EmptyQuestionSet`].
    pub fn assessable_questions(&self) -> Result<Vec<Question>, SessionError> {
        match self.questions() {
            Some(questions) if !questions.is_empty() => Ok(questions),
            _ => Err(SessionError::EmptyQuestionSet),
        }
    }

    /// Display title: the source file name, falling back to the id.
    pub fn title(&self) -> &str {
        self.file_name.as_deref().unwrap_or(&self.id)
    }
}

/// A canonical multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RawQuestion")]
pub struct Question {
    /// The prompt.
    #[serde(rename = "question")]
    pub text: String,
    /// Answer choices in authoring order.
    pub options: Vec<String>,
    /// The option that scores as correct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    /// Optional explanation shown after submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl Question {
    /// Decode a question from an arbitrary JSON value.
    ///
    /// Values that are not question objects decode to an empty question so
    /// the slot still counts towards the quiz length.
    pub fn from_value(value: &Value) -> Self {
        match RawQuestion::deserialize(value) {
            Ok(raw) => raw.into(),
            Err(e) => {
                tracing::debug!("treating undecodable question as empty: {e}");
                Question::default()
            }
        }
    }

    /// Returns `true` if `value` is one of this question's options.
    pub fn has_option(&self, value: &str) -> bool {
        self.options.iter().any(|o| o == value)
    }

    /// Returns `true` if `answer` matches the correct answer exactly.
    pub fn is_correct(&self, answer: &str) -> bool {
        self.correct_answer.as_deref() == Some(answer)
    }
}

/// Wire shape of a question as authored by the generator.
#[derive(Debug, Default, Deserialize)]
struct RawQuestion {
    #[serde(default, alias = "text")]
    question: Option<Value>,
    #[serde(default)]
    options: Option<Value>,
    #[serde(default, alias = "correctAnswer")]
    correct_answer: Option<Value>,
    /// Legacy name for `correct_answer`.
    #[serde(default)]
    answer: Option<Value>,
    #[serde(default)]
    explanation: Option<Value>,
}

impl From<RawQuestion> for Question {
    fn from(raw: RawQuestion) -> Self {
        let options = match raw.options {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| value_text(v).unwrap_or_default())
                .collect(),
            _ => Vec::new(),
        };

        let correct_answer = raw
            .correct_answer
            .as_ref()
            .and_then(value_text)
            .filter(|s| !s.is_empty())
            .or_else(|| raw.answer.as_ref().and_then(value_text))
            .filter(|s| !s.is_empty());

        Question {
            text: raw.question.as_ref().and_then(value_text).unwrap_or_default(),
            options,
            correct_answer,
            explanation: raw.explanation.as_ref().and_then(value_text),
        }
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The taker's answers, one slot per question.
///
/// Serialized as `string[]` with `""` for unanswered slots; `null` and `""`
/// both read back as unanswered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnswerVector(Vec<Option<String>>);

impl AnswerVector {
    /// An answer vector with `len` unanswered slots.
    pub fn unanswered(len: usize) -> Self {
        Self(vec![None; len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The answer at `index`, if one was chosen.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|a| a.as_deref())
    }

    /// Write the answer at `index`, growing the vector if needed.
    pub fn set(&mut self, index: usize, value: impl Into<String>) {
        if index >= self.0.len() {
            self.0.resize(index + 1, None);
        }
        self.0[index] = Some(value.into());
    }

    /// Number of answered slots.
    pub fn answered_count(&self) -> usize {
        self.0.iter().filter(|a| a.is_some()).count()
    }

    /// Returns `true` if every slot holds an answer.
    pub fn is_complete(&self) -> bool {
        self.0.iter().all(Option::is_some)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.0.iter().map(|a| a.as_deref())
    }
}

impl<S: Into<String>> FromIterator<Option<S>> for AnswerVector {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Self(iter.into_iter().map(|a| a.map(Into::into)).collect())
    }
}

impl Serialize for AnswerVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|a| a.as_deref().unwrap_or("")))
    }
}

impl<'de> Deserialize<'de> for AnswerVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Vec::<Option<String>>::deserialize(deserializer)?;
        Ok(Self(
            raw.into_iter()
                .map(|a| a.filter(|s| !s.is_empty()))
                .collect(),
        ))
    }
}

/// Who is taking a quiz, and where.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptContext {
    pub quiz_id: String,
    pub class_id: String,
    pub student_id: String,
    pub student_name: String,
}

impl AttemptContext {
    /// Build the persisted record for a completed session.
    pub fn attempt(&self, completion: &Completion, completed_at: DateTime<Utc>) -> AssessmentAttempt {
        AssessmentAttempt {
            id: None,
            quiz_id: self.quiz_id.clone(),
            student_id: self.student_id.clone(),
            student_name: self.student_name.clone(),
            class_id: self.class_id.clone(),
            answers: completion.answers.clone(),
            score: completion.score,
            time_taken: completion.elapsed_secs,
            completed_at: Some(completed_at),
        }
    }
}

/// One taker's completed run through a quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentAttempt {
    /// Server-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(alias = "quizId")]
    pub quiz_id: String,
    #[serde(alias = "studentId")]
    pub student_id: String,
    #[serde(default, alias = "studentName", deserialize_with = "null_as_default")]
    pub student_name: String,
    #[serde(default, alias = "classId", deserialize_with = "null_as_default")]
    pub class_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answers: AnswerVector,
    /// Percentage score, 0–100.
    #[serde(default, deserialize_with = "null_as_default")]
    pub score: u8,
    /// Elapsed whole seconds.
    #[serde(default, alias = "timeTaken", deserialize_with = "null_as_default")]
    pub time_taken: u64,
    #[serde(default, alias = "completedAt", with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl AssessmentAttempt {
    /// Number of questions the taker answered.
    pub fn answered_count(&self) -> usize {
        self.answers.answered_count()
    }

    /// The taker's name, falling back to their id when the name is blank.
    pub fn display_name(&self) -> &str {
        if self.student_name.trim().is_empty() {
            &self.student_id
        } else {
            &self.student_name
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Timestamps written as RFC 3339, read as RFC 3339 or naive ISO-8601 (UTC).
mod lenient_timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse))
    }

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
