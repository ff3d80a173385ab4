//! In-process result store for offline sessions and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use classquiz_core::model::{AssessmentAttempt, QuizDocument};
use classquiz_core::traits::{QuizSource, ResultStore};

use crate::error::StoreError;

/// A result store that keeps attempts in memory.
///
/// Assigns ids and completion timestamps the way the backend does and
/// honours the same single-attempt rule.
#[derive(Default)]
pub struct InMemoryStore {
    attempts: Mutex<Vec<AssessmentAttempt>>,
    /// Quizzes keyed by class id.
    quizzes: HashMap<String, Vec<QuizDocument>>,
    single_attempt: bool,
    /// Number of writes accepted.
    write_count: AtomicU32,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse a second attempt by the same taker on the same quiz.
    pub fn with_single_attempt(mut self, enabled: bool) -> Self {
        self.single_attempt = enabled;
        self
    }

    /// Serve `quiz` from [`QuizSource::assigned_quizzes`] for `class_id`.
    pub fn with_quiz(mut self, class_id: &str, quiz: QuizDocument) -> Self {
        self.quizzes.entry(class_id.to_string()).or_default().push(quiz);
        self
    }

    /// Seed attempts, e.g. from a results export.
    pub fn with_attempts(self, attempts: impl IntoIterator<Item = AssessmentAttempt>) -> Self {
        self.lock().extend(attempts);
        self
    }

    /// Number of writes accepted so far.
    pub fn write_count(&self) -> u32 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Every stored attempt, in arrival order.
    pub fn attempts(&self) -> Vec<AssessmentAttempt> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AssessmentAttempt>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.attempts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ResultStore for InMemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write(&self, attempt: &AssessmentAttempt) -> anyhow::Result<()> {
        let mut attempts = self.lock();

        if self.single_attempt
            && attempts
                .iter()
                .any(|a| a.quiz_id == attempt.quiz_id && a.student_id == attempt.student_id)
        {
            return Err(StoreError::DuplicateAttempt {
                student_id: attempt.student_id.clone(),
                quiz_id: attempt.quiz_id.clone(),
            }
            .into());
        }

        let mut stored = attempt.clone();
        stored.id = Some(Uuid::new_v4().to_string());
        stored.completed_at.get_or_insert_with(Utc::now);
        attempts.push(stored);

        self.write_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn fetch_quiz_attempts(&self, quiz_id: &str) -> anyhow::Result<Vec<AssessmentAttempt>> {
        Ok(self
            .lock()
            .iter()
            .filter(|a| a.quiz_id == quiz_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuizSource for InMemoryStore {
    async fn assigned_quizzes(&self, class_id: &str) -> anyhow::Result<Vec<QuizDocument>> {
        Ok(self.quizzes.get(class_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classquiz_core::model::AnswerVector;

    fn attempt(student: &str, class: &str) -> AssessmentAttempt {
        AssessmentAttempt {
            id: None,
            quiz_id: "Q1".into(),
            student_id: student.into(),
            student_name: student.into(),
            class_id: class.into(),
            answers: AnswerVector::unanswered(2),
            score: 0,
            time_taken: 10,
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn write_assigns_id_and_timestamp() {
        let store = InMemoryStore::new();
        store.write(&attempt("s1", "C1")).await.unwrap();

        let stored = store.attempts();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].id.is_some());
        assert!(stored[0].completed_at.is_some());
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn single_attempt_guard() {
        let store = InMemoryStore::new().with_single_attempt(true);
        store.write(&attempt("s1", "C1")).await.unwrap();

        let err = store.write(&attempt("s1", "C1")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::DuplicateAttempt { .. })
        ));
        store.write(&attempt("s2", "C1")).await.unwrap();
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn repeat_attempts_allowed_without_guard() {
        let store = InMemoryStore::new();
        store.write(&attempt("s1", "C1")).await.unwrap();
        store.write(&attempt("s1", "C1")).await.unwrap();
        assert_eq!(store.fetch_quiz_attempts("Q1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn read_all_keeps_arrival_order_within_class() {
        let store = InMemoryStore::new();
        for (s, c) in [("a", "C1"), ("b", "C2"), ("c", "C1")] {
            store.write(&attempt(s, c)).await.unwrap();
        }

        let ids: Vec<String> = store
            .read_all("Q1", "C1")
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.student_id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(store.read_all("Q2", "C1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn serves_assigned_quizzes() {
        let quiz = QuizDocument {
            id: "Q1".into(),
            ..Default::default()
        };
        let store = InMemoryStore::new().with_quiz("C1", quiz);

        assert_eq!(store.assigned_quizzes("C1").await.unwrap().len(), 1);
        assert!(store.assigned_quizzes("C2").await.unwrap().is_empty());
    }
}
