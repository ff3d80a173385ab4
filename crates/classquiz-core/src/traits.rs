//! Seams to the persistence and quiz-source collaborators.
//!
//! Implemented by the `classquiz-store` crate (HTTP backend and in-memory).

use async_trait::async_trait;

use crate::model::{AssessmentAttempt, QuizDocument};

/// Where completed attempts are written and read back from.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Human-readable store name (e.g. "http").
    fn name(&self) -> &str;

    /// Persist a completed attempt. Called exactly once per session.
    async fn write(&self, attempt: &AssessmentAttempt) -> anyhow::Result<()>;

    /// All attempts for a quiz, across every class.
    async fn fetch_quiz_attempts(&self, quiz_id: &str) -> anyhow::Result<Vec<AssessmentAttempt>>;

    /// Attempts for a quiz within one class, in arrival order.
    ///
    /// The backend only filters by quiz, so the class filter runs here.
    async fn read_all(
        &self,
        quiz_id: &str,
        class_id: &str,
    ) -> anyhow::Result<Vec<AssessmentAttempt>> {
        let attempts = self.fetch_quiz_attempts(quiz_id).await?;
        Ok(attempts
            .into_iter()
            .filter(|a| a.class_id == class_id)
            .collect())
    }
}

/// Where quiz documents come from.
#[async_trait]
pub trait QuizSource: Send + Sync {
    /// Quizzes assigned to a class.
    async fn assigned_quizzes(&self, class_id: &str) -> anyhow::Result<Vec<QuizDocument>>;
}
