//! LMS backend result store over HTTP.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use classquiz_core::model::{AssessmentAttempt, QuizDocument};
use classquiz_core::traits::{QuizSource, ResultStore};

use crate::error::StoreError;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Result store backed by the LMS REST API.
///
/// Attempts are posted to `/lms/quiz/result/` and read back per quiz from
/// `/lms/quiz/results/{quiz_id}`. Quiz documents come from
/// `/lms/quiz/assigned/{class_id}`.
pub struct HttpResultStore {
    base_url: String,
    api_token: Option<String>,
    single_attempt: bool,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl HttpResultStore {
    pub fn new(base_url: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: None,
            single_attempt: false,
            timeout_secs,
            client,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_api_token(mut self, token: Option<String>) -> Self {
        self.api_token = token.filter(|t| !t.is_empty());
        self
    }

    /// Refuse to write a second attempt for the same taker and quiz.
    pub fn with_single_attempt(mut self, enabled: bool) -> Self {
        self.single_attempt = enabled;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: String) -> reqwest::RequestBuilder {
        self.authorize(self.client.get(url))
    }

    fn post(&self, url: String) -> reqwest::RequestBuilder {
        self.authorize(self.client.post(url))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(self.timeout_secs)
            } else {
                StoreError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::ApiError {
                status,
                message: body,
            });
        }
        Ok(response)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(format!("failed to parse response: {e}")))
    }

    /// Reject a repeat attempt. An unreadable history never blocks the write.
    async fn ensure_first_attempt(&self, attempt: &AssessmentAttempt) -> anyhow::Result<()> {
        let existing = match self.fetch_quiz_attempts(&attempt.quiz_id).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!("could not check earlier attempts, posting anyway: {e:#}");
                return Ok(());
            }
        };
        if existing
            .iter()
            .any(|a| a.student_id == attempt.student_id)
        {
            return Err(StoreError::DuplicateAttempt {
                student_id: attempt.student_id.clone(),
                quiz_id: attempt.quiz_id.clone(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct WriteReceipt {
    #[serde(default)]
    id: Option<String>,
}

#[async_trait]
impl ResultStore for HttpResultStore {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, attempt), fields(quiz_id = %attempt.quiz_id, student_id = %attempt.student_id))]
    async fn write(&self, attempt: &AssessmentAttempt) -> anyhow::Result<()> {
        if self.single_attempt {
            self.ensure_first_attempt(attempt).await?;
        }

        let response = self
            .send(
                self.post(format!("{}/lms/quiz/result/", self.base_url))
                    .json(attempt),
            )
            .await?;

        let receipt: WriteReceipt = Self::decode(response).await?;
        tracing::debug!(id = ?receipt.id, "attempt stored");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_quiz_attempts(&self, quiz_id: &str) -> anyhow::Result<Vec<AssessmentAttempt>> {
        let response = self
            .send(self.get(format!("{}/lms/quiz/results/{quiz_id}", self.base_url)))
            .await?;
        let attempts: Vec<AssessmentAttempt> = Self::decode(response).await?;
        tracing::debug!(count = attempts.len(), "fetched attempts");
        Ok(attempts)
    }
}

#[async_trait]
impl QuizSource for HttpResultStore {
    #[instrument(skip(self))]
    async fn assigned_quizzes(&self, class_id: &str) -> anyhow::Result<Vec<QuizDocument>> {
        let response = self
            .send(self.get(format!("{}/lms/quiz/assigned/{class_id}", self.base_url)))
            .await?;
        Ok(Self::decode(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classquiz_core::model::AnswerVector;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attempt(student: &str) -> AssessmentAttempt {
        AssessmentAttempt {
            id: None,
            quiz_id: "Q1".into(),
            student_id: student.into(),
            student_name: "Ada".into(),
            class_id: "C1".into(),
            answers: [Some("4"), None].into_iter().collect(),
            score: 50,
            time_taken: 42,
            completed_at: None,
        }
    }

    fn stored(student: &str, class: &str, score: u8) -> serde_json::Value {
        serde_json::json!({
            "id": format!("id-{student}"),
            "quiz_id": "Q1",
            "student_id": student,
            "student_name": null,
            "class_id": class,
            "answers": ["4", ""],
            "score": score,
            "time_taken": 42,
            "completed_at": "2024-05-01T10:15:30.123456"
        })
    }

    #[tokio::test]
    async fn write_posts_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lms/quiz/result/"))
            .and(body_partial_json(serde_json::json!({
                "quiz_id": "Q1",
                "student_id": "s1",
                "class_id": "C1",
                "answers": ["4", ""],
                "score": 50,
                "time_taken": 42
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "id": "abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5).unwrap();
        store.write(&attempt("s1")).await.unwrap();
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/results/Q1"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5)
            .unwrap()
            .with_api_token(Some("test-token".into()));
        assert!(store.fetch_quiz_attempts("Q1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_decodes_backend_records() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/results/Q1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([stored("s1", "C1", 80)])),
            )
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5).unwrap();
        let attempts = store.fetch_quiz_attempts("Q1").await.unwrap();

        assert_eq!(attempts.len(), 1);
        let a = &attempts[0];
        assert_eq!(a.id.as_deref(), Some("id-s1"));
        assert_eq!(a.student_name, "");
        assert_eq!(a.display_name(), "s1");
        assert_eq!(a.answers, AnswerVector::from_iter([Some("4"), None]));
        assert!(a.completed_at.is_some());
    }

    #[tokio::test]
    async fn read_all_narrows_to_class() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/results/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                stored("s1", "C1", 80),
                stored("s2", "C2", 60),
                stored("s3", "C1", 40)
            ])))
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5).unwrap();
        let attempts = store.read_all("Q1", "C1").await.unwrap();

        let ids: Vec<&str> = attempts.iter().map(|a| a.student_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
    }

    #[tokio::test]
    async fn duplicate_attempt_is_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/results/Q1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([stored("s1", "C1", 80)])),
            )
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/lms/quiz/result/"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5)
            .unwrap()
            .with_single_attempt(true);
        let err = store.write(&attempt("s1")).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::DuplicateAttempt { .. })
        ));
    }

    #[tokio::test]
    async fn unreadable_history_still_posts_attempt() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/results/Q1"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/lms/quiz/result/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "success", "id": "abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5)
            .unwrap()
            .with_single_attempt(true);
        store.write(&attempt("s1")).await.unwrap();
    }

    #[tokio::test]
    async fn error_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/results/Q1"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5).unwrap();
        let err = store.fetch_quiz_attempts("Q1").await.unwrap_err();

        match err.downcast_ref::<StoreError>() {
            Some(StoreError::ApiError { status, message }) => {
                assert_eq!(*status, 500);
                assert_eq!(message, "internal error");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/results/Q1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5).unwrap();
        let err = store.fetch_quiz_attempts("Q1").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn assigned_quizzes_decode_documents() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/lms/quiz/assigned/C1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": "Q1",
                "fileName": "fractions.pdf",
                "instructions": "Answer all questions",
                "classId": "C1",
                "quiz": "{\"quiz\": [{\"question\": \"1/2 + 1/2?\", \"options\": [\"1\", \"2\"], \"answer\": \"1\"}]}"
            }])))
            .mount(&server)
            .await;

        let store = HttpResultStore::new(&server.uri(), 5).unwrap();
        let quizzes = store.assigned_quizzes("C1").await.unwrap();

        assert_eq!(quizzes.len(), 1);
        assert_eq!(quizzes[0].title(), "fractions.pdf");
        let questions = quizzes[0].questions().unwrap();
        assert_eq!(questions[0].correct_answer.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn unreachable_backend_is_network_error() {
        let store = HttpResultStore::new("http://127.0.0.1:9", 5).unwrap();
        let err = store.fetch_quiz_attempts("Q1").await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NetworkError(_)) | Some(StoreError::Timeout(_))
        ));
    }
}
