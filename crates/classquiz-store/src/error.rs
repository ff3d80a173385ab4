//! Result store error types.

use thiserror::Error;

/// Errors that can occur when talking to a result store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The taker already has a recorded attempt for this quiz.
    #[error("student {student_id} has already completed quiz {quiz_id}")]
    DuplicateAttempt { student_id: String, quiz_id: String },

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The backend answered with a body that could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
