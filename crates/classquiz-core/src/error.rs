//! Assessment session error types.
//!
//! Malformed quiz payloads are not errors (the normalizer returns `None`);
//! these cover starting a session without questions and interactions the
//! state machine refuses.

use thiserror::Error;

/// Errors raised by [`crate::session::AssessmentSession`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The quiz normalized to zero questions and cannot be taken.
    #[error("no questions available")]
    EmptyQuestionSet,

    /// An answer was selected for a question other than the current one.
    #[error("question {got} is not the current question ({expected})")]
    NotCurrentQuestion { expected: usize, got: usize },

    /// A navigation target or answer index is outside the quiz.
    #[error("question index {index} out of range (quiz has {len} questions)")]
    IndexOutOfRange { index: usize, len: usize },

    /// The selected value is not one of the question's options.
    #[error("'{value}' is not an option for question {index}")]
    UnknownOption { index: usize, value: String },

    /// Manual submission is only offered on the last question.
    #[error("manual submit is only available on the last question")]
    NotOnLastQuestion,
}

/// Errors returned to the taker when sending an action to a running session.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The state machine refused the action.
    #[error(transparent)]
    Rejected(#[from] SessionError),

    /// The session already finished or was abandoned.
    #[error("session has ended")]
    Closed,
}
