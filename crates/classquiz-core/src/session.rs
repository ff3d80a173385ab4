//! The assessment session state machine.
//!
//! A session moves `InProgress` → `PendingAutoSubmit` → `Submitted`. Every
//! interaction and timer firing is an [`SessionEvent`]; applying one mutates
//! the session and returns the [`Effect`]s the driver must carry out
//! (scheduling or cancelling timers, persisting the completion). The session
//! itself never sleeps or spawns, so it can be driven synchronously in tests
//! and by [`crate::engine::SessionRunner`] at runtime.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::SessionError;
use crate::model::{AnswerVector, Question};
use crate::scoring::{count_correct, percentage};

/// Timing parameters for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Total time the taker has before forced submission.
    pub time_budget: Duration,
    /// Delay between selecting an answer and moving to the next question.
    pub auto_advance_delay: Duration,
    /// Seconds between "all answered" and automatic submission.
    pub auto_submit_countdown: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(30 * 60),
            auto_advance_delay: Duration::from_millis(500),
            auto_submit_countdown: 3,
        }
    }
}

/// Where to move the question cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Previous,
    Next,
    To(usize),
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The taker picked `value` for question `index`.
    SelectAnswer { index: usize, value: String },
    /// The taker moved the cursor.
    Navigate(Navigation),
    /// A previously scheduled auto-advance fired.
    AutoAdvance { token: u64 },
    /// One-second heartbeat of the session clock.
    Tick,
    /// One-second tick of the auto-submit countdown.
    CountdownTick,
    /// Manual submission.
    Submit,
}

/// Why a session was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitReason {
    Manual,
    AllAnswered,
    TimerExpired,
}

/// The outcome of a submitted session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub answers: AnswerVector,
    pub score: u8,
    pub correct: usize,
    pub total: usize,
    pub elapsed_secs: u64,
    pub reason: SubmitReason,
}

/// Current phase of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    InProgress,
    PendingAutoSubmit { countdown: u32 },
    Submitted(Completion),
}

/// Work the driver must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Deliver `SessionEvent::AutoAdvance { token }` after `delay`,
    /// replacing any previously scheduled advance.
    ScheduleAdvance { token: u64, delay: Duration },
    /// Drop the scheduled advance.
    CancelAdvance,
    /// (Re)start the one-second countdown ticker.
    StartCountdown,
    /// Stop the countdown ticker.
    StopCountdown,
    /// Terminal: persist and report the completion, then stop all timers.
    Complete(Completion),
}

#[derive(Debug, Clone, Copy)]
struct PendingAdvance {
    token: u64,
    target: usize,
}

/// A read-only view of a session for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub current_index: usize,
    pub total: usize,
    pub answered: usize,
    pub seconds_remaining: u64,
    /// Seconds left before automatic submission, if pending.
    pub countdown: Option<u32>,
    pub submitted: bool,
}

/// A single taker's run through a quiz.
#[derive(Debug, Clone)]
pub struct AssessmentSession {
    questions: Vec<Question>,
    answers: AnswerVector,
    current_index: usize,
    seconds_remaining: u64,
    state: SessionState,
    started_at: Instant,
    config: SessionConfig,
    pending_advance: Option<PendingAdvance>,
    next_token: u64,
}

impl AssessmentSession {
    /// Start a session now.
    pub fn new(questions: Vec<Question>, config: SessionConfig) -> Result<Self, SessionError> {
        Self::started_at(questions, config, Instant::now())
    }

    /// Start a session with an explicit start instant.
    pub fn started_at(
        questions: Vec<Question>,
        config: SessionConfig,
        started_at: Instant,
    ) -> Result<Self, SessionError> {
        if questions.is_empty() {
            return Err(SessionError::EmptyQuestionSet);
        }

        Ok(Self {
            answers: AnswerVector::unanswered(questions.len()),
            questions,
            current_index: 0,
            seconds_remaining: config.time_budget.as_secs(),
            state: SessionState::InProgress,
            started_at,
            config,
            pending_advance: None,
            next_token: 0,
        })
    }

    /// Apply one event at time `now`.
    ///
    /// Events arriving after submission are ignored and return no effects.
    pub fn apply(&mut self, event: SessionEvent, now: Instant) -> Result<Vec<Effect>, SessionError> {
        if self.is_submitted() {
            return Ok(Vec::new());
        }

        let mut effects = Vec::new();
        match event {
            SessionEvent::SelectAnswer { index, value } => {
                self.select(index, value, now, &mut effects)?
            }
            SessionEvent::Navigate(nav) => self.navigate(nav, now, &mut effects),
            SessionEvent::AutoAdvance { token } => self.auto_advance(token, now, &mut effects),
            SessionEvent::Tick => self.tick(now, &mut effects),
            SessionEvent::CountdownTick => self.countdown_tick(now, &mut effects),
            SessionEvent::Submit => {
                if !self.on_last_question() {
                    return Err(SessionError::NotOnLastQuestion);
                }
                self.submit(SubmitReason::Manual, now, &mut effects);
            }
        }
        Ok(effects)
    }

    fn select(
        &mut self,
        index: usize,
        value: String,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) -> Result<(), SessionError> {
        let len = self.questions.len();
        if index >= len {
            return Err(SessionError::IndexOutOfRange { index, len });
        }
        if index != self.current_index {
            return Err(SessionError::NotCurrentQuestion {
                expected: self.current_index,
                got: index,
            });
        }
        if !self.questions[index].has_option(&value) {
            return Err(SessionError::UnknownOption { index, value });
        }

        tracing::debug!(index, answered = self.answers.answered_count(), "answer selected");
        self.answers.set(index, value);

        if index < self.last_index() {
            let token = self.next_token;
            self.next_token += 1;
            self.pending_advance = Some(PendingAdvance {
                token,
                target: index + 1,
            });
            effects.push(Effect::ScheduleAdvance {
                token,
                delay: self.config.auto_advance_delay,
            });
        }

        self.check_all_answered(now, effects);
        Ok(())
    }

    fn navigate(&mut self, nav: Navigation, now: Instant, effects: &mut Vec<Effect>) {
        let target = match nav {
            Navigation::Previous => self.current_index.saturating_sub(1),
            Navigation::Next => self.current_index + 1,
            Navigation::To(index) => index,
        }
        .min(self.last_index());

        if self.pending_advance.take().is_some() {
            effects.push(Effect::CancelAdvance);
        }
        if target == self.current_index {
            return;
        }

        self.current_index = target;
        if matches!(self.state, SessionState::PendingAutoSubmit { .. }) {
            tracing::debug!("navigation cancelled the auto-submit countdown");
            self.state = SessionState::InProgress;
            effects.push(Effect::StopCountdown);
        }
        self.check_all_answered(now, effects);
    }

    fn auto_advance(&mut self, token: u64, now: Instant, effects: &mut Vec<Effect>) {
        match self.pending_advance {
            Some(pending) if pending.token == token => {
                self.pending_advance = None;
                let target = pending.target.min(self.last_index());
                if target != self.current_index {
                    self.current_index = target;
                    self.check_all_answered(now, effects);
                }
            }
            _ => tracing::debug!(token, "ignoring stale auto-advance"),
        }
    }

    fn tick(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        self.seconds_remaining = self.seconds_remaining.saturating_sub(1);
        if self.seconds_remaining == 0 {
            tracing::info!("session time expired");
            self.submit(SubmitReason::TimerExpired, now, effects);
        }
    }

    fn countdown_tick(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if let SessionState::PendingAutoSubmit { countdown } = self.state {
            let remaining = countdown.saturating_sub(1);
            if remaining == 0 {
                self.submit(SubmitReason::AllAnswered, now, effects);
            } else {
                self.state = SessionState::PendingAutoSubmit {
                    countdown: remaining,
                };
            }
        }
    }

    /// Enter (or restart) the auto-submit countdown once every question is
    /// answered and the cursor is on the last question.
    fn check_all_answered(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if !self.answers.is_complete() || !self.on_last_question() {
            return;
        }

        if self.config.auto_submit_countdown == 0 {
            self.submit(SubmitReason::AllAnswered, now, effects);
            return;
        }

        tracing::debug!(
            countdown = self.config.auto_submit_countdown,
            "all questions answered, auto-submit pending"
        );
        self.state = SessionState::PendingAutoSubmit {
            countdown: self.config.auto_submit_countdown,
        };
        effects.push(Effect::StartCountdown);
    }

    fn submit(&mut self, reason: SubmitReason, now: Instant, effects: &mut Vec<Effect>) {
        if self.pending_advance.take().is_some() {
            effects.push(Effect::CancelAdvance);
        }
        if matches!(self.state, SessionState::PendingAutoSubmit { .. }) {
            effects.push(Effect::StopCountdown);
        }

        let total = self.questions.len();
        let correct = count_correct(&self.questions, &self.answers);
        let completion = Completion {
            answers: self.answers.clone(),
            score: percentage(correct, total),
            correct,
            total,
            elapsed_secs: now.saturating_duration_since(self.started_at).as_secs(),
            reason,
        };

        tracing::info!(
            score = completion.score,
            correct,
            total,
            elapsed_secs = completion.elapsed_secs,
            ?reason,
            "session submitted"
        );

        self.state = SessionState::Submitted(completion.clone());
        effects.push(Effect::Complete(completion));
    }

    fn last_index(&self) -> usize {
        self.questions.len() - 1
    }

    pub fn on_last_question(&self) -> bool {
        self.current_index == self.last_index()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answers(&self) -> &AnswerVector {
        &self.answers
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.seconds_remaining
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.state, SessionState::Submitted(_))
    }

    /// The completion, once submitted.
    pub fn completion(&self) -> Option<&Completion> {
        match &self.state {
            SessionState::Submitted(completion) => Some(completion),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            current_index: self.current_index,
            total: self.questions.len(),
            answered: self.answers.answered_count(),
            seconds_remaining: self.seconds_remaining,
            countdown: match self.state {
                SessionState::PendingAutoSubmit { countdown } => Some(countdown),
                _ => None,
            },
            submitted: self.is_submitted(),
        }
    }
}
