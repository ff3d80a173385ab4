//! Async session runner.
//!
//! Drives an [`AssessmentSession`] on the tokio runtime: owns the heartbeat,
//! auto-advance and auto-submit timers, feeds taker commands and timer
//! firings into the state machine, and persists the attempt exactly once
//! when the session is submitted.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::OptionFuture;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, Interval, Sleep};

use crate::error::{CommandError, SessionError};
use crate::model::{AssessmentAttempt, AttemptContext};
use crate::session::{
    AssessmentSession, Completion, Effect, Navigation, SessionEvent, SessionSnapshot,
};
use crate::traits::ResultStore;

const TICK: Duration = Duration::from_secs(1);

/// What a finished session produced.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub completion: Completion,
    /// The record that was sent to the store.
    pub attempt: AssessmentAttempt,
    /// Whether the store accepted the write.
    pub saved: bool,
}

struct Command {
    event: SessionEvent,
    reply: oneshot::Sender<Result<(), SessionError>>,
}

struct ScheduledAdvance {
    token: u64,
    sleep: Pin<Box<Sleep>>,
}

/// Runs one assessment session to completion.
pub struct SessionRunner {
    session: AssessmentSession,
    store: Arc<dyn ResultStore>,
    context: AttemptContext,
}

impl SessionRunner {
    pub fn new(
        session: AssessmentSession,
        store: Arc<dyn ResultStore>,
        context: AttemptContext,
    ) -> Self {
        Self {
            session,
            store,
            context,
        }
    }

    /// Spawn the session loop and return a handle for the taker.
    pub fn spawn(self) -> SessionHandle {
        let (commands, receiver) = mpsc::channel(16);
        let (snapshot_tx, snapshots) = watch::channel(self.session.snapshot());
        let task = tokio::spawn(self.run(receiver, snapshot_tx));

        SessionHandle {
            commands,
            snapshots,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        snapshots: watch::Sender<SessionSnapshot>,
    ) -> Option<SessionOutcome> {
        // All timers live in this frame; leaving the loop cancels every one.
        let mut heartbeat = interval_at(Instant::now() + TICK, TICK);
        let mut advance: Option<ScheduledAdvance> = None;
        let mut countdown: Option<Interval> = None;

        tracing::info!(
            quiz_id = %self.context.quiz_id,
            student_id = %self.context.student_id,
            questions = self.session.questions().len(),
            "session started"
        );

        loop {
            let (event, reply) = tokio::select! {
                command = commands.recv() => match command {
                    Some(Command { event, reply }) => (event, Some(reply)),
                    None => {
                        tracing::info!(
                            quiz_id = %self.context.quiz_id,
                            student_id = %self.context.student_id,
                            "session abandoned before submission"
                        );
                        return None;
                    }
                },
                _ = heartbeat.tick() => (SessionEvent::Tick, None),
                Some(()) = OptionFuture::from(advance.as_mut().map(|a| a.sleep.as_mut())) => {
                    let token = advance.take().map(|a| a.token).unwrap_or_default();
                    (SessionEvent::AutoAdvance { token }, None)
                }
                Some(_) = OptionFuture::from(countdown.as_mut().map(|c| c.tick())) => {
                    (SessionEvent::CountdownTick, None)
                }
            };

            let now = Instant::now();
            let mut completion = None;

            let response = self.session.apply(event, now).map(|effects| {
                for effect in effects {
                    match effect {
                        Effect::ScheduleAdvance { token, delay } => {
                            advance = Some(ScheduledAdvance {
                                token,
                                sleep: Box::pin(sleep(delay)),
                            });
                        }
                        Effect::CancelAdvance => advance = None,
                        Effect::StartCountdown => {
                            countdown = Some(interval_at(now + TICK, TICK));
                        }
                        Effect::StopCountdown => countdown = None,
                        Effect::Complete(done) => completion = Some(done),
                    }
                }
            });

            snapshots.send_replace(self.session.snapshot());
            if let Some(reply) = reply {
                let _ = reply.send(response);
            }

            if let Some(completion) = completion {
                return Some(self.persist(completion).await);
            }
        }
    }

    /// Write the attempt once. Failures are logged; the taker keeps the score.
    async fn persist(&self, completion: Completion) -> SessionOutcome {
        let attempt = self.context.attempt(&completion, chrono::Utc::now());

        let saved = match self.store.write(&attempt).await {
            Ok(()) => {
                tracing::info!(
                    quiz_id = %attempt.quiz_id,
                    student_id = %attempt.student_id,
                    score = attempt.score,
                    store = self.store.name(),
                    "attempt saved"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    "failed to save attempt for {}/{}: {e:#}",
                    attempt.quiz_id,
                    attempt.student_id
                );
                false
            }
        };

        SessionOutcome {
            completion,
            attempt,
            saved,
        }
    }
}

/// The taker's side of a running session.
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: JoinHandle<Option<SessionOutcome>>,
}

impl SessionHandle {
    /// Choose `value` for question `index`.
    pub async fn select(&self, index: usize, value: impl Into<String>) -> Result<(), CommandError> {
        self.send(SessionEvent::SelectAnswer {
            index,
            value: value.into(),
        })
        .await
    }

    pub async fn navigate(&self, navigation: Navigation) -> Result<(), CommandError> {
        self.send(SessionEvent::Navigate(navigation)).await
    }

    /// Submit now. Only accepted on the last question.
    pub async fn submit(&self) -> Result<(), CommandError> {
        self.send(SessionEvent::Submit).await
    }

    async fn send(&self, event: SessionEvent) -> Result<(), CommandError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command { event, reply })
            .await
            .map_err(|_| CommandError::Closed)?;
        response.await.map_err(|_| CommandError::Closed)??;
        Ok(())
    }

    /// Latest session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Returns `true` once the session loop has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the session to be submitted (manually, by countdown, or by
    /// the clock running out).
    pub async fn finish(self) -> Result<Option<SessionOutcome>> {
        let SessionHandle {
            commands, task, ..
        } = self;
        let outcome = task.await.context("session task failed")?;
        drop(commands);
        Ok(outcome)
    }

    /// Walk away without submitting. Nothing is written.
    pub async fn abandon(self) -> Result<()> {
        let SessionHandle { commands, task, .. } = self;
        drop(commands);
        task.await.context("session task failed")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Question;
    use crate::session::{SessionConfig, SubmitReason};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingStore {
        written: Mutex<Vec<AssessmentAttempt>>,
        fail: bool,
    }

    #[async_trait]
    impl ResultStore for RecordingStore {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write(&self, attempt: &AssessmentAttempt) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("backend unavailable");
            }
            self.written.lock().unwrap().push(attempt.clone());
            Ok(())
        }

        async fn fetch_quiz_attempts(&self, quiz_id: &str) -> anyhow::Result<Vec<AssessmentAttempt>> {
            Ok(self
                .written
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.quiz_id == quiz_id)
                .cloned()
                .collect())
        }
    }

    fn quiz(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                text: format!("Q{i}"),
                options: vec!["yes".into(), "no".into()],
                correct_answer: Some("yes".into()),
                explanation: None,
            })
            .collect()
    }

    fn context() -> AttemptContext {
        AttemptContext {
            quiz_id: "quiz-1".into(),
            class_id: "class-1".into(),
            student_id: "stu-1".into(),
            student_name: "Ada".into(),
        }
    }

    fn spawn(n: usize, store: Arc<RecordingStore>) -> SessionHandle {
        let session = AssessmentSession::new(quiz(n), SessionConfig::default()).unwrap();
        SessionRunner::new(session, store, context()).spawn()
    }

    #[tokio::test(start_paused = true)]
    async fn answering_everything_auto_submits_after_countdown() {
        let store = Arc::new(RecordingStore::default());
        let handle = spawn(3, store.clone());

        for i in 0..3 {
            handle.select(i, "yes").await.unwrap();
            tokio::time::sleep(Duration::from_millis(600)).await;
        }
        assert_eq!(handle.snapshot().countdown, Some(3));

        let outcome = handle.finish().await.unwrap().expect("completed");
        assert_eq!(outcome.completion.score, 100);
        assert_eq!(outcome.completion.reason, SubmitReason::AllAnswered);
        assert!(outcome.saved);

        let written = store.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].student_name, "Ada");
        assert_eq!(written[0].class_id, "class-1");
    }

    #[tokio::test(start_paused = true)]
    async fn auto_advance_moves_to_next_question() {
        let store = Arc::new(RecordingStore::default());
        let handle = spawn(3, store);

        handle.select(0, "no").await.unwrap();
        assert_eq!(handle.snapshot().current_index, 0);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(handle.snapshot().current_index, 1);

        let err = handle.select(0, "yes").await.unwrap_err();
        assert!(matches!(
            err,
            CommandError::Rejected(SessionError::NotCurrentQuestion { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timer_expiry_submits_and_persists_once() {
        let store = Arc::new(RecordingStore::default());
        let handle = spawn(5, store.clone());

        handle.select(0, "yes").await.unwrap();
        handle.navigate(Navigation::Next).await.unwrap();
        handle.select(1, "yes").await.unwrap();

        let outcome = handle.finish().await.unwrap().expect("completed");
        assert_eq!(outcome.completion.reason, SubmitReason::TimerExpired);
        assert_eq!(outcome.completion.score, 40);
        assert_eq!(outcome.completion.elapsed_secs, 1800);
        assert_eq!(store.written.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_submit_bypasses_countdown() {
        let store = Arc::new(RecordingStore::default());
        let handle = spawn(1, store.clone());

        handle.select(0, "yes").await.unwrap();
        handle.submit().await.unwrap();

        let outcome = handle.finish().await.unwrap().unwrap();
        assert_eq!(outcome.completion.reason, SubmitReason::Manual);
        assert_eq!(outcome.completion.elapsed_secs, 0);
        assert_eq!(store.written.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_still_completes() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let handle = spawn(1, store);

        handle.select(0, "no").await.unwrap();
        handle.submit().await.unwrap();

        let outcome = handle.finish().await.unwrap().unwrap();
        assert!(!outcome.saved);
        assert_eq!(outcome.completion.score, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoning_writes_nothing() {
        let store = Arc::new(RecordingStore::default());
        let handle = spawn(2, store.clone());

        handle.select(0, "yes").await.unwrap();
        handle.abandon().await.unwrap();

        assert!(store.written.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn commands_after_completion_report_closed() {
        let store = Arc::new(RecordingStore::default());
        let handle = spawn(1, store);

        handle.submit().await.unwrap();
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            handle.select(0, "yes").await.unwrap_err(),
            CommandError::Closed
        ));
    }
}
