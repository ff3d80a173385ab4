//! The `classquiz take` command.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use classquiz_core::engine::{SessionHandle, SessionOutcome, SessionRunner};
use classquiz_core::error::CommandError;
use classquiz_core::model::{AttemptContext, Question, QuizDocument};
use classquiz_core::parser::load_quiz_document;
use classquiz_core::report::format_duration;
use classquiz_core::session::{AssessmentSession, Navigation, SessionSnapshot, SubmitReason};
use classquiz_core::traits::{QuizSource, ResultStore};
use classquiz_store::config::{create_store, load_config_from};
use classquiz_store::InMemoryStore;

use super::spawn_line_reader;

pub struct TakeArgs {
    pub quiz: Option<PathBuf>,
    pub quiz_id: Option<String>,
    pub class_id: Option<String>,
    pub student_id: String,
    pub student_name: Option<String>,
    pub offline: bool,
    pub config: Option<PathBuf>,
}

/// Remaining-time marks at which the taker gets a warning.
const TIME_WARNINGS: [u64; 3] = [300, 60, 10];

pub async fn execute(args: TakeArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;
    let backend = if args.offline {
        None
    } else {
        Some(create_store(&config.backend)?)
    };

    let doc = match (&args.quiz, &args.quiz_id) {
        (Some(path), _) => load_quiz_document(path)?,
        (None, Some(quiz_id)) => {
            let Some(source) = &backend else {
                bail!("--quiz-id fetches from the backend; pass --quiz <file> when offline");
            };
            let class_id = args
                .class_id
                .as_deref()
                .context("--class-id is required with --quiz-id")?;
            fetch_assigned(source.as_ref(), class_id, quiz_id).await?
        }
        (None, None) => bail!("pass --quiz <file>, or --quiz-id together with --class-id"),
    };

    let questions = doc.assessable_questions()?;
    let session = AssessmentSession::new(questions.clone(), config.session_config())?;

    let store: Arc<dyn ResultStore> = match backend {
        Some(http) => http,
        None => {
            eprintln!("Offline: the attempt will not be sent to the backend.");
            Arc::new(InMemoryStore::new().with_single_attempt(config.backend.single_attempt))
        }
    };

    let context = AttemptContext {
        quiz_id: doc.id.clone(),
        class_id: args
            .class_id
            .clone()
            .or_else(|| doc.class_id.clone())
            .unwrap_or_default(),
        student_name: args
            .student_name
            .clone()
            .unwrap_or_else(|| args.student_id.clone()),
        student_id: args.student_id,
    };

    tracing::debug!(quiz_id = %doc.id, questions = questions.len(), "starting session");
    print_intro(&doc, &questions, config.timing.session_budget_secs);

    let handle = SessionRunner::new(session, store, context).spawn();
    match drive(handle, &questions).await? {
        Some(outcome) => print_outcome(&outcome, &questions),
        None => println!("\nLeft without submitting. Nothing was recorded."),
    }

    Ok(())
}

async fn fetch_assigned(
    source: &dyn QuizSource,
    class_id: &str,
    quiz_id: &str,
) -> Result<QuizDocument> {
    source
        .assigned_quizzes(class_id)
        .await?
        .into_iter()
        .find(|q| q.id == quiz_id)
        .with_context(|| format!("quiz {quiz_id} is not assigned to class {class_id}"))
}

/// A parsed line of taker input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Choose(usize),
    Navigate(Navigation),
    Submit,
    Quit,
    Help,
    Redraw,
    Unknown(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim().to_lowercase();
    let mut words = line.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => Input::Redraw,
        (Some("n" | "next"), None) => Input::Navigate(Navigation::Next),
        (Some("p" | "prev" | "previous"), None) => Input::Navigate(Navigation::Previous),
        (Some("g" | "goto"), Some(n)) => match n.parse::<usize>() {
            Ok(n) if n >= 1 => Input::Navigate(Navigation::To(n - 1)),
            _ => Input::Unknown(line.clone()),
        },
        (Some("s" | "submit"), None) => Input::Submit,
        (Some("q" | "quit"), None) => Input::Quit,
        (Some("?" | "h" | "help"), None) => Input::Help,
        (Some(word), None) => match word.parse::<usize>() {
            Ok(n) if n >= 1 => Input::Choose(n - 1),
            _ => Input::Unknown(line.clone()),
        },
        _ => Input::Unknown(line.clone()),
    }
}

/// Feed stdin lines to the session until it completes or the taker leaves.
async fn drive(handle: SessionHandle, questions: &[Question]) -> Result<Option<SessionOutcome>> {
    let mut snapshots = handle.watch();
    let mut input = spawn_line_reader();
    let mut screen = Screen::new(questions);

    screen.render(&snapshots.borrow_and_update().clone());
    print_help();

    loop {
        tokio::select! {
            biased;

            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if snapshot.submitted {
                    break;
                }
                screen.render(&snapshot);
            }
            line = input.recv() => {
                let Some(line) = line else {
                    if handle.snapshot().submitted {
                        break;
                    }
                    handle.abandon().await?;
                    return Ok(None);
                };

                let snapshot = handle.snapshot();
                let result = match parse_input(&line) {
                    Input::Choose(option) => {
                        match questions[snapshot.current_index].options.get(option) {
                            Some(value) => handle.select(snapshot.current_index, value.clone()).await,
                            None => {
                                println!("  Choose 1-{}.", questions[snapshot.current_index].options.len());
                                Ok(())
                            }
                        }
                    }
                    Input::Navigate(nav) => handle.navigate(nav).await,
                    Input::Submit => handle.submit().await,
                    Input::Quit => {
                        handle.abandon().await?;
                        return Ok(None);
                    }
                    Input::Help => {
                        print_help();
                        Ok(())
                    }
                    Input::Redraw => {
                        screen.force_render(&snapshot);
                        Ok(())
                    }
                    Input::Unknown(text) => {
                        println!("  Unrecognised input '{text}'. Type ? for help.");
                        Ok(())
                    }
                };

                match result {
                    Ok(()) => {}
                    Err(CommandError::Rejected(e)) => println!("  {e}"),
                    Err(CommandError::Closed) => break,
                }
            }
        }
    }

    handle.finish().await
}

/// Tracks what has been printed so each snapshot only prints what changed.
struct Screen<'a> {
    questions: &'a [Question],
    shown_index: Option<usize>,
    shown_countdown: Option<u32>,
}

impl<'a> Screen<'a> {
    fn new(questions: &'a [Question]) -> Self {
        Self {
            questions,
            shown_index: None,
            shown_countdown: None,
        }
    }

    fn render(&mut self, snapshot: &SessionSnapshot) {
        if self.shown_index != Some(snapshot.current_index) {
            self.force_render(snapshot);
        }

        if snapshot.countdown != self.shown_countdown {
            match snapshot.countdown {
                Some(n) => println!("  All answered. Submitting in {n}s (navigate away to cancel)."),
                None if self.shown_countdown.is_some() => println!("  Auto-submit cancelled."),
                None => {}
            }
            self.shown_countdown = snapshot.countdown;
        }

        if TIME_WARNINGS.contains(&snapshot.seconds_remaining) {
            println!(
                "  {} remaining.",
                format_duration(snapshot.seconds_remaining)
            );
        }
    }

    fn force_render(&mut self, snapshot: &SessionSnapshot) {
        let question = &self.questions[snapshot.current_index];
        println!(
            "\nQuestion {} of {}  [{} left, {}/{} answered]",
            snapshot.current_index + 1,
            snapshot.total,
            format_duration(snapshot.seconds_remaining),
            snapshot.answered,
            snapshot.total
        );
        println!("{}", question.text);
        for (i, option) in question.options.iter().enumerate() {
            println!("  {}) {option}", i + 1);
        }
        self.shown_index = Some(snapshot.current_index);
    }
}

fn print_intro(doc: &QuizDocument, questions: &[Question], budget_secs: u64) {
    println!("{}", doc.title());
    if let Some(instructions) = doc.instructions.as_deref().filter(|s| !s.is_empty()) {
        println!("{instructions}");
    }
    println!(
        "{} questions, {} to finish.",
        questions.len(),
        format_duration(budget_secs)
    );
}

fn print_help() {
    println!("  Type an option number to answer, n/p to move, g <k> to jump, s to submit (last question), q to quit.");
}

fn print_outcome(outcome: &SessionOutcome, questions: &[Question]) {
    let completion = &outcome.completion;
    let how = match completion.reason {
        SubmitReason::Manual => "submitted",
        SubmitReason::AllAnswered => "submitted automatically",
        SubmitReason::TimerExpired => "time is up",
    };

    println!(
        "\nQuiz {how}. Score: {}% ({}/{} correct) in {}.",
        completion.score,
        completion.correct,
        completion.total,
        format_duration(completion.elapsed_secs)
    );

    for (i, question) in questions.iter().enumerate() {
        let given = completion.answers.get(i);
        let mark = if given.is_some_and(|a| question.is_correct(a)) {
            "OK"
        } else {
            "X"
        };
        println!(
            "  [{mark}] Q{}: {} (correct: {})",
            i + 1,
            given.unwrap_or("-"),
            question.correct_answer.as_deref().unwrap_or("?")
        );
        if let Some(explanation) = &question.explanation {
            println!("       {explanation}");
        }
    }

    if outcome.saved {
        println!("Result saved.");
    } else {
        eprintln!("Warning: the result could not be saved.");
    }
}
