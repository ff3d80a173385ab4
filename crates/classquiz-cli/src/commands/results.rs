//! The `classquiz results` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;

use classquiz_core::model::AssessmentAttempt;
use classquiz_core::monitor::{load_report, ResultsMonitor, ResultsView};
use classquiz_core::report::{format_duration, ResultsReport};
use classquiz_core::traits::ResultStore;
use classquiz_store::config::{create_store, load_config_from};
use classquiz_store::InMemoryStore;

use super::spawn_line_reader;

pub struct ResultsArgs {
    pub quiz_id: String,
    pub class_id: String,
    pub from: Option<PathBuf>,
    pub watch: bool,
    pub format: String,
    pub output: Option<PathBuf>,
    pub pass_threshold: Option<u8>,
    pub config: Option<PathBuf>,
}

pub async fn execute(args: ResultsArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;
    let mut monitor_config = config.monitor_config();
    if let Some(threshold) = args.pass_threshold {
        monitor_config.pass_threshold = threshold;
    }

    let store: Arc<dyn ResultStore> = match &args.from {
        Some(path) => Arc::new(InMemoryStore::new().with_attempts(load_attempts(path)?)),
        None => create_store(&config.backend)?,
    };

    if args.watch {
        let monitor = ResultsMonitor::new(
            store,
            args.quiz_id.clone(),
            args.class_id.clone(),
            monitor_config,
        );
        return watch(monitor, &args).await;
    }

    let report = load_report(
        store.as_ref(),
        &args.quiz_id,
        &args.class_id,
        monitor_config.pass_threshold,
    )
    .await
    .context("failed to fetch quiz results")?;

    let report = ResultsReport {
        quiz_id: args.quiz_id.clone(),
        class_id: args.class_id.clone(),
        generated_at: Utc::now(),
        report,
    };
    print_report(&report, &args.format)?;

    if let Some(path) = &args.output {
        report.save_json(path)?;
        eprintln!("Report saved to: {}", path.display());
    }

    Ok(())
}

/// A line typed while watching results.
#[derive(Debug, PartialEq, Eq)]
enum WatchInput {
    Refresh,
    Quit,
    Unknown(String),
}

fn parse_watch_input(line: &str) -> WatchInput {
    match line.trim().to_lowercase().as_str() {
        "" | "r" | "refresh" => WatchInput::Refresh,
        "q" | "quit" => WatchInput::Quit,
        other => WatchInput::Unknown(other.to_string()),
    }
}

async fn watch(monitor: ResultsMonitor, args: &ResultsArgs) -> Result<()> {
    let handle = monitor.spawn();
    let mut views = handle.subscribe();
    let mut input = spawn_line_reader();
    let mut input_open = true;

    eprintln!("Press Enter or r to refresh now, q to stop.");

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                match view {
                    ResultsView::Loading => {}
                    ResultsView::Ready { report, updated_at } => {
                        let report = ResultsReport {
                            quiz_id: args.quiz_id.clone(),
                            class_id: args.class_id.clone(),
                            generated_at: updated_at,
                            report,
                        };
                        print_report(&report, &args.format)?;
                        if let Some(path) = &args.output {
                            report.save_json(path)?;
                        }
                        eprintln!(
                            "Last updated {} (Ctrl-C to stop)",
                            updated_at.format("%H:%M:%S")
                        );
                    }
                    ResultsView::Failed { error, updated_at } => {
                        eprintln!(
                            "Failed to fetch quiz results at {}: {error}",
                            updated_at.format("%H:%M:%S")
                        );
                    }
                }
            }
            line = input.recv(), if input_open => {
                let Some(line) = line else {
                    input_open = false;
                    continue;
                };
                match parse_watch_input(&line) {
                    WatchInput::Refresh => {
                        eprintln!("Refreshing...");
                        handle.refresh().await;
                    }
                    WatchInput::Quit => break,
                    WatchInput::Unknown(text) => {
                        eprintln!("Unrecognised input '{text}'. Enter or r refreshes, q stops.");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.stop().await;
    Ok(())
}

fn load_attempts(path: &Path) -> Result<Vec<AssessmentAttempt>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read attempts: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse attempts: {}", path.display()))
}

fn print_report(report: &ResultsReport, format: &str) -> Result<()> {
    match format {
        "markdown" | "md" => println!("{}", report.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(report)?),
        _ => print_text(report),
    }
    Ok(())
}

fn print_text(report: &ResultsReport) {
    use comfy_table::{Cell, Table};

    println!(
        "Results for quiz {} (class {})",
        report.quiz_id, report.class_id
    );

    let Some(stats) = &report.report.stats else {
        println!("No students have completed this quiz yet.");
        return;
    };

    println!(
        "Students: {}  Average: {}%  Median: {}%  Highest: {}%  Lowest: {}%  Pass rate: {}% (>= {}%)",
        stats.total_students,
        stats.average_score,
        stats.median_score,
        stats.highest_score,
        stats.lowest_score,
        stats.pass_rate,
        report.report.pass_threshold
    );

    let mut table = Table::new();
    table.set_header(vec!["Rank", "Student", "Score", "Answered", "Time", "Completed"]);

    for row in &report.report.rankings {
        let rank = match row.medal {
            Some(medal) => format!("{} {medal}", row.rank),
            None => row.rank.to_string(),
        };
        let completed = row
            .attempt
            .completed_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(rank),
            Cell::new(row.attempt.display_name()),
            Cell::new(format!("{}%", row.attempt.score)),
            Cell::new(format!(
                "Answered {} out of {}",
                row.attempt.answered_count(),
                row.attempt.answers.len()
            )),
            Cell::new(format_duration(row.attempt.time_taken)),
            Cell::new(completed),
        ]);
    }

    println!("{table}");
}
