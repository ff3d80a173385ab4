//! Periodic results refresh for a class viewer.
//!
//! Re-reads a quiz's attempts on a fixed interval (and on demand) and
//! publishes the freshly aggregated report. There is no incremental update:
//! each refresh recomputes from scratch.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::statistics::{aggregate, AggregateReport, DEFAULT_PASS_THRESHOLD};
use crate::traits::ResultStore;

/// Configuration for the results monitor.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Time between automatic refreshes.
    pub refresh_interval: Duration,
    /// Minimum passing score.
    pub pass_threshold: u8,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(10),
            pass_threshold: DEFAULT_PASS_THRESHOLD,
        }
    }
}

/// What the viewer should currently display.
#[derive(Debug, Clone)]
pub enum ResultsView {
    /// No read has completed yet.
    Loading,
    Ready {
        report: AggregateReport,
        updated_at: DateTime<Utc>,
    },
    /// The last read failed. Previous data is not kept.
    Failed {
        error: String,
        updated_at: DateTime<Utc>,
    },
}

/// Read and aggregate the attempts for one class once.
pub async fn load_report(
    store: &dyn ResultStore,
    quiz_id: &str,
    class_id: &str,
    pass_threshold: u8,
) -> anyhow::Result<AggregateReport> {
    let attempts = store.read_all(quiz_id, class_id).await?;
    Ok(aggregate(&attempts, pass_threshold))
}

/// Polls a result store on behalf of one viewer.
pub struct ResultsMonitor {
    store: Arc<dyn ResultStore>,
    quiz_id: String,
    class_id: String,
    config: MonitorConfig,
}

impl ResultsMonitor {
    pub fn new(
        store: Arc<dyn ResultStore>,
        quiz_id: impl Into<String>,
        class_id: impl Into<String>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            store,
            quiz_id: quiz_id.into(),
            class_id: class_id.into(),
            config,
        }
    }

    /// Start polling. The first refresh happens immediately.
    pub fn spawn(self) -> MonitorHandle {
        let (view_tx, views) = watch::channel(ResultsView::Loading);
        let (refresh, requests) = mpsc::channel(4);
        let task = tokio::spawn(self.run(view_tx, requests));

        MonitorHandle {
            views,
            refresh,
            task,
        }
    }

    async fn run(self, views: watch::Sender<ResultsView>, mut requests: mpsc::Receiver<()>) {
        let mut ticker = interval(self.config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                request = requests.recv() => {
                    if request.is_none() {
                        break;
                    }
                    ticker.reset();
                }
            }

            let view = self.refresh_once().await;
            if views.send(view).is_err() {
                break;
            }
        }

        tracing::debug!(quiz_id = %self.quiz_id, class_id = %self.class_id, "results monitor stopped");
    }

    async fn refresh_once(&self) -> ResultsView {
        let updated_at = Utc::now();
        match load_report(
            self.store.as_ref(),
            &self.quiz_id,
            &self.class_id,
            self.config.pass_threshold,
        )
        .await
        {
            Ok(report) => {
                tracing::info!(
                    quiz_id = %self.quiz_id,
                    class_id = %self.class_id,
                    attempts = report.rankings.len(),
                    "results refreshed"
                );
                ResultsView::Ready { report, updated_at }
            }
            Err(e) => {
                tracing::error!(
                    "failed to fetch results for {}/{}: {e:#}",
                    self.quiz_id,
                    self.class_id
                );
                ResultsView::Failed {
                    error: format!("{e:#}"),
                    updated_at,
                }
            }
        }
    }
}

/// The viewer's side of a running monitor. Dropping it stops polling.
pub struct MonitorHandle {
    views: watch::Receiver<ResultsView>,
    refresh: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Subscribe to view updates.
    pub fn subscribe(&self) -> watch::Receiver<ResultsView> {
        self.views.clone()
    }

    /// Ask for an immediate refresh. Also restarts the interval.
    pub async fn refresh(&self) {
        let _ = self.refresh.send(()).await;
    }

    /// Stop polling and wait for the loop to exit.
    pub async fn stop(self) {
        let MonitorHandle {
            views,
            refresh,
            task,
        } = self;
        drop(refresh);
        drop(views);
        let _ = task.await;
    }
}
