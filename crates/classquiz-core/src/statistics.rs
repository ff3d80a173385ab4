//! Aggregate statistics and ranking over a set of attempts.
//!
//! Everything here is a pure function of the attempt list; the results
//! monitor simply calls [`aggregate`] again on every refresh.

use serde::{Deserialize, Serialize};

use crate::model::AssessmentAttempt;
use crate::scoring::percentage;

/// Default minimum score counted as a pass.
pub const DEFAULT_PASS_THRESHOLD: u8 = 60;

/// Number of leading ranks that receive a medal.
pub const PODIUM_SIZE: usize = 3;

/// Medal tier for the top ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Medal {
    Gold,
    Silver,
    Bronze,
}

impl Medal {
    /// Medal for a 1-based rank, if it is on the podium.
    pub fn for_rank(rank: usize) -> Option<Medal> {
        match rank {
            1 => Some(Medal::Gold),
            2 => Some(Medal::Silver),
            3 => Some(Medal::Bronze),
            _ => None,
        }
    }
}

impl std::fmt::Display for Medal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Medal::Gold => write!(f, "GOLD"),
            Medal::Silver => write!(f, "SILVER"),
            Medal::Bronze => write!(f, "BRONZE"),
        }
    }
}

/// Summary statistics over a non-empty attempt set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreStats {
    pub total_students: usize,
    /// Mean score, rounded half up.
    pub average_score: u8,
    pub highest_score: u8,
    pub lowest_score: u8,
    /// Middle element of the ascending scores (`scores[n / 2]`).
    pub median_score: u8,
    /// Percentage of attempts at or above the pass threshold, rounded.
    pub pass_rate: u8,
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedAttempt {
    /// 1-based position; never shared between attempts.
    pub rank: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medal: Option<Medal>,
    pub attempt: AssessmentAttempt,
}

impl RankedAttempt {
    pub fn is_top3(&self) -> bool {
        self.medal.is_some()
    }
}

/// Statistics and ranking for one (quiz, class) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// `None` when there are no attempts.
    pub stats: Option<ScoreStats>,
    pub rankings: Vec<RankedAttempt>,
    pub pass_threshold: u8,
}

impl AggregateReport {
    pub fn is_empty(&self) -> bool {
        self.rankings.is_empty()
    }

    /// The medal rows, best first.
    pub fn podium(&self) -> &[RankedAttempt] {
        &self.rankings[..self.rankings.len().min(PODIUM_SIZE)]
    }
}

/// Compute statistics and a ranking from attempts in arrival order.
pub fn aggregate(attempts: &[AssessmentAttempt], pass_threshold: u8) -> AggregateReport {
    AggregateReport {
        stats: score_stats(attempts, pass_threshold),
        rankings: rank(attempts),
        pass_threshold,
    }
}

fn score_stats(attempts: &[AssessmentAttempt], pass_threshold: u8) -> Option<ScoreStats> {
    if attempts.is_empty() {
        return None;
    }

    let mut scores: Vec<u8> = attempts.iter().map(|a| a.score).collect();
    scores.sort_unstable();

    let n = scores.len();
    let sum: usize = scores.iter().map(|&s| s as usize).sum();
    let passed = scores.iter().filter(|&&s| s >= pass_threshold).count();

    Some(ScoreStats {
        total_students: n,
        average_score: round_div(sum, n),
        highest_score: scores[n - 1],
        lowest_score: scores[0],
        median_score: scores[n / 2],
        pass_rate: percentage(passed, n),
    })
}

/// Half-up rounded integer mean.
fn round_div(sum: usize, n: usize) -> u8 {
    ((sum * 2 + n) / (n * 2)) as u8
}

/// Rank by score, highest first. Ties keep arrival order and still get
/// distinct consecutive ranks; medals go to ranks 1–3 regardless of score.
pub fn rank(attempts: &[AssessmentAttempt]) -> Vec<RankedAttempt> {
    let mut ordered: Vec<&AssessmentAttempt> = attempts.iter().collect();
    // `sort_by` is stable, so equal scores stay in arrival order.
    ordered.sort_by(|a, b| b.score.cmp(&a.score));

    ordered
        .into_iter()
        .enumerate()
        .map(|(i, attempt)| RankedAttempt {
            rank: i + 1,
            medal: Medal::for_rank(i + 1),
            attempt: attempt.clone(),
        })
        .collect()
}
