//! Results report types with JSON persistence and markdown rendering.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::AssessmentAttempt;
use crate::statistics::{aggregate, AggregateReport};

/// A snapshot of one class's results for one quiz.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsReport {
    pub quiz_id: String,
    pub class_id: String,
    /// When the attempts were read.
    pub generated_at: DateTime<Utc>,
    pub report: AggregateReport,
}

impl ResultsReport {
    /// Build a report from attempts already narrowed to the class.
    pub fn from_attempts(
        quiz_id: impl Into<String>,
        class_id: impl Into<String>,
        attempts: &[AssessmentAttempt],
        pass_threshold: u8,
    ) -> Self {
        Self {
            quiz_id: quiz_id.into(),
            class_id: class_id.into(),
            generated_at: Utc::now(),
            report: aggregate(attempts, pass_threshold),
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ResultsReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Format the report as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "## Results: {} (class {})\n\n",
            self.quiz_id, self.class_id
        ));

        let Some(stats) = &self.report.stats else {
            md.push_str("No students have completed this quiz yet.\n");
            return md;
        };

        md.push_str(&format!(
            "**Summary:** {} students, average {}%, median {}%, pass rate {}% (pass mark {}%)\n\n",
            stats.total_students,
            stats.average_score,
            stats.median_score,
            stats.pass_rate,
            self.report.pass_threshold
        ));
        md.push_str(&format!(
            "Highest {}%, lowest {}%\n\n",
            stats.highest_score, stats.lowest_score
        ));

        md.push_str("### Leaderboard\n\n");
        md.push_str("| Rank | Student | Score | Answered | Time |\n");
        md.push_str("|------|---------|-------|----------|------|\n");
        for row in &self.report.rankings {
            let medal = row.medal.map(|m| format!(" {m}")).unwrap_or_default();
            md.push_str(&format!(
                "| {}{} | {} | {}% | {}/{} | {} |\n",
                row.rank,
                medal,
                row.attempt.display_name(),
                row.attempt.score,
                row.attempt.answered_count(),
                row.attempt.answers.len(),
                format_duration(row.attempt.time_taken)
            ));
        }

        md
    }
}

/// Format seconds as `m:ss`.
pub fn format_duration(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AnswerVector;

    fn attempt(student: &str, score: u8, answered: usize) -> AssessmentAttempt {
        let mut answers = AnswerVector::unanswered(4);
        for i in 0..answered {
            answers.set(i, "x");
        }
        AssessmentAttempt {
            id: None,
            quiz_id: "Q1".into(),
            student_id: student.into(),
            student_name: format!("Student {student}"),
            class_id: "C1".into(),
            answers,
            score,
            time_taken: 125,
            completed_at: None,
        }
    }

    #[test]
    fn json_roundtrip() {
        let report = ResultsReport::from_attempts(
            "Q1",
            "C1",
            &[attempt("a", 75, 3), attempt("b", 50, 4)],
            60,
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.json");

        report.save_json(&path).unwrap();
        let loaded = ResultsReport::load_json(&path).unwrap();

        assert_eq!(loaded.quiz_id, "Q1");
        assert_eq!(loaded.report, report.report);
    }

    #[test]
    fn load_missing_file_fails_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let err = ResultsReport::load_json(&dir.path().join("absent.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read report"));
    }

    #[test]
    fn markdown_output() {
        let report = ResultsReport::from_attempts(
            "Q1",
            "C1",
            &[attempt("a", 50, 2), attempt("b", 100, 4)],
            60,
        );
        let md = report.to_markdown();
        assert!(md.contains("Leaderboard"));
        assert!(md.contains("| 1 GOLD | Student b | 100% | 4/4 | 2:05 |"));
        assert!(md.contains("| 2 SILVER | Student a | 50% | 2/4 | 2:05 |"));
        assert!(md.contains("pass rate 50%"));
    }

    #[test]
    fn markdown_for_empty_results() {
        let report = ResultsReport::from_attempts("Q1", "C1", &[], 60);
        assert!(report.to_markdown().contains("No students"));
    }

    #[test]
    fn duration_formatting() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(65), "1:05");
        assert_eq!(format_duration(1800), "30:00");
    }
}
