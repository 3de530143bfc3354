//! Partial-result synthesis — turning a degraded run into an actionable
//! report instead of a bare error.
//!
//! A report is a pure, derived view of a checkpoint: compute it twice from
//! the same checkpoint and you get the same report, so it can be snapshot
//! tested. It is never persisted — the checkpoint is the durable artifact.

use crate::checkpoint::Checkpoint;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Why a run ended without a final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StopReason {
    /// The iteration cap was reached without the model producing an answer
    IterationsExhausted { max_iterations: u32 },
    /// The model capability itself failed after retries
    ModelFailure(String),
    /// The caller cancelled the run
    Cancelled,
}

impl StopReason {
    fn describe(&self) -> String {
        match self {
            StopReason::IterationsExhausted { max_iterations } => format!(
                "The reasoning loop reached its limit of {max_iterations} iterations without arriving at a final answer."
            ),
            StopReason::ModelFailure(msg) => {
                format!("The language model could not be reached: {msg}")
            }
            StopReason::Cancelled => "The run was cancelled before it could finish.".to_string(),
        }
    }
}

/// Coarse buckets for failure text, used only to pick canned suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCategory {
    FileAccess,
    Network,
    Permission,
    Other,
}

impl ErrorCategory {
    /// Classify an error message by keyword. Deterministic; biased toward
    /// the specific buckets, falling back to `Other`.
    pub fn classify(error_text: &str) -> Self {
        let text = error_text.to_lowercase();

        const FILE_KEYWORDS: &[&str] =
            &["file not found", "no such file", "does not exist", "is a directory", "not a file"];
        const NETWORK_KEYWORDS: &[&str] =
            &["timeout", "timed out", "connection", "network", "rate limit", "unreachable"];
        const PERMISSION_KEYWORDS: &[&str] =
            &["permission denied", "unauthorized", "forbidden", "api key", "authentication"];

        if FILE_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            ErrorCategory::FileAccess
        } else if PERMISSION_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            ErrorCategory::Permission
        } else if NETWORK_KEYWORDS.iter().any(|kw| text.contains(kw)) {
            ErrorCategory::Network
        } else {
            ErrorCategory::Other
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            ErrorCategory::FileAccess => vec![
                "Check that the file path exists and is accessible".into(),
                "Try an absolute path instead of a relative one".into(),
            ],
            ErrorCategory::Network => vec![
                "Retry the request — the network issue may be temporary".into(),
                "Check connectivity to the remote service".into(),
            ],
            ErrorCategory::Permission => vec![
                "Verify the necessary permissions and API keys are configured".into(),
                "Check that authentication tokens are still valid".into(),
            ],
            ErrorCategory::Other => vec![
                "Review the completed steps above — some results may be usable".into(),
                "Try breaking the task into smaller steps".into(),
            ],
        }
    }
}

const PREVIEW_MAX_CHARS: usize = 100;

/// A completed step with a truncated result preview.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedStep {
    pub label: String,
    pub preview: String,
}

/// A failed step with its error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedStep {
    pub label: String,
    pub error: String,
}

/// The user-facing report for a partially completed run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialReport {
    pub task_id: String,
    /// Percent of attempted steps that succeeded
    pub success_pct: u32,
    pub completed: Vec<CompletedStep>,
    pub failed: Vec<FailedStep>,
    /// One line explaining why the run stopped
    pub stopped_because: String,
    /// Ranked next actions, most useful first
    pub suggestions: Vec<String>,
}

impl PartialReport {
    /// Derive a report from a checkpoint and the reason the run stopped.
    ///
    /// Pure function: identical inputs always produce identical reports.
    pub fn from_checkpoint(checkpoint: &Checkpoint, reason: &StopReason) -> Self {
        let completed = checkpoint
            .successes()
            .map(|s| CompletedStep {
                label: s.label.clone(),
                preview: truncate_preview(&s.payload),
            })
            .collect();

        let failed: Vec<FailedStep> = checkpoint
            .failures()
            .map(|s| FailedStep {
                label: s.label.clone(),
                error: s.payload.clone(),
            })
            .collect();

        // Suggestions come from the last failure's category; the stop reason
        // text is the fallback signal when no step failed.
        let category = match failed.last() {
            Some(step) => ErrorCategory::classify(&step.error),
            None => ErrorCategory::classify(&reason.describe()),
        };
        let mut suggestions = category.suggestions();
        if checkpoint.has_any_success() {
            suggestions.push(format!(
                "Resume from the saved checkpoint (task id: {})",
                checkpoint.task_id
            ));
        }

        Self {
            task_id: checkpoint.task_id.clone(),
            success_pct: (checkpoint.success_rate() * 100.0).round() as u32,
            completed,
            failed,
            stopped_because: reason.describe(),
            suggestions,
        }
    }

    /// Render the report as user-facing text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Task partially completed ({}% of steps succeeded)", self.success_pct);

        if !self.completed.is_empty() {
            let _ = writeln!(out, "\nWhat worked:");
            for (i, step) in self.completed.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, step.label);
                if !step.preview.is_empty() {
                    let _ = writeln!(out, "     -> {}", step.preview);
                }
            }
        }

        if !self.failed.is_empty() {
            let _ = writeln!(out, "\nWhat failed:");
            for (i, step) in self.failed.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, step.label);
                let _ = writeln!(out, "     error: {}", step.error);
            }
        }

        let _ = writeln!(out, "\nWhy it stopped:\n  {}", self.stopped_because);

        if !self.suggestions.is_empty() {
            let _ = writeln!(out, "\nSuggested next steps:");
            for (i, suggestion) in self.suggestions.iter().enumerate() {
                let _ = writeln!(out, "  {}. {}", i + 1, suggestion);
            }
        }

        out
    }
}

fn truncate_preview(payload: &str) -> String {
    let trimmed = payload.trim();
    if trimmed.chars().count() <= PREVIEW_MAX_CHARS {
        return trimmed.to_string();
    }
    let truncated: String = trimmed.chars().take(PREVIEW_MAX_CHARS).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn degraded_checkpoint() -> Checkpoint {
        let mut cp = Checkpoint::with_task_id("deadbeef00000000");
        cp.record_success("web_search(rust agents)", "Found 3 relevant results");
        cp.record_failure("code_exec(analysis.py)", "execution timed out after 60s");
        cp
    }

    #[test]
    fn classify_file_errors() {
        assert_eq!(
            ErrorCategory::classify("Error: file not found: report.txt"),
            ErrorCategory::FileAccess
        );
        assert_eq!(
            ErrorCategory::classify("path does not exist"),
            ErrorCategory::FileAccess
        );
    }

    #[test]
    fn classify_network_errors() {
        assert_eq!(
            ErrorCategory::classify("request timed out after 30s"),
            ErrorCategory::Network
        );
        assert_eq!(
            ErrorCategory::classify("connection refused"),
            ErrorCategory::Network
        );
    }

    #[test]
    fn classify_permission_errors() {
        assert_eq!(
            ErrorCategory::classify("Permission denied: /etc/shadow"),
            ErrorCategory::Permission
        );
        assert_eq!(
            ErrorCategory::classify("401 Unauthorized"),
            ErrorCategory::Permission
        );
    }

    #[test]
    fn classify_falls_back_to_other() {
        assert_eq!(
            ErrorCategory::classify("something inexplicable happened"),
            ErrorCategory::Other
        );
    }

    #[test]
    fn report_is_deterministic() {
        let cp = degraded_checkpoint();
        let reason = StopReason::IterationsExhausted { max_iterations: 10 };

        let a = PartialReport::from_checkpoint(&cp, &reason);
        let b = PartialReport::from_checkpoint(&cp, &reason);
        assert_eq!(a, b);
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn report_separates_successes_and_failures() {
        let cp = degraded_checkpoint();
        let report = PartialReport::from_checkpoint(
            &cp,
            &StopReason::IterationsExhausted { max_iterations: 10 },
        );

        assert_eq!(report.success_pct, 50);
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].label, "web_search(rust agents)");
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].error.contains("timed out"));
    }

    #[test]
    fn suggestions_follow_last_failure_category() {
        let cp = degraded_checkpoint();
        let report = PartialReport::from_checkpoint(
            &cp,
            &StopReason::IterationsExhausted { max_iterations: 10 },
        );

        // Last failure was a timeout — network suggestions plus resume hint.
        assert!(report.suggestions[0].contains("Retry"));
        assert!(report
            .suggestions
            .last()
            .unwrap()
            .contains("deadbeef00000000"));
    }

    #[test]
    fn no_resume_hint_without_successes() {
        let mut cp = Checkpoint::with_task_id("t1");
        cp.record_failure("only_step", "file not found");
        let report =
            PartialReport::from_checkpoint(&cp, &StopReason::ModelFailure("network".into()));

        assert!(!report.suggestions.iter().any(|s| s.contains("Resume")));
    }

    #[test]
    fn preview_is_truncated() {
        let mut cp = Checkpoint::with_task_id("t1");
        cp.record_success("big_step", "x".repeat(500));
        let report = PartialReport::from_checkpoint(&cp, &StopReason::Cancelled);

        assert!(report.completed[0].preview.len() <= PREVIEW_MAX_CHARS + 3);
        assert!(report.completed[0].preview.ends_with("..."));
    }

    #[test]
    fn render_includes_all_sections() {
        let cp = degraded_checkpoint();
        let text = PartialReport::from_checkpoint(
            &cp,
            &StopReason::IterationsExhausted { max_iterations: 10 },
        )
        .render();

        assert!(text.contains("What worked:"));
        assert!(text.contains("What failed:"));
        assert!(text.contains("Why it stopped:"));
        assert!(text.contains("Suggested next steps:"));
        assert!(text.contains("10 iterations"));
    }
}
