//! The checkpoint — an ordered, append-only record of one task's steps.
//!
//! Every tool invocation a run attempts is recorded here, success or
//! failure, in issuance order. The task id is a deterministic hash of the
//! originating query so that a retried query lands on the same checkpoint
//! file and external tooling can look it up idempotently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One attempted step of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// What was attempted (e.g. `file_read(report.txt)`)
    pub label: String,

    /// Whether the step succeeded
    pub succeeded: bool,

    /// Tool output on success, error text on failure
    pub payload: String,

    /// Wall-clock time the step was recorded
    pub timestamp: DateTime<Utc>,
}

/// The durable record of a single task's attempted steps and outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Deterministic id — same query text, same id
    pub task_id: String,

    /// Ordered steps, append-only, strictly in issuance order
    pub steps: Vec<StepRecord>,

    /// When the run started
    pub created_at: DateTime<Utc>,

    /// When the last step was recorded
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Create a checkpoint for a query, deriving the task id from its text.
    pub fn for_query(query: &str) -> Self {
        Self::with_task_id(task_id_for(query))
    }

    /// Create a checkpoint with an explicit task id (used by stores on load).
    pub fn with_task_id(task_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a successful step.
    pub fn record_success(&mut self, label: impl Into<String>, payload: impl Into<String>) {
        self.record(label, payload, true);
    }

    /// Record a failed step.
    pub fn record_failure(&mut self, label: impl Into<String>, error: impl Into<String>) {
        self.record(label, error, false);
    }

    /// Append a step. Steps are never removed or reordered.
    pub fn record(&mut self, label: impl Into<String>, payload: impl Into<String>, succeeded: bool) {
        let now = Utc::now();
        self.updated_at = now;
        self.steps.push(StepRecord {
            label: label.into(),
            succeeded,
            payload: payload.into(),
            timestamp: now,
        });
    }

    /// Whether any step succeeded — decides PARTIAL vs FAILED at the end of
    /// an exhausted run.
    pub fn has_any_success(&self) -> bool {
        self.steps.iter().any(|s| s.succeeded)
    }

    /// Steps that succeeded, in order.
    pub fn successes(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| s.succeeded)
    }

    /// Steps that failed, in order.
    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| !s.succeeded)
    }

    /// Fraction of recorded steps that succeeded (0.0 when no steps).
    pub fn success_rate(&self) -> f32 {
        if self.steps.is_empty() {
            return 0.0;
        }
        self.successes().count() as f32 / self.steps.len() as f32
    }
}

/// Derive the deterministic task id for a query: hex SHA-256 of the text,
/// truncated to 16 characters for readable file names.
pub fn task_id_for(query: &str) -> String {
    let digest = Sha256::digest(query.as_bytes());
    let mut id = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_is_deterministic() {
        let a = task_id_for("Read file report.txt and summarize it");
        let b = task_id_for("Read file report.txt and summarize it");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn task_id_differs_per_query() {
        assert_ne!(task_id_for("query one"), task_id_for("query two"));
    }

    #[test]
    fn steps_are_ordered_and_append_only() {
        let mut cp = Checkpoint::for_query("test");
        cp.record_success("step one", "ok");
        cp.record_failure("step two", "boom");
        cp.record_success("step three", "ok again");

        assert_eq!(cp.steps.len(), 3);
        assert_eq!(cp.steps[0].label, "step one");
        assert_eq!(cp.steps[1].label, "step two");
        assert!(!cp.steps[1].succeeded);
        assert_eq!(cp.steps[2].label, "step three");
        assert!(cp.steps[0].timestamp <= cp.steps[2].timestamp);
    }

    #[test]
    fn has_any_success_reflects_steps() {
        let mut cp = Checkpoint::for_query("test");
        assert!(!cp.has_any_success());

        cp.record_failure("a", "err");
        assert!(!cp.has_any_success());

        cp.record_success("b", "ok");
        assert!(cp.has_any_success());
    }

    #[test]
    fn success_rate() {
        let mut cp = Checkpoint::for_query("test");
        assert_eq!(cp.success_rate(), 0.0);

        cp.record_success("a", "ok");
        cp.record_failure("b", "err");
        assert!((cp.success_rate() - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn serialization_roundtrip_preserves_everything() {
        let mut cp = Checkpoint::for_query("roundtrip");
        cp.record_success("fetch", "42 bytes");
        cp.record_failure("parse", "unexpected EOF");

        let json = serde_json::to_string(&cp).unwrap();
        let restored: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, cp);
    }
}
