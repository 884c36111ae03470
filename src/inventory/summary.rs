//! Discovery Run Summary
//!
//! Per-task outcomes and run-wide counters handed to reporting consumers
//! alongside the resource list.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::confidence::ConfidenceBand;
use super::types::CanonicalResource;

/// Lifecycle of one service's discovery task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    TimedOut,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::TimedOut | TaskState::Failed
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Pending => write!(f, "pending"),
            TaskState::Running => write!(f, "running"),
            TaskState::Completed => write!(f, "completed"),
            TaskState::TimedOut => write!(f, "timed_out"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

/// Outcome of one discovery task
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub service: String,
    pub state: TaskState,
    pub operations_attempted: usize,
    /// Operations rejected as not applicable (missing parameters etc.)
    pub operations_skipped: usize,
    pub operations_timed_out: usize,
    /// Candidates extracted before managed-resource filtering
    pub candidates_extracted: usize,
    pub managed_filtered: usize,
    /// Candidates handed to the merger
    pub candidates_kept: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl TaskReport {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            state: TaskState::Pending,
            operations_attempted: 0,
            operations_skipped: 0,
            operations_timed_out: 0,
            candidates_extracted: 0,
            managed_filtered: 0,
            candidates_kept: 0,
            error: None,
            elapsed_ms: 0,
        }
    }

    /// Mark failed; whatever the task gathered is discarded
    pub fn failed(mut self, error: impl ToString) -> Self {
        self.state = TaskState::Failed;
        self.error = Some(error.to_string());
        self.candidates_kept = 0;
        self
    }
}

/// Confidence-score histogram over the final resource set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfidenceHistogram {
    /// score >= 0.7
    pub high: usize,
    /// 0.4 <= score < 0.7
    pub medium: usize,
    /// score < 0.4
    pub low: usize,
}

impl ConfidenceHistogram {
    pub fn from_resources(resources: &[CanonicalResource]) -> Self {
        resources.iter().fold(Self::default(), |mut h, r| {
            match ConfidenceBand::of(r.confidence_score()) {
                ConfidenceBand::High => h.high += 1,
                ConfidenceBand::Medium => h.medium += 1,
                ConfidenceBand::Low => h.low += 1,
            }
            h
        })
    }
}

/// Run-wide discovery counters
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub services_attempted: usize,
    pub services_succeeded: usize,
    pub services_timed_out: usize,
    pub services_failed: usize,
    pub candidates_before_filter: usize,
    pub candidates_after_filter: usize,
    pub candidates_before_merge: usize,
    pub candidates_after_merge: usize,
    /// Final records without a usable identifier
    pub unresolved: usize,
    pub confidence: ConfidenceHistogram,
    pub tasks: Vec<TaskReport>,
}

impl RunSummary {
    pub fn build(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        tasks: Vec<TaskReport>,
        candidates_before_merge: usize,
        resources: &[CanonicalResource],
    ) -> Self {
        let count = |state: TaskState| tasks.iter().filter(|t| t.state == state).count();
        let contributing = || tasks.iter().filter(|t| t.state != TaskState::Failed);

        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            services_attempted: tasks.len(),
            services_succeeded: count(TaskState::Completed),
            services_timed_out: count(TaskState::TimedOut),
            services_failed: count(TaskState::Failed),
            candidates_before_filter: contributing().map(|t| t.candidates_extracted).sum(),
            candidates_after_filter: contributing().map(|t| t.candidates_kept).sum(),
            candidates_before_merge,
            candidates_after_merge: resources.len(),
            unresolved: resources.iter().filter(|r| r.is_unresolved()).count(),
            confidence: ConfidenceHistogram::from_resources(resources),
            tasks,
        }
    }
}
