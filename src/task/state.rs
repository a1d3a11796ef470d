//! Remote task state as observed by polling.
//!
//! # Invariants
//! - `Succeeded` and `Failed` are terminal: once observed for a handle they
//!   never change.
//! - A `TaskOutcome` is only produced from a terminal `TaskInfo`.

use chrono::{DateTime, TimeDelta, Utc};

/// Detail used when the server reports a failure without saying why.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Lifecycle state of a remote asynchronous operation.
///
/// # State Machine
/// ```text
/// Queued ──► Running ──► Succeeded
///    │          │
///    └──────────┴──────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Succeeded | TaskState::Failed)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskState::Queued => write!(f, "queued"),
            TaskState::Running => write!(f, "running"),
            TaskState::Succeeded => write!(f, "succeeded"),
            TaskState::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of a remote task returned by one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskInfo {
    pub state: TaskState,

    /// Remote-supplied failure detail, set when `state` is `Failed`
    pub error: Option<String>,

    /// Human readable operation name, when the server provides one
    pub description: Option<String>,

    pub start_time: Option<DateTime<Utc>>,

    pub completion_time: Option<DateTime<Utc>>,
}

impl TaskInfo {
    /// Snapshot carrying only a state.
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            error: None,
            description: None,
            start_time: None,
            completion_time: None,
        }
    }

    /// Failed snapshot carrying the remote error detail.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(TaskState::Failed)
        }
    }

    /// Time the server spent on the task, when it reports both timestamps.
    pub fn remote_duration(&self) -> Option<TimeDelta> {
        match (self.start_time, self.completion_time) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }

    /// Classify a terminal snapshot.
    ///
    /// Returns `None` while the task is still queued or running.
    pub fn outcome(&self) -> Option<TaskOutcome> {
        match self.state {
            TaskState::Queued | TaskState::Running => None,
            TaskState::Succeeded => Some(TaskOutcome::Succeeded),
            TaskState::Failed => Some(TaskOutcome::Failed {
                error: self
                    .error
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            }),
        }
    }
}

/// Classified result of a task that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    Failed { error: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Succeeded)
    }
}
