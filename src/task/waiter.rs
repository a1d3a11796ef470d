//! Blocking wait on a remote asynchronous task.
//!
//! The waiter polls a [`TaskHandle`] at a fixed interval until the task
//! reaches a terminal state. There is no backoff and no retry: a failed poll
//! aborts the wait. A timeout and a cancellation token can be supplied to
//! bound the wait; without them it runs until the task finishes.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::state::{TaskInfo, TaskOutcome, TaskState};
use crate::vcenter::ApiError;

/// Interval between polls of a non-terminal task.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Stand-in for deadlines that do not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Reference to an operation running on the management server.
///
/// The process does not own the operation; it can only ask for its state.
#[async_trait]
pub trait TaskHandle: Send + Sync {
    /// Server-side identifier of the task.
    fn id(&self) -> &str;

    /// Fetch the current state of the task.
    async fn info(&self) -> Result<TaskInfo, ApiError>;
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("Failed to query task {task_id}: {source}")]
    Query {
        task_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Task {task_id} did not finish within {timeout:?} (last state: {last_state})")]
    TimedOut {
        task_id: String,
        timeout: Duration,
        last_state: TaskState,
    },

    #[error("Wait for task {task_id} was cancelled")]
    Cancelled { task_id: String },
}

/// Polls remote tasks until they finish.
#[derive(Debug, Clone)]
pub struct TaskWaiter {
    poll_interval: Duration,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Default for TaskWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl TaskWaiter {
    /// Create a waiter with no timeout and no external cancellation.
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Give up once `timeout` has elapsed without a terminal state.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Abort the wait when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Wait for `handle` to reach a terminal state and classify it.
    ///
    /// Never returns an outcome before a terminal state has been observed.
    /// The task is polled one last time at the deadline before timing out.
    pub async fn wait<H>(&self, handle: &H) -> Result<TaskOutcome, WaitError>
    where
        H: TaskHandle + ?Sized,
    {
        let task_id = handle.id().to_string();
        let started = Instant::now();
        // A timeout too large to represent is no timeout at all
        let deadline = self.timeout.and_then(|t| started.checked_add(t));
        let mut polls: u32 = 0;

        loop {
            let info = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(task_id = %task_id, polls, "Task wait cancelled");
                    return Err(WaitError::Cancelled { task_id });
                }
                res = handle.info() => res.map_err(|source| WaitError::Query {
                    task_id: task_id.clone(),
                    source,
                })?,
            };
            polls += 1;

            tracing::debug!(task_id = %task_id, state = %info.state, polls, "Polled task");

            if let Some(outcome) = info.outcome() {
                let operation = info.description.as_deref().unwrap_or("task");
                let remote_duration = info.remote_duration();
                match &outcome {
                    TaskOutcome::Succeeded => tracing::info!(
                        task_id = %task_id,
                        polls,
                        elapsed = ?started.elapsed(),
                        remote_duration = ?remote_duration,
                        "{} succeeded",
                        operation
                    ),
                    TaskOutcome::Failed { error } => tracing::warn!(
                        task_id = %task_id,
                        polls,
                        elapsed = ?started.elapsed(),
                        remote_duration = ?remote_duration,
                        "{} failed: {}",
                        operation,
                        error
                    ),
                }
                return Ok(outcome);
            }

            let now = Instant::now();
            let mut wake = now
                .checked_add(self.poll_interval)
                .unwrap_or_else(|| now + FAR_FUTURE);
            if let (Some(deadline), Some(timeout)) = (deadline, self.timeout) {
                if now >= deadline {
                    tracing::warn!(task_id = %task_id, polls, "Task wait timed out");
                    return Err(WaitError::TimedOut {
                        task_id,
                        timeout,
                        last_state: info.state,
                    });
                }
                wake = wake.min(deadline);
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    tracing::info!(task_id = %task_id, polls, "Task wait cancelled");
                    return Err(WaitError::Cancelled { task_id });
                }
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }
}
