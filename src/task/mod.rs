//! Task module - remote task states and the waiter that polls them.
//!
//! Both remote operations of the workflow (attach baseline, check
//! compliance) are submit-then-wait-then-classify; this module holds the
//! wait and the classification.

mod state;
mod waiter;

pub use state::{TaskInfo, TaskOutcome, TaskState, UNKNOWN_ERROR};
pub use waiter::{TaskHandle, TaskWaiter, WaitError, DEFAULT_POLL_INTERVAL};
