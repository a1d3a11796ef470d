//! # baseline-attach
//!
//! Attaches a compliance baseline to a vCenter cluster, runs a compliance
//! check and reports the result.
//!
//! ## Flow
//! 1. Open a session on the management server
//! 2. Find the cluster and the baseline matching the target version
//! 3. Attach the baseline, wait for the task
//! 4. Run a compliance check, wait for the task
//! 5. Print the compliance status and release the session
//!
//! ## Modules
//! - `task`: remote task states and the polling waiter
//! - `vcenter`: management API trait and its HTTPS client
//! - `session`: scoped session release
//! - `workflow`: the attach-and-check procedure
//! - `config` / `cli`: run configuration from the command line

pub mod cli;
pub mod config;
pub mod session;
pub mod task;
pub mod vcenter;
pub mod workflow;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use task::{TaskOutcome, TaskState, TaskWaiter};
pub use vcenter::{ComplianceApi, VcenterClient};
pub use workflow::{run_and_report, Workflow, WorkflowError};
