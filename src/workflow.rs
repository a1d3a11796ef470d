//! The attach-and-check procedure.
//!
//! ## Flow
//! 1. Find the cluster by exact name
//! 2. Pick the first baseline whose name or description mentions the target version
//! 3. Attach it and wait for the attach task
//! 4. Run a compliance check and wait for it
//! 5. Print the compliance status reported for the cluster
//!
//! Operator-facing messages go to the supplied writer (stdout in the binary);
//! diagnostics go through `tracing`.

use std::io::Write;

use thiserror::Error;

use crate::config::Config;
use crate::task::{TaskOutcome, TaskWaiter, WaitError};
use crate::vcenter::{ApiError, Baseline, Cluster, ComplianceApi, ComplianceResult};

/// Exit code for failures the operator can fix by re-running with other arguments,
/// and for remote task failures.
pub const EXIT_FAILURE: u8 = 1;

/// Exit code for transport, authentication, timeout and cancellation failures.
pub const EXIT_FAULT: u8 = 2;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Cluster {0} not found")]
    ClusterNotFound(String),

    #[error("No baselines found in vCenter")]
    NoBaselines,

    #[error("No baseline found matching version {target}")]
    NoMatchingBaseline {
        target: String,
        available: Vec<Baseline>,
    },

    #[error("Failed to attach baseline '{baseline}': {error}")]
    AttachFailed { baseline: String, error: String },

    #[error("Compliance check failed: {error}")]
    ComplianceCheckFailed { error: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl WorkflowError {
    pub fn exit_code(&self) -> u8 {
        match self {
            WorkflowError::ClusterNotFound(_)
            | WorkflowError::NoBaselines
            | WorkflowError::NoMatchingBaseline { .. }
            | WorkflowError::AttachFailed { .. }
            | WorkflowError::ComplianceCheckFailed { .. } => EXIT_FAILURE,
            WorkflowError::Api(_) | WorkflowError::Wait(_) | WorkflowError::Output(_) => {
                EXIT_FAULT
            }
        }
    }

    /// Write the operator-facing description of this failure.
    pub fn report<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        match self {
            WorkflowError::NoMatchingBaseline { available, .. } => {
                writeln!(out, "Error - {}", self)?;
                writeln!(out, "Available baselines are:")?;
                for b in available {
                    writeln!(out, " - {} (ID={})", b.name, b.key)?;
                }
            }
            WorkflowError::AttachFailed { .. } | WorkflowError::ComplianceCheckFailed { .. } => {
                writeln!(out, "{}", self)?;
            }
            _ => writeln!(out, "Error - {}", self)?,
        }
        out.flush()
    }
}

/// What a successful run attached and observed.
#[derive(Debug, Clone)]
pub struct ComplianceReport {
    pub cluster: Cluster,
    pub baseline: Baseline,
    pub results: Vec<ComplianceResult>,
}

/// Pick the baseline to attach: the first, in server order, whose name or
/// description contains `target`.
///
/// Server enumeration order is not guaranteed stable, so when several
/// baselines match the choice is logged with every candidate.
pub fn select_baseline<'a>(baselines: &'a [Baseline], target: &str) -> Option<&'a Baseline> {
    let mut matches = baselines.iter().filter(|b| b.mentions(target));
    let first = matches.next()?;

    let others: Vec<&str> = matches.map(|b| b.name.as_str()).collect();
    if !others.is_empty() {
        tracing::warn!(
            target_version = target,
            selected = %first.name,
            "Version {} matches {} baselines; using '{}' (also matched: {})",
            target,
            others.len() + 1,
            first.name,
            others.join(", ")
        );
    }
    Some(first)
}

/// One invocation of the attach-and-check procedure.
#[derive(Debug, Clone)]
pub struct Workflow {
    cluster_name: String,
    target_version: String,
    waiter: TaskWaiter,
}

impl Workflow {
    pub fn new(
        cluster_name: impl Into<String>,
        target_version: impl Into<String>,
        waiter: TaskWaiter,
    ) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            target_version: target_version.into(),
            waiter,
        }
    }

    /// Build from run configuration; waits use the configured interval and timeout.
    pub fn from_config(config: &Config, waiter: TaskWaiter) -> Self {
        Self::new(
            config.cluster_name.clone(),
            config.target_version.clone(),
            waiter,
        )
    }

    pub async fn run<A, W>(&self, api: &A, out: &mut W) -> Result<ComplianceReport, WorkflowError>
    where
        A: ComplianceApi,
        W: Write,
    {
        let cluster = api
            .list_clusters()
            .await?
            .into_iter()
            .find(|c| c.name == self.cluster_name)
            .ok_or_else(|| WorkflowError::ClusterNotFound(self.cluster_name.clone()))?;
        tracing::info!(cluster = %cluster.name, id = %cluster.id, "Found cluster");

        let baselines = api.query_baselines(&cluster).await?;
        if baselines.is_empty() {
            return Err(WorkflowError::NoBaselines);
        }
        tracing::debug!(count = baselines.len(), "Queried baselines");

        let baseline = match select_baseline(&baselines, &self.target_version) {
            Some(b) => b.clone(),
            None => {
                return Err(WorkflowError::NoMatchingBaseline {
                    target: self.target_version.clone(),
                    available: baselines,
                })
            }
        };

        writeln!(
            out,
            "Attaching baseline '{}' (ID={}) to cluster '{}'",
            baseline.name, baseline.key, cluster.name
        )?;
        out.flush()?;

        let attach = api.attach_baseline(&cluster, &baseline).await?;
        if let TaskOutcome::Failed { error } = self.waiter.wait(&attach).await? {
            return Err(WorkflowError::AttachFailed {
                baseline: baseline.name.clone(),
                error,
            });
        }
        writeln!(out, "Baseline '{}' attached successfully", baseline.name)?;

        writeln!(out, "Running compliance check...")?;
        out.flush()?;
        let check = api.check_compliance(&cluster).await?;
        if let TaskOutcome::Failed { error } = self.waiter.wait(&check).await? {
            return Err(WorkflowError::ComplianceCheckFailed { error });
        }

        let results = api.query_compliance(&cluster).await?;
        if results.is_empty() {
            tracing::warn!(cluster = %cluster.name, "Server returned no compliance results");
        }
        for r in &results {
            writeln!(out, "Cluster compliance status: {}", r.compliance_status)?;
        }
        out.flush()?;

        Ok(ComplianceReport {
            cluster,
            baseline,
            results,
        })
    }
}

/// Run `workflow`, report any failure to `out`, and return the exit code.
pub async fn run_and_report<A, W>(workflow: &Workflow, api: &A, out: &mut W) -> u8
where
    A: ComplianceApi,
    W: Write,
{
    match workflow.run(api, out).await {
        Ok(report) => {
            tracing::info!(
                cluster = %report.cluster.name,
                baseline = %report.baseline.key,
                results = report.results.len(),
                "Compliance workflow finished"
            );
            0
        }
        Err(err) => {
            if err.exit_code() == EXIT_FAULT {
                tracing::error!("Compliance workflow aborted: {:?}", err);
            }
            if let Err(e) = err.report(out) {
                tracing::warn!("Failed to write error report: {}", e);
            }
            err.exit_code()
        }
    }
}
