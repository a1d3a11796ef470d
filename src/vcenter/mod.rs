//! Management server access.
//!
//! This module provides a trait-based abstraction over the compliance
//! operations the workflow needs, with an HTTPS JSON client as the
//! implementation used by the binary.

mod client;
mod error;

pub use client::{RemoteTask, VcenterClient, SESSION_HEADER};
pub use error::{classify_http_status, ApiError, ApiErrorKind};

use async_trait::async_trait;
use serde::Deserialize;

use crate::task::TaskHandle;

/// A compute cluster managed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Cluster {
    /// Server-side identifier (e.g. `domain-c8`)
    #[serde(rename = "cluster")]
    pub id: String,
    pub name: String,
}

/// A compliance baseline that can be attached to a cluster.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Baseline {
    pub key: String,
    pub name: String,
    /// Not every baseline carries a description
    #[serde(default)]
    pub description: Option<String>,
}

impl Baseline {
    /// Whether the name or, when present, the description contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.name.contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|d| d.contains(needle))
    }
}

/// Compliance status the server reports for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComplianceResult {
    #[serde(default)]
    pub entity: Option<String>,
    pub compliance_status: String,
}

/// Compliance operations offered by the management server.
///
/// Submitting operations return a task handle; callers wait on it with a
/// [`crate::task::TaskWaiter`].
#[async_trait]
pub trait ComplianceApi: Send + Sync {
    type Task: TaskHandle;

    /// Enumerate compute clusters.
    async fn list_clusters(&self) -> Result<Vec<Cluster>, ApiError>;

    /// Baselines available for `cluster`.
    async fn query_baselines(&self, cluster: &Cluster) -> Result<Vec<Baseline>, ApiError>;

    /// Submit "attach baseline" as an asynchronous task.
    async fn attach_baseline(
        &self,
        cluster: &Cluster,
        baseline: &Baseline,
    ) -> Result<Self::Task, ApiError>;

    /// Submit "check compliance" as an asynchronous task.
    async fn check_compliance(&self, cluster: &Cluster) -> Result<Self::Task, ApiError>;

    /// Compliance status entries for `cluster`.
    async fn query_compliance(&self, cluster: &Cluster)
        -> Result<Vec<ComplianceResult>, ApiError>;

    /// Release the server session.
    async fn logout(&self) -> Result<(), ApiError>;
}
