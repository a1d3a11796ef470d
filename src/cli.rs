//! Command line arguments.

use clap::Parser;

/// Attach a compliance baseline to a cluster and run a compliance check
#[derive(Parser)]
#[command(name = "attach-baseline")]
#[command(about = "Attach a compliance baseline to a cluster and run a compliance check", long_about = None)]
#[command(version)]
pub struct Args {
    /// Management server host name or URL (https:// is assumed)
    pub server: String,

    /// User to log in as
    pub username: String,

    /// Password for the user
    pub password: String,

    /// Exact name of the cluster to attach the baseline to
    pub cluster_name: String,

    /// Version string to look for in baseline names and descriptions
    pub target_version: String,

    /// Seconds between polls of a running task
    #[arg(long, default_value_t = 2)]
    pub poll_interval_secs: u64,

    /// Give up waiting on a task after this many seconds (default: wait forever)
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Verify the server's TLS certificate
    #[arg(long)]
    pub verify_tls: bool,
}
