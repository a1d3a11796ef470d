//! Run configuration.
//!
//! Everything comes from the command line; no file or environment variable
//! is consulted (`RUST_LOG` only tunes diagnostics on stderr).
//! - `server` - host name or URL of the management server. `https://` is assumed.
//! - `username` / `password` - credentials for the session.
//! - `cluster_name` - exact cluster name.
//! - `target_version` - substring looked up in baseline names and descriptions.
//! - `--poll-interval-secs` - task poll interval. Defaults to `2`.
//! - `--timeout-secs` - optional upper bound on each task wait.
//! - `--verify-tls` - verify the server certificate. Off by default.

use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::cli::Args;
use crate::task::TaskWaiter;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings for one invocation.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the management server, always ending in `/`
    pub server_url: Url,

    pub username: String,

    pub password: String,

    pub cluster_name: String,

    pub target_version: String,

    /// Delay between polls of a non-terminal task
    pub poll_interval: Duration,

    /// Upper bound on each task wait (none: wait until the task finishes)
    pub timeout: Option<Duration>,

    /// Reject self-signed server certificates
    pub verify_tls: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("server_url", &self.server_url.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("cluster_name", &self.cluster_name)
            .field("target_version", &self.target_version)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

impl Config {
    /// Validate parsed command line arguments.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for an unusable server address or a
    /// zero poll interval. Cluster name and target version are taken verbatim:
    /// they are matched against server data as given.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let server_url = parse_server_url(&args.server)?;

        if args.target_version.trim().is_empty() {
            tracing::warn!(
                target_version = ?args.target_version,
                "Blank target version matches any baseline containing it"
            );
        }
        if args.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "poll_interval_secs".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            server_url,
            username: args.username,
            password: args.password,
            cluster_name: args.cluster_name,
            target_version: args.target_version,
            poll_interval: Duration::from_secs(args.poll_interval_secs),
            timeout: args.timeout_secs.map(Duration::from_secs),
            verify_tls: args.verify_tls,
        })
    }

    /// Task waiter honouring the configured interval and timeout.
    pub fn waiter(&self, cancel: CancellationToken) -> TaskWaiter {
        TaskWaiter::new(self.poll_interval)
            .with_timeout(self.timeout)
            .with_cancellation(cancel)
    }
}

/// Turn a bare host (`vc.example.com`, `10.0.0.5:8443`) or a full URL into a
/// base URL ending in `/`.
pub fn parse_server_url(server: &str) -> Result<Url, ConfigError> {
    let server = server.trim();
    if server.is_empty() {
        return Err(ConfigError::InvalidValue(
            "server".to_string(),
            "must not be empty".to_string(),
        ));
    }

    let raw = if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    };
    let mut url = Url::parse(&raw)
        .map_err(|e| ConfigError::InvalidValue("server".to_string(), format!("{}: {}", server, e)))?;

    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(ConfigError::InvalidValue(
            "server".to_string(),
            format!("{} has no host", server),
        ));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["attach-baseline"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_bare_host_defaults_to_https() {
        let url = parse_server_url("vc.example.com").unwrap();
        assert_eq!(url.as_str(), "https://vc.example.com/");

        let url = parse_server_url("10.0.0.5:8443").unwrap();
        assert_eq!(url.as_str(), "https://10.0.0.5:8443/");
    }

    #[test]
    fn test_full_url_keeps_scheme_and_gains_trailing_slash() {
        let url = parse_server_url("http://127.0.0.1:9000/proxy").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/proxy/");
        assert_eq!(url.join("api/session").unwrap().path(), "/proxy/api/session");
    }

    #[test]
    fn test_rejects_unusable_server() {
        assert!(parse_server_url("").is_err());
        assert!(parse_server_url("https://").is_err());
    }

    #[test]
    fn test_from_args() {
        let config = Config::from_args(args(&[
            "--timeout-secs",
            "30",
            "vc.example.com",
            "admin",
            "secret",
            "Prod-B",
            "7.0u3",
        ]))
        .unwrap();

        assert_eq!(config.server_url.as_str(), "https://vc.example.com/");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_blank_names_are_taken_verbatim() {
        let config = Config::from_args(args(&["vc", "admin", "secret", " ", " "])).unwrap();
        assert_eq!(config.cluster_name, " ");
        assert_eq!(config.target_version, " ");

        let config = Config::from_args(args(&["vc", "admin", "secret", "Prod-B", ""])).unwrap();
        assert_eq!(config.target_version, "");
    }

    #[test]
    fn test_rejects_zero_interval() {
        let err = Config::from_args(args(&[
            "--poll-interval-secs",
            "0",
            "vc",
            "admin",
            "secret",
            "Prod-B",
            "7.0u3",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn test_debug_redacts_password() {
        let config =
            Config::from_args(args(&["vc", "admin", "hunter2", "Prod-B", "7.0u3"])).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
