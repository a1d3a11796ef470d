//! HTTPS JSON client for the management server.
//!
//! Speaks the session-token flavour of the REST API: a session is created
//! with basic auth and every later request carries the token in
//! [`SESSION_HEADER`]. Asynchronous operations answer with a task id that is
//! polled through `/api/cis/tasks/{id}`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::error::ApiError;
use super::{Baseline, Cluster, ComplianceApi, ComplianceResult};
use crate::task::{TaskHandle, TaskInfo, TaskState};

/// Header carrying the session token on authenticated requests.
pub const SESSION_HEADER: &str = "vmware-api-session-id";

const SESSION_PATH: &str = "api/session";
const CLUSTERS_PATH: &str = "api/vcenter/cluster";
const BASELINES_PATH: &str = "api/esx/compliance/baselines";
const COMPLIANCE_PATH: &str = "api/esx/compliance";
const TASKS_PATH: &str = "api/cis/tasks";

/// Upper bound on establishing a TCP/TLS connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on a single request, body included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Authenticated client bound to one server session.
#[derive(Clone)]
pub struct VcenterClient {
    base_url: Url,
    client: Client,
    session_id: String,
}

impl VcenterClient {
    /// Open a session on `base_url` with the given credentials.
    ///
    /// When `verify_tls` is false, self-signed server certificates are
    /// accepted.
    pub async fn connect(
        base_url: Url,
        username: &str,
        password: &str,
        verify_tls: bool,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(!verify_tls)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        let url = join(&base_url, SESSION_PATH)?;
        tracing::debug!(url = %url, username, "Creating session");

        let resp = client
            .post(url)
            .basic_auth(username, Some(password))
            .send()
            .await?;
        let session_id: String = read_json(resp, "Session create").await?;

        tracing::info!(server = %base_url, username, "Session established");
        Ok(Self {
            base_url,
            client,
            session_id,
        })
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = join(&self.base_url, path)?;
        Ok(self
            .client
            .request(method, url)
            .header(SESSION_HEADER, &self.session_id))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T, ApiError> {
        let resp = request.send().await?;
        read_json(resp, what).await
    }

    /// Fetch the current state of task `task_id`.
    pub async fn task_info(&self, task_id: &str) -> Result<TaskInfo, ApiError> {
        let path = format!("{}/{}", TASKS_PATH, urlencoding::encode(task_id));
        let wire: TaskInfoWire = self
            .send(self.request(Method::GET, &path)?, "Task query")
            .await?;
        wire.into_task_info()
    }

    fn remote_task(&self, id: String) -> RemoteTask {
        RemoteTask {
            client: self.clone(),
            id,
        }
    }
}

#[async_trait]
impl ComplianceApi for VcenterClient {
    type Task = RemoteTask;

    async fn list_clusters(&self) -> Result<Vec<Cluster>, ApiError> {
        self.send(self.request(Method::GET, CLUSTERS_PATH)?, "Cluster list")
            .await
    }

    async fn query_baselines(&self, cluster: &Cluster) -> Result<Vec<Baseline>, ApiError> {
        let req = self
            .request(Method::GET, BASELINES_PATH)?
            .query(&[("entity", cluster.id.as_str())]);
        self.send(req, "Baseline query").await
    }

    async fn attach_baseline(
        &self,
        cluster: &Cluster,
        baseline: &Baseline,
    ) -> Result<RemoteTask, ApiError> {
        let req = self
            .request(Method::POST, BASELINES_PATH)?
            .query(&[("action", "attach")])
            .json(&json!({
                "entity": cluster.id,
                "baselines": [baseline.key],
            }));
        let task_id: String = self.send(req, "Baseline attach").await?;
        tracing::debug!(task_id = %task_id, baseline = %baseline.key, "Attach task submitted");
        Ok(self.remote_task(task_id))
    }

    async fn check_compliance(&self, cluster: &Cluster) -> Result<RemoteTask, ApiError> {
        let req = self
            .request(Method::POST, COMPLIANCE_PATH)?
            .query(&[("action", "check")])
            .json(&json!({ "entities": [cluster.id] }));
        let task_id: String = self.send(req, "Compliance check").await?;
        tracing::debug!(task_id = %task_id, cluster = %cluster.id, "Compliance check submitted");
        Ok(self.remote_task(task_id))
    }

    async fn query_compliance(
        &self,
        cluster: &Cluster,
    ) -> Result<Vec<ComplianceResult>, ApiError> {
        let req = self
            .request(Method::GET, COMPLIANCE_PATH)?
            .query(&[("entity", cluster.id.as_str())]);
        self.send(req, "Compliance query").await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        let resp = self.request(Method::DELETE, SESSION_PATH)?.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ApiError::from_status(
                status.as_u16(),
                format!("Session delete failed: {}", text),
            ));
        }
        tracing::debug!("Session released");
        Ok(())
    }
}

/// Handle to a task running on the server.
#[derive(Clone)]
pub struct RemoteTask {
    client: VcenterClient,
    id: String,
}

#[async_trait]
impl TaskHandle for RemoteTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn info(&self) -> Result<TaskInfo, ApiError> {
        self.client.task_info(&self.id).await
    }
}

fn join(base: &Url, path: &str) -> Result<Url, ApiError> {
    base.join(path)
        .map_err(|e| ApiError::parse_error(format!("Invalid URL for {}: {}", path, e)))
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response, what: &str) -> Result<T, ApiError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ApiError::from_status(
            status.as_u16(),
            format!("{} failed: {}", what, body),
        ));
    }
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        ApiError::parse_error(format!(
            "Failed to parse {} response: {}, body: {}",
            what, e, body
        ))
    })
}

/// Task record as returned by the tasks endpoint.
#[derive(Debug, Deserialize)]
struct TaskInfoWire {
    status: String,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
}

impl TaskInfoWire {
    fn into_task_info(self) -> Result<TaskInfo, ApiError> {
        let state = parse_task_status(&self.status).ok_or_else(|| {
            ApiError::parse_error(format!("Unknown task status: {}", self.status))
        })?;
        Ok(TaskInfo {
            state,
            error: self.error.as_ref().map(error_detail),
            description: self.description.as_ref().and_then(message_text),
            start_time: self.start_time,
            completion_time: self.end_time,
        })
    }
}

/// Map a server task status string onto [`TaskState`].
pub(crate) fn parse_task_status(status: &str) -> Option<TaskState> {
    match status.to_ascii_uppercase().as_str() {
        "PENDING" | "QUEUED" => Some(TaskState::Queued),
        "RUNNING" | "BLOCKED" => Some(TaskState::Running),
        "SUCCEEDED" | "SUCCESS" => Some(TaskState::Succeeded),
        "FAILED" | "ERROR" => Some(TaskState::Failed),
        _ => None,
    }
}

/// Localizable message: either a plain string or `{ "default_message": ... }`.
fn message_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("default_message")
            .and_then(|v| v.as_str())
            .map(str::to_string),
        _ => None,
    }
}

/// Flatten a server error payload into one line of detail.
fn error_detail(value: &Value) -> String {
    let messages: Vec<String> = value
        .get("messages")
        .and_then(|m| m.as_array())
        .map(|arr| arr.iter().filter_map(message_text).collect())
        .unwrap_or_default();
    if !messages.is_empty() {
        return messages.join("; ");
    }
    message_text(value).unwrap_or_else(|| value.to_string())
}
