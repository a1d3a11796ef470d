//! In-memory fakes for the management server, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::task::{TaskHandle, TaskInfo, TaskState};
use crate::vcenter::{ApiError, Baseline, Cluster, ComplianceApi, ComplianceResult};

/// Replays a fixed sequence of poll results, repeating the last snapshot
/// once the script runs out.
pub struct ScriptedTask {
    id: String,
    script: Mutex<VecDeque<Result<TaskInfo, ApiError>>>,
    last: Mutex<Option<TaskInfo>>,
    polls: AtomicU32,
}

impl ScriptedTask {
    pub fn new(id: &str, script: Vec<Result<TaskInfo, ApiError>>) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            polls: AtomicU32::new(0),
        }
    }

    pub fn states(states: &[TaskState]) -> Self {
        Self::infos("task-1", states.iter().map(|s| TaskInfo::new(*s)).collect())
    }

    pub fn infos(id: &str, infos: Vec<TaskInfo>) -> Self {
        Self::new(id, infos.into_iter().map(Ok).collect())
    }

    pub fn polls(&self) -> u32 {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskHandle for ScriptedTask {
    fn id(&self) -> &str {
        &self.id
    }

    async fn info(&self) -> Result<TaskInfo, ApiError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(info)) => {
                *self.last.lock().unwrap() = Some(info.clone());
                Ok(info)
            }
            Some(Err(e)) => Err(e),
            None => Ok(self
                .last
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| TaskInfo::new(TaskState::Running))),
        }
    }
}

/// Scripted management server that records every call it receives.
#[derive(Default)]
pub struct FakeApi {
    pub clusters: Vec<Cluster>,
    pub baselines: Vec<Baseline>,
    pub attach_script: Vec<TaskInfo>,
    pub check_script: Vec<TaskInfo>,
    pub compliance: Vec<ComplianceResult>,
    /// Fail `list_clusters` with a network error
    pub unreachable: bool,
    /// Never answer `list_clusters`
    pub stalled: bool,
    /// Every call received, in order
    pub log: Mutex<Vec<&'static str>>,
}

impl FakeApi {
    fn record(&self, call: &'static str) {
        self.log.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.log.lock().unwrap().iter().filter(|c| **c == call).count()
    }
}

pub fn cluster(id: &str, name: &str) -> Cluster {
    Cluster {
        id: id.to_string(),
        name: name.to_string(),
    }
}

pub fn baseline(key: &str, name: &str, description: Option<&str>) -> Baseline {
    Baseline {
        key: key.to_string(),
        name: name.to_string(),
        description: description.map(str::to_string),
    }
}

pub fn status(value: &str) -> ComplianceResult {
    ComplianceResult {
        entity: None,
        compliance_status: value.to_string(),
    }
}

#[async_trait]
impl ComplianceApi for FakeApi {
    type Task = ScriptedTask;

    async fn list_clusters(&self) -> Result<Vec<Cluster>, ApiError> {
        self.record("list_clusters");
        if self.stalled {
            std::future::pending::<()>().await;
        }
        if self.unreachable {
            return Err(ApiError::network_error("Connection failed".to_string()));
        }
        Ok(self.clusters.clone())
    }

    async fn query_baselines(&self, _cluster: &Cluster) -> Result<Vec<Baseline>, ApiError> {
        self.record("query_baselines");
        Ok(self.baselines.clone())
    }

    async fn attach_baseline(
        &self,
        _cluster: &Cluster,
        _baseline: &Baseline,
    ) -> Result<ScriptedTask, ApiError> {
        self.record("attach_baseline");
        Ok(ScriptedTask::infos("attach-1", self.attach_script.clone()))
    }

    async fn check_compliance(&self, _cluster: &Cluster) -> Result<ScriptedTask, ApiError> {
        self.record("check_compliance");
        Ok(ScriptedTask::infos("check-1", self.check_script.clone()))
    }

    async fn query_compliance(
        &self,
        _cluster: &Cluster,
    ) -> Result<Vec<ComplianceResult>, ApiError> {
        self.record("query_compliance");
        Ok(self.compliance.clone())
    }

    async fn logout(&self) -> Result<(), ApiError> {
        self.record("logout");
        Ok(())
    }
}
