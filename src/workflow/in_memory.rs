//! In-process workflow runtime.
//!
//! Accepts runs and records signals without executing any steps; whoever drives
//! the run (a test, a local worker loop) reports transitions through the
//! coordinator. Starts, signals and cancels can be made to fail to exercise the
//! coordinator's failure paths.

use super::{
    ClientBinding, StartWorkflowRequest, WorkflowError, WorkflowHandle, WorkflowResult,
    WorkflowRuntime, WorkflowSignal,
};
use crate::config::WorkflowConfig;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub execution_id: Uuid,
    pub task_id: Uuid,
    pub run_id: String,
    pub input: Value,
    pub state: RunState,
    pub signals: Vec<WorkflowSignal>,
}

#[derive(Debug, Default)]
pub struct InMemoryWorkflowRuntime {
    binding: Option<ClientBinding>,
    runs: DashMap<String, RunRecord>,
    reject_starts: AtomicBool,
    reject_signals: AtomicBool,
    reject_cancels: AtomicBool,
}

impl InMemoryWorkflowRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose handles point at the configured endpoint, namespace and
    /// task queue.
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            binding: Some(config.client_binding()),
            ..Self::default()
        }
    }

    pub fn set_reject_starts(&self, reject: bool) {
        self.reject_starts.store(reject, Ordering::SeqCst);
    }

    pub fn set_reject_signals(&self, reject: bool) {
        self.reject_signals.store(reject, Ordering::SeqCst);
    }

    pub fn set_reject_cancels(&self, reject: bool) {
        self.reject_cancels.store(reject, Ordering::SeqCst);
    }

    pub fn run(&self, workflow_id: &str) -> Option<RunRecord> {
        self.runs.get(workflow_id).map(|run| run.clone())
    }

    pub fn runs(&self) -> Vec<RunRecord> {
        self.runs.iter().map(|run| run.value().clone()).collect()
    }

    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Mark a run as finished, as the runtime would after its last activity.
    pub fn complete(&self, handle: &WorkflowHandle) -> WorkflowResult<()> {
        let mut run = self
            .runs
            .get_mut(&handle.workflow_id)
            .ok_or_else(|| WorkflowError::RunNotFound(handle.workflow_id.clone()))?;
        run.state = RunState::Completed;
        Ok(())
    }
}

#[async_trait]
impl WorkflowRuntime for InMemoryWorkflowRuntime {
    async fn start(&self, request: StartWorkflowRequest) -> WorkflowResult<WorkflowHandle> {
        if self.reject_starts.load(Ordering::SeqCst) {
            return Err(WorkflowError::Rejected(format!(
                "start refused for execution {}",
                request.execution_id
            )));
        }

        let workflow_id = request.workflow_id();
        let run = self
            .runs
            .entry(workflow_id.clone())
            .or_insert_with(|| RunRecord {
                execution_id: request.execution_id,
                task_id: request.task.id,
                run_id: Uuid::new_v4().to_string(),
                input: request.input.clone(),
                state: RunState::Running,
                signals: Vec::new(),
            });

        debug!(workflow_id = %workflow_id, run_id = %run.run_id, "Workflow run accepted");

        Ok(WorkflowHandle {
            workflow_id,
            run_id: Some(run.run_id.clone()),
            client: self.binding.clone(),
        })
    }

    async fn signal(&self, handle: &WorkflowHandle, signal: WorkflowSignal) -> WorkflowResult<()> {
        if self.reject_signals.load(Ordering::SeqCst) {
            return Err(WorkflowError::Unavailable(format!(
                "signal '{}' not delivered",
                signal.name()
            )));
        }

        let mut run = self
            .runs
            .get_mut(&handle.workflow_id)
            .ok_or_else(|| WorkflowError::RunNotFound(handle.workflow_id.clone()))?;
        if run.state != RunState::Running {
            return Err(WorkflowError::Rejected(format!(
                "run {} is no longer running",
                handle.workflow_id
            )));
        }
        run.signals.push(signal);
        Ok(())
    }

    async fn cancel(&self, handle: &WorkflowHandle) -> WorkflowResult<()> {
        if self.reject_cancels.load(Ordering::SeqCst) {
            return Err(WorkflowError::Rejected(format!(
                "cancel refused for {}",
                handle.workflow_id
            )));
        }

        let mut run = self
            .runs
            .get_mut(&handle.workflow_id)
            .ok_or_else(|| WorkflowError::RunNotFound(handle.workflow_id.clone()))?;
        if run.state == RunState::Running {
            run.state = RunState::Cancelled;
        }
        Ok(())
    }

    async fn is_running(&self, handle: &WorkflowHandle) -> WorkflowResult<bool> {
        self.runs
            .get(&handle.workflow_id)
            .map(|run| run.state == RunState::Running)
            .ok_or_else(|| WorkflowError::RunNotFound(handle.workflow_id.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewEntity, NewTask};
    use serde_json::json;

    fn request() -> StartWorkflowRequest {
        let task = NewTask {
            agent_id: Uuid::new_v4(),
            name: "noop".to_string(),
            description: String::new(),
            input_schema: Value::Null,
            main: Vec::new(),
            workflows: Default::default(),
            metadata: Value::Null,
        }
        .into_entity(Uuid::new_v4())
        .unwrap();
        StartWorkflowRequest {
            execution_id: Uuid::new_v4(),
            task,
            input: json!({"test": "test"}),
        }
    }

    #[tokio::test]
    async fn test_start_is_idempotent_per_execution() {
        let runtime = InMemoryWorkflowRuntime::new();
        let request = request();

        let first = runtime.start(request.clone()).await.unwrap();
        let second = runtime.start(request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(runtime.run_count(), 1);
        assert!(runtime.is_running(&first).await.unwrap());
    }

    #[tokio::test]
    async fn test_handles_carry_configured_binding() {
        let config = WorkflowConfig {
            endpoint: "workflows.internal:7233".to_string(),
            namespace: "agents".to_string(),
            task_queue: "agents-tasks".to_string(),
        };
        let runtime = InMemoryWorkflowRuntime::from_config(&config);

        let handle = runtime.start(request()).await.unwrap();
        assert_eq!(handle.client, Some(config.client_binding()));
        assert!(InMemoryWorkflowRuntime::new()
            .start(request())
            .await
            .unwrap()
            .client
            .is_none());
    }

    #[tokio::test]
    async fn test_rejected_start() {
        let runtime = InMemoryWorkflowRuntime::new();
        runtime.set_reject_starts(true);

        let err = runtime.start(request()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Rejected(_)));
        assert_eq!(runtime.run_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_stops_run_and_blocks_signals() {
        let runtime = InMemoryWorkflowRuntime::new();
        let handle = runtime.start(request()).await.unwrap();

        runtime.cancel(&handle).await.unwrap();
        assert!(!runtime.is_running(&handle).await.unwrap());

        let err = runtime
            .signal(
                &handle,
                WorkflowSignal::Custom {
                    name: "ping".to_string(),
                    payload: Value::Null,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let runtime = InMemoryWorkflowRuntime::new();
        let err = runtime
            .is_running(&WorkflowHandle::new("blah"))
            .await
            .unwrap_err();
        assert_eq!(err, WorkflowError::RunNotFound("blah".to_string()));
    }
}
