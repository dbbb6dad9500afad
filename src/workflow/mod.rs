//! # Workflow Binding
//!
//! Adapter contract between the execution coordinator and the external
//! durable-workflow runtime.
//!
//! The runtime owns step scheduling, step-level retries and worker distribution.
//! The coordinator only needs four operations from it: start a run, signal a run,
//! cancel a run, and ask whether a run is still alive. `start` guarantees only that
//! the run was accepted for eventual execution.
//!
//! Runs are addressed through a [`WorkflowHandle`], a plain serializable reference
//! stored on the execution record. A live client is reconstructed from the handle
//! whenever one is needed; the record never holds a connection.

pub mod activity;
pub mod in_memory;

pub use activity::{ActivityError, TransitionActivity};
pub use in_memory::InMemoryWorkflowRuntime;

use crate::models::Task;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Where a run lives: enough to rebuild a client for it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientBinding {
    pub endpoint: String,
    pub namespace: String,
    pub task_queue: String,
}

/// Reference to one workflow run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowHandle {
    pub workflow_id: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub client: Option<ClientBinding>,
}

impl WorkflowHandle {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: None,
            client: None,
        }
    }
}

/// Everything the runtime needs to start a task run
#[derive(Debug, Clone)]
pub struct StartWorkflowRequest {
    pub execution_id: Uuid,
    pub task: Task,
    pub input: Value,
}

impl StartWorkflowRequest {
    /// Runs are keyed by execution id, so a retried start cannot create a second run.
    pub fn workflow_id(&self) -> String {
        format!("execution-{}", self.execution_id)
    }
}

/// Events delivered to a running workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum WorkflowSignal {
    /// Input for an execution parked in `awaiting-input`
    Resume { transition_id: Uuid, input: Value },
    Custom { name: String, payload: Value },
}

impl WorkflowSignal {
    pub fn name(&self) -> &str {
        match self {
            Self::Resume { .. } => "resume",
            Self::Custom { name, .. } => name,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow runtime rejected the request: {0}")]
    Rejected(String),

    #[error("Workflow runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Workflow run not found: {0}")]
    RunNotFound(String),
}

impl WorkflowError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Operations the coordinator requires of a durable-workflow runtime
#[async_trait]
pub trait WorkflowRuntime: Send + Sync {
    /// Submit a new run. Returns once the run is accepted, not completed.
    async fn start(&self, request: StartWorkflowRequest) -> WorkflowResult<WorkflowHandle>;

    async fn signal(&self, handle: &WorkflowHandle, signal: WorkflowSignal) -> WorkflowResult<()>;

    /// Request cooperative cancellation. `Ok` means the runtime accepted it.
    async fn cancel(&self, handle: &WorkflowHandle) -> WorkflowResult<()>;

    async fn is_running(&self, handle: &WorkflowHandle) -> WorkflowResult<bool>;
}
