//! # Execution Model
//!
//! One durable run of a task.
//!
//! An execution record is written once and never updated. Its status is not a
//! column: it is projected from the transition log on every read (see
//! [`ExecutionStatus::from_latest`]). The workflow handle is stored as a plain
//! reference value so the record stays serializable and independent of any live
//! runtime connection.

use crate::state_machine::ExecutionStatus;
use crate::workflow::WorkflowHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub task_id: Uuid,
    pub input: Value,
    pub workflow: WorkflowHandle,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// Request body for starting a task run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateExecutionRequest {
    pub input: Value,
    #[serde(default)]
    pub metadata: Value,
}

impl CreateExecutionRequest {
    pub fn new(input: Value) -> Self {
        Self {
            input,
            metadata: Value::Null,
        }
    }
}

/// An execution together with its projected status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    #[serde(flatten)]
    pub execution: Execution,
    pub status: ExecutionStatus,
    pub transition_count: usize,
}
