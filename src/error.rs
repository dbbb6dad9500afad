//! # Error Handling
//!
//! Crate-wide error taxonomy for entity storage, the transition log and the
//! execution coordinator.
//!
//! Errors fall into three classes that callers act on differently:
//!
//! - **Lookup failures** (`NotFound`) are surfaced, never retried. Cross-tenant
//!   lookups produce the same shape so that existence never leaks across tenants.
//! - **Validation failures** (`ChainOrderingViolation`, `ChainClosed`,
//!   `InvalidStepReference`, ...) are local to one request and fatal to it.
//! - **Infrastructure failures** (`Database`, `Workflow`) are retryable and the
//!   caller decides the policy. No state mutation has occurred when one is returned.

use crate::config::ConfigurationError;
use crate::workflow::WorkflowError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AgentsError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Transition chain for execution {execution_id} is closed")]
    ChainClosed { execution_id: Uuid },

    #[error(
        "Transition ordering violation for execution {execution_id}: expected current {expected}, got {actual}"
    )]
    ChainOrderingViolation {
        execution_id: Uuid,
        expected: String,
        actual: String,
    },

    #[error("Invalid step reference {target} for execution {execution_id}")]
    InvalidStepReference { execution_id: Uuid, target: String },

    #[error("Workflow start failed for execution {execution_id}: {reason}")]
    WorkflowStartFailed { execution_id: Uuid, reason: String },

    #[error("{entity} {id} still has {dependents} dependent record(s)")]
    DependentsExist {
        entity: &'static str,
        id: Uuid,
        dependents: usize,
    },

    #[error("Task {task_id} is referenced by {active} active execution(s)")]
    TaskInUse { task_id: Uuid, active: usize },

    #[error("Execution {execution_id} is not awaiting input (status: {status})")]
    NotAwaitingInput { execution_id: Uuid, status: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Workflow runtime error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl AgentsError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the operation may succeed if attempted again unchanged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Workflow(err) => err.is_transient(),
            _ => false,
        }
    }

    /// HTTP-equivalent status class for the API layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::ChainClosed { .. }
            | Self::ChainOrderingViolation { .. }
            | Self::DependentsExist { .. }
            | Self::TaskInUse { .. }
            | Self::NotAwaitingInput { .. } => 409,
            Self::InvalidStepReference { .. } | Self::Validation(_) => 422,
            Self::WorkflowStartFailed { .. } | Self::Workflow(_) => 502,
            Self::Database(_) => 503,
            Self::Migration(_) | Self::Serialization(_) | Self::Configuration(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentsError>;
