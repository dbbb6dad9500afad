//! Worker-side adapter through which step activities report transitions.
//!
//! Workflow runtimes retry failed activities on their own schedule. Storage and
//! transport failures are worth retrying; a rejected transition will be rejected
//! again, so it is reported as non-retryable to stop the runtime from looping.

use crate::error::AgentsError;
use crate::models::{NewTransition, Transition};
use crate::orchestration::ExecutionCoordinator;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Retryable activity failure: {0}")]
    Retryable(AgentsError),

    #[error("Non-retryable activity failure: {0}")]
    NonRetryable(AgentsError),
}

impl ActivityError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub fn into_inner(self) -> AgentsError {
        match self {
            Self::Retryable(err) | Self::NonRetryable(err) => err,
        }
    }
}

impl From<AgentsError> for ActivityError {
    fn from(err: AgentsError) -> Self {
        if err.is_retryable() {
            Self::Retryable(err)
        } else {
            Self::NonRetryable(err)
        }
    }
}

#[derive(Clone)]
pub struct TransitionActivity {
    coordinator: Arc<ExecutionCoordinator>,
}

impl TransitionActivity {
    pub fn new(coordinator: Arc<ExecutionCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Report one transition. Safe to call again with the same proposal after any
    /// failure: an already applied transition is returned, not duplicated.
    pub async fn report(
        &self,
        developer_id: Uuid,
        execution_id: Uuid,
        proposal: NewTransition,
    ) -> Result<Transition, ActivityError> {
        self.coordinator
            .report_transition(developer_id, execution_id, proposal)
            .await
            .map_err(|err| {
                let err = ActivityError::from(err);
                warn!(
                    execution_id = %execution_id,
                    retryable = err.is_retryable(),
                    error = %err,
                    "Transition report failed"
                );
                err
            })
    }
}
