//! # System Constants
//!
//! Wire-level names shared with the workflow runtime and event subscribers.

// Re-export state types for convenience
pub use crate::state_machine::{ExecutionStatus, TransitionType};

/// Name of the entry workflow every task defines.
pub const MAIN_WORKFLOW: &str = "main";

/// Lifecycle events published by the execution coordinator
pub mod events {
    pub const EXECUTION_CREATED: &str = "execution.created";
    pub const EXECUTION_TRANSITIONED: &str = "execution.transitioned";
    pub const EXECUTION_AWAITING_INPUT: &str = "execution.awaiting_input";
    pub const EXECUTION_RESUMED: &str = "execution.resumed";
    pub const EXECUTION_CANCEL_REQUESTED: &str = "execution.cancel_requested";
    pub const EXECUTION_SUCCEEDED: &str = "execution.succeeded";
    pub const EXECUTION_FAILED: &str = "execution.failed";
    pub const EXECUTION_CANCELLED: &str = "execution.cancelled";
    pub const EXECUTION_DELETED: &str = "execution.deleted";

    pub const TASK_DELETED: &str = "task.deleted";
}

/// Entity kind names as persisted in the entity store
pub mod entity_kinds {
    pub const AGENT: &str = "agent";
    pub const USER: &str = "user";
    pub const SESSION: &str = "session";
    pub const DOC: &str = "doc";
    pub const TOOL: &str = "tool";
    pub const TASK: &str = "task";
}

/// Event name announcing that an execution reached the given status.
pub fn status_event(status: ExecutionStatus) -> &'static str {
    match status {
        ExecutionStatus::Succeeded => events::EXECUTION_SUCCEEDED,
        ExecutionStatus::Failed => events::EXECUTION_FAILED,
        ExecutionStatus::Cancelled => events::EXECUTION_CANCELLED,
        ExecutionStatus::AwaitingInput => events::EXECUTION_AWAITING_INPUT,
        ExecutionStatus::Queued | ExecutionStatus::Running => events::EXECUTION_TRANSITIONED,
    }
}
