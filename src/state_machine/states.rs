use serde::{Deserialize, Serialize};
use std::fmt;

/// Transition type tags as reported by workflow activities.
///
/// The serialized names are a wire-level contract with the workflow runtime and
/// must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionType {
    /// A step completed and the chain moves to `next`
    #[serde(rename = "step")]
    Step,
    /// A step started (or restarted after resume) at `next`
    #[serde(rename = "step-in-progress")]
    StepInProgress,
    /// The execution is parked until an external signal resumes it
    #[serde(rename = "awaiting-input")]
    AwaitingInput,
    /// The execution finished successfully
    #[serde(rename = "finish")]
    Finish,
    /// The execution failed
    #[serde(rename = "error")]
    Error,
    /// The execution was cancelled
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl TransitionType {
    pub const ALL: [TransitionType; 6] = [
        Self::Step,
        Self::StepInProgress,
        Self::AwaitingInput,
        Self::Finish,
        Self::Error,
        Self::Cancelled,
    ];

    /// Terminal transitions close the chain; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish | Self::Error | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::StepInProgress => "step-in-progress",
            Self::AwaitingInput => "awaiting-input",
            Self::Finish => "finish",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransitionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "step" => Ok(Self::Step),
            "step-in-progress" => Ok(Self::StepInProgress),
            "awaiting-input" => Ok(Self::AwaitingInput),
            "finish" => Ok(Self::Finish),
            "error" => Ok(Self::Error),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid transition type: {s}")),
        }
    }
}

/// Execution status, always derived from the latest transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// No transitions recorded yet
    #[default]
    Queued,
    /// Latest transition is `step` or `step-in-progress`
    Running,
    /// Suspended pending an external signal
    AwaitingInput,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    /// Project the status from the type of the latest transition.
    pub fn from_latest(latest: Option<TransitionType>) -> Self {
        match latest {
            None => Self::Queued,
            Some(TransitionType::Step | TransitionType::StepInProgress) => Self::Running,
            Some(TransitionType::AwaitingInput) => Self::AwaitingInput,
            Some(TransitionType::Finish) => Self::Succeeded,
            Some(TransitionType::Error) => Self::Failed,
            Some(TransitionType::Cancelled) => Self::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Active executions block deletion of the task they run.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::AwaitingInput => "awaiting_input",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "awaiting_input" => Ok(Self::AwaitingInput),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid execution status: {s}")),
        }
    }
}
