//! # Transition Model
//!
//! Immutable record of step progress within an execution.
//!
//! ## Chain Structure
//!
//! Transitions of one execution form a singly-linked chain: each transition's
//! `current` equals the previous transition's `next`, and the first transition has
//! no `current`. `sort_key` is the transition's position in that chain, assigned
//! while the append lock for the execution is held, so reading back by `sort_key`
//! reproduces chain order regardless of storage-level insertion order.
//!
//! ## Database Schema
//!
//! Maps to the `transitions` table:
//! ```sql
//! CREATE TABLE transitions (
//!   transition_id UUID PRIMARY KEY,
//!   execution_id UUID NOT NULL REFERENCES executions ON DELETE CASCADE,
//!   type TEXT NOT NULL,
//!   current_step JSONB,
//!   next_step JSONB,
//!   output JSONB NOT NULL,
//!   metadata JSONB NOT NULL,
//!   sort_key INTEGER NOT NULL,
//!   most_recent BOOLEAN NOT NULL,
//!   created_at TIMESTAMPTZ NOT NULL,
//!   UNIQUE (execution_id, sort_key)
//! );
//! ```

use crate::constants::MAIN_WORKFLOW;
use crate::state_machine::TransitionType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Position of a step: a workflow of the task and an index into its steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransitionTarget {
    pub workflow: String,
    pub step: usize,
}

impl TransitionTarget {
    pub fn new(workflow: impl Into<String>, step: usize) -> Self {
        Self {
            workflow: workflow.into(),
            step,
        }
    }

    /// Position `step` of the task's `main` workflow.
    pub fn main(step: usize) -> Self {
        Self::new(MAIN_WORKFLOW, step)
    }
}

impl fmt::Display for TransitionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.workflow, self.step)
    }
}

/// Render an optional position for error messages.
pub fn describe_target(target: Option<&TransitionTarget>) -> String {
    target.map_or_else(|| "<none>".to_string(), ToString::to_string)
}

/// A single persisted transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub id: Uuid,
    pub execution_id: Uuid,
    #[serde(rename = "type")]
    pub transition_type: TransitionType,
    pub current: Option<TransitionTarget>,
    pub next: Option<TransitionTarget>,
    pub output: Value,
    pub metadata: Value,
    pub sort_key: i32,
    pub created_at: DateTime<Utc>,
}

impl Transition {
    /// Materialize a proposal at the given chain position.
    pub fn from_proposal(execution_id: Uuid, proposal: NewTransition, sort_key: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            transition_type: proposal.transition_type,
            current: proposal.current,
            next: proposal.next,
            output: proposal.output,
            metadata: proposal.metadata,
            sort_key,
            created_at: Utc::now(),
        }
    }

    /// Semantic identity used for retry deduplication. Ids, metadata and
    /// timestamps do not participate.
    pub fn matches(&self, proposal: &NewTransition) -> bool {
        self.transition_type == proposal.transition_type
            && self.current == proposal.current
            && self.next == proposal.next
            && self.output == proposal.output
    }

    pub fn is_terminal(&self) -> bool {
        self.transition_type.is_terminal()
    }
}

/// A transition proposed by a workflow activity, not yet validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransition {
    #[serde(rename = "type")]
    pub transition_type: TransitionType,
    #[serde(default)]
    pub current: Option<TransitionTarget>,
    #[serde(default)]
    pub next: Option<TransitionTarget>,
    #[serde(default = "empty_object")]
    pub output: Value,
    #[serde(default = "empty_object")]
    pub metadata: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl NewTransition {
    pub fn new(
        transition_type: TransitionType,
        current: Option<TransitionTarget>,
        next: Option<TransitionTarget>,
        output: Value,
    ) -> Self {
        Self {
            transition_type,
            current,
            next,
            output,
            metadata: empty_object(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}
