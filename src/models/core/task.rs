//! # Task Model
//!
//! Immutable task definitions owned by an agent.
//!
//! A task holds an ordered `main` step sequence plus optional named sub-workflows
//! that `yield` steps can enter. Tasks are never updated in place: a changed
//! definition is a new task record.

use super::entity::{Entity, EntityKind, NewEntity};
use crate::constants::MAIN_WORKFLOW;
use crate::error::{AgentsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// One step of a workflow.
///
/// Step payloads are opaque to the execution core; only `yield` is inspected,
/// because its target workflow must exist on the task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStep {
    Evaluate(BTreeMap<String, String>),
    ToolCall {
        tool: String,
        #[serde(default)]
        arguments: BTreeMap<String, String>,
    },
    Prompt(Value),
    Yield {
        workflow: String,
        #[serde(default)]
        arguments: BTreeMap<String, String>,
    },
    WaitForInput(Value),
    Sleep {
        seconds: u64,
    },
    Return(BTreeMap<String, String>),
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub agent_id: Uuid,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub main: Vec<TaskStep>,
    #[serde(default)]
    pub workflows: BTreeMap<String, Vec<TaskStep>>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// Steps of the named workflow, if the task defines it.
    pub fn workflow(&self, name: &str) -> Option<&[TaskStep]> {
        if name == MAIN_WORKFLOW {
            Some(&self.main)
        } else {
            self.workflows.get(name).map(Vec::as_slice)
        }
    }

    /// Check that every `yield` step targets a workflow this task defines.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AgentsError::validation("task name must not be empty"));
        }
        if self.workflows.contains_key(MAIN_WORKFLOW) {
            return Err(AgentsError::validation(format!(
                "'{MAIN_WORKFLOW}' is reserved and cannot be declared as a sub-workflow"
            )));
        }

        let all_steps = self
            .main
            .iter()
            .chain(self.workflows.values().flatten());
        for step in all_steps {
            if let TaskStep::Yield { workflow, .. } = step {
                if self.workflow(workflow).is_none() {
                    return Err(AgentsError::validation(format!(
                        "yield step references unknown workflow '{workflow}'"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Check an execution input against the task's input schema.
    ///
    /// Only the object type and `required` keys are enforced.
    pub fn validate_input(&self, input: &Value) -> Result<()> {
        let schema = match self.input_schema.as_object() {
            Some(schema) => schema,
            None => return Ok(()),
        };

        if schema.get("type").and_then(Value::as_str) == Some("object") && !input.is_object() {
            return Err(AgentsError::validation(
                "execution input must be a JSON object",
            ));
        }

        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            let missing: Vec<&str> = required
                .iter()
                .filter_map(Value::as_str)
                .filter(|key| input.get(key).is_none())
                .collect();
            if !missing.is_empty() {
                return Err(AgentsError::validation(format!(
                    "execution input is missing required field(s): {}",
                    missing.join(", ")
                )));
            }
        }
        Ok(())
    }
}

impl Entity for Task {
    const KIND: EntityKind = EntityKind::Task;

    fn id(&self) -> Uuid {
        self.id
    }

    fn developer_id(&self) -> Uuid {
        self.developer_id
    }

    fn references(&self) -> Vec<(EntityKind, Uuid)> {
        vec![(EntityKind::Agent, self.agent_id)]
    }
}

/// New Task for creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
    pub agent_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub input_schema: Value,
    #[serde(default)]
    pub main: Vec<TaskStep>,
    #[serde(default)]
    pub workflows: BTreeMap<String, Vec<TaskStep>>,
    #[serde(default)]
    pub metadata: Value,
}

impl NewEntity for NewTask {
    type Entity = Task;

    fn into_entity(self, developer_id: Uuid) -> Result<Task> {
        let task = Task {
            id: Uuid::new_v4(),
            developer_id,
            agent_id: self.agent_id,
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
            main: self.main,
            workflows: self.workflows,
            metadata: self.metadata,
            created_at: Utc::now(),
        };
        task.validate()?;
        Ok(task)
    }
}
