//! Builders for test tasks and executions.

use super::TestHarness;
use agents_core::models::{CreateExecutionRequest, Execution, NewTask, Task, TaskStep};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Builder pattern for creating test Tasks
pub struct TaskBuilder<'a> {
    harness: &'a TestHarness,
    name: String,
    input_schema: Value,
    main: Vec<TaskStep>,
    workflows: BTreeMap<String, Vec<TaskStep>>,
}

impl<'a> TaskBuilder<'a> {
    pub fn new(harness: &'a TestHarness) -> Self {
        Self {
            harness,
            name: "test task".to_string(),
            input_schema: Value::Null,
            main: Vec::new(),
            workflows: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Append `count` evaluate steps to `main`.
    pub fn with_steps(mut self, count: usize) -> Self {
        for index in 0..count {
            let mut expressions = BTreeMap::new();
            expressions.insert("step".to_string(), format!("'{index}'"));
            self.main.push(TaskStep::Evaluate(expressions));
        }
        self
    }

    pub fn with_step(mut self, step: TaskStep) -> Self {
        self.main.push(step);
        self
    }

    pub fn with_workflow(mut self, name: &str, steps: Vec<TaskStep>) -> Self {
        self.workflows.insert(name.to_string(), steps);
        self
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub async fn build(self) -> Task {
        self.harness
            .entities
            .create(
                self.harness.developer.id,
                NewTask {
                    agent_id: self.harness.agent.id,
                    name: self.name,
                    description: String::new(),
                    input_schema: self.input_schema,
                    main: self.main,
                    workflows: self.workflows,
                    metadata: Value::Null,
                },
            )
            .await
            .expect("Failed to create test Task")
    }
}

impl TestHarness {
    pub async fn start(&self, task: &Task) -> Execution {
        self.coordinator
            .create_execution(
                self.developer.id,
                task.id,
                CreateExecutionRequest::new(json!({"test": "test"})),
            )
            .await
            .expect("Failed to create test Execution")
    }
}
