//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod builders;
pub mod mock_store;
pub mod strategies;

pub use builders::*;
pub use mock_store::MockStore;

use agents_core::config::AgentsConfig;
use agents_core::events::EventPublisher;
use agents_core::models::{Agent, Developer, NewAgent, NewTransition, Transition, TransitionTarget};
use agents_core::orchestration::ExecutionCoordinator;
use agents_core::state_machine::TransitionType;
use agents_core::workflow::InMemoryWorkflowRuntime;
use agents_core::EntityService;
use serde_json::{json, Value};
use std::sync::Arc;

/// A coordinator over in-memory storage and runtime, with one developer and agent.
pub struct TestHarness {
    pub store: Arc<MockStore>,
    pub runtime: Arc<InMemoryWorkflowRuntime>,
    pub publisher: EventPublisher,
    pub coordinator: Arc<ExecutionCoordinator>,
    pub entities: EntityService,
    pub developer: Developer,
    pub agent: Agent,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_config(AgentsConfig::default()).await
    }

    pub async fn with_config(config: AgentsConfig) -> Self {
        let store = Arc::new(MockStore::new());
        let runtime = Arc::new(InMemoryWorkflowRuntime::from_config(&config.workflow));
        let publisher = EventPublisher::new(config.execution.event_channel_capacity);
        let coordinator = Arc::new(ExecutionCoordinator::new(
            store.clone(),
            runtime.clone(),
            publisher.clone(),
            config.execution,
        ));
        let entities = EntityService::new(store.clone());

        let developer = entities
            .create_developer("developers@example.com", json!({}))
            .await
            .expect("Failed to create test Developer");
        let agent = entities
            .create(
                developer.id,
                NewAgent {
                    name: "test agent".to_string(),
                    about: "test agent about".to_string(),
                    model: "gpt-4o-mini".to_string(),
                    instructions: Vec::new(),
                    metadata: json!({"test": "test"}),
                },
            )
            .await
            .expect("Failed to create test Agent");

        Self {
            store,
            runtime,
            publisher,
            coordinator,
            entities,
            developer,
            agent,
        }
    }

    pub fn task(&self) -> TaskBuilder<'_> {
        TaskBuilder::new(self)
    }
}

/// `step` transition from `current` to `next` in `main`.
pub fn step(current: Option<usize>, next: usize) -> NewTransition {
    NewTransition::new(
        TransitionType::Step,
        current.map(TransitionTarget::main),
        Some(TransitionTarget::main(next)),
        json!({}),
    )
}

pub fn finish(current: usize, output: Value) -> NewTransition {
    NewTransition::new(
        TransitionType::Finish,
        Some(TransitionTarget::main(current)),
        None,
        output,
    )
}

pub fn types(chain: &[Transition]) -> Vec<TransitionType> {
    chain.iter().map(|t| t.transition_type).collect()
}
