//! # Execution Coordinator
//!
//! Owns the lifecycle of executions: creating them against the workflow runtime,
//! applying the transitions step activities report, and projecting status.
//!
//! ## Overview
//!
//! The coordinator holds no per-execution state of its own. Every decision is made
//! from the persisted transition chain, and every change is a single guarded append
//! to it, so any number of coordinators may serve the same store.
//!
//! ## Ordering With The Runtime
//!
//! - **Create** starts the run first and persists the execution second. A refused
//!   start leaves nothing behind.
//! - **Resume** appends first and signals second. The append is what makes the
//!   resume durable; a repeated resume finds the applied transition and re-signals
//!   until the run reports past it.
//! - **Cancel** asks the runtime first and appends `cancelled` only once the runtime
//!   has accepted the request.

use crate::config::ExecutionConfig;
use crate::constants::{events, status_event};
use crate::database::AgentsStore;
use crate::error::{AgentsError, Result};
use crate::events::EventPublisher;
use crate::logging::{log_error, log_execution_operation, log_transition_operation};
use crate::models::{
    describe_target, CreateExecutionRequest, Entity, EntityKind, Execution, ExecutionSnapshot,
    NewTransition, Task, Transition,
};
use crate::state_machine::{verify_chain, ChainGuard, ExecutionStatus, TransitionType};
use crate::workflow::{StartWorkflowRequest, WorkflowRuntime, WorkflowSignal};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct ExecutionCoordinator {
    store: Arc<dyn AgentsStore>,
    runtime: Arc<dyn WorkflowRuntime>,
    publisher: EventPublisher,
    config: ExecutionConfig,
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<dyn AgentsStore>,
        runtime: Arc<dyn WorkflowRuntime>,
        publisher: EventPublisher,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            store,
            runtime,
            publisher,
            config,
        }
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn store(&self) -> &Arc<dyn AgentsStore> {
        &self.store
    }

    async fn load_task(&self, developer_id: Uuid, task_id: Uuid) -> Result<Task> {
        let record = self
            .store
            .get_entity(developer_id, EntityKind::Task, task_id)
            .await?;
        Task::from_record(record)
    }

    /// Guard for an execution's chain. Tasks are only deletable once all their
    /// executions are terminal, so a missing task leaves a detached guard.
    async fn guard_for(&self, execution: &Execution) -> Result<ChainGuard> {
        match self.load_task(execution.developer_id, execution.task_id).await {
            Ok(task) => Ok(ChainGuard::for_task(&task)),
            Err(AgentsError::NotFound { .. }) => Ok(ChainGuard::detached()),
            Err(err) => Err(err),
        }
    }

    /// Start a run of `task_id` and record it as a new execution.
    #[instrument(skip(self, request))]
    pub async fn create_execution(
        &self,
        developer_id: Uuid,
        task_id: Uuid,
        request: CreateExecutionRequest,
    ) -> Result<Execution> {
        let task = self.load_task(developer_id, task_id).await?;
        task.validate_input(&request.input)?;

        let execution_id = Uuid::new_v4();
        let handle = self
            .runtime
            .start(StartWorkflowRequest {
                execution_id,
                task,
                input: request.input.clone(),
            })
            .await
            .map_err(|err| {
                log_error(
                    "ExecutionCoordinator",
                    "create_execution",
                    &err.to_string(),
                    Some(&format!("execution_id={execution_id}")),
                );
                AgentsError::WorkflowStartFailed {
                    execution_id,
                    reason: err.to_string(),
                }
            })?;

        let execution = Execution {
            id: execution_id,
            developer_id,
            task_id,
            input: request.input,
            workflow: handle,
            metadata: request.metadata,
            created_at: Utc::now(),
        };

        if let Err(err) = self.store.insert_execution(&execution).await {
            // The run exists without a record; stop it so it cannot report into nothing
            if let Err(cancel_err) = self.runtime.cancel(&execution.workflow).await {
                warn!(
                    execution_id = %execution_id,
                    error = %cancel_err,
                    "Failed to cancel orphaned workflow run"
                );
            }
            return Err(err);
        }

        self.publisher.publish(
            events::EXECUTION_CREATED,
            Some(execution_id),
            json!({
                "task_id": task_id,
                "workflow_id": execution.workflow.workflow_id,
            }),
        );
        log_execution_operation(
            "create",
            execution_id,
            Some(task_id),
            ExecutionStatus::Queued.as_str(),
            None,
        );

        Ok(execution)
    }

    /// The execution together with its projected status.
    pub async fn get_execution(
        &self,
        developer_id: Uuid,
        execution_id: Uuid,
    ) -> Result<ExecutionSnapshot> {
        let execution = self.store.get_execution(developer_id, execution_id).await?;
        let chain = self.store.list_transitions(execution_id).await?;
        let status = ExecutionStatus::from_latest(chain.last().map(|t| t.transition_type));

        Ok(ExecutionSnapshot {
            execution,
            status,
            transition_count: chain.len(),
        })
    }

    pub async fn list_executions(
        &self,
        developer_id: Uuid,
        task_id: Uuid,
    ) -> Result<Vec<Execution>> {
        self.store.list_executions(developer_id, task_id).await
    }

    /// Status projected from the latest transition.
    pub async fn status(&self, developer_id: Uuid, execution_id: Uuid) -> Result<ExecutionStatus> {
        self.store.get_execution(developer_id, execution_id).await?;
        let latest = self.store.latest_transition(execution_id).await?;
        Ok(ExecutionStatus::from_latest(
            latest.map(|t| t.transition_type),
        ))
    }

    /// Apply a transition reported by a step activity.
    ///
    /// Redelivered reports return the transition already stored without writing.
    #[instrument(skip(self, proposal), fields(transition_type = %proposal.transition_type))]
    pub async fn report_transition(
        &self,
        developer_id: Uuid,
        execution_id: Uuid,
        proposal: NewTransition,
    ) -> Result<Transition> {
        let execution = self.store.get_execution(developer_id, execution_id).await?;
        let guard = self.guard_for(&execution).await?;
        let outcome = self
            .store
            .append_transition(execution_id, proposal, &guard)
            .await?;

        self.record_append(&outcome.transition, outcome.created);
        Ok(outcome.transition)
    }

    fn record_append(&self, transition: &Transition, created: bool) {
        log_transition_operation(
            transition.execution_id,
            transition.transition_type.as_str(),
            &describe_target(transition.current.as_ref()),
            &describe_target(transition.next.as_ref()),
            transition.sort_key,
            created,
        );

        if !created {
            debug!(
                execution_id = %transition.execution_id,
                transition_id = %transition.id,
                "Redelivered transition deduplicated"
            );
            return;
        }

        let status = ExecutionStatus::from_latest(Some(transition.transition_type));
        self.publisher
            .publish_transition(status_event(status), transition, status);
    }

    /// The full chain, in chain order.
    pub async fn list_transitions(
        &self,
        developer_id: Uuid,
        execution_id: Uuid,
    ) -> Result<Vec<Transition>> {
        self.store.get_execution(developer_id, execution_id).await?;
        let chain = self.store.list_transitions(execution_id).await?;

        if let Some(violation) = verify_chain(&chain) {
            warn!(execution_id = %execution_id, violation = %violation, "Transition chain is inconsistent");
        }
        Ok(chain)
    }

    pub async fn latest_transition(
        &self,
        developer_id: Uuid,
        execution_id: Uuid,
    ) -> Result<Option<Transition>> {
        self.store.get_execution(developer_id, execution_id).await?;
        self.store.latest_transition(execution_id).await
    }

    /// Cancel an execution.
    ///
    /// Returns the execution's terminal transition: the `cancelled` one appended
    /// here, or whichever terminal transition got there first. In-flight step
    /// reports that win the append race are retried against up to
    /// `cancel_append_attempts` times.
    #[instrument(skip(self))]
    pub async fn cancel(&self, developer_id: Uuid, execution_id: Uuid) -> Result<Transition> {
        let execution = self.store.get_execution(developer_id, execution_id).await?;

        if let Some(latest) = self.store.latest_transition(execution_id).await? {
            if latest.is_terminal() {
                debug!(execution_id = %execution_id, "Cancel of terminal execution is a no-op");
                return Ok(latest);
            }
        }

        self.runtime.cancel(&execution.workflow).await?;
        self.publisher
            .publish(events::EXECUTION_CANCEL_REQUESTED, Some(execution_id), Value::Null);

        let guard = ChainGuard::detached();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let latest = self.store.latest_transition(execution_id).await?;
            if let Some(latest) = latest.as_ref().filter(|t| t.is_terminal()) {
                return Ok(latest.clone());
            }

            let proposal = NewTransition::new(
                TransitionType::Cancelled,
                latest.and_then(|t| t.next),
                None,
                json!({}),
            );

            match self
                .store
                .append_transition(execution_id, proposal, &guard)
                .await
            {
                Ok(outcome) => {
                    self.record_append(&outcome.transition, outcome.created);
                    log_execution_operation(
                        "cancel",
                        execution_id,
                        Some(execution.task_id),
                        ExecutionStatus::Cancelled.as_str(),
                        None,
                    );
                    return Ok(outcome.transition);
                }
                Err(AgentsError::ChainClosed { .. }) => continue,
                Err(err @ AgentsError::ChainOrderingViolation { .. })
                    if attempt >= self.config.cancel_append_attempts =>
                {
                    return Err(err)
                }
                Err(AgentsError::ChainOrderingViolation { .. }) => {
                    debug!(execution_id = %execution_id, attempt, "Cancel raced a step report; retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Deliver input to an execution parked in `awaiting-input`.
    ///
    /// Appends `step-in-progress` at the waiting step with the input as output,
    /// then signals the run. Repeating a resume whose append already landed only
    /// re-sends the signal, and only while that append is still the latest
    /// transition.
    #[instrument(skip(self, input))]
    pub async fn resume(
        &self,
        developer_id: Uuid,
        execution_id: Uuid,
        input: Value,
    ) -> Result<Transition> {
        let execution = self.store.get_execution(developer_id, execution_id).await?;
        let chain = self.store.list_transitions(execution_id).await?;

        let latest = chain.last();
        let transition = match latest {
            Some(waiting) if waiting.transition_type == TransitionType::AwaitingInput => {
                let proposal = resume_proposal(waiting, &input);
                let guard = self.guard_for(&execution).await?;
                let outcome = self
                    .store
                    .append_transition(execution_id, proposal, &guard)
                    .await?;
                self.record_append(&outcome.transition, outcome.created);
                outcome.transition
            }
            // A resume whose append landed but whose signal failed; only valid while
            // nothing has been reported after it
            Some(applied) if applied.transition_type == TransitionType::StepInProgress => {
                let waiting = chain
                    .len()
                    .checked_sub(2)
                    .and_then(|i| chain.get(i))
                    .filter(|t| t.transition_type == TransitionType::AwaitingInput)
                    .ok_or_else(|| not_awaiting(execution_id, latest))?;
                if !applied.matches(&resume_proposal(waiting, &input)) {
                    return Err(not_awaiting(execution_id, latest));
                }
                debug!(execution_id = %execution_id, transition_id = %applied.id, "Resume already applied; re-signalling");
                applied.clone()
            }
            _ => return Err(not_awaiting(execution_id, latest)),
        };

        self.runtime
            .signal(
                &execution.workflow,
                WorkflowSignal::Resume {
                    transition_id: transition.id,
                    input,
                },
            )
            .await?;

        self.publisher.publish(
            events::EXECUTION_RESUMED,
            Some(execution_id),
            json!({ "transition_id": transition.id }),
        );
        log_execution_operation(
            "resume",
            execution_id,
            Some(execution.task_id),
            ExecutionStatus::Running.as_str(),
            None,
        );
        Ok(transition)
    }

    /// Remove an execution and its transitions. A live run is cancelled first,
    /// best-effort.
    #[instrument(skip(self))]
    pub async fn delete_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<()> {
        let execution = self.store.get_execution(developer_id, execution_id).await?;
        let latest = self.store.latest_transition(execution_id).await?;

        if !latest.is_some_and(|t| t.is_terminal()) {
            if let Err(err) = self.runtime.cancel(&execution.workflow).await {
                warn!(execution_id = %execution_id, error = %err, "Failed to cancel run of deleted execution");
            }
        }

        self.store.delete_execution(developer_id, execution_id).await?;
        self.publisher
            .publish(events::EXECUTION_DELETED, Some(execution_id), Value::Null);
        info!(execution_id = %execution_id, "Execution deleted");
        Ok(())
    }

    /// Delete a task. Rejected with `TaskInUse` while any of its executions is
    /// not terminal.
    #[instrument(skip(self))]
    pub async fn delete_task(&self, developer_id: Uuid, task_id: Uuid) -> Result<()> {
        self.store
            .delete_entity(developer_id, EntityKind::Task, task_id)
            .await?;
        self.publisher.publish(
            events::TASK_DELETED,
            None,
            json!({ "task_id": task_id }),
        );
        Ok(())
    }

    /// Whether the runtime still considers the execution's run alive.
    pub async fn workflow_running(&self, developer_id: Uuid, execution_id: Uuid) -> Result<bool> {
        let execution = self.store.get_execution(developer_id, execution_id).await?;
        Ok(self.runtime.is_running(&execution.workflow).await?)
    }
}

fn resume_proposal(waiting: &Transition, input: &Value) -> NewTransition {
    NewTransition::new(
        TransitionType::StepInProgress,
        waiting.next.clone(),
        waiting.next.clone(),
        input.clone(),
    )
}

fn not_awaiting(execution_id: Uuid, latest: Option<&Transition>) -> AgentsError {
    AgentsError::NotAwaitingInput {
        execution_id,
        status: ExecutionStatus::from_latest(latest.map(|t| t.transition_type)).to_string(),
    }
}
