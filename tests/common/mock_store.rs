//! In-memory store with scripted faults for exercising coordinator failure paths.

use agents_core::database::{AppendOutcome, EntityStore, ExecutionStore, InMemoryStore, TransitionLog};
use agents_core::models::{Developer, EntityKind, EntityRecord, Execution, NewTransition, Transition};
use agents_core::state_machine::ChainGuard;
use agents_core::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// Delegates to [`InMemoryStore`], optionally failing execution inserts or
/// landing queued step reports right after a latest-transition read, the way a
/// worker's report slips in between a reader and its append.
#[derive(Default)]
pub struct MockStore {
    inner: InMemoryStore,
    fail_execution_inserts: AtomicBool,
    interleaved: Mutex<VecDeque<(NewTransition, ChainGuard)>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_execution_inserts(&self, fail: bool) {
        self.fail_execution_inserts.store(fail, Ordering::SeqCst);
    }

    /// Append `proposal` after the next `latest_transition` read, one queued
    /// proposal per read.
    pub fn interleave_after_read(&self, proposal: NewTransition, guard: ChainGuard) {
        self.interleaved.lock().push_back((proposal, guard));
    }

    pub fn pending_interleaved(&self) -> usize {
        self.interleaved.lock().len()
    }
}

#[async_trait]
impl EntityStore for MockStore {
    async fn insert_developer(&self, developer: Developer) -> Result<Developer> {
        self.inner.insert_developer(developer).await
    }

    async fn get_developer(&self, developer_id: Uuid) -> Result<Developer> {
        self.inner.get_developer(developer_id).await
    }

    async fn insert_entity(&self, record: EntityRecord) -> Result<EntityRecord> {
        self.inner.insert_entity(record).await
    }

    async fn get_entity(
        &self,
        developer_id: Uuid,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<EntityRecord> {
        self.inner.get_entity(developer_id, kind, id).await
    }

    async fn delete_entity(&self, developer_id: Uuid, kind: EntityKind, id: Uuid) -> Result<()> {
        self.inner.delete_entity(developer_id, kind, id).await
    }
}

#[async_trait]
impl ExecutionStore for MockStore {
    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        if self.fail_execution_inserts.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut.into());
        }
        self.inner.insert_execution(execution).await
    }

    async fn get_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<Execution> {
        self.inner.get_execution(developer_id, execution_id).await
    }

    async fn list_executions(&self, developer_id: Uuid, task_id: Uuid) -> Result<Vec<Execution>> {
        self.inner.list_executions(developer_id, task_id).await
    }

    async fn delete_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<()> {
        self.inner.delete_execution(developer_id, execution_id).await
    }
}

#[async_trait]
impl TransitionLog for MockStore {
    async fn append_transition(
        &self,
        execution_id: Uuid,
        proposal: NewTransition,
        guard: &ChainGuard,
    ) -> Result<AppendOutcome> {
        self.inner
            .append_transition(execution_id, proposal, guard)
            .await
    }

    async fn list_transitions(&self, execution_id: Uuid) -> Result<Vec<Transition>> {
        self.inner.list_transitions(execution_id).await
    }

    async fn latest_transition(&self, execution_id: Uuid) -> Result<Option<Transition>> {
        let latest = self.inner.latest_transition(execution_id).await?;

        let next = self.interleaved.lock().pop_front();
        if let Some((proposal, guard)) = next {
            self.inner
                .append_transition(execution_id, proposal, &guard)
                .await?;
        }
        Ok(latest)
    }
}
