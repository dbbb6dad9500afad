//! In-memory store.
//!
//! Entity tables sit behind one reader-writer lock so that reference checks and
//! dependent checks are atomic with the write they guard. Each execution's chain
//! has its own mutex: appends to different executions never contend, and appends
//! to the same execution are serialized through compare-and-append.

use super::{EntityStore, ExecutionStore};
use crate::error::{AgentsError, Result};
use crate::models::{Developer, EntityKind, EntityRecord, Execution, NewTransition, Transition};
use crate::state_machine::{AppendDecision, AppendOutcome, ChainGuard, TransitionLog};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

type Chain = Arc<Mutex<Vec<Transition>>>;

#[derive(Debug, Default)]
struct EntityTables {
    developers: HashMap<Uuid, Developer>,
    entities: HashMap<Uuid, EntityRecord>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<EntityTables>,
    executions: DashMap<Uuid, Execution>,
    chains: DashMap<Uuid, Chain>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn chain(&self, execution_id: Uuid) -> Result<Chain> {
        self.chains
            .get(&execution_id)
            .map(|chain| Arc::clone(chain.value()))
            .ok_or_else(|| AgentsError::not_found("Execution", execution_id))
    }

    fn active_executions(&self, task_id: Uuid) -> usize {
        self.executions
            .iter()
            .filter(|execution| execution.task_id == task_id)
            .filter(|execution| {
                self.chains
                    .get(&execution.id)
                    .map(|chain| !chain.lock().last().is_some_and(Transition::is_terminal))
                    .unwrap_or(false)
            })
            .count()
    }
}

fn find_entity<'a>(
    tables: &'a EntityTables,
    developer_id: Uuid,
    kind: EntityKind,
    id: Uuid,
) -> Result<&'a EntityRecord> {
    tables
        .entities
        .get(&id)
        .filter(|record| record.developer_id == developer_id && record.kind == kind)
        .ok_or_else(|| AgentsError::not_found(kind.label(), id))
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn insert_developer(&self, developer: Developer) -> Result<Developer> {
        let mut tables = self.tables.write();
        tables.developers.insert(developer.id, developer.clone());
        Ok(developer)
    }

    async fn get_developer(&self, developer_id: Uuid) -> Result<Developer> {
        self.tables
            .read()
            .developers
            .get(&developer_id)
            .cloned()
            .ok_or_else(|| AgentsError::not_found("Developer", developer_id))
    }

    async fn insert_entity(&self, record: EntityRecord) -> Result<EntityRecord> {
        let mut tables = self.tables.write();
        if !tables.developers.contains_key(&record.developer_id) {
            return Err(AgentsError::not_found("Developer", record.developer_id));
        }
        for (kind, id) in &record.references {
            find_entity(&tables, record.developer_id, *kind, *id)?;
        }

        debug!(kind = %record.kind, id = %record.id, "Inserting entity");
        tables.entities.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_entity(
        &self,
        developer_id: Uuid,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<EntityRecord> {
        let tables = self.tables.read();
        find_entity(&tables, developer_id, kind, id).cloned()
    }

    async fn delete_entity(&self, developer_id: Uuid, kind: EntityKind, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write();
        find_entity(&tables, developer_id, kind, id)?;

        let dependents = tables
            .entities
            .values()
            .filter(|record| record.references_id(id))
            .count();
        if dependents > 0 {
            return Err(AgentsError::DependentsExist {
                entity: kind.label(),
                id,
                dependents,
            });
        }

        if kind == EntityKind::Task {
            let active = self.active_executions(id);
            if active > 0 {
                return Err(AgentsError::TaskInUse {
                    task_id: id,
                    active,
                });
            }
        }

        tables.entities.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        // Held across the insert so a concurrent task deletion cannot interleave
        let tables = self.tables.read();
        find_entity(&tables, execution.developer_id, EntityKind::Task, execution.task_id)?;

        self.chains.insert(execution.id, Chain::default());
        self.executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<Execution> {
        self.executions
            .get(&execution_id)
            .filter(|execution| execution.developer_id == developer_id)
            .map(|execution| execution.clone())
            .ok_or_else(|| AgentsError::not_found("Execution", execution_id))
    }

    async fn list_executions(&self, developer_id: Uuid, task_id: Uuid) -> Result<Vec<Execution>> {
        let mut executions: Vec<Execution> = self
            .executions
            .iter()
            .filter(|execution| execution.developer_id == developer_id && execution.task_id == task_id)
            .map(|execution| execution.clone())
            .collect();
        executions.sort_by_key(|execution| execution.created_at);
        Ok(executions)
    }

    async fn delete_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<()> {
        self.executions
            .remove_if(&execution_id, |_, execution| execution.developer_id == developer_id)
            .ok_or_else(|| AgentsError::not_found("Execution", execution_id))?;
        self.chains.remove(&execution_id);
        Ok(())
    }
}

#[async_trait]
impl TransitionLog for InMemoryStore {
    async fn append_transition(
        &self,
        execution_id: Uuid,
        proposal: NewTransition,
        guard: &ChainGuard,
    ) -> Result<AppendOutcome> {
        let chain = self.chain(execution_id)?;
        let mut chain = chain.lock();

        match guard.evaluate(execution_id, &chain, &proposal)? {
            AppendDecision::Append { sort_key } => {
                let transition = Transition::from_proposal(execution_id, proposal, sort_key);
                chain.push(transition.clone());
                Ok(AppendOutcome {
                    transition,
                    created: true,
                })
            }
            AppendDecision::Duplicate(transition) => Ok(AppendOutcome {
                transition,
                created: false,
            }),
        }
    }

    async fn list_transitions(&self, execution_id: Uuid) -> Result<Vec<Transition>> {
        Ok(self.chain(execution_id)?.lock().clone())
    }

    async fn latest_transition(&self, execution_id: Uuid) -> Result<Option<Transition>> {
        Ok(self.chain(execution_id)?.lock().last().cloned())
    }
}
