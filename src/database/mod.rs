//! # Database Operations
//!
//! Storage contracts for entities, executions and transition chains, with an
//! in-memory and a PostgreSQL implementation.
//!
//! ## Key Components
//!
//! - [`EntityStore`] - tenant-scoped CRUD for developers and entity records
//! - [`ExecutionStore`] - execution records, cascade-deleted with their transitions
//! - [`TransitionLog`] - the guarded, atomic append-only chain
//! - [`InMemoryStore`] - per-execution mutexes over concurrent maps
//! - [`PgStore`] - row-locked transactions over a SQLx pool
//!
//! Every lookup is scoped by `developer_id`; a record owned by another tenant is
//! reported exactly like a missing one.

pub mod connection;
pub mod memory;
pub mod postgres;

pub use connection::DatabaseConnection;
pub use memory::InMemoryStore;
pub use postgres::PgStore;

pub use crate::state_machine::{AppendOutcome, TransitionLog};

use crate::error::Result;
use crate::models::{Developer, EntityKind, EntityRecord, Execution};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn insert_developer(&self, developer: Developer) -> Result<Developer>;

    async fn get_developer(&self, developer_id: Uuid) -> Result<Developer>;

    /// Insert a record. The developer and every referenced entity must exist
    /// within the same tenant.
    async fn insert_entity(&self, record: EntityRecord) -> Result<EntityRecord>;

    async fn get_entity(
        &self,
        developer_id: Uuid,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<EntityRecord>;

    /// Delete a record. Fails with `DependentsExist` while other records reference
    /// it, and with `TaskInUse` for a task that non-terminal executions still run.
    async fn delete_entity(&self, developer_id: Uuid, kind: EntityKind, id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persist a new execution with an empty transition chain. The task must
    /// exist within the tenant.
    async fn insert_execution(&self, execution: &Execution) -> Result<()>;

    async fn get_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<Execution>;

    /// Executions of a task, oldest first.
    async fn list_executions(&self, developer_id: Uuid, task_id: Uuid) -> Result<Vec<Execution>>;

    /// Administrative removal of an execution and its transitions.
    async fn delete_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<()>;
}

/// Everything the coordinator needs from persistence
pub trait AgentsStore: EntityStore + ExecutionStore + TransitionLog {}

impl<T> AgentsStore for T where T: EntityStore + ExecutionStore + TransitionLog {}
