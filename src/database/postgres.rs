//! PostgreSQL store.
//!
//! ## Atomic Append
//!
//! `append_transition` runs one transaction:
//!
//! 1. `SELECT ... FOR UPDATE` on the execution row, serializing appends to that
//!    execution only
//! 2. Load the chain ordered by `sort_key` and evaluate the [`ChainGuard`]
//! 3. Clear the previous `most_recent` flag and insert the new transition
//!
//! A duplicate decision rolls back without writing. The partial unique index on
//! terminal types backs the single-terminal invariant at the schema level.
//!
//! Queries are checked at runtime (`sqlx::query_as`) so the crate builds without a
//! live database.

use super::{EntityStore, ExecutionStore};
use crate::error::{AgentsError, Result};
use crate::models::{Developer, EntityKind, EntityRecord, Execution, NewTransition, Transition};
use crate::state_machine::{AppendDecision, AppendOutcome, ChainGuard, TransitionLog};
use crate::workflow::WorkflowHandle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

const TRANSITION_COLUMNS: &str = "transition_id, execution_id, type, current_step, next_step, \
     output, metadata, sort_key, created_at";

const EXECUTION_COLUMNS: &str =
    "execution_id, developer_id, task_id, input, workflow, metadata, created_at";

const ENTITY_COLUMNS: &str =
    "entity_id, developer_id, kind, entity_references, payload, created_at";

#[derive(Debug, FromRow)]
struct TransitionRow {
    transition_id: Uuid,
    execution_id: Uuid,
    #[sqlx(rename = "type")]
    transition_type: String,
    current_step: Option<Json<crate::models::TransitionTarget>>,
    next_step: Option<Json<crate::models::TransitionTarget>>,
    output: Value,
    metadata: Value,
    sort_key: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransitionRow> for Transition {
    type Error = AgentsError;

    fn try_from(row: TransitionRow) -> Result<Self> {
        let transition_type = row
            .transition_type
            .parse()
            .map_err(|e: String| AgentsError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(Transition {
            id: row.transition_id,
            execution_id: row.execution_id,
            transition_type,
            current: row.current_step.map(|Json(target)| target),
            next: row.next_step.map(|Json(target)| target),
            output: row.output,
            metadata: row.metadata,
            sort_key: row.sort_key,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ExecutionRow {
    execution_id: Uuid,
    developer_id: Uuid,
    task_id: Uuid,
    input: Value,
    workflow: Json<WorkflowHandle>,
    metadata: Value,
    created_at: DateTime<Utc>,
}

impl From<ExecutionRow> for Execution {
    fn from(row: ExecutionRow) -> Self {
        Execution {
            id: row.execution_id,
            developer_id: row.developer_id,
            task_id: row.task_id,
            input: row.input,
            workflow: row.workflow.0,
            metadata: row.metadata,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct EntityRow {
    entity_id: Uuid,
    developer_id: Uuid,
    kind: String,
    entity_references: Json<Vec<(EntityKind, Uuid)>>,
    payload: Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntityRow> for EntityRecord {
    type Error = AgentsError;

    fn try_from(row: EntityRow) -> Result<Self> {
        let kind = row
            .kind
            .parse()
            .map_err(|e: String| AgentsError::Database(sqlx::Error::Decode(e.into())))?;
        Ok(EntityRecord {
            id: row.entity_id,
            developer_id: row.developer_id,
            kind,
            references: row.entity_references.0,
            payload: row.payload,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DeveloperRow {
    developer_id: Uuid,
    email: String,
    settings: Value,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Lock a tenant-owned entity row for the rest of the transaction.
    async fn lock_entity(
        tx: &mut Transaction<'_, Postgres>,
        developer_id: Uuid,
        kind: EntityKind,
        id: Uuid,
        exclusive: bool,
    ) -> Result<()> {
        let sql = format!(
            "SELECT entity_id FROM entities \
             WHERE entity_id = $1 AND developer_id = $2 AND kind = $3 {}",
            if exclusive { "FOR UPDATE" } else { "FOR SHARE" }
        );
        let found: Option<(Uuid,)> = sqlx::query_as(&sql)
            .bind(id)
            .bind(developer_id)
            .bind(kind.as_str())
            .fetch_optional(&mut **tx)
            .await?;
        found
            .map(|_| ())
            .ok_or_else(|| AgentsError::not_found(kind.label(), id))
    }

    async fn load_chain(
        tx: &mut Transaction<'_, Postgres>,
        execution_id: Uuid,
    ) -> Result<Vec<Transition>> {
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM transitions \
             WHERE execution_id = $1 ORDER BY sort_key ASC"
        );
        let rows: Vec<TransitionRow> = sqlx::query_as(&sql)
            .bind(execution_id)
            .fetch_all(&mut **tx)
            .await?;
        rows.into_iter().map(Transition::try_from).collect()
    }

    async fn ensure_execution_exists(&self, execution_id: Uuid) -> Result<()> {
        let found: Option<(Uuid,)> =
            sqlx::query_as("SELECT execution_id FROM executions WHERE execution_id = $1")
                .bind(execution_id)
                .fetch_optional(&self.pool)
                .await?;
        found
            .map(|_| ())
            .ok_or_else(|| AgentsError::not_found("Execution", execution_id))
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn insert_developer(&self, developer: Developer) -> Result<Developer> {
        sqlx::query(
            "INSERT INTO developers (developer_id, email, settings, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(developer.id)
        .bind(&developer.email)
        .bind(&developer.settings)
        .bind(developer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(developer)
    }

    async fn get_developer(&self, developer_id: Uuid) -> Result<Developer> {
        let row: Option<DeveloperRow> = sqlx::query_as(
            "SELECT developer_id, email, settings, created_at FROM developers \
             WHERE developer_id = $1",
        )
        .bind(developer_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| Developer {
            id: row.developer_id,
            email: row.email,
            settings: row.settings,
            created_at: row.created_at,
        })
        .ok_or_else(|| AgentsError::not_found("Developer", developer_id))
    }

    #[instrument(skip(self, record), fields(kind = %record.kind, id = %record.id))]
    async fn insert_entity(&self, record: EntityRecord) -> Result<EntityRecord> {
        let mut tx = self.pool.begin().await?;

        let developer: Option<(Uuid,)> =
            sqlx::query_as("SELECT developer_id FROM developers WHERE developer_id = $1")
                .bind(record.developer_id)
                .fetch_optional(&mut *tx)
                .await?;
        if developer.is_none() {
            return Err(AgentsError::not_found("Developer", record.developer_id));
        }

        for (kind, id) in &record.references {
            Self::lock_entity(&mut tx, record.developer_id, *kind, *id, false).await?;
        }

        let referenced_ids: Vec<Uuid> = record.references.iter().map(|(_, id)| *id).collect();
        sqlx::query(
            "INSERT INTO entities \
             (entity_id, developer_id, kind, entity_references, referenced_ids, payload, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(record.id)
        .bind(record.developer_id)
        .bind(record.kind.as_str())
        .bind(Json(&record.references))
        .bind(&referenced_ids)
        .bind(&record.payload)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!("Entity inserted");
        Ok(record)
    }

    async fn get_entity(
        &self,
        developer_id: Uuid,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<EntityRecord> {
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities \
             WHERE entity_id = $1 AND developer_id = $2 AND kind = $3"
        );
        let row: Option<EntityRow> = sqlx::query_as(&sql)
            .bind(id)
            .bind(developer_id)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.ok_or_else(|| AgentsError::not_found(kind.label(), id))?
            .try_into()
    }

    #[instrument(skip(self))]
    async fn delete_entity(&self, developer_id: Uuid, kind: EntityKind, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_entity(&mut tx, developer_id, kind, id, true).await?;

        let (dependents,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM entities WHERE developer_id = $1 AND $2 = ANY(referenced_ids)",
        )
        .bind(developer_id)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if dependents > 0 {
            return Err(AgentsError::DependentsExist {
                entity: kind.label(),
                id,
                dependents: usize::try_from(dependents).unwrap_or(usize::MAX),
            });
        }

        if kind == EntityKind::Task {
            let (active,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM executions e \
                 WHERE e.developer_id = $1 AND e.task_id = $2 \
                 AND NOT EXISTS ( \
                     SELECT 1 FROM transitions t \
                     WHERE t.execution_id = e.execution_id \
                     AND t.type IN ('finish', 'error', 'cancelled'))",
            )
            .bind(developer_id)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
            if active > 0 {
                return Err(AgentsError::TaskInUse {
                    task_id: id,
                    active: usize::try_from(active).unwrap_or(usize::MAX),
                });
            }
        }

        sqlx::query("DELETE FROM entities WHERE entity_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for PgStore {
    #[instrument(skip(self, execution), fields(execution_id = %execution.id))]
    async fn insert_execution(&self, execution: &Execution) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::lock_entity(
            &mut tx,
            execution.developer_id,
            EntityKind::Task,
            execution.task_id,
            false,
        )
        .await?;

        sqlx::query(
            "INSERT INTO executions \
             (execution_id, developer_id, task_id, input, workflow, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(execution.id)
        .bind(execution.developer_id)
        .bind(execution.task_id)
        .bind(&execution.input)
        .bind(Json(&execution.workflow))
        .bind(&execution.metadata)
        .bind(execution.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<Execution> {
        let sql = format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions \
             WHERE execution_id = $1 AND developer_id = $2"
        );
        let row: Option<ExecutionRow> = sqlx::query_as(&sql)
            .bind(execution_id)
            .bind(developer_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Execution::from)
            .ok_or_else(|| AgentsError::not_found("Execution", execution_id))
    }

    async fn list_executions(&self, developer_id: Uuid, task_id: Uuid) -> Result<Vec<Execution>> {
        let sql = format!(
            "SELECT {EXECUTION_COLUMNS} FROM executions \
             WHERE developer_id = $1 AND task_id = $2 ORDER BY created_at ASC"
        );
        let rows: Vec<ExecutionRow> = sqlx::query_as(&sql)
            .bind(developer_id)
            .bind(task_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Execution::from).collect())
    }

    async fn delete_execution(&self, developer_id: Uuid, execution_id: Uuid) -> Result<()> {
        let result =
            sqlx::query("DELETE FROM executions WHERE execution_id = $1 AND developer_id = $2")
                .bind(execution_id)
                .bind(developer_id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AgentsError::not_found("Execution", execution_id));
        }
        Ok(())
    }
}

#[async_trait]
impl TransitionLog for PgStore {
    #[instrument(skip(self, proposal, guard), fields(transition_type = %proposal.transition_type))]
    async fn append_transition(
        &self,
        execution_id: Uuid,
        proposal: NewTransition,
        guard: &ChainGuard,
    ) -> Result<AppendOutcome> {
        let mut tx = self.pool.begin().await?;

        let locked: Option<(Uuid,)> = sqlx::query_as(
            "SELECT execution_id FROM executions WHERE execution_id = $1 FOR UPDATE",
        )
        .bind(execution_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(AgentsError::not_found("Execution", execution_id));
        }

        let chain = Self::load_chain(&mut tx, execution_id).await?;
        let sort_key = match guard.evaluate(execution_id, &chain, &proposal)? {
            AppendDecision::Duplicate(transition) => {
                tx.rollback().await?;
                return Ok(AppendOutcome {
                    transition,
                    created: false,
                });
            }
            AppendDecision::Append { sort_key } => sort_key,
        };

        let transition = Transition::from_proposal(execution_id, proposal, sort_key);

        sqlx::query(
            "UPDATE transitions SET most_recent = false \
             WHERE execution_id = $1 AND most_recent = true",
        )
        .bind(execution_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO transitions \
             (transition_id, execution_id, type, current_step, next_step, output, metadata, \
              sort_key, most_recent, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, true, $9)",
        )
        .bind(transition.id)
        .bind(transition.execution_id)
        .bind(transition.transition_type.as_str())
        .bind(transition.current.clone().map(Json))
        .bind(transition.next.clone().map(Json))
        .bind(&transition.output)
        .bind(&transition.metadata)
        .bind(transition.sort_key)
        .bind(transition.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(AppendOutcome {
            transition,
            created: true,
        })
    }

    async fn list_transitions(&self, execution_id: Uuid) -> Result<Vec<Transition>> {
        self.ensure_execution_exists(execution_id).await?;
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM transitions \
             WHERE execution_id = $1 ORDER BY sort_key ASC"
        );
        let rows: Vec<TransitionRow> = sqlx::query_as(&sql)
            .bind(execution_id)
            .fetch_all(&self.pool)
            .await?;
        let chain = rows
            .into_iter()
            .map(Transition::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(crate::state_machine::order_chain(chain))
    }

    async fn latest_transition(&self, execution_id: Uuid) -> Result<Option<Transition>> {
        self.ensure_execution_exists(execution_id).await?;
        let sql = format!(
            "SELECT {TRANSITION_COLUMNS} FROM transitions \
             WHERE execution_id = $1 AND most_recent = true \
             ORDER BY sort_key DESC LIMIT 1"
        );
        let row: Option<TransitionRow> = sqlx::query_as(&sql)
            .bind(execution_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Transition::try_from).transpose()
    }
}
