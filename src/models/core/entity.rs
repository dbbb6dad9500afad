//! # Entity Records
//!
//! Tenant-scoped storage representation shared by every CRUD entity.
//!
//! Stores persist entities as an [`EntityRecord`]: the kind, the owning developer,
//! the entities it references, and the typed model serialized as JSON. The
//! reference list is what lets a store refuse to delete an agent while its
//! sessions, docs, tools or tasks still exist.

use crate::constants::entity_kinds;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Agent,
    User,
    Session,
    Doc,
    Tool,
    Task,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => entity_kinds::AGENT,
            Self::User => entity_kinds::USER,
            Self::Session => entity_kinds::SESSION,
            Self::Doc => entity_kinds::DOC,
            Self::Tool => entity_kinds::TOOL,
            Self::Task => entity_kinds::TASK,
        }
    }

    /// Display name used in `NotFound` errors.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Agent => "Agent",
            Self::User => "User",
            Self::Session => "Session",
            Self::Doc => "Doc",
            Self::Tool => "Tool",
            Self::Task => "Task",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            entity_kinds::AGENT => Ok(Self::Agent),
            entity_kinds::USER => Ok(Self::User),
            entity_kinds::SESSION => Ok(Self::Session),
            entity_kinds::DOC => Ok(Self::Doc),
            entity_kinds::TOOL => Ok(Self::Tool),
            entity_kinds::TASK => Ok(Self::Task),
            _ => Err(format!("Invalid entity kind: {s}")),
        }
    }
}

/// A typed model that can be kept in the entity store.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const KIND: EntityKind;

    fn id(&self) -> Uuid;
    fn developer_id(&self) -> Uuid;

    /// Entities that must exist when this one is created and that cannot be
    /// deleted while this one exists.
    fn references(&self) -> Vec<(EntityKind, Uuid)>;

    fn to_record(&self) -> Result<EntityRecord> {
        Ok(EntityRecord {
            id: self.id(),
            developer_id: self.developer_id(),
            kind: Self::KIND,
            references: self.references(),
            payload: serde_json::to_value(self)?,
            created_at: Utc::now(),
        })
    }

    fn from_record(record: EntityRecord) -> Result<Self> {
        Ok(serde_json::from_value(record.payload)?)
    }
}

/// A creation request for an entity; the tenant is supplied by the caller.
pub trait NewEntity: Send {
    type Entity: Entity;

    fn into_entity(self, developer_id: Uuid) -> Result<Self::Entity>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub kind: EntityKind,
    pub references: Vec<(EntityKind, Uuid)>,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl EntityRecord {
    pub fn references_id(&self, id: Uuid) -> bool {
        self.references.iter().any(|(_, referenced)| *referenced == id)
    }
}

/// A tenant. Every other record is scoped to one developer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Developer {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub settings: Value,
    pub created_at: DateTime<Utc>,
}

impl Developer {
    pub fn new(email: impl Into<String>, settings: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            settings,
            created_at: Utc::now(),
        }
    }
}
