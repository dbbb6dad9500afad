use super::entity::{Entity, EntityKind, NewEntity};
use crate::error::{AgentsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Owner of a document; docs belong to exactly one agent or user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "owner_type", content = "owner_id", rename_all = "snake_case")]
pub enum DocOwner {
    Agent(Uuid),
    User(Uuid),
}

impl DocOwner {
    pub fn reference(&self) -> (EntityKind, Uuid) {
        match *self {
            Self::Agent(id) => (EntityKind::Agent, id),
            Self::User(id) => (EntityKind::User, id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doc {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub owner: DocOwner,
    pub title: String,
    pub content: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Entity for Doc {
    const KIND: EntityKind = EntityKind::Doc;

    fn id(&self) -> Uuid {
        self.id
    }

    fn developer_id(&self) -> Uuid {
        self.developer_id
    }

    fn references(&self) -> Vec<(EntityKind, Uuid)> {
        vec![self.owner.reference()]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDoc {
    pub owner: DocOwner,
    pub title: String,
    pub content: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl NewEntity for NewDoc {
    type Entity = Doc;

    fn into_entity(self, developer_id: Uuid) -> Result<Doc> {
        if self.content.is_empty() {
            return Err(AgentsError::validation("doc content must not be empty"));
        }
        Ok(Doc {
            id: Uuid::new_v4(),
            developer_id,
            owner: self.owner,
            title: self.title,
            content: self.content,
            metadata: self.metadata,
            created_at: Utc::now(),
        })
    }
}
