use super::entity::{Entity, EntityKind, NewEntity};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    const KIND: EntityKind = EntityKind::User;

    fn id(&self) -> Uuid {
        self.id
    }

    fn developer_id(&self) -> Uuid {
        self.developer_id
    }

    fn references(&self) -> Vec<(EntityKind, Uuid)> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub metadata: Value,
}

impl NewEntity for NewUser {
    type Entity = User;

    fn into_entity(self, developer_id: Uuid) -> Result<User> {
        Ok(User {
            id: Uuid::new_v4(),
            developer_id,
            name: self.name,
            about: self.about,
            metadata: self.metadata,
            created_at: Utc::now(),
        })
    }
}
