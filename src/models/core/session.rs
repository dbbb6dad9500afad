use super::entity::{Entity, EntityKind, NewEntity};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A conversation between an agent and, optionally, a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub agent_id: Uuid,
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub situation: String,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Entity for Session {
    const KIND: EntityKind = EntityKind::Session;

    fn id(&self) -> Uuid {
        self.id
    }

    fn developer_id(&self) -> Uuid {
        self.developer_id
    }

    fn references(&self) -> Vec<(EntityKind, Uuid)> {
        let mut references = vec![(EntityKind::Agent, self.agent_id)];
        if let Some(user_id) = self.user_id {
            references.push((EntityKind::User, user_id));
        }
        references
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSession {
    pub agent_id: Uuid,
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub situation: String,
    #[serde(default)]
    pub metadata: Value,
}

impl NewEntity for NewSession {
    type Entity = Session;

    fn into_entity(self, developer_id: Uuid) -> Result<Session> {
        Ok(Session {
            id: Uuid::new_v4(),
            developer_id,
            agent_id: self.agent_id,
            user_id: self.user_id,
            situation: self.situation,
            metadata: self.metadata,
            created_at: Utc::now(),
        })
    }
}
