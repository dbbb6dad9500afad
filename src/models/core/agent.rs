use super::entity::{Entity, EntityKind, NewEntity};
use crate::error::{AgentsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An agent owns tools, tasks and agent-scoped docs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub about: String,
    pub model: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Entity for Agent {
    const KIND: EntityKind = EntityKind::Agent;

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
pub struct NewAgent {
    pub name: String,
    #[serde(default)]
    pub about: String,
    pub model: String,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub metadata: Value,
}

impl NewEntity for NewAgent {
    type Entity = Agent;

    fn into_entity(self, developer_id: Uuid) -> Result<Agent> {
        if self.model.trim().is_empty() {
            return Err(AgentsError::validation("agent model must not be empty"));
        }
        Ok(Agent {
            id: Uuid::new_v4(),
            developer_id,
            name: self.name,
            about: self.about,
            model: self.model,
            instructions: self.instructions,
            metadata: self.metadata,
            created_at: Utc::now(),
        })
    }
}
