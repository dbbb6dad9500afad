use super::entity::{Entity, EntityKind, NewEntity};
use crate::error::{AgentsError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    Function,
    Integration,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDef {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Value,
}

/// A tool an agent can call from a task step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    pub id: Uuid,
    pub developer_id: Uuid,
    pub agent_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
    pub created_at: DateTime<Utc>,
}

impl Entity for Tool {
    const KIND: EntityKind = EntityKind::Tool;

    fn id(&self) -> Uuid {
        self.id
    }

    fn developer_id(&self) -> Uuid {
        self.developer_id
    }

    fn references(&self) -> Vec<(EntityKind, Uuid)> {
        vec![(EntityKind::Agent, self.agent_id)]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTool {
    pub agent_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl NewEntity for NewTool {
    type Entity = Tool;

    fn into_entity(self, developer_id: Uuid) -> Result<Tool> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid_name {
            return Err(AgentsError::validation(format!(
                "invalid tool name '{}': use letters, digits and underscores",
                self.name
            )));
        }
        Ok(Tool {
            id: Uuid::new_v4(),
            developer_id,
            agent_id: self.agent_id,
            name: self.name,
            tool_type: self.tool_type,
            function: self.function,
            created_at: Utc::now(),
        })
    }
}
