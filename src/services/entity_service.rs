//! # Entity Service
//!
//! Typed, tenant-scoped CRUD over the entity store.

use crate::database::EntityStore;
use crate::error::Result;
use crate::models::{Developer, Entity, NewEntity};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

#[derive(Clone)]
pub struct EntityService {
    store: Arc<dyn EntityStore>,
}

impl EntityService {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn create_developer(&self, email: &str, settings: Value) -> Result<Developer> {
        self.store
            .insert_developer(Developer::new(email, settings))
            .await
    }

    pub async fn get_developer(&self, developer_id: Uuid) -> Result<Developer> {
        self.store.get_developer(developer_id).await
    }

    /// Create an entity owned by `developer_id`. Every entity it references must
    /// already exist for the same developer.
    #[instrument(skip(self, request))]
    pub async fn create<N: NewEntity>(&self, developer_id: Uuid, request: N) -> Result<N::Entity> {
        let entity = request.into_entity(developer_id)?;
        self.store.insert_entity(entity.to_record()?).await?;
        let kind = <N::Entity as Entity>::KIND;
        debug!(kind = %kind, id = %entity.id(), "Entity created");
        Ok(entity)
    }

    pub async fn get<E: Entity>(&self, developer_id: Uuid, id: Uuid) -> Result<E> {
        let record = self.store.get_entity(developer_id, E::KIND, id).await?;
        E::from_record(record)
    }

    /// Delete an entity. Fails with `DependentsExist` while anything references it.
    pub async fn delete<E: Entity>(&self, developer_id: Uuid, id: Uuid) -> Result<()> {
        self.store.delete_entity(developer_id, E::KIND, id).await
    }
}
