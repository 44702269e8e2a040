use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::not_found;
use crate::auth::Actor;
use crate::db::{Guard, Mutation, Store};
use crate::error::AppError;
use crate::geo::NearbyQuery;
use crate::models::{now, Resource, ResourceFilter, ResourcePayload};

/// Same write rules as alerts; resources are not broadcast.
#[derive(Clone)]
pub struct ResourceManager {
    store: Arc<dyn Store<Resource>>,
}

impl ResourceManager {
    pub fn new(store: Arc<dyn Store<Resource>>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filter: &ResourceFilter) -> Result<Vec<Resource>, AppError> {
        self.store.list(filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Resource, AppError> {
        self.store.get(id).await?.ok_or_else(not_found::<Resource>)
    }

    #[instrument(skip(self, payload), fields(actor = %actor.id))]
    pub async fn create(&self, payload: ResourcePayload, actor: &Actor) -> Result<Resource, AppError> {
        let new = payload.into_new()?;
        let resource = self
            .store
            .insert(Resource::create(new, &actor.id, now()))
            .await?;

        info!(resource_id = %resource.id, resource_type = %resource.resource_type, "Created resource");
        Ok(resource)
    }

    #[instrument(skip(self, payload), fields(actor = %actor.id))]
    pub async fn update(
        &self,
        id: Uuid,
        payload: ResourcePayload,
        actor: &Actor,
    ) -> Result<Resource, AppError> {
        let actor = actor.clone();
        let mutation: Mutation<Resource> =
            Box::new(move |current: Resource| -> Result<Resource, AppError> {
                actor.ensure_owner_or_admin(&current.created_by, "resource")?;
                let patch = payload.into_patch()?;
                Ok(patch.apply(current, now()))
            });

        let resource = self
            .store
            .modify(id, mutation)
            .await?
            .ok_or_else(not_found::<Resource>)?;

        info!(resource_id = %resource.id, version = resource.version, "Updated resource");
        Ok(resource)
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let actor = actor.clone();
        let guard: Guard<Resource> = Box::new(move |_: &Resource| actor.ensure_admin("resource"));

        self.store
            .remove(id, guard)
            .await?
            .ok_or_else(not_found::<Resource>)?;

        info!(resource_id = %id, "Deleted resource");
        Ok(())
    }

    pub async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Resource>, AppError> {
        self.store.find_within(query).await
    }
}
