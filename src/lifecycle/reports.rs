use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::not_found;
use crate::auth::{Actor, Role};
use crate::db::{Guard, Mutation, Store};
use crate::error::AppError;
use crate::geo::NearbyQuery;
use crate::models::{now, Report, ReportFilter, ReportPayload};

/// Responders triage reports they did not write, so they may update them too.
const MAY_UPDATE: &[Role] = &[Role::Admin, Role::Responder];
const MAY_DELETE: &[Role] = &[Role::Admin];

/// Reports are not broadcast; clients poll the list.
#[derive(Clone)]
pub struct ReportManager {
    store: Arc<dyn Store<Report>>,
}

impl ReportManager {
    pub fn new(store: Arc<dyn Store<Report>>) -> Self {
        Self { store }
    }

    pub async fn list(&self, filter: &ReportFilter) -> Result<Vec<Report>, AppError> {
        self.store.list(filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Report, AppError> {
        self.store.get(id).await?.ok_or_else(not_found::<Report>)
    }

    #[instrument(skip(self, payload), fields(actor = %actor.id))]
    pub async fn create(&self, payload: ReportPayload, actor: &Actor) -> Result<Report, AppError> {
        let new = payload.into_new()?;
        let report = self.store.insert(Report::create(new, &actor.id, now())).await?;

        info!(report_id = %report.id, report_type = %report.report_type, "Created report");
        Ok(report)
    }

    #[instrument(skip(self, payload), fields(actor = %actor.id))]
    pub async fn update(
        &self,
        id: Uuid,
        payload: ReportPayload,
        actor: &Actor,
    ) -> Result<Report, AppError> {
        let actor = actor.clone();
        let mutation: Mutation<Report> =
            Box::new(move |current: Report| -> Result<Report, AppError> {
                actor.ensure_owner_or_roles(&current.created_by, MAY_UPDATE, "update", "report")?;
                let patch = payload.into_patch()?;
                Ok(patch.apply(current, now()))
            });

        let report = self
            .store
            .modify(id, mutation)
            .await?
            .ok_or_else(not_found::<Report>)?;

        info!(report_id = %report.id, status = %report.status, version = report.version, "Updated report");
        Ok(report)
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let actor = actor.clone();
        let guard: Guard<Report> = Box::new(move |current: &Report| {
            actor.ensure_owner_or_roles(&current.created_by, MAY_DELETE, "delete", "report")
        });

        self.store
            .remove(id, guard)
            .await?
            .ok_or_else(not_found::<Report>)?;

        info!(report_id = %id, "Deleted report");
        Ok(())
    }

    pub async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Report>, AppError> {
        self.store.find_within(query).await
    }
}
