use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::not_found;
use crate::auth::Actor;
use crate::bus::{AlertEvent, FanOutBus};
use crate::db::{Guard, Mutation, Store};
use crate::error::AppError;
use crate::geo::NearbyQuery;
use crate::models::{now, Alert, AlertFilter, AlertPayload};

/// Authoritative writer of alerts. Publishes to the fan-out bus only after the store
/// has committed, so subscribers never see a write that failed.
#[derive(Clone)]
pub struct AlertManager {
    store: Arc<dyn Store<Alert>>,
    bus: FanOutBus,
}

impl AlertManager {
    pub fn new(store: Arc<dyn Store<Alert>>, bus: FanOutBus) -> Self {
        Self { store, bus }
    }

    pub fn bus(&self) -> &FanOutBus {
        &self.bus
    }

    pub async fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, AppError> {
        self.store.list(filter).await
    }

    pub async fn get(&self, id: Uuid) -> Result<Alert, AppError> {
        self.store.get(id).await?.ok_or_else(not_found::<Alert>)
    }

    #[instrument(skip(self, payload), fields(actor = %actor.id))]
    pub async fn create(&self, payload: AlertPayload, actor: &Actor) -> Result<Alert, AppError> {
        let new = payload.into_new()?;
        let alert = self.store.insert(Alert::create(new, &actor.id, now())).await?;

        info!(
            alert_id = %alert.id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            "Created alert"
        );
        self.bus.publish(AlertEvent::Created(alert.clone()));
        Ok(alert)
    }

    #[instrument(skip(self, payload), fields(actor = %actor.id))]
    pub async fn update(&self, id: Uuid, payload: AlertPayload, actor: &Actor) -> Result<Alert, AppError> {
        let actor = actor.clone();
        let mutation: Mutation<Alert> = Box::new(move |current: Alert| -> Result<Alert, AppError> {
            actor.ensure_owner_or_admin(&current.created_by, "alert")?;
            let patch = payload.into_patch()?;
            Ok(patch.apply(current, now()))
        });

        let alert = self
            .store
            .modify(id, mutation)
            .await?
            .ok_or_else(not_found::<Alert>)?;

        info!(alert_id = %alert.id, version = alert.version, status = %alert.status, "Updated alert");
        self.bus.publish(AlertEvent::Updated(alert.clone()));
        Ok(alert)
    }

    #[instrument(skip(self), fields(actor = %actor.id))]
    pub async fn delete(&self, id: Uuid, actor: &Actor) -> Result<(), AppError> {
        let actor = actor.clone();
        let guard: Guard<Alert> = Box::new(move |_: &Alert| actor.ensure_admin("alert"));

        self.store
            .remove(id, guard)
            .await?
            .ok_or_else(not_found::<Alert>)?;

        info!(alert_id = %id, "Deleted alert");
        self.bus.publish(AlertEvent::Deleted { id });
        Ok(())
    }

    pub async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<Alert>, AppError> {
        self.store.find_within(query).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::db::MemoryStore;
    use crate::geo::GeoPoint;
    use crate::models::{AlertStatus, AlertType, Severity};
    use serde_json::json;

    fn manager() -> AlertManager {
        AlertManager::new(Arc::new(MemoryStore::<Alert>::new()), FanOutBus::new(32))
    }

    fn payload(value: serde_json::Value) -> AlertPayload {
        serde_json::from_value(value).unwrap()
    }

    fn flood() -> AlertPayload {
        payload(json!({
            "title": "Flood Warning",
            "description": "Storm surge expected",
            "type": "Flood",
            "severity": "High",
            "location": { "coordinates": [-80.19, 25.76], "address": "Miami, FL" }
        }))
    }

    fn owner() -> Actor {
        Actor::new("owner", Role::User)
    }

    #[tokio::test]
    async fn test_create_then_get_returns_same_record() {
        let m = manager();
        let created = m.create(flood(), &owner()).await.unwrap();

        assert_eq!(created.status, AlertStatus::Active);
        assert_eq!(created.alert_type, AlertType::Flood);
        assert_eq!(created.severity, Severity::High);
        assert_eq!(created.created_by, "owner");
        assert_eq!(created.created_at, created.updated_at);
        assert_eq!(m.get(created.id).await.unwrap(), created);
    }

    #[tokio::test]
    async fn test_create_publishes_after_commit() {
        let m = manager();
        let mut sub = m.bus().subscribe();

        let created = m.create(flood(), &owner()).await.unwrap();
        assert_eq!(sub.recv().await, Some(AlertEvent::Created(created)));
    }

    #[tokio::test]
    async fn test_invalid_create_writes_and_publishes_nothing() {
        let m = manager();
        let mut sub = m.bus().subscribe();
        let err = m
            .create(payload(json!({ "title": "x" })), &owner())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(m.list(&AlertFilter::default()).await.unwrap().is_empty());
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let err = manager().get(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.to_string(), "Alert not found");
    }

    #[tokio::test]
    async fn test_non_owner_update_is_forbidden_and_silent() {
        let m = manager();
        let created = m.create(flood(), &owner()).await.unwrap();
        let mut sub = m.bus().subscribe();

        let stranger = Actor::new("stranger", Role::Responder);
        let err = m
            .update(created.id, payload(json!({ "status": "Resolved" })), &stranger)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(m.get(created.id).await.unwrap(), created);
        assert_eq!(sub.try_recv(), None);

        // The next event is the owner's.
        let updated = m
            .update(created.id, payload(json!({ "status": "Monitoring" })), &owner())
            .await
            .unwrap();
        assert_eq!(sub.recv().await, Some(AlertEvent::Updated(updated)));
    }

    #[tokio::test]
    async fn test_owner_and_admin_can_update_any_status() {
        let m = manager();
        let created = m.create(flood(), &owner()).await.unwrap();
        let admin = Actor::new("root", Role::Admin);

        let mut last = created;
        for (status, actor) in [
            ("Resolved", owner()),
            ("Active", admin.clone()),
            ("Monitoring", owner()),
            ("Resolved", admin.clone()),
        ] {
            let next = m
                .update(last.id, payload(json!({ "status": status })), &actor)
                .await
                .unwrap();
            assert_eq!(next.status.as_str(), status);
            assert_eq!(next.version, last.version + 1);
            assert_eq!(next.created_by, "owner");
            last = next;
        }
    }

    #[tokio::test]
    async fn test_update_validation_and_not_found() {
        let m = manager();
        let created = m.create(flood(), &owner()).await.unwrap();
        let mut sub = m.bus().subscribe();

        let err = m
            .update(created.id, payload(json!({ "severity": "Apocalyptic" })), &owner())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(m.get(created.id).await.unwrap(), created);
        assert_eq!(sub.try_recv(), None);

        let err = m
            .update(Uuid::new_v4(), payload(json!({ "status": "Resolved" })), &owner())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_admin_only() {
        let m = manager();
        let created = m.create(flood(), &owner()).await.unwrap();
        let mut sub = m.bus().subscribe();

        let err = m.delete(created.id, &owner()).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(m.get(created.id).await.is_ok());
        assert_eq!(sub.try_recv(), None);

        let admin = Actor::new("root", Role::Admin);
        m.delete(created.id, &admin).await.unwrap();
        assert_eq!(sub.recv().await, Some(AlertEvent::Deleted { id: created.id }));
        assert!(matches!(
            m.get(created.id).await,
            Err(AppError::NotFound(_))
        ));

        assert!(matches!(
            m.delete(created.id, &admin).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_nearby_includes_new_alert() {
        let m = manager();
        let created = m.create(flood(), &owner()).await.unwrap();

        let query = NearbyQuery::new(GeoPoint::new(-80.19, 25.76).unwrap(), 5.0).unwrap();
        let hits = m.nearby(&query).await.unwrap();
        assert_eq!(hits, vec![created]);

        let far_away = NearbyQuery::new(GeoPoint::new(2.35, 48.85).unwrap(), 5.0).unwrap();
        assert!(m.nearby(&far_away).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_and_orders() {
        let m = manager();
        m.create(flood(), &owner()).await.unwrap();
        let mut fire = flood();
        fire.alert_type = Some("Fire".into());
        fire.title = Some("Brush fire".into());
        let second = m.create(fire, &owner()).await.unwrap();

        let all = m.list(&AlertFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at >= all[1].created_at);

        let fires = m
            .list(&AlertFilter {
                alert_type: Some(AlertType::Fire),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fires, vec![second]);
    }
}
