use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use super::{queries, DbPool, Guard, Mutation, Store};
use crate::error::AppError;
use crate::geo::NearbyQuery;
use crate::models::location::PointKind;
use crate::models::{
    Alert, AlertFilter, Location, Report, ReportFilter, Resource, ResourceFilter,
};

/// Postgres + PostGIS backed store. Points live in plain `lng`/`lat` columns with a
/// generated `geography` column carrying the GIST index.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AlertRow {
    id: Uuid,
    title: String,
    description: String,
    alert_type: String,
    severity: String,
    lng: f64,
    lat: f64,
    address: String,
    status: String,
    created_by: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ResourceRow {
    id: Uuid,
    name: String,
    resource_type: String,
    quantity: f64,
    unit: String,
    lng: f64,
    lat: f64,
    address: String,
    description: Option<String>,
    status: String,
    created_by: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    title: String,
    description: String,
    report_type: String,
    lng: f64,
    lat: f64,
    address: String,
    media: Vec<String>,
    related_alert: Option<Uuid>,
    status: String,
    created_by: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// A row that fails to decode means the table was written by something else; that is a
// server fault, not bad input.
fn decode<T: std::str::FromStr<Err = AppError>>(column: &str, raw: &str) -> Result<T, AppError> {
    raw.parse()
        .map_err(|e| AppError::Internal(format!("corrupt {column} column: {e}")))
}

impl TryFrom<AlertRow> for Alert {
    type Error = AppError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            alert_type: decode("alert_type", &row.alert_type)?,
            severity: decode("severity", &row.severity)?,
            location: Location {
                kind: PointKind::Point,
                coordinates: [row.lng, row.lat],
                address: row.address,
            },
            status: decode("status", &row.status)?,
            created_by: row.created_by,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<ResourceRow> for Resource {
    type Error = AppError;

    fn try_from(row: ResourceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            resource_type: decode("resource_type", &row.resource_type)?,
            quantity: row.quantity,
            unit: row.unit,
            location: Location {
                kind: PointKind::Point,
                coordinates: [row.lng, row.lat],
                address: row.address,
            },
            description: row.description,
            status: decode("status", &row.status)?,
            created_by: row.created_by,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<ReportRow> for Report {
    type Error = AppError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            report_type: decode("report_type", &row.report_type)?,
            location: Location {
                kind: PointKind::Point,
                coordinates: [row.lng, row.lat],
                address: row.address,
            },
            media: row.media,
            related_alert: row.related_alert,
            status: decode("status", &row.status)?,
            created_by: row.created_by,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn decode_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, AppError>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

fn alert_list_query(filter: &AlertFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(queries::SELECT_ALERTS);
    query.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(alert_type) = filter.alert_type {
        query.push(" AND alert_type = ").push_bind(alert_type.as_str());
    }
    query.push(queries::LIST_ORDER);
    query
}

fn resource_list_query(filter: &ResourceFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(queries::SELECT_RESOURCES);
    query.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(resource_type) = filter.resource_type {
        query.push(" AND resource_type = ").push_bind(resource_type.as_str());
    }
    query.push(queries::LIST_ORDER);
    query
}

fn report_list_query(filter: &ReportFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(queries::SELECT_REPORTS);
    query.push(" WHERE TRUE");
    if let Some(status) = filter.status {
        query.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(report_type) = filter.report_type {
        query.push(" AND report_type = ").push_bind(report_type.as_str());
    }
    if let Some(alert) = filter.related_alert {
        query.push(" AND related_alert = ").push_bind(alert);
    }
    query.push(queries::LIST_ORDER);
    query
}

#[async_trait]
impl Store<Alert> for PgStore {
    async fn list(&self, filter: &AlertFilter) -> Result<Vec<Alert>, AppError> {
        let mut query = alert_list_query(filter);
        let rows: Vec<AlertRow> = query.build_query_as().fetch_all(&self.pool).await?;
        decode_all(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Alert>, AppError> {
        sqlx::query_as::<_, AlertRow>(queries::SELECT_ALERT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Alert::try_from)
            .transpose()
    }

    async fn insert(&self, alert: Alert) -> Result<Alert, AppError> {
        sqlx::query(queries::INSERT_ALERT)
            .bind(alert.id)
            .bind(&alert.title)
            .bind(&alert.description)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(alert.location.coordinates[0])
            .bind(alert.location.coordinates[1])
            .bind(&alert.location.address)
            .bind(alert.status.as_str())
            .bind(&alert.created_by)
            .bind(alert.version)
            .bind(alert.created_at)
            .bind(alert.updated_at)
            .execute(&self.pool)
            .await?;

        debug!(alert_id = %alert.id, "Inserted alert");
        Ok(alert)
    }

    async fn modify(&self, id: Uuid, mutation: Mutation<Alert>) -> Result<Option<Alert>, AppError> {
        let mut tx = self.pool.begin().await?;

        // Row lock held until commit; concurrent writers to this id queue behind us.
        let row = sqlx::query_as::<_, AlertRow>(queries::SELECT_ALERT_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let alert = mutation(Alert::try_from(row)?)?;

        sqlx::query(queries::UPDATE_ALERT)
            .bind(alert.id)
            .bind(&alert.title)
            .bind(&alert.description)
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(alert.location.coordinates[0])
            .bind(alert.location.coordinates[1])
            .bind(&alert.location.address)
            .bind(alert.status.as_str())
            .bind(alert.version)
            .bind(alert.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(alert_id = %alert.id, version = alert.version, "Updated alert");
        Ok(Some(alert))
    }

    async fn remove(&self, id: Uuid, guard: Guard<Alert>) -> Result<Option<Alert>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, AlertRow>(queries::SELECT_ALERT_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let alert = Alert::try_from(row)?;
        guard(&alert)?;

        sqlx::query(queries::DELETE_ALERT)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(alert_id = %id, "Deleted alert");
        Ok(Some(alert))
    }

    async fn find_within(&self, query: &NearbyQuery) -> Result<Vec<Alert>, AppError> {
        let rows = sqlx::query_as::<_, AlertRow>(queries::SELECT_ALERTS_WITHIN)
            .bind(query.center.lng)
            .bind(query.center.lat)
            .bind(query.radius_meters)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }
}

#[async_trait]
impl Store<Resource> for PgStore {
    async fn list(&self, filter: &ResourceFilter) -> Result<Vec<Resource>, AppError> {
        let mut query = resource_list_query(filter);
        let rows: Vec<ResourceRow> = query.build_query_as().fetch_all(&self.pool).await?;
        decode_all(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Resource>, AppError> {
        sqlx::query_as::<_, ResourceRow>(queries::SELECT_RESOURCE)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Resource::try_from)
            .transpose()
    }

    async fn insert(&self, resource: Resource) -> Result<Resource, AppError> {
        sqlx::query(queries::INSERT_RESOURCE)
            .bind(resource.id)
            .bind(&resource.name)
            .bind(resource.resource_type.as_str())
            .bind(resource.quantity)
            .bind(&resource.unit)
            .bind(resource.location.coordinates[0])
            .bind(resource.location.coordinates[1])
            .bind(&resource.location.address)
            .bind(&resource.description)
            .bind(resource.status.as_str())
            .bind(&resource.created_by)
            .bind(resource.version)
            .bind(resource.created_at)
            .bind(resource.updated_at)
            .execute(&self.pool)
            .await?;

        debug!(resource_id = %resource.id, "Inserted resource");
        Ok(resource)
    }

    async fn modify(
        &self,
        id: Uuid,
        mutation: Mutation<Resource>,
    ) -> Result<Option<Resource>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ResourceRow>(queries::SELECT_RESOURCE_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let resource = mutation(Resource::try_from(row)?)?;

        sqlx::query(queries::UPDATE_RESOURCE)
            .bind(resource.id)
            .bind(&resource.name)
            .bind(resource.resource_type.as_str())
            .bind(resource.quantity)
            .bind(&resource.unit)
            .bind(resource.location.coordinates[0])
            .bind(resource.location.coordinates[1])
            .bind(&resource.location.address)
            .bind(&resource.description)
            .bind(resource.status.as_str())
            .bind(resource.version)
            .bind(resource.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(resource_id = %resource.id, version = resource.version, "Updated resource");
        Ok(Some(resource))
    }

    async fn remove(
        &self,
        id: Uuid,
        guard: Guard<Resource>,
    ) -> Result<Option<Resource>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ResourceRow>(queries::SELECT_RESOURCE_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let resource = Resource::try_from(row)?;
        guard(&resource)?;

        sqlx::query(queries::DELETE_RESOURCE)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(resource_id = %id, "Deleted resource");
        Ok(Some(resource))
    }

    async fn find_within(&self, query: &NearbyQuery) -> Result<Vec<Resource>, AppError> {
        let rows = sqlx::query_as::<_, ResourceRow>(queries::SELECT_RESOURCES_WITHIN)
            .bind(query.center.lng)
            .bind(query.center.lat)
            .bind(query.radius_meters)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }
}

#[async_trait]
impl Store<Report> for PgStore {
    async fn list(&self, filter: &ReportFilter) -> Result<Vec<Report>, AppError> {
        let mut query = report_list_query(filter);
        let rows: Vec<ReportRow> = query.build_query_as().fetch_all(&self.pool).await?;
        decode_all(rows)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Report>, AppError> {
        sqlx::query_as::<_, ReportRow>(queries::SELECT_REPORT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Report::try_from)
            .transpose()
    }

    async fn insert(&self, report: Report) -> Result<Report, AppError> {
        sqlx::query(queries::INSERT_REPORT)
            .bind(report.id)
            .bind(&report.title)
            .bind(&report.description)
            .bind(report.report_type.as_str())
            .bind(report.location.coordinates[0])
            .bind(report.location.coordinates[1])
            .bind(&report.location.address)
            .bind(&report.media)
            .bind(report.related_alert)
            .bind(report.status.as_str())
            .bind(&report.created_by)
            .bind(report.version)
            .bind(report.created_at)
            .bind(report.updated_at)
            .execute(&self.pool)
            .await?;

        debug!(report_id = %report.id, "Inserted report");
        Ok(report)
    }

    async fn modify(&self, id: Uuid, mutation: Mutation<Report>) -> Result<Option<Report>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ReportRow>(queries::SELECT_REPORT_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let report = mutation(Report::try_from(row)?)?;

        sqlx::query(queries::UPDATE_REPORT)
            .bind(report.id)
            .bind(&report.title)
            .bind(&report.description)
            .bind(report.report_type.as_str())
            .bind(report.location.coordinates[0])
            .bind(report.location.coordinates[1])
            .bind(&report.location.address)
            .bind(&report.media)
            .bind(report.related_alert)
            .bind(report.status.as_str())
            .bind(report.version)
            .bind(report.updated_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(report_id = %report.id, version = report.version, "Updated report");
        Ok(Some(report))
    }

    async fn remove(&self, id: Uuid, guard: Guard<Report>) -> Result<Option<Report>, AppError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ReportRow>(queries::SELECT_REPORT_FOR_UPDATE)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let report = Report::try_from(row)?;
        guard(&report)?;

        sqlx::query(queries::DELETE_REPORT)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(report_id = %id, "Deleted report");
        Ok(Some(report))
    }

    async fn find_within(&self, query: &NearbyQuery) -> Result<Vec<Report>, AppError> {
        let rows = sqlx::query_as::<_, ReportRow>(queries::SELECT_REPORTS_WITHIN)
            .bind(query.center.lng)
            .bind(query.center.lat)
            .bind(query.radius_meters)
            .fetch_all(&self.pool)
            .await?;
        decode_all(rows)
    }
}
