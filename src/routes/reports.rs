use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use super::{parse_body, NearbyParams};
use crate::auth::Actor;
use crate::error::AppError;
use crate::lifecycle::parse_id;
use crate::models::{Report, ReportFilter, ReportPayload};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub alert: Option<String>,
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Report>>, AppError> {
    let filter = ReportFilter::from_params(params.status, params.report_type, params.alert)?;
    Ok(Json(state.reports.list(&filter).await?))
}

pub async fn nearby_reports(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<Report>>, AppError> {
    let query = params.into_query(state.config.nearby_default_distance_km)?;
    Ok(Json(state.reports.nearby(&query).await?))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Report>, AppError> {
    let id = parse_id::<Report>(&id)?;
    Ok(Json(state.reports.get(id).await?))
}

pub async fn create_report(
    State(state): State<AppState>,
    actor: Actor,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: ReportPayload = parse_body(&body)?;
    let report = state.reports.create(payload, &actor).await?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn update_report(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Report>, AppError> {
    let id = parse_id::<Report>(&id)?;
    let payload: ReportPayload = parse_body(&body)?;
    Ok(Json(state.reports.update(id, payload, &actor).await?))
}

pub async fn delete_report(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id::<Report>(&id)?;
    state.reports.delete(id, &actor).await?;
    Ok(Json(json!({ "message": "Report removed" })))
}
