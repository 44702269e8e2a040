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
use crate::models::{Alert, AlertFilter, AlertPayload};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let filter = AlertFilter::from_params(params.status, params.alert_type)?;
    Ok(Json(state.alerts.list(&filter).await?))
}

pub async fn nearby_alerts(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<Alert>>, AppError> {
    let query = params.into_query(state.config.nearby_default_distance_km)?;
    Ok(Json(state.alerts.nearby(&query).await?))
}

pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Alert>, AppError> {
    let id = parse_id::<Alert>(&id)?;
    Ok(Json(state.alerts.get(id).await?))
}

pub async fn create_alert(
    State(state): State<AppState>,
    actor: Actor,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: AlertPayload = parse_body(&body)?;
    let alert = state.alerts.create(payload, &actor).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

pub async fn update_alert(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Alert>, AppError> {
    let id = parse_id::<Alert>(&id)?;
    let payload: AlertPayload = parse_body(&body)?;
    Ok(Json(state.alerts.update(id, payload, &actor).await?))
}

pub async fn delete_alert(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id::<Alert>(&id)?;
    state.alerts.delete(id, &actor).await?;
    Ok(Json(json!({ "message": "Alert removed" })))
}
