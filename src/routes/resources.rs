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
use crate::models::{Resource, ResourceFilter, ResourcePayload};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub resource_type: Option<String>,
}

pub async fn list_resources(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Resource>>, AppError> {
    let filter = ResourceFilter::from_params(params.status, params.resource_type)?;
    Ok(Json(state.resources.list(&filter).await?))
}

pub async fn nearby_resources(
    State(state): State<AppState>,
    Query(params): Query<NearbyParams>,
) -> Result<Json<Vec<Resource>>, AppError> {
    let query = params.into_query(state.config.nearby_default_distance_km)?;
    Ok(Json(state.resources.nearby(&query).await?))
}

pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Resource>, AppError> {
    let id = parse_id::<Resource>(&id)?;
    Ok(Json(state.resources.get(id).await?))
}

pub async fn create_resource(
    State(state): State<AppState>,
    actor: Actor,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let payload: ResourcePayload = parse_body(&body)?;
    let resource = state.resources.create(payload, &actor).await?;
    Ok((StatusCode::CREATED, Json(resource)))
}

pub async fn update_resource(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Resource>, AppError> {
    let id = parse_id::<Resource>(&id)?;
    let payload: ResourcePayload = parse_body(&body)?;
    Ok(Json(state.resources.update(id, payload, &actor).await?))
}

pub async fn delete_resource(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id::<Resource>(&id)?;
    state.resources.delete(id, &actor).await?;
    Ok(Json(json!({ "message": "Resource removed" })))
}
