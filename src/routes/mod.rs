use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::AppError;
use crate::geo::NearbyQuery;
use crate::state::AppState;

pub mod alerts;
pub mod reports;
pub mod resources;
pub mod socket;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health))
        .route(
            "/api/alerts",
            get(alerts::list_alerts).post(alerts::create_alert),
        )
        .route("/api/alerts/nearby", get(alerts::nearby_alerts))
        .route(
            "/api/alerts/{id}",
            get(alerts::get_alert)
                .put(alerts::update_alert)
                .patch(alerts::update_alert)
                .delete(alerts::delete_alert),
        )
        .route(
            "/api/resources",
            get(resources::list_resources).post(resources::create_resource),
        )
        .route("/api/resources/nearby", get(resources::nearby_resources))
        .route(
            "/api/resources/{id}",
            get(resources::get_resource)
                .put(resources::update_resource)
                .patch(resources::update_resource)
                .delete(resources::delete_resource),
        )
        .route(
            "/api/reports",
            get(reports::list_reports).post(reports::create_report),
        )
        .route("/api/reports/nearby", get(reports::nearby_reports))
        .route(
            "/api/reports/{id}",
            get(reports::get_report)
                .put(reports::update_report)
                .patch(reports::update_report)
                .delete(reports::delete_report),
        )
        .route("/ws", get(socket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Query string of the proximity endpoints: `lng`, `lat` and `distance` in kilometers.
#[derive(Debug, Default, Deserialize)]
pub struct NearbyParams {
    pub lng: Option<String>,
    pub lat: Option<String>,
    pub distance: Option<String>,
}

impl NearbyParams {
    pub fn into_query(self, default_distance_km: f64) -> Result<NearbyQuery, AppError> {
        NearbyQuery::from_params(
            self.lng.as_deref(),
            self.lat.as_deref(),
            self.distance.as_deref(),
            default_distance_km,
        )
    }
}

/// Bodies are decoded by hand so a malformed body is a 400 with the usual error shape.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::validation("Request body is empty"));
    }
    serde_json::from_slice(body).map_err(|e| AppError::validation(format!("Invalid JSON body: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::testing::{token_for, SECRET};
    use crate::auth::Role;
    use crate::cache::{MergeOutcome, ReconciliationCache};
    use crate::config::AppConfig;
    use crate::models::Alert;
    use crate::protocol::ServerFrame;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        response::Response,
    };
    use tower::ServiceExt;

    fn app() -> (AppState, Router) {
        let state = AppState::in_memory(AppConfig::in_memory(SECRET));
        let router = build_router(state.clone());
        (state, router)
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        match body {
            Some(body) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response: Response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    fn flood() -> Value {
        json!({
            "title": "Flood Warning",
            "description": "River expected to crest tonight",
            "type": "Flood",
            "severity": "High",
            "location": { "type": "Point", "coordinates": [-80.19, 25.76], "address": "Miami, FL" }
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (_, router) = app();
        let (status, body) = send(&router, request(Method::GET, "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_requires_token() {
        let (_, router) = app();
        let (status, body) =
            send(&router, request(Method::POST, "/api/alerts", None, Some(flood()))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Not authorized, no token");

        let (status, _) = send(
            &router,
            request(Method::POST, "/api/alerts", Some("not-a-jwt"), Some(flood())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_get_and_list() {
        let (_, router) = app();
        let token = token_for("u1", Role::User);

        let (status, created) = send(
            &router,
            request(Method::POST, "/api/alerts", Some(&token), Some(flood())),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "Active");
        assert_eq!(created["createdBy"], "u1");
        assert_eq!(created["location"]["type"], "Point");

        let id = created["id"].as_str().unwrap().to_string();
        let (status, fetched) = send(
            &router,
            request(Method::GET, &format!("/api/alerts/{id}"), None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (_, listed) = send(
            &router,
            request(Method::GET, "/api/alerts?status=Active&type=Flood", None, None),
        )
        .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = send(
            &router,
            request(Method::GET, "/api/alerts?status=Gone", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_invalid_bodies_are_bad_requests() {
        let (_, router) = app();
        let token = token_for("u1", Role::User);

        let (status, body) = send(
            &router,
            request(Method::POST, "/api/alerts", Some(&token), Some(json!({ "type": "Flood" }))),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please add a title");

        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/alerts")
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::from("{oops"))
            .unwrap();
        let (status, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_or_malformed_id_is_not_found() {
        let (_, router) = app();
        let (status, body) = send(
            &router,
            request(Method::GET, "/api/alerts/not-a-uuid", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Alert not found");

        let uri = format!("/api/resources/{}", uuid::Uuid::new_v4());
        let (status, body) = send(&router, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Resource not found");
    }

    #[tokio::test]
    async fn test_update_ownership() {
        let (state, router) = app();
        let owner = token_for("owner", Role::User);
        let (_, created) = send(
            &router,
            request(Method::POST, "/api/alerts", Some(&owner), Some(flood())),
        )
        .await;
        let uri = format!("/api/alerts/{}", created["id"].as_str().unwrap());

        let mut sub = state.bus().subscribe();
        let stranger = token_for("stranger", Role::Responder);
        let (status, body) = send(
            &router,
            request(Method::PUT, &uri, Some(&stranger), Some(json!({ "status": "Resolved" }))),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized to update this alert");

        let (_, current) = send(&router, request(Method::GET, &uri, None, None)).await;
        assert_eq!(current, created);
        assert_eq!(sub.try_recv(), None);

        let (status, updated) = send(
            &router,
            request(Method::PATCH, &uri, Some(&owner), Some(json!({ "status": "Resolved" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "Resolved");
        assert_eq!(updated["version"], 2);
    }

    #[tokio::test]
    async fn test_delete_is_admin_only() {
        let (_, router) = app();
        let owner = token_for("owner", Role::User);
        let admin = token_for("root", Role::Admin);
        let (_, created) = send(
            &router,
            request(Method::POST, "/api/alerts", Some(&owner), Some(flood())),
        )
        .await;
        let uri = format!("/api/alerts/{}", created["id"].as_str().unwrap());

        let (status, _) = send(&router, request(Method::DELETE, &uri, Some(&owner), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&router, request(Method::DELETE, &uri, Some(&admin), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Alert removed");

        let (status, _) = send(&router, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_nearby() {
        let (_, router) = app();
        let token = token_for("u1", Role::User);
        send(
            &router,
            request(Method::POST, "/api/alerts", Some(&token), Some(flood())),
        )
        .await;

        let (status, body) = send(
            &router,
            request(Method::GET, "/api/alerts/nearby?lat=25.76", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Please provide longitude and latitude coordinates");

        let (status, hits) = send(
            &router,
            request(Method::GET, "/api/alerts/nearby?lng=-80.2&lat=25.77&distance=5", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(hits.as_array().unwrap().len(), 1);

        let (_, hits) = send(
            &router,
            request(Method::GET, "/api/alerts/nearby?lng=-0.12&lat=51.5", None, None),
        )
        .await;
        assert!(hits.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resource_routes() {
        let (_, router) = app();
        let token = token_for("org", Role::Responder);
        let (status, created) = send(
            &router,
            request(
                Method::POST,
                "/api/resources",
                Some(&token),
                Some(json!({
                    "name": "Generators",
                    "type": "Equipment",
                    "quantity": 4,
                    "unit": "units",
                    "location": { "coordinates": [-80.19, 25.76], "address": "Miami, FL" }
                })),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "Available");

        let (_, hits) = send(
            &router,
            request(Method::GET, "/api/resources/nearby?lng=-80.19&lat=25.76", None, None),
        )
        .await;
        assert_eq!(hits.as_array().unwrap().len(), 1);

        let (_, listed) = send(
            &router,
            request(Method::GET, "/api/resources?type=Water", None, None),
        )
        .await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_report_routes() {
        let (_, router) = app();
        let citizen = token_for("citizen", Role::User);
        let alert_id = uuid::Uuid::new_v4();
        let report = json!({
            "title": "Road washed out",
            "description": "Route 9 impassable",
            "type": "Resource Request",
            "location": { "coordinates": [-72.58, 42.10], "address": "Springfield, MA" },
            "relatedAlert": alert_id.to_string()
        });

        let (status, _) = send(
            &router,
            request(Method::POST, "/api/reports", None, Some(report.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, created) = send(
            &router,
            request(Method::POST, "/api/reports", Some(&citizen), Some(report)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "Pending");
        assert_eq!(created["media"], json!([]));
        assert_eq!(created["relatedAlert"], alert_id.to_string());
        let uri = format!("/api/reports/{}", created["id"].as_str().unwrap());

        let list_uri = format!("/api/reports?type=Resource%20Request&alert={alert_id}");
        let (status, listed) = send(&router, request(Method::GET, &list_uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed, json!([created.clone()]));

        let (_, listed) = send(
            &router,
            request(Method::GET, "/api/reports?status=Verified", None, None),
        )
        .await;
        assert!(listed.as_array().unwrap().is_empty());

        let neighbour = token_for("neighbour", Role::User);
        let (status, body) = send(
            &router,
            request(Method::PUT, &uri, Some(&neighbour), Some(json!({ "status": "Rejected" }))),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized to update this report");

        let responder = token_for("medic", Role::Responder);
        let (status, updated) = send(
            &router,
            request(Method::PATCH, &uri, Some(&responder), Some(json!({ "status": "Verified" }))),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["status"], "Verified");
        assert_eq!(updated["createdBy"], "citizen");

        let (status, body) = send(&router, request(Method::DELETE, &uri, Some(&responder), None)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Not authorized to delete this report");

        let (status, body) = send(&router, request(Method::DELETE, &uri, Some(&citizen), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Report removed");

        let (status, body) = send(&router, request(Method::GET, &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Report not found");
    }

    /// Two connected clients each get exactly one update and hold an identical record.
    #[tokio::test]
    async fn test_connected_clients_converge() {
        let (state, router) = app();
        let mut first = state.bus().subscribe();
        let mut second = state.bus().subscribe();
        let mut first_cache = ReconciliationCache::default();
        let mut second_cache = ReconciliationCache::default();

        let token = token_for("u1", Role::User);
        let (_, created) = send(
            &router,
            request(Method::POST, "/api/alerts", Some(&token), Some(flood())),
        )
        .await;
        let created: Alert = serde_json::from_value(created).unwrap();

        for (sub, cache) in [(&mut first, &mut first_cache), (&mut second, &mut second_cache)] {
            let event = sub.recv().await.unwrap();
            assert_eq!(sub.try_recv(), None);
            let frame = ServerFrame::from(event).to_json().unwrap();
            assert_eq!(cache.apply_frame(&frame), MergeOutcome::Inserted { position: 0 });
        }

        let a = first_cache.get(created.id).cloned();
        let b = second_cache.get(created.id).cloned();
        assert_eq!(a, Some(created));
        assert_eq!(a, b);
    }
}
