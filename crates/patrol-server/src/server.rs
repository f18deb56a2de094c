//! HTTP server implementation using axum.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use patrol_core::{Coordinate, Geofence, Identity, LocationUpdate, NewPatrol, Patrol, PatrolId, Role};
use patrol_hub::BroadcastHub;
use patrol_registry::{GeofenceStore, PatrolRegistry};
use patrol_telemetry::Metrics;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::auth::{bearer_token, Authorizer, TokenAuthorizer};
use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult, AppResult};
use crate::pipeline::UpdatePipeline;
use crate::ws::ws_handler;

/// Shared application state for axum handlers.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<PatrolRegistry>,
    geofences: Arc<GeofenceStore>,
    hub: Arc<BroadcastHub>,
    authorizer: Arc<dyn Authorizer>,
    pipeline: Arc<UpdatePipeline>,
}

impl AppState {
    pub fn new(
        registry: Arc<PatrolRegistry>,
        hub: Arc<BroadcastHub>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let pipeline = Arc::new(UpdatePipeline::new(
            Arc::clone(&registry),
            Arc::clone(&hub),
            Arc::clone(&authorizer),
        ));
        Self {
            registry,
            geofences: Arc::new(GeofenceStore::new()),
            hub,
            authorizer,
            pipeline,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let authorizer = TokenAuthorizer::from_config(&config.auth);
        if authorizer.is_empty() {
            tracing::warn!("No auth tokens configured, every protected route will return 401");
        }
        Self::new(
            Arc::new(PatrolRegistry::with_threshold(config.route.threshold)),
            Arc::new(BroadcastHub::new(config.hub.clone())),
            Arc::new(authorizer),
        )
    }

    pub fn registry(&self) -> &Arc<PatrolRegistry> {
        &self.registry
    }

    pub fn geofences(&self) -> &Arc<GeofenceStore> {
        &self.geofences
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn pipeline(&self) -> &Arc<UpdatePipeline> {
        &self.pipeline
    }

    fn authorize(&self, headers: &HeaderMap, minimum: Role) -> ApiResult<Identity> {
        Ok(self.authorizer.authorize(bearer_token(headers), minimum)?)
    }
}

/// Create the axum router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/users/me", get(current_user))
        .route("/patrols", get(list_patrols))
        .route("/patrols/", get(list_patrols))
        .route("/patrols/create", post(create_patrol))
        .route("/patrols/{id}", get(get_patrol))
        .route("/patrols/{id}/update", post(update_patrol))
        .route("/geofences", get(list_geofences))
        .route("/geofences/", get(list_geofences))
        .route("/geofences/create", post(create_geofence))
        .route("/geofences/containing", get(containing_geofences))
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Prometheus text exposition.
async fn metrics() -> ApiResult<Response> {
    let body = Metrics::render().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
        .into_response())
}

async fn current_user(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Identity>> {
    Ok(Json(state.authorize(&headers, Role::ViewOnly)?))
}

async fn create_patrol(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NewPatrol>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Patrol>)> {
    let identity = state.authorize(&headers, Role::PatrolComd)?;
    let Json(request) = body?;
    request.validate()?;

    let patrol = state.registry.create(request);
    Metrics::patrol_created();
    info!(
        patrol_id = %patrol.id,
        unit = %patrol.unit,
        route_name = %patrol.route_name,
        waypoints = patrol.route.len(),
        user = %identity.username,
        "Patrol created"
    );
    Ok((StatusCode::CREATED, Json(patrol)))
}

async fn list_patrols(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Patrol>>> {
    state.authorize(&headers, Role::PatrolMember)?;
    Ok(Json(state.registry.list()))
}

async fn get_patrol(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<PatrolId>, PathRejection>,
) -> ApiResult<Json<Patrol>> {
    state.authorize(&headers, Role::PatrolMember)?;
    let Path(id) = path?;
    Ok(Json(state.registry.get(id)?))
}

async fn update_patrol(
    State(state): State<AppState>,
    headers: HeaderMap,
    path: Result<Path<PatrolId>, PathRejection>,
    body: Result<Json<LocationUpdate>, JsonRejection>,
) -> ApiResult<Json<Patrol>> {
    let credential = bearer_token(&headers);

    let parsed = path
        .map_err(ApiError::from)
        .and_then(|Path(id)| body.map(|Json(update)| (id, update)).map_err(ApiError::from));
    let (id, update) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            // A bad request from an unauthorized caller is still a 401/403.
            state.pipeline.authorize(credential)?;
            Metrics::update_rejected(e.reason());
            return Err(e);
        }
    };

    Ok(Json(state.pipeline.submit(credential, id, update).await?))
}

async fn create_geofence(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Geofence>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Geofence>)> {
    let identity = state.authorize(&headers, Role::HqOps)?;
    let Json(fence) = body?;
    fence.validate()?;

    let replaced = state.geofences.upsert(fence.clone());
    info!(
        name = %fence.name,
        points = fence.points.len(),
        replaced,
        user = %identity.username,
        "Geofence stored"
    );
    Ok((StatusCode::CREATED, Json(fence)))
}

async fn list_geofences(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<Geofence>>> {
    state.authorize(&headers, Role::PatrolMember)?;
    Ok(Json(state.geofences.list()))
}

#[derive(Debug, Deserialize)]
struct PointQuery {
    lat: f64,
    lon: f64,
}

/// Names of the geofences that contain `?lat=&lon=`.
async fn containing_geofences(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<PointQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<String>>> {
    state.authorize(&headers, Role::PatrolMember)?;
    let Query(PointQuery { lat, lon }) = query?;
    let point = Coordinate::new(lat, lon);
    point.validate()?;
    Ok(Json(state.geofences.containing(point)))
}

/// Serve `state` on an already-bound listener until the future is dropped.
pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    axum::serve(listener, create_router(state)).await
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run_server(config: AppConfig) -> AppResult<()> {
    let state = AppState::from_config(&config);
    let app = create_router(state);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(
        addr = %listener.local_addr()?,
        threshold = config.route.threshold,
        max_observers = config.hub.max_observers,
        tokens = config.auth.tokens.len(),
        "Starting patrol server"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Patrol server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
