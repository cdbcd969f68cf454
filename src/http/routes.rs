use axum::extract::{FromRef, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::catalog::ExerciseCatalog;
use crate::gate::{GateError, Gatekeeper};
use crate::identity::{Identity, IdentityResolver};
use crate::ratelimit::Operation;

/// Body part list lookups.
pub const BODY_PARTS: Operation = Operation::new("exercises:bodyParts", 60, 60);
/// Target muscle and equipment list lookups.
pub const LISTS: Operation = Operation::new("exercises:lists", 60, 60);

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub catalog: Arc<dyn ExerciseCatalog>,
    pub identity: IdentityResolver,
}

impl AppState {
    pub fn new(
        gatekeeper: Arc<Gatekeeper>,
        catalog: Arc<dyn ExerciseCatalog>,
        identity: IdentityResolver,
    ) -> Self {
        Self {
            gatekeeper,
            catalog,
            identity,
        }
    }
}

impl FromRef<AppState> for IdentityResolver {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyPartsResponse {
    pub body_parts: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ListsResponse {
    pub targets: Vec<String>,
    pub equipment: Vec<String>,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/exercises/body-parts", get(body_parts_handler))
        .route("/api/exercises/lists", get(lists_handler))
        .with_state(state)
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn body_parts_handler(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<BodyPartsResponse>, GateError> {
    let catalog = state.catalog.clone();
    let body_parts = state
        .gatekeeper
        .guard(&BODY_PARTS, &identity, || async move { catalog.body_parts().await })
        .await?;

    Ok(Json(BodyPartsResponse { body_parts }))
}

async fn lists_handler(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<Json<ListsResponse>, GateError> {
    let catalog = state.catalog.clone();
    let (targets, equipment) = state
        .gatekeeper
        .guard(&LISTS, &identity, || async move {
            tokio::try_join!(catalog.targets(), catalog.equipment())
        })
        .await?;

    Ok(Json(ListsResponse { targets, equipment }))
}
