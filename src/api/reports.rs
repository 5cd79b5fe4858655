use axum::extract::State;
use axum::{Extension, Json};
use serde_json::{json, Value};

use super::auth::Actor;
use super::error::ApiError;
use super::projections::UserView;
use super::AppState;
use crate::service::Statistics;

pub async fn statistics(State(state): State<AppState>) -> Result<Json<Statistics>, ApiError> {
    Ok(Json(state.service.statistics().await?))
}

pub async fn current_user(Extension(Actor(actor)): Extension<Actor>) -> Json<UserView> {
    Json(actor.into())
}

pub async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}
