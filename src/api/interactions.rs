use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;

use super::auth::Actor;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::projections::InteractionView;
use super::AppState;
use crate::models::{Completeness, InteractionPayload};

#[derive(Debug, Deserialize)]
pub struct InteractionQuery {
    pub client: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<InteractionQuery>,
) -> Result<Json<Vec<InteractionView>>, ApiError> {
    let interactions = state
        .service
        .list_interactions(query.client.as_deref())
        .await?;
    Ok(Json(interactions.into_iter().map(InteractionView::from).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    ApiJson(payload): ApiJson<InteractionPayload>,
) -> Result<(StatusCode, Json<InteractionView>), ApiError> {
    let interaction = state.service.create_interaction(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(interaction.into())))
}

pub async fn retrieve(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<InteractionView>, ApiError> {
    let interaction = state.service.get_interaction(id).await?;
    Ok(Json(interaction.into()))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<InteractionPayload>,
) -> Result<Json<InteractionView>, ApiError> {
    let interaction = state
        .service
        .update_interaction(id, payload, Completeness::Full)
        .await?;
    Ok(Json(interaction.into()))
}

pub async fn partial_update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<InteractionPayload>,
) -> Result<Json<InteractionView>, ApiError> {
    let interaction = state
        .service
        .update_interaction(id, payload, Completeness::Partial)
        .await?;
    Ok(Json(interaction.into()))
}

pub async fn destroy(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_interaction(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
