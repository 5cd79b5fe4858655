use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::Value;

use super::auth::Actor;
use super::error::ApiError;
use super::extract::{ApiJson, ApiPath, ApiQuery};
use super::projections::{ClientDetailView, ClientListItem};
use super::AppState;
use crate::models::{ClientPayload, Completeness};

#[derive(Debug, Deserialize)]
pub struct StageQuery {
    pub stage: Option<String>,
}

fn list_items(clients: Vec<crate::models::Client>) -> Json<Vec<ClientListItem>> {
    Json(clients.into_iter().map(ClientListItem::from).collect())
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<ClientListItem>>, ApiError> {
    let clients = state.service.list_clients().await?;
    Ok(list_items(clients))
}

pub async fn by_stage(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StageQuery>,
) -> Result<Json<Vec<ClientListItem>>, ApiError> {
    let clients = state
        .service
        .clients_by_stage(query.stage.as_deref())
        .await?;
    Ok(list_items(clients))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    ApiJson(payload): ApiJson<ClientPayload>,
) -> Result<(StatusCode, Json<ClientDetailView>), ApiError> {
    let detail = state.service.create_client(&actor, payload).await?;
    Ok((StatusCode::CREATED, Json(detail.into())))
}

pub async fn retrieve(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Json<ClientDetailView>, ApiError> {
    let detail = state.service.get_client(id).await?;
    Ok(Json(detail.into()))
}

pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ClientPayload>,
) -> Result<Json<ClientDetailView>, ApiError> {
    let detail = state
        .service
        .update_client(id, payload, Completeness::Full)
        .await?;
    Ok(Json(detail.into()))
}

pub async fn partial_update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<ClientPayload>,
) -> Result<Json<ClientDetailView>, ApiError> {
    let detail = state
        .service
        .update_client(id, payload, Completeness::Partial)
        .await?;
    Ok(Json(detail.into()))
}

pub async fn destroy(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_client(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `{"stage": ...}`. A request with no body at all counts as a missing stage;
/// a body that is not JSON is rejected like any other.
pub async fn update_stage(
    State(state): State<AppState>,
    Extension(Actor(actor)): Extension<Actor>,
    ApiPath(id): ApiPath<i32>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ClientDetailView>, ApiError> {
    let body = match body {
        Ok(Json(body)) => Some(body),
        Err(_) if !has_body(&headers) => None,
        Err(rejection) => return Err(rejection.into()),
    };
    let requested = body
        .as_ref()
        .and_then(|body| body.get("stage"))
        .and_then(Value::as_str);
    let detail = state.service.update_stage(&actor, id, requested).await?;
    Ok(Json(detail.into()))
}

fn has_body(headers: &HeaderMap) -> bool {
    headers.contains_key(header::TRANSFER_ENCODING)
        || headers
            .get(header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .is_some_and(|len| len.trim() != "0")
}
