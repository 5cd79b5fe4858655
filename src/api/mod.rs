//! HTTP boundary: routing, authentication and the error envelope.

mod auth;
mod clients;
mod error;
mod extract;
mod interactions;
mod middleware;
mod projections;
mod reports;

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, patch};
use axum::Router;

use crate::db::CrmStore;
use crate::service::CrmService;

pub use auth::Actor;
pub use error::{ApiError, INTERNAL_MESSAGE};
pub use projections::{ClientDetailView, ClientListItem, InteractionView, UserView};

#[derive(Clone)]
pub struct AppState {
    pub service: CrmService,
}

impl AppState {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self {
            service: CrmService::new(store),
        }
    }
}

/// Every `/api` route requires a bearer token; `/healthz` does not.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/clients/", get(clients::list).post(clients::create))
        .route("/clients/by_stage/", get(clients::by_stage))
        .route(
            "/clients/:id/",
            get(clients::retrieve)
                .put(clients::update)
                .patch(clients::partial_update)
                .delete(clients::destroy),
        )
        .route("/clients/:id/update_stage/", patch(clients::update_stage))
        .route(
            "/interactions/",
            get(interactions::list).post(interactions::create),
        )
        .route(
            "/interactions/:id/",
            get(interactions::retrieve)
                .put(interactions::update)
                .patch(interactions::partial_update)
                .delete(interactions::destroy),
        )
        .route("/statistics/", get(reports::statistics))
        .route("/me/", get(reports::current_user))
        .route_layer(from_fn_with_state(state.clone(), auth::require_actor));

    Router::new()
        .route("/healthz", get(reports::healthz))
        .nest("/api", api)
        .fallback(reports::not_found)
        .layer(from_fn(middleware::envelope_fallbacks))
        .layer(from_fn(middleware::request_tracing))
        .with_state(state)
}
