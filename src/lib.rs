//! Client relationship management backend: clients, their interactions,
//! stage transitions with an audit trail, and a statistics rollup, served
//! over HTTP.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod service;

pub use api::{build_router, AppState};
pub use db::{CrmStore, Database, MemoryStore};
pub use service::CrmService;
