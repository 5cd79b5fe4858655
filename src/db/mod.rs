#[cfg(test)]
mod contract;
mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{
    Client, ClientInteraction, NewClient, NewInteraction, NewUser, Stage, StatisticsCounts, User,
};

pub use memory::MemoryStore;
pub use postgres::{init, Database};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed row does not exist
    #[error("record not found")]
    NotFound,

    /// Another client already uses this email
    #[error("client email already in use")]
    EmailTaken,

    /// Another user already uses this username
    #[error("username already in use")]
    UsernameTaken,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent storage for users, clients and their interactions.
///
/// Lists come back newest first. Deleting a client removes its interactions;
/// deleting a user clears every reference to it.
#[async_trait]
pub trait CrmStore: Send + Sync {
    // User operations
    async fn create_user(&self, user: &NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: i32) -> StoreResult<User>;
    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>>;
    async fn delete_user(&self, username: &str) -> StoreResult<()>;

    // Client operations
    async fn list_clients(&self, stage: Option<Stage>) -> StoreResult<Vec<Client>>;
    async fn get_client(&self, id: i32) -> StoreResult<Client>;
    async fn create_client(&self, client: &NewClient) -> StoreResult<Client>;
    async fn update_client(&self, client: &Client) -> StoreResult<Client>;
    async fn delete_client(&self, id: i32) -> StoreResult<()>;

    /// Sets the stage and records `note` atomically; `updated_at` takes the
    /// note's timestamp
    async fn change_stage(
        &self,
        id: i32,
        stage: Stage,
        note: &NewInteraction,
    ) -> StoreResult<Client>;

    // Interaction operations
    async fn list_interactions(&self, client_id: Option<i32>) -> StoreResult<Vec<ClientInteraction>>;
    async fn get_interaction(&self, id: i32) -> StoreResult<ClientInteraction>;
    async fn create_interaction(&self, interaction: &NewInteraction) -> StoreResult<ClientInteraction>;
    async fn update_interaction(&self, interaction: &ClientInteraction) -> StoreResult<ClientInteraction>;
    async fn delete_interaction(&self, id: i32) -> StoreResult<()>;

    // Reporting
    /// Counts behind the statistics rollup; rows created at or after `since`
    /// count as recent
    async fn statistics(&self, since: DateTime<Utc>) -> StoreResult<StatisticsCounts>;
}
