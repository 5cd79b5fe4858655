//! Orchestration between the HTTP boundary and the store: validation,
//! actor stamping, timestamps, the stage transition and reporting.

mod clients;
mod interactions;
mod statistics;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::db::{CrmStore, StoreError};
use crate::models::{generate_token, hash_token, FieldErrors, NewUser, User};

pub use clients::ClientDetail;
pub use crate::models::{StageCounts, Statistics};

/// Errors surfaced to the API boundary
#[derive(Debug, Error)]
pub enum ServiceError {
    /// One or more request fields were rejected
    #[error("validation failed")]
    Validation(FieldErrors),

    /// The request as a whole was rejected
    #[error("{0}")]
    Invalid(String),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServiceError::NotFound,
            StoreError::EmailTaken => ServiceError::Validation(FieldErrors::single(
                "email",
                "client with this email already exists.",
            )),
            StoreError::UsernameTaken => ServiceError::Validation(FieldErrors::single(
                "username",
                "A user with that username already exists.",
            )),
            other => ServiceError::Store(other),
        }
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Details for a user provisioned out of band
#[derive(Debug, Clone, Default)]
pub struct UserRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Clone)]
pub struct CrmService {
    store: Arc<dyn CrmStore>,
}

impl CrmService {
    pub fn new(store: Arc<dyn CrmStore>) -> Self {
        Self { store }
    }

    /// Resolve a bearer token to its user
    pub async fn authenticate(&self, token: &str) -> ServiceResult<Option<User>> {
        let user = self.store.find_user_by_token_hash(&hash_token(token)).await?;
        Ok(user)
    }

    /// Create a user and return it with its bearer token. The token is not
    /// stored and cannot be recovered later.
    pub async fn create_user(&self, request: UserRequest) -> ServiceResult<(User, String)> {
        let username = request.username.trim().to_string();
        if username.is_empty() {
            return Err(FieldErrors::single("username", "This field may not be blank.").into());
        }

        let token = generate_token();
        let user = self
            .store
            .create_user(&NewUser {
                username,
                email: request.email,
                first_name: request.first_name,
                last_name: request.last_name,
                token_hash: hash_token(&token),
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user created");
        Ok((user, token))
    }

    pub async fn delete_user(&self, username: &str) -> ServiceResult<()> {
        self.store.delete_user(username).await?;
        info!(%username, "user deleted");
        Ok(())
    }

    /// Maps a dangling user reference to a field error
    async fn ensure_user(&self, field: &str, id: i32) -> ServiceResult<()> {
        match self.store.get_user(id).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(dangling(field, id)),
            Err(err) => Err(err.into()),
        }
    }
}

fn dangling(field: &str, id: i32) -> ServiceError {
    ServiceError::Validation(FieldErrors::single(
        field,
        format!("Invalid pk \"{id}\" - object does not exist."),
    ))
}
