use chrono::Utc;
use tracing::info;

use super::{CrmService, ServiceError, ServiceResult};
use crate::models::{
    Client, ClientInteraction, ClientPayload, Completeness, NewClient, NewInteraction, Stage, User,
};

/// A client together with its interactions, newest first
#[derive(Debug, Clone, PartialEq)]
pub struct ClientDetail {
    pub client: Client,
    pub interactions: Vec<ClientInteraction>,
}

impl CrmService {
    pub async fn list_clients(&self) -> ServiceResult<Vec<Client>> {
        Ok(self.store.list_clients(None).await?)
    }

    /// Clients whose stage is exactly `stage`; an absent or empty value
    /// lists everything and an unknown stage name matches nothing.
    pub async fn clients_by_stage(&self, stage: Option<&str>) -> ServiceResult<Vec<Client>> {
        match stage.filter(|raw| !raw.is_empty()) {
            None => self.list_clients().await,
            Some(raw) => match raw.parse::<Stage>() {
                Ok(stage) => Ok(self.store.list_clients(Some(stage)).await?),
                Err(_) => Ok(Vec::new()),
            },
        }
    }

    pub async fn get_client(&self, id: i32) -> ServiceResult<ClientDetail> {
        let client = self.store.get_client(id).await?;
        self.with_interactions(client).await
    }

    /// Create a client on behalf of `actor`, who always becomes `created_by`
    pub async fn create_client(
        &self,
        actor: &User,
        payload: ClientPayload,
    ) -> ServiceResult<ClientDetail> {
        let changes = payload.validate(Completeness::Full)?;
        if let Some(Some(assignee)) = changes.assigned_to {
            self.ensure_user("assigned_to", assignee).await?;
        }

        let new = NewClient::from_changes(changes, actor.id, Utc::now());
        let client = self.store.create_client(&new).await?;

        info!(client_id = client.id, actor = %actor.username, "client created");
        self.with_interactions(client).await
    }

    /// Full (`PUT`) or partial (`PATCH`) update of the writable fields
    pub async fn update_client(
        &self,
        id: i32,
        payload: ClientPayload,
        completeness: Completeness,
    ) -> ServiceResult<ClientDetail> {
        let mut client = self.store.get_client(id).await?;
        let changes = payload.validate(completeness)?;
        if let Some(Some(assignee)) = changes.assigned_to {
            self.ensure_user("assigned_to", assignee).await?;
        }

        client.apply(changes, Utc::now());
        let client = self.store.update_client(&client).await?;

        info!(client_id = client.id, "client updated");
        self.with_interactions(client).await
    }

    pub async fn delete_client(&self, id: i32) -> ServiceResult<()> {
        self.store.delete_client(id).await?;
        info!(client_id = id, "client deleted");
        Ok(())
    }

    /// Move a client to `requested` and record a NOTE interaction naming the
    /// old stage, the new stage and the actor. Runs even when the stage does
    /// not change; an unknown stage fails before anything is written.
    pub async fn update_stage(
        &self,
        actor: &User,
        id: i32,
        requested: Option<&str>,
    ) -> ServiceResult<ClientDetail> {
        let client = self.store.get_client(id).await?;
        let stage = requested
            .and_then(|raw| raw.parse::<Stage>().ok())
            .ok_or_else(|| ServiceError::Invalid(Stage::invalid_message()))?;

        let previous = client.stage;
        let note = NewInteraction::stage_change(
            client.id,
            previous,
            stage,
            actor.id,
            &actor.username,
            Utc::now(),
        );
        let client = self.store.change_stage(client.id, stage, &note).await?;

        info!(
            client_id = client.id,
            from = %previous,
            to = %stage,
            actor = %actor.username,
            "client stage updated"
        );
        self.with_interactions(client).await
    }

    async fn with_interactions(&self, client: Client) -> ServiceResult<ClientDetail> {
        let interactions = self.store.list_interactions(Some(client.id)).await?;
        Ok(ClientDetail {
            client,
            interactions,
        })
    }
}
