use chrono::Utc;
use tracing::info;

use super::{dangling, CrmService, ServiceError, ServiceResult};
use crate::db::StoreError;
use crate::models::{
    ClientInteraction, Completeness, FieldErrors, InteractionPayload, NewInteraction, User,
};

impl CrmService {
    /// All interactions, or only those of the client named by `client`.
    /// An absent or empty value lists everything.
    pub async fn list_interactions(
        &self,
        client: Option<&str>,
    ) -> ServiceResult<Vec<ClientInteraction>> {
        let client_id = match client.map(str::trim).filter(|raw| !raw.is_empty()) {
            None => None,
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                ServiceError::Validation(FieldErrors::single("client", "A valid integer is required."))
            })?),
        };

        Ok(self.store.list_interactions(client_id).await?)
    }

    pub async fn get_interaction(&self, id: i32) -> ServiceResult<ClientInteraction> {
        Ok(self.store.get_interaction(id).await?)
    }

    /// Record an interaction on behalf of `actor`, who always becomes
    /// `created_by`
    pub async fn create_interaction(
        &self,
        actor: &User,
        payload: InteractionPayload,
    ) -> ServiceResult<ClientInteraction> {
        let changes = payload.validate(Completeness::Full)?;
        if let Some(client_id) = changes.client_id {
            self.ensure_client(client_id).await?;
        }

        let new = NewInteraction::from_changes(changes, actor.id, Utc::now());
        let interaction = self
            .store
            .create_interaction(&new)
            .await
            .map_err(|err| on_missing_client(err, new.client_id))?;

        info!(
            interaction_id = interaction.id,
            client_id = interaction.client_id,
            kind = %interaction.interaction_type,
            actor = %actor.username,
            "interaction created"
        );
        Ok(interaction)
    }

    pub async fn update_interaction(
        &self,
        id: i32,
        payload: InteractionPayload,
        completeness: Completeness,
    ) -> ServiceResult<ClientInteraction> {
        let mut interaction = self.store.get_interaction(id).await?;
        let changes = payload.validate(completeness)?;
        if let Some(client_id) = changes.client_id {
            self.ensure_client(client_id).await?;
        }

        interaction.apply(changes);
        let interaction = self
            .store
            .update_interaction(&interaction)
            .await
            .map_err(|err| on_missing_client(err, interaction.client_id))?;

        info!(interaction_id = interaction.id, "interaction updated");
        Ok(interaction)
    }

    pub async fn delete_interaction(&self, id: i32) -> ServiceResult<()> {
        self.store.delete_interaction(id).await?;
        info!(interaction_id = id, "interaction deleted");
        Ok(())
    }

    async fn ensure_client(&self, id: i32) -> ServiceResult<()> {
        match self.store.get_client(id).await {
            Ok(_) => Ok(()),
            Err(StoreError::NotFound) => Err(dangling("client", id)),
            Err(err) => Err(err.into()),
        }
    }
}

/// The parent client can vanish between the existence check and the write
fn on_missing_client(err: StoreError, client_id: i32) -> ServiceError {
    match err {
        StoreError::NotFound => dangling("client", client_id),
        other => other.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::service_with_user;
    use super::*;
    use crate::models::{ClientPayload, InteractionType};
    use pretty_assertions::assert_eq;

    async fn seed_client(service: &CrmService, actor: &User, email: &str) -> i32 {
        service
            .create_client(
                actor,
                ClientPayload {
                    first_name: Some(Some("Hedy".into())),
                    last_name: Some(Some("Lamarr".into())),
                    email: Some(Some(email.to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .client
            .id
    }

    fn call(client: i32) -> InteractionPayload {
        InteractionPayload {
            client: Some(Some(client)),
            interaction_type: Some(Some("CALL".into())),
            subject: Some(Some("Discovery call".into())),
            description: Some(Some("Talked about frequency hopping".into())),
        }
    }

    #[tokio::test]
    async fn create_stamps_actor() {
        let (service, alice) = service_with_user("alice").await;
        let client = seed_client(&service, &alice, "hl@example.com").await;

        let interaction = service.create_interaction(&alice, call(client)).await.unwrap();

        assert_eq!(interaction.client_id, client);
        assert_eq!(interaction.interaction_type, InteractionType::Call);
        assert_eq!(interaction.created_by, Some(alice.id));
        assert_eq!(interaction.created_by_name.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn create_for_unknown_client_is_a_field_error() {
        let (service, alice) = service_with_user("alice").await;
        let err = service.create_interaction(&alice, call(77)).await.unwrap_err();
        let ServiceError::Validation(errors) = err else {
            panic!("expected a validation error");
        };
        assert_eq!(
            errors.get("client"),
            Some(&["Invalid pk \"77\" - object does not exist.".to_string()][..])
        );
    }

    #[tokio::test]
    async fn client_filter_returns_only_that_clients_interactions() {
        let (service, alice) = service_with_user("alice").await;
        let first = seed_client(&service, &alice, "one@example.com").await;
        let second = seed_client(&service, &alice, "two@example.com").await;
        let quiet = seed_client(&service, &alice, "three@example.com").await;
        service.create_interaction(&alice, call(first)).await.unwrap();
        service.create_interaction(&alice, call(first)).await.unwrap();
        service.create_interaction(&alice, call(second)).await.unwrap();

        let filtered = service
            .list_interactions(Some(&first.to_string()))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|i| i.client_id == first));

        assert!(service
            .list_interactions(Some(&quiet.to_string()))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(service.list_interactions(None).await.unwrap().len(), 3);
        assert_eq!(service.list_interactions(Some("")).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn non_numeric_client_filter_is_rejected() {
        let (service, _) = service_with_user("alice").await;
        let err = service.list_interactions(Some("abc")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn partial_update_keeps_creator_and_timestamp() {
        let (service, alice) = service_with_user("alice").await;
        let client = seed_client(&service, &alice, "hl@example.com").await;
        let created = service.create_interaction(&alice, call(client)).await.unwrap();

        let updated = service
            .update_interaction(
                created.id,
                InteractionPayload {
                    subject: Some(Some("Second call".into())),
                    ..Default::default()
                },
                Completeness::Partial,
            )
            .await
            .unwrap();

        assert_eq!(updated.subject, "Second call");
        assert_eq!(updated.description, created.description);
        assert_eq!(updated.created_by, created.created_by);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn deleted_interaction_is_gone() {
        let (service, alice) = service_with_user("alice").await;
        let client = seed_client(&service, &alice, "hl@example.com").await;
        let created = service.create_interaction(&alice, call(client)).await.unwrap();

        service.delete_interaction(created.id).await.unwrap();

        assert!(matches!(
            service.get_interaction(created.id).await,
            Err(ServiceError::NotFound)
        ));
        assert!(matches!(
            service.delete_interaction(created.id).await,
            Err(ServiceError::NotFound)
        ));
    }
}
