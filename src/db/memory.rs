use std::cmp::Reverse;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::{CrmStore, StoreError, StoreResult};
use crate::models::{
    Client, ClientInteraction, NewClient, NewInteraction, NewUser, Stage, StatisticsCounts, User,
};

/// In-process store with the same semantics as the PostgreSQL schema:
/// unique emails and usernames, cascading client deletes, and user
/// references cleared when the user goes away.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: Vec<(User, String)>,
    clients: Vec<Client>,
    interactions: Vec<ClientInteraction>,
    next_user_id: i32,
    next_client_id: i32,
    next_interaction_id: i32,
}

impl Tables {
    fn username(&self, id: Option<i32>) -> Option<String> {
        let id = id?;
        self.users
            .iter()
            .find(|(user, _)| user.id == id)
            .map(|(user, _)| user.username.clone())
    }

    /// Copy of a stored client with user names joined in
    fn resolve_client(&self, client: &Client) -> Client {
        Client {
            created_by_name: self.username(client.created_by),
            assigned_to_name: self.username(client.assigned_to),
            ..client.clone()
        }
    }

    fn resolve_interaction(&self, interaction: &ClientInteraction) -> ClientInteraction {
        ClientInteraction {
            created_by_name: self.username(interaction.created_by),
            ..interaction.clone()
        }
    }

    fn client_position(&self, id: i32) -> StoreResult<usize> {
        self.clients
            .iter()
            .position(|client| client.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn interaction_position(&self, id: i32) -> StoreResult<usize> {
        self.interactions
            .iter()
            .position(|interaction| interaction.id == id)
            .ok_or(StoreError::NotFound)
    }

    fn email_taken(&self, email: &str, except: Option<i32>) -> bool {
        self.clients
            .iter()
            .any(|client| client.email == email && Some(client.id) != except)
    }

    fn insert_interaction(&mut self, new: &NewInteraction) -> ClientInteraction {
        self.next_interaction_id += 1;
        let interaction = ClientInteraction {
            id: self.next_interaction_id,
            client_id: new.client_id,
            interaction_type: new.interaction_type,
            subject: new.subject.clone(),
            description: new.description.clone(),
            created_by: new.created_by,
            created_by_name: None,
            created_at: new.created_at,
        };
        self.interactions.push(interaction.clone());
        self.resolve_interaction(&interaction)
    }
}

#[async_trait]
impl CrmStore for MemoryStore {
    async fn create_user(&self, user: &NewUser) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables
            .users
            .iter()
            .any(|(existing, _)| existing.username == user.username)
        {
            return Err(StoreError::UsernameTaken);
        }

        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
        };
        tables.users.push((created.clone(), user.token_hash.clone()));
        Ok(created)
    }

    async fn get_user(&self, id: i32) -> StoreResult<User> {
        let tables = self.tables.lock().await;
        tables
            .users
            .iter()
            .find(|(user, _)| user.id == id)
            .map(|(user, _)| user.clone())
            .ok_or(StoreError::NotFound)
    }

    async fn find_user_by_token_hash(&self, token_hash: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|(_, hash)| hash == token_hash)
            .map(|(user, _)| user.clone()))
    }

    async fn delete_user(&self, username: &str) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let position = tables
            .users
            .iter()
            .position(|(user, _)| user.username == username)
            .ok_or(StoreError::NotFound)?;
        let (removed, _) = tables.users.remove(position);

        let gone = Some(removed.id);
        for client in &mut tables.clients {
            if client.created_by == gone {
                client.created_by = None;
            }
            if client.assigned_to == gone {
                client.assigned_to = None;
            }
        }
        for interaction in &mut tables.interactions {
            if interaction.created_by == gone {
                interaction.created_by = None;
            }
        }
        Ok(())
    }

    async fn list_clients(&self, stage: Option<Stage>) -> StoreResult<Vec<Client>> {
        let tables = self.tables.lock().await;
        let mut clients: Vec<Client> = tables
            .clients
            .iter()
            .filter(|client| stage.is_none_or(|stage| client.stage == stage))
            .map(|client| tables.resolve_client(client))
            .collect();
        clients.sort_by_key(|client| Reverse((client.created_at, client.id)));
        Ok(clients)
    }

    async fn get_client(&self, id: i32) -> StoreResult<Client> {
        let tables = self.tables.lock().await;
        let position = tables.client_position(id)?;
        Ok(tables.resolve_client(&tables.clients[position]))
    }

    async fn create_client(&self, client: &NewClient) -> StoreResult<Client> {
        let mut tables = self.tables.lock().await;
        if tables.email_taken(&client.email, None) {
            return Err(StoreError::EmailTaken);
        }

        tables.next_client_id += 1;
        let created = Client {
            id: tables.next_client_id,
            first_name: client.first_name.clone(),
            last_name: client.last_name.clone(),
            email: client.email.clone(),
            phone: client.phone.clone(),
            company: client.company.clone(),
            address: client.address.clone(),
            notes: client.notes.clone(),
            stage: client.stage,
            created_by: client.created_by,
            created_by_name: None,
            assigned_to: client.assigned_to,
            assigned_to_name: None,
            created_at: client.created_at,
            updated_at: client.updated_at,
        };
        tables.clients.push(created.clone());
        Ok(tables.resolve_client(&created))
    }

    async fn update_client(&self, client: &Client) -> StoreResult<Client> {
        let mut tables = self.tables.lock().await;
        let position = tables.client_position(client.id)?;
        if tables.email_taken(&client.email, Some(client.id)) {
            return Err(StoreError::EmailTaken);
        }

        // created_by and created_at are fixed at insert time
        let stored = &mut tables.clients[position];
        *stored = Client {
            created_by: stored.created_by,
            created_at: stored.created_at,
            ..client.clone()
        };
        let updated = stored.clone();
        Ok(tables.resolve_client(&updated))
    }

    async fn delete_client(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let position = tables.client_position(id)?;
        tables.clients.remove(position);
        tables
            .interactions
            .retain(|interaction| interaction.client_id != id);
        Ok(())
    }

    async fn change_stage(
        &self,
        id: i32,
        stage: Stage,
        note: &NewInteraction,
    ) -> StoreResult<Client> {
        let mut tables = self.tables.lock().await;
        let position = tables.client_position(id)?;

        let stored = &mut tables.clients[position];
        stored.stage = stage;
        stored.updated_at = note.created_at;
        let updated = stored.clone();

        tables.insert_interaction(note);
        Ok(tables.resolve_client(&updated))
    }

    async fn list_interactions(&self, client_id: Option<i32>) -> StoreResult<Vec<ClientInteraction>> {
        let tables = self.tables.lock().await;
        let mut interactions: Vec<ClientInteraction> = tables
            .interactions
            .iter()
            .filter(|interaction| client_id.is_none_or(|id| interaction.client_id == id))
            .map(|interaction| tables.resolve_interaction(interaction))
            .collect();
        interactions.sort_by_key(|interaction| Reverse((interaction.created_at, interaction.id)));
        Ok(interactions)
    }

    async fn get_interaction(&self, id: i32) -> StoreResult<ClientInteraction> {
        let tables = self.tables.lock().await;
        let position = tables.interaction_position(id)?;
        Ok(tables.resolve_interaction(&tables.interactions[position]))
    }

    async fn create_interaction(&self, interaction: &NewInteraction) -> StoreResult<ClientInteraction> {
        let mut tables = self.tables.lock().await;
        // Mirrors the foreign key on client_interactions.client_id
        tables.client_position(interaction.client_id)?;
        Ok(tables.insert_interaction(interaction))
    }

    async fn update_interaction(&self, interaction: &ClientInteraction) -> StoreResult<ClientInteraction> {
        let mut tables = self.tables.lock().await;
        let position = tables.interaction_position(interaction.id)?;
        tables.client_position(interaction.client_id)?;

        let stored = &mut tables.interactions[position];
        *stored = ClientInteraction {
            created_by: stored.created_by,
            created_at: stored.created_at,
            ..interaction.clone()
        };
        let updated = stored.clone();
        Ok(tables.resolve_interaction(&updated))
    }

    async fn delete_interaction(&self, id: i32) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let position = tables.interaction_position(id)?;
        tables.interactions.remove(position);
        Ok(())
    }

    async fn statistics(&self, since: DateTime<Utc>) -> StoreResult<StatisticsCounts> {
        let tables = self.tables.lock().await;
        let clients: Vec<Client> = tables
            .clients
            .iter()
            .map(|client| tables.resolve_client(client))
            .collect();
        Ok(StatisticsCounts::tally(&clients, &tables.interactions, since))
    }
}
