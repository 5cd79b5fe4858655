//! Wire representations. Client lists use a reduced shape; detail views
//! carry every field plus the nested interactions.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Client, ClientInteraction, InteractionType, Stage, User};
use crate::service::ClientDetail;

#[derive(Debug, Serialize)]
pub struct ClientListItem {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub stage: Stage,
    pub created_by_name: Option<String>,
    pub assigned_to_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Client> for ClientListItem {
    fn from(client: Client) -> Self {
        Self {
            id: client.id,
            first_name: client.first_name,
            last_name: client.last_name,
            email: client.email,
            phone: client.phone,
            company: client.company,
            stage: client.stage,
            created_by_name: client.created_by_name,
            assigned_to_name: client.assigned_to_name,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InteractionView {
    pub id: i32,
    pub client: i32,
    pub interaction_type: InteractionType,
    pub subject: String,
    pub description: String,
    pub created_by: Option<i32>,
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ClientInteraction> for InteractionView {
    fn from(interaction: ClientInteraction) -> Self {
        Self {
            id: interaction.id,
            client: interaction.client_id,
            interaction_type: interaction.interaction_type,
            subject: interaction.subject,
            description: interaction.description,
            created_by: interaction.created_by,
            created_by_name: interaction.created_by_name,
            created_at: interaction.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientDetailView {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub address: String,
    pub notes: String,
    pub stage: Stage,
    pub created_by: Option<i32>,
    pub created_by_name: Option<String>,
    pub assigned_to: Option<i32>,
    pub assigned_to_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub interactions: Vec<InteractionView>,
}

impl From<ClientDetail> for ClientDetailView {
    fn from(detail: ClientDetail) -> Self {
        let ClientDetail {
            client,
            interactions,
        } = detail;
        Self {
            id: client.id,
            first_name: client.first_name,
            last_name: client.last_name,
            email: client.email,
            phone: client.phone,
            company: client.company,
            address: client.address,
            notes: client.notes,
            stage: client.stage,
            created_by: client.created_by,
            created_by_name: client.created_by_name,
            assigned_to: client.assigned_to,
            assigned_to_name: client.assigned_to_name,
            created_at: client.created_at,
            updated_at: client.updated_at,
            interactions: interactions.into_iter().map(InteractionView::from).collect(),
        }
    }
}

/// Identity fields of the acting user
#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}
