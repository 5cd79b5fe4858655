use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::client::Stage;
use super::validation::{check_text, nullable, present, Completeness, FieldErrors, InvalidChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InteractionType {
    Call,
    Email,
    Meeting,
    Note,
}

impl InteractionType {
    pub const ALL: [InteractionType; 4] = [
        InteractionType::Call,
        InteractionType::Email,
        InteractionType::Meeting,
        InteractionType::Note,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InteractionType::Call => "CALL",
            InteractionType::Email => "EMAIL",
            InteractionType::Meeting => "MEETING",
            InteractionType::Note => "NOTE",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| InvalidChoice {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for InteractionType {
    type Error = InvalidChoice;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct ClientInteraction {
    pub id: i32,
    pub client_id: i32,
    #[sqlx(try_from = "String")]
    pub interaction_type: InteractionType,
    pub subject: String,
    pub description: String,
    pub created_by: Option<i32>,
    pub created_by_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClientInteraction {
    /// Overwrites the fields present in `changes`; `created_at` never moves
    pub fn apply(&mut self, changes: InteractionChanges) {
        if let Some(client_id) = changes.client_id {
            self.client_id = client_id;
        }
        if let Some(interaction_type) = changes.interaction_type {
            self.interaction_type = interaction_type;
        }
        if let Some(subject) = changes.subject {
            self.subject = subject;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewInteraction {
    pub client_id: i32,
    pub interaction_type: InteractionType,
    pub subject: String,
    pub description: String,
    pub created_by: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl NewInteraction {
    pub fn from_changes(changes: InteractionChanges, created_by: i32, now: DateTime<Utc>) -> Self {
        Self {
            client_id: changes.client_id.unwrap_or_default(),
            interaction_type: changes.interaction_type.unwrap_or(InteractionType::Note),
            subject: changes.subject.unwrap_or_default(),
            description: changes.description.unwrap_or_default(),
            created_by: Some(created_by),
            created_at: now,
        }
    }

    /// Audit note recorded whenever a client's stage is set
    pub fn stage_change(
        client_id: i32,
        from: Stage,
        to: Stage,
        actor_id: i32,
        actor_name: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            client_id,
            interaction_type: InteractionType::Note,
            subject: format!("Stage Updated: {from} → {to}"),
            description: format!("Stage changed from {from} to {to} by {actor_name}"),
            created_by: Some(actor_id),
            created_at: now,
        }
    }
}

/// Interaction request body; explicit `null`s are kept apart from absent
/// keys. `created_by` and `created_at` are read-only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InteractionPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub client: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub interaction_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub subject: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionChanges {
    pub client_id: Option<i32>,
    pub interaction_type: Option<InteractionType>,
    pub subject: Option<String>,
    pub description: Option<String>,
}

impl InteractionPayload {
    pub fn validate(self, completeness: Completeness) -> Result<InteractionChanges, FieldErrors> {
        let mut errors = FieldErrors::new();

        let client_id = present(&mut errors, "client", self.client, completeness, true);

        let interaction_type =
            present(&mut errors, "interaction_type", self.interaction_type, completeness, true)
                .and_then(|raw| {
                    raw.parse::<InteractionType>()
                        .map_err(|err| errors.add("interaction_type", err.to_string()))
                        .ok()
                });

        let subject = check_text(
            &mut errors,
            "subject",
            self.subject,
            completeness,
            true,
            false,
            Some(200),
        );
        let description = check_text(
            &mut errors,
            "description",
            self.description,
            completeness,
            true,
            false,
            None,
        );

        errors.into_result(InteractionChanges {
            client_id,
            interaction_type,
            subject,
            description,
        })
    }
}
