use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::validation::{
    check_text, is_valid_email, is_valid_phone, nullable, present, Completeness, FieldErrors,
    InvalidChoice,
};

/// Lifecycle bucket of a client relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    #[default]
    Lead,
    InProgress,
    Active,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Lead, Stage::InProgress, Stage::Active];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Lead => "LEAD",
            Stage::InProgress => "IN_PROGRESS",
            Stage::Active => "ACTIVE",
        }
    }

    /// Message returned when a stage transition names an unknown stage
    pub fn invalid_message() -> String {
        let names: Vec<&str> = Self::ALL.iter().map(|stage| stage.as_str()).collect();
        format!("Invalid stage. Must be one of: {}", names.join(", "))
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| InvalidChoice {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for Stage {
    type Error = InvalidChoice;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Client {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub address: String,
    pub notes: String,
    #[sqlx(try_from = "String")]
    pub stage: Stage,
    pub created_by: Option<i32>,
    pub created_by_name: Option<String>,
    pub assigned_to: Option<i32>,
    pub assigned_to_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Overwrites the fields present in `changes` and refreshes `updated_at`
    pub fn apply(&mut self, changes: ClientChanges, now: DateTime<Utc>) {
        if let Some(first_name) = changes.first_name {
            self.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            self.last_name = last_name;
        }
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(phone) = changes.phone {
            self.phone = phone;
        }
        if let Some(company) = changes.company {
            self.company = company;
        }
        if let Some(address) = changes.address {
            self.address = address;
        }
        if let Some(notes) = changes.notes {
            self.notes = notes;
        }
        if let Some(stage) = changes.stage {
            self.stage = stage;
        }
        if let Some(assigned_to) = changes.assigned_to {
            if assigned_to != self.assigned_to {
                self.assigned_to_name = None;
            }
            self.assigned_to = assigned_to;
        }
        self.updated_at = now;
    }
}

/// A client ready to be inserted
#[derive(Debug, Clone)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub company: String,
    pub address: String,
    pub notes: String,
    pub stage: Stage,
    pub created_by: Option<i32>,
    pub assigned_to: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewClient {
    /// Builds the row from validated changes; absent optional fields take
    /// their defaults and both timestamps start at `now`.
    pub fn from_changes(changes: ClientChanges, created_by: i32, now: DateTime<Utc>) -> Self {
        Self {
            first_name: changes.first_name.unwrap_or_default(),
            last_name: changes.last_name.unwrap_or_default(),
            email: changes.email.unwrap_or_default(),
            phone: changes.phone.unwrap_or_default(),
            company: changes.company.unwrap_or_default(),
            address: changes.address.unwrap_or_default(),
            notes: changes.notes.unwrap_or_default(),
            stage: changes.stage.unwrap_or_default(),
            created_by: Some(created_by),
            assigned_to: changes.assigned_to.flatten(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client request body as received. `None` is an absent key and `Some(None)`
/// an explicit `null`. `created_by` and the timestamps are read-only and
/// ignored if present.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientPayload {
    #[serde(default, deserialize_with = "nullable")]
    pub first_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub last_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub stage: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<i32>>,
}

/// Validated client fields; `None` means "leave unchanged"
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
    pub stage: Option<Stage>,
    pub assigned_to: Option<Option<i32>>,
}

impl ClientPayload {
    pub fn validate(self, completeness: Completeness) -> Result<ClientChanges, FieldErrors> {
        let mut errors = FieldErrors::new();

        let first_name = check_text(
            &mut errors,
            "first_name",
            self.first_name,
            completeness,
            true,
            false,
            Some(100),
        );
        let last_name = check_text(
            &mut errors,
            "last_name",
            self.last_name,
            completeness,
            true,
            false,
            Some(100),
        );

        let email = check_text(&mut errors, "email", self.email, completeness, true, false, Some(254))
            .and_then(|email| {
                if is_valid_email(&email) {
                    Some(email)
                } else {
                    errors.add("email", "Enter a valid email address.");
                    None
                }
            });

        let phone = check_text(&mut errors, "phone", self.phone, completeness, false, true, Some(12))
            .and_then(|phone| {
                if phone.is_empty() || is_valid_phone(&phone) {
                    Some(phone)
                } else {
                    errors.add("phone", "Enter a valid phone number.");
                    None
                }
            });

        let company = check_text(
            &mut errors,
            "company",
            self.company,
            completeness,
            false,
            true,
            Some(200),
        );
        let address = check_text(&mut errors, "address", self.address, completeness, false, true, None);
        let notes = check_text(&mut errors, "notes", self.notes, completeness, false, true, None);

        let stage = present(&mut errors, "stage", self.stage, completeness, false).and_then(|raw| {
            raw.parse::<Stage>()
                .map_err(|err| errors.add("stage", err.to_string()))
                .ok()
        });

        errors.into_result(ClientChanges {
            first_name,
            last_name,
            email,
            phone,
            company,
            address,
            notes,
            stage,
            assigned_to: self.assigned_to,
        })
    }
}
