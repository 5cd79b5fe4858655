use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";
pub const NULL: &str = "This field may not be null.";

/// Field name -> messages, serialized as a flat JSON object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field error, e.g. a uniqueness conflict reported by the store
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// A value outside one of the closed choice sets (stage, interaction type)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("\"{value}\" is not a valid choice.")]
pub struct InvalidChoice {
    pub value: String,
}

/// Whether a payload must carry every required field (create / PUT)
/// or only the fields being changed (PATCH)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completeness {
    Full,
    Partial,
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`)
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Unwraps a field read through [`nullable`]. An explicit `null` is always
/// an error; an absent field is one only when `required` on a full payload.
pub fn present<T>(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Option<T>>,
    completeness: Completeness,
    required: bool,
) -> Option<T> {
    match value {
        Some(Some(value)) => Some(value),
        Some(None) => {
            errors.add(field, NULL);
            None
        }
        None => {
            if required && completeness == Completeness::Full {
                errors.add(field, REQUIRED);
            }
            None
        }
    }
}

/// Checks a text field; `required` fields must be present in full payloads,
/// `allow_blank` controls whether an empty string is accepted.
pub fn check_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<Option<String>>,
    completeness: Completeness,
    required: bool,
    allow_blank: bool,
    max_len: Option<usize>,
) -> Option<String> {
    let value = present(errors, field, value, completeness, required)?;

    let value = value.trim().to_string();
    if value.is_empty() && !allow_blank {
        errors.add(field, BLANK);
        return None;
    }
    if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
            return None;
        }
    }
    Some(value)
}

/// Minimal structural email check: one `@`, a non-empty local part and a
/// dotted domain, no whitespace
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}

/// Phone numbers are digits with an optional leading `+`
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}
