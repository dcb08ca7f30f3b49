use client_console_schemas::{ClientId, Collection};
use client_console_store::StoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Editable client fields that carry validation rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DraftField {
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "agent_name")]
    AgentName,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "website")]
    Website,
}

impl DraftField {
    pub fn as_str(&self) -> &'static str {
        match self {
            DraftField::Name => "name",
            DraftField::AgentName => "agent_name",
            DraftField::Email => "email",
            DraftField::Website => "website",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldProblem {
    #[serde(rename = "required")]
    Required,
    #[serde(rename = "invalid_email")]
    InvalidEmail,
    #[serde(rename = "invalid_url")]
    InvalidUrl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: DraftField,
    pub problem: FieldProblem,
}

/// Every field that blocked a submit, in form order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn push(&mut self, field: DraftField, problem: FieldProblem) {
        self.errors.push(FieldError { field, problem });
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has(&self, field: DraftField) -> bool {
        self.errors.iter().any(|error| error.field == field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let fields: Vec<String> = self
            .errors
            .iter()
            .map(|error| format!("{} ({:?})", error.field.as_str(), error.problem))
            .collect();
        write!(f, "{}", fields.join(", "))
    }
}

/// Errors surfaced by the console core. None of them is fatal; every one is
/// recoverable by retrying or navigating away.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConsoleError {
    /// Required or malformed fields, caught before any store call
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A by-key read or update found no row
    #[error("{collection} record {key} not found")]
    NotFound { collection: Collection, key: String },

    /// The form is not in a state that accepts a submit
    #[error("cannot submit while {0}")]
    NotEditable(&'static str),

    /// The store call itself failed
    #[error(transparent)]
    Store(StoreError),
}

impl ConsoleError {
    pub fn client_not_found(id: &ClientId) -> Self {
        ConsoleError::NotFound {
            collection: Collection::Clients,
            key: id.0.clone(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ConsoleError::NotFound { .. })
    }
}

impl From<StoreError> for ConsoleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingRow { collection, key } => ConsoleError::NotFound { collection, key },
            other => ConsoleError::Store(other),
        }
    }
}

impl From<ValidationErrors> for ConsoleError {
    fn from(errors: ValidationErrors) -> Self {
        ConsoleError::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_row_maps_to_not_found() {
        let err = ConsoleError::from(StoreError::MissingRow {
            collection: Collection::Clients,
            key: "cli_1".to_string(),
        });
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "clients record cli_1 not found");
    }

    #[test]
    fn test_validation_message_lists_fields() {
        let mut errors = ValidationErrors::default();
        errors.push(DraftField::Name, FieldProblem::Required);
        errors.push(DraftField::Email, FieldProblem::InvalidEmail);

        let message = ConsoleError::from(errors).to_string();
        assert!(message.contains("name (Required)"));
        assert!(message.contains("email (InvalidEmail)"));
    }
}
