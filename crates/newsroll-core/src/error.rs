//! Error taxonomy shared by the ingestion engine and its callers.
//!
//! Only [`Error::Validation`], [`Error::NotFound`], and [`Error::Unexpected`]
//! ever escape a pipeline. Storage and backend failures are logged and
//! absorbed where they happen; the variants exist so collaborators have a
//! typed way to report them.

use serde::Serialize;
use thiserror::Error;

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing request fields. Never retried.
    #[error("validation failed: {}", summarize_fields(.errors))]
    Validation { errors: Vec<FieldError> },

    /// Lookup by identifier found nothing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Media read/delete failure. Callers log these and continue.
    #[error("storage error: {0}")]
    Storage(String),

    /// Text-generation backend missing or failed.
    #[error("backend unavailable: {0}")]
    Backend(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Error::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Short machine-readable name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "ValidationError",
            Error::NotFound { .. } => "NotFoundError",
            Error::Storage(_) => "StorageError",
            Error::Backend(_) => "BackendUnavailable",
            Error::Unexpected(_) => "UnexpectedError",
        }
    }
}

fn summarize_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
