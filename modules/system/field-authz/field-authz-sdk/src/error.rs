//! Error types for the field `AuthZ` module.

use std::collections::BTreeMap;

use crate::operators::OperatorError;

/// Coarse error classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    BadRequest,
    NotFound,
    Internal,
}

/// Errors produced while authorizing or executing an operation.
///
/// Authorization failures are reported singularly (first decisive failure),
/// field validation failures are aggregated in [`FieldAuthzError::InvalidFields`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldAuthzError {
    /// Identity missing, unresolvable, or lacking row/field permission.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Identity is valid but the method/path is not among its endpoints.
    #[error("forbidden: {method} {path}")]
    Forbidden { method: String, path: String },

    /// Malformed caller input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Required fields absent from the candidate item.
    #[error("bad request: missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// Business-rule failures, one message per field.
    #[error("bad request: invalid fields: {}", format_field_map(.0))]
    InvalidFields(BTreeMap<String, String>),

    /// Lookup legitimately produced no result.
    #[error("not found: {0}")]
    NotFound(String),

    /// Collaborator failure, surfaced unchanged.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FieldAuthzError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::BadRequest(_) | Self::MissingFields(_) | Self::InvalidFields(_) => {
                ErrorKind::BadRequest
            }
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized(reason.into())
    }

    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest(reason.into())
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound(reason.into())
    }

    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}

impl From<OperatorError> for FieldAuthzError {
    fn from(e: OperatorError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

fn format_field_map(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}
