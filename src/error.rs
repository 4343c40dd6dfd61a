//! Typed rejections raised at the service boundary.
//!
//! These are checked before any storage is touched. Everything else in the
//! crate travels as [`anyhow::Error`]; the HTTP layer downcasts to
//! [`ValidationError`] to answer with `400 bad_request`.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be between 1 and {max}, got {value}")]
    LimitOutOfRange {
        field: &'static str,
        value: i64,
        max: i64,
    },

    #[error("unknown category '{value}'; expected one of preference, fact, decision, entity, other")]
    UnknownCategory { value: String },
}

impl ValidationError {
    /// Name of the offending request field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Empty { field } => *field,
            ValidationError::LimitOutOfRange { field, .. } => *field,
            ValidationError::UnknownCategory { .. } => "category",
        }
    }
}
