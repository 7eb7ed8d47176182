//! # AppError
//!
//! Centralized error handling for the eForms ecosystem.
//! Maps domain-specific failures to actionable error types.

use thiserror::Error;
use uuid::Uuid;

use crate::validation::AnswerError;

/// The primary error type for all ef-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Form, Field, Response)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// General request validation failure (e.g., empty title)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Ownership failure (caller does not own the target form)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The form is not accepting responses (unpublished, closed, or at
    /// its response limit). Retrying will not help until form state changes.
    #[error("this form is not accepting responses")]
    FormClosed,

    /// The form requires an authenticated submitter.
    #[error("you must be logged in to submit this form")]
    LoginRequired,

    /// A field type outside the closed registry set.
    #[error("unknown field type: {0}")]
    UnknownFieldType(String),

    /// A field whose configuration breaks the registry invariants
    /// (missing options/rows/columns), or stored JSON of the wrong shape.
    #[error("invalid field configuration: {0}")]
    InvalidFieldConfiguration(String),

    /// A bulk field operation referenced a field outside the target form.
    #[error("field {field_id} does not belong to form {form_id}")]
    OwnershipViolation { field_id: Uuid, form_id: Uuid },

    /// A submission failed validation. Carries every offending field,
    /// never just the first.
    #[error("submission rejected with {} field error(s)", .0.len())]
    SubmissionRejected(Vec<AnswerError>),

    /// Infrastructure failure (e.g., DB down, disk full)
    #[error("internal service error: {0}")]
    Internal(String),
}

/// A specialized Result type for eForms logic.
pub type Result<T> = std::result::Result<T, AppError>;
