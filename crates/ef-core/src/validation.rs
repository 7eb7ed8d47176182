//! # Response Validation Engine
//!
//! Takes a form, its live field definitions, and a candidate answer set
//! keyed by field id, and produces either a staged submission ready for
//! atomic persistence or the complete list of field errors. Failures are
//! collected across the whole form, never short-circuited, so a client
//! can highlight every offending field in one round-trip.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::fields::FieldType;
use crate::models::{sort_fields, Form, FormField, FormResponse, ResponseAnswer};
use crate::value::{normalize, GridSelection, RawAnswer, StoredValue};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

/// Candidate answers keyed by field id. Keys that do not match a live
/// field are silently dropped (the form may have been edited between
/// page-load and submission).
pub type AnswerSet = HashMap<Uuid, RawAnswer>;

/// What kind of per-field failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerErrorKind {
    MissingRequired,
    InvalidValue,
}

/// One per-field validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerError {
    pub field_id: Uuid,
    pub kind: AnswerErrorKind,
    pub message: String,
}

/// Request context captured alongside an accepted submission.
#[derive(Debug, Clone)]
pub struct SubmissionMeta {
    /// Authenticated submitter, if any.
    pub user_id: Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
}

/// A validated submission, staged for one-transaction persistence.
#[derive(Debug, Clone)]
pub struct StagedSubmission {
    pub response: FormResponse,
    pub answers: Vec<ResponseAnswer>,
}

/// Runs the full validation pass.
///
/// `current_count` is the form's response count as freshly read by the
/// caller; the repository re-checks the limit inside the persistence
/// transaction, so this gate is the fast path, not the last word.
pub fn validate_submission(
    form: &Form,
    fields: &[FormField],
    candidate: &AnswerSet,
    meta: SubmissionMeta,
    current_count: i64,
) -> Result<StagedSubmission> {
    if !form.can_accept_responses(current_count) {
        return Err(AppError::FormClosed);
    }
    if form.require_login && meta.user_id.is_none() {
        return Err(AppError::LoginRequired);
    }

    let mut ordered: Vec<FormField> = fields.to_vec();
    sort_fields(&mut ordered);

    let response = FormResponse::new(form.id, meta.user_id, meta.ip_address, meta.user_agent);
    let mut staged = Vec::new();
    let mut errors = Vec::new();

    for field in &ordered {
        // Decorative types are skipped before the required-ness check,
        // so a stored `section` with is_required set never blocks anyone.
        if !field.field_type.capabilities().accepts_answer {
            continue;
        }

        let raw = candidate.get(&field.id);
        let missing = raw.map_or(true, RawAnswer::is_empty);
        if missing {
            if field.is_required {
                errors.push(AnswerError {
                    field_id: field.id,
                    kind: AnswerErrorKind::MissingRequired,
                    message: format!("\"{}\" is required", field.label),
                });
            }
            continue;
        }
        let raw = raw.cloned().unwrap_or(RawAnswer::Text(String::new()));

        match normalize(field.field_type, raw) {
            Ok(value) => match check_format(field, &value) {
                Ok(()) => staged.push(ResponseAnswer::new(response.id, field.id, value)),
                Err(message) => errors.push(AnswerError {
                    field_id: field.id,
                    kind: AnswerErrorKind::InvalidValue,
                    message,
                }),
            },
            Err(err) => errors.push(AnswerError {
                field_id: field.id,
                kind: AnswerErrorKind::InvalidValue,
                message: err.to_string(),
            }),
        }
    }

    if !errors.is_empty() {
        return Err(AppError::SubmissionRejected(errors));
    }

    Ok(StagedSubmission {
        response,
        answers: staged,
    })
}

/// Type-specific format rules, applied to the normalized value.
fn check_format(field: &FormField, value: &StoredValue) -> std::result::Result<(), String> {
    match (field.field_type, value) {
        (FieldType::Email, StoredValue::Scalar(s)) => {
            if EMAIL_RE.is_match(s) {
                Ok(())
            } else {
                Err("must be a valid email address".to_string())
            }
        }
        (FieldType::Number, StoredValue::Scalar(s)) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(()),
            _ => Err("must be a number".to_string()),
        },
        (FieldType::Url, StoredValue::Scalar(s)) => match url::Url::parse(s) {
            Ok(_) => Ok(()),
            Err(_) => Err("must be a valid URL".to_string()),
        },
        (FieldType::Dropdown | FieldType::Radio, StoredValue::Scalar(s)) => {
            let options = field.options.as_deref().unwrap_or_default();
            if options.contains(s) {
                Ok(())
            } else {
                Err(format!("\"{s}\" is not one of the options"))
            }
        }
        (FieldType::Checkbox, StoredValue::List(items)) => {
            let options = field.options.as_deref().unwrap_or_default();
            match items.iter().find(|i| !options.contains(i)) {
                None => Ok(()),
                Some(unknown) => Err(format!("\"{unknown}\" is not one of the options")),
            }
        }
        (FieldType::MultipleChoiceGrid | FieldType::CheckboxGrid, StoredValue::Grid(grid)) => {
            let rows = field.rows.as_deref().unwrap_or_default();
            let columns = field.columns.as_deref().unwrap_or_default();
            if let Some(unknown) = grid.keys().find(|k| !rows.contains(k)) {
                return Err(format!("\"{unknown}\" is not one of the rows"));
            }
            for selection in grid.values() {
                let unknown = match selection {
                    GridSelection::One(col) => (!columns.contains(col)).then_some(col),
                    GridSelection::Many(cols) => cols.iter().find(|c| !columns.contains(c)),
                };
                if let Some(unknown) = unknown {
                    return Err(format!("\"{unknown}\" is not one of the columns"));
                }
            }
            Ok(())
        }
        // All other accepting types are free text beyond required-ness.
        _ => Ok(()),
    }
}
