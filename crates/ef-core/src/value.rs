//! # Answer values
//!
//! Submitted answers arrive in four raw shapes (scalar, list, grid-map,
//! uploaded file) and are stored as one tagged union, [`StoredValue`].
//! The union is constructed exclusively by [`normalize`]; nothing else in
//! the codebase infers an answer's shape ad hoc.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::fields::FieldType;

/// The column(s) selected for one grid row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSelection {
    /// One column label (multiple choice grid).
    One(String),
    /// A list of column labels (checkbox grid).
    Many(Vec<String>),
}

/// A grid answer: row label to selected column(s).
pub type GridMap = BTreeMap<String, GridSelection>;

/// The normalized, persistence-ready representation of an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StoredValue {
    /// Free text, email, number, choice, rating... anything single-valued.
    Scalar(String),
    /// Checkbox selections, in submission order.
    List(Vec<String>),
    /// Grid answers keyed by row label.
    Grid(GridMap),
    /// A stored upload. `path` is the only durable reference; the public
    /// URL is derived at read time by the upload store.
    File {
        path: String,
        original_filename: String,
    },
}

impl StoredValue {
    /// The stored file path, if this answer is an upload.
    pub fn file_path(&self) -> Option<&str> {
        match self {
            StoredValue::File { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// A candidate answer as it came off the wire, before validation.
#[derive(Debug, Clone, PartialEq)]
pub enum RawAnswer {
    Text(String),
    Items(Vec<String>),
    Grid(GridMap),
    /// An upload that has already been written to the store.
    File {
        path: String,
        original_filename: String,
    },
}

impl RawAnswer {
    /// Maps a JSON payload value onto a raw shape. Scalars are coerced to
    /// their string form; `null` and unrepresentable shapes map to `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<RawAnswer> {
        fn scalar(value: &serde_json::Value) -> Option<String> {
            match value {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                serde_json::Value::Bool(b) => Some(b.to_string()),
                _ => None,
            }
        }

        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Array(items) => {
                Some(RawAnswer::Items(items.iter().map(scalar).collect::<Option<_>>()?))
            }
            serde_json::Value::Object(rows) => {
                let mut grid = GridMap::new();
                for (row, cell) in rows {
                    let selection = match cell {
                        serde_json::Value::Array(cols) => {
                            GridSelection::Many(cols.iter().map(scalar).collect::<Option<_>>()?)
                        }
                        other => GridSelection::One(scalar(other)?),
                    };
                    grid.insert(row.clone(), selection);
                }
                Some(RawAnswer::Grid(grid))
            }
            other => scalar(other).map(RawAnswer::Text),
        }
    }

    /// Whether this counts as "no value supplied" for required-ness.
    pub fn is_empty(&self) -> bool {
        match self {
            RawAnswer::Text(s) => s.trim().is_empty(),
            RawAnswer::Items(items) => items.is_empty(),
            RawAnswer::Grid(grid) => grid.is_empty(),
            RawAnswer::File { .. } => false,
        }
    }
}

/// Converts a raw answer into the stored representation, enforcing the
/// shape the field type expects. The error carries a user-facing reason.
pub fn normalize(field_type: FieldType, raw: RawAnswer) -> Result<StoredValue> {
    let caps = field_type.capabilities();
    debug_assert!(caps.accepts_answer, "non-answer types are skipped upstream");

    match (field_type, raw) {
        (FieldType::FileUpload, RawAnswer::File { path, original_filename }) => {
            Ok(StoredValue::File { path, original_filename })
        }
        (FieldType::FileUpload, _) => Err(AppError::ValidationError(
            "expected an uploaded file".to_string(),
        )),
        (FieldType::Checkbox, RawAnswer::Items(items)) => Ok(StoredValue::List(items)),
        (FieldType::Checkbox, _) => Err(AppError::ValidationError(
            "expected a list of selected options".to_string(),
        )),
        (FieldType::MultipleChoiceGrid, RawAnswer::Grid(grid)) => {
            if grid.values().any(|s| matches!(s, GridSelection::Many(_))) {
                return Err(AppError::ValidationError(
                    "expected one column per row".to_string(),
                ));
            }
            Ok(StoredValue::Grid(grid))
        }
        (FieldType::CheckboxGrid, RawAnswer::Grid(grid)) => {
            if grid.values().any(|s| matches!(s, GridSelection::One(_))) {
                return Err(AppError::ValidationError(
                    "expected a list of columns per row".to_string(),
                ));
            }
            Ok(StoredValue::Grid(grid))
        }
        (FieldType::MultipleChoiceGrid | FieldType::CheckboxGrid, _) => Err(
            AppError::ValidationError("expected a grid of row selections".to_string()),
        ),
        (_, RawAnswer::Text(s)) => Ok(StoredValue::Scalar(s)),
        (_, _) => Err(AppError::ValidationError(
            "expected a single value".to_string(),
        )),
    }
}

/// The exact inverse of [`normalize`]. Lossless for all four shapes.
pub fn denormalize(value: StoredValue) -> RawAnswer {
    match value {
        StoredValue::Scalar(s) => RawAnswer::Text(s),
        StoredValue::List(items) => RawAnswer::Items(items),
        StoredValue::Grid(grid) => RawAnswer::Grid(grid),
        StoredValue::File { path, original_filename } => {
            RawAnswer::File { path, original_filename }
        }
    }
}
