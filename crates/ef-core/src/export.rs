//! # Export Projection
//!
//! Flattens a form's responses into one row per response and one column
//! per answerable field, in display order. Spreadsheet file formatting
//! is a downstream concern; this module only builds the table.

use crate::models::{sort_fields, Form, FormField, FormResponse, ResponseAnswer};
use crate::value::{GridSelection, StoredValue};

/// A flattened response table.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExportTable {
    pub title: String,
    pub headings: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Builds the export table.
///
/// `file_url` resolves a stored upload path to a publicly reachable URL;
/// the raw path is never exported.
pub fn project_responses(
    form: &Form,
    fields: &[FormField],
    responses: &[(FormResponse, Vec<ResponseAnswer>)],
    file_url: impl Fn(&str) -> String,
) -> ExportTable {
    let mut exportable: Vec<FormField> = fields
        .iter()
        .filter(|f| f.field_type.capabilities().accepts_answer)
        .cloned()
        .collect();
    sort_fields(&mut exportable);

    let mut headings = vec![
        "Response ID".to_string(),
        "Submitted At".to_string(),
        "User".to_string(),
        "IP Address".to_string(),
    ];
    headings.extend(exportable.iter().map(|f| f.label.clone()));

    let rows = responses
        .iter()
        .map(|(response, answers)| {
            let mut row = vec![
                response.id.to_string(),
                response.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                response
                    .user_id
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "Anonymous".to_string()),
                response.ip_address.clone(),
            ];
            for field in &exportable {
                let cell = answers
                    .iter()
                    .find(|a| a.field_id == field.id)
                    .map(|a| render_cell(field, &a.value, &file_url))
                    .unwrap_or_default();
                row.push(cell);
            }
            row
        })
        .collect();

    ExportTable {
        title: form.title.clone(),
        headings,
        rows,
    }
}

fn render_cell(
    field: &FormField,
    value: &StoredValue,
    file_url: impl Fn(&str) -> String,
) -> String {
    match value {
        StoredValue::Scalar(s) => s.clone(),
        StoredValue::List(items) => items.join(", "),
        StoredValue::Grid(grid) => {
            // Render in the field's declared row order, not map order.
            let rows = field.rows.as_deref().unwrap_or_default();
            rows.iter()
                .filter_map(|row| grid.get(row).map(|sel| (row, sel)))
                .map(|(row, sel)| match sel {
                    GridSelection::One(col) => format!("{row}: {col}"),
                    GridSelection::Many(cols) => format!("{row}: {}", cols.join(", ")),
                })
                .collect::<Vec<_>>()
                .join("; ")
        }
        StoredValue::File { path, .. } => file_url(path),
    }
}
