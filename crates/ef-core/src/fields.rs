//! # Field Type Registry
//!
//! The closed set of field types a form builder can place on a form, and
//! the capability flags describing each. This is the single source of
//! truth consulted by the builder API and the validation engine alike;
//! no other module re-declares the non-answer type list.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Every field type a form can contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    ShortText,
    LongText,
    Email,
    Number,
    Phone,
    Url,
    Date,
    Time,
    Datetime,
    Dropdown,
    Radio,
    Checkbox,
    MultipleChoiceGrid,
    CheckboxGrid,
    FileUpload,
    Rating,
    Scale,
    Section,
    Description,
    Image,
    Video,
}

/// Static capability flags for a field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    /// False for decorative types that never produce an Answer.
    pub accepts_answer: bool,
    /// True for choice types that must carry a non-empty `options` list.
    pub needs_options: bool,
    /// True for grid types that must carry non-empty `rows` and `columns`.
    pub needs_grid: bool,
    /// True only for the file upload type.
    pub supports_file: bool,
}

impl Capabilities {
    const fn new(
        accepts_answer: bool,
        needs_options: bool,
        needs_grid: bool,
        supports_file: bool,
    ) -> Self {
        Self {
            accepts_answer,
            needs_options,
            needs_grid,
            supports_file,
        }
    }
}

impl FieldType {
    /// Every member of the closed set, in builder catalogue order.
    pub const ALL: [FieldType; 21] = [
        FieldType::ShortText,
        FieldType::LongText,
        FieldType::Email,
        FieldType::Number,
        FieldType::Phone,
        FieldType::Url,
        FieldType::Date,
        FieldType::Time,
        FieldType::Datetime,
        FieldType::Dropdown,
        FieldType::Radio,
        FieldType::Checkbox,
        FieldType::MultipleChoiceGrid,
        FieldType::CheckboxGrid,
        FieldType::FileUpload,
        FieldType::Rating,
        FieldType::Scale,
        FieldType::Section,
        FieldType::Description,
        FieldType::Image,
        FieldType::Video,
    ];

    /// Capability lookup. Pure and stateless.
    pub const fn capabilities(self) -> Capabilities {
        match self {
            FieldType::Dropdown | FieldType::Radio | FieldType::Checkbox => {
                Capabilities::new(true, true, false, false)
            }
            FieldType::MultipleChoiceGrid | FieldType::CheckboxGrid => {
                Capabilities::new(true, false, true, false)
            }
            FieldType::FileUpload => Capabilities::new(true, false, false, true),
            FieldType::Section | FieldType::Description | FieldType::Image | FieldType::Video => {
                Capabilities::new(false, false, false, false)
            }
            _ => Capabilities::new(true, false, false, false),
        }
    }

    /// The wire/storage identifier.
    pub const fn as_str(self) -> &'static str {
        match self {
            FieldType::ShortText => "short_text",
            FieldType::LongText => "long_text",
            FieldType::Email => "email",
            FieldType::Number => "number",
            FieldType::Phone => "phone",
            FieldType::Url => "url",
            FieldType::Date => "date",
            FieldType::Time => "time",
            FieldType::Datetime => "datetime",
            FieldType::Dropdown => "dropdown",
            FieldType::Radio => "radio",
            FieldType::Checkbox => "checkbox",
            FieldType::MultipleChoiceGrid => "multiple_choice_grid",
            FieldType::CheckboxGrid => "checkbox_grid",
            FieldType::FileUpload => "file_upload",
            FieldType::Rating => "rating",
            FieldType::Scale => "scale",
            FieldType::Section => "section",
            FieldType::Description => "description",
            FieldType::Image => "image",
            FieldType::Video => "video",
        }
    }

    /// Human-readable label shown in the builder catalogue.
    pub const fn display_name(self) -> &'static str {
        match self {
            FieldType::ShortText => "Short Text",
            FieldType::LongText => "Long Text",
            FieldType::Email => "Email",
            FieldType::Number => "Number",
            FieldType::Phone => "Phone",
            FieldType::Url => "URL",
            FieldType::Date => "Date",
            FieldType::Time => "Time",
            FieldType::Datetime => "Date & Time",
            FieldType::Dropdown => "Dropdown",
            FieldType::Radio => "Multiple Choice",
            FieldType::Checkbox => "Checkboxes",
            FieldType::MultipleChoiceGrid => "Multiple Choice Grid",
            FieldType::CheckboxGrid => "Checkbox Grid",
            FieldType::FileUpload => "File Upload",
            FieldType::Rating => "Rating",
            FieldType::Scale => "Linear Scale",
            FieldType::Section => "Section Header",
            FieldType::Description => "Description",
            FieldType::Image => "Image",
            FieldType::Video => "Video",
        }
    }
}

impl FromStr for FieldType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AppError::UnknownFieldType(s.to_string()))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
