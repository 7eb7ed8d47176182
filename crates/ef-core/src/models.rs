//! # Domain Models
//!
//! These structs represent the core entities of eForms: forms, their
//! field definitions, and submitted responses. We use UUID v7 for
//! time-ordered, globally unique identification, which also makes the
//! "ties broken by identifier" ordering rule equal creation order.

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::fields::FieldType;
use crate::value::StoredValue;

/// Lifecycle status of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormStatus {
    Draft,
    Published,
    Closed,
}

impl FormStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            FormStatus::Draft => "draft",
            FormStatus::Published => "published",
            FormStatus::Closed => "closed",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "draft" => Ok(FormStatus::Draft),
            "published" => Ok(FormStatus::Published),
            "closed" => Ok(FormStatus::Closed),
            other => Err(AppError::ValidationError(format!(
                "unknown form status: {other}"
            ))),
        }
    }
}

/// A form: an ordered collection of fields plus presentation settings
/// and lifecycle flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    /// Owning user. Ownership checks are the only multi-tenancy model.
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Public identifier, generated once at creation and immutable.
    pub slug: String,
    /// JSON bucket for theme/presentation settings (colors, fonts,
    /// header image, thumbnail). Stored and returned verbatim.
    pub settings: serde_json::Value,
    pub status: FormStatus,
    pub is_public: bool,
    pub accept_responses: bool,
    pub show_progress_bar: bool,
    pub shuffle_questions: bool,
    pub limit_responses: bool,
    /// Meaningful only when `limit_responses` is true.
    pub max_responses: Option<i32>,
    pub require_login: bool,
    pub custom_thank_you_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Form {
    /// Creates a draft form with a freshly generated slug.
    pub fn new(
        user_id: Uuid,
        title: String,
        description: Option<String>,
        settings: serde_json::Value,
    ) -> Result<Self> {
        if title.trim().is_empty() {
            return Err(AppError::ValidationError("title is required".to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::now_v7(),
            user_id,
            slug: generate_slug(&title),
            title,
            description,
            settings,
            status: FormStatus::Draft,
            is_public: true,
            accept_responses: true,
            show_progress_bar: false,
            shuffle_questions: false,
            limit_responses: false,
            max_responses: None,
            require_login: false,
            custom_thank_you_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// The submission gate: open only when responses are accepted, the
    /// form is published, and any response limit has headroom. Evaluated
    /// against a fresh count on every attempt, never cached.
    pub fn can_accept_responses(&self, current_count: i64) -> bool {
        if !self.accept_responses || self.status != FormStatus::Published {
            return false;
        }
        if self.limit_responses {
            let max = self.max_responses.unwrap_or(0);
            if current_count >= i64::from(max) {
                return false;
            }
        }
        true
    }

    /// A draft copy with a new id and slug, carrying configuration but
    /// no responses. Field copies are produced separately with
    /// [`FormField::duplicate_for`] and persisted in one transaction.
    pub fn duplicate(&self) -> Form {
        let now = Utc::now();
        let title = format!("{} (Copy)", self.title);
        Form {
            id: Uuid::now_v7(),
            slug: generate_slug(&title),
            title,
            status: FormStatus::Draft,
            created_at: now,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// One configurable question (or decorative element) within a form.
/// Owned exclusively by its form and cascade-deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub id: Uuid,
    pub form_id: Uuid,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    /// Present iff the type needs options (dropdown, radio, checkbox).
    pub options: Option<Vec<String>>,
    /// Present iff the type is a grid.
    pub rows: Option<Vec<String>>,
    pub columns: Option<Vec<String>>,
    /// Opaque extra rules bucket, passed through to the client.
    pub validation_rules: serde_json::Value,
    pub is_required: bool,
    /// Display sequence; ties broken by id ascending.
    pub order: i32,
    /// Opaque display-layer rule blob. Stored and returned unchanged,
    /// never interpreted here.
    pub conditional_logic: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Builder-supplied configuration for creating a field.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDraft {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub label: String,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub rows: Option<Vec<String>>,
    #[serde(default)]
    pub columns: Option<Vec<String>>,
    #[serde(default)]
    pub validation_rules: serde_json::Value,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub conditional_logic: serde_json::Value,
}

/// Builder-supplied partial update for an existing field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldUpdate {
    #[serde(rename = "type")]
    pub field_type: Option<FieldType>,
    pub label: Option<String>,
    pub placeholder: Option<String>,
    pub help_text: Option<String>,
    pub options: Option<Vec<String>>,
    pub rows: Option<Vec<String>>,
    pub columns: Option<Vec<String>>,
    pub validation_rules: Option<serde_json::Value>,
    pub is_required: Option<bool>,
    pub order: Option<i32>,
    pub conditional_logic: Option<serde_json::Value>,
}

impl FormField {
    /// Builds a field, enforcing the options/grid invariants at the
    /// boundary rather than deferring to database nullability.
    pub fn new(form_id: Uuid, draft: FieldDraft) -> Result<Self> {
        let field = Self {
            id: Uuid::now_v7(),
            form_id,
            field_type: draft.field_type,
            label: draft.label,
            placeholder: draft.placeholder,
            help_text: draft.help_text,
            options: draft.options,
            rows: draft.rows,
            columns: draft.columns,
            validation_rules: draft.validation_rules,
            is_required: draft.is_required,
            order: draft.order,
            conditional_logic: draft.conditional_logic,
            created_at: Utc::now(),
        };
        field.validate_config()?;
        Ok(field)
    }

    /// Applies a partial update, then re-checks the configuration
    /// invariants against the (possibly changed) type.
    pub fn apply_update(&mut self, update: FieldUpdate) -> Result<()> {
        if let Some(field_type) = update.field_type {
            self.field_type = field_type;
        }
        if let Some(label) = update.label {
            self.label = label;
        }
        if update.placeholder.is_some() {
            self.placeholder = update.placeholder;
        }
        if update.help_text.is_some() {
            self.help_text = update.help_text;
        }
        if update.options.is_some() {
            self.options = update.options;
        }
        if update.rows.is_some() {
            self.rows = update.rows;
        }
        if update.columns.is_some() {
            self.columns = update.columns;
        }
        if let Some(rules) = update.validation_rules {
            self.validation_rules = rules;
        }
        if let Some(is_required) = update.is_required {
            self.is_required = is_required;
        }
        if let Some(order) = update.order {
            self.order = order;
        }
        if let Some(logic) = update.conditional_logic {
            self.conditional_logic = logic;
        }
        self.validate_config()
    }

    /// The options/grid invariant from the registry.
    pub fn validate_config(&self) -> Result<()> {
        if self.label.trim().is_empty() {
            return Err(AppError::InvalidFieldConfiguration(
                "label must not be empty".to_string(),
            ));
        }
        let caps = self.field_type.capabilities();
        if caps.needs_options && self.options.as_ref().is_none_or(|o| o.is_empty()) {
            return Err(AppError::InvalidFieldConfiguration(format!(
                "{} fields need at least one option",
                self.field_type
            )));
        }
        if caps.needs_grid {
            if self.rows.as_ref().is_none_or(|r| r.is_empty()) {
                return Err(AppError::InvalidFieldConfiguration(format!(
                    "{} fields need at least one row",
                    self.field_type
                )));
            }
            if self.columns.as_ref().is_none_or(|c| c.is_empty()) {
                return Err(AppError::InvalidFieldConfiguration(format!(
                    "{} fields need at least one column",
                    self.field_type
                )));
            }
        }
        Ok(())
    }

    /// A copy attached to another form, with a fresh id.
    pub fn duplicate_for(&self, form_id: Uuid) -> FormField {
        FormField {
            id: Uuid::now_v7(),
            form_id,
            created_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Sorts fields into display sequence: order ascending, id ascending.
pub fn sort_fields(fields: &mut [FormField]) {
    fields.sort_by(|a, b| a.order.cmp(&b.order).then(a.id.cmp(&b.id)));
}

/// One accepted submission. Immutable after creation; delete is the
/// only permitted post-creation operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormResponse {
    pub id: Uuid,
    pub form_id: Uuid,
    /// None means an anonymous submission.
    pub user_id: Option<Uuid>,
    pub ip_address: String,
    pub user_agent: String,
    /// Server-assigned at creation, never client-supplied.
    pub submitted_at: DateTime<Utc>,
}

impl FormResponse {
    pub fn new(form_id: Uuid, user_id: Option<Uuid>, ip_address: String, user_agent: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            form_id,
            user_id,
            ip_address,
            user_agent,
            submitted_at: Utc::now(),
        }
    }
}

/// One answer row per (response, field) pair for which a value was
/// accepted. Never exists for a field whose type does not accept answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseAnswer {
    pub id: Uuid,
    pub response_id: Uuid,
    pub field_id: Uuid,
    pub value: StoredValue,
}

impl ResponseAnswer {
    pub fn new(response_id: Uuid, field_id: Uuid, value: StoredValue) -> Self {
        Self {
            id: Uuid::now_v7(),
            response_id,
            field_id,
            value,
        }
    }
}

/// Title-derived slug plus an 8-character random suffix.
fn generate_slug(title: &str) -> String {
    let base: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    let base = base.trim_matches('-').to_string();
    let mut slug = String::new();
    // Collapse runs of '-' left behind by punctuation and whitespace.
    for c in base.chars() {
        if c == '-' && slug.ends_with('-') {
            continue;
        }
        slug.push(c);
    }
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect();
    if slug.is_empty() {
        format!("form-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published_form() -> Form {
        let mut form = Form::new(
            Uuid::now_v7(),
            "Event RSVP".to_string(),
            None,
            serde_json::json!({}),
        )
        .unwrap();
        form.status = FormStatus::Published;
        form
    }

    #[test]
    fn slugs_are_title_derived_with_a_random_suffix() {
        let form = Form::new(
            Uuid::now_v7(),
            "Customer Survey 2026!".to_string(),
            None,
            serde_json::json!({}),
        )
        .unwrap();
        assert!(form.slug.starts_with("customer-survey-2026-"), "{}", form.slug);
        assert_eq!(form.slug.rsplit('-').next().unwrap().len(), 8);

        let other = Form::new(Uuid::now_v7(), "Customer Survey 2026!".into(), None, serde_json::json!({})).unwrap();
        assert_ne!(form.slug, other.slug);
    }

    #[test]
    fn submission_gate_combines_status_flag_and_limit() {
        let mut form = published_form();
        assert!(form.can_accept_responses(0));
        // Idempotent with no intervening writes.
        assert!(form.can_accept_responses(0));

        form.limit_responses = true;
        form.max_responses = Some(1);
        assert!(form.can_accept_responses(0));
        assert!(!form.can_accept_responses(1));

        form.limit_responses = false;
        form.accept_responses = false;
        assert!(!form.can_accept_responses(0));

        form.accept_responses = true;
        form.status = FormStatus::Closed;
        assert!(!form.can_accept_responses(0));
    }

    #[test]
    fn option_fields_require_a_non_empty_option_list() {
        let form_id = Uuid::now_v7();
        let draft = FieldDraft {
            field_type: FieldType::Dropdown,
            label: "Pick one".to_string(),
            placeholder: None,
            help_text: None,
            options: None,
            rows: None,
            columns: None,
            validation_rules: serde_json::Value::Null,
            is_required: false,
            order: 0,
            conditional_logic: serde_json::Value::Null,
        };
        assert!(matches!(
            FormField::new(form_id, draft.clone()),
            Err(AppError::InvalidFieldConfiguration(_))
        ));
        let ok = FieldDraft {
            options: Some(vec!["A".to_string()]),
            ..draft
        };
        assert!(FormField::new(form_id, ok).is_ok());
    }

    #[test]
    fn grid_fields_require_rows_and_columns() {
        let draft = FieldDraft {
            field_type: FieldType::CheckboxGrid,
            label: "Availability".to_string(),
            placeholder: None,
            help_text: None,
            options: None,
            rows: Some(vec!["Mon".to_string()]),
            columns: None,
            validation_rules: serde_json::Value::Null,
            is_required: false,
            order: 0,
            conditional_logic: serde_json::Value::Null,
        };
        assert!(FormField::new(Uuid::now_v7(), draft).is_err());
    }

    #[test]
    fn type_change_revalidates_the_configuration() {
        let mut field = FormField::new(
            Uuid::now_v7(),
            FieldDraft {
                field_type: FieldType::ShortText,
                label: "Name".to_string(),
                placeholder: None,
                help_text: None,
                options: None,
                rows: None,
                columns: None,
                validation_rules: serde_json::Value::Null,
                is_required: false,
                order: 0,
                conditional_logic: serde_json::Value::Null,
            },
        )
        .unwrap();
        let update = FieldUpdate {
            field_type: Some(FieldType::Radio),
            ..FieldUpdate::default()
        };
        assert!(field.apply_update(update).is_err());
    }

    #[test]
    fn duplicate_resets_identity_status_and_slug() {
        let mut form = published_form();
        form.limit_responses = true;
        form.max_responses = Some(10);
        let copy = form.duplicate();
        assert_ne!(copy.id, form.id);
        assert_ne!(copy.slug, form.slug);
        assert_eq!(copy.status, FormStatus::Draft);
        assert_eq!(copy.title, "Event RSVP (Copy)");
        assert_eq!(copy.max_responses, Some(10));
        assert_eq!(copy.user_id, form.user_id);
    }

    #[test]
    fn display_sequence_breaks_order_ties_by_id() {
        let form_id = Uuid::now_v7();
        let draft = |label: &str, order: i32| FieldDraft {
            field_type: FieldType::ShortText,
            label: label.to_string(),
            placeholder: None,
            help_text: None,
            options: None,
            rows: None,
            columns: None,
            validation_rules: serde_json::Value::Null,
            is_required: false,
            order,
            conditional_logic: serde_json::Value::Null,
        };
        let first = FormField::new(form_id, draft("a", 1)).unwrap();
        let second = FormField::new(form_id, draft("b", 1)).unwrap();
        let third = FormField::new(form_id, draft("c", 0)).unwrap();
        let mut fields = vec![second.clone(), first.clone(), third.clone()];
        sort_fields(&mut fields);
        // v7 ids are time-ordered, so the tie resolves to creation order.
        assert_eq!(
            fields.iter().map(|f| f.id).collect::<Vec<_>>(),
            vec![third.id, first.id, second.id]
        );
    }
}
