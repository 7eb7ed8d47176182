//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Domain-meaningful failures (FormClosed, OwnershipViolation, ...) are
//! returned as `AppError` wrapped in `anyhow::Error` so the API layer
//! can downcast them back to status codes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{Form, FormField, FormResponse, FormStatus, ResponseAnswer};

/// Listing filter for a user's own forms.
#[derive(Debug, Clone, Default)]
pub struct FormFilter {
    pub status: Option<FormStatus>,
    /// Matched against title and description, case-insensitively.
    pub search: Option<String>,
}

/// Aggregate counts for the owner dashboard.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FormStatistics {
    pub total_responses: i64,
    pub responses_today: i64,
    pub responses_this_week: i64,
    pub responses_this_month: i64,
}

/// Data persistence contract for forms, fields, responses, and answers.
#[async_trait]
pub trait FormRepo: Send + Sync {
    // Form operations
    async fn create_form(&self, form: Form) -> anyhow::Result<()>;
    /// Atomic insert of a form together with its fields; used by
    /// duplication so a half-copied form is never observable.
    async fn create_form_with_fields(
        &self,
        form: Form,
        fields: Vec<FormField>,
    ) -> anyhow::Result<()>;
    async fn get_form(&self, id: Uuid) -> anyhow::Result<Option<Form>>;
    async fn get_form_by_slug(&self, slug: &str) -> anyhow::Result<Option<Form>>;
    async fn list_forms(&self, owner: Uuid, filter: FormFilter) -> anyhow::Result<Vec<Form>>;
    async fn update_form(&self, form: Form) -> anyhow::Result<()>;
    async fn delete_form(&self, id: Uuid) -> anyhow::Result<()>;
    async fn statistics(&self, form_id: Uuid, now: DateTime<Utc>)
        -> anyhow::Result<FormStatistics>;

    // Field operations
    async fn create_field(&self, field: FormField) -> anyhow::Result<()>;
    async fn get_field(&self, id: Uuid) -> anyhow::Result<Option<FormField>>;
    async fn list_fields(&self, form_id: Uuid) -> anyhow::Result<Vec<FormField>>;
    async fn update_field(&self, field: FormField) -> anyhow::Result<()>;
    async fn delete_field(&self, id: Uuid) -> anyhow::Result<()>;
    /// Bulk order reassignment, all-or-nothing. Any id outside the form
    /// aborts the whole batch with `AppError::OwnershipViolation`.
    async fn reorder_fields(&self, form_id: Uuid, orders: Vec<(Uuid, i32)>) -> anyhow::Result<()>;

    // Response operations
    async fn count_responses(&self, form_id: Uuid) -> anyhow::Result<i64>;
    /// Atomic persistence of one response plus its answers. Re-checks
    /// the response limit inside the transaction and fails with
    /// `AppError::FormClosed` if a concurrent submission took the last
    /// slot. Partial writes are rolled back.
    async fn create_response(
        &self,
        form: &Form,
        response: FormResponse,
        answers: Vec<ResponseAnswer>,
    ) -> anyhow::Result<()>;
    async fn get_response(
        &self,
        id: Uuid,
    ) -> anyhow::Result<Option<(FormResponse, Vec<ResponseAnswer>)>>;
    async fn list_responses(
        &self,
        form_id: Uuid,
    ) -> anyhow::Result<Vec<(FormResponse, Vec<ResponseAnswer>)>>;
    async fn delete_response(&self, id: Uuid) -> anyhow::Result<()>;
}

/// Storage contract for uploaded answer files.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Saves raw bytes and returns the stored path, the only durable
    /// reference kept in an Answer.
    async fn save(&self, data: Vec<u8>, original_filename: &str) -> anyhow::Result<String>;
    /// Public URL for a stored path, derived at read time.
    fn url(&self, path: &str) -> String;
    /// Removes the stored file. Callers treat failure as a warning, not
    /// a blocker, when deleting answers.
    async fn delete(&self, path: &str) -> anyhow::Result<()>;
}

/// Identity contract: maps bearer tokens to user ids. Full session and
/// account management lives outside this core.
pub trait IdentityProvider: Send + Sync {
    fn issue_token(&self, user_id: Uuid) -> String;
    fn authenticate(&self, token: &str) -> Option<Uuid>;
}
