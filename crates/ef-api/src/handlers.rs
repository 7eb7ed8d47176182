//! # ef-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core
//! traits. Ownership is checked against the bearer token on every
//! owner-facing route; public routes resolve forms by slug only.

use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use ef_core::error::AppError;
use ef_core::export::project_responses;
use ef_core::fields::FieldType;
use ef_core::models::{FieldDraft, FieldUpdate, Form, FormField, FormStatus};
use ef_core::traits::{FormFilter, FormRepo, IdentityProvider, UploadStore};
use ef_core::validation::{validate_submission, SubmissionMeta};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::extract::read_submission;

/// State shared across all workers.
pub struct AppState {
    pub repo: Box<dyn FormRepo>,
    pub store: Box<dyn UploadStore>,
    pub auth: Box<dyn IdentityProvider>,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn optional_user(req: &HttpRequest, state: &AppState) -> Option<Uuid> {
    bearer_token(req).and_then(|token| state.auth.authenticate(token))
}

fn require_user(req: &HttpRequest, state: &AppState) -> ApiResult<Uuid> {
    optional_user(req, state).ok_or_else(|| AppError::LoginRequired.into())
}

/// Loads a form and verifies the caller owns it.
async fn owned_form(state: &AppState, form_id: Uuid, user: Uuid) -> ApiResult<Form> {
    let form = state
        .repo
        .get_form(form_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| AppError::NotFound("Form".to_string(), form_id.to_string()))?;
    if form.user_id != user {
        return Err(AppError::Unauthorized("you do not own this form".to_string()).into());
    }
    Ok(form)
}

// ── Builder catalogue ────────────────────────────────────────────────────────

/// Lists the closed field-type set with capabilities, for the builder UI.
pub async fn field_types() -> HttpResponse {
    let types: Vec<_> = FieldType::ALL
        .into_iter()
        .map(|t| {
            json!({
                "type": t.as_str(),
                "label": t.display_name(),
                "capabilities": t.capabilities(),
            })
        })
        .collect();
    HttpResponse::Ok().json(types)
}

// ── Form CRUD ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub search: Option<String>,
}

pub async fn list_forms(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let status = query
        .status
        .as_deref()
        .map(FormStatus::parse)
        .transpose()?;
    let forms = state
        .repo
        .list_forms(
            user,
            FormFilter {
                status,
                search: query.search.clone(),
            },
        )
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "forms": forms })))
}

#[derive(Debug, Deserialize)]
pub struct CreateForm {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub settings: Option<serde_json::Value>,
}

pub async fn create_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<CreateForm>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let body = body.into_inner();
    let form = Form::new(
        user,
        body.title,
        body.description,
        body.settings.unwrap_or_else(|| json!({})),
    )?;
    state
        .repo
        .create_form(form.clone())
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Form created successfully",
        "form": form,
    })))
}

pub async fn get_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    let fields = state.repo.list_fields(form.id).await.map_err(ApiError::from)?;
    let response_count = state
        .repo
        .count_responses(form.id)
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(json!({
        "form": form,
        "fields": fields,
        "response_count": response_count,
    })))
}

/// Keeps an explicit JSON `null` distinguishable from an absent key, so
/// a nullable setting can be cleared as well as set.
fn clearable<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::deserialize(de)?))
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateForm {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "clearable")]
    pub description: Option<Option<String>>,
    pub status: Option<FormStatus>,
    pub settings: Option<serde_json::Value>,
    pub is_public: Option<bool>,
    pub accept_responses: Option<bool>,
    pub show_progress_bar: Option<bool>,
    pub shuffle_questions: Option<bool>,
    pub limit_responses: Option<bool>,
    #[serde(default, deserialize_with = "clearable")]
    pub max_responses: Option<Option<i32>>,
    pub require_login: Option<bool>,
    #[serde(default, deserialize_with = "clearable")]
    pub custom_thank_you_message: Option<Option<String>>,
}

pub async fn update_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<UpdateForm>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let mut form = owned_form(&state, path.into_inner(), user).await?;
    let body = body.into_inner();

    if let Some(title) = body.title {
        if title.trim().is_empty() {
            return Err(AppError::ValidationError("title is required".to_string()).into());
        }
        form.title = title;
    }
    if let Some(description) = body.description {
        form.description = description;
    }
    if let Some(settings) = body.settings {
        form.settings = settings;
    }
    if let Some(v) = body.is_public {
        form.is_public = v;
    }
    if let Some(v) = body.accept_responses {
        form.accept_responses = v;
    }
    if let Some(v) = body.show_progress_bar {
        form.show_progress_bar = v;
    }
    if let Some(v) = body.shuffle_questions {
        form.shuffle_questions = v;
    }
    if let Some(v) = body.limit_responses {
        form.limit_responses = v;
    }
    if let Some(v) = body.max_responses {
        form.max_responses = v;
    }
    if let Some(v) = body.require_login {
        form.require_login = v;
    }
    if let Some(v) = body.custom_thank_you_message {
        form.custom_thank_you_message = v;
    }
    if let Some(status) = body.status {
        // Publishing re-checks every field's configuration so a form
        // with a half-configured dropdown never goes live.
        if status == FormStatus::Published && form.status != FormStatus::Published {
            let fields = state.repo.list_fields(form.id).await.map_err(ApiError::from)?;
            for field in &fields {
                field.validate_config()?;
            }
        }
        form.status = status;
    }

    state
        .repo
        .update_form(form.clone())
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Form updated successfully",
        "form": form,
    })))
}

pub async fn delete_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    // Remove stored upload files before the rows cascade away.
    let responses = state.repo.list_responses(form.id).await.map_err(ApiError::from)?;
    state.repo.delete_form(form.id).await.map_err(ApiError::from)?;
    for (_, answers) in &responses {
        discard_files(state.store.as_ref(), answers.iter().filter_map(|a| a.value.file_path()))
            .await;
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Form deleted successfully" })))
}

pub async fn duplicate_form(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    let fields = state.repo.list_fields(form.id).await.map_err(ApiError::from)?;

    let copy = form.duplicate();
    let copied_fields: Vec<FormField> = fields.iter().map(|f| f.duplicate_for(copy.id)).collect();
    state
        .repo
        .create_form_with_fields(copy.clone(), copied_fields.clone())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Form duplicated successfully",
        "form": copy,
        "fields": copied_fields,
    })))
}

pub async fn statistics(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    let stats = state
        .repo
        .statistics(form.id, Utc::now())
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(stats))
}

// ── Field CRUD ───────────────────────────────────────────────────────────────

pub async fn create_field(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<FieldDraft>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    let field = FormField::new(form.id, body.into_inner())?;
    state
        .repo
        .create_field(field.clone())
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Field created successfully",
        "field": field,
    })))
}

/// Loads a field and verifies it belongs to the given form.
async fn form_field(state: &AppState, form: &Form, field_id: Uuid) -> ApiResult<FormField> {
    let field = state
        .repo
        .get_field(field_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| AppError::NotFound("Field".to_string(), field_id.to_string()))?;
    if field.form_id != form.id {
        return Err(AppError::Unauthorized("field belongs to another form".to_string()).into());
    }
    Ok(field)
}

pub async fn update_field(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
    body: web::Json<FieldUpdate>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let (form_id, field_id) = path.into_inner();
    let form = owned_form(&state, form_id, user).await?;
    let mut field = form_field(&state, &form, field_id).await?;
    field.apply_update(body.into_inner())?;
    state
        .repo
        .update_field(field.clone())
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Field updated successfully",
        "field": field,
    })))
}

pub async fn delete_field(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let (form_id, field_id) = path.into_inner();
    let form = owned_form(&state, form_id, user).await?;
    let field = form_field(&state, &form, field_id).await?;
    // Answers for the field cascade away with it; collect any stored
    // upload files first so they do not become orphans.
    let responses = state.repo.list_responses(form.id).await.map_err(ApiError::from)?;
    state.repo.delete_field(field.id).await.map_err(ApiError::from)?;
    let paths = responses.iter().flat_map(|(_, answers)| {
        answers
            .iter()
            .filter(|a| a.field_id == field.id)
            .filter_map(|a| a.value.file_path())
    });
    discard_files(state.store.as_ref(), paths).await;
    Ok(HttpResponse::Ok().json(json!({ "message": "Field deleted successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct ReorderEntry {
    pub id: Uuid,
    pub order: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    pub fields: Vec<ReorderEntry>,
}

pub async fn reorder_fields(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<ReorderBody>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    let orders = body.into_inner().fields.into_iter().map(|f| (f.id, f.order)).collect();
    state
        .repo
        .reorder_fields(form.id, orders)
        .await
        .map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Fields reordered successfully" })))
}

#[derive(Debug, Deserialize)]
pub struct BulkEntry {
    pub id: Option<Uuid>,
    #[serde(flatten)]
    pub update: FieldUpdate,
}

#[derive(Debug, Deserialize)]
pub struct BulkBody {
    pub fields: Vec<BulkEntry>,
}

/// Upserts a batch of fields: entries with an id update, entries
/// without create.
pub async fn bulk_update_fields(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<BulkBody>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;

    for entry in body.into_inner().fields {
        match entry.id {
            Some(field_id) => {
                let mut field = form_field(&state, &form, field_id).await?;
                field.apply_update(entry.update)?;
                state.repo.update_field(field).await.map_err(ApiError::from)?;
            }
            None => {
                let update = entry.update;
                let field_type = update.field_type.ok_or_else(|| {
                    AppError::ValidationError("new fields need a type".to_string())
                })?;
                let label = update.label.ok_or_else(|| {
                    AppError::ValidationError("new fields need a label".to_string())
                })?;
                let field = FormField::new(
                    form.id,
                    FieldDraft {
                        field_type,
                        label,
                        placeholder: update.placeholder,
                        help_text: update.help_text,
                        options: update.options,
                        rows: update.rows,
                        columns: update.columns,
                        validation_rules: update.validation_rules.unwrap_or_default(),
                        is_required: update.is_required.unwrap_or(false),
                        order: update.order.unwrap_or(0),
                        conditional_logic: update.conditional_logic.unwrap_or_default(),
                    },
                )?;
                state.repo.create_field(field).await.map_err(ApiError::from)?;
            }
        }
    }

    let fields = state.repo.list_fields(form.id).await.map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Fields updated successfully",
        "fields": fields,
    })))
}

// ── Public form + submission ────────────────────────────────────────────────

pub async fn public_form(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let slug = path.into_inner();
    let form = state
        .repo
        .get_form_by_slug(&slug)
        .await
        .map_err(ApiError::from)?
        .filter(|f| f.status == FormStatus::Published && f.is_public)
        .ok_or_else(|| AppError::NotFound("Form".to_string(), slug.clone()))?;
    let fields = state.repo.list_fields(form.id).await.map_err(ApiError::from)?;
    Ok(HttpResponse::Ok().json(json!({ "form": form, "fields": fields })))
}

/// The public submission endpoint: parses the candidate answers, runs
/// the validation engine, and persists atomically. Uploaded files from
/// a rejected submission are discarded again.
pub async fn submit_response(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Payload,
) -> ApiResult<HttpResponse> {
    let slug = path.into_inner();
    let form = state
        .repo
        .get_form_by_slug(&slug)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| AppError::NotFound("Form".to_string(), slug.clone()))?;

    let ip_address = req
        .connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_string();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let meta = SubmissionMeta {
        user_id: optional_user(&req, &state),
        ip_address,
        user_agent,
    };

    let parsed = read_submission(&req, payload, state.store.as_ref()).await?;
    let fields = state.repo.list_fields(form.id).await.map_err(ApiError::from)?;
    let current_count = state
        .repo
        .count_responses(form.id)
        .await
        .map_err(ApiError::from)?;

    let staged = match validate_submission(&form, &fields, &parsed.answers, meta, current_count) {
        Ok(staged) => staged,
        Err(err) => {
            discard_files(state.store.as_ref(), parsed.uploaded_paths.iter().map(String::as_str))
                .await;
            return Err(err.into());
        }
    };

    let response_id = staged.response.id;
    if let Err(err) = state
        .repo
        .create_response(&form, staged.response, staged.answers)
        .await
    {
        discard_files(state.store.as_ref(), parsed.uploaded_paths.iter().map(String::as_str))
            .await;
        return Err(err.into());
    }

    Ok(HttpResponse::Created().json(json!({
        "status": "accepted",
        "message": form
            .custom_thank_you_message
            .unwrap_or_else(|| "Form submitted successfully".to_string()),
        "response_id": response_id,
    })))
}

// ── Responses ────────────────────────────────────────────────────────────────

pub async fn list_responses(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    let responses = state.repo.list_responses(form.id).await.map_err(ApiError::from)?;
    let body: Vec<_> = responses
        .into_iter()
        .map(|(response, answers)| json!({ "response": response, "answers": answers }))
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "responses": body })))
}

async fn owned_response(
    state: &AppState,
    form: &Form,
    response_id: Uuid,
) -> ApiResult<(ef_core::models::FormResponse, Vec<ef_core::models::ResponseAnswer>)> {
    let (response, answers) = state
        .repo
        .get_response(response_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| AppError::NotFound("Response".to_string(), response_id.to_string()))?;
    if response.form_id != form.id {
        return Err(AppError::Unauthorized("response belongs to another form".to_string()).into());
    }
    Ok((response, answers))
}

pub async fn get_response(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let (form_id, response_id) = path.into_inner();
    let form = owned_form(&state, form_id, user).await?;
    let (response, answers) = owned_response(&state, &form, response_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "response": response, "answers": answers })))
}

pub async fn delete_response(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let (form_id, response_id) = path.into_inner();
    let form = owned_form(&state, form_id, user).await?;
    let (response, answers) = owned_response(&state, &form, response_id).await?;

    state
        .repo
        .delete_response(response.id)
        .await
        .map_err(ApiError::from)?;
    // File removal failures are warnings: the rows are gone either way,
    // an orphaned file on disk is an accepted failure mode.
    discard_files(state.store.as_ref(), answers.iter().filter_map(|a| a.value.file_path()))
        .await;

    Ok(HttpResponse::Ok().json(json!({ "message": "Response deleted successfully" })))
}

/// Best-effort removal of stored upload files.
async fn discard_files<'a>(store: &dyn UploadStore, paths: impl Iterator<Item = &'a str>) {
    for path in paths {
        if let Err(err) = store.delete(path).await {
            log::warn!("could not remove stored file {path}: {err}");
        }
    }
}

// ── Export ───────────────────────────────────────────────────────────────────

/// Flattened response table: one row per response, one column per
/// answerable field. Spreadsheet file rendering happens client-side.
pub async fn export_responses(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let user = require_user(&req, &state)?;
    let form = owned_form(&state, path.into_inner(), user).await?;
    let fields = state.repo.list_fields(form.id).await.map_err(ApiError::from)?;
    let responses = state.repo.list_responses(form.id).await.map_err(ApiError::from)?;

    let table = project_responses(&form, &fields, &responses, |p| state.store.url(p));
    Ok(HttpResponse::Ok().json(table))
}
