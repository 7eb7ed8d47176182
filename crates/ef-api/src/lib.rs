//! # ef-api
//!
//! The web routing and orchestration layer for eForms.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;

pub use handlers::AppState;

use actix_web::web;

/// Configures the routes for the forms API.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API under different paths if needed (e.g., /api/v1/).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Builder catalogue
            .route("/field-types", web::get().to(handlers::field_types))
            // Form CRUD (owner-facing)
            .route("/forms", web::get().to(handlers::list_forms))
            .route("/forms", web::post().to(handlers::create_form))
            .route("/forms/{form_id}", web::get().to(handlers::get_form))
            .route("/forms/{form_id}", web::put().to(handlers::update_form))
            .route("/forms/{form_id}", web::delete().to(handlers::delete_form))
            .route("/forms/{form_id}/duplicate", web::post().to(handlers::duplicate_form))
            .route("/forms/{form_id}/statistics", web::get().to(handlers::statistics))
            // Field CRUD; "reorder" and "bulk" before the id route
            .route("/forms/{form_id}/fields", web::post().to(handlers::create_field))
            .route("/forms/{form_id}/fields/reorder", web::put().to(handlers::reorder_fields))
            .route("/forms/{form_id}/fields/bulk", web::put().to(handlers::bulk_update_fields))
            .route("/forms/{form_id}/fields/{field_id}", web::put().to(handlers::update_field))
            .route(
                "/forms/{form_id}/fields/{field_id}",
                web::delete().to(handlers::delete_field),
            )
            // Responses
            .route("/forms/{form_id}/responses", web::get().to(handlers::list_responses))
            .route(
                "/forms/{form_id}/responses/export",
                web::get().to(handlers::export_responses),
            )
            .route(
                "/forms/{form_id}/responses/{response_id}",
                web::get().to(handlers::get_response),
            )
            .route(
                "/forms/{form_id}/responses/{response_id}",
                web::delete().to(handlers::delete_response),
            )
            // Public renderer and submission, by slug
            .route("/public/{slug}", web::get().to(handlers::public_form))
            .route("/public/{slug}/submit", web::post().to(handlers::submit_response)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header;
    use actix_web::{test, App};
    use ef_auth_simple::SimpleIdentityProvider;
    use ef_core::fields::FieldType;
    use ef_core::models::{FieldDraft, Form, FormField, FormResponse, FormStatus, ResponseAnswer};
    use ef_core::traits::{FormRepo, IdentityProvider, UploadStore};
    use ef_core::value::StoredValue;
    use ef_db_sqlite::SqliteFormRepo;
    use ef_storage_local::LocalUploadStore;
    use serde_json::{json, Value};
    use uuid::Uuid;

    async fn test_state() -> AppState {
        let store_root = std::env::temp_dir().join(format!("eforms-api-{}", Uuid::now_v7()));
        AppState {
            repo: Box::new(SqliteFormRepo::in_memory().await.unwrap()),
            store: Box::new(LocalUploadStore::new(store_root, "/uploads".to_string())),
            auth: Box::new(SimpleIdentityProvider::new("test-secret")),
        }
    }

    fn auth_header(state: &AppState, user: Uuid) -> (header::HeaderName, String) {
        (
            header::AUTHORIZATION,
            format!("Bearer {}", state.auth.issue_token(user)),
        )
    }

    async fn seed_published_form(state: &AppState, user: Uuid) -> (Form, FormField) {
        let mut form = Form::new(user, "Survey".to_string(), None, json!({})).unwrap();
        form.status = FormStatus::Published;
        let draft: FieldDraft = serde_json::from_value(json!({
            "type": "short_text",
            "label": "Name",
            "is_required": true,
        }))
        .unwrap();
        let field = FormField::new(form.id, draft).unwrap();
        state
            .repo
            .create_form_with_fields(form.clone(), vec![field.clone()])
            .await
            .unwrap();
        (form, field)
    }

    #[tokio::test]
    async fn owner_routes_require_a_token() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/forms").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[tokio::test]
    async fn field_type_catalogue_is_complete() {
        let state = test_state().await;
        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/field-types").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let types = body.as_array().unwrap();
        assert_eq!(types.len(), FieldType::ALL.len());
        assert!(types.iter().any(|t| t["type"] == "multiple_choice_grid"
            && t["capabilities"]["needs_grid"] == true));
    }

    #[tokio::test]
    async fn form_lifecycle_over_http() {
        let state = test_state().await;
        let user = Uuid::now_v7();
        let (name, value) = auth_header(&state, user);
        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/forms")
            .insert_header((name.clone(), value.clone()))
            .set_json(json!({ "title": "Event RSVP" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let form_id = body["form"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["form"]["status"], "draft");

        let req = test::TestRequest::put()
            .uri(&format!("/api/forms/{form_id}"))
            .insert_header((name.clone(), value.clone()))
            .set_json(json!({
                "title": "Event RSVP 2026",
                "status": "published",
                "description": "All welcome",
                "max_responses": 50,
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["form"]["status"], "published");
        assert_eq!(body["form"]["description"], "All welcome");
        assert_eq!(body["form"]["max_responses"], 50);

        // Explicit nulls clear nullable settings; absent keys leave them.
        let req = test::TestRequest::put()
            .uri(&format!("/api/forms/{form_id}"))
            .insert_header((name.clone(), value.clone()))
            .set_json(json!({ "description": null, "max_responses": null }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["form"]["description"], Value::Null);
        assert_eq!(body["form"]["max_responses"], Value::Null);
        assert_eq!(body["form"]["title"], "Event RSVP 2026");

        // A different user cannot see it.
        let other = Uuid::now_v7();
        let req = test::TestRequest::get()
            .uri(&format!("/api/forms/{form_id}"))
            .insert_header((
                name.clone(),
                format!(
                    "Bearer {}",
                    SimpleIdentityProvider::new("test-secret").issue_token(other)
                ),
            ))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[tokio::test]
    async fn submission_round_trip_and_rejection() {
        let state = test_state().await;
        let user = Uuid::now_v7();
        let (form, field) = seed_published_form(&state, user).await;
        let (name, value) = auth_header(&state, user);
        let slug = form.slug.clone();
        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        // Missing required answer: rejected with the field error list.
        let req = test::TestRequest::post()
            .uri(&format!("/api/public/{slug}/submit"))
            .set_json(json!({ "answers": {} }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 422);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "rejected");
        assert_eq!(body["errors"][0]["kind"], "missing_required");

        // Valid submission is accepted.
        let req = test::TestRequest::post()
            .uri(&format!("/api/public/{slug}/submit"))
            .set_json(json!({ "answers": { field.id.to_string(): "Ada" } }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "accepted");

        // The owner sees it in the export projection.
        let req = test::TestRequest::get()
            .uri(&format!("/api/forms/{}/responses/export", form.id))
            .insert_header((name, value))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["headings"][4], "Name");
        assert_eq!(body["rows"][0][4], "Ada");
    }

    #[tokio::test]
    async fn deleting_an_upload_field_discards_its_stored_files() {
        let store_root = std::env::temp_dir().join(format!("eforms-api-{}", Uuid::now_v7()));
        let store = LocalUploadStore::new(store_root.clone(), "/uploads".to_string());
        let stored_path = store.save(b"resume bytes".to_vec(), "cv.pdf").await.unwrap();

        let repo = SqliteFormRepo::in_memory().await.unwrap();
        let user = Uuid::now_v7();
        let mut form = Form::new(user, "Jobs".to_string(), None, json!({})).unwrap();
        form.status = FormStatus::Published;
        let draft: FieldDraft =
            serde_json::from_value(json!({ "type": "file_upload", "label": "CV" })).unwrap();
        let field = FormField::new(form.id, draft).unwrap();
        repo.create_form_with_fields(form.clone(), vec![field.clone()])
            .await
            .unwrap();
        let response = FormResponse::new(form.id, None, "ip".into(), "ua".into());
        let answer = ResponseAnswer::new(
            response.id,
            field.id,
            StoredValue::File {
                path: stored_path.clone(),
                original_filename: "cv.pdf".into(),
            },
        );
        repo.create_response(&form, response, vec![answer]).await.unwrap();

        let state = AppState {
            repo: Box::new(repo),
            store: Box::new(store),
            auth: Box::new(SimpleIdentityProvider::new("test-secret")),
        };
        let (name, value) = auth_header(&state, user);
        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::delete()
            .uri(&format!("/api/forms/{}/fields/{}", form.id, field.id))
            .insert_header((name, value))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert!(!store_root.join(&stored_path).exists());
    }

    #[tokio::test]
    async fn draft_forms_are_not_publicly_visible() {
        let state = test_state().await;
        let user = Uuid::now_v7();
        let form = Form::new(user, "Hidden".to_string(), None, json!({})).unwrap();
        let slug = form.slug.clone();
        state.repo.create_form(form).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(actix_web::web::Data::new(state))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/api/public/{slug}"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
