//! # eForms Binary
//!
//! The entry point that assembles the application based on compile-time features.

use actix_web::{web, App, HttpServer};
use ef_api::AppState;

// Feature-gated imports: This is the "Compiled-to-Order" magic
#[cfg(feature = "db-sqlite")]
use ef_db_sqlite::SqliteFormRepo;

#[cfg(feature = "storage-local")]
use ef_storage_local::LocalUploadStore;

#[cfg(feature = "auth-simple")]
use ef_auth_simple::SimpleIdentityProvider;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let database_url = env_or("EFORMS_DATABASE_URL", "sqlite:eforms.db");
    let bind_addr = env_or("EFORMS_BIND_ADDR", "127.0.0.1:8080");
    let upload_dir = env_or("EFORMS_UPLOAD_DIR", "./data/uploads");
    let upload_url_prefix = env_or("EFORMS_UPLOAD_URL_PREFIX", "/static/uploads");
    let auth_secret = env_or("EFORMS_AUTH_SECRET", "change-me");

    // 1. Initialize Database Implementation
    #[cfg(feature = "db-sqlite")]
    let repo = SqliteFormRepo::new(&database_url)
        .await
        .expect("Failed to init SQLite");

    // 2. Initialize Storage Implementation
    #[cfg(feature = "storage-local")]
    let store = LocalUploadStore::new(upload_dir.clone().into(), upload_url_prefix.clone());

    // 3. Initialize Auth Implementation
    #[cfg(feature = "auth-simple")]
    let auth = SimpleIdentityProvider::new(&auth_secret);

    // 4. Wrap in AppState (Using dynamic dispatch for maximum flexibility)
    let state = web::Data::new(AppState {
        repo: Box::new(repo),
        store: Box::new(store),
        auth: Box::new(auth),
    });

    log::info!("🚀 eForms starting on http://{bind_addr}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(ef_api::middleware::standard_middleware())
            .wrap(ef_api::middleware::cors_policy())
            .configure(ef_api::configure_routes)
            .service(actix_files::Files::new(&upload_url_prefix, &upload_dir))
    })
    .bind(bind_addr)?
    .run()
    .await
}
