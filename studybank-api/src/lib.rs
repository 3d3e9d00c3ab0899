//! studybank-api library
//!
//! Backend service for administering cognitive-assessment studies:
//! researchers create batches of study access codes and export collected
//! results; participants submit test results against a study code.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use studybank_common::config::Settings;

pub mod allocator;
pub mod api;
pub mod batch;
pub mod db;
pub mod export;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, opened at startup and closed at shutdown
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, settings: Arc<Settings>) -> Self {
        Self { db, settings }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings);

    Router::new()
        .route("/", get(api::root))
        .route("/admin", get(api::admin_page))
        .route("/studies", post(api::create_studies_from_list))
        .route("/studies/upload-file", post(api::create_studies_from_upload))
        .route("/studies/download-file", post(api::download_studies_csv))
        .route("/studies/:study_id", get(api::get_study))
        .route("/tests", post(api::submit_test))
        .route(
            "/tests/single-test-type/download-file",
            post(api::download_single_test_type),
        )
        .route(
            "/tests/zip-archive/download-file",
            post(api::download_all_tests_zip),
        )
        .merge(api::health_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// CORS for the configured front-end origin(s). Either origin set to `*`
/// allows all origins, localhost or otherwise.
fn cors_layer(settings: &Settings) -> CorsLayer {
    let origins = settings.allowed_origins();
    if origins.iter().any(|o| *o == "*") {
        return CorsLayer::permissive();
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}
