pub mod ai_actions;
pub mod protocol;
pub mod rest;
pub mod state;

use axum::{extract::DefaultBodyLimit, response::Json, routing::get, routing::post, Router};
use std::sync::Arc;
use utoipa::OpenApi;

pub use ai_actions::ai_action_handler;
pub use rest::ApiDoc;
pub use state::AppState;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Builds every route of the service around the shared state.
///
/// Cross-cutting layers (CORS, request tracing) are added by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(rest::home_handler))
        .route("/templates", get(rest::list_templates_handler))
        .route("/templates/{id}", get(rest::template_detail_handler))
        .route("/templates/kind/{doc_type}", get(rest::template_by_kind_handler))
        .route("/templates/{id}/preview", post(rest::preview_handler))
        .route(
            "/templates/{id}/generate",
            get(rest::generate_form_handler).post(rest::generate_handler),
        )
        .route("/download", post(rest::download_handler))
        .route("/api/ai/", post(ai_action_handler))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(app_state)
}
