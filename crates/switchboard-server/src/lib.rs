//! Switchboard server library logic.

pub mod api;
pub mod api_assistant;
pub mod api_auth;
pub mod api_call;
pub mod api_sip;
pub mod api_tool;
pub mod config;
pub mod middleware;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use switchboard_db::DbPool;
use switchboard_voice::VoiceService;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Voice platform client.
    pub voice: Arc<VoiceService>,
}

/// Maximum request body size (2 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/auth/check-key", get(api_auth::check_key_handler))
        .route(
            "/assistant/create",
            post(api_assistant::create_assistant_handler),
        )
        .route(
            "/assistant/update/{assistant_id}",
            patch(api_assistant::update_assistant_handler),
        )
        .route(
            "/assistant/list",
            get(api_assistant::list_assistants_handler),
        )
        .route(
            "/assistant/details/{assistant_id}",
            get(api_assistant::get_assistant_handler),
        )
        .route(
            "/sip/create-outbound-trunk",
            post(api_sip::create_trunk_handler),
        )
        .route("/sip/list", get(api_sip::list_trunks_handler))
        .route("/call/outbound", post(api_call::outbound_call_handler))
        .route("/tool/create", post(api_tool::create_tool_handler))
        .route("/tool/update/{tool_id}", patch(api_tool::update_tool_handler))
        .route("/tool/list", get(api_tool::list_tools_handler))
        .route("/tool/details/{tool_id}", get(api_tool::get_tool_handler))
        .route("/tool/delete/{tool_id}", delete(api_tool::delete_tool_handler))
        .route(
            "/tool/attach/{assistant_id}",
            post(api_tool::attach_tools_handler),
        )
        .route(
            "/tool/detach/{assistant_id}",
            post(api_tool::detach_tools_handler),
        )
        .layer(axum::middleware::from_fn(middleware::auth_middleware));

    Router::new()
        .route("/health", get(health))
        .route("/auth/create-key", post(api_auth::create_key_handler))
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
