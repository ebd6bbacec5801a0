use axum::{Router, routing::get};
use tower_http::cors::CorsLayer;

use super::api;
use crate::app::SharedState;

/// Create the axum router with all routes.
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/api/config", get(api::config::list_modules))
        .route(
            "/api/config/{module}",
            get(api::config::get_config).post(api::config::update_config),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn status_handler() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
