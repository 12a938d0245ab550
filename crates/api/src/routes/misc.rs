use axum::{http::StatusCode, routing::get, Router};
use serde_json::json;

use crate::{response::ApiResponse, GlobalState};

pub fn misc_routes() -> Router<GlobalState> {
    Router::new().route("/health", get(health))
}

async fn health() -> ApiResponse {
    ApiResponse::new(StatusCode::OK).data(json!({
        "message": "Server is running successfully",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
