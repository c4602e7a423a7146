use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn welcome() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to the MARIS question bank API",
    }))
}

#[axum::debug_handler]
pub async fn health() -> impl IntoResponse {
    let body = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}
