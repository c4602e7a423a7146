pub mod examinations;
pub mod health;
pub mod question_banks;
pub mod questions;

use axum::{
    extract::{DefaultBodyLimit, FromRequest},
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{config::get_config, error::Error, middleware, AppState};

/// `Json` body extractor whose rejections render as `{"error": ...}` with 400.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);

/// Routes under `/api/v1` behind bearer auth, plus the open liveness routes.
pub fn build_router(state: AppState) -> Router {
    let config = get_config();

    let api = Router::new()
        .route(
            "/api/v1/examinations",
            post(examinations::create_examination),
        )
        .route(
            "/api/v1/questions/generate",
            post(questions::generate_questions),
        )
        .route(
            "/api/v1/questions/rephrase",
            post(questions::rephrase_question),
        )
        .route(
            "/api/v1/questions/save-to-bank",
            post(questions::save_to_bank),
        )
        .route(
            "/api/v1/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route(
            "/api/v1/questions/:id",
            get(questions::get_question)
                .patch(questions::update_question)
                .delete(questions::delete_question),
        )
        .route(
            "/api/v1/question-banks",
            get(question_banks::list_banks).post(question_banks::create_bank),
        )
        .route(
            "/api/v1/question-banks/:id",
            get(question_banks::get_bank)
                .put(question_banks::update_bank)
                .delete(question_banks::delete_bank),
        )
        .route(
            "/api/v1/question-banks/:id/questions",
            get(question_banks::list_bank_questions)
                .post(question_banks::add_questions)
                .delete(question_banks::remove_questions),
        )
        .layer(axum::middleware::from_fn(
            middleware::auth::require_bearer_auth,
        ));

    let base_routes = Router::new()
        .route("/", get(health::welcome))
        .route("/api/v1/health", get(health::health));

    base_routes
        .merge(api)
        .with_state(state)
        .layer(middleware::cors::configured_cors(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
}
