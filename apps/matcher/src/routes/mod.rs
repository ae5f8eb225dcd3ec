pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::matching::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_mb * 1024 * 1024;

    Router::new()
        .route("/health", get(health::health_handler))
        // Matching API
        .route("/api/v1/match", post(handlers::handle_match))
        .route("/api/v1/runs/:id", get(handlers::handle_get_run))
        .route("/api/v1/runs/:id/matrix.csv", get(handlers::handle_matrix_csv))
        .route(
            "/api/v1/runs/:id/top_candidates.csv",
            get(handlers::handle_top_candidates_csv),
        )
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}
