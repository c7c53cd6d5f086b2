use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{analyze, ping};

pub fn analysis_routes() -> Router {
    Router::new()
        .route("/ping", get(ping))
        .route("/analyze", post(analyze))
}
