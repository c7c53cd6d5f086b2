use std::sync::Arc;

use axum::{routing::get, Router};

use auth_cell::router::auth_routes;
use profile_cell::router::profile_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "StrainLabs API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/profiles", profile_routes(state))
}
