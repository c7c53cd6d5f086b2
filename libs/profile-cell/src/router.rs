use std::sync::Arc;

use axum::{
    middleware,
    routing::{patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{
    analyze_profile, apply_form_edit, list_profiles, save_profile, update_profile, ProfileState,
};

/// Profile routes. Every route requires a valid bearer JWT.
pub fn profile_routes(config: Arc<AppConfig>) -> Router {
    let state = ProfileState::new(config.clone());

    Router::new()
        .route("/form", post(apply_form_edit))
        .route("/analyze", post(analyze_profile))
        .route("/", post(save_profile).get(list_profiles))
        .route("/{id}", patch(update_profile))
        .layer(middleware::from_fn_with_state(config, auth_middleware))
        .with_state(state)
}
