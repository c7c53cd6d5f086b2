use std::sync::Arc;

use axum::{
    extract::{State, Json},
    http::{HeaderMap, StatusCode},
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{Session, TokenResponse};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt;

use crate::models::{AuthError, IdTokenSignInRequest, SignInRequest, SignUpRequest};
use crate::navigation::View;
use crate::services::identity::{IdentityProvider, SupabaseIdentityProvider};
use crate::services::session::{describe, SessionProvider};

// Each request gets its own session handle; the backend keeps no session state.
fn session_provider(config: &AppConfig) -> SessionProvider {
    SessionProvider::new(Arc::new(SupabaseIdentityProvider::new(config)))
}

pub async fn sign_up(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<Session>), AppError> {
    debug!("Sign-up request for {}", request.email);

    let session = session_provider(&config)
        .sign_up(&request.email, &request.password, request.display_name.as_deref())
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn sign_in(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<SignInRequest>,
) -> Result<Json<Session>, AppError> {
    let session = session_provider(&config)
        .sign_in(&request.email, &request.password)
        .await?;

    Ok(Json(session))
}

pub async fn sign_in_with_google(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<IdTokenSignInRequest>,
) -> Result<Json<Session>, AppError> {
    let session = session_provider(&config)
        .sign_in_with_google(&request.id_token, request.nonce)
        .await?;

    Ok(Json(session))
}

pub async fn sign_in_with_apple(
    State(config): State<Arc<AppConfig>>,
    Json(request): Json<IdTokenSignInRequest>,
) -> Result<Json<Session>, AppError> {
    let session = session_provider(&config)
        .sign_in_with_apple(&request.id_token, request.nonce)
        .await?;

    Ok(Json(session))
}

pub async fn sign_out(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let token = bearer_token(&headers)?;

    SupabaseIdentityProvider::new(&config)
        .sign_out(&token)
        .await
        .map_err(|e| AuthError::SignOut(describe(&e)))?;

    Ok(Json(json!({ "signed_out": true, "redirect": View::SignIn.path() })))
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = bearer_token(&headers)?;

    let user = jwt::validate_token(&token, &config.supabase_jwt_secret)
        .map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = bearer_token(&headers)?;
    let valid = jwt::validate_token(&token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}
