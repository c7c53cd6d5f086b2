use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{Session, User};

use crate::models::OAuthProvider;

/// The external identity provider. One call per operation; no retries.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session>;

    async fn update_display_name(&self, access_token: &str, display_name: &str) -> Result<User>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_in_with_id_token(
        &self,
        provider: OAuthProvider,
        id_token: &str,
        nonce: Option<String>,
    ) -> Result<Session>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct GoTrueUser {
    id: String,
    email: Option<String>,
    role: Option<String>,
    user_metadata: Option<Value>,
    created_at: Option<DateTime<Utc>>,
}

impl From<GoTrueUser> for User {
    fn from(user: GoTrueUser) -> Self {
        User {
            display_name: User::display_name_from_metadata(user.user_metadata.as_ref()),
            id: user.id,
            email: user.email,
            role: user.role,
            metadata: user.user_metadata,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GoTrueSession {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: GoTrueUser,
}

impl From<GoTrueSession> for Session {
    fn from(session: GoTrueSession) -> Self {
        let expires_at = session
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .or_else(|| session.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));

        Session {
            access_token: session.access_token,
            refresh_token: session.refresh_token,
            expires_at,
            user: session.user.into(),
        }
    }
}

/// Supabase GoTrue (`/auth/v1`) implementation.
pub struct SupabaseIdentityProvider {
    supabase: SupabaseClient,
}

impl SupabaseIdentityProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session> {
        let path = format!("/auth/v1/token?grant_type={}", grant_type);
        let session: GoTrueSession = self.supabase.request(
            Method::POST,
            &path,
            None,
            Some(body),
        ).await?;

        Ok(session.into())
    }
}

#[async_trait]
impl IdentityProvider for SupabaseIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Session> {
        debug!("Creating account for {}", email);

        let response: Value = self.supabase.request(
            Method::POST,
            "/auth/v1/signup",
            None,
            Some(json!({ "email": email, "password": password })),
        ).await?;

        // Without auto-confirm GoTrue answers with the bare user and no session.
        if response.get("access_token").is_none() {
            return Err(anyhow!("Check {} to confirm the account before signing in", email));
        }

        let session: GoTrueSession = serde_json::from_value(response)?;
        info!("Account created for user {}", session.user.id);
        Ok(session.into())
    }

    async fn update_display_name(&self, access_token: &str, display_name: &str) -> Result<User> {
        let user: GoTrueUser = self.supabase.request(
            Method::PUT,
            "/auth/v1/user",
            Some(access_token),
            Some(json!({ "data": { "display_name": display_name } })),
        ).await?;

        Ok(user.into())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        debug!("Password sign-in for {}", email);
        self.token_grant("password", json!({ "email": email, "password": password })).await
    }

    async fn sign_in_with_id_token(
        &self,
        provider: OAuthProvider,
        id_token: &str,
        nonce: Option<String>,
    ) -> Result<Session> {
        debug!("{} sign-in", provider.as_str());

        let mut body = json!({
            "provider": provider.as_str(),
            "id_token": id_token,
        });
        if let Some(nonce) = nonce {
            body["nonce"] = json!(nonce);
        }

        self.token_grant("id_token", body).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        self.supabase.request_empty(
            Method::POST,
            "/auth/v1/logout",
            Some(access_token),
            None,
        ).await
    }
}
