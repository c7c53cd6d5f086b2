use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, instrument, warn};

use shared_database::supabase::{error_message, is_timeout};
use shared_models::auth::{Session, User};
use shared_utils::in_flight::{Action, InFlight, InFlightGuard};

use crate::models::{validate_credentials, AuthError, OAuthProvider};
use crate::navigation::View;
use crate::services::identity::IdentityProvider;

const SESSION_OWNER: &str = "session";

/// Explicit session handle: owns the current session, publishes every change
/// on a watch channel, and is passed to whatever needs the identity.
pub struct SessionProvider {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<Option<Session>>,
    in_flight: InFlight,
}

impl SessionProvider {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            provider,
            state,
            in_flight: InFlight::new(),
        }
    }

    pub fn current_session(&self) -> Option<Session> {
        self.state.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<User> {
        self.state.borrow().as_ref().map(|session| session.user.clone())
    }

    /// Session-change notifications. The receiver starts at the current value.
    pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
        self.state.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_active(SESSION_OWNER, Action::Auth)
    }

    /// Where a navigation request actually lands given the current identity.
    pub fn resolve_view(&self, requested: View) -> View {
        requested.resolve(self.current_identity().as_ref())
    }

    fn begin(&self) -> Result<InFlightGuard, AuthError> {
        self.in_flight
            .try_begin(SESSION_OWNER, Action::Auth)
            .ok_or(AuthError::Busy)
    }

    fn publish(&self, session: Option<Session>) {
        self.state.send_replace(session);
    }

    #[instrument(skip(self, password, display_name))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<Session, AuthError> {
        validate_credentials(email, password)?;
        let _guard = self.begin()?;

        let mut session = self.provider
            .sign_up(email.trim(), password)
            .await
            .map_err(|e| AuthError::SignUp(describe(&e)))?;

        if let Some(name) = display_name.map(str::trim).filter(|name| !name.is_empty()) {
            let user = self.provider
                .update_display_name(&session.access_token, name)
                .await
                .map_err(|e| AuthError::SignUp(describe(&e)))?;
            session.user = user;
        }

        info!("Signed up {}", session.user.id);
        self.publish(Some(session.clone()));
        Ok(session)
    }

    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate_credentials(email, password)?;
        let _guard = self.begin()?;

        let session = self.provider
            .sign_in_with_password(email.trim(), password)
            .await
            .map_err(|e| AuthError::SignIn(describe(&e)))?;

        info!("Signed in {}", session.user.id);
        self.publish(Some(session.clone()));
        Ok(session)
    }

    pub async fn sign_in_with_google(&self, id_token: &str, nonce: Option<String>) -> Result<Session, AuthError> {
        self.sign_in_with_provider(OAuthProvider::Google, id_token, nonce).await
    }

    pub async fn sign_in_with_apple(&self, id_token: &str, nonce: Option<String>) -> Result<Session, AuthError> {
        self.sign_in_with_provider(OAuthProvider::Apple, id_token, nonce).await
    }

    async fn sign_in_with_provider(
        &self,
        provider: OAuthProvider,
        id_token: &str,
        nonce: Option<String>,
    ) -> Result<Session, AuthError> {
        let _guard = self.begin()?;

        let session = self.provider
            .sign_in_with_id_token(provider, id_token, nonce)
            .await
            .map_err(|e| AuthError::for_provider(provider, describe(&e)))?;

        info!("Signed in {} via {}", session.user.id, provider.as_str());
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Ends the session and returns the view to navigate to. The local session
    /// is kept if the provider refuses, so the user can retry.
    pub async fn sign_out(&self) -> Result<View, AuthError> {
        let _guard = self.begin()?;

        let Some(session) = self.current_session() else {
            return Ok(View::SignIn);
        };

        if let Err(e) = self.provider.sign_out(&session.access_token).await {
            warn!("Failed to log out {}: {}", session.user.id, e);
            return Err(AuthError::SignOut(describe(&e)));
        }

        info!("Signed out {}", session.user.id);
        self.publish(None);
        Ok(View::SignIn)
    }
}

pub(crate) fn describe(err: &anyhow::Error) -> String {
    if is_timeout(err) {
        return "the identity provider did not respond in time".to_string();
    }
    error_message(err)
}
