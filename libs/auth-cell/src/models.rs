use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Body for Google/Apple sign-in: the ID token the provider issued to the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenSignInRequest {
    pub id_token: String,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Google,
    Apple,
}

impl OAuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Apple => "apple",
        }
    }
}

/// Auth failures, each carrying the label shown next to the sign-in form.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Failed to create an account: {0}")]
    SignUp(String),

    #[error("Failed to sign in: {0}")]
    SignIn(String),

    #[error("Failed to sign in with Google: {0}")]
    Google(String),

    #[error("Failed to sign in with Apple: {0}")]
    Apple(String),

    #[error("Failed to log out: {0}")]
    SignOut(String),

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Please enter your password")]
    MissingPassword,

    #[error("An authentication request is already in progress")]
    Busy,
}

impl AuthError {
    pub fn for_provider(provider: OAuthProvider, message: String) -> Self {
        match provider {
            OAuthProvider::Google => AuthError::Google(message),
            OAuthProvider::Apple => AuthError::Apple(message),
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidEmail | AuthError::MissingPassword => {
                AppError::ValidationError(err.to_string())
            }
            AuthError::Busy => AppError::Conflict(err.to_string()),
            other => AppError::Auth(other.to_string()),
        }
    }
}

pub fn validate_email(email: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = EMAIL.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok()
    });

    match pattern {
        Some(re) => re.is_match(email) && email.len() <= 254,
        None => false,
    }
}

pub fn validate_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if !validate_email(email.trim()) {
        return Err(AuthError::InvalidEmail);
    }
    if password.is_empty() {
        return Err(AuthError::MissingPassword);
    }
    Ok(())
}
