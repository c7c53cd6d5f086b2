use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Session, User};

pub const TEST_JWT_SECRET: &str = "test-secret-key-for-jwt-validation-must-be-long-enough";

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub analysis_api_url: String,
    pub request_timeout_secs: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: TEST_JWT_SECRET.to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            analysis_api_url: "http://127.0.0.1:8000".to_string(),
            request_timeout_secs: 5,
        }
    }
}

impl TestConfig {
    /// Points both Supabase and the analysis endpoint at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            analysis_api_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            analysis_api_url: self.analysis_api_url.clone(),
            profiles_table: shared_config::DEFAULT_PROFILES_TABLE.to_string(),
            request_timeout_secs: self.request_timeout_secs,
            api_port: shared_config::DEFAULT_API_PORT,
            analyzer_addr: shared_config::DEFAULT_ANALYZER_ADDR.to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
    pub display_name: Option<String>,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "authenticated".to_string(),
            display_name: None,
        }
    }
}

impl TestUser {
    pub fn new(email: &str) -> Self {
        Self {
            email: email.to_string(),
            ..Self::default()
        }
    }

    pub fn with_display_name(email: &str, display_name: &str) -> Self {
        Self {
            display_name: Some(display_name.to_string()),
            ..Self::new(email)
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            display_name: self.display_name.clone(),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn to_session(&self, secret: &str) -> Session {
        Session {
            access_token: JwtTestUtils::create_test_token(self, secret, Some(1)),
            refresh_token: Some("test-refresh-token".to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            user: self.to_user(),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "user_metadata": { "display_name": user.display_name },
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    /// A stored profile row as PostgREST returns it.
    pub fn profile_record_response(id: &str, user_id: &str, created_at: Option<&str>) -> Value {
        json!({
            "id": id,
            "userId": user_id,
            "name": "Ada Patient",
            "age": 52,
            "gender": "Female",
            "height": 165.0,
            "weight": 70.0,
            "bmi": 25.7,
            "bmiCategory": "Overweight",
            "clinicalParameters": {
                "nfatc3": "1.8",
                "dm": "Yes",
                "proBNP": "Not Available",
                "ef": "55",
                "gls": "-18"
            },
            "modelResults": null,
            "createdAt": created_at,
            "updatedAt": created_at
        })
    }

    /// A pre-multi-record profile: keyed by the identity, numbers stored as text.
    pub fn legacy_profile_response(user_id: &str, created_at: Option<&str>) -> Value {
        json!({
            "id": user_id,
            "name": "Ada Patient",
            "age": "51",
            "gender": "Female",
            "height": null,
            "weight": null,
            "bmi": "24.2",
            "bmiCategory": "Normal weight",
            "createdAt": created_at
        })
    }

    /// GoTrue token response for a signed-in user.
    pub fn auth_session_response(user: &TestUser, secret: &str) -> Value {
        json!({
            "access_token": JwtTestUtils::create_test_token(user, secret, Some(1)),
            "token_type": "bearer",
            "expires_in": 3600,
            "refresh_token": "test-refresh-token",
            "user": Self::auth_user_response(user)
        })
    }

    pub fn auth_user_response(user: &TestUser) -> Value {
        json!({
            "id": user.id,
            "email": user.email,
            "role": user.role,
            "user_metadata": { "display_name": user.display_name },
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "error": code,
            "error_description": message
        })
    }
}
