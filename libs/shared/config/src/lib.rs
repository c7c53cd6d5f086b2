use std::env;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_ANALYSIS_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_PROFILES_TABLE: &str = "user_profiles";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_PORT: u16 = 3000;
pub const DEFAULT_ANALYZER_ADDR: &str = "127.0.0.1:8000";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub analysis_api_url: String,
    pub profiles_table: String,
    pub request_timeout_secs: u64,
    pub api_port: u16,
    pub analyzer_addr: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            analysis_api_url: env::var("ANALYSIS_API_URL")
                .unwrap_or_else(|_| {
                    warn!("ANALYSIS_API_URL not set, using default");
                    DEFAULT_ANALYSIS_API_URL.to_string()
                }),
            profiles_table: env::var("PROFILES_TABLE")
                .unwrap_or_else(|_| DEFAULT_PROFILES_TABLE.to_string()),
            request_timeout_secs: parse_or_default("REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS),
            api_port: parse_or_default("API_PORT", DEFAULT_API_PORT),
            analyzer_addr: env::var("ANALYZER_ADDR")
                .unwrap_or_else(|_| DEFAULT_ANALYZER_ADDR.to_string()),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    /// Upper bound for a single remote call (analysis, store, identity provider).
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn parse_or_default<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} is not a valid value ({}), using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
