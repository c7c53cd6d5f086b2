use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Non-2xx answer from PostgREST or GoTrue, with the most readable message
/// the body offered.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", describe(*status, message))]
pub struct SupabaseApiError {
    pub status: u16,
    pub message: String,
}

fn describe(status: u16, message: &str) -> String {
    match status {
        401 | 403 => format!("Authentication error: {}", message),
        404 => format!("Resource not found: {}", message),
        _ => format!("API error ({}): {}", status, message),
    }
}

/// Pulls the human message out of a Supabase error body. GoTrue uses
/// `error_description`/`msg`, PostgREST uses `message`.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }
    body.trim().to_string()
}

/// The readable message of an error returned by this client.
pub fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<SupabaseApiError>() {
        Some(api) => api.message.clone(),
        None => err.to_string(),
    }
}

pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .map(|e| e.is_timeout())
        .unwrap_or(false)
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(anyhow!(SupabaseApiError {
                status: status.as_u16(),
                message: extract_error_message(&error_text),
            }));
        }

        Ok(response)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, extra_headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// For endpoints that answer with an empty body (e.g. 204 on logout).
    pub async fn request_empty(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<()> {
        self.send(method, path, auth_token, body, None).await?;
        Ok(())
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// `Prefer: return=representation`, so PostgREST writes echo the stored rows.
pub fn return_representation() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_prefers_description() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        assert_eq!(extract_error_message(body), "Invalid login credentials");
    }

    #[test]
    fn test_extract_error_message_postgrest_and_plain() {
        let body = r#"{"code":"42501","message":"permission denied for table user_profiles"}"#;
        assert_eq!(extract_error_message(body), "permission denied for table user_profiles");
        assert_eq!(extract_error_message("  upstream down "), "upstream down");
    }

    #[test]
    fn test_api_error_display_by_status() {
        let err = SupabaseApiError { status: 401, message: "bad token".into() };
        assert_eq!(err.to_string(), "Authentication error: bad token");

        let err = SupabaseApiError { status: 500, message: "boom".into() };
        assert_eq!(err.to_string(), "API error (500): boom");
    }

    #[test]
    fn test_error_message_unwraps_api_error() {
        let err = anyhow!(SupabaseApiError { status: 400, message: "User already registered".into() });
        assert_eq!(error_message(&err), "User already registered");
        assert!(!is_timeout(&err));
    }
}
