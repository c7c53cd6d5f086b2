use reqwest::Client;
use serde_json::Value;
use tracing::{debug, error, instrument, warn};

use shared_config::AppConfig;
use shared_utils::in_flight::Action;

use crate::error::ProfileError;
use crate::models::{AnalysisRequest, AnalysisResult, ClinicalParameters, ProfileInput};

impl AnalysisRequest {
    pub fn new(input: &ProfileInput, clinical: &ClinicalParameters) -> Self {
        Self {
            name: input.name.clone(),
            age: input.age,
            gender: input.gender,
            height: input.measure.height_cm(),
            weight: input.measure.weight_kg(),
            bmi: input.bmi(),
            clinical_parameters: clinical.clone(),
        }
    }
}

/// Client for the remote risk predictor.
#[derive(Clone)]
pub struct AnalysisClient {
    client: Client,
    base_url: String,
    timeout_secs: u64,
}

impl AnalysisClient {
    pub fn new(config: &AppConfig) -> Self {
        let timeout = config.request_timeout();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.analysis_api_url.trim_end_matches('/').to_string(),
            timeout_secs: timeout.as_secs(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProfileError> {
        let url = format!("{}/analyze", self.base_url);
        debug!("Sending profile to {}", url);

        let response = self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;

        if is_truthy(body.get("error")) {
            let message = body.get("message")
                .and_then(Value::as_str)
                .or_else(|| body.get("error").and_then(Value::as_str))
                .unwrap_or("Unknown error")
                .to_string();
            warn!("Analysis rejected: {}", message);
            return Err(ProfileError::AnalysisRejected(message));
        }

        serde_json::from_value::<AnalysisResult>(body).map_err(|e| {
            error!("Unexpected analysis response: {}", e);
            self.unreachable()
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ProfileError {
        if err.is_timeout() {
            warn!("Analysis timed out after {}s", self.timeout_secs);
            return ProfileError::TimedOut {
                operation: Action::Analyze,
                seconds: self.timeout_secs,
            };
        }
        error!("Analysis request failed: {}", err);
        self.unreachable()
    }

    fn unreachable(&self) -> ProfileError {
        ProfileError::ServiceUnreachable { url: self.base_url.clone() }
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
