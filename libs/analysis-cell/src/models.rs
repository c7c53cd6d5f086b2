use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MODEL_VERSION: &str = "1.0.0";
pub const FAILURE_MESSAGE: &str = "Failed to analyze patient data";

/// The profile as the dashboard submits it. Only `age` and `bmi` feed the
/// score; both may arrive as numbers or numeric strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub gender: Option<Value>,
    #[serde(default)]
    pub height: Option<Value>,
    #[serde(default)]
    pub weight: Option<Value>,
    #[serde(default)]
    pub bmi: Option<Value>,
    #[serde(default)]
    pub clinical_parameters: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

impl RiskBand {
    pub fn category(&self) -> &'static str {
        match self {
            RiskBand::Low => "Low Risk",
            RiskBand::Moderate => "Moderate Risk",
            RiskBand::High => "High Risk",
        }
    }

    pub fn prediction(&self) -> &'static str {
        match self {
            RiskBand::Low => "Normal",
            RiskBand::Moderate => "Monitor",
            RiskBand::High => "Attention Required",
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            RiskBand::Low => 0.85,
            RiskBand::Moderate => 0.75,
            RiskBand::High => 0.80,
        }
    }

    pub fn recommendation(&self) -> &'static str {
        match self {
            RiskBand::Low => "Continue maintaining a healthy lifestyle with regular exercise and balanced diet.",
            RiskBand::Moderate => {
                "Regular monitoring recommended. Consider lifestyle modifications and consult with healthcare provider."
            }
            RiskBand::High => {
                "Medical consultation recommended. Immediate lifestyle changes and possible intervention needed."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub prediction: String,
    pub confidence: f64,
    pub category: String,
    pub recommendation: String,
    pub model_version: String,
    pub timestamp: DateTime<Utc>,
}

/// Body returned (with HTTP 200) when the input cannot be scored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisFailure {
    pub error: bool,
    pub message: String,
    pub detail: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("{field} is not a number: {value}")]
    NotNumeric { field: &'static str, value: String },
}
