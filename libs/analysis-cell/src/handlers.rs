use axum::Json;
use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::models::{AnalysisFailure, PatientData, FAILURE_MESSAGE};
use crate::services::risk::assess;

pub async fn ping() -> Json<&'static str> {
    Json("Hello, I am alive")
}

/// Scores a profile. Input that cannot be scored still answers 200, with
/// `error: true` in the body.
pub async fn analyze(Json(data): Json<PatientData>) -> Json<Value> {
    info!(
        name = data.name.as_deref().unwrap_or_default(),
        "Analyzing patient data"
    );

    let body = match assess(&data, Utc::now()) {
        Ok(assessment) => {
            info!(score = assessment.risk_score, category = %assessment.category, "Analysis complete");
            serde_json::to_value(assessment)
        }
        Err(e) => {
            warn!("Analysis failed: {}", e);
            serde_json::to_value(AnalysisFailure {
                error: true,
                message: FAILURE_MESSAGE.to_string(),
                detail: e.to_string(),
            })
        }
    };

    Json(body.unwrap_or_else(|e| {
        serde_json::json!({ "error": true, "message": FAILURE_MESSAGE, "detail": e.to_string() })
    }))
}
