use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::models::{InputError, PatientData, RiskAssessment, RiskBand, MODEL_VERSION};

const DEFAULT_BMI: f64 = 25.0;
const DEFAULT_AGE: i64 = 30;

/// (bmi - 18.5) * 5 + (age - 30) * 0.5, clamped to [0, 100].
pub fn risk_score(bmi: f64, age: i64) -> f64 {
    ((bmi - 18.5) * 5.0 + (age - 30) as f64 * 0.5).clamp(0.0, 100.0)
}

pub fn band_for(score: f64) -> RiskBand {
    if score < 30.0 {
        RiskBand::Low
    } else if score < 60.0 {
        RiskBand::Moderate
    } else {
        RiskBand::High
    }
}

pub fn assess(data: &PatientData, now: DateTime<Utc>) -> Result<RiskAssessment, InputError> {
    let bmi = parse_bmi(data.bmi.as_ref())?;
    let age = parse_age(data.age.as_ref())?;

    let score = risk_score(bmi, age);
    let band = band_for(score);

    Ok(RiskAssessment {
        risk_score: score,
        prediction: band.prediction().to_string(),
        confidence: band.confidence(),
        category: band.category().to_string(),
        recommendation: band.recommendation().to_string(),
        model_version: MODEL_VERSION.to_string(),
        timestamp: now,
    })
}

fn parse_bmi(value: Option<&Value>) -> Result<f64, InputError> {
    let not_numeric = |v: &Value| InputError::NotNumeric { field: "bmi", value: v.to_string() };
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_BMI),
        Some(v @ Value::Number(n)) => n.as_f64().ok_or_else(|| not_numeric(v)),
        Some(v @ Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|bmi| bmi.is_finite())
            .ok_or_else(|| not_numeric(v)),
        Some(v) => Err(not_numeric(v)),
    }
}

/// Whole years. Numbers are truncated; text must be an integer.
fn parse_age(value: Option<&Value>) -> Result<i64, InputError> {
    let not_numeric = |v: &Value| InputError::NotNumeric { field: "age", value: v.to_string() };
    match value {
        None | Some(Value::Null) => Ok(DEFAULT_AGE),
        Some(v @ Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .ok_or_else(|| not_numeric(v)),
        Some(v @ Value::String(s)) => s.trim().parse::<i64>().map_err(|_| not_numeric(v)),
        Some(v) => Err(not_numeric(v)),
    }
}
