use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Stored in place of a clinical parameter left blank at submission time.
pub const NOT_AVAILABLE: &str = "Not Available";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    #[serde(rename = "Prefer not to say")]
    PreferNotToSay,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::PreferNotToSay => "Prefer not to say",
        }
    }

    pub fn parse(raw: &str) -> Option<Gender> {
        match raw.trim().to_ascii_lowercase().replace(['-', '_'], " ").as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "prefer not to say" => Some(Gender::PreferNotToSay),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub fn label(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Underweight",
            BmiCategory::Normal => "Normal",
            BmiCategory::Overweight => "Overweight",
            BmiCategory::Obese => "Obese",
        }
    }

    pub fn range(&self) -> &'static str {
        match self {
            BmiCategory::Underweight => "Below 18.5",
            BmiCategory::Normal => "18.5-24.9",
            BmiCategory::Overweight => "25-29.9",
            BmiCategory::Obese => "30 and higher",
        }
    }
}

/// Demographic/biometric fields exactly as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub height: String,
    pub weight: String,
    pub bmi: String,
}

/// Clinical parameter fields exactly as typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalForm {
    pub nfatc3: String,
    pub dm: String,
    #[serde(rename = "proBNP")]
    pub pro_bnp: String,
    pub ef: String,
    pub gls: String,
}

/// One edit of a demographic/biometric field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "camelCase")]
pub enum FieldEdit {
    Name(String),
    Age(String),
    Gender(String),
    Height(String),
    Weight(String),
    Bmi(String),
}

/// One edit of a clinical parameter field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value")]
pub enum ClinicalEdit {
    #[serde(rename = "nfatc3")]
    Nfatc3(String),
    #[serde(rename = "dm")]
    Dm(String),
    #[serde(rename = "proBNP")]
    ProBnp(String),
    #[serde(rename = "ef")]
    Ef(String),
    #[serde(rename = "gls")]
    Gls(String),
}

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Clinical parameters as submitted and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalParameters {
    #[serde(default = "not_available")]
    pub nfatc3: String,
    #[serde(default = "not_available")]
    pub dm: String,
    #[serde(rename = "proBNP", default = "not_available")]
    pub pro_bnp: String,
    #[serde(default = "not_available")]
    pub ef: String,
    #[serde(default = "not_available")]
    pub gls: String,
}

impl ClinicalParameters {
    /// Applies a partial edit on top of the stored values. A blank value
    /// resets that parameter to `Not Available`.
    pub fn merged(&self, edit: &ClinicalUpdate) -> ClinicalParameters {
        let pick = |current: &String, edited: &Option<String>| match edited.as_deref().map(str::trim) {
            Some("") => not_available(),
            Some(value) => value.to_string(),
            None => current.clone(),
        };

        ClinicalParameters {
            nfatc3: pick(&self.nfatc3, &edit.nfatc3),
            dm: pick(&self.dm, &edit.dm),
            pro_bnp: pick(&self.pro_bnp, &edit.pro_bnp),
            ef: pick(&self.ef, &edit.ef),
            gls: pick(&self.gls, &edit.gls),
        }
    }
}

impl Default for ClinicalParameters {
    fn default() -> Self {
        Self {
            nfatc3: not_available(),
            dm: not_available(),
            pro_bnp: not_available(),
            ef: not_available(),
            gls: not_available(),
        }
    }
}

/// Clinical parameters named in a record edit. Absent fields keep their
/// stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalUpdate {
    pub nfatc3: Option<String>,
    pub dm: Option<String>,
    #[serde(rename = "proBNP")]
    pub pro_bnp: Option<String>,
    pub ef: Option<String>,
    pub gls: Option<String>,
}

/// The body measure of a validated profile. Exactly one representation exists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BodyMeasure {
    HeightWeight { height_cm: f64, weight_kg: f64 },
    Direct { bmi: f64 },
}

/// A profile that passed the validation gate.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileInput {
    pub name: String,
    pub age: f64,
    pub gender: Gender,
    pub measure: BodyMeasure,
}

/// Body of `POST {analysis}/analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub name: String,
    #[serde(serialize_with = "whole_or_fraction")]
    pub age: f64,
    pub gender: Gender,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bmi: f64,
    pub clinical_parameters: ClinicalParameters,
}

/// Whatever the predictor returned. Fields are only presence-checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Display strings for the result panel; absent fields stay hidden.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub risk_score: Option<String>,
    pub prediction: Option<String>,
    pub confidence: Option<String>,
    pub category: Option<String>,
    pub recommendation: Option<String>,
}

impl AnalysisResult {
    pub fn view(&self) -> ResultView {
        ResultView {
            risk_score: self.risk_score.map(|score| format!("{:.2}", score)),
            prediction: non_empty(self.prediction.as_deref()),
            confidence: self.confidence.map(|c| format!("{:.1}%", c * 100.0)),
            category: non_empty(self.category.as_deref()),
            recommendation: non_empty(self.recommendation.as_deref()),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// A profile record as read back from the store. Legacy rows may hold
/// numbers as text or lack fields, so reads are lenient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRecord {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub height: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub bmi: Option<f64>,
    #[serde(default)]
    pub bmi_category: Option<String>,
    #[serde(default)]
    pub clinical_parameters: Option<ClinicalParameters>,
    #[serde(default)]
    pub model_results: Option<AnalysisResult>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileRecord {
    /// Legacy records are keyed by the owner's identity instead of carrying `userId`.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.user_id.as_deref() == Some(owner_id) || self.id == owner_id
    }
}

/// A record as proposed to the store on save. The store assigns `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfileRecord {
    pub user_id: String,
    pub name: String,
    #[serde(serialize_with = "whole_or_fraction")]
    pub age: f64,
    pub gender: Gender,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bmi: f64,
    pub bmi_category: BmiCategory,
    pub clinical_parameters: ClinicalParameters,
    pub model_results: Option<AnalysisResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial edit of a stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age: Option<f64>,
    pub gender: Option<Gender>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub bmi: Option<f64>,
    pub clinical_parameters: Option<ClinicalUpdate>,
}

/// Body of analyze/save requests: the form as typed plus the displayed result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSubmission {
    pub form: ProfileForm,
    #[serde(default)]
    pub clinical: ClinicalForm,
    #[serde(default)]
    pub model_results: Option<AnalysisResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormEditRequest {
    #[serde(default)]
    pub form: ProfileForm,
    pub edit: FieldEdit,
}

/// Form after an edit, with the category derived from whatever BMI it holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub form: ProfileForm,
    pub bmi_category: Option<BmiCategory>,
}

/// Numbers or numeric text. Anything else reads as absent.
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite()))
}

/// Whole numbers go out as JSON integers, so an age of 52 is stored as `52`.
pub fn whole_number(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

fn whole_or_fraction<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    whole_number(*value).serialize(serializer)
}

/// RFC 3339, offset-less ISO text (read as UTC), epoch seconds or a
/// `{seconds, nanos}` object. Anything else reads as no timestamp.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp))
}

fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(text) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|ts| ts.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
                        .iter()
                        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
                        .map(|naive| naive.and_utc())
                })
        }
        Value::Number(n) => n.as_f64().and_then(from_epoch_seconds),
        Value::Object(fields) => {
            let seconds = fields.get("seconds").or_else(|| fields.get("_seconds"))?.as_i64()?;
            let nanos = fields
                .get("nanos")
                .or_else(|| fields.get("nanoseconds"))
                .or_else(|| fields.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.trunc();
    let nanos = ((seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_gender_parsing_and_wire_format() {
        assert_eq!(Gender::parse("Male"), Some(Gender::Male));
        assert_eq!(Gender::parse(" female "), Some(Gender::Female));
        assert_eq!(Gender::parse("prefer-not-to-say"), Some(Gender::PreferNotToSay));
        assert_eq!(Gender::parse(""), None);
        assert_eq!(json!(Gender::PreferNotToSay), json!("Prefer not to say"));
    }

    #[test]
    fn test_field_edit_wire_format() {
        let edit: FieldEdit = serde_json::from_value(json!({ "field": "bmi", "value": "22.5" })).unwrap();
        assert_eq!(edit, FieldEdit::Bmi("22.5".into()));

        let edit: ClinicalEdit = serde_json::from_value(json!({ "field": "proBNP", "value": "125" })).unwrap();
        assert_eq!(edit, ClinicalEdit::ProBnp("125".into()));
    }

    #[test]
    fn test_clinical_parameters_default_to_not_available() {
        let params: ClinicalParameters = serde_json::from_value(json!({ "ef": "55" })).unwrap();
        assert_eq!(params.ef, "55");
        assert_eq!(params.pro_bnp, NOT_AVAILABLE);
        assert_eq!(json!(params)["proBNP"], NOT_AVAILABLE);
    }

    #[test]
    fn test_result_view_formats_present_fields_only() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "risk_score": 0.42,
            "prediction": "low-risk",
            "model_version": "1.0.0"
        })).unwrap();

        let view = result.view();
        assert_eq!(view.risk_score.as_deref(), Some("0.42"));
        assert_eq!(view.prediction.as_deref(), Some("low-risk"));
        assert!(view.confidence.is_none());
        assert!(view.recommendation.is_none());
        assert_eq!(result.extra["model_version"], "1.0.0");

        let with_confidence = AnalysisResult { confidence: Some(0.85), ..result };
        assert_eq!(with_confidence.view().confidence.as_deref(), Some("85.0%"));
    }

    #[test]
    fn test_legacy_record_reads_leniently() {
        let record: ProfileRecord = serde_json::from_value(json!({
            "id": "uid-1",
            "name": "Ada",
            "age": "51",
            "bmi": "24.2",
            "height": null,
            "bmiCategory": "Normal weight",
            "createdAt": "not a date"
        })).unwrap();

        assert_eq!(record.age, Some(51.0));
        assert_eq!(record.bmi, Some(24.2));
        assert_eq!(record.height, None);
        assert_eq!(record.created_at, None);
        assert!(record.user_id.is_none());
        assert!(record.is_owned_by("uid-1"));
        assert!(!record.is_owned_by("uid-2"));
    }

    #[test]
    fn test_record_timestamps_parse_rfc3339() {
        let record: ProfileRecord = serde_json::from_value(json!({
            "id": "doc-1",
            "userId": "uid-1",
            "createdAt": "2025-03-01T10:00:00.000Z"
        })).unwrap();

        assert_eq!(record.created_at.unwrap().to_rfc3339(), "2025-03-01T10:00:00+00:00");
        assert!(record.is_owned_by("uid-1"));
    }

    #[test]
    fn test_record_timestamps_accept_naive_and_epoch_forms() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();

        for created_at in [
            json!("2025-03-01T10:00:00"),
            json!("2025-03-01 10:00:00.000"),
            json!(expected.timestamp()),
            json!({ "seconds": expected.timestamp(), "nanos": 0 }),
            json!({ "_seconds": expected.timestamp(), "_nanoseconds": 0 }),
        ] {
            let record: ProfileRecord = serde_json::from_value(json!({
                "id": "doc-1",
                "createdAt": created_at.clone()
            })).unwrap();
            assert_eq!(record.created_at, Some(expected), "createdAt {}", created_at);
        }
    }

    #[test]
    fn test_unreadable_timestamp_does_not_reject_the_record() {
        for created_at in [json!(true), json!([2025, 3, 1]), json!({ "when": "today" }), json!("")] {
            let record: ProfileRecord = serde_json::from_value(json!({
                "id": "doc-1",
                "name": "Ada",
                "createdAt": created_at
            })).unwrap();
            assert_eq!(record.created_at, None);
            assert_eq!(record.name, "Ada");
        }
    }

    #[test]
    fn test_clinical_edit_merges_into_stored_values() {
        let stored = ClinicalParameters { dm: "Yes".into(), ef: "55".into(), ..Default::default() };
        let edit: ClinicalUpdate = serde_json::from_value(json!({ "ef": "60", "gls": " " })).unwrap();

        let merged = stored.merged(&edit);
        assert_eq!(merged.dm, "Yes");
        assert_eq!(merged.ef, "60");
        assert_eq!(merged.gls, NOT_AVAILABLE);
        assert_eq!(merged.nfatc3, NOT_AVAILABLE);
    }

    #[test]
    fn test_result_numbers_may_arrive_as_text() {
        let result: AnalysisResult = serde_json::from_value(json!({
            "risk_score": "0.42",
            "confidence": "0.85",
            "prediction": "low-risk"
        })).unwrap();

        assert_eq!(result.risk_score, Some(0.42));
        assert_eq!(result.view().confidence.as_deref(), Some("85.0%"));
    }

    #[test]
    fn test_whole_ages_serialize_as_integers() {
        assert_eq!(whole_number(52.0), json!(52));
        assert_eq!(whole_number(0.5), json!(0.5));
    }
}
