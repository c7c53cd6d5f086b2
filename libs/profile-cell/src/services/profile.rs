use std::collections::HashSet;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Map, Value};
use tracing::{debug, info, instrument, warn};

use shared_config::AppConfig;
use shared_database::supabase::{error_message, is_timeout, return_representation, SupabaseClient};
use shared_utils::in_flight::Action;

use crate::error::{ProfileError, ValidationError};
use crate::models::{
    whole_number, AnalysisResult, BmiCategory, ClinicalParameters, NewProfileRecord, ProfileInput,
    ProfileRecord, ProfileUpdate,
};
use crate::services::bmi::{calculate_bmi, round_to_tenth};

/// Profile records in the `PROFILES_TABLE` collection. Every save appends a
/// new record; reads also pick up the legacy record keyed by the owner id.
pub struct ProfileStore {
    supabase: SupabaseClient,
    table: String,
    timeout_secs: u64,
}

impl ProfileStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            table: config.profiles_table.clone(),
            timeout_secs: config.request_timeout().as_secs(),
        }
    }

    /// `/rest/v1/{table}?{column}=eq.{value}` with the value percent-encoded.
    fn table_path(&self, column: &str, value: &str) -> String {
        format!("/rest/v1/{}?{}=eq.{}", self.table, column, urlencoding::encode(value))
    }

    fn store_error(&self, action: Action, err: anyhow::Error, wrap: fn(String) -> ProfileError) -> ProfileError {
        if is_timeout(&err) {
            warn!("{} timed out after {}s", action, self.timeout_secs);
            return ProfileError::TimedOut { operation: action, seconds: self.timeout_secs };
        }
        wrap(error_message(&err))
    }

    #[instrument(skip(self, token, input, clinical, model_results), fields(owner = %owner_id))]
    pub async fn create(
        &self,
        owner_id: &str,
        token: &str,
        input: &ProfileInput,
        clinical: &ClinicalParameters,
        model_results: Option<&AnalysisResult>,
    ) -> Result<ProfileRecord, ProfileError> {
        let now = Utc::now();
        let record = NewProfileRecord {
            user_id: owner_id.to_string(),
            name: input.name.clone(),
            age: input.age,
            gender: input.gender,
            height: input.measure.height_cm(),
            weight: input.measure.weight_kg(),
            bmi: input.bmi(),
            bmi_category: input.bmi_category(),
            clinical_parameters: clinical.clone(),
            model_results: model_results.cloned(),
            created_at: now,
            updated_at: now,
        };
        let body = serde_json::to_value(&record).map_err(|e| ProfileError::Save(e.to_string()))?;

        let created: Vec<ProfileRecord> = self.supabase
            .request_with_headers(
                Method::POST,
                &format!("/rest/v1/{}", self.table),
                Some(token),
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(|e| self.store_error(Action::Save, e, ProfileError::Save))?;

        let created = created
            .into_iter()
            .next()
            .ok_or_else(|| ProfileError::Save("the store returned no record".to_string()))?;

        info!("Saved profile {} for {}", created.id, owner_id);
        Ok(created)
    }

    /// All records visible to `owner_id`, newest first. A source that fails
    /// is skipped; only when both fail is the listing an error.
    #[instrument(skip(self, token))]
    pub async fn list(&self, owner_id: &str, token: &str) -> Result<Vec<ProfileRecord>, ProfileError> {
        let legacy_path = self.table_path("id", owner_id);
        let collection_path = self.table_path("userId", owner_id);

        let (legacy, collection) = tokio::join!(
            self.supabase.request::<Vec<ProfileRecord>>(Method::GET, &legacy_path, Some(token), None),
            self.supabase.request::<Vec<ProfileRecord>>(Method::GET, &collection_path, Some(token), None),
        );

        let records = match (legacy, collection) {
            (Err(legacy_err), Err(collection_err)) => {
                warn!("Legacy profile lookup failed: {}", legacy_err);
                return Err(self.store_error(Action::FetchRecords, collection_err, ProfileError::Load));
            }
            (Ok(legacy), Err(e)) => {
                warn!("Skipping profile collection for {}: {}", owner_id, e);
                merge_records(legacy.into_iter().next(), Vec::new(), owner_id)
            }
            (Err(e), Ok(collection)) => {
                warn!("Skipping legacy profile for {}: {}", owner_id, e);
                merge_records(None, collection, owner_id)
            }
            (Ok(legacy), Ok(collection)) => merge_records(legacy.into_iter().next(), collection, owner_id),
        };

        debug!("Loaded {} profile records for {}", records.len(), owner_id);
        Ok(records)
    }

    pub async fn get(&self, id: &str, token: &str) -> Result<ProfileRecord, ProfileError> {
        let found: Vec<ProfileRecord> = self.supabase
            .request(Method::GET, &self.table_path("id", id), Some(token), None)
            .await
            .map_err(|e| self.store_error(Action::FetchRecords, e, ProfileError::Load))?;

        found
            .into_iter()
            .next()
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))
    }

    /// Edits one record in place after checking it belongs to `owner_id`.
    /// Clinical parameters are merged into the stored ones field by field.
    #[instrument(skip(self, token, update))]
    pub async fn update(
        &self,
        owner_id: &str,
        token: &str,
        id: &str,
        update: &ProfileUpdate,
    ) -> Result<ProfileRecord, ProfileError> {
        let mut patch = build_patch(update, Utc::now())?;

        let existing = self.get(id, token).await?;
        if !existing.is_owned_by(owner_id) {
            warn!("{} tried to modify profile {} owned by someone else", owner_id, id);
            return Err(ProfileError::Forbidden);
        }

        if let Some(edit) = &update.clinical_parameters {
            let merged = existing.clinical_parameters.unwrap_or_default().merged(edit);
            patch.insert("clinicalParameters".into(), json!(merged));
        }

        let updated: Vec<ProfileRecord> = self.supabase
            .request_with_headers(
                Method::PATCH,
                &self.table_path("id", id),
                Some(token),
                Some(Value::Object(patch)),
                Some(return_representation()),
            )
            .await
            .map_err(|e| self.store_error(Action::UpdateRecord, e, ProfileError::Update))?;

        let updated = updated
            .into_iter()
            .next()
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;

        info!("Updated profile {}", updated.id);
        Ok(updated)
    }
}

/// Legacy record first, then collection records, deduplicated by id and
/// sorted by `createdAt` descending. Records without a timestamp sort last.
/// A collection record whose id equals the owner id is the legacy record
/// seen twice and is dropped.
pub fn merge_records(
    legacy: Option<ProfileRecord>,
    collection: Vec<ProfileRecord>,
    owner_id: &str,
) -> Vec<ProfileRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(collection.len() + 1);

    if let Some(record) = legacy {
        seen.insert(record.id.clone());
        records.push(record);
    }

    for record in collection {
        if record.id == owner_id || !seen.insert(record.id.clone()) {
            continue;
        }
        records.push(record);
    }

    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

/// The top-level fields a partial edit writes. Height and weight travel
/// together and recompute the BMI; a BMI on its own clears them. Clinical
/// parameters need the stored record and are merged by `update`.
pub fn build_patch(update: &ProfileUpdate, now: DateTime<Utc>) -> Result<Map<String, Value>, ValidationError> {
    let mut patch = Map::new();

    if let Some(name) = &update.name {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::MissingName);
        }
        patch.insert("name".into(), json!(name));
    }

    if let Some(age) = update.age {
        if !(age.is_finite() && age > 0.0) {
            return Err(ValidationError::InvalidAge);
        }
        patch.insert("age".into(), whole_number(age));
    }

    if let Some(gender) = update.gender {
        patch.insert("gender".into(), json!(gender));
    }

    let bmi = match (update.height, update.weight, update.bmi) {
        (Some(height), Some(weight), _) => {
            let bmi = calculate_bmi(height, weight).ok_or(ValidationError::MissingMeasure)?;
            patch.insert("height".into(), json!(height));
            patch.insert("weight".into(), json!(weight));
            Some(bmi)
        }
        (Some(_), None, _) | (None, Some(_), _) => return Err(ValidationError::MissingMeasure),
        (None, None, Some(bmi)) => {
            if !(bmi.is_finite() && bmi > 0.0) {
                return Err(ValidationError::MissingMeasure);
            }
            patch.insert("height".into(), Value::Null);
            patch.insert("weight".into(), Value::Null);
            Some(round_to_tenth(bmi))
        }
        (None, None, None) => None,
    };

    if let Some(bmi) = bmi {
        patch.insert("bmi".into(), json!(bmi));
        patch.insert("bmiCategory".into(), json!(BmiCategory::from_bmi(bmi)));
    }

    patch.insert("updatedAt".into(), json!(now));
    Ok(patch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::models::ClinicalUpdate;

    fn record(id: &str, user_id: Option<&str>, created: Option<(i32, u32, u32)>) -> ProfileRecord {
        ProfileRecord {
            id: id.to_string(),
            user_id: user_id.map(str::to_string),
            name: format!("patient {}", id),
            age: Some(50.0),
            gender: Some("Female".into()),
            height: None,
            weight: None,
            bmi: Some(24.0),
            bmi_category: Some("Normal".into()),
            clinical_parameters: None,
            model_results: None,
            created_at: created.map(|(y, m, d)| Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    #[test]
    fn test_merge_sorts_newest_first_and_dedups() {
        let legacy = record("uid-1", None, Some((2024, 1, 1)));
        let collection = vec![
            record("a", Some("uid-1"), Some((2025, 3, 1))),
            record("uid-1", Some("uid-1"), Some((2026, 1, 1))),
            record("b", Some("uid-1"), Some((2025, 6, 1))),
            record("a", Some("uid-1"), Some((2025, 3, 1))),
        ];

        let merged = merge_records(Some(legacy), collection, "uid-1");
        let ids: Vec<_> = merged.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "uid-1"]);
    }

    #[test]
    fn test_merge_missing_timestamps_sort_last() {
        let collection = vec![
            record("undated", Some("uid-1"), None),
            record("dated", Some("uid-1"), Some((2025, 1, 1))),
        ];
        let merged = merge_records(None, collection, "uid-1");
        assert_eq!(merged[0].id, "dated");
        assert_eq!(merged[1].id, "undated");
    }

    #[test]
    fn test_patch_recomputes_bmi_from_height_and_weight() {
        let update = ProfileUpdate { height: Some(175.0), weight: Some(70.0), ..Default::default() };
        let patch = build_patch(&update, Utc::now()).unwrap();

        assert_eq!(patch["bmi"], json!(22.9));
        assert_eq!(patch["bmiCategory"], json!("Normal"));
        assert_eq!(patch["height"], json!(175.0));
        assert!(patch.contains_key("updatedAt"));
    }

    #[test]
    fn test_patch_direct_bmi_clears_height_and_weight() {
        let update = ProfileUpdate { bmi: Some(31.26), ..Default::default() };
        let patch = build_patch(&update, Utc::now()).unwrap();

        assert_eq!(patch["bmi"], json!(31.3));
        assert_eq!(patch["bmiCategory"], json!("Obese"));
        assert_eq!(patch["height"], Value::Null);
        assert_eq!(patch["weight"], Value::Null);
    }

    #[test]
    fn test_patch_rejects_partial_measure_and_blank_name() {
        let update = ProfileUpdate { height: Some(175.0), ..Default::default() };
        assert_eq!(build_patch(&update, Utc::now()), Err(ValidationError::MissingMeasure));

        let update = ProfileUpdate { name: Some("  ".into()), ..Default::default() };
        assert_eq!(build_patch(&update, Utc::now()), Err(ValidationError::MissingName));

        let update = ProfileUpdate { age: Some(0.0), ..Default::default() };
        assert_eq!(build_patch(&update, Utc::now()), Err(ValidationError::InvalidAge));

        let update = ProfileUpdate { age: Some(0.5), ..Default::default() };
        assert_eq!(build_patch(&update, Utc::now()).unwrap()["age"], json!(0.5));
    }

    #[test]
    fn test_patch_only_touches_given_fields() {
        let update = ProfileUpdate {
            name: Some("Grace".into()),
            clinical_parameters: Some(ClinicalUpdate { ef: Some("60".into()), ..Default::default() }),
            ..Default::default()
        };
        let patch = build_patch(&update, Utc::now()).unwrap();
        let mut keys: Vec<_> = patch.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["name", "updatedAt"]);
    }
}
