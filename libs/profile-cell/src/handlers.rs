use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::in_flight::{Action, InFlight, InFlightGuard};

use crate::error::ProfileError;
use crate::models::{
    AnalysisRequest, AnalysisResult, FormEditRequest, FormState, ProfileRecord, ProfileSubmission, ProfileUpdate,
};
use crate::services::analysis::AnalysisClient;
use crate::services::profile::ProfileStore;
use crate::services::validation::validate;

/// Shared by every profile route. The in-flight registry lives as long as
/// the router, so a duplicate request from the same identity is refused.
#[derive(Clone)]
pub struct ProfileState {
    pub config: Arc<AppConfig>,
    pub in_flight: InFlight,
}

impl ProfileState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self { config, in_flight: InFlight::new() }
    }

    fn begin(&self, user: &User, action: Action) -> Result<InFlightGuard, ProfileError> {
        self.in_flight
            .try_begin(&user.id, action)
            .ok_or(ProfileError::Busy(action))
    }
}

pub async fn apply_form_edit(Json(request): Json<FormEditRequest>) -> Json<FormState> {
    let form = request.form.applied(request.edit);
    let bmi_category = form.bmi_category();
    Json(FormState { form, bmi_category })
}

pub async fn analyze_profile(
    State(state): State<ProfileState>,
    Extension(user): Extension<User>,
    Json(submission): Json<ProfileSubmission>,
) -> Result<Json<AnalysisResult>, AppError> {
    debug!("Analyze request from {}", user.id);

    let input = validate(&submission.form).map_err(ProfileError::from)?;
    let _guard = state.begin(&user, Action::Analyze)?;

    let request = AnalysisRequest::new(&input, &submission.clinical.to_parameters());
    let result = AnalysisClient::new(&state.config).analyze(&request).await?;

    Ok(Json(result))
}

pub async fn save_profile(
    State(state): State<ProfileState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(submission): Json<ProfileSubmission>,
) -> Result<(StatusCode, Json<ProfileRecord>), AppError> {
    let input = validate(&submission.form).map_err(ProfileError::from)?;
    let _guard = state.begin(&user, Action::Save)?;

    let record = ProfileStore::new(&state.config)
        .create(
            &user.id,
            auth.token(),
            &input,
            &submission.clinical.to_parameters(),
            submission.model_results.as_ref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_profiles(
    State(state): State<ProfileState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Vec<ProfileRecord>>, AppError> {
    let _guard = state.begin(&user, Action::FetchRecords)?;

    let records = ProfileStore::new(&state.config)
        .list(&user.id, auth.token())
        .await?;

    Ok(Json(records))
}

pub async fn update_profile(
    State(state): State<ProfileState>,
    Path(id): Path<String>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ProfileRecord>, AppError> {
    let _guard = state.begin(&user, Action::UpdateRecord)?;

    let record = ProfileStore::new(&state.config)
        .update(&user.id, auth.token(), &id, &update)
        .await?;

    Ok(Json(record))
}
