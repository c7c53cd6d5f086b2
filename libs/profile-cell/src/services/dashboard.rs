use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{info, warn};

use auth_cell::{AuthError, SessionProvider, View};
use shared_config::AppConfig;
use shared_utils::in_flight::{Action, InFlight, InFlightGuard};

use crate::error::ProfileError;
use crate::models::{
    AnalysisRequest, AnalysisResult, ClinicalEdit, ClinicalForm, FieldEdit, ProfileForm, ProfileRecord,
    ProfileUpdate, ResultView,
};
use crate::services::analysis::AnalysisClient;
use crate::services::profile::ProfileStore;
use crate::services::validation::validate;

const DASHBOARD_OWNER: &str = "dashboard";

pub const SAVED_NOTICE: &str = "Profile saved successfully! Go to \"Track User\" to view details.";
pub const UPDATED_NOTICE: &str = "Profile updated successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn success(message: &str) -> Self {
        Self { kind: NoticeKind::Success, message: message.to_string() }
    }

    fn error(err: &ProfileError) -> Self {
        Self { kind: NoticeKind::Error, message: err.to_string() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub form: ProfileForm,
    pub clinical: ClinicalForm,
    pub result: Option<AnalysisResult>,
    pub records: Vec<ProfileRecord>,
    pub notice: Option<Notice>,
}

/// The signed-in dashboard: one form, the last analysis result, and the
/// owner's records. Each action kind runs at most once at a time; a second
/// request while one is running is refused with `ProfileError::Busy`.
pub struct Dashboard {
    session: Arc<SessionProvider>,
    analysis: AnalysisClient,
    store: ProfileStore,
    in_flight: InFlight,
    state: Mutex<DashboardState>,
}

impl Dashboard {
    pub fn new(config: &AppConfig, session: Arc<SessionProvider>) -> Self {
        Self {
            session,
            analysis: AnalysisClient::new(config),
            store: ProfileStore::new(config),
            in_flight: InFlight::new(),
            state: Mutex::new(DashboardState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DashboardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self, action: Action) -> Result<InFlightGuard, ProfileError> {
        self.in_flight
            .try_begin(DASHBOARD_OWNER, action)
            .ok_or(ProfileError::Busy(action))
    }

    fn fail<T>(&self, err: ProfileError) -> Result<T, ProfileError> {
        self.lock().notice = Some(Notice::error(&err));
        Err(err)
    }

    pub fn snapshot(&self) -> DashboardState {
        self.lock().clone()
    }

    pub fn is_busy(&self, action: Action) -> bool {
        self.in_flight.is_active(DASHBOARD_OWNER, action)
    }

    pub fn edit(&self, edit: FieldEdit) -> ProfileForm {
        let mut state = self.lock();
        state.form.apply(edit);
        state.form.clone()
    }

    pub fn edit_clinical(&self, edit: ClinicalEdit) {
        self.lock().clinical.apply(edit);
    }

    pub fn result_view(&self) -> Option<ResultView> {
        self.lock().result.as_ref().map(AnalysisResult::view)
    }

    pub fn dismiss_notice(&self) {
        self.lock().notice = None;
    }

    /// Discards the form, the clinical parameters and the displayed result.
    pub fn close_form(&self) {
        let mut state = self.lock();
        state.form.reset();
        state.clinical.reset();
        state.result = None;
    }

    /// Validates the form and asks the predictor for a risk assessment. On
    /// failure the previously displayed result stays in place.
    pub async fn analyze(&self) -> Result<AnalysisResult, ProfileError> {
        let (form, clinical) = {
            let state = self.lock();
            (state.form.clone(), state.clinical.to_parameters())
        };

        let input = match validate(&form) {
            Ok(input) => input,
            Err(e) => return self.fail(e.into()),
        };
        let _guard = self.begin(Action::Analyze)?;

        match self.analysis.analyze(&AnalysisRequest::new(&input, &clinical)).await {
            Ok(result) => {
                let mut state = self.lock();
                state.result = Some(result.clone());
                state.notice = None;
                Ok(result)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Appends the current form, its clinical parameters and the displayed
    /// result as a new record, then clears the form.
    pub async fn save(&self) -> Result<ProfileRecord, ProfileError> {
        let Some(session) = self.session.current_session() else {
            return self.fail(ProfileError::NotSignedIn);
        };

        let (form, clinical, result) = {
            let state = self.lock();
            (state.form.clone(), state.clinical.to_parameters(), state.result.clone())
        };

        let input = match validate(&form) {
            Ok(input) => input,
            Err(e) => return self.fail(e.into()),
        };
        let _guard = self.begin(Action::Save)?;

        let saved = self.store
            .create(&session.user.id, &session.access_token, &input, &clinical, result.as_ref())
            .await;

        match saved {
            Ok(record) => {
                let mut state = self.lock();
                state.form.reset();
                state.clinical.reset();
                state.result = None;
                state.records.insert(0, record.clone());
                state.notice = Some(Notice::success(SAVED_NOTICE));
                Ok(record)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn refresh_records(&self) -> Result<Vec<ProfileRecord>, ProfileError> {
        let Some(session) = self.session.current_session() else {
            return Ok(Vec::new());
        };
        let _guard = self.begin(Action::FetchRecords)?;

        match self.store.list(&session.user.id, &session.access_token).await {
            Ok(records) => {
                self.lock().records = records.clone();
                Ok(records)
            }
            Err(e) => self.fail(e),
        }
    }

    pub async fn update_record(&self, id: &str, update: &ProfileUpdate) -> Result<ProfileRecord, ProfileError> {
        let Some(session) = self.session.current_session() else {
            return self.fail(ProfileError::NotSignedIn);
        };
        let _guard = self.begin(Action::UpdateRecord)?;

        match self.store.update(&session.user.id, &session.access_token, id, update).await {
            Ok(record) => {
                let mut state = self.lock();
                if let Some(existing) = state.records.iter_mut().find(|r| r.id == record.id) {
                    *existing = record.clone();
                }
                state.notice = Some(Notice::success(UPDATED_NOTICE));
                info!("Record {} updated from the dashboard", record.id);
                Ok(record)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Signs out and drops everything the dashboard holds for the old identity.
    pub async fn sign_out(&self) -> Result<View, AuthError> {
        match self.session.sign_out().await {
            Ok(view) => {
                *self.lock() = DashboardState::default();
                Ok(view)
            }
            Err(e) => {
                warn!("Sign-out failed: {}", e);
                Err(e)
            }
        }
    }
}
