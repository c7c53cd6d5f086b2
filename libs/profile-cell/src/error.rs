use thiserror::Error;

use shared_models::error::AppError;
use shared_utils::in_flight::Action;

/// Validation gate failures, first failing rule only.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Please enter your name")]
    MissingName,

    #[error("Please enter a valid age")]
    InvalidAge,

    #[error("Please select your gender")]
    MissingGender,

    #[error("Please enter either Height & Weight OR BMI")]
    MissingMeasure,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Analysis failed: {0}")]
    AnalysisRejected(String),

    #[error("Failed to analyze data. Make sure the analysis service is running on {url}")]
    ServiceUnreachable { url: String },

    #[error("{operation} timed out after {seconds}s")]
    TimedOut { operation: Action, seconds: u64 },

    #[error("Please log in to save your profile")]
    NotSignedIn,

    #[error("{0} is already in progress")]
    Busy(Action),

    #[error("Profile not found: {0}")]
    NotFound(String),

    #[error("Not authorized to modify this profile")]
    Forbidden,

    #[error("Error saving profile: {0}")]
    Save(String),

    #[error("Failed to load user data: {0}")]
    Load(String),

    #[error("Failed to update profile: {0}")]
    Update(String),
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        let message = err.to_string();
        match err {
            ProfileError::Validation(_) => AppError::ValidationError(message),
            ProfileError::AnalysisRejected(_) | ProfileError::ServiceUnreachable { .. } => {
                AppError::ExternalService(message)
            }
            ProfileError::TimedOut { .. } => AppError::Timeout(message),
            ProfileError::NotSignedIn | ProfileError::Forbidden => AppError::Auth(message),
            ProfileError::Busy(_) => AppError::Conflict(message),
            ProfileError::NotFound(_) => AppError::NotFound(message),
            ProfileError::Save(_) | ProfileError::Load(_) | ProfileError::Update(_) => {
                AppError::Database(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_messages() {
        assert_eq!(
            ProfileError::from(ValidationError::MissingMeasure).to_string(),
            "Please enter either Height & Weight OR BMI"
        );
        assert_eq!(
            ProfileError::TimedOut { operation: Action::Analyze, seconds: 30 }.to_string(),
            "analyze timed out after 30s"
        );
        assert_eq!(ProfileError::Busy(Action::Save).to_string(), "save is already in progress");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ProfileError::from(ValidationError::MissingName), StatusCode::BAD_REQUEST),
            (ProfileError::AnalysisRejected("bad".into()), StatusCode::BAD_GATEWAY),
            (ProfileError::ServiceUnreachable { url: "http://x".into() }, StatusCode::BAD_GATEWAY),
            (ProfileError::TimedOut { operation: Action::Save, seconds: 5 }, StatusCode::GATEWAY_TIMEOUT),
            (ProfileError::Busy(Action::Analyze), StatusCode::CONFLICT),
            (ProfileError::NotSignedIn, StatusCode::UNAUTHORIZED),
            (ProfileError::Forbidden, StatusCode::UNAUTHORIZED),
            (ProfileError::NotFound("p-1".into()), StatusCode::NOT_FOUND),
            (ProfileError::Save("denied".into()), StatusCode::BAD_GATEWAY),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }
    }
}
