use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use analysis_cell::analysis_routes;
use auth_cell::{SessionProvider, SupabaseIdentityProvider, View};
use profile_cell::models::{ClinicalEdit, FieldEdit, NOT_AVAILABLE};
use profile_cell::services::dashboard::{NoticeKind, SAVED_NOTICE};
use profile_cell::{Dashboard, ProfileError, ValidationError};
use shared_config::AppConfig;
use shared_utils::in_flight::Action;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn dashboard(config: &AppConfig) -> Dashboard {
    let sessions = SessionProvider::new(Arc::new(SupabaseIdentityProvider::new(config)));
    Dashboard::new(config, Arc::new(sessions))
}

async fn signed_in_dashboard(mock_server: &MockServer, config: &AppConfig, user: &TestUser) -> Dashboard {
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::auth_session_response(user, &config.supabase_jwt_secret),
        ))
        .mount(mock_server)
        .await;

    let sessions = Arc::new(SessionProvider::new(Arc::new(SupabaseIdentityProvider::new(config))));
    sessions.sign_in(&user.email, "correct horse").await.unwrap();
    Dashboard::new(config, sessions)
}

fn fill_valid_form(dashboard: &Dashboard) {
    dashboard.edit(FieldEdit::Name("Ada Patient".into()));
    dashboard.edit(FieldEdit::Age("52".into()));
    dashboard.edit(FieldEdit::Gender("Female".into()));
    dashboard.edit(FieldEdit::Bmi("25.7".into()));
}

#[tokio::test]
async fn test_analyze_stores_result_for_display() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "risk_score": 0.42,
            "prediction": "low-risk",
            "confidence": 0.85
        })))
        .mount(&mock_server)
        .await;

    let dashboard = dashboard(&config);
    fill_valid_form(&dashboard);
    dashboard.analyze().await.unwrap();

    let view = dashboard.result_view().unwrap();
    assert_eq!(view.risk_score.as_deref(), Some("0.42"));
    assert_eq!(view.confidence.as_deref(), Some("85.0%"));
    assert!(!dashboard.is_busy(Action::Analyze));
}

#[tokio::test]
async fn test_failed_analysis_keeps_previous_result() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "risk_score": 0.42 })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": true,
            "message": "Failed to analyze patient data"
        })))
        .mount(&mock_server)
        .await;

    let dashboard = dashboard(&config);
    fill_valid_form(&dashboard);
    dashboard.analyze().await.unwrap();

    let err = dashboard.analyze().await.unwrap_err();
    assert_eq!(err.to_string(), "Analysis failed: Failed to analyze patient data");

    let state = dashboard.snapshot();
    assert_eq!(state.result.and_then(|r| r.risk_score), Some(0.42));
    let notice = state.notice.unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, "Analysis failed: Failed to analyze patient data");
}

#[tokio::test]
async fn test_invalid_form_never_reaches_the_service() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let dashboard = dashboard(&config);
    dashboard.edit(FieldEdit::Name("Ada".into()));
    dashboard.edit(FieldEdit::Age("52".into()));

    let err = dashboard.analyze().await.unwrap_err();
    assert_eq!(err, ProfileError::Validation(ValidationError::MissingGender));
}

#[tokio::test]
async fn test_duplicate_analyze_is_refused_while_running() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "risk_score": 0.2 }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let dashboard = dashboard(&config);
    fill_valid_form(&dashboard);

    let (first, second) = tokio::join!(dashboard.analyze(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        dashboard.analyze().await
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), ProfileError::Busy(Action::Analyze));
    assert!(!dashboard.is_busy(Action::Analyze));
}

#[tokio::test]
async fn test_save_requires_a_signed_in_identity() {
    let config = TestConfig::default().to_app_config();
    let dashboard = dashboard(&config);
    fill_valid_form(&dashboard);

    let err = dashboard.save().await.unwrap_err();
    assert_eq!(err.to_string(), "Please log in to save your profile");
    // The form is kept so it can be saved after signing in.
    assert_eq!(dashboard.snapshot().form.name, "Ada Patient");
}

#[tokio::test]
async fn test_save_appends_record_and_resets_form() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::new("clinician@example.com");
    let dashboard = signed_in_dashboard(&mock_server, &config, &user).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/user_profiles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::profile_record_response("rec-1", &user.id, Some("2025-05-01T09:00:00Z"))
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    fill_valid_form(&dashboard);
    dashboard.edit_clinical(ClinicalEdit::Ef("55".into()));
    let record = dashboard.save().await.unwrap();
    assert_eq!(record.id, "rec-1");

    let state = dashboard.snapshot();
    assert_eq!(state.form, Default::default());
    assert_eq!(state.clinical.to_parameters().ef, NOT_AVAILABLE);
    assert!(state.result.is_none());
    assert_eq!(state.records.len(), 1);
    assert_eq!(state.notice.map(|n| n.message), Some(SAVED_NOTICE.to_string()));
}

#[tokio::test]
async fn test_refresh_records_and_sign_out_clears_state() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::new("clinician@example.com");
    let dashboard = signed_in_dashboard(&mock_server, &config, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/user_profiles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::profile_record_response("rec-1", &user.id, Some("2025-05-01T09:00:00Z"))
        ])))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let records = dashboard.refresh_records().await.unwrap();
    // Both the legacy lookup and the collection query return the same row.
    assert_eq!(records.len(), 1);

    assert_matches!(dashboard.sign_out().await, Ok(View::SignIn));
    assert!(dashboard.snapshot().records.is_empty());
}

#[tokio::test]
async fn test_busy_analyze_does_not_block_save() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri()).to_app_config();
    let user = TestUser::new("clinician@example.com");
    let dashboard = signed_in_dashboard(&mock_server, &config, &user).await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "risk_score": 0.2 }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/user_profiles"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::profile_record_response("rec-1", &user.id, None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    fill_valid_form(&dashboard);

    let (first, (second, saved)) = tokio::join!(dashboard.analyze(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = dashboard.analyze().await;
        (second, dashboard.save().await)
    });

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), ProfileError::Busy(Action::Analyze));
    assert_eq!(saved.unwrap().id, "rec-1");
}

#[tokio::test]
async fn test_unreachable_service_keeps_previous_result() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let analyzer_url = format!("http://{}", listener.local_addr().unwrap());
    let (stop, stopped) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        axum::serve(listener, analysis_routes())
            .with_graceful_shutdown(async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
    });

    let config = TestConfig {
        analysis_api_url: analyzer_url,
        ..TestConfig::default()
    }
    .to_app_config();

    let dashboard = dashboard(&config);
    fill_valid_form(&dashboard);
    dashboard.analyze().await.unwrap();
    let before = dashboard.result_view().unwrap();
    assert_eq!(before.risk_score.as_deref(), Some("47.00"));

    stop.send(()).unwrap();
    server.await.unwrap();

    let err = dashboard.analyze().await.unwrap_err();
    assert_matches!(err, ProfileError::ServiceUnreachable { .. });

    assert_eq!(dashboard.result_view(), Some(before));
    assert_eq!(dashboard.snapshot().notice.map(|n| n.kind), Some(NoticeKind::Error));
    assert!(!dashboard.is_busy(Action::Analyze));
}
