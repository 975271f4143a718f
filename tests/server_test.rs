use axum::body::Body;
use axum::http::{Request, StatusCode};
use limeboard::api::ResponseSource;
use limeboard::cache::{Snapshot, SnapshotCache};
use limeboard::config::DashboardConfig;
use limeboard::error::Result;
use limeboard::server::create_router;
use limeboard::state::AppState;
use limeboard::types::SurveyResponse;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

struct FixedSource {
    rows: Vec<SurveyResponse>,
}

#[async_trait::async_trait]
impl ResponseSource for FixedSource {
    fn source_name(&self) -> &'static str {
        "fixed"
    }

    async fn fetch_responses(&self) -> Result<Vec<SurveyResponse>> {
        Ok(self.rows.clone())
    }
}

fn sample_responses() -> Vec<SurveyResponse> {
    [
        json!({"id": "1", "token": "tok-a", "lastpage": 5,
               "startdate": "2025-05-21 10:00:00", "q1age": "25-34"}),
        json!({"id": "2", "token": "tok-b", "lastpage": 1,
               "startdate": "2025-05-21 11:00:00", "q1age": "35-44"}),
        json!({"id": "3", "token": "tok-a", "lastpage": 5,
               "startdate": "2025-05-01 09:00:00", "q1age": "25-34"}),
    ]
    .iter()
    .map(|raw| SurveyResponse::from_raw(raw, 3).unwrap())
    .collect()
}

fn test_state(dir: &std::path::Path) -> AppState {
    let rows = sample_responses();
    AppState::new(
        Arc::new(FixedSource { rows: rows.clone() }),
        Arc::new(SnapshotCache::new(dir)),
        Arc::new(DashboardConfig::default()),
        Snapshot::new(rows),
    )
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn health_reports_service_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state(dir.path()));

    let (status, body) = get_json(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "limeboard");
}

#[tokio::test]
async fn summary_applies_the_default_cutoff() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state(dir.path()));

    // Default cutoff is 2025-05-20 18:00 Helsinki; response 3 predates it
    let (status, body) = get_json(router, "/api/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["completed"], 1);
    assert_eq!(body["partial"], 1);
    assert_eq!(body["unique_tokens"], 2);
}

#[tokio::test]
async fn summary_honors_query_selectors() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    // Earlier cutoff pulls in all three responses
    let (_, body) = get_json(
        create_router(state.clone()),
        "/api/summary?cutoff_date=2025-04-01&cutoff_time=00:00",
    )
    .await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["unique_tokens"], 2);

    let (_, body) = get_json(
        create_router(state),
        "/api/summary?cutoff_date=2025-04-01&cutoff_time=00:00&completed_only=true",
    )
    .await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["partial"], 0);
}

#[tokio::test]
async fn checkbox_style_completed_flag_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    // Checkbox widgets send 1 rather than true
    let (status, body) = get_json(
        create_router(state.clone()),
        "/api/summary?cutoff_date=2025-04-01&completed_only=1",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["partial"], 0);

    // Garbage degrades to the unfiltered default instead of a 400
    let (status, body) = get_json(
        create_router(state),
        "/api/summary?cutoff_date=2025-04-01&completed_only=banana",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn questions_return_sorted_counts() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state(dir.path()));

    let (status, body) = get_json(router, "/api/questions?cutoff_date=2025-04-01").await;
    assert_eq!(status, StatusCode::OK);
    let questions = body.as_array().unwrap();
    let age = questions
        .iter()
        .find(|q| q["code"] == "q1age")
        .expect("q1age should be charted");
    assert_eq!(age["label"], "Age");
    assert_eq!(age["counts"][0]["answer"], "25-34");
    assert_eq!(age["counts"][0]["count"], 2);
    assert_eq!(age["counts"][1]["answer"], "35-44");
}

#[tokio::test]
async fn manual_refresh_is_throttled_on_the_second_call() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path());

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/admin/refresh")
            .body(Body::empty())
            .unwrap()
    };

    let first = create_router(state.clone()).oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = create_router(state).oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn dashboard_shell_carries_the_configured_title() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state(dir.path()));

    let response = router
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let html = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(html.contains("Haaga-Helia LimeSurvey Dashboard"));
    assert!(html.contains("/api/summary"));
}

#[tokio::test]
async fn metrics_endpoint_answers_even_without_a_recorder() {
    let dir = tempfile::tempdir().unwrap();
    let router = create_router(test_state(dir.path()));

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
