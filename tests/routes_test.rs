//! REST surface: translation submission, one-off status lookup and health.

mod fixtures;
mod helpers;

use cad_translate_monitor::models::job::TranslationState;
use cad_translate_monitor::services::aps::encode_urn;
use cad_translate_monitor::services::prober::ProbeError;
use fixtures::*;
use helpers::*;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INTERVAL: Duration = Duration::from_millis(500);

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/authentication/v2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response("tok-1", 3599)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_submit_translation_returns_encoded_urn() {
    let aps = MockServer::start().await;
    mount_token(&aps).await;
    let encoded = encode_urn(OBJECT_URN);
    Mock::given(method("POST"))
        .and(path("/modelderivative/v2/designdata/job"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_accepted(&encoded)))
        .expect(1)
        .mount(&aps)
        .await;

    let (addr, _state) =
        spawn_app_with_aps(&aps.uri(), Arc::new(ScriptedProber::new()), config(INTERVAL, 3)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/translate"))
        .json(&json!({"objectName": "tower.rvt"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "urn": encoded,
            "result": "created",
            "message": "Translation job started successfully."
        })
    );
}

#[tokio::test]
async fn test_submit_translation_rejects_empty_object_name() {
    let aps = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modelderivative/v2/designdata/job"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&aps)
        .await;

    let (addr, _state) =
        spawn_app_with_aps(&aps.uri(), Arc::new(ScriptedProber::new()), config(INTERVAL, 3)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/translate"))
        .json(&json!({"objectName": ""}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_submit_translation_provider_failure_is_bad_gateway() {
    let aps = MockServer::start().await;
    mount_token(&aps).await;
    Mock::given(method("POST"))
        .and(path("/modelderivative/v2/designdata/job"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&aps)
        .await;

    let (addr, _state) =
        spawn_app_with_aps(&aps.uri(), Arc::new(ScriptedProber::new()), config(INTERVAL, 3)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/v1/translate"))
        .json(&json!({"objectName": "tower.rvt"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_status_lookup_returns_flattened_status() {
    let encoded = encode_urn(OBJECT_URN);
    let prober = Arc::new(ScriptedProber::new());
    prober.script(
        &encoded,
        vec![Ok(status(TranslationState::Success, "100%").with_result(IFC_URN))],
    );
    let (addr, state) = spawn_app(prober.clone(), config(INTERVAL, 3)).await;

    let response = reqwest::get(format!("http://{addr}/api/v1/translate/{encoded}/status"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "urn": encoded,
            "status": "success",
            "progress": "100%",
            "resultHandle": IFC_URN
        })
    );
    assert_eq!(prober.calls_for(&encoded), 1);

    // A one-off lookup never starts polling.
    assert_eq!(state.registry.active_count(), 0);
}

#[tokio::test]
async fn test_status_lookup_maps_probe_errors() {
    let prober = Arc::new(ScriptedProber::new());
    prober.script(
        "missing",
        vec![Err(ProbeError::NotFound("404 Not Found".to_string()))],
    );
    prober.script("flaky", vec![transient()]);
    prober.script(
        "broken",
        vec![Err(ProbeError::Permanent("unexpected manifest status".to_string()))],
    );
    let (addr, _state) = spawn_app(prober.clone(), config(INTERVAL, 3)).await;

    for (job, expected) in [
        ("missing", StatusCode::NOT_FOUND),
        ("flaky", StatusCode::BAD_GATEWAY),
        ("broken", StatusCode::BAD_GATEWAY),
    ] {
        let response = reqwest::get(format!("http://{addr}/api/v1/translate/{job}/status"))
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "job {job}");
    }
}

#[tokio::test]
async fn test_health_reports_counts() {
    let (addr, _state) = spawn_app(Arc::new(ScriptedProber::new()), config(INTERVAL, 3)).await;

    let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "UP");
    assert_eq!(body["activeMonitors"], 0);
    assert_eq!(body["connections"], 0);
}
