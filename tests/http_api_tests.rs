// Integration tests for the HTTP control API
//
// Requests go straight into the router with `oneshot`; no socket is bound.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{arbiter, deps, english_selector, session_config, MockMic, MockResponder, RecordingSynth, ScriptedStt};
use saras_voice::activation::{ActivationCoordinator, ActivationEvent, ActivationProbe, DetectorConfig};
use saras_voice::{create_router, AppState};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct NeverProbe;

#[async_trait::async_trait]
impl ActivationProbe for NeverProbe {
    async fn probe(&self) -> anyhow::Result<Option<ActivationEvent>> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(None)
    }

    fn iteration_timeout(&self) -> Duration {
        Duration::from_secs(1)
    }
}

fn app(heard: &[&str]) -> (Router, Arc<ActivationCoordinator>) {
    let stt = Arc::new(ScriptedStt::online("deepgram").saying(heard));
    let arbiter = arbiter(MockMic::speaking());
    let selector = english_selector(stt);
    let coordinator = ActivationCoordinator::new(
        deps(
            Arc::clone(&arbiter),
            Arc::clone(&selector),
            Arc::new(MockResponder::slow(Duration::from_secs(2))),
            Arc::new(RecordingSynth::default()),
        ),
        session_config(),
    );
    coordinator.add_detector("wake_word", Arc::new(NeverProbe), DetectorConfig::default());

    let router = create_router(AppState::new(Arc::clone(&coordinator), arbiter, selector));
    (router, coordinator)
}

async fn send(app: &Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

async fn send_json(app: &Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(app, method, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(&[]);

    let (status, body) = send(&app, "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_status_when_idle() {
    let (app, _) = app(&[]);

    let (status, json) = send_json(&app, "GET", "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session_active"], false);
    assert_eq!(json["state"], "idle");
    assert_eq!(json["microphone"]["holder"], Value::Null);
    assert_eq!(json["microphone"]["device"], "mock-mic");
    assert_eq!(json["detectors"][0]["name"], "wake_word");
    assert_eq!(json["detectors"][0]["state"], "stopped");
    assert_eq!(json["stt_backends"], serde_json::json!(["deepgram"]));
    assert_eq!(json["last_session"], Value::Null);
}

#[tokio::test(start_paused = true)]
async fn test_activate_conflicts_while_active() {
    let (app, coordinator) = app(&["hello", "bye"]);

    let (status, json) = send_json(&app, "POST", "/activate").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(json["status"], "activated");

    let (status, json) = send_json(&app, "POST", "/activate").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("already"));

    let (_, json) = send_json(&app, "GET", "/status").await;
    assert_eq!(json["session_active"], true);

    coordinator.wait_for_idle().await;

    let (_, json) = send_json(&app, "GET", "/status").await;
    assert_eq!(json["session_active"], false);
    assert_eq!(json["state"], "idle");
    assert_eq!(json["last_session"]["source"], "manual");
    assert_eq!(json["last_session"]["turns"], 2);
}

#[tokio::test(start_paused = true)]
async fn test_detector_start_and_stop() {
    let (app, coordinator) = app(&[]);

    let (status, json) = send_json(&app, "POST", "/detectors/start").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "started");

    let (_, json) = send_json(&app, "GET", "/status").await;
    assert_eq!(json["detectors"][0]["state"], "running");

    let (_, json) = send_json(&app, "POST", "/detectors/stop").await;
    assert_eq!(json["status"], "stopped");

    let (_, json) = send_json(&app, "GET", "/status").await;
    assert_eq!(json["detectors"][0]["state"], "stopped");

    coordinator.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = app(&[]);

    let (status, _) = send(&app, "GET", "/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
