use serde_json::json;
use shared::{domain::EventSettings, error::ControlError, protocol::FullState};
use sync::{spawn_push_worker, SyncBridge};
use tokio::sync::watch;
use url::Url;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn snapshot() -> FullState {
    FullState {
        settings: EventSettings::default(),
        phases: Vec::new(),
        schedule: Vec::new(),
        timestamp: chrono::Utc::now(),
    }
}

fn bridge_for(server: &MockServer) -> SyncBridge {
    let endpoint: Url = format!("{}/api/state", server.uri()).parse().expect("url");
    SyncBridge::new(Some(endpoint))
}

#[tokio::test]
async fn push_posts_snapshot_to_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/state"))
        .and(body_partial_json(json!({"settings": {"id": "main"}})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    bridge_for(&server).push(&snapshot()).await.expect("push");
}

#[tokio::test]
async fn push_without_endpoint_is_silent_noop() {
    let bridge = SyncBridge::new(None);
    assert!(!bridge.is_configured());
    bridge.push(&snapshot()).await.expect("noop push");
}

#[tokio::test]
async fn push_surfaces_non_2xx_as_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = bridge_for(&server)
        .push(&snapshot())
        .await
        .expect_err("should fail");
    assert!(matches!(err, ControlError::ExternalError(500)));
}

#[tokio::test]
async fn push_surfaces_transport_failure_as_unreachable() {
    let endpoint: Url = "http://127.0.0.1:1/api/state".parse().expect("url");
    let err = SyncBridge::new(Some(endpoint))
        .push(&snapshot())
        .await
        .expect_err("should fail");
    assert!(matches!(err, ControlError::ExternalUnreachable(_)));
}

#[tokio::test]
async fn pull_parses_full_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "settings": {
                "id": "main",
                "event_name": "Town Hall",
                "event_date": "2026-09-01",
                "is_paused": false,
                "auto_advance": true,
                "current_item_id": "item-1"
            },
            "phases": [
                {"id": "p1", "name": "Live", "color": "#ef4444", "order": 0}
            ],
            "schedule": [
                {
                    "id": "item-1",
                    "title": "Opening",
                    "start_time": "09:00",
                    "end_time": "09:30",
                    "order": 0
                }
            ],
            "timestamp": "2026-01-15T10:00:00Z"
        })))
        .mount(&server)
        .await;

    let state = bridge_for(&server).pull().await.expect("pull");
    assert_eq!(state.settings.event_name, "Town Hall");
    assert_eq!(state.phases.len(), 1);
    assert_eq!(state.schedule.len(), 1);
    assert_eq!(state.schedule[0].title, "Opening");
}

#[tokio::test]
async fn pull_without_endpoint_is_an_error() {
    let err = SyncBridge::new(None).pull().await.expect_err("should fail");
    assert!(matches!(err, ControlError::NotConfigured));
}

#[tokio::test]
async fn pull_surfaces_non_2xx_as_external_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = bridge_for(&server).pull().await.expect_err("should fail");
    assert!(matches!(err, ControlError::ExternalError(404)));
}

#[tokio::test]
async fn worker_pushes_snapshot_and_coalesces_bursts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/state"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1..=3)
        .mount(&server)
        .await;

    let storage = storage::Storage::new("sqlite::memory:").await.expect("db");
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (handle, task) = spawn_push_worker(bridge_for(&server), storage, shutdown_rx);

    for _ in 0..5 {
        handle.request_push();
    }
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    shutdown_tx.send(true).expect("signal shutdown");
    task.await.expect("worker exits");
}
