// Integration tests for the HTTP chat hook

mod common;

use axum_test::TestServer;
use common::{complete_settings, dispatcher_with, flavor, image};
use nimbus_bot::routes::{create_router, AppState};
use nimbus_bot::settings::ComputeSettings;
use nimbus_common::ServerStatus;
use nimbus_providers::mock::MockProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn app(mock: MockProvider, settings: ComputeSettings) -> axum::Router {
    let (dispatcher, _) = dispatcher_with(mock, settings);
    create_router(Arc::new(AppState { dispatcher }))
}

fn test_server(mock: MockProvider, settings: ComputeSettings) -> TestServer {
    TestServer::new(app(mock, settings)).unwrap()
}

/// Splits a server-sent event body into (event name, JSON payload) pairs.
fn events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter_map(|block| {
            let mut name = None;
            let mut data = None;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("event:") {
                    name = Some(v.trim_start().to_string());
                } else if let Some(v) = line.strip_prefix("data:") {
                    data = Some(serde_json::from_str(v.trim_start()).unwrap());
                }
            }
            Some((name?, data?))
        })
        .collect()
}

#[tokio::test]
async fn test_root() {
    let server = test_server(MockProvider::new(), complete_settings());

    let response = server.get("/").await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(response.text(), "Nimbus compute bot online");
}

#[tokio::test]
async fn test_hook_streams_replies_in_order() {
    let mock = MockProvider::new()
        .with_flavors(vec![flavor("1", "small", 512, 10, 1, 0)])
        .await;
    let server = test_server(mock, complete_settings());

    let response = server
        .post("/hooks/chat")
        .json(&json!({ "text": "hubot openstack-compute flavor 1", "user": "alice" }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert_eq!(
        events(&response.text()),
        vec![(
            "reply".to_string(),
            json!({ "kind": "reply", "text": "small - ram:512 Mo, disk: 10Go, vcpus: 1, swap: 0\n" })
        )]
    );
}

#[tokio::test]
async fn test_hook_reports_missing_settings_as_room_messages() {
    let server = test_server(MockProvider::new(), ComputeSettings::default());

    let response = server
        .post("/hooks/chat")
        .json(&json!({ "text": "openstack-compute images" }))
        .await;

    let events = events(&response.text());
    assert_eq!(events.len(), 8);
    assert!(events.iter().all(|(name, data)| name == "send" && data["kind"] == "send"));
}

#[tokio::test]
async fn test_hook_ignores_other_messages() {
    let server = test_server(MockProvider::new(), complete_settings());

    let response = server
        .post("/hooks/chat")
        .json(&json!({ "text": "lunch?" }))
        .await;

    assert_eq!(response.status_code(), 204);
    assert!(response.text().is_empty());
}

#[tokio::test]
async fn test_created_reply_arrives_before_the_wait_ends() {
    let mock = MockProvider::new()
        .with_flavors(vec![flavor("1", "m1.small", 2048, 20, 1, 0)])
        .await
        .with_images(vec![image("img-1", "ubuntu")])
        .await
        .booting(1, ServerStatus::Running)
        .await;
    // The first poll is an hour away, so anything received now was not held back by the wait.
    let settings = ComputeSettings {
        wait_interval: Duration::from_secs(3600),
        wait_timeout: Duration::from_secs(7200),
        ..complete_settings()
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(mock.clone(), settings);
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let mut response = reqwest::Client::new()
        .post(format!("http://{}/hooks/chat", addr))
        .json(&json!({ "text": "openstack-compute server-create web-7 m1.small ubuntu ops" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let mut body = String::new();
    while !body.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(10), response.chunk())
            .await
            .expect("first event")
            .unwrap()
            .expect("stream ended early");
        body.push_str(&String::from_utf8_lossy(&chunk));
    }

    let first = events(&body);
    assert_eq!(
        first[0],
        (
            "reply".to_string(),
            json!({ "kind": "reply", "text": "Server created: web-7, waiting for active status" })
        )
    );
    let calls = mock.calls().await;
    assert!(calls.iter().any(|c| c == "create_server web-7"));
    assert!(!calls.iter().any(|c| c.starts_with("get_server")), "{:?}", calls);
}
