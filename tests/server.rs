//! HTTP trigger tests against a real listener on an ephemeral port.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpListener;

use bridge_harvester::models::Category;
use bridge_harvester::pipeline::Harvester;
use bridge_harvester::runner::RunCoordinator;
use bridge_harvester::server::{serve, AppState};
use bridge_harvester::store::InMemoryStore;
use bridge_harvester::traits::{Notifier, PageFetcher};

const LINE: &str =
    "obfs4 1.2.3.4:443 0123456789ABCDEF0123456789ABCDEF01234567 cert=abc iat-mode=0";

struct StaticFetcher;

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<String> {
        Ok(format!("<pre>{}</pre>", LINE))
    }
}

struct Silent;

#[async_trait]
impl Notifier for Silent {
    async fn send_message(&self, _text: &str) -> Result<()> {
        Ok(())
    }
}

async fn start() -> (String, AppState) {
    let urls = BTreeMap::from([(Category::Obfs4Ipv4, "https://bridges.test/a".to_string())]);
    let harvester = Harvester::new(
        urls,
        Arc::new(StaticFetcher),
        Arc::new(InMemoryStore::new()),
        Arc::new(Silent),
    )
    .with_notify_delay(Duration::ZERO);

    let state = AppState {
        harvester: Arc::new(harvester),
        coordinator: Arc::new(RunCoordinator::new()),
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(serve(listener, state.clone()));
    (base, state)
}

#[tokio::test]
async fn test_health() {
    let (base, _state) = start().await;
    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_run_then_status() {
    let (base, _state) = start().await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{}/run", base)).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["lastRun"].is_string());
    assert_eq!(body["report"]["newBridges"]["obfs4_ipv4"][0], LINE);

    // Second run finds the same line again
    let body: Value = client
        .post(format!("{}/run", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["report"]["duplicateBridges"]["obfs4_ipv4"][0], LINE);

    let status: Value = client
        .get(format!("{}/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["running"], false);
    assert_eq!(status["last"]["status"], "ok");
    assert!(status["nextRun"].is_null());
}

#[tokio::test]
async fn test_run_while_busy_returns_conflict() {
    let (base, state) = start().await;
    let _guard = state.coordinator.try_acquire().unwrap();

    let resp = reqwest::Client::new()
        .post(format!("{}/run", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, serde_json::json!({"status": "busy"}));
}
