use og_node::{api, store, AppState};
use reqwest::{Client, Response};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

use super::http::{spawn_router, TestServer};

/// インメモリストアでノードを起動する
pub async fn spawn_test_node() -> (TestServer, AppState) {
    let state = AppState::new(Arc::new(store::MemoryStore::new()), store::DEFAULT_TTL);
    let server = spawn_router(api::create_router(state.clone())).await;
    (server, state)
}

/// スタブホストとしてハンドシェイクを送る
pub async fn handshake(node: &TestServer, host_addr: SocketAddr) -> reqwest::Result<Response> {
    Client::new()
        .post(node.url("/ping"))
        .json(&json!({
            "ip_address": host_addr.ip().to_string(),
            "identifier": 0,
            "host_name": "stub-host",
            "timestamp": chrono::Utc::now(),
            "host_port": host_addr.port(),
        }))
        .send()
        .await
}

/// SSEレスポンスを `(event, data)` の列に分解する
pub fn parse_sse(body: &str) -> Vec<(String, String)> {
    body.split("\n\n")
        .filter_map(|frame| {
            let mut event = None;
            let mut data = Vec::new();
            for line in frame.lines() {
                if let Some(value) = line.strip_prefix("event:") {
                    event = Some(value.trim().to_string());
                } else if let Some(value) = line.strip_prefix("data:") {
                    data.push(value.trim_start().to_string());
                }
            }
            event.map(|event| (event, data.join("\n")))
        })
        .collect()
}
