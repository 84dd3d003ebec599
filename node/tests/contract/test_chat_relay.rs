//! Contract Test: チャット中継 (POST /chat)
//!
//! スタブホストのNDJSON出力がSSEイベントとして届くことを確認する。

use crate::support::{
    host::{ChatBehavior, HostStub},
    node::{handshake, parse_sse, spawn_test_node},
};
use axum::http::StatusCode as AxumStatus;
use og_node::AppState;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::net::IpAddr;
use std::time::Duration;

fn line(content: &str, done: bool) -> Value {
    json!({
        "model": "llama3:8b",
        "created_at": "2024-01-01T00:00:00Z",
        "message": {"role": "assistant", "content": content},
        "done": done
    })
}

fn chat_body() -> Value {
    json!({
        "model": "llama3:8b",
        "messages": [{"role": "user", "content": "hello"}]
    })
}

async fn activate(state: &AppState, ip: IpAddr) {
    state
        .directory
        .upsert_hosting_association("llama3:8b", ip, true)
        .await
        .unwrap();
}

async fn wait_for_task_count(state: &AppState, ip: IpAddr, expected: u32) {
    for _ in 0..50 {
        let host = state.directory.get_host(ip).await.unwrap().unwrap();
        if host.task_count == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("task count for {ip} never reached {expected}");
}

#[tokio::test]
async fn chat_streams_message_events_until_done() {
    let (node, state) = spawn_test_node().await;
    let host = HostStub::new(
        vec!["llama3:8b"],
        ChatBehavior::Lines(vec![
            line("Hel", false),
            line("", false),
            line("lo", false),
            line("", true),
        ]),
    )
    .spawn()
    .await;
    handshake(&node, host.addr()).await.unwrap();
    activate(&state, host.addr().ip()).await;

    let response = Client::new()
        .post(node.url("/chat"))
        .json(&chat_body())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let events = parse_sse(&response.text().await.unwrap());
    let contents: Vec<String> = events
        .iter()
        .map(|(event, data)| {
            assert_eq!(event, "message");
            let chunk: Value = serde_json::from_str(data).unwrap();
            chunk["content"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(contents, vec!["Hel", "lo"]);

    wait_for_task_count(&state, host.addr().ip(), 0).await;
}

#[tokio::test]
async fn chat_host_error_status_is_passed_through() {
    let (node, state) = spawn_test_node().await;
    let host = HostStub::new(
        vec!["llama3:8b"],
        ChatBehavior::Fail(AxumStatus::INTERNAL_SERVER_ERROR, "engine crashed".into()),
    )
    .spawn()
    .await;
    handshake(&node, host.addr()).await.unwrap();
    activate(&state, host.addr().ip()).await;

    let response = Client::new()
        .post(node.url("/chat"))
        .json(&chat_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "engine crashed");
    wait_for_task_count(&state, host.addr().ip(), 0).await;
}

#[tokio::test]
async fn chat_without_loaded_host_is_unavailable() {
    let (node, _state) = spawn_test_node().await;
    let host = HostStub::new(vec!["llama3:8b"], ChatBehavior::Lines(vec![]))
        .spawn()
        .await;
    handshake(&node, host.addr()).await.unwrap();

    let response = Client::new()
        .post(node.url("/chat"))
        .json(&chat_body())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn chat_with_empty_messages_is_bad_request() {
    let (node, _state) = spawn_test_node().await;

    let response = Client::new()
        .post(node.url("/chat"))
        .json(&json!({"model": "llama3:8b", "messages": []}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
