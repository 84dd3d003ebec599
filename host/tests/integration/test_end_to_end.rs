//! Integration Test: エンジン → ホスト → ノードの一連の流れ
//!
//! ホストがノードに登録し、ノード経由でロードとチャットができることを確認する。

use super::support::{chat_line, engine_with_models, ndjson, serve};
use og_host::{
    api,
    client::{HostIdentity, NodeClient},
    AppState,
};
use ollama_gate_common::gateway::GatewayClient;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

async fn spawn_node() -> (std::net::SocketAddr, og_node::AppState) {
    let state = og_node::AppState::new(
        Arc::new(og_node::store::MemoryStore::new()),
        og_node::store::DEFAULT_TTL,
    );
    let addr = serve(og_node::api::create_router(state.clone())).await;
    (addr, state)
}

#[tokio::test]
async fn host_registers_then_node_loads_and_relays_chat() {
    let engine = engine_with_models(&["llama3:8b"]).await;
    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .mount(&engine)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson(&[
            chat_line("Hello", false),
            chat_line(" world", false),
            chat_line("", true),
        ])))
        .mount(&engine)
        .await;

    let host_addr = serve(api::create_router(AppState::new(
        GatewayClient::for_engine(engine.uri()).unwrap(),
    )))
    .await;
    let (node_addr, node_state) = spawn_node().await;

    let identity = HostIdentity {
        ip_address: host_addr.ip(),
        host_name: "e2e-host".into(),
        host_port: host_addr.port(),
    };
    NodeClient::new(format!("http://{}", node_addr))
        .unwrap()
        .send_handshake(&identity.handshake())
        .await
        .unwrap();

    let model = node_state
        .directory
        .get_model("llama3:8b")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(model.family, "llama");
    assert_eq!(model.parameter_size, "8.0B");
    assert!(!model.hosts[0].active);

    let client = Client::new();
    let load = client
        .post(format!("http://{}/load-model", node_addr))
        .json(&json!({"model": "llama3:8b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(load.status(), StatusCode::OK);
    let load_body: Value = load.json().await.unwrap();
    assert_eq!(load_body["message"], "Model loaded successfully");

    let chat = client
        .post(format!("http://{}/chat", node_addr))
        .json(&json!({"model": "llama3:8b", "messages": [{"role": "user", "content": "hi"}]}))
        .send()
        .await
        .unwrap();
    assert_eq!(chat.status(), StatusCode::OK);
    let text = chat.text().await.unwrap();

    let contents: Vec<String> = text
        .split("\n\n")
        .filter(|frame| {
            frame
                .lines()
                .any(|l| l.strip_prefix("event:").map(str::trim) == Some("message"))
        })
        .filter_map(|frame| frame.lines().find_map(|l| l.strip_prefix("data:")))
        .map(|data| {
            let chunk: Value = serde_json::from_str(data.trim_start()).unwrap();
            chunk["content"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(contents, vec!["Hello", " world"]);
}

#[tokio::test]
async fn node_rejects_host_whose_engine_is_down() {
    let engine = engine_with_models(&[]).await;
    let engine_uri = engine.uri();
    drop(engine);

    let host_addr = serve(api::create_router(AppState::new(
        GatewayClient::for_engine(engine_uri).unwrap(),
    )))
    .await;
    let (node_addr, node_state) = spawn_node().await;

    let identity = HostIdentity {
        ip_address: host_addr.ip(),
        host_name: "broken-host".into(),
        host_port: host_addr.port(),
    };
    let result = NodeClient::new(format!("http://{}", node_addr))
        .unwrap()
        .send_handshake(&identity.handshake())
        .await;

    assert!(result.is_err());
    assert!(node_state.directory.list_hosts().await.unwrap().is_empty());
}
