//! Contract Test: ハンドシェイク (POST /ping)

use crate::support::{
    host::{ChatBehavior, HostStub},
    node::{handshake, spawn_test_node},
};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn handshake_registers_host_and_inactive_models() {
    let (node, _state) = spawn_test_node().await;
    let host = HostStub::new(vec!["llama3:8b", "phi3"], ChatBehavior::Lines(vec![]))
        .spawn()
        .await;

    let response = handshake(&node, host.addr()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ack: Value = response.json().await.unwrap();
    assert_eq!(ack, json!({"status": "received"}));

    let models: Value = Client::new()
        .get(node.url("/models"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let models = models.as_array().unwrap();
    assert_eq!(models.len(), 2);
    for model in models {
        assert_eq!(
            model["hosts"],
            json!([{"host_ip": "127.0.0.1", "active": false}])
        );
    }
}

#[tokio::test]
async fn repeated_handshake_keeps_single_association() {
    let (node, state) = spawn_test_node().await;
    let host = HostStub::new(vec!["llama3:8b"], ChatBehavior::Lines(vec![]))
        .spawn()
        .await;

    handshake(&node, host.addr()).await.unwrap();
    handshake(&node, host.addr()).await.unwrap();

    let model = state.directory.get_model("llama3:8b").await.unwrap().unwrap();
    assert_eq!(model.hosts.len(), 1);
    assert_eq!(state.directory.list_hosts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn handshake_from_client_role_is_rejected() {
    let (node, _state) = spawn_test_node().await;

    let response = Client::new()
        .post(node.url("/ping"))
        .json(&json!({
            "ip_address": "127.0.0.1",
            "identifier": 1,
            "host_name": "laptop",
            "host_port": 9090
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("identifier"));
}

#[tokio::test]
async fn handshake_from_unreachable_host_is_bad_gateway() {
    let (node, state) = spawn_test_node().await;
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let response = handshake(&node, addr).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(state.directory.list_hosts().await.unwrap().is_empty());
}
