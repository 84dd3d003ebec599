//! Contract Test: モデルのロード・アンロード (POST /load-model, /unload-model)

use crate::support::{
    host::{ChatBehavior, HostStub},
    node::{handshake, spawn_test_node},
};
use ollama_gate_common::types::{HostingAssociation, ModelRecord};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

#[tokio::test]
async fn load_model_activates_inactive_host() {
    let (node, state) = spawn_test_node().await;
    let stub = HostStub::new(vec!["llama3:8b"], ChatBehavior::Lines(vec![]));
    let host = stub.clone().spawn().await;
    handshake(&node, host.addr()).await.unwrap();

    let response = Client::new()
        .post(node.url("/load-model"))
        .json(&json!({"model": "llama3:8b"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["model"], "llama3:8b");
    assert_eq!(stub.load_count(), 1);

    let model = state.directory.get_model("llama3:8b").await.unwrap().unwrap();
    assert!(model.hosts[0].active);
}

#[tokio::test]
async fn load_model_without_inactive_host_is_conflict() {
    let (node, _state) = spawn_test_node().await;
    let stub = HostStub::new(vec!["llama3:8b"], ChatBehavior::Lines(vec![]));
    let host = stub.clone().spawn().await;
    handshake(&node, host.addr()).await.unwrap();
    let client = Client::new();

    let first = client
        .post(node.url("/load-model"))
        .json(&json!({"model": "llama3:8b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = client
        .post(node.url("/load-model"))
        .json(&json!({"model": "llama3:8b"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(stub.load_count(), 1);
}

#[tokio::test]
async fn load_unknown_model_is_not_found() {
    let (node, _state) = spawn_test_node().await;

    let response = Client::new()
        .post(node.url("/load-model"))
        .json(&json!({"model": "ghost"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unload_model_deactivates_host() {
    let (node, state) = spawn_test_node().await;
    let stub = HostStub::new(vec!["phi3"], ChatBehavior::Lines(vec![]));
    let host = stub.clone().spawn().await;
    handshake(&node, host.addr()).await.unwrap();
    state
        .directory
        .upsert_hosting_association("phi3", host.addr().ip(), true)
        .await
        .unwrap();

    let response = Client::new()
        .post(node.url("/unload-model"))
        .json(&json!({"model": "phi3"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(stub.stop_count(), 1);
    let model = state.directory.get_model("phi3").await.unwrap().unwrap();
    assert!(!model.hosts[0].active);
}

#[tokio::test]
async fn load_model_with_empty_name_is_bad_request() {
    let (node, _state) = spawn_test_node().await;

    let response = Client::new()
        .post(node.url("/load-model"))
        .json(&json!({"model": " "}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unload_model_on_host_without_model_is_bad_request() {
    let (node, state) = spawn_test_node().await;
    let stub = HostStub::new(vec!["phi3"], ChatBehavior::Lines(vec![]));
    let host = stub.clone().spawn().await;
    handshake(&node, host.addr()).await.unwrap();

    let owner: std::net::IpAddr = "10.0.0.1".parse().unwrap();
    state
        .directory
        .upsert_model(ModelRecord {
            name: "llama".into(),
            family: String::new(),
            parameter_size: String::new(),
            hosts: vec![HostingAssociation {
                host_ip: owner,
                active: false,
            }],
        })
        .await
        .unwrap();

    let response = Client::new()
        .post(node.url("/unload-model"))
        .json(&json!({"model": "llama", "host_ip": host.addr().ip().to_string()}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("llama"));
    assert_eq!(stub.stop_count(), 0);

    let model = state.directory.get_model("llama").await.unwrap().unwrap();
    let hosts: Vec<_> = model.hosts.iter().map(|a| a.host_ip).collect();
    assert_eq!(hosts, vec![owner]);
}
