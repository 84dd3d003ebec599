//! Contract Test: ホスト一覧 (GET /hosts, DELETE /hosts/:ip)

use crate::support::{
    host::{ChatBehavior, HostStub},
    node::{handshake, spawn_test_node},
};
use reqwest::{Client, StatusCode};
use serde_json::Value;

#[tokio::test]
async fn hosts_are_listed_and_removed() {
    let (node, _state) = spawn_test_node().await;
    let host = HostStub::new(vec!["phi3"], ChatBehavior::Lines(vec![]))
        .spawn()
        .await;
    handshake(&node, host.addr()).await.unwrap();
    let client = Client::new();

    let hosts: Value = client
        .get(node.url("/hosts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let hosts = hosts.as_array().unwrap();
    assert_eq!(hosts.len(), 1);
    assert_eq!(hosts[0]["host_name"], "stub-host");
    assert_eq!(hosts[0]["port"], host.addr().port());

    let response = client
        .delete(node.url("/hosts/127.0.0.1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let hosts: Value = client
        .get(node.url("/hosts"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(hosts, Value::Array(vec![]));
}

#[tokio::test]
async fn delete_host_with_invalid_address_is_bad_request() {
    let (node, _state) = spawn_test_node().await;

    let response = Client::new()
        .delete(node.url("/hosts/not-an-ip"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
