use axum::Router;
use serde_json::{json, Value};
use std::net::SocketAddr;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// `/api/tags` を返すエンジンのスタブ
pub async fn engine_with_models(models: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    let tags = json!({
        "models": models
            .iter()
            .map(|name| json!({
                "name": name,
                "model": name,
                "size": 4_661_224_676u64,
                "digest": "sha256:abc",
                "modified_at": "2024-05-01T10:00:00Z",
                "details": {"format": "gguf", "family": "llama", "parameter_size": "8.0B", "quantization_level": "Q4_0"}
            }))
            .collect::<Vec<_>>()
    });
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tags))
        .mount(&server)
        .await;
    server
}

/// エンジンの `/api/chat` NDJSON 1行
pub fn chat_line(content: &str, done: bool) -> Value {
    json!({
        "model": "llama3:8b",
        "created_at": "2024-05-01T10:00:00Z",
        "message": {"role": "assistant", "content": content},
        "done": done
    })
}

pub fn ndjson(lines: &[Value]) -> String {
    lines.iter().map(|line| format!("{}\n", line)).collect()
}

/// ルーターをループバックの空きポートで起動する
pub async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
