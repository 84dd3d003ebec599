use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use super::http::{spawn_router, TestServer};

/// スタブホストの `/chat` の振る舞い
#[derive(Clone)]
pub enum ChatBehavior {
    /// NDJSON行をそのまま返す
    Lines(Vec<Value>),
    /// 指定ステータスのエラーを返す
    Fail(StatusCode, String),
}

/// ホストエージェントのスタブ
#[derive(Clone)]
pub struct HostStub {
    pub models: Vec<&'static str>,
    pub chat: ChatBehavior,
    pub loads: Arc<AtomicUsize>,
    pub stops: Arc<AtomicUsize>,
}

impl HostStub {
    pub fn new(models: Vec<&'static str>, chat: ChatBehavior) -> Self {
        Self {
            models,
            chat,
            loads: Arc::new(AtomicUsize::new(0)),
            stops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub async fn spawn(self) -> TestServer {
        let tags = json!({
            "models": self
                .models
                .iter()
                .map(|name| json!({"name": name, "size": 1, "details": {"family": "llama", "parameter_size": "8B"}}))
                .collect::<Vec<_>>()
        });
        let loads = self.loads.clone();
        let stops = self.stops.clone();
        let chat = self.chat.clone();

        let router = Router::new()
            .route(
                "/fetch-models",
                get(move || {
                    let tags = tags.clone();
                    async move { Json(tags) }
                }),
            )
            .route(
                "/load-model",
                post(move |Json(body): Json<Value>| {
                    let loads = loads.clone();
                    async move {
                        loads.fetch_add(1, Ordering::SeqCst);
                        Json(json!({
                            "message": "Model loaded successfully",
                            "model": body["model_name"],
                            "time_taken": "0.010s"
                        }))
                    }
                }),
            )
            .route(
                "/stop-model",
                post(move |Json(body): Json<Value>| {
                    let stops = stops.clone();
                    async move {
                        stops.fetch_add(1, Ordering::SeqCst);
                        Json(json!({"model": body["model_name"], "done": true}))
                    }
                }),
            )
            .route(
                "/chat",
                post(move || {
                    let chat = chat.clone();
                    async move { chat_response(chat) }
                }),
            );

        spawn_router(router).await
    }
}

fn chat_response(chat: ChatBehavior) -> Response {
    match chat {
        ChatBehavior::Lines(lines) => {
            let body: String = lines.iter().map(|line| format!("{}\n", line)).collect();
            (
                [(header::CONTENT_TYPE, "application/x-ndjson")],
                Body::from(body),
            )
                .into_response()
        }
        ChatBehavior::Fail(status, message) => (status, message).into_response(),
    }
}
