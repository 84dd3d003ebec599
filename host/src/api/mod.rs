//! ホストHTTP APIモジュール
//!
//! ノードからの指示を受けて推論エンジンを操作するエンドポイント

pub mod chat;
pub mod models;

use crate::AppState;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ollama_gate_common::{
    error::{CommonError, GatewayError, HostError},
    protocol::ErrorResponse,
};
use serde_json::json;
use tracing::warn;

/// APIルーターを作成
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/load-model", post(models::load_model))
        .route("/fetch-models", get(models::fetch_models))
        .route("/stop-model", post(models::stop_model))
        .route("/chat", post(chat::chat))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub HostError);

impl From<HostError> for AppError {
    fn from(err: HostError) -> Self {
        AppError(err)
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError(err.into())
    }
}

impl From<CommonError> for AppError {
    fn from(err: CommonError) -> Self {
        AppError(err.into())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError(CommonError::Validation(rejection.body_text()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            HostError::ModelNotPresent(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            HostError::Common(CommonError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            HostError::Gateway(GatewayError::Remote { status, body }) => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                body.clone(),
            ),
            HostError::Gateway(_) | HostError::NodeConnection(_) | HostError::Handshake(_) => {
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            HostError::Common(_) | HostError::Discovery(_) | HostError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
        };

        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %message, "Request failed");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
