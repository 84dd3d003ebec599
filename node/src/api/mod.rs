//! REST APIハンドラー
//!
//! ハンドシェイク受信、モデル一覧・ロード、チャット中継

pub mod chat;
pub mod hosts;
pub mod models;
pub mod ping;

use crate::AppState;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use ollama_gate_common::{
    error::{CommonError, GatewayError, NodeError},
    protocol::ErrorResponse,
};
use serde_json::json;
use tracing::warn;

/// APIルーターを作成
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/ping", post(ping::handshake))
        .route("/models", get(models::list_models))
        .route("/load-model", post(models::load_model))
        .route("/unload-model", post(models::unload_model))
        .route("/chat", post(chat::chat))
        .route("/hosts", get(hosts::list_hosts))
        .route("/hosts/:ip", delete(hosts::delete_host))
        .route("/health", get(health))
        .with_state(state)
}

/// GET /health - 死活確認
async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Axum用のエラーレスポンス型
#[derive(Debug)]
pub struct AppError(pub NodeError);

impl From<NodeError> for AppError {
    fn from(err: NodeError) -> Self {
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
            NodeError::ModelNotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            NodeError::NoAvailableHost(_) => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            NodeError::NoInactiveHost(_) => (StatusCode::CONFLICT, self.0.to_string()),
            NodeError::Common(CommonError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            NodeError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string()),
            // 下流のエラーはステータスとボディをそのまま返す
            NodeError::Gateway(GatewayError::Remote { status, body }) => (
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
                body.clone(),
            ),
            NodeError::Gateway(_) | NodeError::UnreachableHost { .. } => {
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            NodeError::Store(_) | NodeError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.0.to_string())
            }
        };

        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %message, "Request failed");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
