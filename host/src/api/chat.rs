//! チャット中継APIハンドラー

use super::AppError;
use crate::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use ollama_gate_common::{error::CommonError, protocol::ChatRequest};
use tracing::info;

/// POST /chat - エンジンのNDJSON出力をそのまま流す
///
/// クライアントが切断するとボディが破棄され、エンジンへの接続も閉じる。
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    if request.messages.is_empty() {
        return Err(CommonError::Validation("messages must not be empty".into()).into());
    }

    let stream = state.engine.chat_bytes(&request).await?;
    info!(model = %request.model, messages = request.messages.len(), "Streaming chat from engine");

    Ok((
        [
            (header::CONTENT_TYPE, "application/x-ndjson"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
