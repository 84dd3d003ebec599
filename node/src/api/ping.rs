//! ハンドシェイク受信API

use super::AppError;
use crate::{discovery, AppState};
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use ollama_gate_common::protocol::{Handshake, HandshakeAck};

/// POST /ping - ホストからのハンドシェイク
///
/// ホストのモデル一覧を取得してからレジストリを更新し、受領を返す。
pub async fn handshake(
    State(state): State<AppState>,
    payload: Result<Json<Handshake>, JsonRejection>,
) -> Result<Json<HandshakeAck>, AppError> {
    let Json(handshake) = payload?;
    discovery::observe_host(&state.directory, &handshake).await?;
    Ok(Json(HandshakeAck::received()))
}
