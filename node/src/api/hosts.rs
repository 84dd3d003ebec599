//! ホスト一覧API

use super::AppError;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use ollama_gate_common::{error::CommonError, types::HostRecord};
use std::net::IpAddr;
use tracing::info;

/// GET /hosts - 登録済みホスト一覧
pub async fn list_hosts(State(state): State<AppState>) -> Result<Json<Vec<HostRecord>>, AppError> {
    Ok(Json(state.directory.list_hosts().await?))
}

/// DELETE /hosts/:ip - ホストレコードを削除する
///
/// モデルとの紐付けは残すが、レコードがないためスケジューラからは選ばれない。
pub async fn delete_host(
    State(state): State<AppState>,
    Path(ip): Path<String>,
) -> Result<StatusCode, AppError> {
    let ip: IpAddr = ip
        .parse()
        .map_err(|_| CommonError::Validation(format!("Invalid host address: {}", ip)))?;
    state.directory.remove_host(ip).await?;
    info!(host_ip = %ip, "Host removed");
    Ok(StatusCode::NO_CONTENT)
}
