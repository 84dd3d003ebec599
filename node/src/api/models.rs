//! モデル管理API
//!
//! 一覧取得、ホストへのロード・アンロード

use super::AppError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use ollama_gate_common::{
    error::{CommonError, NodeError},
    gateway::GatewayClient,
    protocol::{LoadModelRequest, UnloadModelRequest},
    types::ModelRecord,
};
use tracing::info;

/// GET /models - モデルレジストリ一覧
pub async fn list_models(State(state): State<AppState>) -> Result<Json<Vec<ModelRecord>>, AppError> {
    Ok(Json(state.directory.list_models().await?))
}

fn require_model_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        return Err(CommonError::Validation("model must not be empty".into()).into());
    }
    Ok(())
}

fn json_passthrough(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

/// POST /load-model - 待機中ホストにモデルをロードする
///
/// ロード成功後に紐付けを `active=true` にし、ホストの応答をそのまま返す。
pub async fn load_model(
    State(state): State<AppState>,
    payload: Result<Json<LoadModelRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    require_model_name(&request.model)?;

    let host = state.scheduler.pick_inactive_host(&request.model).await?;
    let client = GatewayClient::for_host(host.ip_address, host.port)?;
    let body = client.load_model(&request.model).await?;

    state
        .directory
        .upsert_hosting_association(&request.model, host.ip_address, true)
        .await?;
    info!(model = %request.model, host_ip = %host.ip_address, "Model loaded on host");

    Ok(json_passthrough(body))
}

/// POST /unload-model - ホストからモデルをアンロードする
///
/// `host_ip` 省略時はロード済みホストからスケジューラが選ぶ。
/// 指定時はそのモデルの紐付けを持つホストでなければ400。
pub async fn unload_model(
    State(state): State<AppState>,
    payload: Result<Json<UnloadModelRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    require_model_name(&request.model)?;

    let host = match request.host_ip {
        Some(ip) => {
            let record = state
                .directory
                .get_model(&request.model)
                .await?
                .ok_or_else(|| NodeError::ModelNotFound(request.model.clone()))?;
            if record.association(ip).is_none() {
                return Err(CommonError::Validation(format!(
                    "Host {} does not host model {}",
                    ip, request.model
                ))
                .into());
            }
            state.directory.get_host(ip).await?.ok_or_else(|| {
                CommonError::Validation(format!("Host {} is not registered", ip))
            })?
        }
        None => state.scheduler.pick_active_host(&request.model).await?,
    };
    let client = GatewayClient::for_host(host.ip_address, host.port)?;
    let body = client.stop_model(&request.model).await?;

    state
        .directory
        .upsert_hosting_association(&request.model, host.ip_address, false)
        .await?;
    info!(model = %request.model, host_ip = %host.ip_address, "Model unloaded from host");

    Ok(json_passthrough(body))
}
