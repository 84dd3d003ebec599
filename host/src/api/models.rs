//! モデル操作APIハンドラー
//!
//! ロード・一覧・停止を推論エンジンへ中継する

use super::AppError;
use crate::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use ollama_gate_common::{
    error::{CommonError, HostError},
    protocol::{HostLoadResponse, HostModelRequest},
};
use std::time::Instant;
use tracing::info;

fn model_name(payload: Result<Json<HostModelRequest>, JsonRejection>) -> Result<String, AppError> {
    let Json(request) = payload?;
    if request.model_name.trim().is_empty() {
        return Err(CommonError::Validation("model_name must not be empty".into()).into());
    }
    Ok(request.model_name)
}

/// POST /load-model - モデルをメモリにロードする
///
/// ローカルに存在しないモデルは404を返す。
pub async fn load_model(
    State(state): State<AppState>,
    payload: Result<Json<HostModelRequest>, JsonRejection>,
) -> Result<Json<HostLoadResponse>, AppError> {
    let model = model_name(payload)?;
    let start = Instant::now();
    info!(model = %model, "Received request to load model");

    if !state.engine.check_model_status(&model).await? {
        return Err(HostError::ModelNotPresent(model).into());
    }
    state.engine.load_model(&model).await?;

    let elapsed = start.elapsed();
    info!(model = %model, elapsed = ?elapsed, "Model loaded");
    Ok(Json(HostLoadResponse {
        message: "Model loaded successfully".to_string(),
        model,
        time_taken: format!("{:?}", elapsed),
    }))
}

/// GET /fetch-models - エンジンのモデル一覧をそのまま返す
pub async fn fetch_models(State(state): State<AppState>) -> Result<Response, AppError> {
    let body = state.engine.fetch_tags().await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// POST /stop-model - モデルをアンロードする
pub async fn stop_model(
    State(state): State<AppState>,
    payload: Result<Json<HostModelRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let model = model_name(payload)?;
    let body = state.engine.stop_model(&model).await?;
    info!(model = %model, "Model stopped");

    let body = if body.is_empty() {
        serde_json::json!({ "model": model, "done": true })
            .to_string()
            .into()
    } else {
        body
    };
    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}
