//! チャット中継API
//!
//! ロード済みホストを選び、ホストの出力をSSEでクライアントへ流す。

use super::AppError;
use crate::{
    relay::{spawn_relay, RelayHandle, RelayState},
    AppState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use ollama_gate_common::{
    error::{CommonError, GatewayError},
    gateway::GatewayClient,
    protocol::ChatRequest,
};
use std::convert::Infallible;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// POST /chat - チャットをホストへ中継する
///
/// イベントは `message`（出力チャンク）と `error`（上流エラー、最大1回）。
/// クライアントが切断するとホストへの接続も閉じる。
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let Json(request) = payload?;
    if request.model.trim().is_empty() {
        return Err(CommonError::Validation("model must not be empty".into()).into());
    }
    if request.messages.is_empty() {
        return Err(CommonError::Validation("messages must not be empty".into()).into());
    }

    let request_id = Uuid::new_v4();
    let host = state.scheduler.pick_active_host(&request.model).await?;
    let host_ip = host.ip_address;
    state.directory.adjust_task_count(host_ip, 1).await?;

    let cancel = CancellationToken::new();
    let upstream = match GatewayClient::for_host(host_ip, host.port) {
        Ok(client) => client.chat_stream(&request, cancel.child_token()).await,
        Err(err) => Err(err),
    };
    let upstream = match upstream {
        Ok(upstream) => upstream,
        Err(err) => {
            release_task(&state, host_ip).await;
            if matches!(err, GatewayError::Transport(_)) {
                // 応答しないホストは次のロードまで候補から外す
                if let Err(mark_err) = state
                    .directory
                    .upsert_hosting_association(&request.model, host_ip, false)
                    .await
                {
                    warn!(host_ip = %host_ip, error = %mark_err, "Failed to deactivate unreachable host");
                }
            }
            return Err(err.into());
        }
    };

    info!(%request_id, model = %request.model, host_ip = %host_ip, "Chat relay started");
    let RelayHandle { events, outcome } = spawn_relay(upstream, cancel.clone());

    let watcher_state = state.clone();
    let model = request.model.clone();
    tokio::spawn(async move {
        let final_state = outcome.await.unwrap_or(RelayState::Cancelled);
        release_task(&watcher_state, host_ip).await;
        info!(%request_id, model = %model, host_ip = %host_ip, state = ?final_state, "Chat relay finished");
    });

    // レスポンスボディが破棄されたらリレーを止める
    let guard = cancel.drop_guard();
    let stream = ReceiverStream::new(events).map(move |event| {
        let _guard = &guard;
        Ok::<_, Infallible>(event.into_sse())
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn release_task(state: &AppState, host_ip: std::net::IpAddr) {
    if let Err(err) = state.directory.adjust_task_count(host_ip, -1).await {
        warn!(host_ip = %host_ip, error = %err, "Failed to release task count");
    }
}
