//! ストリーミングリレー
//!
//! ホストからのチャット出力をクライアント向けイベントへ中継する。
//! 状態遷移は `Streaming → Done | Errored | Cancelled` の一方向のみ。
//! チャネル容量は1で、同時に保持するチャンクは1つだけ。

use axum::response::sse::Event;
use futures::StreamExt;
use ollama_gate_common::{gateway::ChunkStream, protocol::StreamChunk};
use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// リレーの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// 中継中
    Streaming,
    /// `done` を受信して正常終了
    Done,
    /// 上流の接続エラーで終了
    Errored,
    /// クライアント切断で終了
    Cancelled,
}

impl RelayState {
    /// 終端状態か
    pub fn is_terminal(self) -> bool {
        !matches!(self, RelayState::Streaming)
    }
}

/// クライアントへ送るイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// 出力チャンク
    Message(StreamChunk),
    /// 上流エラー
    Error(String),
}

impl RelayEvent {
    /// SSEイベントへ変換する
    ///
    /// データはJSON1行にエンコードし、改行を含む出力もそのまま運ぶ。
    pub fn into_sse(self) -> Event {
        match self {
            RelayEvent::Message(chunk) => Event::default()
                .event("message")
                .data(serde_json::to_string(&chunk).unwrap_or_default()),
            RelayEvent::Error(message) => Event::default()
                .event("error")
                .data(json!({ "error": message }).to_string()),
        }
    }
}

/// 起動済みリレーのハンドル
pub struct RelayHandle {
    /// クライアント向けイベント
    pub events: mpsc::Receiver<RelayEvent>,
    /// 終了時の状態
    pub outcome: JoinHandle<RelayState>,
}

/// リレーを起動する
///
/// `cancel` はクライアント切断時に発火させる。上流の `ChunkStream` にも
/// 同じトークン（または子トークン）を渡しておけばホストへの接続も閉じる。
pub fn spawn_relay(upstream: ChunkStream, cancel: CancellationToken) -> RelayHandle {
    let (tx, events) = mpsc::channel(1);
    let outcome = tokio::spawn(run_relay(upstream, tx, cancel));
    RelayHandle { events, outcome }
}

async fn run_relay(
    mut upstream: ChunkStream,
    tx: mpsc::Sender<RelayEvent>,
    cancel: CancellationToken,
) -> RelayState {
    let mut state = RelayState::Streaming;

    while !state.is_terminal() {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                state = RelayState::Cancelled;
                continue;
            }
            next = upstream.next() => next,
        };

        state = match next {
            // done を受け取らずに上流が閉じた
            None => RelayState::Done,
            Some(Err(err)) => {
                debug!(error = %err, "Upstream chat stream failed");
                if forward(&tx, &cancel, RelayEvent::Error(err.to_string())).await {
                    RelayState::Errored
                } else {
                    RelayState::Cancelled
                }
            }
            Some(Ok(chunk)) => {
                let done = chunk.done;
                if !chunk.content.is_empty()
                    && !forward(&tx, &cancel, RelayEvent::Message(chunk)).await
                {
                    RelayState::Cancelled
                } else if done {
                    RelayState::Done
                } else {
                    RelayState::Streaming
                }
            }
        };
    }

    state
}

/// 1イベント送る。クライアントが去っていれば `false`
async fn forward(
    tx: &mpsc::Sender<RelayEvent>,
    cancel: &CancellationToken,
    event: RelayEvent,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(event) => sent.is_ok(),
    }
}
