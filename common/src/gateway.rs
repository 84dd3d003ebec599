//! 推論ゲートウェイクライアント
//!
//! ホストエージェントまたは推論エンジン（Ollama）へのHTTPアダプタ。
//! 通常呼び出しは10秒でタイムアウトし、ストリーミング呼び出しは読み取りタイムアウトなし。

use bytes::Bytes;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use reqwest::{Client, Method};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::protocol::{ChatRequest, EngineChatLine, EngineTagsResponse, StreamChunk};
use crate::types::ModelSummary;

/// 通常リクエストのタイムアウト
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 接続確立のタイムアウト（ストリーミングにも適用）
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 生バイトストリーム。ドロップで接続が閉じる。
pub type ByteStream = Pin<Box<dyn Stream<Item = GatewayResult<Bytes>> + Send>>;

/// チャット出力のストリーム
pub type ChunkStream = Pin<Box<dyn Stream<Item = GatewayResult<StreamChunk>> + Send>>;

/// 呼び出し先の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// ローカル推論エンジン
    Engine,
    /// ホストエージェント
    Host,
}

impl Upstream {
    fn tags_path(self) -> &'static str {
        match self {
            Upstream::Engine => "/api/tags",
            Upstream::Host => "/fetch-models",
        }
    }

    fn load_path(self) -> &'static str {
        match self {
            Upstream::Engine => "/api/generate",
            Upstream::Host => "/load-model",
        }
    }

    fn stop_path(self) -> &'static str {
        match self {
            Upstream::Engine => "/api/stop",
            Upstream::Host => "/stop-model",
        }
    }

    fn chat_path(self) -> &'static str {
        match self {
            Upstream::Engine => "/api/chat",
            Upstream::Host => "/chat",
        }
    }

    fn load_body(self, model: &str) -> Value {
        match self {
            // プロンプトなしのgenerateはモデルをメモリに載せるだけ
            Upstream::Engine => json!({ "model": model, "stream": false }),
            Upstream::Host => json!({ "model_name": model }),
        }
    }

    fn stop_body(self, model: &str) -> Value {
        match self {
            Upstream::Engine => json!({ "model": model }),
            Upstream::Host => json!({ "model_name": model }),
        }
    }

    fn chat_body(self, request: &ChatRequest) -> Value {
        match self {
            Upstream::Engine => json!({
                "model": request.model,
                "messages": request.messages,
                "stream": true,
            }),
            Upstream::Host => json!(request),
        }
    }
}

/// 推論ゲートウェイクライアント
#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    upstream: Upstream,
    http_client: Client,
    streaming_client: Client,
}

impl GatewayClient {
    /// 新しいクライアントを作成
    pub fn new(base_url: impl Into<String>, upstream: Upstream) -> GatewayResult<Self> {
        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        let streaming_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            upstream,
            http_client,
            streaming_client,
        })
    }

    /// 推論エンジン向けクライアント
    pub fn for_engine(engine_url: impl Into<String>) -> GatewayResult<Self> {
        Self::new(engine_url, Upstream::Engine)
    }

    /// ホストエージェント向けクライアント
    pub fn for_host(ip: IpAddr, port: u16) -> GatewayResult<Self> {
        let base_url = match ip {
            IpAddr::V4(v4) => format!("http://{}:{}", v4, port),
            IpAddr::V6(v6) => format!("http://[{}]:{}", v6, port),
        };
        Self::new(base_url, Upstream::Host)
    }

    /// ベースURL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// タイムアウト付きの同期呼び出し
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> GatewayResult<Bytes> {
        let url = self.url(path);
        debug!(%url, %method, "Gateway request");

        let mut builder = self.http_client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("{} request failed: {}", url, e)))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(format!("Failed to read body from {}: {}", url, e)))?;

        if status.is_client_error() || status.is_server_error() {
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes)
    }

    /// 読み取りタイムアウトなしのストリーミング呼び出し
    ///
    /// 返されたストリームを破棄すると接続が閉じる。
    pub async fn streaming_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> GatewayResult<ByteStream> {
        let url = self.url(path);
        debug!(%url, %method, "Gateway streaming request");

        let mut builder = self.streaming_client.request(method, &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("{} request failed: {}", url, e)))?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Box::pin(response.bytes_stream().map_err(|e| {
            GatewayError::Transport(format!("Stream read failed: {}", e))
        })))
    }

    /// モデルをメモリにロードする。応答ボディをそのまま返す。
    pub async fn load_model(&self, model: &str) -> GatewayResult<Bytes> {
        let body = self.upstream.load_body(model);
        self.request(Method::POST, self.upstream.load_path(), Some(&body))
            .await
    }

    /// モデルをアンロードする
    pub async fn stop_model(&self, model: &str) -> GatewayResult<Bytes> {
        let body = self.upstream.stop_body(model);
        self.request(Method::POST, self.upstream.stop_path(), Some(&body))
            .await
    }

    /// モデル一覧の応答ボディをそのまま取得する
    pub async fn fetch_tags(&self) -> GatewayResult<Bytes> {
        self.request(Method::GET, self.upstream.tags_path(), None)
            .await
    }

    /// ローカルのモデル一覧を取得する
    pub async fn fetch_model_list(&self) -> GatewayResult<Vec<ModelSummary>> {
        let bytes = self.fetch_tags().await?;
        let tags: EngineTagsResponse = serde_json::from_slice(&bytes).map_err(|e| {
            GatewayError::MalformedResponse(format!("Failed to parse model list: {}", e))
        })?;

        Ok(tags.models.into_iter().map(ModelSummary::from).collect())
    }

    /// モデルがローカルに存在するか
    pub async fn check_model_status(&self, model: &str) -> GatewayResult<bool> {
        let models = self.fetch_model_list().await?;
        Ok(models.iter().any(|m| m.name == model))
    }

    /// チャットをストリーミングで実行する
    ///
    /// `cancel` が発火すると上流の接続を閉じてストリームを終了する。
    pub async fn chat_stream(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> GatewayResult<ChunkStream> {
        let body = self.upstream.chat_body(request);
        let bytes = self
            .streaming_request(Method::POST, self.upstream.chat_path(), Some(&body))
            .await?;
        Ok(decode_chat_stream(bytes, cancel))
    }

    /// チャットの生バイトストリームを取得する（NDJSONのまま中継する場合）
    pub async fn chat_bytes(&self, request: &ChatRequest) -> GatewayResult<ByteStream> {
        let body = self.upstream.chat_body(request);
        self.streaming_request(Method::POST, self.upstream.chat_path(), Some(&body))
            .await
    }
}

/// 1行として受け付ける最大バイト数
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// NDJSONの行デコーダ
///
/// 行をまたいで届くバイト列をバッファし、解釈できない行と
/// [`MAX_LINE_BYTES`] を超える行は読み飛ばす。
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    /// 改行がないと確認済みのバッファ先頭からのバイト数
    scanned: usize,
    /// 長すぎる行の残りを次の改行まで捨てている
    discarding: bool,
}

impl NdjsonDecoder {
    /// バイト列を追加し、完結した行をチャンクとして返す
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|b| *b == b'\n') {
            let end = from + offset;
            if self.discarding {
                self.discarding = false;
            } else if end - start > MAX_LINE_BYTES {
                warn!(bytes = end - start, "Skipping oversized stream line");
            } else if let Some(chunk) = parse_line(&self.buffer[start..end]) {
                chunks.push(chunk);
            }
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);

        if self.discarding {
            self.buffer.clear();
        } else if self.buffer.len() > MAX_LINE_BYTES {
            warn!(bytes = self.buffer.len(), "Skipping oversized stream line");
            self.buffer.clear();
            self.discarding = true;
        }
        self.scanned = self.buffer.len();
        chunks
    }

    /// 改行で終わらない末尾行を処理する
    pub fn finish(&mut self) -> Option<StreamChunk> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        parse_line(&rest)
    }
}

fn parse_line(line: &[u8]) -> Option<StreamChunk> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<EngineChatLine>(text) {
        Ok(line) => Some(line.into()),
        Err(err) => {
            warn!(error = %err, "Skipping malformed stream line");
            None
        }
    }
}

struct DecodeState {
    body: ByteStream,
    decoder: NdjsonDecoder,
    pending: VecDeque<StreamChunk>,
    finished: bool,
    cancel: CancellationToken,
}

enum Step {
    Cancelled,
    Next(Option<GatewayResult<Bytes>>),
}

/// 生バイトストリームを `StreamChunk` のストリームへ変換する
///
/// `done=true` のチャンク、または上流のクローズで終了する。
/// 接続エラーは1回だけ `Err` として流し、その後終了する。
pub fn decode_chat_stream(body: ByteStream, cancel: CancellationToken) -> ChunkStream {
    let state = DecodeState {
        body,
        decoder: NdjsonDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
        cancel,
    };

    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(chunk) = st.pending.pop_front() {
                if chunk.done {
                    st.finished = true;
                    st.pending.clear();
                }
                return Some((Ok(chunk), st));
            }
            if st.finished {
                return None;
            }

            let step = tokio::select! {
                _ = st.cancel.cancelled() => Step::Cancelled,
                next = st.body.next() => Step::Next(next),
            };

            match step {
                Step::Cancelled => {
                    debug!("Chat stream cancelled, closing upstream connection");
                    return None;
                }
                Step::Next(Some(Ok(bytes))) => {
                    let chunks = st.decoder.push(&bytes);
                    st.pending.extend(chunks);
                }
                Step::Next(Some(Err(err))) => {
                    st.finished = true;
                    return Some((Err(err), st));
                }
                Step::Next(None) => {
                    st.finished = true;
                    if let Some(chunk) = st.decoder.finish() {
                        st.pending.push_back(chunk);
                    }
                }
            }
        }
    }))
}
