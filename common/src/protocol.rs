//! 通信プロトコル定義
//!
//! ホスト↔ノード、クライアント↔ノード、ホスト↔推論エンジン間のメッセージ

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::net::IpAddr;

use crate::types::ModelSummary;

/// ハンドシェイク送信者の役割
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub enum PeerRole {
    /// 推論エンジンを持つホスト (0)
    Host,
    /// クライアント (1)
    Client,
}

impl TryFrom<u8> for PeerRole {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PeerRole::Host),
            1 => Ok(PeerRole::Client),
            other => Err(format!("unknown peer role identifier: {}", other)),
        }
    }
}

impl From<PeerRole> for u8 {
    fn from(role: PeerRole) -> Self {
        match role {
            PeerRole::Host => 0,
            PeerRole::Client => 1,
        }
    }
}

/// ハンドシェイク（ホストが自身を通知する）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Handshake {
    /// ホストIPアドレス
    pub ip_address: IpAddr,
    /// 役割識別子
    pub identifier: PeerRole,
    /// 表示名
    pub host_name: String,
    /// 送信時刻
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// コールバックポート（数値または数値文字列）
    #[serde(deserialize_with = "deserialize_port")]
    pub host_port: u16,
}

/// ハンドシェイク応答
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandshakeAck {
    /// "received"
    pub status: String,
}

impl HandshakeAck {
    /// 受理応答
    pub fn received() -> Self {
        Self {
            status: "received".to_string(),
        }
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u16),
        Text(String),
    }

    match RawPort::deserialize(deserializer)? {
        RawPort::Number(port) => Ok(port),
        RawPort::Text(text) => text
            .trim()
            .parse::<u16>()
            .map_err(|err| de::Error::custom(format!("invalid port '{}': {}", text, err))),
    }
}

/// チャットメッセージ
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// ロール ("system", "user", "assistant")
    pub role: String,
    /// 内容
    pub content: String,
}

/// チャットリクエスト
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// モデル名
    pub model: String,
    /// 会話履歴（順序保持）
    pub messages: Vec<ChatMessage>,
}

/// ストリーミング出力の1単位
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreamChunk {
    /// ロール
    #[serde(default)]
    pub role: String,
    /// 増分テキスト
    #[serde(default)]
    pub content: String,
    /// 最終チャンクか
    #[serde(default)]
    pub done: bool,
}

/// ノードへのモデルロード要求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadModelRequest {
    /// モデル名
    pub model: String,
}

/// ノードへのモデルアンロード要求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnloadModelRequest {
    /// モデル名
    pub model: String,
    /// 対象ホスト（省略時はスケジューラが選択）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_ip: Option<IpAddr>,
}

/// ホストエージェントへのモデル操作要求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostModelRequest {
    /// モデル名
    pub model_name: String,
}

/// ホストエージェントのロード応答
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostLoadResponse {
    /// メッセージ
    pub message: String,
    /// モデル名
    pub model: String,
    /// 所要時間 (例: "1.532s")
    pub time_taken: String,
}

/// エラーレスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// エラーメッセージ
    pub error: String,
}

/// 推論エンジン `/api/tags` のレスポンス
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineTagsResponse {
    /// モデル一覧
    #[serde(default)]
    pub models: Vec<EngineModel>,
}

/// 推論エンジンが返すモデル情報
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineModel {
    /// モデル名
    pub name: String,
    /// モデル識別子
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// サイズ（バイト）
    #[serde(default)]
    pub size: u64,
    /// ダイジェスト
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// 更新時刻
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
    /// 詳細
    #[serde(default)]
    pub details: EngineModelDetails,
}

/// 推論エンジンのモデル詳細
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineModelDetails {
    /// フォーマット (例: "gguf")
    #[serde(default)]
    pub format: String,
    /// ファミリー
    #[serde(default)]
    pub family: String,
    /// ファミリー一覧
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub families: Option<Vec<String>>,
    /// パラメータサイズ
    #[serde(default)]
    pub parameter_size: String,
    /// 親モデル
    #[serde(default)]
    pub parent_model: String,
    /// 量子化レベル
    #[serde(default)]
    pub quantization_level: String,
}

impl From<EngineModel> for ModelSummary {
    fn from(model: EngineModel) -> Self {
        ModelSummary {
            name: model.name,
            parameter_size: model.details.parameter_size,
            family: model.details.family,
            size: model.size,
        }
    }
}

/// 推論エンジン `/api/chat` のストリーミング1行
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EngineChatLine {
    /// モデル名
    #[serde(default)]
    pub model: String,
    /// 生成時刻
    #[serde(default)]
    pub created_at: String,
    /// メッセージ
    #[serde(default)]
    pub message: Option<ChatMessage>,
    /// 最終行か
    #[serde(default)]
    pub done: bool,
}

impl From<EngineChatLine> for StreamChunk {
    fn from(line: EngineChatLine) -> Self {
        let (role, content) = line
            .message
            .map(|m| (m.role, m.content))
            .unwrap_or_default();
        StreamChunk {
            role,
            content,
            done: line.done,
        }
    }
}
