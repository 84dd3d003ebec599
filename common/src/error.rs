//! エラー型定義
//!
//! 統一エラー型（thiserror使用）

use std::net::IpAddr;
use thiserror::Error;

/// Common layer error type
#[derive(Debug, Error)]
pub enum CommonError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IP address parse error
    #[error("IP address parse error: {0}")]
    IpAddrParse(#[from] std::net::AddrParseError),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// mDNS advertisement/browse error
    #[error("Advertisement error: {0}")]
    Advertise(String),
}

/// Inference Gateway Client error type
#[derive(Debug, Error)]
pub enum GatewayError {
    /// 接続失敗・タイムアウト
    #[error("Transport error: {0}")]
    Transport(String),

    /// 下流が4xx/5xxを返した
    #[error("Remote returned HTTP {status}: {body}")]
    Remote {
        /// HTTPステータスコード
        status: u16,
        /// レスポンスボディ（そのまま）
        body: String,
    },

    /// レスポンスボディを解釈できない
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Node error type
#[derive(Debug, Error)]
pub enum NodeError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Model not registered
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// No host is actively serving the model
    #[error("No available host is serving model {0}")]
    NoAvailableHost(String),

    /// No idle host holds the model
    #[error("No inactive host can load model {0}")]
    NoInactiveHost(String),

    /// Host could not be reached at the handshake address
    #[error("Host {ip} is unreachable: {reason}")]
    UnreachableHost {
        /// ホストIP
        ip: IpAddr,
        /// 失敗理由
        reason: String,
    },

    /// Registry store error
    #[error("Registry store error: {0}")]
    Store(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Host agent error type
#[derive(Debug, Error)]
pub enum HostError {
    /// Common layer error
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Gateway error
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// Node connection error
    #[error("Failed to reach node: {0}")]
    NodeConnection(String),

    /// Handshake rejected
    #[error("Handshake rejected: {0}")]
    Handshake(String),

    /// Model not present on this host
    #[error("Model not present on this host: {0}")]
    ModelNotPresent(String),

    /// Discovery error
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias (Common)
pub type CommonResult<T> = Result<T, CommonError>;

/// Result type alias (Gateway)
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type alias (Node)
pub type NodeResult<T> = Result<T, NodeError>;

/// Result type alias (Host)
pub type HostResult<T> = Result<T, HostError>;
