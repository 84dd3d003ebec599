//! ノード通信クライアント
//!
//! ハンドシェイク送信、登録リトライ、定期的な再送

use chrono::Utc;
use ollama_gate_common::{
    error::{HostError, HostResult},
    gateway::REQUEST_TIMEOUT,
    protocol::{Handshake, HandshakeAck, PeerRole},
};
use std::net::IpAddr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// ハンドシェイクに載せるホスト自身の情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostIdentity {
    /// ノードから到達できるアドレス
    pub ip_address: IpAddr,
    /// マシン名
    pub host_name: String,
    /// ホストエージェントのポート
    pub host_port: u16,
}

impl HostIdentity {
    /// 現在時刻でハンドシェイクを組み立てる
    pub fn handshake(&self) -> Handshake {
        Handshake {
            ip_address: self.ip_address,
            identifier: PeerRole::Host,
            host_name: self.host_name.clone(),
            timestamp: Utc::now(),
            host_port: self.host_port,
        }
    }
}

/// ノードクライアント
#[derive(Clone)]
pub struct NodeClient {
    node_url: String,
    http_client: reqwest::Client,
}

impl NodeClient {
    /// 新しいノードクライアントを作成
    pub fn new(node_url: impl Into<String>) -> HostResult<Self> {
        Self::with_timeout(node_url, REQUEST_TIMEOUT)
    }

    /// タイムアウトを指定して作成（探索用）
    pub fn with_timeout(node_url: impl Into<String>, timeout: Duration) -> HostResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HostError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            node_url: node_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    /// 利用中のノードURL
    pub fn node_url(&self) -> &str {
        &self.node_url
    }

    /// ハンドシェイクを1回送る
    pub async fn send_handshake(&self, handshake: &Handshake) -> HostResult<HandshakeAck> {
        let url = format!("{}/ping", self.node_url);

        let response = self
            .http_client
            .post(&url)
            .json(handshake)
            .send()
            .await
            .map_err(|e| HostError::NodeConnection(format!("{}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HostError::Handshake(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<HandshakeAck>()
            .await
            .map_err(|e| HostError::Handshake(format!("Failed to parse acknowledgement: {}", e)))
    }

    /// 受理されるまで固定間隔でハンドシェイクを再送する
    ///
    /// キャンセルされた場合は `None`。
    pub async fn register_with_retry(
        &self,
        identity: &HostIdentity,
        retry_interval: Duration,
        cancel: &CancellationToken,
    ) -> Option<HandshakeAck> {
        let mut attempt = 1u32;
        loop {
            match self.send_handshake(&identity.handshake()).await {
                Ok(ack) => {
                    info!(node_url = %self.node_url, attempt, "Registered with node");
                    return Some(ack);
                }
                Err(err) => {
                    warn!(
                        node_url = %self.node_url,
                        attempt,
                        error = %err,
                        "Handshake failed, retrying in {:?}",
                        retry_interval
                    );
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = tokio::time::sleep(retry_interval) => {}
            }
            attempt = attempt.saturating_add(1);
        }
    }

    /// 登録後、ハンドシェイクを定期的に送り続ける
    ///
    /// 失敗したら登録リトライに戻る。キャンセルされるまで終わらない。
    pub async fn maintain_registration(
        &self,
        identity: HostIdentity,
        heartbeat_interval: Duration,
        retry_interval: Duration,
        cancel: CancellationToken,
    ) {
        if self
            .register_with_retry(&identity, retry_interval, &cancel)
            .await
            .is_none()
        {
            return;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(heartbeat_interval) => {}
            }

            match self.send_handshake(&identity.handshake()).await {
                Ok(_) => debug!(node_url = %self.node_url, "Heartbeat handshake accepted"),
                Err(err) => {
                    warn!(node_url = %self.node_url, error = %err, "Heartbeat failed, re-registering");
                    if self
                        .register_with_retry(&identity, retry_interval, &cancel)
                        .await
                        .is_none()
                    {
                        return;
                    }
                }
            }
        }
    }
}
