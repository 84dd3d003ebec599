//! Ollama Gate Host
//!
//! 推論エンジンの隣で動き、エンジンをHTTPで公開してノードに自身を通知する
//! ホストエージェント

#![warn(missing_docs)]

/// HTTP APIエンドポイント（モデル操作・チャット）
pub mod api;

/// ノード通信クライアント（登録・再送）
pub mod client;

/// 設定管理（環境変数）
pub mod config;

/// LAN上のノード探索
pub mod discovery;

use ollama_gate_common::gateway::GatewayClient;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// 推論エンジンクライアント
    pub engine: GatewayClient,
}

impl AppState {
    /// エンジンクライアントから状態を作る
    pub fn new(engine: GatewayClient) -> Self {
        Self { engine }
    }
}
