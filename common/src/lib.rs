//! ollama-gate Common Library
//!
//! ノードとホストエージェントが共有する型定義、プロトコル、設定、エラー型、
//! 推論ゲートウェイクライアントを提供

#![warn(missing_docs)]

/// 共通型定義
pub mod types;

/// 通信プロトコル定義
pub mod protocol;

/// 設定管理
pub mod config;

/// エラー型定義
pub mod error;

/// 推論ゲートウェイクライアント
pub mod gateway;

/// mDNSによるサービス広告
pub mod advertise;

/// ネットワークユーティリティ
pub mod net;

/// ロギング初期化ユーティリティ
pub mod logging;
