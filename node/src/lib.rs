//! Ollama Gate Node
//!
//! ホストの登録を受け付け、モデルごとに推論先ホストを選び、
//! チャット出力をクライアントへ中継する調整ノード

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// 設定管理（環境変数）
pub mod config;

/// ホストからのハンドシェイク処理とmDNS広告
pub mod discovery;

/// ホストディレクトリ（ホスト・モデルレジストリ）
pub mod registry;

/// ストリーミングリレー
pub mod relay;

/// ホスト選択
pub mod scheduler;

/// レジストリの永続化（Redis / インメモリ）
pub mod store;

use std::time::Duration;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// ホストディレクトリ
    pub directory: registry::HostDirectory,
    /// スケジューラ
    pub scheduler: scheduler::Scheduler,
}

impl AppState {
    /// ストアからアプリケーション状態を組み立てる
    pub fn new(store: store::SharedStore, ttl: Duration) -> Self {
        let directory = registry::HostDirectory::new(store, ttl);
        let scheduler = scheduler::Scheduler::new(directory.clone());
        Self {
            directory,
            scheduler,
        }
    }
}
