//! レジストリストア
//!
//! TTL付きキーバリューストアの抽象化。モデルレジストリは単一キー、
//! ホストレコードはIPごとのキーに保存する。

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use async_trait::async_trait;
use ollama_gate_common::error::NodeResult;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// モデルレジストリ全体を保持するキー
pub const MODELS_KEY: &str = "llm_models";

/// ホストレコードのキー接頭辞
pub const HOST_KEY_PREFIX: &str = "llm_host:";

/// レコードの既定TTL（24時間）
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// 設定で指定できるTTLの上限（365日）
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// ホストレコードのキー
pub fn host_key(ip: IpAddr) -> String {
    format!("{}{}", HOST_KEY_PREFIX, ip)
}

/// TTL対応のキーバリューストア
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// 値を取得する。存在しない・失効済みなら`None`
    async fn get(&self, key: &str) -> NodeResult<Option<String>>;

    /// 値を書き込み、TTLをリセットする
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> NodeResult<()>;

    /// 値を削除する
    async fn delete(&self, key: &str) -> NodeResult<()>;

    /// 接頭辞に一致する生存中のキー一覧
    async fn keys(&self, prefix: &str) -> NodeResult<Vec<String>>;
}

/// 共有ストアハンドル
pub type SharedStore = Arc<dyn RegistryStore>;
