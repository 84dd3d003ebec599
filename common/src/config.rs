//! 設定管理
//!
//! NodeConfig, HostConfig等の設定構造体と環境変数ヘルパー

use serde::{Deserialize, Serialize};

/// ノード設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// バインドアドレス (デフォルト: "0.0.0.0")
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// ポート番号 (デフォルト: 8080)
    #[serde(default = "default_node_port")]
    pub port: u16,

    /// RedisのURL（未設定ならインメモリストア）
    #[serde(default)]
    pub redis_url: Option<String>,

    /// レジストリレコードのTTL（秒）(デフォルト: 86400)
    #[serde(default = "default_registry_ttl")]
    pub registry_ttl_secs: u64,

    /// mDNSでノードを広告するか (デフォルト: true)
    #[serde(default = "default_true")]
    pub advertise: bool,
}

/// ホストエージェント設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// バインドアドレス (デフォルト: "0.0.0.0")
    #[serde(default = "default_bind_host")]
    pub host: String,

    /// ホストエージェントのポート (デフォルト: 9090)
    #[serde(default = "default_host_port")]
    pub port: u16,

    /// 推論エンジンのURL (デフォルト: "http://127.0.0.1:11434")
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// ノードのURL（未設定ならLAN探索）
    #[serde(default)]
    pub node_url: Option<String>,

    /// 探索時に叩くノードのポート (デフォルト: 8080)
    #[serde(default = "default_node_port")]
    pub node_port: u16,

    /// 探索の同時実行数 (デフォルト: 32)
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,

    /// ハンドシェイク再送間隔（秒）(デフォルト: 60)
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// 登録リトライ間隔（秒）(デフォルト: 10)
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// mDNSでホストを広告するか (デフォルト: true)
    #[serde(default = "default_true")]
    pub advertise: bool,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_node_port() -> u16 {
    8080
}

fn default_host_port() -> u16 {
    9090
}

fn default_registry_ttl() -> u64 {
    24 * 60 * 60
}

fn default_engine_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_probe_concurrency() -> usize {
    32
}

fn default_heartbeat_interval() -> u64 {
    60
}

fn default_retry_interval() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_node_port(),
            redis_url: None,
            registry_ttl_secs: default_registry_ttl(),
            advertise: default_true(),
        }
    }
}

impl NodeConfig {
    /// バインドアドレス文字列
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            port: default_host_port(),
            engine_url: default_engine_url(),
            node_url: None,
            node_port: default_node_port(),
            probe_concurrency: default_probe_concurrency(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            retry_interval_secs: default_retry_interval(),
            advertise: default_true(),
        }
    }
}

impl HostConfig {
    /// バインドアドレス文字列
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Get an environment variable with fallback to a deprecated name
///
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        tracing::warn!(
            "Environment variable '{}' is deprecated, use '{}' instead",
            old_name,
            new_name
        );
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Falls back to `default` when neither is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    get_env_with_fallback(new_name, old_name)
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse a boolean flag ("1", "true", "yes", "on" are truthy)
pub fn get_env_flag(new_name: &str, old_name: &str, default: bool) -> bool {
    match get_env_with_fallback(new_name, old_name) {
        Some(val) => matches!(
            val.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
        None => default,
    }
}
