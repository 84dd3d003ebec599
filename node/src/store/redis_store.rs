use async_trait::async_trait;
use ollama_gate_common::error::{NodeError, NodeResult};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::info;

use super::RegistryStore;

/// Redisバックエンドのストア
///
/// `ConnectionManager` は切断時に自動で再接続する。
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Redisへ接続する（例: `redis://127.0.0.1:6379`）
    pub async fn connect(url: &str) -> NodeResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| NodeError::Store(format!("Invalid Redis URL: {}", e)))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| NodeError::Store(format!("Failed to connect to Redis: {}", e)))?;

        info!("Connected to Redis registry store");
        Ok(Self { conn })
    }
}

fn store_error(op: &str, key: &str, err: redis::RedisError) -> NodeError {
    NodeError::Store(format!("Redis {} '{}' failed: {}", op, key, err))
}

#[async_trait]
impl RegistryStore for RedisStore {
    async fn get(&self, key: &str) -> NodeResult<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get::<_, Option<String>>(key)
            .await
            .map_err(|e| store_error("GET", key, e))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> NodeResult<()> {
        let mut conn = self.conn.clone();
        // SET EX は0秒を受け付けない
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .map_err(|e| store_error("SET", key, e))
    }

    async fn delete(&self, key: &str) -> NodeResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| store_error("DEL", key, e))
    }

    async fn keys(&self, prefix: &str) -> NodeResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", prefix);
        let mut keys = conn
            .keys::<_, Vec<String>>(&pattern)
            .await
            .map_err(|e| store_error("KEYS", &pattern, e))?;
        keys.sort();
        Ok(keys)
    }
}
