//! ホストディレクトリ
//!
//! レジストリストア上の「モデル → ホスティング一覧」「ホストIP → ホストレコード」を扱う。
//! プロセス内にキャッシュは持たず、呼び出しごとにストアを読み直す。

use chrono::Utc;
use ollama_gate_common::{
    error::{CommonError, NodeError, NodeResult},
    types::{HostRecord, ModelRecord, ModelSummary},
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::{host_key, SharedStore, DEFAULT_TTL, HOST_KEY_PREFIX, MAX_TTL, MODELS_KEY};

/// ホストディレクトリ
///
/// モデルレジストリは単一キーの読み込み→変更→書き戻しで更新する。
/// 同一プロセス内の書き込みはロックで直列化するが、複数ノード間では後勝ちになる。
#[derive(Clone)]
pub struct HostDirectory {
    store: SharedStore,
    ttl: Duration,
    models_lock: Arc<Mutex<()>>,
    hosts_lock: Arc<Mutex<()>>,
}

impl HostDirectory {
    /// 新しいディレクトリを作成。TTLは [`MAX_TTL`] で頭打ちにする
    pub fn new(store: SharedStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl: ttl.min(MAX_TTL),
            models_lock: Arc::new(Mutex::new(())),
            hosts_lock: Arc::new(Mutex::new(())),
        }
    }

    /// 既定TTL（24時間）で作成
    pub fn with_default_ttl(store: SharedStore) -> Self {
        Self::new(store, DEFAULT_TTL)
    }

    /// ホストレコードを上書きする（TTLはリセットされる）
    pub async fn upsert_host(&self, record: &HostRecord) -> NodeResult<()> {
        let _guard = self.hosts_lock.lock().await;
        self.write_host(record).await
    }

    async fn write_host(&self, record: &HostRecord) -> NodeResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| NodeError::Store(format!("Failed to encode host record: {}", e)))?;
        self.store
            .set_with_ttl(&host_key(record.ip_address), &json, self.ttl)
            .await
    }

    /// ハンドシェイクで得たホストレコードを書き込む
    ///
    /// 既存レコードがあれば処理中タスク数を引き継ぐ。
    pub async fn refresh_host(&self, mut record: HostRecord) -> NodeResult<HostRecord> {
        let _guard = self.hosts_lock.lock().await;
        if let Some(previous) = self.get_host(record.ip_address).await? {
            record.task_count = previous.task_count;
        }
        self.write_host(&record).await?;
        Ok(record)
    }

    /// ホストレコードを取得する
    pub async fn get_host(&self, ip: IpAddr) -> NodeResult<Option<HostRecord>> {
        let Some(raw) = self.store.get(&host_key(ip)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| NodeError::Store(format!("Corrupt host record for {}: {}", ip, e)))
    }

    /// ホストレコードを削除する
    pub async fn remove_host(&self, ip: IpAddr) -> NodeResult<()> {
        let _guard = self.hosts_lock.lock().await;
        self.store.delete(&host_key(ip)).await?;
        info!(host_ip = %ip, "Removed host record");
        Ok(())
    }

    /// 生存中のホストレコード一覧
    pub async fn list_hosts(&self) -> NodeResult<Vec<HostRecord>> {
        let keys = self.store.keys(HOST_KEY_PREFIX).await?;
        let mut hosts = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(ip) = key
                .strip_prefix(HOST_KEY_PREFIX)
                .and_then(|s| s.parse::<IpAddr>().ok())
            else {
                warn!(%key, "Skipping host key with unparseable address");
                continue;
            };
            match self.get_host(ip).await {
                Ok(Some(host)) => hosts.push(host),
                // 一覧取得とGETの間に失効した
                Ok(None) => {}
                Err(err) => warn!(host_ip = %ip, error = %err, "Skipping unreadable host record"),
            }
        }
        Ok(hosts)
    }

    /// 処理中タスク数を増減する。ホストが存在しなければ`None`
    pub async fn adjust_task_count(&self, ip: IpAddr, delta: i32) -> NodeResult<Option<u32>> {
        let _guard = self.hosts_lock.lock().await;
        let Some(mut host) = self.get_host(ip).await? else {
            return Ok(None);
        };
        host.task_count = host.task_count.saturating_add_signed(delta);
        self.write_host(&host).await?;
        debug!(host_ip = %ip, task_count = host.task_count, "Adjusted task count");
        Ok(Some(host.task_count))
    }

    /// モデルレコード一覧。キーが存在しなければ空
    pub async fn list_models(&self) -> NodeResult<Vec<ModelRecord>> {
        let Some(raw) = self.store.get(MODELS_KEY).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw)
            .map_err(|e| NodeError::Store(format!("Corrupt model registry: {}", e)))
    }

    /// モデルレコードを名前で取得する
    pub async fn get_model(&self, name: &str) -> NodeResult<Option<ModelRecord>> {
        Ok(self
            .list_models()
            .await?
            .into_iter()
            .find(|m| m.name == name))
    }

    async fn write_models(&self, models: &[ModelRecord]) -> NodeResult<()> {
        let json = serde_json::to_string(models)
            .map_err(|e| NodeError::Store(format!("Failed to encode model registry: {}", e)))?;
        self.store.set_with_ttl(MODELS_KEY, &json, self.ttl).await
    }

    /// モデルレコードを追加または置換する
    pub async fn upsert_model(&self, record: ModelRecord) -> NodeResult<()> {
        let _guard = self.models_lock.lock().await;
        let mut models = self.list_models().await?;
        match models.iter_mut().find(|m| m.name == record.name) {
            Some(existing) => *existing = record,
            None => models.push(record),
        }
        self.write_models(&models).await
    }

    /// ホスティング状態を設定する
    ///
    /// 既存の紐付けはその場で更新する。紐付けがなければ、ホストレコードが
    /// そのモデルを広告している場合に限り末尾に追加する。
    pub async fn upsert_hosting_association(
        &self,
        model: &str,
        host_ip: IpAddr,
        active: bool,
    ) -> NodeResult<()> {
        let _guard = self.models_lock.lock().await;
        let mut models = self.list_models().await?;
        let record = models
            .iter_mut()
            .find(|m| m.name == model)
            .ok_or_else(|| NodeError::ModelNotFound(model.to_string()))?;
        if record.association(host_ip).is_none() {
            let advertised = self
                .get_host(host_ip)
                .await?
                .is_some_and(|host| host.advertises(model));
            if !advertised {
                return Err(CommonError::Validation(format!(
                    "Host {} does not advertise model {}",
                    host_ip, model
                ))
                .into());
            }
        }
        record.set_association(host_ip, active);
        self.write_models(&models).await?;

        info!(model, host_ip = %host_ip, active, "Updated hosting association");
        Ok(())
    }

    /// ホストが広告したモデル一覧をレジストリに反映する
    ///
    /// 初見の紐付けは `active=false` で追加し、既存の紐付けの状態は変更しない。
    /// 変更がなくても書き戻し、レジストリのTTLを延ばす。
    /// 追加した紐付けの数を返す。
    pub async fn register_host_models(
        &self,
        host_ip: IpAddr,
        summaries: &[ModelSummary],
    ) -> NodeResult<usize> {
        let _guard = self.models_lock.lock().await;
        let mut models = self.list_models().await?;
        let mut added = 0;
        for summary in summaries {
            let index = match models.iter().position(|m| m.name == summary.name) {
                Some(index) => index,
                None => {
                    models.push(ModelRecord::from_summary(summary));
                    models.len() - 1
                }
            };
            if models[index].ensure_association(host_ip, false) {
                added += 1;
            }
        }

        self.write_models(&models).await?;
        Ok(added)
    }

    /// モデルレコードを削除する。削除した場合は`true`
    pub async fn remove_model(&self, name: &str) -> NodeResult<bool> {
        let _guard = self.models_lock.lock().await;
        let mut models = self.list_models().await?;
        let before = models.len();
        models.retain(|m| m.name != name);
        if models.len() == before {
            return Ok(false);
        }
        self.write_models(&models).await?;
        info!(model = name, "Removed model record");
        Ok(true)
    }
}

/// ハンドシェイク時刻で新しいホストレコードを組み立てる
pub fn new_host_record(
    ip_address: IpAddr,
    port: u16,
    host_name: String,
    models: Vec<ModelSummary>,
) -> HostRecord {
    HostRecord {
        ip_address,
        port,
        host_name,
        last_seen: Utc::now(),
        task_count: 0,
        models,
    }
}
