//! スケジューラ
//!
//! モデル名から、推論を担当するロード済みホスト、またはモデルをロードする
//! 待機中ホストを選ぶ。判断のたびにホストディレクトリを読み直す。

use futures::future::join_all;
use ollama_gate_common::{
    error::{NodeError, NodeResult},
    types::{HostRecord, ModelRecord},
};
use std::net::IpAddr;
use tracing::{debug, warn};

use crate::registry::HostDirectory;

/// スケジューラ
#[derive(Clone)]
pub struct Scheduler {
    directory: HostDirectory,
}

impl Scheduler {
    /// 新しいスケジューラを作成
    pub fn new(directory: HostDirectory) -> Self {
        Self { directory }
    }

    async fn model_record(&self, model: &str) -> NodeResult<ModelRecord> {
        self.directory
            .get_model(model)
            .await?
            .ok_or_else(|| NodeError::ModelNotFound(model.to_string()))
    }

    /// 推論を担当するロード済みホストを選ぶ
    ///
    /// 候補が1台ならそのまま返す。複数台なら全候補のレコードを並行取得し、
    /// 処理中タスク数が最小のホストを返す（同数なら紐付け順で先のもの）。
    /// 取得に失敗した候補・レコードが失効した候補は除外する。
    pub async fn pick_active_host(&self, model: &str) -> NodeResult<HostRecord> {
        let record = self.model_record(model).await?;
        let candidates: Vec<IpAddr> = record.active_hosts().collect();

        match candidates.as_slice() {
            [] => Err(NodeError::NoAvailableHost(model.to_string())),
            [only] => match self.directory.get_host(*only).await? {
                Some(host) => Ok(host),
                None => {
                    warn!(model, host_ip = %only, "Only active host has no live record");
                    Err(NodeError::NoAvailableHost(model.to_string()))
                }
            },
            _ => {
                let lookups = candidates.iter().map(|ip| {
                    let directory = self.directory.clone();
                    let ip = *ip;
                    async move { (ip, directory.get_host(ip).await) }
                });

                let mut best: Option<HostRecord> = None;
                for (ip, result) in join_all(lookups).await {
                    match result {
                        Ok(Some(host)) => {
                            if best
                                .as_ref()
                                .map_or(true, |current| host.task_count < current.task_count)
                            {
                                best = Some(host);
                            }
                        }
                        Ok(None) => {
                            debug!(model, host_ip = %ip, "Skipping active host with expired record");
                        }
                        Err(err) => {
                            warn!(model, host_ip = %ip, error = %err, "Host lookup failed, excluding from selection");
                        }
                    }
                }

                best.ok_or_else(|| NodeError::NoAvailableHost(model.to_string()))
            }
        }
    }

    /// モデルをロードする待機中ホストを選ぶ
    ///
    /// 紐付け順で最初の `active=false` を返す。負荷分散はしない。
    pub async fn pick_inactive_host(&self, model: &str) -> NodeResult<HostRecord> {
        let record = self.model_record(model).await?;

        for association in record.hosts.iter().filter(|a| !a.active) {
            match self.directory.get_host(association.host_ip).await {
                Ok(Some(host)) => return Ok(host),
                Ok(None) => {
                    debug!(model, host_ip = %association.host_ip, "Skipping inactive host with expired record");
                }
                Err(err) => {
                    warn!(model, host_ip = %association.host_ip, error = %err, "Host lookup failed, trying next");
                }
            }
        }

        Err(NodeError::NoInactiveHost(model.to_string()))
    }
}
