//! 共通型定義
//!
//! ホスト・モデルのレジストリレコード

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// ホストがローカルに保持しているモデルの概要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelSummary {
    /// モデル名 (例: "llama3:8b")
    pub name: String,
    /// パラメータサイズ (例: "8.0B")
    #[serde(default)]
    pub parameter_size: String,
    /// モデルファミリー (例: "llama")
    #[serde(default)]
    pub family: String,
    /// モデルファイルのサイズ（バイト）
    #[serde(default)]
    pub size: u64,
}

/// ホストレコード
///
/// ハンドシェイク成功のたびに作成・更新され、TTLで失効する。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostRecord {
    /// IPアドレス（レジストリのキー）
    pub ip_address: IpAddr,
    /// ホストエージェントのポート
    pub port: u16,
    /// ホスト名
    pub host_name: String,
    /// 最終確認時刻
    pub last_seen: DateTime<Utc>,
    /// 処理中のタスク数
    #[serde(default)]
    pub task_count: u32,
    /// 保持モデル一覧
    #[serde(default)]
    pub models: Vec<ModelSummary>,
}

impl HostRecord {
    /// 指定モデルを広告済みか
    pub fn advertises(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.name == model)
    }
}

/// モデルとホストの紐付け
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostingAssociation {
    /// ホストIP
    pub host_ip: IpAddr,
    /// ロード済みで推論可能か
    pub active: bool,
}

/// モデルレコード
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelRecord {
    /// モデル名（一意キー）
    pub name: String,
    /// 最初に広告したホストが報告したファミリー
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub family: String,
    /// 最初に広告したホストが報告したパラメータサイズ
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub parameter_size: String,
    /// ホスティング一覧（順序保持、ホストごとに1件）
    #[serde(default)]
    pub hosts: Vec<HostingAssociation>,
}

impl ModelRecord {
    /// 概要から新規レコードを作成（ホストなし）
    pub fn from_summary(summary: &ModelSummary) -> Self {
        Self {
            name: summary.name.clone(),
            family: summary.family.clone(),
            parameter_size: summary.parameter_size.clone(),
            hosts: Vec::new(),
        }
    }

    /// 指定ホストの紐付けを取得
    pub fn association(&self, host_ip: IpAddr) -> Option<&HostingAssociation> {
        self.hosts.iter().find(|a| a.host_ip == host_ip)
    }

    /// 紐付けを追加または更新する。追加した場合は`true`。
    pub fn set_association(&mut self, host_ip: IpAddr, active: bool) -> bool {
        match self.hosts.iter_mut().find(|a| a.host_ip == host_ip) {
            Some(existing) => {
                existing.active = active;
                false
            }
            None => {
                self.hosts.push(HostingAssociation { host_ip, active });
                true
            }
        }
    }

    /// まだ紐付けがなければ`active`で追加する。既存の状態は変更しない。
    pub fn ensure_association(&mut self, host_ip: IpAddr, active: bool) -> bool {
        if self.association(host_ip).is_some() {
            return false;
        }
        self.hosts.push(HostingAssociation { host_ip, active });
        true
    }

    /// ロード済みホストのIP一覧
    pub fn active_hosts(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.hosts.iter().filter(|a| a.active).map(|a| a.host_ip)
    }
}
