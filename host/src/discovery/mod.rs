//! ディスカバリ（ホスト側）
//!
//! LAN上の候補アドレスにハンドシェイクを送り、応答したノードを集める。
//! 同時実行数を制限したワーカープールで動き、キャンセルできる。

pub mod arp;

use crate::client::{HostIdentity, NodeClient};
use futures::{stream, StreamExt};
use ollama_gate_common::{
    advertise::{Advertiser, ServiceRole, BROWSE_TIMEOUT},
    config::HostConfig,
    net,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 1候補あたりのハンドシェイク待ち時間
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// 探索結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    /// ハンドシェイクを送った候補数
    pub probed: usize,
    /// ハンドシェイクを受理したノード
    pub responsive: Vec<SocketAddr>,
    /// 途中でキャンセルされたか
    pub cancelled: bool,
}

/// 候補へのハンドシェイクをワーカープールで実行する
///
/// 失敗した候補はログに残して捨てる。返り値のハンドルは全候補の処理後
/// （またはキャンセル後）に結果を返す。
pub fn spawn_probe(
    candidates: Vec<SocketAddr>,
    identity: HostIdentity,
    concurrency: usize,
    cancel: CancellationToken,
) -> JoinHandle<ProbeSummary> {
    tokio::spawn(async move {
        let total = candidates.len();
        let probes = stream::iter(candidates)
            .map(|addr| {
                let identity = identity.clone();
                async move { (addr, probe_one(addr, &identity).await) }
            })
            .buffer_unordered(concurrency.max(1))
            .take_until(cancel.clone().cancelled_owned());

        futures::pin_mut!(probes);
        let mut summary = ProbeSummary::default();
        while let Some((addr, accepted)) = probes.next().await {
            summary.probed += 1;
            if accepted {
                summary.responsive.push(addr);
            }
        }
        summary.cancelled = cancel.is_cancelled() && summary.probed < total;

        info!(
            probed = summary.probed,
            responsive = summary.responsive.len(),
            cancelled = summary.cancelled,
            "Node probe finished"
        );
        summary
    })
}

async fn probe_one(addr: SocketAddr, identity: &HostIdentity) -> bool {
    let client = match NodeClient::with_timeout(format!("http://{}", addr), PROBE_TIMEOUT) {
        Ok(client) => client,
        Err(err) => {
            warn!(%addr, error = %err, "Failed to create probe client");
            return false;
        }
    };
    match client.send_handshake(&identity.handshake()).await {
        Ok(_) => {
            info!(%addr, "Node found");
            true
        }
        Err(err) => {
            debug!(%addr, error = %err, "Probe failed");
            false
        }
    }
}

/// 探索候補を集める
///
/// mDNSで見つかったノードを先頭に置き、続けてアドレス解決テーブル
/// （空ならローカル /24）のアドレスを `node_port` で並べる。
pub async fn gather_candidates(
    advertiser: Option<&Advertiser>,
    local: Option<IpAddr>,
    node_port: u16,
) -> Vec<SocketAddr> {
    let mut candidates = match advertiser {
        Some(advertiser) => match advertiser.browse(ServiceRole::Node, BROWSE_TIMEOUT).await {
            Ok(found) => found,
            Err(err) => {
                warn!(error = %err, "mDNS browse failed");
                Vec::new()
            }
        },
        None => Vec::new(),
    };

    for ip in arp::candidate_addresses(local).await {
        let addr = SocketAddr::new(ip, node_port);
        if !candidates.contains(&addr) {
            candidates.push(addr);
        }
    }
    candidates
}

/// LAN上のノードを探索する
pub async fn discover_nodes(
    config: &HostConfig,
    identity: HostIdentity,
    advertiser: Option<&Advertiser>,
    cancel: CancellationToken,
) -> ProbeSummary {
    let candidates = gather_candidates(advertiser, net::local_ip(), config.node_port).await;
    if candidates.is_empty() {
        warn!("No candidate addresses found on the local network");
        return ProbeSummary::default();
    }

    info!(candidates = candidates.len(), concurrency = config.probe_concurrency, "Probing for node");
    match spawn_probe(candidates, identity, config.probe_concurrency, cancel).await {
        Ok(summary) => summary,
        Err(err) => {
            warn!(error = %err, "Probe task failed");
            ProbeSummary::default()
        }
    }
}

/// ホストをmDNSで広告する。失敗しても起動は続ける。
pub fn start_advertisement(config: &HostConfig, identity: &HostIdentity) -> Option<Advertiser> {
    if !config.advertise {
        return None;
    }

    let mut advertiser = match Advertiser::new() {
        Ok(advertiser) => advertiser,
        Err(err) => {
            warn!(error = %err, "mDNS unavailable, host will not be advertised");
            return None;
        }
    };
    if let Err(err) = advertiser.advertise(
        ServiceRole::Host,
        &identity.host_name,
        identity.ip_address,
        identity.host_port,
    ) {
        warn!(error = %err, "Failed to advertise host");
    }
    Some(advertiser)
}
