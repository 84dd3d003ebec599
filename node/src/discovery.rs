//! ディスカバリ（ノード側）
//!
//! ホストからのハンドシェイクを受けてレジストリを更新する。
//! 併せてノード自身をmDNSで広告する。

use ollama_gate_common::{
    advertise::{Advertiser, ServiceRole},
    config::NodeConfig,
    error::{CommonError, GatewayError, NodeError, NodeResult},
    gateway::GatewayClient,
    net,
    protocol::{Handshake, PeerRole},
    types::HostRecord,
};
use tracing::{info, warn};

use crate::registry::{new_host_record, HostDirectory};

/// ハンドシェイクの形式を検証する
pub fn validate_handshake(handshake: &Handshake) -> NodeResult<()> {
    if handshake.identifier != PeerRole::Host {
        return Err(CommonError::Validation(format!(
            "identifier must be host role (0), got {:?}",
            handshake.identifier
        ))
        .into());
    }
    if handshake.host_port == 0 {
        return Err(CommonError::Validation("host_port must not be 0".into()).into());
    }
    if handshake.ip_address.is_unspecified() {
        return Err(CommonError::Validation(format!(
            "ip_address must be routable, got {}",
            handshake.ip_address
        ))
        .into());
    }
    Ok(())
}

/// ホストを観測したときの処理
///
/// ホストのモデル一覧を取得してホストレコードを更新し、
/// 初見のモデル紐付けを `active=false` で追加する。
pub async fn observe_host(
    directory: &HostDirectory,
    handshake: &Handshake,
) -> NodeResult<HostRecord> {
    validate_handshake(handshake)?;

    let ip = handshake.ip_address;
    let client = GatewayClient::for_host(ip, handshake.host_port)?;
    let models = client.fetch_model_list().await.map_err(|err| match err {
        GatewayError::Transport(reason) => NodeError::UnreachableHost { ip, reason },
        other => other.into(),
    })?;

    let record = directory
        .refresh_host(new_host_record(
            ip,
            handshake.host_port,
            handshake.host_name.clone(),
            models,
        ))
        .await?;
    let added = directory.register_host_models(ip, &record.models).await?;

    info!(
        host_ip = %ip,
        host_name = %record.host_name,
        port = record.port,
        models = record.models.len(),
        new_associations = added,
        "Host observed"
    );
    Ok(record)
}

/// ノードをmDNSで広告する。失敗しても起動は続ける。
pub fn start_advertisement(config: &NodeConfig) -> Option<Advertiser> {
    if !config.advertise {
        return None;
    }

    let mut advertiser = match Advertiser::new() {
        Ok(advertiser) => advertiser,
        Err(err) => {
            warn!(error = %err, "mDNS unavailable, node will not be advertised");
            return None;
        }
    };

    let ip = net::local_ip_or_loopback();
    let name = net::machine_name();
    if let Err(err) = advertiser.advertise(ServiceRole::Node, &name, ip, config.port) {
        warn!(error = %err, "Failed to advertise node");
        advertiser.shutdown();
        return None;
    }
    Some(advertiser)
}
