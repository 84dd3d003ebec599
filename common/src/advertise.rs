//! mDNSによるサービス広告と探索
//!
//! 共有レジストリを持たないピアでもノード/ホストを見つけられるようにする。
//! 探索は固定の2秒で打ち切り、ハンドシェイクの流れを止めない。

use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{CommonError, CommonResult};
use crate::net::mdns_host_name;

/// ノードのサービスタイプ
pub const NODE_SERVICE_TYPE: &str = "_ollama-gate-node._tcp.local.";

/// ホストのサービスタイプ
pub const HOST_SERVICE_TYPE: &str = "_ollama-gate-host._tcp.local.";

/// 探索の待ち時間
pub const BROWSE_TIMEOUT: Duration = Duration::from_secs(2);

/// 広告する役割
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    /// ノード
    Node,
    /// ホスト
    Host,
}

impl ServiceRole {
    /// サービスタイプ文字列
    pub fn service_type(self) -> &'static str {
        match self {
            ServiceRole::Node => NODE_SERVICE_TYPE,
            ServiceRole::Host => HOST_SERVICE_TYPE,
        }
    }

    fn txt_role(self) -> &'static str {
        match self {
            ServiceRole::Node => "node",
            ServiceRole::Host => "host",
        }
    }
}

/// mDNSデーモンのハンドル
pub struct Advertiser {
    daemon: ServiceDaemon,
    registered: Vec<String>,
}

impl Advertiser {
    /// デーモンを起動する
    pub fn new() -> CommonResult<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| CommonError::Advertise(format!("Failed to start mDNS daemon: {}", e)))?;
        Ok(Self {
            daemon,
            registered: Vec::new(),
        })
    }

    /// サービスを登録する
    pub fn advertise(
        &mut self,
        role: ServiceRole,
        instance_name: &str,
        ip: IpAddr,
        port: u16,
    ) -> CommonResult<()> {
        let host_name = mdns_host_name(instance_name);
        let properties = [("role", role.txt_role())];
        let service = ServiceInfo::new(
            role.service_type(),
            instance_name,
            &host_name,
            ip,
            port,
            &properties[..],
        )
        .map_err(|e| CommonError::Advertise(format!("Invalid service info: {}", e)))?;

        let fullname = service.get_fullname().to_string();
        self.daemon
            .register(service)
            .map_err(|e| CommonError::Advertise(format!("Failed to register service: {}", e)))?;

        info!(
            service = %fullname,
            %ip,
            port,
            "Advertising service via mDNS"
        );
        self.registered.push(fullname);
        Ok(())
    }

    /// 指定役割のサービスを探索する
    ///
    /// `timeout` が経過するまでに解決できたアドレスを返す。
    pub async fn browse(
        &self,
        role: ServiceRole,
        timeout: Duration,
    ) -> CommonResult<Vec<SocketAddr>> {
        let service_type = role.service_type();
        let receiver = self
            .daemon
            .browse(service_type)
            .map_err(|e| CommonError::Advertise(format!("Failed to browse: {}", e)))?;

        let found = tokio::task::spawn_blocking(move || {
            let deadline = Instant::now() + timeout;
            let mut found = Vec::new();
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match receiver.recv_timeout(remaining) {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        for ip in info.get_addresses() {
                            let addr = SocketAddr::new(*ip, info.get_port());
                            if !found.contains(&addr) {
                                found.push(addr);
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            found
        })
        .await
        .map_err(|e| CommonError::Advertise(format!("Browse task failed: {}", e)))?;

        if let Err(err) = self.daemon.stop_browse(service_type) {
            debug!(error = %err, "Failed to stop mDNS browse");
        }

        Ok(found)
    }

    /// 登録を解除してデーモンを停止する
    pub fn shutdown(self) {
        for fullname in &self.registered {
            if let Err(err) = self.daemon.unregister(fullname) {
                warn!(service = %fullname, error = %err, "Failed to unregister mDNS service");
            }
        }
        if let Err(err) = self.daemon.shutdown() {
            warn!(error = %err, "Failed to shut down mDNS daemon");
        }
    }
}
