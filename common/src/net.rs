//! ネットワークユーティリティ

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// 外向きインターフェースのローカルIPを取得する
///
/// ダミーのUDP接続を張るだけでパケットは送信しない。
pub fn local_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let addr = socket.local_addr().ok()?;

    Some(addr.ip())
}

/// ローカルIP（取得できなければループバック）
pub fn local_ip_or_loopback() -> IpAddr {
    local_ip().unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// 表示用のマシン名
pub fn machine_name() -> String {
    whoami::devicename()
}

/// mDNSで使えるホスト名 (`<name>.local.`)
pub fn mdns_host_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect();
    let trimmed = sanitized.trim_matches('-');
    let label = if trimmed.is_empty() { "ollama-gate" } else { trimmed };
    format!("{}.local.", label.to_ascii_lowercase())
}
