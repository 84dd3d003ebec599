//! アドレス解決テーブルからの候補列挙
//!
//! Linuxは `/proc/net/arp`、Windows/macOSは `arp -a` の出力を読む。

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use tracing::{debug, warn};

/// `/proc/net/arp` を解釈する（先頭行はヘッダ）
///
/// フラグが `0x0`（未解決）の行とMACが全ゼロの行は除外する。
pub fn parse_proc_net_arp(content: &str) -> Vec<Ipv4Addr> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let ip = fields.first()?.parse().ok()?;
            if fields.get(2) == Some(&"0x0") || fields.get(3) == Some(&"00:00:00:00:00:00") {
                return None;
            }
            Some(ip)
        })
        .collect()
}

/// Windowsの `arp -a` 出力を解釈する
///
/// ```text
/// Interface: 192.168.1.10 --- 0xb
///   Internet Address      Physical Address      Type
///   192.168.1.1           aa-bb-cc-dd-ee-ff     dynamic
/// ```
pub fn parse_windows_arp(output: &str) -> Vec<Ipv4Addr> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with("Interface:"))
        .filter_map(|line| line.split_whitespace().next()?.parse().ok())
        .collect()
}

/// macOSの `arp -a` 出力を解釈する
///
/// ```text
/// ? (192.168.1.1) at 0:1a:2b:3c:4d:5e on en0 ifscope [ethernet]
/// ```
pub fn parse_macos_arp(output: &str) -> Vec<Ipv4Addr> {
    output
        .lines()
        .filter(|line| !line.contains("(incomplete)"))
        .filter_map(|line| {
            let start = line.find('(')?;
            let end = line[start..].find(')')? + start;
            line[start + 1..end].parse().ok()
        })
        .collect()
}

/// ローカルアドレスの /24 を総当たりする候補
pub fn subnet_sweep(local: Ipv4Addr) -> Vec<Ipv4Addr> {
    let [a, b, c, own] = local.octets();
    (1..=254u8)
        .filter(|&d| d != own)
        .map(|d| Ipv4Addr::new(a, b, c, d))
        .collect()
}

/// 探索対象にならないアドレスを除き、重複を取り除く（順序は維持）
pub fn filter_candidates(addresses: Vec<Ipv4Addr>, local: Option<IpAddr>) -> Vec<IpAddr> {
    let mut seen = HashSet::new();
    addresses
        .into_iter()
        .filter(|ip| {
            !ip.is_loopback()
                && !ip.is_multicast()
                && !ip.is_broadcast()
                && !ip.is_unspecified()
                && ip.octets()[3] != 255
        })
        .map(IpAddr::V4)
        .filter(|ip| Some(*ip) != local)
        .filter(|ip| seen.insert(*ip))
        .collect()
}

/// このOSのアドレス解決テーブルを読む。読めなければ空
pub async fn read_neighbor_table() -> Vec<Ipv4Addr> {
    if cfg!(target_os = "linux") {
        match tokio::fs::read_to_string("/proc/net/arp").await {
            Ok(content) => parse_proc_net_arp(&content),
            Err(err) => {
                warn!(error = %err, "Failed to read /proc/net/arp");
                Vec::new()
            }
        }
    } else {
        let output = match tokio::process::Command::new("arp").arg("-a").output().await {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "Failed to run arp -a");
                return Vec::new();
            }
        };
        let text = String::from_utf8_lossy(&output.stdout);
        if cfg!(target_os = "windows") {
            parse_windows_arp(&text)
        } else {
            parse_macos_arp(&text)
        }
    }
}

/// 探索候補を決める
///
/// テーブルに候補があればそれを使い、なければローカルの /24 を総当たりする。
pub async fn candidate_addresses(local: Option<IpAddr>) -> Vec<IpAddr> {
    let from_table = filter_candidates(read_neighbor_table().await, local);
    if !from_table.is_empty() {
        debug!(count = from_table.len(), "Using neighbor table candidates");
        return from_table;
    }

    match local {
        Some(IpAddr::V4(v4)) => {
            debug!(subnet = %v4, "Neighbor table empty, sweeping /24");
            filter_candidates(subnet_sweep(v4), local)
        }
        _ => Vec::new(),
    }
}
