//! Host agent configuration loaded from environment variables

use ollama_gate_common::config::{
    get_env_flag, get_env_with_fallback, get_env_with_fallback_or, get_env_with_fallback_parse,
    HostConfig,
};
use std::time::Duration;

/// Build a [`HostConfig`] from the process environment
///
/// Unset or unparsable values fall back to the defaults.
pub fn load_from_env() -> HostConfig {
    let defaults = HostConfig::default();
    HostConfig {
        host: get_env_with_fallback_or("OLLAMA_GATE_HOST_BIND", "HOST_BIND", &defaults.host),
        port: get_env_with_fallback_parse("OLLAMA_GATE_HOST_PORT", "HOST_PORT", defaults.port),
        engine_url: get_env_with_fallback_or(
            "OLLAMA_GATE_ENGINE_URL",
            "OLLAMA_URL",
            &defaults.engine_url,
        ),
        node_url: get_env_with_fallback("OLLAMA_GATE_NODE_URL", "NODE_URL")
            .filter(|url| !url.trim().is_empty()),
        node_port: get_env_with_fallback_parse(
            "OLLAMA_GATE_NODE_PORT",
            "NODE_PORT",
            defaults.node_port,
        ),
        probe_concurrency: get_env_with_fallback_parse(
            "OLLAMA_GATE_PROBE_CONCURRENCY",
            "PROBE_CONCURRENCY",
            defaults.probe_concurrency,
        )
        .max(1),
        heartbeat_interval_secs: get_env_with_fallback_parse(
            "OLLAMA_GATE_HEARTBEAT_SECS",
            "HEARTBEAT_SECS",
            defaults.heartbeat_interval_secs,
        ),
        retry_interval_secs: defaults.retry_interval_secs,
        advertise: get_env_flag("OLLAMA_GATE_ADVERTISE", "ADVERTISE", defaults.advertise),
    }
}

/// Heartbeat interval; zero is raised to one second
pub fn heartbeat_interval(config: &HostConfig) -> Duration {
    Duration::from_secs(config.heartbeat_interval_secs.max(1))
}

/// Fixed backoff between registration attempts
pub fn retry_interval(config: &HostConfig) -> Duration {
    Duration::from_secs(config.retry_interval_secs.max(1))
}
