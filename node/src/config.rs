//! Node configuration loaded from environment variables
//!
//! Every setting has an `OLLAMA_GATE_*` name and a short legacy name that is
//! still honored with a deprecation warning.

use ollama_gate_common::config::{
    get_env_flag, get_env_with_fallback, get_env_with_fallback_or, get_env_with_fallback_parse,
    NodeConfig,
};
use std::time::Duration;

use crate::store::MAX_TTL;

/// Build a [`NodeConfig`] from the process environment
///
/// Unset or unparsable values fall back to the defaults.
///
/// # Example
/// ```
/// let config = og_node::config::load_from_env();
/// assert!(config.port > 0);
/// ```
pub fn load_from_env() -> NodeConfig {
    let defaults = NodeConfig::default();
    NodeConfig {
        host: get_env_with_fallback_or("OLLAMA_GATE_NODE_HOST", "NODE_HOST", &defaults.host),
        port: get_env_with_fallback_parse("OLLAMA_GATE_NODE_PORT", "NODE_PORT", defaults.port),
        redis_url: get_env_with_fallback("OLLAMA_GATE_REDIS_URL", "REDIS_URL")
            .filter(|url| !url.trim().is_empty()),
        registry_ttl_secs: get_env_with_fallback_parse(
            "OLLAMA_GATE_REGISTRY_TTL_SECS",
            "REGISTRY_TTL_SECS",
            defaults.registry_ttl_secs,
        ),
        advertise: get_env_flag("OLLAMA_GATE_ADVERTISE", "ADVERTISE", defaults.advertise),
    }
}

/// Registry record TTL as a [`Duration`], clamped to one second .. [`MAX_TTL`]
pub fn registry_ttl(config: &NodeConfig) -> Duration {
    Duration::from_secs(config.registry_ttl_secs.clamp(1, MAX_TTL.as_secs()))
}
