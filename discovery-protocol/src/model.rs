//! Filter and configuration value types for the protocol plane
//! (spec.md §4.5, §6).

use std::time::Duration;

use discovery_core::AgentStatus;
use serde::{Deserialize, Serialize};

/// Selection criteria applied by `Discover` and the `GET /discovery/agents`
/// endpoint (spec.md §4.5 "Filter semantics").
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AgentFilter {
    /// Keep only agents with `is_local = true`.
    #[serde(default)]
    pub local: bool,
    /// Keep only agents with `is_local = false`.
    #[serde(default)]
    pub remote: bool,
    /// Any-of match against agent status; empty means unrestricted.
    #[serde(default)]
    pub status: Vec<AgentStatus>,
    /// Every name must appear among the agent's capability names.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Every tag must appear among at least one capability's tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Tunables for the protocol plane (spec.md §6 "Protocol").
#[derive(Debug, Clone)]
pub struct ProtocolConfig {
    /// Whether the in-process local cache participates in `Discover`.
    pub enable_local: bool,
    /// Whether the HTTP server/client surface is enabled.
    pub enable_http: bool,
    /// HTTP server bind host.
    pub http_host: String,
    /// HTTP server bind port.
    pub http_port: u16,
    /// Whether the multicast announcer/listener is enabled.
    pub enable_multicast: bool,
    /// Multicast group address.
    pub multicast_address: String,
    /// Multicast group port.
    pub multicast_port: u16,
    /// Interval between periodic local-agent announcements.
    pub announce_interval: Duration,
    /// Time budget for `Discover(url)` HTTP calls.
    pub discovery_timeout: Duration,
    /// Cap on distinct remote peers tracked by the multicast cache.
    pub max_peers: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            enable_local: true,
            enable_http: true,
            http_host: "0.0.0.0".to_owned(),
            http_port: 8765,
            enable_multicast: false,
            multicast_address: "239.255.255.250".to_owned(),
            multicast_port: 1900,
            announce_interval: Duration::from_secs(30),
            discovery_timeout: Duration::from_secs(5),
            max_peers: 100,
        }
    }
}
