//! Single nested configuration struct for the whole service
//! (spec.md §6 "Configuration"), the concrete schema the teacher's
//! `agent-config` crate left as scaffolding.

use std::time::Duration;

use discovery_composer::ComposerConfig;
use discovery_matcher::MatcherConfig;
use discovery_protocol::ProtocolConfig;
use discovery_registry::{HealthCheckConfig, RegistryConfig};

/// Registry-related tunables not owned by [`RegistryConfig`] itself:
/// whether health checking runs at all, and the reserved
/// `remove_unhealthy_after` setting (spec.md §9 OQ3, decided as
/// "configured but not acted upon").
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Whether the health-check sweep loop runs.
    pub enable_health_check: bool,
    /// Probe cadence, timeout, and failure threshold.
    pub check: HealthCheckConfig,
    /// Reserved: age past which an unhealthy agent would be
    /// unregistered. Not currently acted upon (spec.md §9 OQ3 option b).
    pub remove_unhealthy_after: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enable_health_check: true,
            check: HealthCheckConfig::default(),
            remove_unhealthy_after: Duration::from_secs(300),
        }
    }
}

/// Facade-level tunables (spec.md §6 "Service"): whether the service
/// self-registers its local agent on startup, how often it heartbeats
/// that agent, and whether execution metrics are tracked.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Whether [`crate::DiscoveryService`] registers its own local
    /// agent card automatically when one is supplied.
    pub enable_auto_registration: bool,
    /// Cadence of the local-agent heartbeat loop.
    pub heartbeat_interval: Duration,
    /// Whether execution-outcome metrics are recorded. Reserved for a
    /// future metrics exporter; the registry always tracks
    /// success/failure counts regardless of this flag.
    pub enable_metrics: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable_auto_registration: true,
            heartbeat_interval: Duration::from_secs(15),
            enable_metrics: true,
        }
    }
}

/// The service's complete configuration, one nested struct per plane
/// (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    /// Registry CRUD/index tunables.
    pub registry: RegistryConfig,
    /// Health-check sweep tunables.
    pub health: HealthConfig,
    /// Matching/scoring tunables.
    pub matcher: MatcherConfig,
    /// Composition tunables.
    pub composer: ComposerConfig,
    /// HTTP/multicast/local-cache tunables.
    pub protocol: ProtocolConfig,
    /// Facade-level tunables: auto-registration and heartbeat cadence.
    pub service: ServiceConfig,
}
