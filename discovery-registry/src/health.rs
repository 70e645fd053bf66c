//! Periodic liveness probing and status-transition state machine
//! (spec.md §4.2).
//!
//! Remote (HTTP) probing is behind the [`RemoteHealthProbe`] trait so
//! this crate never depends on an HTTP client; `discovery-protocol`
//! supplies the concrete implementation, wired in by `discovery-service`.
//! This mirrors how the teacher keeps `agent_kernel` free of transport
//! dependencies and pushes I/O behind a trait object owned by the
//! caller.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use discovery_core::{AgentId, AgentStatus, EventType};
use tracing::{debug, warn};

use crate::registry::Registry;

/// Outcome of a single health probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeOutcome {
    /// Whether the probe succeeded.
    pub healthy: bool,
    /// Wall-clock time the probe took, recorded regardless of outcome.
    pub latency: Duration,
    /// Human-readable failure reason, empty when `healthy`.
    pub reason: &'static str,
}

/// Implemented by transports capable of probing a remote agent's
/// `/health` endpoint. `discovery-protocol`'s HTTP client implements
/// this; tests may supply a stub.
#[async_trait]
pub trait RemoteHealthProbe: Send + Sync {
    /// Issues `GET <endpoint>/health` with the given timeout, returning
    /// the outcome. Must never panic on network failure.
    async fn probe(&self, endpoint: &str, timeout: Duration) -> ProbeOutcome;
}

/// Configuration for the health-checking loop (spec.md §6).
#[derive(Debug, Clone)]
pub struct HealthCheckConfig {
    /// How often the checker sweeps every registered agent.
    pub interval: Duration,
    /// Per-probe timeout for remote agents.
    pub probe_timeout: Duration,
    /// Consecutive failures required before an agent is marked unhealthy.
    pub unhealthy_threshold: u32,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            unhealthy_threshold: 3,
        }
    }
}

/// Per-agent consecutive-failure tracker and status driver.
///
/// Holds no reference to a running task: `discovery-service` owns the
/// scheduling loop (`tokio::time::interval`) and calls
/// [`HealthChecker::sweep`] each tick, which keeps this type trivially
/// testable without a real clock.
pub struct HealthChecker {
    config: HealthCheckConfig,
    failures: Mutex<HashMap<AgentId, u32>>,
    remote_probe: Option<std::sync::Arc<dyn RemoteHealthProbe>>,
}

impl HealthChecker {
    /// Creates a checker with no remote-probe backend; remote agents
    /// with a non-empty endpoint will be skipped (treated as healthy)
    /// until [`Self::with_remote_probe`] attaches one.
    #[must_use]
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            failures: Mutex::new(HashMap::new()),
            remote_probe: None,
        }
    }

    /// Attaches a remote-probe backend used for non-local agents with a
    /// non-empty endpoint.
    #[must_use]
    pub fn with_remote_probe(mut self, probe: std::sync::Arc<dyn RemoteHealthProbe>) -> Self {
        self.remote_probe = Some(probe);
        self
    }

    /// Runs one full sweep over every agent currently registered.
    pub async fn sweep(&self, registry: &Registry) {
        let agents = registry.list_agents();
        for agent in agents {
            let id = agent.id();
            let now = Utc::now();

            let outcome = if agent.is_local() {
                let stale = agent.is_stale(now, chrono::Duration::seconds(
                    i64::try_from(self.config.interval.as_secs() * 3).unwrap_or(i64::MAX),
                ));
                ProbeOutcome {
                    healthy: !stale,
                    latency: Duration::ZERO,
                    reason: "heartbeat timeout",
                }
            } else if agent.endpoint().is_empty() {
                ProbeOutcome {
                    healthy: true,
                    latency: Duration::ZERO,
                    reason: "",
                }
            } else if let Some(probe) = &self.remote_probe {
                probe.probe(agent.endpoint(), self.config.probe_timeout).await
            } else {
                ProbeOutcome {
                    healthy: true,
                    latency: Duration::ZERO,
                    reason: "",
                }
            };

            self.apply_outcome(registry, &id, outcome);
        }
    }

    fn apply_outcome(&self, registry: &Registry, id: &AgentId, outcome: ProbeOutcome) {
        let mut failures = self.failures.lock().expect("health checker poisoned");
        let count = failures.entry(id.clone()).or_insert(0);

        if outcome.healthy {
            let was_failing = *count >= self.config.unhealthy_threshold;
            *count = 0;
            drop(failures);
            if registry.update_agent_status(id, AgentStatus::Online).is_ok() && was_failing {
                registry.emit_health_event(id, EventType::HealthCheckRecovered);
                debug!(agent = %id, "health check recovered");
            }
        } else {
            *count += 1;
            let crossed_or_past_threshold = *count >= self.config.unhealthy_threshold;
            let failures_value = *count;
            drop(failures);
            if crossed_or_past_threshold {
                let _ = registry.update_agent_status(id, AgentStatus::Unhealthy);
                registry.emit_health_event(id, EventType::HealthCheckFailed);
                warn!(
                    agent = %id,
                    failures = failures_value,
                    reason = outcome.reason,
                    "health check failed"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RegistryConfig, Registry};
    use discovery_core::AgentCard;
    use std::sync::Arc;

    fn card(name: &str) -> AgentCard {
        AgentCard::new(name, "", "", "1.0.0", vec![]).unwrap()
    }

    struct AlwaysFails;
    #[async_trait]
    impl RemoteHealthProbe for AlwaysFails {
        async fn probe(&self, _endpoint: &str, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome {
                healthy: false,
                latency: Duration::from_millis(1),
                reason: "connection refused",
            }
        }
    }

    struct AlwaysSucceeds;
    #[async_trait]
    impl RemoteHealthProbe for AlwaysSucceeds {
        async fn probe(&self, _endpoint: &str, _timeout: Duration) -> ProbeOutcome {
            ProbeOutcome {
                healthy: true,
                latency: Duration::from_millis(1),
                reason: "",
            }
        }
    }

    #[tokio::test]
    async fn remote_agent_marked_unhealthy_after_threshold() {
        let registry = Registry::new(RegistryConfig::default());
        registry
            .register_agent(card("remote1"), false, "http://peer:9000".into(), 0)
            .unwrap();

        let checker = HealthChecker::new(HealthCheckConfig {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(1),
            unhealthy_threshold: 3,
        })
        .with_remote_probe(Arc::new(AlwaysFails));

        for _ in 0..2 {
            checker.sweep(&registry).await;
            let agent = registry.get_agent(&AgentId::new("remote1")).unwrap();
            assert_eq!(agent.status(), AgentStatus::Online);
        }
        checker.sweep(&registry).await;
        let agent = registry.get_agent(&AgentId::new("remote1")).unwrap();
        assert_eq!(agent.status(), AgentStatus::Unhealthy);
    }

    #[tokio::test]
    async fn recovery_resets_failure_count() {
        let registry = Registry::new(RegistryConfig::default());
        registry
            .register_agent(card("remote2"), false, "http://peer:9000".into(), 0)
            .unwrap();

        let checker = HealthChecker::new(HealthCheckConfig {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(1),
            unhealthy_threshold: 2,
        })
        .with_remote_probe(Arc::new(AlwaysFails));
        checker.sweep(&registry).await;
        checker.sweep(&registry).await;
        assert_eq!(
            registry.get_agent(&AgentId::new("remote2")).unwrap().status(),
            AgentStatus::Unhealthy
        );

        let recovering = HealthChecker::new(HealthCheckConfig {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(1),
            unhealthy_threshold: 2,
        })
        .with_remote_probe(Arc::new(AlwaysSucceeds));
        recovering.sweep(&registry).await;
        assert_eq!(
            registry.get_agent(&AgentId::new("remote2")).unwrap().status(),
            AgentStatus::Online
        );
    }

    #[tokio::test]
    async fn recovery_is_not_emitted_without_a_prior_failure_event() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let registry = Registry::new(RegistryConfig::default());
        registry
            .register_agent(card("remote4"), false, "http://peer:9000".into(), 0)
            .unwrap();

        let recovered = Arc::new(AtomicUsize::new(0));
        let recovered_clone = Arc::clone(&recovered);
        registry.subscribe(Arc::new(move |event: discovery_core::DiscoveryEvent| {
            let recovered = Arc::clone(&recovered_clone);
            async move {
                if event.event_type() == EventType::HealthCheckRecovered {
                    recovered.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));

        let checker = HealthChecker::new(HealthCheckConfig {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(1),
            unhealthy_threshold: 3,
        })
        .with_remote_probe(Arc::new(AlwaysFails));

        // Two failures, below the threshold of 3: no HealthCheckFailed
        // has fired yet.
        checker.sweep(&registry).await;
        checker.sweep(&registry).await;

        let recovering = HealthChecker::new(HealthCheckConfig {
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(1),
            unhealthy_threshold: 3,
        })
        .with_remote_probe(Arc::new(AlwaysSucceeds));
        recovering.sweep(&registry).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(recovered.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_endpoint_remote_agent_stays_healthy() {
        let registry = Registry::new(RegistryConfig::default());
        registry
            .register_agent(card("remote3"), false, String::new(), 0)
            .unwrap();
        let checker = HealthChecker::new(HealthCheckConfig::default());
        checker.sweep(&registry).await;
        assert_eq!(
            registry.get_agent(&AgentId::new("remote3")).unwrap().status(),
            AgentStatus::Online
        );
    }
}
