//! Top-level facade wiring the registry, matcher, composer, and
//! protocol planes together, grounded on the teacher's `AgentKernel`
//! pattern of a single struct owning every sub-component
//! (`agent_kernel::lib`) plus its heartbeat/registration loops
//! (`agent_kernel::registry::run_heartbeat_loop`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use discovery_composer::{Composer, CompositionRequest, CompositionResult};
use discovery_core::{AgentCard, AgentId, DiscoveryResult};
use discovery_matcher::{MatchRequest, MatchResult, Matcher};
use discovery_registry::{HealthChecker, Registry};
use discovery_protocol::{HttpHealthProbe, Protocol};
use tokio::sync::RwLock as AsyncRwLock;
use tracing::info;

use crate::config::Configuration;

/// Wires [`Registry`], [`HealthChecker`], [`Matcher`], [`Composer`],
/// and [`Protocol`] into a single service, and owns the background
/// loops that keep health state and remote announcements current.
pub struct DiscoveryService {
    registry: Arc<Registry>,
    health_checker: Arc<HealthChecker>,
    matcher: Matcher,
    composer: Composer,
    protocol: Arc<Protocol>,
    config: Configuration,
    running: AtomicBool,
    local_agent: AsyncRwLock<Option<AgentId>>,
}

impl DiscoveryService {
    /// Builds a service from `config`. Does not start any background
    /// loop; call [`Self::run_health_check_loop`] and
    /// [`Self::run_announce_loop`] explicitly (or via [`Self::start`]).
    #[must_use]
    pub fn new(config: Configuration) -> Arc<Self> {
        let registry = Arc::new(Registry::new(config.registry.clone()));

        let mut health_checker = HealthChecker::new(config.health.check.clone());
        if config.protocol.enable_http {
            health_checker = health_checker.with_remote_probe(Arc::new(HttpHealthProbe::new()));
        }

        let protocol = Arc::new(Protocol::new(config.protocol.clone(), Arc::clone(&registry)));

        Arc::new(Self {
            matcher: Matcher::new(config.matcher.clone()),
            composer: Composer::new(config.composer.clone()),
            health_checker: Arc::new(health_checker),
            protocol,
            registry,
            config,
            running: AtomicBool::new(true),
            local_agent: AsyncRwLock::new(None),
        })
    }

    /// Registers `card` as this process's own local agent, if
    /// `service.enable_auto_registration` is set, and remembers its id
    /// so [`Self::run_heartbeat_loop`] can keep it alive. A no-op when
    /// auto-registration is disabled.
    ///
    /// # Errors
    ///
    /// See [`discovery_protocol::Protocol::announce`].
    pub async fn register_local_agent(&self, card: AgentCard) -> DiscoveryResult<()> {
        if !self.config.service.enable_auto_registration {
            return Ok(());
        }
        let id = card.id();
        let info = discovery_core::AgentInfo::new(card, true, String::new(), 0);
        self.protocol.announce(info).await?;
        *self.local_agent.write().await = Some(id);
        Ok(())
    }

    /// Periodically advances the local agent's heartbeat (registered
    /// via [`Self::register_local_agent`]) until [`Self::stop`] is
    /// called. A no-op if no local agent has been registered.
    pub async fn run_heartbeat_loop(self: &Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.service.heartbeat_interval);
        while self.running.load(Ordering::Relaxed) {
            interval.tick().await;
            let Some(id) = self.local_agent.read().await.clone() else {
                continue;
            };
            if let Err(err) = self.registry.heartbeat(&id) {
                tracing::warn!(%err, agent = %id, "local agent heartbeat failed");
            }
        }
    }

    /// Returns the registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Returns the matcher.
    #[must_use]
    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Returns the composer.
    #[must_use]
    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    /// Returns the protocol plane.
    #[must_use]
    pub fn protocol(&self) -> &Arc<Protocol> {
        &self.protocol
    }

    /// Returns the configuration this service was built with.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Runs a single match against the live registry.
    ///
    /// # Errors
    ///
    /// See [`Matcher::find_match`].
    pub async fn find_match(&self, request: &MatchRequest) -> DiscoveryResult<Vec<MatchResult>> {
        self.matcher.find_match(&self.registry, request).await
    }

    /// Resolves the next round-robin agent for `capability_name`.
    ///
    /// # Errors
    ///
    /// See [`Matcher::find_next_round_robin`].
    pub fn find_next_round_robin(&self, capability_name: &str) -> DiscoveryResult<AgentId> {
        self.matcher.find_next_round_robin(&self.registry, capability_name)
    }

    /// Assembles a composition against the live registry.
    ///
    /// # Errors
    ///
    /// See [`Composer::compose`].
    pub async fn compose(&self, request: &CompositionRequest) -> DiscoveryResult<CompositionResult> {
        self.composer.compose(&self.registry, request).await
    }

    /// Periodically sweeps agent health until [`Self::stop`] is
    /// called. Intended to be spawned as a background task.
    pub async fn run_health_check_loop(self: &Arc<Self>) {
        if !self.config.health.enable_health_check {
            return;
        }
        let mut interval = tokio::time::interval(self.config.health.check.interval);
        while self.running.load(Ordering::Relaxed) {
            interval.tick().await;
            self.health_checker.sweep(&self.registry).await;
        }
    }

    /// Periodically re-announces every locally registered agent
    /// through the protocol plane until [`Self::stop`] is called.
    pub async fn run_announce_loop(self: &Arc<Self>) {
        if !self.config.protocol.enable_local {
            return;
        }
        let mut interval = tokio::time::interval(self.config.protocol.announce_interval);
        while self.running.load(Ordering::Relaxed) {
            interval.tick().await;
            for agent in self.registry.get_active_agents() {
                if agent.is_local() {
                    if let Err(err) = self.protocol.announce(agent).await {
                        tracing::warn!(%err, "periodic re-announce failed");
                    }
                }
            }
        }
    }

    /// Signals every background loop to stop at its next tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        info!("discovery service stopping");
    }
}
