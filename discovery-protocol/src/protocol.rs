//! Facade tying the local cache, registry, and multicast plane
//! together behind `Announce`/`Discover` (spec.md §4.5).

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use discovery_core::{AgentInfo, DiscoveryError, DiscoveryResult};
use discovery_registry::Registry;
use tracing::warn;

use crate::cache::{matches_filter, LocalCache};
use crate::model::{AgentFilter, ProtocolConfig};
use crate::multicast;

/// The protocol plane: local cache, HTTP surface state, and (if
/// enabled) the multicast announcer/listener.
pub struct Protocol {
    config: ProtocolConfig,
    registry: Arc<Registry>,
    local_cache: LocalCache,
    remote_cache: LocalCache,
    multicast_running: Arc<AtomicBool>,
}

impl Protocol {
    /// Creates a protocol plane backed by `registry`.
    #[must_use]
    pub fn new(config: ProtocolConfig, registry: Arc<Registry>) -> Self {
        Self {
            config,
            registry,
            local_cache: LocalCache::new(),
            remote_cache: LocalCache::new(),
            multicast_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the local (announced-here) cache.
    #[must_use]
    pub fn local_cache(&self) -> &LocalCache {
        &self.local_cache
    }

    /// Returns the configuration this plane was built with.
    #[must_use]
    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Validates and publishes `info`: caches it locally, upserts it
    /// into the registry, and (if enabled) multicasts it.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Invalid`] if the card name is empty.
    pub async fn announce(&self, info: AgentInfo) -> DiscoveryResult<()> {
        if info.card().name().trim().is_empty() {
            return Err(DiscoveryError::invalid("agent card name cannot be empty"));
        }

        self.local_cache.upsert(info.clone());

        match self.registry.register_agent(
            info.card().clone(),
            info.is_local(),
            info.endpoint().to_owned(),
            info.priority(),
        ) {
            Ok(_) => {}
            Err(DiscoveryError::AlreadyExists(_)) => {
                self.registry.update_agent(&info.id(), info.card().clone())?;
            }
            Err(err) => return Err(err),
        }

        if self.config.enable_multicast {
            if let Err(err) = self.multicast_announce(&info).await {
                warn!(%err, "multicast announce failed, continuing");
            }
        }

        Ok(())
    }

    async fn multicast_announce(&self, info: &AgentInfo) -> Result<(), crate::error::ProtocolError> {
        let group: Ipv4Addr = self
            .config
            .multicast_address
            .parse()
            .map_err(|_| crate::error::ProtocolError::invalid("invalid multicast address"))?;
        let socket = multicast::bind(group, 0).await?;
        multicast::announce(&socket, group, self.config.multicast_port, info).await
    }

    /// Looks up a single agent by id, in the same source priority as
    /// [`Self::discover`]: local cache, then registry, then the
    /// multicast-observed remote cache.
    #[must_use]
    pub fn get_agent(&self, id: &str) -> Option<AgentInfo> {
        self.local_cache
            .get(id)
            .or_else(|| self.registry.get_agent(&discovery_core::AgentId::new(id)).ok())
            .or_else(|| self.remote_cache.get(id))
    }

    /// Returns the deduped union of local cache, registry, and
    /// multicast-observed entries matching `filter`, first-occurrence
    /// order as stated in spec.md §4.5.
    #[must_use]
    pub fn discover(&self, filter: &AgentFilter) -> Vec<AgentInfo> {
        let mut seen = std::collections::HashSet::new();
        let mut result = Vec::new();

        for agent in self.local_cache.matching(filter) {
            if seen.insert(agent.card().name().to_owned()) {
                result.push(agent);
            }
        }
        for agent in self.registry.list_agents() {
            if matches_filter(&agent, filter) && seen.insert(agent.card().name().to_owned()) {
                result.push(agent);
            }
        }
        for agent in self.remote_cache.matching(filter) {
            if seen.insert(agent.card().name().to_owned()) {
                result.push(agent);
            }
        }

        result
    }

    /// Runs the multicast listen loop until [`Self::stop_multicast`] is
    /// called, folding each observed agent into the remote cache and
    /// the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the multicast socket cannot be bound.
    pub async fn run_multicast_listener(self: &Arc<Self>) -> Result<(), crate::error::ProtocolError> {
        let group: Ipv4Addr = self
            .config
            .multicast_address
            .parse()
            .map_err(|_| crate::error::ProtocolError::invalid("invalid multicast address"))?;
        let socket = multicast::bind(group, self.config.multicast_port).await?;
        self.multicast_running.store(true, Ordering::Relaxed);
        let running = Arc::clone(&self.multicast_running);
        let this = Arc::clone(self);
        multicast::listen(&socket, running, move |agent| {
            this.observe_remote(agent);
        })
        .await;
        Ok(())
    }

    fn observe_remote(&self, mut agent: AgentInfo) {
        let name = agent.card().name().to_owned();
        if self.remote_cache.get(&name).is_none()
            && self.remote_cache.all().len() >= self.config.max_peers
        {
            warn!(%name, max_peers = self.config.max_peers, "dropping multicast peer, cache full");
            return;
        }

        let now = chrono::Utc::now();
        agent.heartbeat(now);
        self.remote_cache.upsert(agent.clone());
        match self.registry.register_agent(
            agent.card().clone(),
            false,
            agent.endpoint().to_owned(),
            agent.priority(),
        ) {
            Ok(_) | Err(DiscoveryError::AlreadyExists(_)) => {
                let _ = self.registry.update_agent(&agent.id(), agent.card().clone());
            }
            Err(err) => warn!(%err, "failed to upsert multicast-observed agent"),
        }
    }

    /// Stops a running multicast listener started with
    /// [`Self::run_multicast_listener`].
    pub fn stop_multicast(&self) {
        self.multicast_running.store(false, Ordering::Relaxed);
    }
}
