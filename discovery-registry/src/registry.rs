//! Authoritative in-memory agent/capability registry (spec.md §4.1).
//!
//! Generalizes the teacher's `agent_tools::registry::ToolRegistry`
//! `RwLock<HashMap<..>>` CRUD shape to two related tables (agents, and
//! a capability-name inverted index) guarded by one lock, plus a
//! separately locked subscriber table so emitting events never blocks
//! a concurrent read or write on the data.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use discovery_core::{
    AgentCard, AgentId, AgentInfo, AgentStatus, CapabilityDescriptor, CapabilityInfo,
    DiscoveryError, DiscoveryResult, DiscoveryEvent, EventType, SubscriptionId,
};
use tracing::warn;

use crate::events::{EventBus, EventHandler};
use crate::scheduler::TaskScheduler;
use crate::store::RegistryStore;

/// Tunables for the registry (spec.md §6 "Registry").
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Initial score assigned to a capability at registration time.
    pub default_capability_score: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_capability_score: 50.0,
        }
    }
}

struct RegistryState {
    agents: HashMap<AgentId, AgentInfo>,
    index: HashMap<String, HashMap<AgentId, CapabilityInfo>>,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            agents: HashMap::new(),
            index: HashMap::new(),
        }
    }

    fn index_capability(&mut self, info: &CapabilityInfo) {
        self.index
            .entry(info.capability().name().to_owned())
            .or_default()
            .insert(info.agent_id().clone(), info.clone());
    }

    fn deindex_capability(&mut self, capability_name: &str, agent_id: &AgentId) {
        if let Some(entries) = self.index.get_mut(capability_name) {
            entries.remove(agent_id);
            if entries.is_empty() {
                self.index.remove(capability_name);
            }
        }
    }

    fn deindex_agent(&mut self, agent_id: &AgentId, capability_names: &[String]) {
        for name in capability_names {
            self.deindex_capability(name, agent_id);
        }
    }
}

/// The authoritative registry of agents and their capabilities.
pub struct Registry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    events: EventBus,
    scheduler: TaskScheduler,
    store: Option<Arc<dyn RegistryStore>>,
}

impl Registry {
    /// Creates an empty registry with no attached persistence backend.
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::new()),
            events: EventBus::new(),
            scheduler: TaskScheduler::new(),
            store: None,
        }
    }

    /// Attaches a persistence backend; `Save`/`Delete` are invoked
    /// best-effort after in-memory mutations commit.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryState> {
        self.state.read().expect("registry poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryState> {
        self.state.write().expect("registry poisoned")
    }

    fn persist_save(&self, agent: AgentInfo) {
        if let Some(store) = self.store.clone() {
            let _ = self.scheduler.spawn(async move {
                if let Err(err) = store.save(&agent).await {
                    warn!(error = %err, "registry store save failed");
                }
            });
        }
    }

    fn persist_delete(&self, id: AgentId) {
        if let Some(store) = self.store.clone() {
            let _ = self.scheduler.spawn(async move {
                if let Err(err) = store.delete(&id).await {
                    warn!(error = %err, "registry store delete failed");
                }
            });
        }
    }

    fn emit(&self, event: DiscoveryEvent) {
        self.events.emit(event, &self.scheduler);
    }

    /// Emits a health-transition event on behalf of the health checker.
    pub fn emit_health_event(&self, agent_id: &AgentId, event_type: EventType) {
        self.emit(DiscoveryEvent::new(event_type, agent_id.clone()));
    }

    // ---- agent operations ----------------------------------------

    /// Registers a new agent, deriving its id and initial capability
    /// set from `card`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Invalid`] if the card name is empty,
    /// or [`DiscoveryError::AlreadyExists`] if an agent of that name is
    /// already registered.
    pub fn register_agent(
        &self,
        card: AgentCard,
        is_local: bool,
        endpoint: String,
        priority: i64,
    ) -> DiscoveryResult<AgentId> {
        if card.name().trim().is_empty() {
            return Err(DiscoveryError::invalid("agent card name cannot be empty"));
        }
        let id = card.id();
        let now = Utc::now();

        let agent = {
            let mut state = self.write();
            if state.agents.contains_key(&id) {
                return Err(DiscoveryError::already_exists(format!(
                    "agent already registered: {id}"
                )));
            }
            let agent = AgentInfo::with_default_score(
                card,
                is_local,
                endpoint,
                priority,
                self.config.default_capability_score,
                now,
            );
            for capability in agent.capabilities() {
                state.index_capability(capability);
            }
            state.agents.insert(id.clone(), agent.clone());
            agent
        };

        self.persist_save(agent);
        self.emit(DiscoveryEvent::new(EventType::AgentRegistered, id.clone()));
        Ok(id)
    }

    /// Removes an agent and every index entry it contributed.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the id is unknown.
    pub fn unregister_agent(&self, id: &AgentId) -> DiscoveryResult<()> {
        {
            let mut state = self.write();
            let agent = state
                .agents
                .remove(id)
                .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {id}")))?;
            let names: Vec<String> = agent
                .capabilities()
                .iter()
                .map(|c| c.capability().name().to_owned())
                .collect();
            state.deindex_agent(id, &names);
        }
        self.persist_delete(id.clone());
        self.emit(DiscoveryEvent::new(EventType::AgentUnregistered, id.clone()));
        Ok(())
    }

    /// Replaces an agent's card (and therefore its capability list),
    /// preserving runtime statistics for capabilities that survive by
    /// name and deindexing/reindexing the rest.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the id is unknown.
    pub fn update_agent(&self, id: &AgentId, card: AgentCard) -> DiscoveryResult<()> {
        let now = Utc::now();
        let agent = {
            let mut state = self.write();
            let existing = state
                .agents
                .get(id)
                .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {id}")))?;

            let old_names: Vec<String> = existing
                .capabilities()
                .iter()
                .map(|c| c.capability().name().to_owned())
                .collect();
            let previous: HashMap<String, CapabilityInfo> = existing
                .capabilities()
                .iter()
                .map(|c| (c.capability().name().to_owned(), c.clone()))
                .collect();
            let agent_name = card.name().to_owned();

            let new_capabilities: Vec<CapabilityInfo> = card
                .capabilities()
                .iter()
                .cloned()
                .map(|descriptor| {
                    previous.get(descriptor.name()).cloned().unwrap_or_else(|| {
                        CapabilityInfo::new(
                            descriptor,
                            id.clone(),
                            agent_name.clone(),
                            self.config.default_capability_score,
                            now,
                        )
                    })
                })
                .collect();

            state.deindex_agent(id, &old_names);

            let agent = state.agents.get_mut(id).expect("checked above");
            agent.set_card(card, now);
            agent.set_capabilities(new_capabilities, now);
            let capabilities_to_index: Vec<CapabilityInfo> = agent.capabilities().to_vec();
            let result = agent.clone();

            for capability in &capabilities_to_index {
                state.index_capability(capability);
            }
            result
        };

        self.persist_save(agent);
        self.emit(DiscoveryEvent::new(EventType::AgentUpdated, id.clone()));
        Ok(())
    }

    /// Returns a deep copy of a single agent.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the id is unknown.
    pub fn get_agent(&self, id: &AgentId) -> DiscoveryResult<AgentInfo> {
        self.read()
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {id}")))
    }

    /// Returns a deep copy of every registered agent.
    #[must_use]
    pub fn list_agents(&self) -> Vec<AgentInfo> {
        self.read().agents.values().cloned().collect()
    }

    /// Returns every agent whose status is `online`.
    #[must_use]
    pub fn get_active_agents(&self) -> Vec<AgentInfo> {
        self.read()
            .agents
            .values()
            .filter(|a| a.status() == AgentStatus::Online)
            .cloned()
            .collect()
    }

    /// Returns every agent offering `capability_name`, deduped.
    #[must_use]
    pub fn get_agents_by_capability(&self, capability_name: &str) -> Vec<AgentInfo> {
        let state = self.read();
        let Some(entries) = state.index.get(capability_name) else {
            return Vec::new();
        };
        entries
            .keys()
            .filter_map(|id| state.agents.get(id).cloned())
            .collect()
    }

    /// Sets an agent's liveness status.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the id is unknown.
    pub fn update_agent_status(&self, id: &AgentId, status: AgentStatus) -> DiscoveryResult<()> {
        let now = Utc::now();
        {
            let mut state = self.write();
            let agent = state
                .agents
                .get_mut(id)
                .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {id}")))?;
            agent.set_status(status, now);
        }
        self.emit(DiscoveryEvent::new(EventType::AgentUpdated, id.clone()));
        Ok(())
    }

    /// Sets an agent's load, propagating it to every owned capability
    /// and re-upserting each into the index.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the id is unknown.
    pub fn update_agent_load(&self, id: &AgentId, load: f64) -> DiscoveryResult<()> {
        let now = Utc::now();
        {
            let mut state = self.write();
            {
                let agent = state
                    .agents
                    .get_mut(id)
                    .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {id}")))?;
                agent.set_load(load, now);
            }
            let capabilities = state.agents[id].capabilities().to_vec();
            for capability in &capabilities {
                state.index_capability(capability);
            }
        }
        self.emit(DiscoveryEvent::new(EventType::AgentUpdated, id.clone()));
        Ok(())
    }

    /// Advances an agent's heartbeat timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the id is unknown.
    pub fn heartbeat(&self, id: &AgentId) -> DiscoveryResult<()> {
        let now = Utc::now();
        let mut state = self.write();
        let agent = state
            .agents
            .get_mut(id)
            .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {id}")))?;
        agent.heartbeat(now);
        Ok(())
    }

    // ---- capability operations -------------------------------------

    /// Adds a capability to an existing agent.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the agent is unknown, or
    /// [`DiscoveryError::AlreadyExists`] if the agent already offers a
    /// capability of that name.
    pub fn register_capability(
        &self,
        agent_id: &AgentId,
        descriptor: CapabilityDescriptor,
    ) -> DiscoveryResult<()> {
        let now = Utc::now();
        let capability = {
            let mut state = self.write();
            let agent_name = {
                let agent = state.agents.get(agent_id).ok_or_else(|| {
                    DiscoveryError::not_found(format!("agent not found: {agent_id}"))
                })?;
                if agent
                    .capabilities()
                    .iter()
                    .any(|c| c.capability().name() == descriptor.name())
                {
                    return Err(DiscoveryError::already_exists(format!(
                        "capability already registered: {}",
                        descriptor.name()
                    )));
                }
                agent.card().name().to_owned()
            };

            let info = CapabilityInfo::new(
                descriptor,
                agent_id.clone(),
                agent_name,
                self.config.default_capability_score,
                now,
            );
            let agent = state.agents.get_mut(agent_id).expect("checked above");
            agent.capabilities_mut().push(info.clone());
            state.index_capability(&info);
            info
        };

        self.emit(
            DiscoveryEvent::new(EventType::CapabilityAdded, agent_id.clone())
                .with_capability(capability.capability().clone()),
        );
        Ok(())
    }

    /// Removes a capability from an agent, dropping the empty index
    /// bucket if it was the last offering agent.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the agent or capability
    /// is unknown.
    pub fn unregister_capability(
        &self,
        agent_id: &AgentId,
        capability_name: &str,
    ) -> DiscoveryResult<()> {
        let descriptor = {
            let mut state = self.write();
            let agent = state
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {agent_id}")))?;
            let position = agent
                .capabilities()
                .iter()
                .position(|c| c.capability().name() == capability_name)
                .ok_or_else(|| {
                    DiscoveryError::not_found(format!("capability not found: {capability_name}"))
                })?;
            let removed = agent.capabilities_mut().remove(position);
            state.deindex_capability(capability_name, agent_id);
            removed.capability().clone()
        };

        self.emit(
            DiscoveryEvent::new(EventType::CapabilityRemoved, agent_id.clone())
                .with_capability(descriptor),
        );
        Ok(())
    }

    /// Replaces a capability's descriptor, preserving its
    /// `registered_at` timestamp and runtime statistics.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the agent or capability
    /// is unknown.
    pub fn update_capability(
        &self,
        agent_id: &AgentId,
        capability_name: &str,
        descriptor: CapabilityDescriptor,
    ) -> DiscoveryResult<()> {
        let now = Utc::now();
        let updated = {
            let mut state = self.write();
            let agent = state
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {agent_id}")))?;
            let existing = agent
                .capabilities_mut()
                .iter_mut()
                .find(|c| c.capability().name() == capability_name)
                .ok_or_else(|| {
                    DiscoveryError::not_found(format!("capability not found: {capability_name}"))
                })?;
            existing.set_descriptor(descriptor, now);
            let updated = existing.clone();

            if updated.capability().name() != capability_name {
                state.deindex_capability(capability_name, agent_id);
            }
            state.index_capability(&updated);
            updated
        };

        self.emit(
            DiscoveryEvent::new(EventType::CapabilityUpdated, agent_id.clone())
                .with_capability(updated.capability().clone()),
        );
        Ok(())
    }

    /// Returns a deep copy of a single capability owned by an agent.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the agent or capability
    /// is unknown.
    pub fn get_capability(
        &self,
        agent_id: &AgentId,
        capability_name: &str,
    ) -> DiscoveryResult<CapabilityInfo> {
        self.read()
            .agents
            .get(agent_id)
            .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {agent_id}")))?
            .capabilities()
            .iter()
            .find(|c| c.capability().name() == capability_name)
            .cloned()
            .ok_or_else(|| DiscoveryError::not_found(format!("capability not found: {capability_name}")))
    }

    /// Returns every capability owned by an agent.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the agent is unknown.
    pub fn list_capabilities(&self, agent_id: &AgentId) -> DiscoveryResult<Vec<CapabilityInfo>> {
        Ok(self
            .read()
            .agents
            .get(agent_id)
            .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {agent_id}")))?
            .capabilities()
            .to_vec())
    }

    /// Returns every `CapabilityInfo` registered under an exact
    /// capability name, one per offering agent.
    #[must_use]
    pub fn find_capabilities(&self, capability_name: &str) -> Vec<CapabilityInfo> {
        self.read()
            .index
            .get(capability_name)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Records the outcome of one execution of `capability_name` by
    /// `agent_id`, updating its statistics and re-upserting it into the
    /// index so index readers observe the new score immediately.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if the (agent, capability)
    /// pair is unknown.
    pub fn record_execution(
        &self,
        agent_id: &AgentId,
        capability_name: &str,
        success: bool,
        latency: std::time::Duration,
    ) -> DiscoveryResult<()> {
        let now = Utc::now();
        let updated = {
            let mut state = self.write();
            let agent = state
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| DiscoveryError::not_found(format!("agent not found: {agent_id}")))?;
            let capability = agent
                .capabilities_mut()
                .iter_mut()
                .find(|c| c.capability().name() == capability_name)
                .ok_or_else(|| {
                    DiscoveryError::not_found(format!("capability not found: {capability_name}"))
                })?;
            capability.record_execution(success, latency, now);
            let updated = capability.clone();
            state.index_capability(&updated);
            updated
        };

        self.emit(
            DiscoveryEvent::new(EventType::CapabilityUpdated, agent_id.clone())
                .with_capability(updated.capability().clone()),
        );
        Ok(())
    }

    // ---- subscriptions ----------------------------------------------

    /// Registers an event handler, dispatched on its own task per
    /// event (spec.md §5).
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    /// Removes a previously registered handler.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.events.unsubscribe(id);
    }

    /// Stops accepting new background work (event dispatch, store
    /// writes). Already-dispatched tasks are allowed to complete.
    pub fn close(&self) {
        self.scheduler.close();
    }
}
