//! Identity and runtime state of a registered agent.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::CapabilityInfo;
use crate::card::AgentCard;
use crate::ids::AgentId;

/// Liveness/availability state of an agent (spec.md §3).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Serving normally.
    Online,
    /// Serving but at or near capacity.
    Busy,
    /// Failed health checks past the configured threshold.
    Unhealthy,
    /// Unregistered or known to be down.
    Offline,
}

/// Identity and runtime state of an agent (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentInfo {
    card: AgentCard,
    status: AgentStatus,
    capabilities: Vec<CapabilityInfo>,
    load: f64,
    priority: i64,
    endpoint: String,
    is_local: bool,
    registered_at: DateTime<Utc>,
    last_heartbeat: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    metadata: HashMap<String, String>,
}

impl AgentInfo {
    /// Constructs a new agent at registration time, deriving one
    /// [`CapabilityInfo`] per capability advertised on the card, each
    /// starting at `default_capability_score`.
    #[must_use]
    pub fn new(card: AgentCard, is_local: bool, endpoint: String, priority: i64) -> Self {
        Self::with_default_score(card, is_local, endpoint, priority, 50.0, Utc::now())
    }

    /// Constructs a new agent, allowing the caller to control the
    /// default capability score and registration timestamp (used by the
    /// registry, which threads its configured default through).
    #[must_use]
    pub fn with_default_score(
        card: AgentCard,
        is_local: bool,
        endpoint: String,
        priority: i64,
        default_capability_score: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let agent_id = card.id();
        let agent_name = card.name().to_owned();
        let capabilities = card
            .capabilities()
            .iter()
            .cloned()
            .map(|descriptor| {
                CapabilityInfo::new(
                    descriptor,
                    agent_id.clone(),
                    agent_name.clone(),
                    default_capability_score,
                    now,
                )
            })
            .collect();

        Self {
            card,
            status: AgentStatus::Online,
            capabilities,
            load: 0.0,
            priority,
            endpoint,
            is_local,
            registered_at: now,
            last_heartbeat: now,
            metadata: HashMap::new(),
        }
    }

    /// Returns the agent's unique identifier (its card name).
    #[must_use]
    pub fn id(&self) -> AgentId {
        self.card.id()
    }

    /// Returns the agent's card.
    #[must_use]
    pub const fn card(&self) -> &AgentCard {
        &self.card
    }

    /// Replaces the agent's card and advances `last_heartbeat`. The
    /// caller is responsible for keeping the capability list (and the
    /// registry's index) consistent with the new card.
    pub fn set_card(&mut self, card: AgentCard, now: DateTime<Utc>) {
        self.card = card;
        self.last_heartbeat = now;
    }

    /// Returns the current status.
    #[must_use]
    pub const fn status(&self) -> AgentStatus {
        self.status
    }

    /// Sets the status and advances `last_heartbeat`.
    pub fn set_status(&mut self, status: AgentStatus, now: DateTime<Utc>) {
        self.status = status;
        self.last_heartbeat = now;
    }

    /// Returns the agent's capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[CapabilityInfo] {
        &self.capabilities
    }

    /// Returns a mutable view of the agent's capabilities.
    pub fn capabilities_mut(&mut self) -> &mut Vec<CapabilityInfo> {
        &mut self.capabilities
    }

    /// Replaces the capability list wholesale (used by `UpdateAgent`).
    pub fn set_capabilities(&mut self, capabilities: Vec<CapabilityInfo>, now: DateTime<Utc>) {
        self.capabilities = capabilities;
        self.last_heartbeat = now;
    }

    /// Returns the current load in `[0, 1]`.
    #[must_use]
    pub const fn load(&self) -> f64 {
        self.load
    }

    /// Updates the load, clamping to `[0, 1]`, propagating to every
    /// owned capability, and advancing `last_heartbeat`.
    pub fn set_load(&mut self, load: f64, now: DateTime<Utc>) {
        self.load = load.clamp(0.0, 1.0);
        for capability in &mut self.capabilities {
            capability.set_load(self.load, now);
        }
        self.last_heartbeat = now;
    }

    /// Returns the advisory scheduling priority.
    #[must_use]
    pub const fn priority(&self) -> i64 {
        self.priority
    }

    /// Returns the agent's endpoint, empty for in-process agents.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns whether this agent is local (heartbeat-checked) or
    /// remote (HTTP-probed).
    #[must_use]
    pub const fn is_local(&self) -> bool {
        self.is_local
    }

    /// Returns the registration timestamp.
    #[must_use]
    pub const fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Returns the timestamp of the most recent status/load/heartbeat
    /// update.
    #[must_use]
    pub const fn last_heartbeat(&self) -> DateTime<Utc> {
        self.last_heartbeat
    }

    /// Advances `last_heartbeat` without otherwise mutating state.
    pub fn heartbeat(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat = now;
    }

    /// Returns whether `last_heartbeat` is older than `staleness`,
    /// i.e. the agent is due for a local-health failure
    /// (spec.md §3: `health_check_interval × 3`).
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>, staleness: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_heartbeat) > staleness
    }

    /// Returns the agent's metadata map.
    #[must_use]
    pub const fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    /// Replaces the agent's metadata map.
    pub fn set_metadata(&mut self, metadata: HashMap<String, String>) {
        self.metadata = metadata;
    }
}
