//! Discovery events broadcast to registry subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::card::CapabilityDescriptor;
use crate::ids::AgentId;

/// Kind of state change being announced.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A new agent was registered.
    AgentRegistered,
    /// An agent was removed.
    AgentUnregistered,
    /// An agent's status, load, or capability list changed.
    AgentUpdated,
    /// A capability was added to an agent.
    CapabilityAdded,
    /// A capability was removed from an agent.
    CapabilityRemoved,
    /// A capability's runtime state changed.
    CapabilityUpdated,
    /// A health probe crossed the unhealthy threshold.
    HealthCheckFailed,
    /// A previously unhealthy agent passed a health probe.
    HealthCheckRecovered,
}

/// A single observable registry state change (spec.md §3).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryEvent {
    event_type: EventType,
    agent_id: AgentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capability: Option<CapabilityDescriptor>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
    timestamp: DateTime<Utc>,
}

impl DiscoveryEvent {
    /// Creates a new event with the current timestamp.
    #[must_use]
    pub fn new(event_type: EventType, agent_id: AgentId) -> Self {
        Self {
            event_type,
            agent_id,
            capability: None,
            data: Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Creates a new event with an explicit timestamp, used by callers
    /// that need deterministic ordering in tests.
    #[must_use]
    pub fn with_timestamp(event_type: EventType, agent_id: AgentId, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            agent_id,
            capability: None,
            data: Value::Null,
            timestamp,
        }
    }

    /// Attaches the capability descriptor this event concerns.
    #[must_use]
    pub fn with_capability(mut self, capability: CapabilityDescriptor) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Attaches an opaque JSON payload.
    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Returns the event kind.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.event_type
    }

    /// Returns the agent this event concerns.
    #[must_use]
    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    /// Returns the capability this event concerns, if any.
    #[must_use]
    pub fn capability(&self) -> Option<&CapabilityDescriptor> {
        self.capability.as_ref()
    }

    /// Returns the opaque data payload.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Returns when the event was emitted.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_json() {
        let event = DiscoveryEvent::new(EventType::AgentRegistered, AgentId::new("x"))
            .with_data(serde_json::json!({"note": "hi"}));
        let json = serde_json::to_string(&event).unwrap();
        let decoded: DiscoveryEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.event_type(), EventType::AgentRegistered);
        assert_eq!(decoded.agent_id().as_str(), "x");
        assert_eq!(decoded.data()["note"], "hi");
    }
}
