//! `AgentCard`: the opaque identity+description value carried by an
//! [`crate::AgentInfo`]. This intentionally mirrors only the fields the
//! discovery service consumes from the broader agent framework's A2A
//! `AgentCard` (name, description, url, version, capability list); the
//! rest of that protocol is out of scope here.

use serde::{Deserialize, Serialize};

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::ids::AgentId;

/// Kind of work a capability performs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityType {
    /// A discrete unit of work with a terminal result.
    Task,
    /// A read-only lookup.
    Query,
    /// A capability that emits a sequence of results over time.
    Stream,
}

/// The capability shape advertised inside an [`AgentCard`], before any
/// registry-assigned runtime state (score, load, statistics) exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    name: String,
    description: String,
    #[serde(rename = "type")]
    kind: CapabilityType,
}

impl CapabilityDescriptor {
    /// Creates a new capability descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Invalid`] if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        kind: CapabilityType,
    ) -> DiscoveryResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DiscoveryError::invalid("capability name cannot be empty"));
        }
        Ok(Self {
            name,
            description: description.into(),
            kind,
        })
    }

    /// Returns the capability name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the capability kind.
    #[must_use]
    pub const fn kind(&self) -> CapabilityType {
        self.kind
    }
}

/// Identity and description of an agent, as carried by an [`crate::AgentInfo`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentCard {
    name: String,
    description: String,
    url: String,
    version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    capabilities: Vec<CapabilityDescriptor>,
}

impl AgentCard {
    /// Creates a new agent card.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Invalid`] if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        version: impl Into<String>,
        capabilities: Vec<CapabilityDescriptor>,
    ) -> DiscoveryResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DiscoveryError::invalid("agent card name cannot be empty"));
        }
        Ok(Self {
            name,
            description: description.into(),
            url: url.into(),
            version: version.into(),
            capabilities,
        })
    }

    /// Returns the agent's unique identifier, derived from its name.
    #[must_use]
    pub fn id(&self) -> AgentId {
        AgentId::new(self.name.clone())
    }

    /// Returns the agent name (also its unique id).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the human-readable description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the agent's endpoint URL, empty for in-process agents.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the agent's version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the capability list advertised by this card.
    #[must_use]
    pub fn capabilities(&self) -> &[CapabilityDescriptor] {
        &self.capabilities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capability() -> CapabilityDescriptor {
        CapabilityDescriptor::new("code_review", "Reviews code", CapabilityType::Task).unwrap()
    }

    #[test]
    fn card_id_matches_name() {
        let card = AgentCard::new("coder", "A coding agent", "", "1.0.0", vec![capability()])
            .unwrap();
        assert_eq!(card.id().as_str(), "coder");
    }

    #[test]
    fn empty_name_rejected() {
        let err = AgentCard::new("", "desc", "", "1.0.0", vec![]).unwrap_err();
        assert!(matches!(err, DiscoveryError::Invalid(_)));
    }

    #[test]
    fn capability_round_trips_json() {
        let cap = capability();
        let json = serde_json::to_string(&cap).unwrap();
        let decoded: CapabilityDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(cap, decoded);
    }
}
