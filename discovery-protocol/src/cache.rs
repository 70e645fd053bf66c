//! In-process local cache of announced agents, keyed by `card.name`
//! (spec.md §4.5).

use std::collections::HashMap;
use std::sync::RwLock;

use discovery_core::AgentInfo;

use crate::model::AgentFilter;

/// `card.name -> AgentInfo` table shared by the HTTP server, multicast
/// listener, and `Discover`/`Announce` calls.
#[derive(Default)]
pub struct LocalCache {
    agents: RwLock<HashMap<String, AgentInfo>>,
}

impl LocalCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the cached entry for `agent.card().name()`.
    pub fn upsert(&self, agent: AgentInfo) {
        self.agents
            .write()
            .expect("local cache poisoned")
            .insert(agent.card().name().to_owned(), agent);
    }

    /// Returns the cached entry for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<AgentInfo> {
        self.agents.read().expect("local cache poisoned").get(name).cloned()
    }

    /// Removes the cached entry for `name`.
    pub fn remove(&self, name: &str) {
        self.agents.write().expect("local cache poisoned").remove(name);
    }

    /// Returns every cached agent matching `filter`.
    #[must_use]
    pub fn matching(&self, filter: &AgentFilter) -> Vec<AgentInfo> {
        self.agents
            .read()
            .expect("local cache poisoned")
            .values()
            .filter(|agent| matches_filter(agent, filter))
            .cloned()
            .collect()
    }

    /// Returns every cached agent.
    #[must_use]
    pub fn all(&self) -> Vec<AgentInfo> {
        self.agents.read().expect("local cache poisoned").values().cloned().collect()
    }
}

/// Shared filter predicate used by the local cache, the registry-backed
/// path, and the multicast-observed path of `Discover` (spec.md §4.5
/// "Filter semantics").
#[must_use]
pub fn matches_filter(agent: &AgentInfo, filter: &AgentFilter) -> bool {
    if filter.local && !agent.is_local() {
        return false;
    }
    if filter.remote && agent.is_local() {
        return false;
    }
    if !filter.status.is_empty() && !filter.status.contains(&agent.status()) {
        return false;
    }
    if !filter.capabilities.is_empty() {
        let names: Vec<&str> = agent.capabilities().iter().map(|c| c.capability().name()).collect();
        if !filter
            .capabilities
            .iter()
            .all(|required| names.iter().any(|name| name.eq_ignore_ascii_case(required)))
        {
            return false;
        }
    }
    if !filter.tags.is_empty() {
        let tags: Vec<&str> = agent
            .capabilities()
            .iter()
            .flat_map(|c| c.tags().iter().map(String::as_str))
            .collect();
        if !filter
            .tags
            .iter()
            .all(|required| tags.iter().any(|tag| tag.eq_ignore_ascii_case(required)))
        {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::{AgentCard, CapabilityDescriptor, CapabilityType};

    fn agent(name: &str, is_local: bool) -> AgentInfo {
        let card = AgentCard::new(
            name,
            "",
            "",
            "1.0.0",
            vec![CapabilityDescriptor::new("search", "", CapabilityType::Task).unwrap()],
        )
        .unwrap();
        AgentInfo::new(card, is_local, String::new(), 0)
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let cache = LocalCache::new();
        cache.upsert(agent("a1", true));
        assert!(cache.get("a1").is_some());
        assert!(cache.get("missing").is_none());
    }

    #[test]
    fn local_filter_excludes_remote_agents() {
        let cache = LocalCache::new();
        cache.upsert(agent("local", true));
        cache.upsert(agent("remote", false));
        let filter = AgentFilter { local: true, ..Default::default() };
        let results = cache.matching(&filter);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].card().name(), "local");
    }

    #[test]
    fn capability_filter_requires_exact_name() {
        let cache = LocalCache::new();
        cache.upsert(agent("a1", true));
        let filter = AgentFilter {
            capabilities: vec!["search".into()],
            ..Default::default()
        };
        assert_eq!(cache.matching(&filter).len(), 1);

        let filter = AgentFilter {
            capabilities: vec!["nonexistent".into()],
            ..Default::default()
        };
        assert!(cache.matching(&filter).is_empty());
    }

    #[test]
    fn remove_deletes_entry() {
        let cache = LocalCache::new();
        cache.upsert(agent("a1", true));
        cache.remove("a1");
        assert!(cache.get("a1").is_none());
    }
}
