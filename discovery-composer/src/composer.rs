//! Top-level composer: conflict detection and the `Compose` algorithm
//! (spec.md §4.4).

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use discovery_core::{AgentId, AgentInfo, DiscoveryError, DiscoveryResult};
use discovery_registry::Registry;

use crate::dependency::DependencyGraph;
use crate::model::{
    Conflict, ConflictType, ComposerConfig, CompositionRequest, CompositionResult,
    ResourceRequirement,
};

/// Dependency resolution, conflict detection, and composition.
pub struct Composer {
    config: ComposerConfig,
    dependencies: DependencyGraph,
    exclusive_groups: RwLock<Vec<Vec<String>>>,
    resources: RwLock<HashMap<String, ResourceRequirement>>,
}

impl Composer {
    /// Creates an empty composer.
    #[must_use]
    pub fn new(config: ComposerConfig) -> Self {
        Self {
            config,
            dependencies: DependencyGraph::new(),
            exclusive_groups: RwLock::new(Vec::new()),
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Registers that `name` requires `prerequisites`.
    pub fn register_dependency(&self, name: &str, prerequisites: Vec<String>) {
        self.dependencies.register(name, prerequisites);
    }

    /// Registers a set of mutually exclusive capability names.
    pub fn register_exclusive_group(&self, names: Vec<String>) {
        self.exclusive_groups
            .write()
            .expect("composer poisoned")
            .push(names);
    }

    /// Registers a capability's resource needs.
    pub fn register_resource_requirement(&self, requirement: ResourceRequirement) {
        self.resources
            .write()
            .expect("composer poisoned")
            .insert(requirement.name.to_lowercase(), requirement);
    }

    /// Resolves the transitive prerequisites of every name in `names`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::LimitExceeded`] if a chain exceeds the
    /// configured `max_composition_depth`.
    pub fn resolve_dependencies(
        &self,
        names: &[String],
    ) -> DiscoveryResult<HashMap<String, Vec<String>>> {
        self.dependencies.resolve(names, self.config.max_composition_depth)
    }

    /// Detects exclusive-group, resource, and dependency-cycle
    /// conflicts among `names`.
    #[must_use]
    pub fn detect_conflicts(&self, names: &[String]) -> Vec<Conflict> {
        let mut conflicts = Vec::new();
        let lower: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();

        for group in self.exclusive_groups.read().expect("composer poisoned").iter() {
            let matched: Vec<String> = group
                .iter()
                .filter(|member| lower.contains(&member.to_lowercase()))
                .cloned()
                .collect();
            if matched.len() >= 2 {
                conflicts.push(Conflict {
                    kind: ConflictType::Exclusive,
                    capabilities: matched.clone(),
                    resolution: Some(format!("select only one of: {}", matched.join(", "))),
                });
            }
        }

        let resources = self.resources.read().expect("composer poisoned");
        let mut exclusive_resource_claimants: HashMap<String, Vec<String>> = HashMap::new();
        for name in names {
            if let Some(requirement) = resources.get(&name.to_lowercase()) {
                for resource in &requirement.exclusive_resources {
                    exclusive_resource_claimants
                        .entry(resource.clone())
                        .or_default()
                        .push(name.clone());
                }
            }
        }
        for (resource, claimants) in exclusive_resource_claimants {
            if claimants.len() >= 2 {
                conflicts.push(Conflict {
                    kind: ConflictType::Resource,
                    capabilities: claimants,
                    resolution: Some(format!("capabilities contend for exclusive resource: {resource}")),
                });
            }
        }

        for name in names {
            if self.dependencies.has_cycle_from(name) {
                conflicts.push(Conflict {
                    kind: ConflictType::Dependency,
                    capabilities: vec![name.clone()],
                    resolution: None,
                });
            }
        }

        conflicts
    }

    /// Assembles a set of agents covering `request.required_capabilities`,
    /// resolving dependencies, detecting conflicts, and computing an
    /// execution order.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Invalid`] if `required_capabilities` is
    /// empty, [`DiscoveryError::LimitExceeded`] if dependency resolution
    /// exceeds the configured depth, [`DiscoveryError::Conflict`] if an
    /// unresolvable conflict is found and partial composition is not
    /// allowed, or [`DiscoveryError::Incomplete`] if capabilities remain
    /// unfulfilled and partial composition is not allowed.
    pub async fn compose(
        &self,
        registry: &Registry,
        request: &CompositionRequest,
    ) -> DiscoveryResult<CompositionResult> {
        if request.required_capabilities.is_empty() {
            return Err(DiscoveryError::invalid("required_capabilities cannot be empty"));
        }

        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        tokio::time::timeout(timeout, async { self.compose_inner(registry, request) })
            .await
            .map_err(|_| DiscoveryError::Timeout("composition request exceeded timeout".into()))?
    }

    fn compose_inner(
        &self,
        registry: &Registry,
        request: &CompositionRequest,
    ) -> DiscoveryResult<CompositionResult> {
        let allow_partial = request.allow_partial || self.config.allow_partial_composition;

        let mut working_set: Vec<String> = request.required_capabilities.clone();
        let mut seen: HashSet<String> = working_set.iter().map(|n| n.to_lowercase()).collect();

        if self.config.enable_dependency_resolution {
            for name in &request.required_capabilities {
                let prerequisites = self
                    .dependencies
                    .transitive_prerequisites(name, self.config.max_composition_depth)?;
                for prerequisite in prerequisites {
                    if seen.insert(prerequisite.to_lowercase()) {
                        working_set.push(prerequisite);
                    }
                }
            }
        }

        let mut conflicts = Vec::new();
        if self.config.enable_conflict_detection {
            conflicts = self.detect_conflicts(&working_set);
            let unresolvable = conflicts.iter().any(|c| c.resolution.is_none());
            if unresolvable && !allow_partial {
                return Err(DiscoveryError::Conflict(
                    "composition has an unresolvable conflict".into(),
                ));
            }
        }

        let mut capability_map: HashMap<String, AgentId> = HashMap::new();
        let mut agents: HashMap<AgentId, AgentInfo> = HashMap::new();
        let mut missing = Vec::new();

        for capability in &working_set {
            let candidates = registry.find_capabilities(capability);
            if candidates.is_empty() {
                missing.push(capability.clone());
                continue;
            }
            let best = candidates
                .iter()
                .min_by(|a, b| {
                    b.score()
                        .partial_cmp(&a.score())
                        .unwrap()
                        .then_with(|| a.load().partial_cmp(&b.load()).unwrap())
                })
                .expect("non-empty");
            capability_map.insert(capability.clone(), best.agent_id().clone());
            if let Ok(agent) = registry.get_agent(best.agent_id()) {
                agents.insert(agent.id(), agent);
            }
        }

        if !missing.is_empty() && !allow_partial {
            return Err(DiscoveryError::Incomplete(format!(
                "missing capabilities: {}",
                missing.join(", ")
            )));
        }

        if request.max_agents > 0 && agents.len() > request.max_agents {
            let mut provided_count: HashMap<AgentId, usize> = HashMap::new();
            for id in capability_map.values() {
                *provided_count.entry(id.clone()).or_insert(0) += 1;
            }
            let mut ranked: Vec<AgentId> = agents.keys().cloned().collect();
            ranked.sort_by(|a, b| {
                provided_count.get(b).unwrap_or(&0).cmp(provided_count.get(a).unwrap_or(&0))
            });
            let retained: HashSet<AgentId> = ranked.into_iter().take(request.max_agents).collect();
            agents.retain(|id, _| retained.contains(id));
            capability_map.retain(|_, id| retained.contains(id));
        }

        let execution_order = self.dependencies.topological_order(&working_set);

        Ok(CompositionResult {
            agents: agents.into_values().collect(),
            capability_map,
            execution_order,
            missing_capabilities: missing,
            conflicts,
        })
    }
}
