//! Request/result value types for composition (spec.md §4.4).

use std::collections::HashMap;
use std::time::Duration;

use discovery_core::{AgentId, AgentInfo};
use serde::{Deserialize, Serialize};

/// A capability's declared resource needs (spec.md §4.4
/// `RegisterResourceRequirement`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceRequirement {
    /// The capability this requirement describes.
    pub name: String,
    /// CPU cores requested.
    pub cpu: f64,
    /// Memory in megabytes requested.
    pub memory: f64,
    /// GPU units requested.
    pub gpu: f64,
    /// Named resources this capability needs exclusive access to.
    pub exclusive_resources: Vec<String>,
}

/// Kind of conflict detected between requested capabilities.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    /// Two or more capabilities belong to the same exclusive group.
    Exclusive,
    /// Two or more capabilities contend for the same exclusive resource.
    Resource,
    /// A capability's dependency graph contains a cycle.
    Dependency,
}

/// One detected conflict among requested capabilities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conflict {
    /// The kind of conflict.
    pub kind: ConflictType,
    /// Capability names involved.
    pub capabilities: Vec<String>,
    /// Human-readable resolution hint; `None` means unresolvable.
    pub resolution: Option<String>,
}

/// A request to assemble a set of agents covering `required_capabilities`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompositionRequest {
    /// Capability names the composition must cover.
    pub required_capabilities: Vec<String>,
    /// Allow composition to proceed despite missing capabilities or
    /// unresolved conflicts.
    #[serde(default)]
    pub allow_partial: bool,
    /// Cap on the number of agents in the result; `0` disables the cap.
    #[serde(default)]
    pub max_agents: usize,
    /// Overall time budget; `None` uses the configured default.
    #[serde(default)]
    pub timeout: Option<Duration>,
}

/// The outcome of a successful (or allowed-partial) composition.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompositionResult {
    /// Every agent selected to cover at least one working capability.
    pub agents: Vec<AgentInfo>,
    /// Capability name to the agent selected to provide it.
    pub capability_map: HashMap<String, AgentId>,
    /// Capability names in prerequisite-before-dependent order.
    pub execution_order: Vec<String>,
    /// Capabilities in the working set with no offering agent.
    pub missing_capabilities: Vec<String>,
    /// Conflicts detected in the working set, including resolved ones.
    pub conflicts: Vec<Conflict>,
}

/// Tunables for composition (spec.md §6 "Composer").
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Maximum transitive-prerequisite depth before `LimitExceeded`.
    pub max_composition_depth: usize,
    /// Time budget used when `request.timeout` is `None`.
    pub default_timeout: Duration,
    /// Whether an unresolvable conflict is tolerated rather than fatal.
    pub allow_partial_composition: bool,
    /// Whether `DetectConflicts` runs during `Compose`.
    pub enable_conflict_detection: bool,
    /// Whether transitive prerequisite resolution runs during `Compose`.
    pub enable_dependency_resolution: bool,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            max_composition_depth: 10,
            default_timeout: Duration::from_secs(10),
            allow_partial_composition: false,
            enable_conflict_detection: true,
            enable_dependency_resolution: true,
        }
    }
}
