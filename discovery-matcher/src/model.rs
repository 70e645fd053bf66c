//! Request/result value types for matching (spec.md §4.3).

use std::time::Duration;

use discovery_core::{AgentId, CapabilityDescriptor};
use serde::{Deserialize, Serialize};

/// Selection strategy applied to the filtered, scored candidate list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Descending by final score.
    BestMatch,
    /// Ascending by agent load, tiebreak descending by score.
    LeastLoaded,
    /// Descending by sum of matched capability scores.
    HighestScore,
    /// Random permutation of the survivors (stateless shuffle).
    RoundRobin,
    /// Random permutation of the survivors.
    Random,
}

impl Default for MatchStrategy {
    fn default() -> Self {
        Self::BestMatch
    }
}

/// A request to locate agents able to perform a task.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MatchRequest {
    /// Capability names every candidate must satisfy.
    pub required_capabilities: Vec<String>,
    /// Capability names that earn a scoring bonus but are not required.
    #[serde(default)]
    pub preferred_capabilities: Vec<String>,
    /// Tags that must appear on at least one matched capability.
    #[serde(default)]
    pub required_tags: Vec<String>,
    /// Free-text task description used for semantic scoring.
    #[serde(default)]
    pub task_description: String,
    /// Agent names excluded from consideration.
    #[serde(default)]
    pub excluded_agents: Vec<String>,
    /// Upper bound on agent load; `0.0` disables the filter.
    #[serde(default)]
    pub max_load: f64,
    /// Score floor; the effective floor is `max(min_score, configured)`.
    #[serde(default)]
    pub min_score: f64,
    /// Result ordering strategy; `None` uses the configured default.
    #[serde(default)]
    pub strategy: Option<MatchStrategy>,
    /// Maximum number of results; `0` uses the configured default.
    #[serde(default)]
    pub limit: usize,
    /// Overall time budget for the match; `None` uses the configured default.
    #[serde(default)]
    pub timeout: Option<Duration>,
}

/// One candidate's outcome of a [`MatchRequest`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchResult {
    /// The matched agent's id.
    pub agent_id: AgentId,
    /// Final clamped score in `[0, 100]`.
    pub score: f64,
    /// Capabilities that satisfied a required or preferred slot.
    pub matched_capabilities: Vec<CapabilityDescriptor>,
    /// Human-readable explanation, rule descriptions joined by "; ".
    pub reason: String,
}

/// Tunables for scoring and defaults (spec.md §6 "Matcher").
#[derive(Clone, Debug)]
pub struct MatcherConfig {
    /// Strategy used when a request does not specify one explicitly.
    pub default_strategy: MatchStrategy,
    /// Result count used when `request.limit == 0`.
    pub default_limit: usize,
    /// Time budget used when `request.timeout` is `None`.
    pub default_timeout: Duration,
    /// Registry-wide score floor, combined with the request's via `max`.
    pub min_score_threshold: f64,
    /// Weight applied to the load penalty term.
    pub load_weight: f64,
    /// Weight applied to the capability-quality bonus term.
    pub score_weight: f64,
    /// Weight applied to the latency penalty term.
    pub latency_weight: f64,
    /// Whether the semantic task-description overlap term is computed.
    pub enable_semantic_matching: bool,
    /// Minimum semantic overlap score required to earn its bonus.
    pub semantic_similarity_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            default_strategy: MatchStrategy::BestMatch,
            default_limit: 10,
            default_timeout: Duration::from_secs(5),
            min_score_threshold: 0.0,
            load_weight: 0.3,
            score_weight: 0.5,
            latency_weight: 0.2,
            enable_semantic_matching: true,
            semantic_similarity_threshold: 0.5,
        }
    }
}
