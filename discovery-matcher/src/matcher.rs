//! Candidate filtering, scoring, and strategy ordering (spec.md §4.3).

use std::collections::HashMap;
use std::sync::Mutex;

use discovery_core::{AgentId, AgentInfo, AgentStatus, CapabilityDescriptor, CapabilityInfo};
use discovery_core::{DiscoveryError, DiscoveryResult};
use discovery_registry::Registry;
use rand::seq::SliceRandom;
use rand::thread_rng;

use crate::model::{MatchRequest, MatchResult, MatcherConfig, MatchStrategy};
use crate::semantic;

struct Candidate {
    agent_id: AgentId,
    load: f64,
    score: f64,
    matched_descriptors: Vec<CapabilityDescriptor>,
    matched_infos: Vec<CapabilityInfo>,
    reason: String,
}

impl Candidate {
    fn into_result(self) -> MatchResult {
        MatchResult {
            agent_id: self.agent_id,
            score: self.score,
            matched_capabilities: self.matched_descriptors,
            reason: self.reason,
        }
    }
}

fn capability_name_matches(required: &str, candidate_name: &str) -> bool {
    if required.is_empty() {
        return false;
    }
    candidate_name.to_lowercase().contains(&required.to_lowercase())
}

fn find_capability_match<'a>(agent: &'a AgentInfo, required_name: &str) -> Option<&'a CapabilityInfo> {
    agent
        .capabilities()
        .iter()
        .find(|info| capability_name_matches(required_name, info.capability().name()))
}

/// Appends every capability matching a name in `names` to `matched`
/// (deduped by descriptor), returning how many of `names` found a
/// match.
fn gather_matches(agent: &AgentInfo, names: &[String], matched: &mut Vec<CapabilityInfo>) -> usize {
    let mut found = 0;
    for name in names {
        if let Some(info) = find_capability_match(agent, name) {
            found += 1;
            if !matched.iter().any(|m| m.capability() == info.capability()) {
                matched.push(info.clone());
            }
        }
    }
    found
}

struct Evaluation {
    score: f64,
    required_satisfied: bool,
    tags_satisfied: bool,
    matched: Vec<CapabilityInfo>,
    reason: String,
}

/// The weighted scoring engine and strategy selector.
pub struct Matcher {
    config: MatcherConfig,
    round_robin_cursors: Mutex<HashMap<String, usize>>,
}

impl Matcher {
    /// Creates a matcher with the given configuration.
    #[must_use]
    pub fn new(config: MatcherConfig) -> Self {
        Self {
            config,
            round_robin_cursors: Mutex::new(HashMap::new()),
        }
    }

    fn evaluate(&self, agent: &AgentInfo, request: &MatchRequest) -> Evaluation {
        let mut matched = Vec::new();
        let required_found = gather_matches(agent, &request.required_capabilities, &mut matched);
        let required_satisfied = required_found == request.required_capabilities.len();

        let preferred_found = gather_matches(agent, &request.preferred_capabilities, &mut matched);

        let tags_satisfied = request.required_tags.is_empty()
            || request.required_tags.iter().all(|tag| {
                matched
                    .iter()
                    .any(|info| info.tags().iter().any(|t| t.eq_ignore_ascii_case(tag)))
            });

        let mut score = 0.0f64;
        let mut reasons = Vec::new();

        if required_satisfied && !request.required_capabilities.is_empty() {
            score += 40.0;
            reasons.push("required capabilities matched".to_owned());
        }

        if !request.preferred_capabilities.is_empty() {
            let fraction = preferred_found as f64 / request.preferred_capabilities.len() as f64;
            score += 20.0 * fraction;
            if preferred_found > 0 {
                reasons.push(format!(
                    "preferred capabilities matched ({preferred_found}/{})",
                    request.preferred_capabilities.len()
                ));
            }
        }

        if !request.required_tags.is_empty() && tags_satisfied {
            score += 10.0;
            reasons.push("required tags matched".to_owned());
        }

        if self.config.enable_semantic_matching && !request.task_description.is_empty() {
            let mut descriptions = vec![agent.card().description()];
            descriptions.extend(matched.iter().map(|info| info.capability().description()));
            let (semantic_score, confidence) =
                semantic::overlap_score(&request.task_description, &descriptions);
            if semantic_score > self.config.semantic_similarity_threshold {
                score += semantic_score * 20.0;
                reasons.push(format!(
                    "semantic match (score={semantic_score:.2}, confidence={confidence:.2})"
                ));
            }
        }

        if !matched.is_empty() {
            let avg_quality: f64 =
                matched.iter().map(CapabilityInfo::score).sum::<f64>() / matched.len() as f64;
            score += (avg_quality / 100.0) * self.config.score_weight * 10.0;
            reasons.push("capability quality bonus".to_owned());
        }

        let load_penalty = agent.load() * self.config.load_weight * 10.0;
        if load_penalty > 0.0 {
            score -= load_penalty;
            reasons.push("load penalty".to_owned());
        }

        if !matched.is_empty() {
            let avg_latency_secs: f64 = matched
                .iter()
                .map(|info| info.avg_latency().as_secs_f64())
                .sum::<f64>()
                / matched.len() as f64;
            let latency_penalty = avg_latency_secs * self.config.latency_weight * 5.0;
            if latency_penalty > 0.0 {
                score -= latency_penalty;
                reasons.push("latency penalty".to_owned());
            }
        }

        Evaluation {
            score: score.clamp(0.0, 100.0),
            required_satisfied,
            tags_satisfied,
            matched,
            reason: reasons.join("; "),
        }
    }

    /// Computes the raw score of `agent` against `request`, independent
    /// of the candidate filter pipeline.
    #[must_use]
    pub fn score(&self, agent: &AgentInfo, request: &MatchRequest) -> f64 {
        self.evaluate(agent, request).score
    }

    fn evaluate_candidate(&self, agent: &AgentInfo, request: &MatchRequest) -> Option<Candidate> {
        let id = agent.id();

        if request
            .excluded_agents
            .iter()
            .any(|excluded| excluded == id.as_str())
        {
            return None;
        }
        if agent.status() != AgentStatus::Online {
            return None;
        }
        if request.max_load > 0.0 && agent.load() > request.max_load {
            return None;
        }

        let evaluation = self.evaluate(agent, request);
        if !evaluation.required_satisfied {
            return None;
        }
        if !evaluation.tags_satisfied {
            return None;
        }

        let floor = self.config.min_score_threshold.max(request.min_score);
        if evaluation.score < floor {
            return None;
        }

        Some(Candidate {
            agent_id: id,
            load: agent.load(),
            score: evaluation.score,
            matched_descriptors: evaluation
                .matched
                .iter()
                .map(|info| info.capability().clone())
                .collect(),
            matched_infos: evaluation.matched,
            reason: evaluation.reason,
        })
    }

    fn order(&self, candidates: &mut [Candidate], strategy: MatchStrategy) {
        match strategy {
            MatchStrategy::BestMatch => {
                candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
            }
            MatchStrategy::LeastLoaded => {
                candidates.sort_by(|a, b| {
                    a.load
                        .partial_cmp(&b.load)
                        .unwrap()
                        .then_with(|| b.score.partial_cmp(&a.score).unwrap())
                });
            }
            MatchStrategy::HighestScore => {
                candidates.sort_by(|a, b| {
                    let sum_a: f64 = a.matched_infos.iter().map(CapabilityInfo::score).sum();
                    let sum_b: f64 = b.matched_infos.iter().map(CapabilityInfo::score).sum();
                    sum_b.partial_cmp(&sum_a).unwrap()
                });
            }
            MatchStrategy::RoundRobin | MatchStrategy::Random => {
                candidates.shuffle(&mut thread_rng());
            }
        }
    }

    fn compute(&self, registry: &Registry, request: &MatchRequest) -> Vec<MatchResult> {
        let mut candidates: Vec<Candidate> = registry
            .list_agents()
            .iter()
            .filter_map(|agent| self.evaluate_candidate(agent, request))
            .collect();

        let strategy = request.strategy.unwrap_or(self.config.default_strategy);
        self.order(&mut candidates, strategy);

        let limit = if request.limit == 0 {
            self.config.default_limit
        } else {
            request.limit
        };
        candidates.truncate(limit);
        candidates.into_iter().map(Candidate::into_result).collect()
    }

    /// Runs a match, honoring `request.timeout` (or the configured
    /// default).
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Timeout`] if the request-level or
    /// configured timeout elapses before evaluation completes.
    pub async fn find_match(
        &self,
        registry: &Registry,
        request: &MatchRequest,
    ) -> DiscoveryResult<Vec<MatchResult>> {
        let timeout = request.timeout.unwrap_or(self.config.default_timeout);
        tokio::time::timeout(timeout, async { self.compute(registry, request) })
            .await
            .map_err(|_| DiscoveryError::Timeout("match request exceeded timeout".into()))
    }

    /// Runs a match with `limit` forced to 1.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if no candidate survives
    /// filtering, or [`DiscoveryError::Timeout`] per [`Self::find_match`].
    pub async fn match_one(
        &self,
        registry: &Registry,
        request: &MatchRequest,
    ) -> DiscoveryResult<MatchResult> {
        let mut narrowed = request.clone();
        narrowed.limit = 1;
        let mut results = self.find_match(registry, &narrowed).await?;
        results
            .pop()
            .ok_or_else(|| DiscoveryError::not_found("no agent matched the request"))
    }

    /// Advances and returns the next agent for `capability_name` under
    /// a per-capability monotonic cursor, distinct from the
    /// `round_robin` match strategy's stateless shuffle.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::NotFound`] if no agent currently
    /// offers the capability.
    pub fn find_next_round_robin(
        &self,
        registry: &Registry,
        capability_name: &str,
    ) -> DiscoveryResult<AgentId> {
        let mut candidates = registry.find_capabilities(capability_name);
        if candidates.is_empty() {
            return Err(DiscoveryError::not_found(format!(
                "no agent offers capability: {capability_name}"
            )));
        }
        candidates.sort_by(|a, b| a.agent_id().as_str().cmp(b.agent_id().as_str()));

        let mut cursors = self.round_robin_cursors.lock().expect("matcher poisoned");
        let cursor = cursors.entry(capability_name.to_owned()).or_insert(0);
        let selected = candidates[*cursor % candidates.len()].agent_id().clone();
        *cursor = (*cursor + 1) % candidates.len();
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::{AgentCard, CapabilityType};
    use discovery_registry::RegistryConfig;
    use std::time::Duration;

    fn capability(name: &str) -> CapabilityDescriptor {
        CapabilityDescriptor::new(name, "", CapabilityType::Task).unwrap()
    }

    fn registry_with_scenario_3() -> Registry {
        let registry = Registry::new(RegistryConfig::default());
        registry
            .register_agent(
                AgentCard::new(
                    "a1",
                    "",
                    "",
                    "1.0.0",
                    vec![capability("code_review"), capability("code_analysis")],
                )
                .unwrap(),
                true,
                String::new(),
                0,
            )
            .unwrap();
        registry.update_agent_load(&AgentId::new("a1"), 0.2).unwrap();
        for name in ["code_review", "code_analysis"] {
            for _ in 0..8 {
                registry.record_execution(&AgentId::new("a1"), name, true, Duration::from_millis(10)).unwrap();
            }
        }

        registry
            .register_agent(
                AgentCard::new(
                    "a2",
                    "",
                    "",
                    "1.0.0",
                    vec![capability("code_review"), capability("testing")],
                )
                .unwrap(),
                true,
                String::new(),
                0,
            )
            .unwrap();
        registry.update_agent_load(&AgentId::new("a2"), 0.5).unwrap();
        for name in ["code_review", "testing"] {
            for _ in 0..9 {
                registry.record_execution(&AgentId::new("a2"), name, true, Duration::from_millis(10)).unwrap();
            }
        }

        registry
            .register_agent(
                AgentCard::new(
                    "a3",
                    "",
                    "",
                    "1.0.0",
                    vec![capability("documentation"), capability("testing")],
                )
                .unwrap(),
                true,
                String::new(),
                0,
            )
            .unwrap();
        registry.update_agent_load(&AgentId::new("a3"), 0.1).unwrap();

        registry
    }

    #[tokio::test]
    async fn best_match_returns_both_capable_agents() {
        let registry = registry_with_scenario_3();
        let matcher = Matcher::new(MatcherConfig::default());
        let request = MatchRequest {
            required_capabilities: vec!["code_review".into()],
            strategy: Some(MatchStrategy::BestMatch),
            ..Default::default()
        };
        let results = matcher.find_match(&registry, &request).await.unwrap();
        let ids: Vec<String> = results.iter().map(|r| r.agent_id.to_string()).collect();
        assert!(ids.contains(&"a1".to_string()));
        assert!(ids.contains(&"a2".to_string()));
        assert!(!ids.contains(&"a3".to_string()));
    }

    #[tokio::test]
    async fn least_loaded_returns_lowest_load_first() {
        let registry = registry_with_scenario_3();
        let matcher = Matcher::new(MatcherConfig::default());
        let request = MatchRequest {
            required_capabilities: vec!["code_review".into()],
            strategy: Some(MatchStrategy::LeastLoaded),
            ..Default::default()
        };
        let results = matcher.find_match(&registry, &request).await.unwrap();
        assert_eq!(results[0].agent_id.as_str(), "a1");
    }

    #[tokio::test]
    async fn empty_registry_returns_empty_result() {
        let registry = Registry::new(RegistryConfig::default());
        let matcher = Matcher::new(MatcherConfig::default());
        let request = MatchRequest {
            required_capabilities: vec!["anything".into()],
            ..Default::default()
        };
        let results = matcher.find_match(&registry, &request).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn limit_zero_uses_configured_default() {
        let registry = Registry::new(RegistryConfig::default());
        for i in 0..15 {
            registry
                .register_agent(
                    AgentCard::new(format!("agent{i}"), "", "", "1.0.0", vec![capability("x")]).unwrap(),
                    true,
                    String::new(),
                    0,
                )
                .unwrap();
        }
        let matcher = Matcher::new(MatcherConfig::default());
        let request = MatchRequest {
            required_capabilities: vec!["x".into()],
            limit: 0,
            ..Default::default()
        };
        let results = matcher.find_match(&registry, &request).await.unwrap();
        assert_eq!(results.len(), 10);
    }

    #[tokio::test]
    async fn match_one_translates_empty_to_not_found() {
        let registry = Registry::new(RegistryConfig::default());
        let matcher = Matcher::new(MatcherConfig::default());
        let request = MatchRequest {
            required_capabilities: vec!["missing".into()],
            ..Default::default()
        };
        let err = matcher.match_one(&registry, &request).await.unwrap_err();
        assert!(matches!(err, DiscoveryError::NotFound(_)));
    }

    #[test]
    fn round_robin_cursor_advances_and_wraps() {
        let registry = Registry::new(RegistryConfig::default());
        registry
            .register_agent(AgentCard::new("r1", "", "", "1.0.0", vec![capability("x")]).unwrap(), true, String::new(), 0)
            .unwrap();
        registry
            .register_agent(AgentCard::new("r2", "", "", "1.0.0", vec![capability("x")]).unwrap(), true, String::new(), 0)
            .unwrap();
        let matcher = Matcher::new(MatcherConfig::default());
        let first = matcher.find_next_round_robin(&registry, "x").unwrap();
        let second = matcher.find_next_round_robin(&registry, "x").unwrap();
        let third = matcher.find_next_round_robin(&registry, "x").unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }

    #[test]
    fn round_robin_unknown_capability_is_not_found() {
        let registry = Registry::new(RegistryConfig::default());
        let matcher = Matcher::new(MatcherConfig::default());
        assert!(matches!(
            matcher.find_next_round_robin(&registry, "ghost").unwrap_err(),
            DiscoveryError::NotFound(_)
        ));
    }

    #[test]
    fn excluded_agent_is_filtered_out() {
        let registry = Registry::new(RegistryConfig::default());
        registry
            .register_agent(AgentCard::new("e1", "", "", "1.0.0", vec![capability("x")]).unwrap(), true, String::new(), 0)
            .unwrap();
        let matcher = Matcher::new(MatcherConfig::default());
        let request = MatchRequest {
            required_capabilities: vec!["x".into()],
            excluded_agents: vec!["e1".into()],
            ..Default::default()
        };
        assert!(matcher.evaluate_candidate(&registry.get_agent(&AgentId::new("e1")).unwrap(), &request).is_none());
    }
}
