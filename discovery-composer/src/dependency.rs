//! Dependency graph storage, transitive resolution, cycle detection,
//! and topological ordering (spec.md §4.4, §9 OQ4).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;

use discovery_core::{DiscoveryError, DiscoveryResult};

/// `name -> prerequisites` registrations, keyed case-insensitively.
#[derive(Default)]
pub struct DependencyGraph {
    edges: RwLock<HashMap<String, Vec<String>>>,
}

impl DependencyGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `name` requires `prerequisites` before it can run.
    pub fn register(&self, name: &str, prerequisites: Vec<String>) {
        self.edges
            .write()
            .expect("dependency graph poisoned")
            .insert(name.to_lowercase(), prerequisites);
    }

    fn prerequisites_of(&self, name: &str) -> Vec<String> {
        self.edges
            .read()
            .expect("dependency graph poisoned")
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Computes the transitive prerequisite closure of `name`,
    /// bounded by `max_depth` nested levels.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::LimitExceeded`] if the chain exceeds
    /// `max_depth`.
    pub fn transitive_prerequisites(
        &self,
        name: &str,
        max_depth: usize,
    ) -> DiscoveryResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        self.walk(name, 0, max_depth, &mut seen, &mut result)?;
        Ok(result)
    }

    fn walk(
        &self,
        name: &str,
        depth: usize,
        max_depth: usize,
        seen: &mut HashSet<String>,
        result: &mut Vec<String>,
    ) -> DiscoveryResult<()> {
        if depth > max_depth {
            return Err(DiscoveryError::LimitExceeded(format!(
                "dependency resolution exceeded max depth {max_depth}"
            )));
        }
        for prerequisite in self.prerequisites_of(name) {
            let key = prerequisite.to_lowercase();
            if seen.insert(key) {
                result.push(prerequisite.clone());
            }
            self.walk(&prerequisite, depth + 1, max_depth, seen, result)?;
        }
        Ok(())
    }

    /// Resolves the transitive prerequisites of every name in `names`,
    /// returning a `name -> prerequisites` mapping (spec.md §4.4
    /// `ResolveDependencies`).
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::LimitExceeded`] if any chain exceeds
    /// `max_depth`.
    pub fn resolve(
        &self,
        names: &[String],
        max_depth: usize,
    ) -> DiscoveryResult<HashMap<String, Vec<String>>> {
        let mut mapping = HashMap::new();
        for name in names {
            mapping.insert(name.clone(), self.transitive_prerequisites(name, max_depth)?);
        }
        Ok(mapping)
    }

    /// Returns `true` if walking `name`'s dependency graph revisits a
    /// node that is still on the current ancestor path (a true cycle),
    /// as opposed to a node already fully resolved via another branch
    /// (a diamond). Uses white/gray/black coloring so shared
    /// prerequisites are never misreported as cyclic.
    #[must_use]
    pub fn has_cycle_from(&self, name: &str) -> bool {
        let mut color: HashMap<String, Color> = HashMap::new();
        self.visit(name, &mut color)
    }

    fn visit(&self, name: &str, color: &mut HashMap<String, Color>) -> bool {
        let key = name.to_lowercase();
        match color.get(&key) {
            Some(Color::Gray) => return true,
            Some(Color::Black) => return false,
            None => {}
        }
        color.insert(key.clone(), Color::Gray);
        for prerequisite in self.prerequisites_of(name) {
            if self.visit(&prerequisite, color) {
                return true;
            }
        }
        color.insert(key, Color::Black);
        false
    }

    /// Computes a prerequisite-before-dependent ordering of `working_set`
    /// using Kahn's algorithm, restricted to edges between members of
    /// the set. Capabilities absent from the dependency table are
    /// treated as source nodes.
    #[must_use]
    pub fn topological_order(&self, working_set: &[String]) -> Vec<String> {
        let normalized: HashMap<String, String> = working_set
            .iter()
            .map(|n| (n.to_lowercase(), n.clone()))
            .collect();

        let mut in_degree: HashMap<String, usize> =
            normalized.keys().map(|k| (k.clone(), 0)).collect();
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();

        for key in normalized.keys() {
            let original = &normalized[key];
            for prerequisite in self.prerequisites_of(original) {
                let prereq_key = prerequisite.to_lowercase();
                if normalized.contains_key(&prereq_key) {
                    adjacency.entry(prereq_key).or_default().push(key.clone());
                    *in_degree.get_mut(key).expect("key present") += 1;
                }
            }
        }

        let mut queue: VecDeque<String> = working_set
            .iter()
            .map(|n| n.to_lowercase())
            .filter(|key| in_degree[key] == 0)
            .collect();

        let mut order = Vec::with_capacity(working_set.len());
        while let Some(key) = queue.pop_front() {
            order.push(normalized[&key].clone());
            if let Some(dependents) = adjacency.get(&key) {
                for dependent in dependents.clone() {
                    let degree = in_degree.get_mut(&dependent).expect("key present");
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }
        order
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diamond_is_not_a_cycle_and_orders_correctly() {
        let graph = DependencyGraph::new();
        graph.register("a", vec!["b".into(), "c".into()]);
        graph.register("b", vec!["d".into()]);
        graph.register("c", vec!["d".into()]);

        assert!(!graph.has_cycle_from("a"));

        let order = graph.topological_order(&["a".into(), "b".into(), "c".into(), "d".into()]);
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("d") < pos("b"));
        assert!(pos("d") < pos("c"));
        assert!(pos("b") < pos("a"));
        assert!(pos("c") < pos("a"));
    }

    #[test]
    fn true_cycle_is_detected() {
        let graph = DependencyGraph::new();
        graph.register("x", vec!["y".into()]);
        graph.register("y", vec!["x".into()]);
        assert!(graph.has_cycle_from("x"));
    }

    #[test]
    fn transitive_prerequisites_matches_scenario_4() {
        let graph = DependencyGraph::new();
        graph.register("deployment", vec!["testing".into(), "documentation".into()]);
        graph.register("testing", vec!["code_review".into()]);

        let mapping = graph
            .resolve(&["deployment".into(), "testing".into()], 10)
            .unwrap();
        let mut deployment_prereqs = mapping["deployment"].clone();
        deployment_prereqs.sort();
        let mut expected = vec!["testing".to_string(), "documentation".to_string(), "code_review".to_string()];
        expected.sort();
        assert_eq!(deployment_prereqs, expected);
        assert_eq!(mapping["testing"], vec!["code_review".to_string()]);
    }

    #[test]
    fn depth_exactly_at_limit_succeeds_and_over_limit_fails() {
        let graph = DependencyGraph::new();
        // chain of exactly 10 edges: n0 -> n1 -> ... -> n10
        for i in 0..10 {
            graph.register(&format!("n{i}"), vec![format!("n{}", i + 1)]);
        }
        assert!(graph.transitive_prerequisites("n0", 10).is_ok());

        graph.register("n10", vec!["n11".into()]);
        let err = graph.transitive_prerequisites("n0", 10).unwrap_err();
        assert!(matches!(err, DiscoveryError::LimitExceeded(_)));
    }

    #[test]
    fn source_nodes_with_no_dependency_info_keep_stable_order() {
        let graph = DependencyGraph::new();
        let order = graph.topological_order(&["x".into(), "y".into()]);
        assert_eq!(order, vec!["x".to_string(), "y".to_string()]);
    }
}
