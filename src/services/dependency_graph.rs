//! Service dependency graph.
//!
//! Built once from a set of descriptors, validated, and read-only afterwards.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::domain::errors::{OrchestrationError, OrchestrationResult};
use crate::domain::models::ServiceDescriptor;

/// DFS marking used by cycle detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

// Standalone helper for cycle detection (no self needed)
fn detect_cycle_util<'a>(
    node: &'a str,
    dependencies: &'a BTreeMap<String, BTreeSet<String>>,
    colors: &mut HashMap<&'a str, Color>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    colors.insert(node, Color::Gray);
    path.push(node);

    if let Some(neighbors) = dependencies.get(node) {
        for neighbor in neighbors {
            match colors.get(neighbor.as_str()).copied().unwrap_or(Color::White) {
                Color::White => {
                    if let Some(cycle) = detect_cycle_util(neighbor, dependencies, colors, path) {
                        return Some(cycle);
                    }
                }
                Color::Gray => {
                    // Back-edge: the cycle is the path from the gray node to here
                    let start = path.iter().position(|&n| n == neighbor)?;
                    let mut cycle: Vec<String> =
                        path[start..].iter().map(|n| (*n).to_string()).collect();
                    cycle.push(neighbor.clone());
                    return Some(cycle);
                }
                Color::Black => {}
            }
        }
    }

    colors.insert(node, Color::Black);
    path.pop();
    None
}

/// Validated dependency graph over service descriptors.
///
/// Edges point from a service to the services it waits for. Both wait-for
/// (`depends_on`) and reference relations are edges.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, ServiceDescriptor>,
    dependencies: BTreeMap<String, BTreeSet<String>>,
    dependents: BTreeMap<String, BTreeSet<String>>,
    order: Vec<String>,
}

impl DependencyGraph {
    /// Build and validate a graph.
    ///
    /// Fails on duplicate names, references to undeclared services or
    /// endpoints, and dependency cycles.
    pub fn build(
        descriptors: impl IntoIterator<Item = ServiceDescriptor>,
    ) -> OrchestrationResult<Self> {
        let mut nodes = BTreeMap::new();
        for descriptor in descriptors {
            if nodes.contains_key(&descriptor.name) {
                return Err(OrchestrationError::DuplicateService(descriptor.name));
            }
            nodes.insert(descriptor.name.clone(), descriptor);
        }

        Self::validate_references(&nodes)?;

        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (name, descriptor) in &nodes {
            dependents.entry(name.clone()).or_default();
            let deps = dependencies.entry(name.clone()).or_default();
            for dep in descriptor.dependencies() {
                deps.insert(dep.to_string());
                dependents
                    .entry(dep.to_string())
                    .or_default()
                    .insert(name.clone());
            }
        }

        if let Some(cycle) = Self::detect_cycle(&dependencies) {
            return Err(OrchestrationError::Cycle(cycle));
        }

        let order = Self::topological_sort(&dependencies, &dependents);

        Ok(Self {
            nodes,
            dependencies,
            dependents,
            order,
        })
    }

    fn validate_references(nodes: &BTreeMap<String, ServiceDescriptor>) -> OrchestrationResult<()> {
        for (name, descriptor) in nodes {
            for dep in descriptor.dependencies() {
                if !nodes.contains_key(dep) {
                    return Err(OrchestrationError::UnknownReference {
                        service: name.clone(),
                        missing: dep.to_string(),
                    });
                }
            }

            for reference in descriptor.endpoint_references() {
                let Some(target) = nodes.get(&reference.service) else {
                    return Err(OrchestrationError::UnknownReference {
                        service: name.clone(),
                        missing: reference.service.clone(),
                    });
                };
                if target.endpoint(&reference.endpoint).is_none() {
                    return Err(OrchestrationError::UnknownReference {
                        service: name.clone(),
                        missing: format!("{}/{}", reference.service, reference.endpoint),
                    });
                }
            }
        }
        Ok(())
    }

    /// Three-color DFS, visiting roots and neighbors in ascending name order.
    fn detect_cycle(dependencies: &BTreeMap<String, BTreeSet<String>>) -> Option<Vec<String>> {
        let mut colors: HashMap<&str, Color> = HashMap::new();
        let mut path = Vec::new();

        for name in dependencies.keys() {
            if colors.get(name.as_str()).copied().unwrap_or(Color::White) == Color::White {
                if let Some(cycle) = detect_cycle_util(name, dependencies, &mut colors, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Kahn's algorithm; the ready set is ordered so ties break by name.
    fn topological_sort(
        dependencies: &BTreeMap<String, BTreeSet<String>>,
        dependents: &BTreeMap<String, BTreeSet<String>>,
    ) -> Vec<String> {
        let mut in_degree: BTreeMap<&str, usize> = dependencies
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut ready: BTreeSet<&str> = in_degree
            .iter()
            .filter(|&(_, &degree)| degree == 0)
            .map(|(&name, _)| name)
            .collect();

        let mut sorted = Vec::with_capacity(dependencies.len());
        while let Some(node) = ready.pop_first() {
            sorted.push(node.to_string());
            if let Some(children) = dependents.get(node) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.insert(child.as_str());
                        }
                    }
                }
            }
        }
        sorted
    }

    /// Linearization consistent with every edge; dependencies come first.
    pub fn topological_order(&self) -> &[String] {
        &self.order
    }

    /// Startup levels: every service appears one level after its deepest dependency.
    pub fn waves(&self) -> Vec<Vec<String>> {
        let mut depth: HashMap<&str, usize> = HashMap::new();
        let mut waves: Vec<Vec<String>> = Vec::new();

        for name in &self.order {
            let level = self
                .dependencies_of(name)
                .filter_map(|dep| depth.get(dep).map(|d| d + 1))
                .max()
                .unwrap_or(0);
            depth.insert(name.as_str(), level);
            if waves.len() <= level {
                waves.resize_with(level + 1, Vec::new);
            }
            waves[level].push(name.clone());
        }
        waves
    }

    pub fn descriptor(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.nodes.get(name)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.nodes.values()
    }

    /// Direct dependencies, ascending by name.
    pub fn dependencies_of<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.dependencies
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Direct dependents, ascending by name.
    pub fn dependents_of<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.dependents
            .get(name)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    /// Every service with a dependency path to `name`.
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = self.dependents_of(name).collect();
        while let Some(node) = stack.pop() {
            if seen.insert(node.to_string()) {
                stack.extend(self.dependents_of(node));
            }
        }
        seen
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EnvValue, Endpoint};

    fn svc(name: &str, deps: &[&str]) -> ServiceDescriptor {
        let mut descriptor = ServiceDescriptor::image(name, "busybox");
        descriptor.depends_on = deps.iter().map(|d| (*d).to_string()).collect();
        descriptor
    }

    #[test]
    fn test_build_chain() {
        let graph = DependencyGraph::build(vec![
            svc("c", &["b"]),
            svc("a", &[]),
            svc("b", &["a"]),
        ])
        .unwrap();

        assert_eq!(graph.topological_order(), ["a", "b", "c"]);
        assert_eq!(graph.dependencies_of("c").collect::<Vec<_>>(), vec!["b"]);
        assert_eq!(graph.dependents_of("a").collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_ties_break_by_name() {
        let graph = DependencyGraph::build(vec![
            svc("zeta", &[]),
            svc("alpha", &[]),
            svc("mid", &["zeta"]),
            svc("beta", &[]),
        ])
        .unwrap();

        assert_eq!(graph.topological_order(), ["alpha", "beta", "zeta", "mid"]);
    }

    #[test]
    fn test_unknown_reference() {
        let err = DependencyGraph::build(vec![svc("app", &["db"])]).unwrap_err();
        assert_eq!(
            err,
            OrchestrationError::UnknownReference {
                service: "app".into(),
                missing: "db".into()
            }
        );
    }

    #[test]
    fn test_unknown_reference_via_references() {
        let mut app = svc("app", &[]);
        app.references.insert("cache".into());
        let err = DependencyGraph::build(vec![app]).unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::UnknownReference { missing, .. } if missing == "cache"
        ));
    }

    #[test]
    fn test_unknown_endpoint_reference() {
        let mut api = svc("api", &[]);
        api.endpoints.push(Endpoint::http("http", 8080, None));
        let mut app = svc("app", &[]);
        app.environment
            .insert("API_URL".into(), EnvValue::endpoint("api", "grpc"));

        let err = DependencyGraph::build(vec![api, app]).unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::UnknownReference { missing, .. } if missing == "api/grpc"
        ));
    }

    #[test]
    fn test_duplicate_service() {
        let err = DependencyGraph::build(vec![svc("a", &[]), svc("a", &[])]).unwrap_err();
        assert_eq!(err, OrchestrationError::DuplicateService("a".into()));
    }

    #[test]
    fn test_cycle_detected_with_path() {
        let err = DependencyGraph::build(vec![
            svc("a", &["c"]),
            svc("b", &["a"]),
            svc("c", &["b"]),
            svc("d", &[]),
        ])
        .unwrap_err();

        match err {
            OrchestrationError::Cycle(path) => {
                assert_eq!(path, vec!["a", "c", "b", "a"]);
            }
            other => panic!("Expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_self_dependency_is_cycle() {
        let err = DependencyGraph::build(vec![svc("a", &["a"])]).unwrap_err();
        assert_eq!(err, OrchestrationError::Cycle(vec!["a".into(), "a".into()]));
    }

    #[test]
    fn test_waves_and_transitive_dependents() {
        let graph = DependencyGraph::build(vec![
            svc("mysql", &[]),
            svc("localstack", &[]),
            svc("phpapp", &["mysql", "localstack"]),
            svc("worker", &["phpapp"]),
            svc("phpmyadmin", &["mysql"]),
        ])
        .unwrap();

        assert_eq!(
            graph.waves(),
            vec![
                vec!["localstack".to_string(), "mysql".to_string()],
                vec!["phpapp".to_string(), "phpmyadmin".to_string()],
                vec!["worker".to_string()],
            ]
        );

        let affected: Vec<String> = graph.transitive_dependents("mysql").into_iter().collect();
        assert_eq!(affected, vec!["phpapp", "phpmyadmin", "worker"]);
        assert!(graph.transitive_dependents("worker").is_empty());
    }

    #[test]
    fn test_build_is_deterministic() {
        let descriptors = vec![
            svc("web", &["api"]),
            svc("api", &["db", "cache"]),
            svc("cache", &[]),
            svc("db", &[]),
        ];
        let first = DependencyGraph::build(descriptors.clone()).unwrap();
        let mut reversed = descriptors;
        reversed.reverse();
        let second = DependencyGraph::build(reversed).unwrap();
        assert_eq!(first.topological_order(), second.topological_order());
    }
}
