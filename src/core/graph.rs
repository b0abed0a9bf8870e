//! The dependency graph.
//!
//! Nodes are keyed by package name and hold an optional manifest plus the
//! incoming edges `(issuer, constraint)` contributed by packages that
//! depend on them. Nodes never reference each other directly, so cycles
//! cost nothing and removal is trivial.
//!
//! `insert` and `clear_unused` are the only mutations; everything else is a
//! pure view recomputed from the node set on each call.

use std::collections::BTreeMap;

use crate::core::manifest::Manifest;
use crate::core::version::Constraint;
use crate::types::PackageName;

/// What the graph currently knows it wants from one package: the
/// intersection of every incoming edge, and who issued those edges.
#[derive(Debug, Clone)]
pub struct Requirement {
    pub constraint: Constraint,
    pub issuers: BTreeMap<PackageName, Constraint>,
}

#[derive(Debug, Default)]
struct Node {
    manifest: Option<Manifest>,
    /// Incoming edges: issuer name to the constraint it declared.
    edges: BTreeMap<PackageName, Constraint>,
}

impl Node {
    fn requirement(&self) -> Requirement {
        let constraint = self
            .edges
            .values()
            .fold(Constraint::Any, |acc, c| acc.intersect(c));
        Requirement {
            constraint,
            issuers: self.edges.clone(),
        }
    }
}

/// The evolving resolution state. Owned by a single resolve call.
#[derive(Debug)]
pub struct DepGraph {
    root: PackageName,
    nodes: BTreeMap<PackageName, Node>,
}

impl DepGraph {
    /// Seed a graph with the application's own manifest as the root node.
    pub fn new(main: Manifest) -> Self {
        let mut graph = Self {
            root: main.name.clone(),
            nodes: BTreeMap::new(),
        };
        graph.insert(main);
        graph
    }

    pub fn root(&self) -> &PackageName {
        &self.root
    }

    pub fn manifest(&self, name: &PackageName) -> Option<&Manifest> {
        self.nodes.get(name).and_then(|n| n.manifest.as_ref())
    }

    /// Attach a manifest to its node, creating the node if absent, and issue
    /// one edge per declared dependency.
    ///
    /// Re-inserting the same (name, version) is a no-op. A different version
    /// replaces the manifest and re-issues this package's outgoing edges.
    pub fn insert(&mut self, manifest: Manifest) {
        let name = manifest.name.clone();

        if let Some(node) = self.nodes.get(&name) {
            if let Some(existing) = &node.manifest {
                if existing.version == manifest.version {
                    return;
                }
            }
        }

        // Drop edges the previous manifest of this package issued.
        for node in self.nodes.values_mut() {
            node.edges.remove(&name);
        }

        let dependencies = manifest.dependencies.clone();
        self.nodes.entry(name.clone()).or_default().manifest = Some(manifest);

        for (dep, constraint) in dependencies {
            self.nodes
                .entry(dep)
                .or_default()
                .edges
                .insert(name.clone(), constraint);
        }
    }

    /// Remove nodes unreachable from the root, and every edge issued by a
    /// removed node. Idempotent. The root is never removed.
    pub fn clear_unused(&mut self) {
        let mut reachable = std::collections::BTreeSet::new();
        let mut queue = vec![self.root.clone()];
        while let Some(name) = queue.pop() {
            if !reachable.insert(name.clone()) {
                continue;
            }
            if let Some(manifest) = self.nodes.get(&name).and_then(|n| n.manifest.as_ref()) {
                for dep in manifest.dependencies.keys() {
                    if !reachable.contains(dep) {
                        queue.push(dep.clone());
                    }
                }
            }
        }

        self.nodes.retain(|name, _| reachable.contains(name));
        for node in self.nodes.values_mut() {
            node.edges.retain(|issuer, _| reachable.contains(issuer));
        }
    }

    /// Names whose incoming edges intersect to the empty constraint.
    pub fn conflicted(&self) -> BTreeMap<PackageName, Requirement> {
        self.nodes
            .iter()
            .filter(|(_, node)| !node.edges.is_empty())
            .map(|(name, node)| (name.clone(), node.requirement()))
            .filter(|(_, req)| req.constraint.is_empty())
            .collect()
    }

    /// Names with a manifest whose version satisfies a valid intersected
    /// constraint. The root always qualifies.
    pub fn needed(&self) -> BTreeMap<PackageName, Requirement> {
        self.nodes
            .iter()
            .filter_map(|(name, node)| {
                let manifest = node.manifest.as_ref()?;
                let req = node.requirement();
                (req.constraint.is_valid() && req.constraint.matches(&manifest.version))
                    .then(|| (name.clone(), req))
            })
            .collect()
    }

    /// Names still wanted but not yet satisfied: no manifest attached, or a
    /// manifest whose version falls outside the (valid) intersected
    /// constraint. Conflicted names are excluded; fetching them is futile.
    pub fn missing(&self) -> BTreeMap<PackageName, Requirement> {
        self.nodes
            .iter()
            .filter_map(|(name, node)| {
                let req = node.requirement();
                if !req.constraint.is_valid() {
                    return None;
                }
                let satisfied = node
                    .manifest
                    .as_ref()
                    .is_some_and(|m| req.constraint.matches(&m.version));
                (!satisfied).then(|| (name.clone(), req))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::version::Version;

    fn manifest(name: &str, version: &str, deps: &[(&str, &str)]) -> Manifest {
        let mut m = Manifest::new(name.into(), version.parse().unwrap());
        for (dep, constraint) in deps {
            m = m.with_dependency((*dep).into(), constraint.parse().unwrap());
        }
        m
    }

    #[test]
    fn test_seed_puts_root_in_needed() {
        let graph = DepGraph::new(manifest("app", "0.0.1", &[]));
        assert!(graph.needed().contains_key("app"));
        assert!(graph.missing().is_empty());
        assert!(graph.conflicted().is_empty());
    }

    #[test]
    fn test_declared_dependency_is_missing() {
        let graph = DepGraph::new(manifest("app", "0.0.1", &[("libA", ">=1.0.0")]));
        let missing = graph.missing();
        let req = &missing["libA"];
        assert_eq!(req.constraint, ">=1.0.0".parse().unwrap());
        assert_eq!(req.issuers.len(), 1);
        assert!(req.issuers.contains_key("app"));
    }

    #[test]
    fn test_insert_satisfies_missing() {
        let mut graph = DepGraph::new(manifest("app", "0.0.1", &[("libA", ">=1.0.0")]));
        graph.insert(manifest("libA", "1.2.0", &[]));
        assert!(graph.missing().is_empty());
        assert!(graph.needed().contains_key("libA"));
    }

    #[test]
    fn test_unsatisfying_manifest_stays_missing() {
        let mut graph = DepGraph::new(manifest("app", "0.0.1", &[("libA", ">=2.0.0")]));
        graph.insert(manifest("libA", "1.0.0", &[]));
        assert!(graph.missing().contains_key("libA"));
        assert!(!graph.needed().contains_key("libA"));
    }

    #[test]
    fn test_conflict_between_issuers() {
        let mut graph = DepGraph::new(manifest(
            "app",
            "0.0.1",
            &[("libA", "*"), ("libC", "*")],
        ));
        graph.insert(manifest("libA", "1.0.0", &[("libB", ">=2.0.0")]));
        graph.insert(manifest("libC", "1.0.0", &[("libB", "<2.0.0")]));

        let conflicted = graph.conflicted();
        let req = &conflicted["libB"];
        assert!(req.constraint.is_empty());
        assert_eq!(req.issuers.len(), 2);
        assert!(req.issuers.contains_key("libA"));
        assert!(req.issuers.contains_key("libC"));

        // Conflicted names are not refetched.
        assert!(!graph.missing().contains_key("libB"));
    }

    #[test]
    fn test_reinsert_same_version_is_noop() {
        let mut graph = DepGraph::new(manifest("app", "0.0.1", &[("libA", "*")]));
        graph.insert(manifest("libA", "1.0.0", &[("libB", ">=1.0.0")]));
        graph.insert(manifest("libA", "1.0.0", &[]));
        // The no-op did not drop libA's outgoing edge.
        assert!(graph.missing().contains_key("libB"));
    }

    #[test]
    fn test_reinsert_new_version_reissues_edges() {
        let mut graph = DepGraph::new(manifest("app", "0.0.1", &[("libA", "*")]));
        graph.insert(manifest("libA", "1.0.0", &[("libB", ">=1.0.0")]));
        graph.insert(manifest("libA", "2.0.0", &[("libC", ">=1.0.0")]));
        graph.clear_unused();

        let missing = graph.missing();
        assert!(!missing.contains_key("libB"));
        assert!(missing.contains_key("libC"));
        assert_eq!(
            graph.manifest(&"libA".into()).unwrap().version,
            "2.0.0".parse::<Version>().unwrap()
        );
    }

    #[test]
    fn test_clear_unused_drops_unreachable_and_is_idempotent() {
        let mut graph = DepGraph::new(manifest("app", "0.0.1", &[("libA", "*")]));
        graph.insert(manifest("libA", "1.0.0", &[("libB", "*")]));
        graph.insert(manifest("libB", "1.0.0", &[]));
        // libA stops depending on libB.
        graph.insert(manifest("libA", "1.1.0", &[]));

        graph.clear_unused();
        assert!(graph.manifest(&"libB".into()).is_none());
        assert!(graph.needed().contains_key("app"));
        assert!(graph.needed().contains_key("libA"));

        graph.clear_unused();
        assert_eq!(graph.needed().len(), 2);
    }

    #[test]
    fn test_clear_unused_keeps_root() {
        let mut graph = DepGraph::new(manifest("app", "0.0.1", &[]));
        graph.clear_unused();
        assert!(graph.manifest(&"app".into()).is_some());
    }

    #[test]
    fn test_cycle_does_not_loop() {
        let mut graph = DepGraph::new(manifest("app", "0.0.1", &[("libA", "*")]));
        graph.insert(manifest("libA", "1.0.0", &[("libB", "*")]));
        graph.insert(manifest("libB", "1.0.0", &[("libA", "*")]));
        graph.clear_unused();
        assert!(graph.missing().is_empty());
        assert_eq!(graph.needed().len(), 3);
    }

    #[test]
    fn test_views_partition_reachable_names() {
        let mut graph = DepGraph::new(manifest(
            "app",
            "0.0.1",
            &[("libA", "*"), ("libC", "*"), ("libX", ">=1.0.0")],
        ));
        graph.insert(manifest("libA", "1.0.0", &[("libB", ">=2.0.0")]));
        graph.insert(manifest("libC", "1.0.0", &[("libB", "<2.0.0")]));
        graph.clear_unused();

        let missing = graph.missing();
        let conflicted = graph.conflicted();
        let needed = graph.needed();

        let mut all: Vec<&PackageName> = missing
            .keys()
            .chain(conflicted.keys())
            .chain(needed.keys())
            .collect();
        all.sort();
        let total = all.len();
        all.dedup();
        assert_eq!(total, all.len(), "views must be disjoint");
        assert_eq!(total, 5); // app, libA, libB, libC, libX
    }
}
