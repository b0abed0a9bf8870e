//! The resolver loop.
//!
//! Resolution interleaves constraint propagation with manifest retrieval:
//! each round asks the graph what is still missing, fetches those manifests
//! from the supplier, inserts them, and prunes nodes that fell out of
//! reach. The loop ends at a fixpoint: nothing missing, or two consecutive
//! rounds wanting exactly the same things (a stall).
//!
//! Conflicts are never resolved here; the planner reports them. Per-package
//! fetch failures are logged and retried on the next round.

use std::collections::BTreeMap;

use crate::core::graph::DepGraph;
use crate::core::manifest::Manifest;
use crate::core::version::Constraint;
use crate::supplier::Supplier;
use crate::types::PackageName;

/// A graph at fixpoint, plus whether the gather stalled before the missing
/// set drained.
#[derive(Debug)]
pub struct Resolution {
    pub graph: DepGraph,
    pub gather_failed: bool,
}

/// Grow a graph from the application's main manifest until fixpoint.
pub fn resolve(main: &Manifest, supplier: &dyn Supplier) -> Resolution {
    let mut graph = DepGraph::new(main.clone());
    let mut prev: Option<BTreeMap<PackageName, Constraint>> = None;

    loop {
        let missing = graph.missing();
        if missing.is_empty() {
            return Resolution {
                graph,
                gather_failed: false,
            };
        }

        let wanted: BTreeMap<PackageName, Constraint> = missing
            .iter()
            .map(|(name, req)| (name.clone(), req.constraint.clone()))
            .collect();
        if prev.as_ref() == Some(&wanted) {
            tracing::debug!(
                "resolution stalled with {} unresolved packages",
                wanted.len()
            );
            return Resolution {
                graph,
                gather_failed: true,
            };
        }
        prev = Some(wanted);

        for (name, req) in &missing {
            if !req.constraint.is_valid() {
                // Another insertion this round may still widen the
                // intersection; leave the node alone until then.
                tracing::warn!("skipping {name}: constraint is unsatisfiable");
                continue;
            }
            tracing::debug!("fetching manifest for {name} {}", req.constraint);
            match supplier.manifest(name, &req.constraint) {
                Ok(manifest) => graph.insert(manifest),
                Err(err) => {
                    tracing::warn!("manifest fetch for {name} failed: {err}");
                }
            }
        }

        graph.clear_unused();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supplier::SupplierError;
    use std::path::Path;

    /// Serves canned manifests; `store` is never reached in these tests.
    struct MockSupplier {
        manifests: Vec<Manifest>,
    }

    impl Supplier for MockSupplier {
        fn manifest(
            &self,
            name: &PackageName,
            constraint: &Constraint,
        ) -> Result<Manifest, SupplierError> {
            self.manifests
                .iter()
                .filter(|m| &m.name == name && constraint.matches(&m.version))
                .max_by(|a, b| a.version.cmp(&b.version))
                .cloned()
                .ok_or_else(|| SupplierError::NotFound {
                    name: name.clone(),
                    constraint: constraint.clone(),
                })
        }

        fn store(
            &self,
            _dest: &Path,
            _name: &PackageName,
            _constraint: &Constraint,
        ) -> Result<(), SupplierError> {
            unreachable!("resolver never stores archives")
        }
    }

    fn manifest(name: &str, version: &str, deps: &[(&str, &str)]) -> Manifest {
        let mut m = Manifest::new(name.into(), version.parse().unwrap());
        for (dep, constraint) in deps {
            m = m.with_dependency((*dep).into(), constraint.parse().unwrap());
        }
        m
    }

    #[test]
    fn test_no_dependencies_resolves_immediately() {
        let supplier = MockSupplier { manifests: vec![] };
        let main = manifest("app", "0.0.1", &[]);
        let resolution = resolve(&main, &supplier);
        assert!(!resolution.gather_failed);
        assert!(resolution.graph.missing().is_empty());
    }

    #[test]
    fn test_direct_dependency() {
        let supplier = MockSupplier {
            manifests: vec![manifest("libA", "1.2.0", &[])],
        };
        let main = manifest("app", "0.0.1", &[("libA", ">=1.0.0")]);
        let resolution = resolve(&main, &supplier);
        assert!(!resolution.gather_failed);
        assert!(resolution.graph.needed().contains_key("libA"));
    }

    #[test]
    fn test_transitive_dependency() {
        let supplier = MockSupplier {
            manifests: vec![
                manifest("libA", "1.0.0", &[("libB", ">=2.0.0")]),
                manifest("libB", "2.3.0", &[]),
            ],
        };
        let main = manifest("app", "0.0.1", &[("libA", "==1.0.0")]);
        let resolution = resolve(&main, &supplier);
        assert!(!resolution.gather_failed);
        let needed = resolution.graph.needed();
        assert!(needed.contains_key("libA"));
        assert!(needed.contains_key("libB"));
    }

    #[test]
    fn test_supplier_picks_best_version() {
        let supplier = MockSupplier {
            manifests: vec![
                manifest("libA", "1.0.0", &[]),
                manifest("libA", "1.9.0", &[]),
                manifest("libA", "2.0.0", &[]),
            ],
        };
        let main = manifest("app", "0.0.1", &[("libA", "<2.0.0")]);
        let resolution = resolve(&main, &supplier);
        let got = resolution.graph.manifest(&"libA".into()).unwrap();
        assert_eq!(got.version, "1.9.0".parse().unwrap());
    }

    #[test]
    fn test_unfetchable_package_stalls() {
        let supplier = MockSupplier { manifests: vec![] };
        let main = manifest("app", "0.0.1", &[("libX", ">=1.0.0")]);
        let resolution = resolve(&main, &supplier);
        assert!(resolution.gather_failed);
        assert!(resolution.graph.missing().contains_key("libX"));
    }

    #[test]
    fn test_conflict_reaches_clean_fixpoint() {
        let supplier = MockSupplier {
            manifests: vec![
                manifest("libA", "1.0.0", &[("libB", ">=2.0.0")]),
                manifest("libC", "1.0.0", &[("libB", "<2.0.0")]),
                manifest("libB", "2.3.0", &[]),
                manifest("libB", "1.9.0", &[]),
            ],
        };
        let main = manifest("app", "0.0.1", &[("libA", "*"), ("libC", "*")]);
        let resolution = resolve(&main, &supplier);
        // The conflict is reported, not a stall.
        assert!(!resolution.gather_failed);
        assert!(resolution.graph.conflicted().contains_key("libB"));
    }

    #[test]
    fn test_narrowed_constraint_refetches_and_prunes() {
        // Round one picks libA 2.0.0 (which drags in libB); libC then
        // narrows libA below 2.0.0, so round two swaps in libA 1.5.0 and
        // libB falls out of reach.
        let supplier = MockSupplier {
            manifests: vec![
                manifest("libA", "2.0.0", &[("libB", "*")]),
                manifest("libA", "1.5.0", &[]),
                manifest("libB", "1.0.0", &[]),
                manifest("libC", "1.0.0", &[("libA", "<2.0.0")]),
            ],
        };
        let main = manifest("app", "0.0.1", &[("libA", "*"), ("libC", "*")]);
        let resolution = resolve(&main, &supplier);
        assert!(!resolution.gather_failed);

        let needed = resolution.graph.needed();
        assert_eq!(
            resolution.graph.manifest(&"libA".into()).unwrap().version,
            "1.5.0".parse().unwrap()
        );
        assert!(!needed.contains_key("libB"));
        assert!(resolution.graph.manifest(&"libB".into()).is_none());
    }
}
