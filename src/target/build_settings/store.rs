//! Memoization of generated xcconfigs with top-down invalidation.
//!
//! Settings contexts themselves are stateless views; this store is the one
//! place computed xcconfigs are cached. Invalidating a pod target clears
//! its entries, every transitive dependent's entries, and every aggregate
//! whose pod set (or inherited search paths) reaches it. The cache is
//! never partially invalidated below that granularity.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::sandbox::Sandbox;
use crate::target::{TargetError, TargetGraph};

use super::{AggregateTargetSettings, GeneratedXcconfig, PodTargetSettings};

pub struct SettingsStore<'a> {
    graph: &'a TargetGraph,
    sandbox: &'a Sandbox,
    pod_cache: RefCell<BTreeMap<(String, Option<String>), Rc<GeneratedXcconfig>>>,
    aggregate_cache: RefCell<BTreeMap<(String, String), Rc<GeneratedXcconfig>>>,
}

impl<'a> SettingsStore<'a> {
    pub fn new(graph: &'a TargetGraph, sandbox: &'a Sandbox) -> Self {
        Self {
            graph,
            sandbox,
            pod_cache: RefCell::new(BTreeMap::new()),
            aggregate_cache: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn graph(&self) -> &'a TargetGraph {
        self.graph
    }

    /// The xcconfig for a pod target's library variant, or for one of its
    /// test specs. Computed once and cached until [`Self::clear`].
    pub fn pod_xcconfig(
        &self,
        label: &str,
        test_spec_name: Option<&str>,
    ) -> Result<Rc<GeneratedXcconfig>, TargetError> {
        let key = (label.to_string(), test_spec_name.map(str::to_string));
        if let Some(cached) = self.pod_cache.borrow().get(&key) {
            return Ok(Rc::clone(cached));
        }
        let target = self
            .graph
            .pod_target(label)
            .ok_or_else(|| TargetError::UnknownTarget(label.to_string()))?;
        let generated = match test_spec_name {
            None => PodTargetSettings::new(self.graph, self.sandbox, target).xcconfig(),
            Some(name) => {
                PodTargetSettings::for_test_spec(self.graph, self.sandbox, target, name)?
                    .xcconfig()
            }
        };
        let generated = Rc::new(generated);
        self.pod_cache.borrow_mut().insert(key, Rc::clone(&generated));
        Ok(generated)
    }

    /// The xcconfig for an aggregate target in one build configuration.
    pub fn aggregate_xcconfig(
        &self,
        label: &str,
        configuration_name: &str,
    ) -> Result<Rc<GeneratedXcconfig>, TargetError> {
        let key = (label.to_string(), configuration_name.to_string());
        if let Some(cached) = self.aggregate_cache.borrow().get(&key) {
            return Ok(Rc::clone(cached));
        }
        let target = self
            .graph
            .aggregate_target(label)
            .ok_or_else(|| TargetError::UnknownTarget(label.to_string()))?;
        let generated = Rc::new(
            AggregateTargetSettings::new(self.graph, self.sandbox, target, configuration_name)
                .xcconfig(),
        );
        self.aggregate_cache
            .borrow_mut()
            .insert(key, Rc::clone(&generated));
        Ok(generated)
    }

    /// Invalidates a pod target's cached xcconfigs along with everything
    /// computed from them, cascading through dependents and aggregates.
    pub fn clear(&self, label: &str) {
        let mut pod_labels = self.graph.transitive_dependents_of(label);
        pod_labels.insert(label.to_string());

        self.pod_cache
            .borrow_mut()
            .retain(|(cached_label, _), _| !pod_labels.contains(cached_label));

        let affected_aggregates = self.graph.aggregates_depending_on(&pod_labels);
        self.aggregate_cache
            .borrow_mut()
            .retain(|(cached_label, _), _| !affected_aggregates.contains(cached_label));
    }

    /// Drops every cached xcconfig.
    pub fn clear_all(&self) {
        self.pod_cache.borrow_mut().clear();
        self.aggregate_cache.borrow_mut().clear();
    }

    /// Labels with at least one cached entry, for tests and diagnostics.
    pub fn cached_pod_labels(&self) -> BTreeSet<String> {
        self.pod_cache
            .borrow()
            .keys()
            .map(|(label, _)| label.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::target::pod_target::tests::fixture_pod_target;
    use crate::target::{AggregateTarget, TargetDefinition};
    use std::path::PathBuf;

    fn chain_graph() -> TargetGraph {
        // A -> B -> C, aggregate over A
        let mut graph = TargetGraph::new();
        let mut a = fixture_pod_target("A");
        a.dependent_targets = vec!["B".to_string()];
        let mut b = fixture_pod_target("B");
        b.dependent_targets = vec!["C".to_string()];
        graph.add_pod_target(a).unwrap();
        graph.add_pod_target(b).unwrap();
        graph.add_pod_target(fixture_pod_target("C")).unwrap();

        let mut aggregate = AggregateTarget::new(
            TargetDefinition::new("App", Platform::ios()),
            PathBuf::from("/repo"),
        );
        aggregate.add_pod_targets_for_all_configurations(vec!["A".to_string()]);
        graph.add_aggregate_target(aggregate).unwrap();
        graph
    }

    #[test]
    fn test_caching_is_idempotent() {
        let graph = chain_graph();
        let sandbox = Sandbox::new("/repo/Pods");
        let store = SettingsStore::new(&graph, &sandbox);

        let first = store.pod_xcconfig("A", None).unwrap();
        let second = store.pod_xcconfig("A", None).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_clear_cascades_to_dependents_and_aggregates() {
        let graph = chain_graph();
        let sandbox = Sandbox::new("/repo/Pods");
        let store = SettingsStore::new(&graph, &sandbox);

        let a = store.pod_xcconfig("A", None).unwrap();
        let b = store.pod_xcconfig("B", None).unwrap();
        let c = store.pod_xcconfig("C", None).unwrap();
        let aggregate = store.aggregate_xcconfig("Pods-App", "Debug").unwrap();

        store.clear("C");

        // A and B depend on C, so their entries were dropped.
        assert!(!Rc::ptr_eq(&a, &store.pod_xcconfig("A", None).unwrap()));
        assert!(!Rc::ptr_eq(&b, &store.pod_xcconfig("B", None).unwrap()));
        assert!(!Rc::ptr_eq(&c, &store.pod_xcconfig("C", None).unwrap()));
        assert!(!Rc::ptr_eq(
            &aggregate,
            &store.aggregate_xcconfig("Pods-App", "Debug").unwrap()
        ));
    }

    #[test]
    fn test_clear_leaves_unrelated_targets_cached() {
        let mut graph = chain_graph();
        graph.add_pod_target(fixture_pod_target("Unrelated")).unwrap();
        let sandbox = Sandbox::new("/repo/Pods");
        let store = SettingsStore::new(&graph, &sandbox);

        let unrelated = store.pod_xcconfig("Unrelated", None).unwrap();
        store.pod_xcconfig("A", None).unwrap();
        store.clear("A");

        assert!(Rc::ptr_eq(
            &unrelated,
            &store.pod_xcconfig("Unrelated", None).unwrap()
        ));
        assert_eq!(
            store.cached_pod_labels().into_iter().collect::<Vec<_>>(),
            vec!["Unrelated".to_string()]
        );
    }

    #[test]
    fn test_unknown_label_is_an_error() {
        let graph = chain_graph();
        let sandbox = Sandbox::new("/repo/Pods");
        let store = SettingsStore::new(&graph, &sandbox);
        assert!(matches!(
            store.pod_xcconfig("Ghost", None),
            Err(TargetError::UnknownTarget(_))
        ));
        assert!(matches!(
            store.aggregate_xcconfig("Pods-Ghost", "Debug"),
            Err(TargetError::UnknownTarget(_))
        ));
    }
}
