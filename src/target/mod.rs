//! The target model: the nodes of the generated dependency graph.
//!
//! [`PodTarget`] is the compiled unit for one pod scoped to a platform and
//! scope; [`AggregateTarget`] is the umbrella a consuming project links
//! against. [`TargetGraph`] owns both sets keyed by label and answers the
//! graph questions (transitive closures, reverse dependencies) the
//! settings engine and cache analyzer need.

pub mod aggregate_target;
pub mod build_settings;
pub mod build_type;
pub mod pod_target;

pub use aggregate_target::{AggregateTarget, UserTarget, UserTargetKind};
pub use build_type::{BuildType, Linkage, Packaging};
pub use pod_target::PodTarget;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::version::Version;

/// How a build configuration optimizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigurationType {
    Debug,
    Release,
}

/// One target block of the user's manifest, as resolved for generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetDefinition {
    pub name: String,
    /// Abstract definitions group children and are never generated.
    pub abstract_target: bool,
    pub platform: Platform,
    /// Whether the definition requested framework packaging.
    pub uses_frameworks: bool,
    pub swift_version: Option<Version>,
    /// Build configurations of the user project, name to type.
    pub build_configurations: BTreeMap<String, ConfigurationType>,
    /// Whether the manifest requested the ARC compatibility flag.
    pub arc_compatibility_flag: bool,
    /// Whether warnings are inhibited for integrated pods.
    pub inhibit_warnings: bool,
}

impl TargetDefinition {
    pub fn new(name: &str, platform: Platform) -> Self {
        let mut build_configurations = BTreeMap::new();
        build_configurations.insert("Debug".to_string(), ConfigurationType::Debug);
        build_configurations.insert("Release".to_string(), ConfigurationType::Release);
        Self {
            name: name.to_string(),
            abstract_target: false,
            platform,
            uses_frameworks: false,
            swift_version: None,
            build_configurations,
            arc_compatibility_flag: false,
            inhibit_warnings: false,
        }
    }
}

/// Contract errors for target construction and graph lookups.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("pod target must have at least one spec")]
    NoSpecs,

    #[error("pod target '{0}' must have at least one target definition")]
    NoTargetDefinitions(String),

    #[error("pod target '{0}' cannot be constructed from only abstract target definitions")]
    OnlyAbstractTargetDefinitions(String),

    #[error("pod target '{0}' scope suffix must be non-empty when present")]
    EmptyScopeSuffix(String),

    #[error("specs of pod target '{0}' must share one root spec")]
    MixedRootSpecs(String),

    #[error("duplicate target label '{0}'")]
    DuplicateLabel(String),

    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    #[error("pod target '{target}' has no test spec named '{spec}'")]
    UnknownTestSpec { target: String, spec: String },
}

/// All generated targets keyed by label.
#[derive(Debug, Default)]
pub struct TargetGraph {
    pod_targets: BTreeMap<String, PodTarget>,
    aggregate_targets: BTreeMap<String, AggregateTarget>,
}

impl TargetGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pod_target(&mut self, target: PodTarget) -> Result<(), TargetError> {
        let label = target.label().to_string();
        if self.pod_targets.contains_key(&label) {
            return Err(TargetError::DuplicateLabel(label));
        }
        self.pod_targets.insert(label, target);
        Ok(())
    }

    pub fn add_aggregate_target(&mut self, target: AggregateTarget) -> Result<(), TargetError> {
        let label = target.label();
        if self.aggregate_targets.contains_key(&label) {
            return Err(TargetError::DuplicateLabel(label));
        }
        self.aggregate_targets.insert(label, target);
        Ok(())
    }

    pub fn pod_target(&self, label: &str) -> Option<&PodTarget> {
        self.pod_targets.get(label)
    }

    pub fn aggregate_target(&self, label: &str) -> Option<&AggregateTarget> {
        self.aggregate_targets.get(label)
    }

    /// Pod targets in label order.
    pub fn pod_targets(&self) -> impl Iterator<Item = &PodTarget> {
        self.pod_targets.values()
    }

    /// Aggregate targets in label order.
    pub fn aggregate_targets(&self) -> impl Iterator<Item = &AggregateTarget> {
        self.aggregate_targets.values()
    }

    /// Checks that every dependency edge resolves to a known target.
    pub fn validate(&self) -> Result<(), TargetError> {
        for target in self.pod_targets.values() {
            for dep in target.all_declared_dependency_labels() {
                if !self.pod_targets.contains_key(dep) {
                    return Err(TargetError::UnknownTarget(dep.to_string()));
                }
            }
        }
        for target in self.aggregate_targets.values() {
            for label in target.pod_target_labels() {
                if !self.pod_targets.contains_key(label) {
                    return Err(TargetError::UnknownTarget(label.to_string()));
                }
            }
            for label in &target.search_paths_aggregate_targets {
                if !self.aggregate_targets.contains_key(label) {
                    return Err(TargetError::UnknownTarget(label.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Resolves a validated pod-target edge. Edges are validated when the
    /// graph is assembled; a miss here is a programmer error.
    pub(crate) fn lookup(&self, label: &str) -> &PodTarget {
        match self.pod_targets.get(label) {
            Some(target) => target,
            None => panic!("dependency edge references unknown pod target '{label}'"),
        }
    }

    /// Resolves a validated aggregate-target edge.
    pub(crate) fn lookup_aggregate(&self, label: &str) -> &AggregateTarget {
        match self.aggregate_targets.get(label) {
            Some(target) => target,
            None => panic!("edge references unknown aggregate target '{label}'"),
        }
    }

    /// The transitive closure of a pod target's `dependent_targets`,
    /// excluding the target itself. Cycle-safe: each node is traversed at
    /// most once.
    pub fn recursive_dependent_targets<'a>(&'a self, target: &PodTarget) -> Vec<&'a PodTarget> {
        self.closure_from(target, target.dependent_targets.iter().map(String::as_str))
    }

    /// Like [`Self::recursive_dependent_targets`] but seeded with a test
    /// spec's own dependencies as well, for test-bundle settings.
    pub fn all_dependent_targets<'a>(
        &'a self,
        target: &PodTarget,
        test_spec_name: &str,
    ) -> Vec<&'a PodTarget> {
        let test_deps = target
            .test_dependent_targets_by_spec_name
            .get(test_spec_name)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let seeds = target
            .dependent_targets
            .iter()
            .chain(test_deps)
            .map(String::as_str);
        self.closure_from(target, seeds)
    }

    fn closure_from<'a, 's>(
        &'a self,
        origin: &PodTarget,
        seeds: impl Iterator<Item = &'s str>,
    ) -> Vec<&'a PodTarget> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<String> = seeds.map(str::to_string).collect();
        let mut result = Vec::new();
        while let Some(label) = queue.pop_front() {
            if label == origin.label() || !visited.insert(label.clone()) {
                continue;
            }
            let target = self.lookup(&label);
            result.push(target);
            queue.extend(target.dependent_targets.iter().cloned());
        }
        result
    }

    /// Labels of pod targets that (transitively) depend on `label`,
    /// excluding `label` itself. Used for top-down cache invalidation.
    pub fn transitive_dependents_of(&self, label: &str) -> BTreeSet<String> {
        let mut dependents = BTreeSet::new();
        for target in self.pod_targets.values() {
            if target.label() == label {
                continue;
            }
            let reaches = self
                .recursive_dependent_targets(target)
                .iter()
                .any(|t| t.label() == label)
                || self.test_closure_reaches(target, label);
            if reaches {
                dependents.insert(target.label().to_string());
            }
        }
        dependents
    }

    fn test_closure_reaches(&self, target: &PodTarget, label: &str) -> bool {
        target
            .test_dependent_targets_by_spec_name
            .keys()
            .any(|spec| {
                self.all_dependent_targets(target, spec)
                    .iter()
                    .any(|t| t.label() == label)
            })
    }

    /// Labels of aggregate targets whose pod-target set intersects
    /// `pod_labels` in any configuration, closed over search-paths
    /// inheritance (an aggregate inheriting search paths from an affected
    /// aggregate is itself affected).
    pub fn aggregates_depending_on(&self, pod_labels: &BTreeSet<String>) -> BTreeSet<String> {
        let mut affected: BTreeSet<String> = self
            .aggregate_targets
            .values()
            .filter(|agg| agg.pod_target_labels().any(|l| pod_labels.contains(l)))
            .map(|agg| agg.label())
            .collect();

        loop {
            let next: Vec<String> = self
                .aggregate_targets
                .values()
                .filter(|agg| !affected.contains(&agg.label()))
                .filter(|agg| {
                    agg.search_paths_aggregate_targets
                        .iter()
                        .any(|l| affected.contains(l))
                })
                .map(|agg| agg.label())
                .collect();
            if next.is_empty() {
                break;
            }
            affected.extend(next);
        }
        affected
    }
}
