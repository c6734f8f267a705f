//! Post-computation validation of the target graph.
//!
//! Runs after all targets and settings are computed, and collects every
//! violation across every target before failing, so one run reports the
//! complete set of problems.

use std::collections::BTreeMap;
use std::fmt;

use crate::target::{PodTarget, TargetGraph};

/// One configuration problem found during validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error(
        "the '{aggregate}' target has {kind} with conflicting names in the \
         '{configuration}' configuration: {}", names.join(", ")
    )]
    DuplicateProductNames {
        aggregate: String,
        configuration: String,
        kind: &'static str,
        names: Vec<String>,
    },

    #[error(
        "the '{aggregate}' target has transitive dependencies that include \
         static binaries: {}", artifacts.join(", ")
    )]
    StaticTransitiveDependencies {
        aggregate: String,
        configuration: String,
        artifacts: Vec<String>,
    },

    #[error(
        "pods written in Swift can only be integrated as frameworks; the \
         '{aggregate}' target integrates the Swift {}: {}",
        if pods.len() == 1 { "pod" } else { "pods" },
        pods.join(", ")
    )]
    SwiftPodsRequireFrameworks {
        aggregate: String,
        configuration: String,
        pods: Vec<String>,
    },

    #[error(
        "the Swift pod '{pod}' is integrated with divergent module \
         requirements; all integrating targets must agree on whether it \
         builds as a module"
    )]
    DivergentModuleDefinition { pod: String },

    #[error(
        "the pod '{pod}' is required at incompatible Swift versions by its \
         integrating targets: {}", versions.join(", ")
    )]
    DivergentSwiftVersions { pod: String, versions: Vec<String> },
}

/// All violations found in one validation pass.
#[derive(Debug)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl std::error::Error for ValidationError {}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "target validation failed:")?;
        for violation in &self.violations {
            writeln!(f, "  - {violation}")?;
        }
        Ok(())
    }
}

/// Validates the computed pod and aggregate targets.
pub struct TargetValidator<'a> {
    graph: &'a TargetGraph,
}

impl<'a> TargetValidator<'a> {
    pub fn new(graph: &'a TargetGraph) -> Self {
        Self { graph }
    }

    /// Runs every check and returns all violations at once.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        self.check_duplicate_product_names(&mut violations);
        self.check_static_transitive_dependencies(&mut violations);
        self.check_swift_pods_without_frameworks(&mut violations);
        self.check_divergent_module_definitions(&mut violations);
        self.check_divergent_swift_versions(&mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }

    fn pod_targets_for(&self, labels: &[String]) -> Vec<&'a PodTarget> {
        labels
            .iter()
            .filter_map(|label| self.graph.pod_target(label))
            .collect()
    }

    fn check_duplicate_product_names(&self, violations: &mut Vec<Violation>) {
        for aggregate in self.graph.aggregate_targets() {
            for configuration in aggregate.build_configurations().keys() {
                let pods =
                    self.pod_targets_for(aggregate.pod_targets_for_build_configuration(configuration));

                let mut frameworks: Vec<String> = pods
                    .iter()
                    .flat_map(|pod| pod.file_accessors.iter())
                    .flat_map(|fa| fa.vendored_frameworks())
                    .filter_map(|path| path.file_name())
                    .map(|name| name.to_string_lossy().to_string())
                    .collect();
                frameworks.sort_unstable();
                frameworks.dedup();
                frameworks.extend(
                    pods.iter()
                        .filter(|pod| pod.should_build() && pod.build_type().is_framework())
                        .map(|pod| format!("{}.framework", pod.product_module_name())),
                );
                self.report_duplicates(
                    violations,
                    &aggregate.label(),
                    configuration,
                    "frameworks",
                    frameworks,
                );

                let mut libraries: Vec<String> = pods
                    .iter()
                    .flat_map(|pod| pod.file_accessors.iter())
                    .flat_map(|fa| fa.vendored_libraries())
                    .filter_map(|path| path.file_name())
                    .map(|name| name.to_string_lossy().to_string())
                    .collect();
                libraries.sort_unstable();
                libraries.dedup();
                libraries.extend(
                    pods.iter()
                        .filter(|pod| pod.should_build() && pod.build_type().is_library())
                        .map(|pod| pod.product_name()),
                );
                self.report_duplicates(
                    violations,
                    &aggregate.label(),
                    configuration,
                    "libraries",
                    libraries,
                );
            }
        }
    }

    fn report_duplicates(
        &self,
        violations: &mut Vec<Violation>,
        aggregate: &str,
        configuration: &str,
        kind: &'static str,
        names: Vec<String>,
    ) {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for name in &names {
            *counts.entry(name.to_lowercase()).or_default() += 1;
        }
        let duplicates: Vec<String> = counts
            .into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name)
            .collect();
        if !duplicates.is_empty() {
            violations.push(Violation::DuplicateProductNames {
                aggregate: aggregate.to_string(),
                configuration: configuration.to_string(),
                kind,
                names: duplicates,
            });
        }
    }

    fn check_static_transitive_dependencies(&self, violations: &mut Vec<Violation>) {
        for aggregate in self.graph.aggregate_targets() {
            if !aggregate.uses_frameworks() {
                continue;
            }
            for configuration in aggregate.build_configurations().keys() {
                let pods =
                    self.pod_targets_for(aggregate.pod_targets_for_build_configuration(configuration));
                let dependency_names: Vec<&str> = pods
                    .iter()
                    .filter(|pod| pod.should_build())
                    .flat_map(|pod| pod.spec_dependencies())
                    .collect();
                let artifacts: Vec<String> = pods
                    .iter()
                    .filter(|pod| {
                        dependency_names.contains(&pod.pod_name()) && !pod.should_build()
                    })
                    .flat_map(|pod| pod.file_accessors.iter())
                    .flat_map(|fa| fa.vendored_static_artifacts())
                    .map(|path| path.display().to_string())
                    .collect();
                if !artifacts.is_empty() {
                    violations.push(Violation::StaticTransitiveDependencies {
                        aggregate: aggregate.label(),
                        configuration: configuration.clone(),
                        artifacts,
                    });
                }
            }
        }
    }

    fn check_swift_pods_without_frameworks(&self, violations: &mut Vec<Violation>) {
        for aggregate in self.graph.aggregate_targets() {
            if aggregate.uses_frameworks() {
                continue;
            }
            for configuration in aggregate.build_configurations().keys() {
                let swift_pods: Vec<String> = self
                    .pod_targets_for(aggregate.pod_targets_for_build_configuration(configuration))
                    .iter()
                    .filter(|pod| pod.uses_swift())
                    .map(|pod| pod.label().to_string())
                    .collect();
                if !swift_pods.is_empty() {
                    violations.push(Violation::SwiftPodsRequireFrameworks {
                        aggregate: aggregate.label(),
                        configuration: configuration.clone(),
                        pods: swift_pods,
                    });
                }
            }
        }
    }

    fn targets_by_pod_name(&self) -> BTreeMap<&str, Vec<&'a PodTarget>> {
        let mut by_name: BTreeMap<&str, Vec<&'a PodTarget>> = BTreeMap::new();
        for target in self.graph.pod_targets() {
            by_name.entry(target.pod_name()).or_default().push(target);
        }
        by_name
    }

    fn check_divergent_module_definitions(&self, violations: &mut Vec<Violation>) {
        for (pod_name, targets) in self.targets_by_pod_name() {
            if !targets.iter().any(|t| t.uses_swift()) {
                continue;
            }
            let mut requirements: Vec<bool> =
                targets.iter().map(|t| t.defines_module()).collect();
            requirements.sort_unstable();
            requirements.dedup();
            if requirements.len() > 1 {
                violations.push(Violation::DivergentModuleDefinition {
                    pod: pod_name.to_string(),
                });
            }
        }
    }

    fn check_divergent_swift_versions(&self, violations: &mut Vec<Violation>) {
        for (pod_name, targets) in self.targets_by_pod_name() {
            let mut versions: Vec<String> = targets
                .iter()
                .filter_map(|t| t.swift_version())
                .map(|v| v.to_string())
                .collect();
            versions.sort_unstable();
            versions.dedup();
            if versions.len() > 1 {
                violations.push(Violation::DivergentSwiftVersions {
                    pod: pod_name.to_string(),
                    versions,
                });
            }
        }
    }
}
