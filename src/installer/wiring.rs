//! Dependency wiring between generated native targets.
//!
//! Target installation creates native targets; this module connects them
//! afterwards: pod to pod, test bundle to its dependencies, aggregate to
//! pods and to search-paths aggregates. Wiring walks result maps in label
//! order so the produced project is identical across runs.

use std::collections::BTreeMap;

use podgen_xcodeproj::{NativeTargetId, Project, ProjectError};

use crate::target::{AggregateTarget, PodTarget, TargetError, TargetGraph};

/// Native targets produced when one target was installed into a project.
#[derive(Debug, Clone)]
pub struct TargetInstallationResult {
    pub target_label: String,
    pub native_target: NativeTargetId,
    /// Resource-bundle native targets of the library variant.
    pub resource_bundle_targets: Vec<NativeTargetId>,
    /// Test native targets keyed by test spec name.
    pub test_native_targets: BTreeMap<String, NativeTargetId>,
    /// Resource-bundle native targets keyed by test spec name.
    pub test_resource_bundle_targets: BTreeMap<String, Vec<NativeTargetId>>,
}

impl TargetInstallationResult {
    pub fn new(target_label: &str, native_target: NativeTargetId) -> Self {
        Self {
            target_label: target_label.to_string(),
            native_target,
            resource_bundle_targets: Vec::new(),
            test_native_targets: BTreeMap::new(),
            test_resource_bundle_targets: BTreeMap::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WiringError {
    #[error("no installation result for target '{0}'")]
    MissingInstallationResult(String),

    #[error(transparent)]
    Target(#[from] TargetError),

    #[error(transparent)]
    Project(#[from] ProjectError),
}

/// Wires the dependency edges between pod targets' native targets.
pub struct PodTargetDependencyInstaller<'a> {
    graph: &'a TargetGraph,
    installation_results: &'a BTreeMap<String, TargetInstallationResult>,
}

impl<'a> PodTargetDependencyInstaller<'a> {
    pub fn new(
        graph: &'a TargetGraph,
        installation_results: &'a BTreeMap<String, TargetInstallationResult>,
    ) -> Self {
        Self {
            graph,
            installation_results,
        }
    }

    pub fn install(&self, project: &mut Project) -> Result<(), WiringError> {
        for result in self.installation_results.values() {
            let pod_target = self.pod_target(&result.target_label)?;
            self.wire_resource_bundles(project, pod_target, result)?;
            self.wire_dependencies(project, pod_target, result)?;
            self.wire_test_targets(project, pod_target, result)?;
        }
        Ok(())
    }

    fn pod_target(&self, label: &str) -> Result<&'a PodTarget, TargetError> {
        self.graph
            .pod_target(label)
            .ok_or_else(|| TargetError::UnknownTarget(label.to_string()))
    }

    fn result(&self, label: &str) -> Result<&'a TargetInstallationResult, WiringError> {
        self.installation_results
            .get(label)
            .ok_or_else(|| WiringError::MissingInstallationResult(label.to_string()))
    }

    fn wire_resource_bundles(
        &self,
        project: &mut Project,
        pod_target: &PodTarget,
        result: &TargetInstallationResult,
    ) -> Result<(), WiringError> {
        for &bundle in &result.resource_bundle_targets {
            project.add_dependency(result.native_target, bundle)?;
            // Dynamic frameworks carry their bundles inside the product.
            if pod_target.build_type().is_dynamic_framework() && pod_target.should_build() {
                let product = project.target(bundle)?.product_name();
                let reference = project.product_file_reference(&product);
                project.add_file_to_resources_phase(result.native_target, reference)?;
            }
        }
        Ok(())
    }

    fn wire_dependencies(
        &self,
        project: &mut Project,
        pod_target: &PodTarget,
        result: &TargetInstallationResult,
    ) -> Result<(), WiringError> {
        let mut labels = pod_target.dependent_targets.clone();
        labels.sort_unstable();
        for label in &labels {
            let dependency = self.pod_target(label)?;
            let dependency_result = self.result(label)?;
            project.add_dependency(result.native_target, dependency_result.native_target)?;
            link_built_product(project, result.native_target, pod_target, dependency)?;
        }
        Ok(())
    }

    fn wire_test_targets(
        &self,
        project: &mut Project,
        pod_target: &PodTarget,
        result: &TargetInstallationResult,
    ) -> Result<(), WiringError> {
        for (test_spec_name, &test_native_target) in &result.test_native_targets {
            if let Some(bundles) = result.test_resource_bundle_targets.get(test_spec_name) {
                for &bundle in bundles {
                    project.add_dependency(test_native_target, bundle)?;
                }
            }

            // The test bundle depends on the pod itself plus the test
            // spec's own dependencies, deduplicated in that order.
            let mut labels = vec![pod_target.label().to_string()];
            if let Some(test_deps) = pod_target
                .test_dependent_targets_by_spec_name
                .get(test_spec_name)
            {
                let mut sorted = test_deps.clone();
                sorted.sort_unstable();
                for label in sorted {
                    if !labels.contains(&label) {
                        labels.push(label);
                    }
                }
            }

            for label in &labels {
                let dependency = self.pod_target(label)?;
                let dependency_result = self.result(label)?;
                project.add_dependency(test_native_target, dependency_result.native_target)?;
                for &bundle in &dependency_result.resource_bundle_targets {
                    project.add_dependency(test_native_target, bundle)?;
                }
                link_built_product(project, test_native_target, pod_target, dependency)?;
            }
        }
        Ok(())
    }
}

/// Wires aggregate targets to their pod targets and inherited aggregates.
pub struct AggregateTargetDependencyInstaller<'a> {
    graph: &'a TargetGraph,
    aggregate_installation_results: &'a BTreeMap<String, TargetInstallationResult>,
    pod_installation_results: &'a BTreeMap<String, TargetInstallationResult>,
}

impl<'a> AggregateTargetDependencyInstaller<'a> {
    pub fn new(
        graph: &'a TargetGraph,
        aggregate_installation_results: &'a BTreeMap<String, TargetInstallationResult>,
        pod_installation_results: &'a BTreeMap<String, TargetInstallationResult>,
    ) -> Self {
        Self {
            graph,
            aggregate_installation_results,
            pod_installation_results,
        }
    }

    pub fn install(&self, project: &mut Project) -> Result<(), WiringError> {
        for result in self.aggregate_installation_results.values() {
            let aggregate = self.aggregate_target(&result.target_label)?;
            let extension_api_only = aggregate.application_extension_api_only();
            if extension_api_only {
                configure_extension_api_only(project, result.native_target)?;
            }

            for label in &aggregate.search_paths_aggregate_targets {
                let inherited = self
                    .aggregate_installation_results
                    .get(label)
                    .ok_or_else(|| WiringError::MissingInstallationResult(label.clone()))?;
                project.add_dependency(result.native_target, inherited.native_target)?;
            }

            for label in aggregate.pod_target_labels() {
                let pod_target = self
                    .graph
                    .pod_target(label)
                    .ok_or_else(|| TargetError::UnknownTarget(label.to_string()))?;
                let pod_result = self
                    .pod_installation_results
                    .get(label)
                    .ok_or_else(|| WiringError::MissingInstallationResult(label.to_string()))?;
                project.add_dependency(result.native_target, pod_result.native_target)?;
                if extension_api_only {
                    configure_extension_api_only(project, pod_result.native_target)?;
                }
                if pod_target.should_build() && pod_target.build_type().is_dynamic() {
                    let reference = project.product_file_reference(&pod_target.product_name());
                    project.add_file_to_frameworks_phase(result.native_target, reference)?;
                }
            }
        }
        Ok(())
    }

    fn aggregate_target(&self, label: &str) -> Result<&'a AggregateTarget, TargetError> {
        self.graph
            .aggregate_target(label)
            .ok_or_else(|| TargetError::UnknownTarget(label.to_string()))
    }
}

/// Links a built dynamic dependency's product into a dependent's
/// frameworks build phase. Static consumers absorb their dependencies
/// instead of linking them, so nothing is added for those.
fn link_built_product(
    project: &mut Project,
    native_target: NativeTargetId,
    pod_target: &PodTarget,
    dependency: &PodTarget,
) -> Result<(), ProjectError> {
    if pod_target.should_build() && pod_target.build_type().is_dynamic() && dependency.should_build()
    {
        let reference = project.product_file_reference(&dependency.product_name());
        project.add_file_to_frameworks_phase(native_target, reference)?;
    }
    Ok(())
}

fn configure_extension_api_only(
    project: &mut Project,
    native_target: NativeTargetId,
) -> Result<(), ProjectError> {
    project.set_build_setting_in_all_configurations(
        native_target,
        "APPLICATION_EXTENSION_API_ONLY",
        "YES",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::target::pod_target::tests::{fixture_pod_target, fixture_spec};
    use crate::target::{
        AggregateTarget, BuildType, PodTarget, TargetDefinition, UserTarget, UserTargetKind,
    };
    use podgen_xcodeproj::ProductType;
    use std::path::PathBuf;

    fn dynamic_framework_target(name: &str) -> PodTarget {
        let mut target = PodTarget::new(
            vec![fixture_spec(name)],
            vec![TargetDefinition::new("App", Platform::ios())],
            Platform::ios(),
            BuildType::dynamic_framework(),
            vec![],
            None,
        )
        .unwrap();
        let mut accessor = crate::sandbox::FileAccessor::empty(name);
        accessor.source_files = vec![format!("{name}/Sources/{name}.m").into()];
        target.file_accessors.push(accessor);
        target
    }

    fn project() -> Project {
        Project::new("Pods", vec!["Debug".to_string(), "Release".to_string()])
    }

    fn install_target(project: &mut Project, target: &PodTarget) -> TargetInstallationResult {
        let id = project
            .new_target(target.label(), target.product_type(), &target.product_basename())
            .unwrap();
        TargetInstallationResult::new(target.label(), id)
    }

    #[test]
    fn test_pod_dependencies_and_product_linkage() {
        let mut graph = TargetGraph::new();
        let mut alpha = dynamic_framework_target("Alpha");
        alpha.dependent_targets = vec!["Beta".to_string()];
        graph.add_pod_target(alpha).unwrap();
        graph.add_pod_target(dynamic_framework_target("Beta")).unwrap();

        let mut project = project();
        let mut results = BTreeMap::new();
        for target in graph.pod_targets() {
            results.insert(target.label().to_string(), install_target(&mut project, target));
        }

        PodTargetDependencyInstaller::new(&graph, &results)
            .install(&mut project)
            .unwrap();

        let alpha_native = project.target(results["Alpha"].native_target).unwrap();
        assert_eq!(alpha_native.dependencies(), &[results["Beta"].native_target]);
        let linked: Vec<&str> = alpha_native
            .frameworks_build_phase()
            .iter()
            .map(|&f| project.file_reference(f).unwrap().path.as_str())
            .collect();
        assert_eq!(linked, vec!["Beta.framework"]);
    }

    #[test]
    fn test_static_consumer_does_not_link_products() {
        let mut graph = TargetGraph::new();
        let mut alpha = fixture_pod_target("Alpha");
        alpha.dependent_targets = vec!["Beta".to_string()];
        graph.add_pod_target(alpha).unwrap();
        graph.add_pod_target(dynamic_framework_target("Beta")).unwrap();

        let mut project = project();
        let mut results = BTreeMap::new();
        for target in graph.pod_targets() {
            results.insert(target.label().to_string(), install_target(&mut project, target));
        }

        PodTargetDependencyInstaller::new(&graph, &results)
            .install(&mut project)
            .unwrap();

        let alpha_native = project.target(results["Alpha"].native_target).unwrap();
        assert_eq!(alpha_native.dependencies(), &[results["Beta"].native_target]);
        assert!(alpha_native.frameworks_build_phase().is_empty());
    }

    #[test]
    fn test_test_target_wiring_includes_pod_and_bundles() {
        let mut graph = TargetGraph::new();
        let mut alpha = dynamic_framework_target("Alpha");
        alpha
            .test_dependent_targets_by_spec_name
            .insert("Alpha/Tests".to_string(), vec!["Mocks".to_string()]);
        graph.add_pod_target(alpha).unwrap();
        graph.add_pod_target(fixture_pod_target("Mocks")).unwrap();

        let mut project = project();
        let mut results = BTreeMap::new();
        for target in graph.pod_targets() {
            results.insert(target.label().to_string(), install_target(&mut project, target));
        }

        let test_native = project
            .new_target("Alpha-Unit-Tests", ProductType::UnitTestBundle, "Alpha-Unit-Tests")
            .unwrap();
        let mocks_bundle = project
            .new_target("Mocks-Fixtures", ProductType::Bundle, "Fixtures")
            .unwrap();
        results
            .get_mut("Alpha")
            .unwrap()
            .test_native_targets
            .insert("Alpha/Tests".to_string(), test_native);
        results
            .get_mut("Mocks")
            .unwrap()
            .resource_bundle_targets
            .push(mocks_bundle);

        PodTargetDependencyInstaller::new(&graph, &results)
            .install(&mut project)
            .unwrap();

        let test_target = project.target(test_native).unwrap();
        assert!(test_target
            .dependencies()
            .contains(&results["Alpha"].native_target));
        assert!(test_target
            .dependencies()
            .contains(&results["Mocks"].native_target));
        assert!(test_target.dependencies().contains(&mocks_bundle));
    }

    #[test]
    fn test_dynamic_framework_attaches_resource_bundles() {
        let mut graph = TargetGraph::new();
        graph.add_pod_target(dynamic_framework_target("Alpha")).unwrap();

        let mut project = project();
        let alpha = graph.pod_target("Alpha").unwrap();
        let mut result = install_target(&mut project, alpha);
        let bundle = project
            .new_target("Alpha-Assets", ProductType::Bundle, "Assets")
            .unwrap();
        result.resource_bundle_targets.push(bundle);
        let mut results = BTreeMap::new();
        results.insert("Alpha".to_string(), result);

        PodTargetDependencyInstaller::new(&graph, &results)
            .install(&mut project)
            .unwrap();

        let native = project.target(results["Alpha"].native_target).unwrap();
        assert_eq!(native.dependencies(), &[bundle]);
        let resources: Vec<&str> = native
            .resources_build_phase()
            .iter()
            .map(|&f| project.file_reference(f).unwrap().path.as_str())
            .collect();
        assert_eq!(resources, vec!["Assets.bundle"]);
    }

    #[test]
    fn test_aggregate_wiring_with_extension_propagation() {
        let mut graph = TargetGraph::new();
        graph.add_pod_target(dynamic_framework_target("Alpha")).unwrap();

        let mut definition = TargetDefinition::new("Widget", Platform::ios());
        definition.uses_frameworks = true;
        let mut aggregate = AggregateTarget::new(definition, PathBuf::from("/repo"));
        aggregate.add_pod_targets_for_all_configurations(vec!["Alpha".to_string()]);
        aggregate.user_targets.push(UserTarget {
            name: "Widget".to_string(),
            kind: UserTargetKind::AppExtension,
            application_extension_api_only: false,
        });
        graph.add_aggregate_target(aggregate).unwrap();

        let mut project = project();
        let alpha = graph.pod_target("Alpha").unwrap();
        let mut pod_results = BTreeMap::new();
        pod_results.insert("Alpha".to_string(), install_target(&mut project, alpha));

        let aggregate_native = project
            .new_target("Pods-Widget", ProductType::StaticLibrary, "Pods-Widget")
            .unwrap();
        let mut aggregate_results = BTreeMap::new();
        aggregate_results.insert(
            "Pods-Widget".to_string(),
            TargetInstallationResult::new("Pods-Widget", aggregate_native),
        );

        AggregateTargetDependencyInstaller::new(&graph, &aggregate_results, &pod_results)
            .install(&mut project)
            .unwrap();

        let native = project.target(aggregate_native).unwrap();
        assert_eq!(native.dependencies(), &[pod_results["Alpha"].native_target]);
        assert_eq!(
            native.build_setting("Debug", "APPLICATION_EXTENSION_API_ONLY"),
            Some("YES")
        );
        let pod_native = project.target(pod_results["Alpha"].native_target).unwrap();
        assert_eq!(
            pod_native.build_setting("Release", "APPLICATION_EXTENSION_API_ONLY"),
            Some("YES")
        );
        let linked: Vec<&str> = native
            .frameworks_build_phase()
            .iter()
            .map(|&f| project.file_reference(f).unwrap().path.as_str())
            .collect();
        assert_eq!(linked, vec!["Alpha.framework"]);
    }

    #[test]
    fn test_search_paths_aggregate_wiring_and_missing_result() {
        let mut graph = TargetGraph::new();
        let base = AggregateTarget::new(
            TargetDefinition::new("App", Platform::ios()),
            PathBuf::from("/repo"),
        );
        let mut inheriting = AggregateTarget::new(
            TargetDefinition::new("AppTests", Platform::ios()),
            PathBuf::from("/repo"),
        );
        inheriting.search_paths_aggregate_targets = vec![base.label()];
        graph.add_aggregate_target(base).unwrap();
        graph.add_aggregate_target(inheriting).unwrap();

        let mut project = project();
        let base_native = project
            .new_target("Pods-App", ProductType::StaticLibrary, "Pods-App")
            .unwrap();
        let tests_native = project
            .new_target("Pods-AppTests", ProductType::StaticLibrary, "Pods-AppTests")
            .unwrap();

        let pod_results = BTreeMap::new();
        let mut aggregate_results = BTreeMap::new();
        aggregate_results.insert(
            "Pods-AppTests".to_string(),
            TargetInstallationResult::new("Pods-AppTests", tests_native),
        );

        let err = AggregateTargetDependencyInstaller::new(&graph, &aggregate_results, &pod_results)
            .install(&mut project)
            .unwrap_err();
        assert!(matches!(err, WiringError::MissingInstallationResult(label) if label == "Pods-App"));

        aggregate_results.insert(
            "Pods-App".to_string(),
            TargetInstallationResult::new("Pods-App", base_native),
        );
        AggregateTargetDependencyInstaller::new(&graph, &aggregate_results, &pod_results)
            .install(&mut project)
            .unwrap();
        assert_eq!(
            project.target(tests_native).unwrap().dependencies(),
            &[base_native]
        );
    }
}
