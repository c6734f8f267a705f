//! Decides which targets must be regenerated.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::sandbox::Sandbox;
use crate::target::build_settings::SettingsStore;
use crate::target::{ConfigurationType, TargetGraph};

use super::{CacheError, KeyDifference, ProjectInstallationCache, TargetCacheKey};

/// The regeneration scope for one run, plus the fresh fingerprints to
/// persist once that run succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectCacheAnalysisResult {
    /// Labels of pod targets that must be regenerated, sorted.
    pub pod_targets_to_generate: Vec<String>,
    /// Labels of aggregate targets to regenerate. Aggregates share one
    /// generated project, so this is all of them or `None`.
    pub aggregate_targets_to_generate: Option<Vec<String>>,
    pub cache_key_by_target_label: BTreeMap<String, TargetCacheKey>,
}

/// Diffs live target fingerprints against the persisted cache.
pub struct ProjectCacheAnalyzer<'a> {
    sandbox: &'a Sandbox,
    cache: &'a ProjectInstallationCache,
    build_configurations: BTreeMap<String, ConfigurationType>,
    project_object_version: u32,
    podfile_plugins: BTreeMap<String, Value>,
    project_name: String,
    clean_install: bool,
}

impl<'a> ProjectCacheAnalyzer<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sandbox: &'a Sandbox,
        cache: &'a ProjectInstallationCache,
        build_configurations: BTreeMap<String, ConfigurationType>,
        project_object_version: u32,
        podfile_plugins: BTreeMap<String, Value>,
        project_name: &str,
        clean_install: bool,
    ) -> Self {
        Self {
            sandbox,
            cache,
            build_configurations,
            project_object_version,
            podfile_plugins,
            project_name: project_name.to_string(),
            clean_install,
        }
    }

    /// Compute the regeneration scope for the given graph.
    pub fn analyze(
        &self,
        graph: &TargetGraph,
        settings: &SettingsStore<'_>,
    ) -> Result<ProjectCacheAnalysisResult, CacheError> {
        let cache_key_by_target_label = self.compute_cache_keys(graph, settings)?;

        if self.clean_install || self.global_invalidators_changed() {
            return Ok(self.full_install_result(graph, cache_key_by_target_label));
        }

        let cached = self.cache.cache_key_by_target_label();
        let mut pod_targets_to_generate = BTreeSet::new();
        let mut regenerate_aggregates = false;

        // Added targets, and aggregates removed since the last run.
        for label in cache_key_by_target_label.keys() {
            if cached.contains_key(label) {
                continue;
            }
            if graph.pod_target(label).is_some() {
                pod_targets_to_generate.insert(label.clone());
            } else {
                regenerate_aggregates = true;
            }
        }
        for (label, key) in cached {
            if !cache_key_by_target_label.contains_key(label) && !key.is_pod_target() {
                regenerate_aggregates = true;
            }
        }

        // Fingerprint differences.
        for (label, key) in &cache_key_by_target_label {
            let Some(cached_key) = cached.get(label) else {
                continue;
            };
            if key.key_difference(cached_key) == KeyDifference::Project {
                if graph.pod_target(label).is_some() {
                    pod_targets_to_generate.insert(label.clone());
                } else {
                    regenerate_aggregates = true;
                }
            }
        }

        // Targets whose generated artifacts are missing on disk cannot
        // trust their cache entries.
        for target in graph.pod_targets() {
            let intact = self.sandbox.support_files_dir(target.label()).exists()
                && self
                    .sandbox
                    .pod_target_project_path(target.pod_name())
                    .exists();
            if !intact {
                pod_targets_to_generate.insert(target.label().to_string());
            }
        }
        for target in graph.aggregate_targets() {
            let intact = self.sandbox.support_files_dir(&target.label()).exists()
                && self.sandbox.project_path().exists();
            if !intact {
                regenerate_aggregates = true;
            }
        }

        // Targets of one pod share a generated project, so regenerating
        // any of them regenerates its siblings.
        let siblings: Vec<String> = graph
            .pod_targets()
            .filter(|target| {
                pod_targets_to_generate.iter().any(|label| {
                    graph
                        .pod_target(label)
                        .is_some_and(|t| t.pod_name() == target.pod_name())
                })
            })
            .map(|target| target.label().to_string())
            .collect();
        pod_targets_to_generate.extend(siblings);

        let aggregate_targets_to_generate = if regenerate_aggregates {
            Some(self.all_aggregate_labels(graph))
        } else {
            None
        };

        Ok(ProjectCacheAnalysisResult {
            pod_targets_to_generate: pod_targets_to_generate.into_iter().collect(),
            aggregate_targets_to_generate,
            cache_key_by_target_label,
        })
    }

    fn compute_cache_keys(
        &self,
        graph: &TargetGraph,
        settings: &SettingsStore<'_>,
    ) -> Result<BTreeMap<String, TargetCacheKey>, CacheError> {
        let mut keys = BTreeMap::new();
        for target in graph.pod_targets() {
            keys.insert(
                target.label().to_string(),
                TargetCacheKey::from_pod_target(target, settings, self.sandbox)?,
            );
        }
        for target in graph.aggregate_targets() {
            keys.insert(
                target.label(),
                TargetCacheKey::from_aggregate_target(target, settings)?,
            );
        }
        Ok(keys)
    }

    fn full_install_result(
        &self,
        graph: &TargetGraph,
        cache_key_by_target_label: BTreeMap<String, TargetCacheKey>,
    ) -> ProjectCacheAnalysisResult {
        ProjectCacheAnalysisResult {
            pod_targets_to_generate: graph
                .pod_targets()
                .map(|t| t.label().to_string())
                .collect(),
            aggregate_targets_to_generate: Some(self.all_aggregate_labels(graph)),
            cache_key_by_target_label,
        }
    }

    fn all_aggregate_labels(&self, graph: &TargetGraph) -> Vec<String> {
        graph.aggregate_targets().map(|t| t.label()).collect()
    }

    /// Build configurations, object version, plugins, and project name
    /// invalidate every target when they change.
    fn global_invalidators_changed(&self) -> bool {
        self.cache.build_configurations() != Some(&self.build_configurations)
            || self.cache.project_object_version() != Some(self.project_object_version)
            || self.cache.project_name() != Some(self.project_name.as_str())
            || !plugins_equal(self.cache.podfile_plugins(), &self.podfile_plugins)
    }
}

/// Plugin configurations compare by key/value equality with array-valued
/// parameters treated as unordered.
fn plugins_equal(a: &BTreeMap<String, Value>, b: &BTreeMap<String, Value>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(name, config)| {
        b.get(name)
            .is_some_and(|other| normalized(config) == normalized(other))
    })
}

fn normalized(value: &Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.iter().map(normalized).collect();
            items.sort_by_key(|v| v.to_string());
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, v)| (key.clone(), normalized(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;
    use crate::target::pod_target::tests::fixture_pod_target;
    use crate::target::{AggregateTarget, TargetDefinition};
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    struct Fixture {
        _tmp: tempfile::TempDir,
        sandbox: Sandbox,
        graph: TargetGraph,
    }

    fn fixture() -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(tmp.path());

        let mut graph = TargetGraph::new();
        graph.add_pod_target(fixture_pod_target("Alpha")).unwrap();
        graph.add_pod_target(fixture_pod_target("Beta")).unwrap();
        let mut aggregate = AggregateTarget::new(
            TargetDefinition::new("App", Platform::ios()),
            PathBuf::from("/repo"),
        );
        aggregate.add_pod_targets_for_all_configurations(vec![
            "Alpha".to_string(),
            "Beta".to_string(),
        ]);
        graph.add_aggregate_target(aggregate).unwrap();

        // Generated artifacts exist, so no target is dirty.
        for label in ["Alpha", "Beta", "Pods-App"] {
            fs::create_dir_all(sandbox.support_files_dir(label)).unwrap();
        }
        for pod in ["Alpha", "Beta"] {
            fs::create_dir_all(sandbox.pod_target_project_path(pod)).unwrap();
        }
        fs::create_dir_all(sandbox.project_path()).unwrap();

        Fixture {
            _tmp: tmp,
            sandbox,
            graph,
        }
    }

    fn configurations() -> BTreeMap<String, ConfigurationType> {
        TargetDefinition::new("App", Platform::ios()).build_configurations
    }

    fn analyzer<'a>(
        fixture: &'a Fixture,
        cache: &'a ProjectInstallationCache,
        clean_install: bool,
    ) -> ProjectCacheAnalyzer<'a> {
        ProjectCacheAnalyzer::new(
            &fixture.sandbox,
            cache,
            configurations(),
            55,
            BTreeMap::new(),
            "Pods",
            clean_install,
        )
    }

    fn warm_cache(fixture: &Fixture) -> ProjectInstallationCache {
        let empty = ProjectInstallationCache::empty();
        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);
        let result = analyzer(fixture, &empty, false)
            .analyze(&fixture.graph, &store)
            .unwrap();
        let mut cache = ProjectInstallationCache::empty();
        cache.update(
            result.cache_key_by_target_label,
            configurations(),
            55,
            BTreeMap::new(),
            "Pods",
        );
        cache
    }

    #[test]
    fn test_empty_cache_regenerates_everything() {
        let fixture = fixture();
        let cache = ProjectInstallationCache::empty();
        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);

        let result = analyzer(&fixture, &cache, false)
            .analyze(&fixture.graph, &store)
            .unwrap();
        assert_eq!(result.pod_targets_to_generate, vec!["Alpha", "Beta"]);
        assert_eq!(
            result.aggregate_targets_to_generate,
            Some(vec!["Pods-App".to_string()])
        );
    }

    #[test]
    fn test_second_run_with_no_changes_is_a_no_op() {
        let fixture = fixture();
        let cache = warm_cache(&fixture);
        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);

        let result = analyzer(&fixture, &cache, false)
            .analyze(&fixture.graph, &store)
            .unwrap();
        assert!(result.pod_targets_to_generate.is_empty());
        assert!(result.aggregate_targets_to_generate.is_none());
    }

    #[test]
    fn test_clean_install_ignores_the_cache() {
        let fixture = fixture();
        let cache = warm_cache(&fixture);
        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);

        let result = analyzer(&fixture, &cache, true)
            .analyze(&fixture.graph, &store)
            .unwrap();
        assert_eq!(result.pod_targets_to_generate, vec!["Alpha", "Beta"]);
        assert!(result.aggregate_targets_to_generate.is_some());
    }

    #[test]
    fn test_changed_checksum_regenerates_only_that_pod() {
        let mut fixture = fixture();
        let cache = warm_cache(&fixture);

        let mut graph = TargetGraph::new();
        let mut spec = crate::target::pod_target::tests::fixture_spec("Alpha");
        spec.checksum = "different".to_string();
        let mut alpha = crate::target::PodTarget::new(
            vec![spec],
            vec![TargetDefinition::new("App", Platform::ios())],
            Platform::ios(),
            crate::target::BuildType::static_library(),
            vec![],
            None,
        )
        .unwrap();
        let mut accessor = crate::sandbox::FileAccessor::empty("Alpha");
        accessor.source_files = vec!["Alpha/Sources/Alpha.m".into()];
        alpha.file_accessors.push(accessor);
        graph.add_pod_target(alpha).unwrap();
        graph.add_pod_target(fixture_pod_target("Beta")).unwrap();
        let mut aggregate = AggregateTarget::new(
            TargetDefinition::new("App", Platform::ios()),
            PathBuf::from("/repo"),
        );
        aggregate.add_pod_targets_for_all_configurations(vec![
            "Alpha".to_string(),
            "Beta".to_string(),
        ]);
        graph.add_aggregate_target(aggregate).unwrap();
        fixture.graph = graph;

        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);
        let result = analyzer(&fixture, &cache, false)
            .analyze(&fixture.graph, &store)
            .unwrap();
        assert_eq!(result.pod_targets_to_generate, vec!["Alpha"]);
        assert!(result.aggregate_targets_to_generate.is_none());
    }

    #[test]
    fn test_object_version_change_regenerates_everything() {
        let fixture = fixture();
        let cache = warm_cache(&fixture);
        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);

        let analyzer = ProjectCacheAnalyzer::new(
            &fixture.sandbox,
            &cache,
            configurations(),
            56,
            BTreeMap::new(),
            "Pods",
            false,
        );
        let result = analyzer.analyze(&fixture.graph, &store).unwrap();
        assert_eq!(result.pod_targets_to_generate, vec!["Alpha", "Beta"]);
        assert!(result.aggregate_targets_to_generate.is_some());
    }

    #[test]
    fn test_missing_support_files_marks_target_dirty() {
        let fixture = fixture();
        let cache = warm_cache(&fixture);
        fs::remove_dir_all(fixture.sandbox.support_files_dir("Beta")).unwrap();

        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);
        let result = analyzer(&fixture, &cache, false)
            .analyze(&fixture.graph, &store)
            .unwrap();
        assert_eq!(result.pod_targets_to_generate, vec!["Beta"]);
    }

    #[test]
    fn test_sibling_targets_regenerate_together() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = Sandbox::new(tmp.path());

        let mut graph = TargetGraph::new();
        for suffix in ["App", "Widget"] {
            let mut spec = crate::target::pod_target::tests::fixture_spec("Shared");
            spec.checksum = "checksum-Shared".to_string();
            let mut target = crate::target::PodTarget::new(
                vec![spec],
                vec![TargetDefinition::new(suffix, Platform::ios())],
                Platform::ios(),
                crate::target::BuildType::static_library(),
                vec![],
                Some(suffix.to_string()),
            )
            .unwrap();
            let mut accessor = crate::sandbox::FileAccessor::empty("Shared");
            accessor.source_files = vec!["Shared/Sources/S.m".into()];
            target.file_accessors.push(accessor);
            graph.add_pod_target(target).unwrap();
        }
        for label in ["Shared-App", "Shared-Widget"] {
            fs::create_dir_all(sandbox.support_files_dir(label)).unwrap();
        }
        fs::create_dir_all(sandbox.pod_target_project_path("Shared")).unwrap();
        fs::create_dir_all(sandbox.project_path()).unwrap();

        let fixture = Fixture {
            _tmp: tmp,
            sandbox,
            graph,
        };
        let mut cache = warm_cache(&fixture);

        // Drop one scoped target's entry; its sibling regenerates too.
        let mut keys = cache.cache_key_by_target_label().clone();
        keys.remove("Shared-App");
        cache.update(keys, configurations(), 55, BTreeMap::new(), "Pods");

        let store = SettingsStore::new(&fixture.graph, &fixture.sandbox);
        let result = analyzer(&fixture, &cache, false)
            .analyze(&fixture.graph, &store)
            .unwrap();
        assert_eq!(
            result.pod_targets_to_generate,
            vec!["Shared-App", "Shared-Widget"]
        );
    }

    #[test]
    fn test_plugin_comparison_is_order_independent_for_arrays() {
        let mut a = BTreeMap::new();
        a.insert("stats".to_string(), json!({ "targets": ["A", "B"] }));
        let mut b = BTreeMap::new();
        b.insert("stats".to_string(), json!({ "targets": ["B", "A"] }));
        assert!(plugins_equal(&a, &b));

        b.insert("extra".to_string(), json!(true));
        assert!(!plugins_equal(&a, &b));
    }
}
