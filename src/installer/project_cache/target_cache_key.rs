//! Per-target fingerprints.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sandbox::{CheckoutOptions, Sandbox};
use crate::target::build_settings::SettingsStore;
use crate::target::{AggregateTarget, PodTarget};

use super::CacheError;

/// The outcome of comparing two cache keys. Any difference collapses to
/// `Project`; downstream regeneration only consumes a binary signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDifference {
    None,
    Project,
}

/// A fingerprint snapshot of one generated target.
///
/// Pod-target keys carry the root spec checksum, the activated spec list,
/// and (for local pods) the tracked file list. Aggregate keys carry only
/// per-configuration settings checksums. Keys rebuilt from a persisted
/// cache compare equal to freshly computed keys for unchanged state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCacheKey {
    #[serde(rename = "CHECKSUM", default, skip_serializing_if = "Option::is_none")]
    checksum: Option<String>,

    #[serde(rename = "SPECS", default, skip_serializing_if = "Option::is_none")]
    specs: Option<Vec<String>>,

    #[serde(rename = "FILES", default, skip_serializing_if = "Option::is_none")]
    files: Option<Vec<String>>,

    /// Settings checksums keyed by target label (library variant) or spec
    /// name (test variants); configuration name for aggregates.
    #[serde(rename = "BUILD_SETTINGS_CHECKSUM")]
    build_settings_checksum: BTreeMap<String, String>,

    #[serde(rename = "IS_LOCAL_POD", default, skip_serializing_if = "is_false")]
    is_local_pod: bool,

    #[serde(
        rename = "CHECKOUT_OPTIONS",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    checkout_options: Option<CheckoutOptions>,

    #[serde(
        rename = "PROJECT_NAME",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    project_name: Option<String>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TargetCacheKey {
    /// Fingerprint a live pod target.
    pub fn from_pod_target(
        target: &PodTarget,
        settings: &SettingsStore<'_>,
        sandbox: &Sandbox,
    ) -> Result<Self, CacheError> {
        let label = target.label();
        let mut build_settings_checksum = BTreeMap::new();
        build_settings_checksum.insert(
            label.to_string(),
            settings.pod_xcconfig(label, None)?.config.checksum(),
        );
        for test_spec in target.test_specs() {
            build_settings_checksum.insert(
                test_spec.name.clone(),
                settings
                    .pod_xcconfig(label, Some(&test_spec.name))?
                    .config
                    .checksum(),
            );
        }

        let mut specs: Vec<String> = target
            .specs()
            .iter()
            .map(|s| s.name_and_version())
            .collect();
        specs.sort_unstable();

        let is_local_pod = sandbox.is_local(target.pod_name());
        let files = if is_local_pod {
            Some(sandbox.tracked_files(target.pod_name())?)
        } else {
            None
        };

        Ok(Self {
            checksum: Some(target.root_spec().checksum.clone()),
            specs: Some(specs),
            files,
            build_settings_checksum,
            is_local_pod,
            checkout_options: sandbox.checkout_options(target.pod_name()).cloned(),
            project_name: Some(target.pod_name().to_string()),
        })
    }

    /// Fingerprint a live aggregate target.
    pub fn from_aggregate_target(
        target: &AggregateTarget,
        settings: &SettingsStore<'_>,
    ) -> Result<Self, CacheError> {
        let label = target.label();
        let mut build_settings_checksum = BTreeMap::new();
        for configuration in target.build_configurations().keys() {
            build_settings_checksum.insert(
                configuration.clone(),
                settings
                    .aggregate_xcconfig(&label, configuration)?
                    .config
                    .checksum(),
            );
        }
        Ok(Self {
            checksum: None,
            specs: None,
            files: None,
            build_settings_checksum,
            is_local_pod: false,
            checkout_options: None,
            project_name: None,
        })
    }

    /// Rebuild a key from its persisted JSON form.
    pub fn from_cache_hash(value: serde_json::Value) -> Result<Self, CacheError> {
        let mut key: Self = serde_json::from_value(value)?;
        if let Some(files) = &mut key.files {
            files.sort();
        }
        Ok(key)
    }

    pub(crate) fn is_pod_target(&self) -> bool {
        self.checksum.is_some()
    }

    /// Compare two keys. All difference kinds collapse into one category.
    pub fn key_difference(&self, other: &Self) -> KeyDifference {
        if self.is_pod_target() != other.is_pod_target() {
            return KeyDifference::Project;
        }
        if self == other {
            KeyDifference::None
        } else {
            KeyDifference::Project
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::build_settings::SettingsStore;
    use crate::target::pod_target::tests::fixture_pod_target;
    use crate::target::TargetGraph;
    use serde_json::json;

    fn graph_with(name: &str) -> TargetGraph {
        let mut graph = TargetGraph::new();
        graph.add_pod_target(fixture_pod_target(name)).unwrap();
        graph
    }

    #[test]
    fn test_pod_key_round_trips_through_persisted_form() {
        let graph = graph_with("Alpha");
        let sandbox = Sandbox::new("/repo/Pods");
        let store = SettingsStore::new(&graph, &sandbox);
        let target = graph.pod_target("Alpha").unwrap();

        let live = TargetCacheKey::from_pod_target(target, &store, &sandbox).unwrap();
        let persisted = serde_json::to_value(&live).unwrap();
        let restored = TargetCacheKey::from_cache_hash(persisted).unwrap();

        assert_eq!(live.key_difference(&restored), KeyDifference::None);
        assert_eq!(live, restored);
    }

    #[test]
    fn test_checksum_difference_collapses_to_project() {
        let graph = graph_with("Alpha");
        let sandbox = Sandbox::new("/repo/Pods");
        let store = SettingsStore::new(&graph, &sandbox);
        let target = graph.pod_target("Alpha").unwrap();

        let live = TargetCacheKey::from_pod_target(target, &store, &sandbox).unwrap();
        let mut stale = live.clone();
        stale.checksum = Some("outdated".to_string());
        assert_eq!(live.key_difference(&stale), KeyDifference::Project);
    }

    #[test]
    fn test_pod_and_aggregate_keys_always_differ() {
        let graph = graph_with("Alpha");
        let sandbox = Sandbox::new("/repo/Pods");
        let store = SettingsStore::new(&graph, &sandbox);
        let target = graph.pod_target("Alpha").unwrap();

        let pod_key = TargetCacheKey::from_pod_target(target, &store, &sandbox).unwrap();
        let aggregate_key = TargetCacheKey::from_cache_hash(json!({
            "BUILD_SETTINGS_CHECKSUM": { "Debug": "abc" }
        }))
        .unwrap();
        assert_eq!(
            pod_key.key_difference(&aggregate_key),
            KeyDifference::Project
        );
    }

    #[test]
    fn test_files_tracked_only_for_local_pods() {
        let tmp = tempfile::tempdir().unwrap();
        let graph = graph_with("Alpha");
        let mut sandbox = Sandbox::new(tmp.path());
        let target = graph.pod_target("Alpha").unwrap();

        let store = SettingsStore::new(&graph, &sandbox);
        let external = TargetCacheKey::from_pod_target(target, &store, &sandbox).unwrap();
        assert!(external.files.is_none());
        assert!(!external.is_local_pod);
        drop(store);

        sandbox.mark_local("Alpha");
        let store = SettingsStore::new(&graph, &sandbox);
        let local = TargetCacheKey::from_pod_target(target, &store, &sandbox).unwrap();
        assert!(local.is_local_pod);
        assert_eq!(local.files, Some(vec![]));
        assert_eq!(external.key_difference(&local), KeyDifference::Project);
    }
}
