//! The umbrella target a consuming project links against.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::platform::Platform;
use crate::sandbox::{self, Sandbox};
use crate::target::{ConfigurationType, TargetDefinition};
use crate::version::Version;

/// The product kind of a user target the aggregate integrates into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserTargetKind {
    Application,
    Framework,
    AppExtension,
    WatchExtension,
    Watch2Extension,
    TvExtension,
    MessagesExtension,
    UnitTestBundle,
    UiTestBundle,
}

impl UserTargetKind {
    pub fn is_extension(&self) -> bool {
        matches!(
            self,
            Self::AppExtension
                | Self::WatchExtension
                | Self::Watch2Extension
                | Self::TvExtension
                | Self::MessagesExtension
        )
    }

    pub fn is_test_bundle(&self) -> bool {
        matches!(self, Self::UnitTestBundle | Self::UiTestBundle)
    }

    /// Whether products of this kind load inside a host application
    /// rather than carrying their own frameworks.
    pub fn requires_host_target(&self) -> bool {
        self.is_extension() || *self == Self::UnitTestBundle
    }
}

/// A native target of the user's project that an aggregate integrates.
#[derive(Debug, Clone, PartialEq)]
pub struct UserTarget {
    pub name: String,
    pub kind: UserTargetKind,
    /// Whether the target builds with extension-safe API only.
    pub application_extension_api_only: bool,
}

/// The umbrella of all pod targets integrated into one target definition.
///
/// Linked products and search paths come from the pod targets activated
/// per build configuration; the user targets only inform embedding and
/// host-target questions.
#[derive(Debug, Clone)]
pub struct AggregateTarget {
    target_definition: TargetDefinition,
    /// The directory the user project's `${SRCROOT}` resolves to.
    client_root: PathBuf,
    /// Path of the user's project, when integration is requested.
    pub user_project_path: Option<PathBuf>,
    /// Directory containing the manifest.
    pub podfile_dir: Option<PathBuf>,
    pub user_targets: Vec<UserTarget>,
    pod_targets_by_configuration: BTreeMap<String, Vec<String>>,
    /// Labels of aggregates whose search paths this one inherits
    /// (abstract parent integration).
    pub search_paths_aggregate_targets: Vec<String>,
}

impl AggregateTarget {
    pub fn new(target_definition: TargetDefinition, client_root: PathBuf) -> Self {
        Self {
            target_definition,
            client_root,
            user_project_path: None,
            podfile_dir: None,
            user_targets: Vec::new(),
            pod_targets_by_configuration: BTreeMap::new(),
            search_paths_aggregate_targets: Vec::new(),
        }
    }

    /// `Pods-{definition name}`, the generated target's name.
    pub fn label(&self) -> String {
        format!("Pods-{}", self.target_definition.name)
    }

    pub fn target_definition(&self) -> &TargetDefinition {
        &self.target_definition
    }

    pub fn client_root(&self) -> &Path {
        &self.client_root
    }

    pub fn platform(&self) -> &Platform {
        &self.target_definition.platform
    }

    pub fn uses_frameworks(&self) -> bool {
        self.target_definition.uses_frameworks
    }

    pub fn swift_version(&self) -> Option<&Version> {
        self.target_definition.swift_version.as_ref()
    }

    pub fn build_configurations(&self) -> &BTreeMap<String, ConfigurationType> {
        &self.target_definition.build_configurations
    }

    /// Activate pod targets in every build configuration of the definition.
    pub fn add_pod_targets_for_all_configurations(&mut self, labels: Vec<String>) {
        for configuration in self.target_definition.build_configurations.keys() {
            self.pod_targets_by_configuration
                .entry(configuration.clone())
                .or_default()
                .extend(labels.iter().cloned());
        }
    }

    /// Activate pod targets in one build configuration only.
    pub fn add_pod_targets_for_configuration(&mut self, configuration: &str, labels: Vec<String>) {
        self.pod_targets_by_configuration
            .entry(configuration.to_string())
            .or_default()
            .extend(labels);
    }

    /// Pod target labels active in any configuration, deduplicated, in
    /// configuration-then-insertion order.
    pub fn pod_target_labels(&self) -> impl Iterator<Item = &str> {
        let mut seen = std::collections::BTreeSet::new();
        self.pod_targets_by_configuration
            .values()
            .flatten()
            .filter(move |label| seen.insert(label.as_str()))
            .map(String::as_str)
    }

    /// Pod target labels active in one configuration.
    pub fn pod_targets_for_build_configuration(&self, configuration: &str) -> &[String] {
        self.pod_targets_by_configuration
            .get(configuration)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Whether every user target loads inside a host application.
    pub fn requires_host_target(&self) -> bool {
        !self.user_targets.is_empty()
            && self
                .user_targets
                .iter()
                .all(|t| t.kind.requires_host_target())
    }

    /// Whether any integrated user target is extension-API-only.
    pub fn application_extension_api_only(&self) -> bool {
        self.user_targets
            .iter()
            .any(|t| t.application_extension_api_only || t.kind.is_extension())
    }

    /// `${SRCROOT}`-anchored path of the sandbox root as seen from the
    /// user project.
    pub fn relative_pods_root(&self, sandbox: &Sandbox) -> String {
        let relative = sandbox::relative_path(&self.client_root, sandbox.root());
        format!("${{SRCROOT}}/{}", relative.display())
    }

    /// `${SRCROOT}`-anchored path of the manifest's directory, when known.
    pub fn podfile_dir_relative_path(&self) -> Option<String> {
        self.podfile_dir.as_ref().map(|dir| {
            let relative = sandbox::relative_path(&self.client_root, dir);
            format!("${{SRCROOT}}/{}", relative.display())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Platform;

    fn aggregate() -> AggregateTarget {
        AggregateTarget::new(
            TargetDefinition::new("App", Platform::ios()),
            PathBuf::from("/repo/App"),
        )
    }

    #[test]
    fn test_label() {
        assert_eq!(aggregate().label(), "Pods-App");
    }

    #[test]
    fn test_pod_target_labels_dedup_across_configurations() {
        let mut target = aggregate();
        target.add_pod_targets_for_all_configurations(vec!["Alpha".to_string()]);
        target.add_pod_targets_for_configuration("Debug", vec!["DebugOnly".to_string()]);

        let labels: Vec<&str> = target.pod_target_labels().collect();
        assert_eq!(labels, vec!["Alpha", "DebugOnly"]);
        assert_eq!(
            target.pod_targets_for_build_configuration("Debug"),
            &["Alpha".to_string(), "DebugOnly".to_string()]
        );
        assert_eq!(
            target.pod_targets_for_build_configuration("Release"),
            &["Alpha".to_string()]
        );
        assert!(target
            .pod_targets_for_build_configuration("Profile")
            .is_empty());
    }

    #[test]
    fn test_requires_host_target() {
        let mut target = aggregate();
        assert!(!target.requires_host_target());

        target.user_targets.push(UserTarget {
            name: "AppTests".to_string(),
            kind: UserTargetKind::UnitTestBundle,
            application_extension_api_only: false,
        });
        assert!(target.requires_host_target());

        target.user_targets.push(UserTarget {
            name: "App".to_string(),
            kind: UserTargetKind::Application,
            application_extension_api_only: false,
        });
        assert!(!target.requires_host_target());
    }

    #[test]
    fn test_extension_kinds() {
        assert!(UserTargetKind::AppExtension.is_extension());
        assert!(UserTargetKind::AppExtension.requires_host_target());
        assert!(UserTargetKind::UnitTestBundle.is_test_bundle());
        assert!(UserTargetKind::UnitTestBundle.requires_host_target());
        assert!(!UserTargetKind::UiTestBundle.requires_host_target());
        assert!(!UserTargetKind::Application.is_extension());
    }

    #[test]
    fn test_relative_pods_root() {
        let sandbox = Sandbox::new("/repo/Pods");
        assert_eq!(aggregate().relative_pods_root(&sandbox), "${SRCROOT}/../Pods");
    }
}
