//! Build settings for an aggregate target, bound to one build
//! configuration. Most values roll up the `_to_import` variants of the pod
//! targets active in that configuration, plus the pod targets of any
//! aggregates inherited for search paths only.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::platform::PlatformName;
use crate::sandbox::Sandbox;
use crate::target::{AggregateTarget, PodTarget, TargetGraph};
use crate::version::Version;

use super::{
    evaluate_settings, ld_runpath_search_paths, merged_xcconfigs, GeneratedXcconfig,
    PodTargetSettings, SettingDescriptor, SettingValue, CONFIGURATION_BUILD_DIR_VARIABLE,
};

/// Swift versions at or above this embed the standard libraries through
/// `ALWAYS_EMBED_SWIFT_STANDARD_LIBRARIES`; older versions mark the content
/// as containing Swift instead.
fn embed_standard_libraries_minimum_version() -> &'static Version {
    static VERSION: OnceLock<Version> = OnceLock::new();
    VERSION.get_or_init(|| Version::from_segments(&[2, 3]))
}

/// The settings context for one (aggregate target, configuration) pair.
pub struct AggregateTargetSettings<'a> {
    graph: &'a TargetGraph,
    sandbox: &'a Sandbox,
    target: &'a AggregateTarget,
    configuration_name: String,
}

impl<'a> AggregateTargetSettings<'a> {
    pub fn new(
        graph: &'a TargetGraph,
        sandbox: &'a Sandbox,
        target: &'a AggregateTarget,
        configuration_name: &str,
    ) -> Self {
        Self {
            graph,
            sandbox,
            target,
            configuration_name: configuration_name.to_string(),
        }
    }

    pub fn target(&self) -> &'a AggregateTarget {
        self.target
    }

    pub fn configuration_name(&self) -> &str {
        &self.configuration_name
    }

    /// Pod targets active in this configuration.
    fn pod_targets(&self) -> Vec<&'a PodTarget> {
        self.target
            .pod_targets_for_build_configuration(&self.configuration_name)
            .iter()
            .map(|label| self.graph.lookup(label))
            .collect()
    }

    fn search_paths_aggregates(&self) -> Vec<&'a AggregateTarget> {
        self.target
            .search_paths_aggregate_targets
            .iter()
            .map(|label| self.graph.lookup_aggregate(label))
            .collect()
    }

    fn settings_for(&self, aggregate: &'a AggregateTarget) -> AggregateTargetSettings<'a> {
        AggregateTargetSettings {
            graph: self.graph,
            sandbox: self.sandbox,
            target: aggregate,
            configuration_name: self.configuration_name.clone(),
        }
    }

    fn pod_settings(&self, target: &'a PodTarget) -> PodTargetSettings<'a> {
        PodTargetSettings::new(self.graph, self.sandbox, target)
    }

    /// Pod targets this aggregate links itself: its own set minus those
    /// already linked by an aggregate it inherits search paths from.
    pub fn pod_targets_to_link(&self) -> Vec<&'a PodTarget> {
        let inherited: BTreeSet<&str> = self
            .search_paths_aggregates()
            .into_iter()
            .flat_map(|agg| self.settings_for(agg).pod_targets_to_link())
            .map(|t| t.label())
            .collect();
        self.pod_targets()
            .into_iter()
            .filter(|t| !inherited.contains(t.label()))
            .collect()
    }

    /// Settings contexts of the pod targets reachable only through
    /// search-paths inheritance, reduced to maximal spec sets.
    fn search_paths_pod_settings(&self) -> Vec<PodTargetSettings<'a>> {
        let pods: Vec<&PodTarget> = self
            .search_paths_aggregates()
            .into_iter()
            .flat_map(|agg| self.settings_for(agg).pod_targets())
            .collect();
        super::select_maximal_pod_targets(pods)
            .into_iter()
            .map(|t| self.pod_settings(t))
            .collect()
    }

    fn rollup(
        &self,
        from_to_link: impl Fn(&PodTargetSettings<'a>) -> Vec<String>,
        from_search_paths: impl Fn(&PodTargetSettings<'a>) -> Vec<String>,
    ) -> Vec<String> {
        let mut values = Vec::new();
        for target in self.pod_targets_to_link() {
            values.extend(from_to_link(&self.pod_settings(target)));
        }
        for settings in self.search_paths_pod_settings() {
            values.extend(from_search_paths(&settings));
        }
        values
    }

    fn frameworks(&self) -> Vec<String> {
        let mut frameworks = self.rollup(
            PodTargetSettings::frameworks_to_import,
            PodTargetSettings::dynamic_frameworks_to_import,
        );
        frameworks.sort();
        frameworks.dedup();
        frameworks
    }

    fn weak_frameworks(&self) -> Vec<String> {
        let mut frameworks = self.rollup(
            PodTargetSettings::weak_frameworks_to_import,
            PodTargetSettings::weak_frameworks,
        );
        frameworks.sort();
        frameworks.dedup();
        frameworks
    }

    fn libraries(&self) -> Vec<String> {
        let mut libraries = self.rollup(
            PodTargetSettings::libraries_to_import,
            PodTargetSettings::dynamic_libraries_to_import,
        );
        libraries.sort();
        libraries.dedup();
        libraries
    }

    fn framework_search_paths(&self) -> Vec<String> {
        self.rollup(
            PodTargetSettings::framework_search_paths_to_import,
            PodTargetSettings::framework_search_paths_to_import,
        )
    }

    fn library_search_paths(&self) -> Vec<String> {
        self.rollup(
            PodTargetSettings::library_search_paths_to_import,
            PodTargetSettings::vendored_dynamic_library_search_paths,
        )
    }

    fn swift_include_paths(&self) -> Vec<String> {
        self.rollup(
            PodTargetSettings::swift_include_paths_to_import,
            PodTargetSettings::swift_include_paths_to_import,
        )
    }

    /// The copied public-headers store is only consulted when some pod
    /// content is not packaged as a built framework.
    fn header_search_paths(&self) -> Vec<String> {
        let pods = self.pod_targets();
        let mut paths =
            if !self.target.uses_frameworks() || !pods.iter().all(|t| t.should_build()) {
                self.sandbox.public_headers().search_paths(None, false)
            } else {
                vec![]
            };
        for aggregate in self.search_paths_aggregates() {
            paths.extend(self.settings_for(aggregate).header_search_paths());
        }
        paths.sort();
        paths.dedup();
        paths
    }

    fn module_map_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .pod_targets()
            .into_iter()
            .filter_map(|t| self.pod_settings(t).module_map_file_to_import())
            .collect();
        for settings in self.search_paths_pod_settings() {
            files.extend(settings.module_map_file_to_import());
        }
        files.sort();
        files.dedup();
        files
    }

    /// Header directories inside built framework bundles, passed with
    /// `-iquote` so non-modular imports keep resolving.
    fn framework_header_paths_for_iquote(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .pod_targets()
            .into_iter()
            .filter(|t| t.should_build() && t.build_type().is_framework())
            .map(|t| {
                format!(
                    "{}/{}/Headers",
                    t.configuration_build_dir(CONFIGURATION_BUILD_DIR_VARIABLE),
                    t.product_name()
                )
            })
            .collect();
        for aggregate in self.search_paths_aggregates() {
            paths.extend(
                self.settings_for(aggregate)
                    .framework_header_paths_for_iquote(),
            );
        }
        paths.sort();
        paths.dedup();
        paths
    }

    fn other_cflags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .module_map_files()
            .into_iter()
            .map(|f| format!("-fmodule-map-file={f}"))
            .collect();
        for path in self.header_search_paths() {
            flags.push("-isystem".to_string());
            flags.push(path);
        }
        for path in self.framework_header_paths_for_iquote() {
            flags.push("-iquote".to_string());
            flags.push(path);
        }
        flags
    }

    fn other_swift_flags(&self) -> Option<Vec<String>> {
        let module_map_files = self.module_map_files();
        let uses_swift = self.pod_targets().iter().any(|t| t.uses_swift());
        if !uses_swift && module_map_files.is_empty() {
            return None;
        }
        let mut flags = vec!["-D".to_string(), "COCOAPODS".to_string()];
        for file in module_map_files {
            flags.push("-Xcc".to_string());
            flags.push(format!("-fmodule-map-file={file}"));
        }
        Some(flags)
    }

    fn must_embed_swift(&self) -> bool {
        !self.target.requires_host_target() && self.pod_targets().iter().any(|t| t.uses_swift())
    }

    fn swift_version_at_least_embed_minimum(&self) -> bool {
        match self.target.swift_version() {
            Some(version) => version >= embed_standard_libraries_minimum_version(),
            None => false,
        }
    }

    fn ld_runpath(&self) -> Option<Vec<String>> {
        let any_vendored_dynamic = self.pod_targets().iter().any(|t| {
            t.file_accessors
                .iter()
                .any(|fa| fa.has_vendored_dynamic_artifacts())
        });
        if !self.target.uses_frameworks() && !any_vendored_dynamic {
            return None;
        }
        let test_bundle = self
            .target
            .user_targets
            .iter()
            .any(|t| t.kind.is_test_bundle());
        let mut paths = ld_runpath_search_paths(
            self.target.platform().name,
            self.target.requires_host_target(),
            test_bundle,
        );
        paths.dedup();
        Some(paths)
    }

    pub fn requires_objc_linker_flag(&self) -> bool {
        if !self.target.uses_frameworks() {
            return true;
        }
        self.pod_targets().iter().any(|t| {
            t.file_accessors
                .iter()
                .any(|fa| fa.has_vendored_static_artifacts())
        })
    }

    pub fn requires_fobjc_arc(&self) -> bool {
        self.target.target_definition().arc_compatibility_flag
            && self.pod_targets().iter().any(|t| {
                t.spec_consumers(false)
                    .chain(t.spec_consumers(true))
                    .any(|c| c.requires_arc)
            })
    }

    fn other_ldflags(&self) -> Vec<String> {
        let mut flags = Vec::new();
        if self.requires_objc_linker_flag() {
            flags.push("-ObjC".to_string());
        }
        if self.requires_fobjc_arc() {
            flags.push("-fobjc-arc".to_string());
        }
        for library in self.libraries() {
            flags.push(format!("-l\"{library}\""));
        }
        for framework in self.frameworks() {
            flags.push("-framework".to_string());
            flags.push(format!("\"{framework}\""));
        }
        for framework in self.weak_frameworks() {
            flags.push("-weak_framework".to_string());
            flags.push(format!("\"{framework}\""));
        }
        flags
    }

    /// User-project settings contributed by pod specs, merged across all
    /// pods active in this configuration.
    fn merged_user_target_xcconfigs(&self) -> (BTreeMap<String, String>, Vec<String>) {
        let mut values_by_consumer_by_key: BTreeMap<String, Vec<(String, String)>> =
            BTreeMap::new();
        for target in self.pod_targets() {
            let platform = target.platform().name;
            for spec in target.specs() {
                let Some(consumer) = spec.consumer(platform) else {
                    continue;
                };
                for (key, value) in &consumer.user_target_xcconfig {
                    // Never propagated to the user project; it breaks
                    // header resolution there.
                    if key == "USE_HEADERMAP" {
                        continue;
                    }
                    values_by_consumer_by_key
                        .entry(key.clone())
                        .or_default()
                        .push((spec.name.clone(), value.clone()));
                }
            }
        }
        merged_xcconfigs(&values_by_consumer_by_key, "user_target_xcconfig")
    }

    fn settings_table() -> Vec<SettingDescriptor<Self>> {
        vec![
            SettingDescriptor {
                name: "ALWAYS_EMBED_SWIFT_STANDARD_LIBRARIES",
                sorted: false,
                uniqued: false,
                compute: |ctx| {
                    (ctx.must_embed_swift() && ctx.swift_version_at_least_embed_minimum())
                        .then(|| SettingValue::single("YES"))
                },
            },
            SettingDescriptor {
                name: "CODE_SIGN_IDENTITY",
                sorted: false,
                uniqued: false,
                compute: |ctx| {
                    (ctx.target.uses_frameworks()
                        && ctx.target.platform().name == PlatformName::Osx)
                        .then(|| SettingValue::single(""))
                },
            },
            SettingDescriptor {
                name: "EMBEDDED_CONTENT_CONTAINS_SWIFT",
                sorted: false,
                uniqued: false,
                compute: |ctx| {
                    (ctx.must_embed_swift() && !ctx.swift_version_at_least_embed_minimum())
                        .then(|| SettingValue::single("YES"))
                },
            },
            SettingDescriptor {
                name: "FRAMEWORK_SEARCH_PATHS",
                sorted: true,
                uniqued: true,
                compute: |ctx| Some(SettingValue::List(ctx.framework_search_paths())),
            },
            SettingDescriptor {
                name: "GCC_PREPROCESSOR_DEFINITIONS",
                sorted: false,
                uniqued: false,
                compute: |_| Some(SettingValue::list(["COCOAPODS=1"])),
            },
            SettingDescriptor {
                name: "HEADER_SEARCH_PATHS",
                sorted: true,
                uniqued: true,
                compute: |ctx| Some(SettingValue::List(ctx.header_search_paths())),
            },
            SettingDescriptor {
                name: "LD_RUNPATH_SEARCH_PATHS",
                sorted: false,
                uniqued: true,
                compute: |ctx| ctx.ld_runpath().map(SettingValue::List),
            },
            SettingDescriptor {
                name: "LIBRARY_SEARCH_PATHS",
                sorted: true,
                uniqued: true,
                compute: |ctx| Some(SettingValue::List(ctx.library_search_paths())),
            },
            SettingDescriptor {
                name: "OTHER_CFLAGS",
                sorted: false,
                uniqued: false,
                compute: |ctx| Some(SettingValue::List(ctx.other_cflags())),
            },
            SettingDescriptor {
                name: "OTHER_LDFLAGS",
                sorted: false,
                uniqued: false,
                compute: |ctx| Some(SettingValue::List(ctx.other_ldflags())),
            },
            SettingDescriptor {
                name: "OTHER_SWIFT_FLAGS",
                sorted: false,
                uniqued: false,
                compute: |ctx| ctx.other_swift_flags().map(SettingValue::List),
            },
            SettingDescriptor {
                name: "PODS_BUILD_DIR",
                sorted: false,
                uniqued: false,
                compute: |_| Some(SettingValue::single("${BUILD_DIR}")),
            },
            SettingDescriptor {
                name: "PODS_CONFIGURATION_BUILD_DIR",
                sorted: false,
                uniqued: false,
                compute: |_| {
                    Some(SettingValue::single(
                        "${PODS_BUILD_DIR}/$(CONFIGURATION)$(EFFECTIVE_PLATFORM_NAME)",
                    ))
                },
            },
            SettingDescriptor {
                name: "PODS_PODFILE_DIR_PATH",
                sorted: false,
                uniqued: false,
                compute: |ctx| {
                    ctx.target
                        .podfile_dir_relative_path()
                        .map(SettingValue::single)
                },
            },
            SettingDescriptor {
                name: "PODS_ROOT",
                sorted: false,
                uniqued: false,
                compute: |ctx| Some(SettingValue::single(ctx.target.relative_pods_root(ctx.sandbox))),
            },
            SettingDescriptor {
                name: "SWIFT_INCLUDE_PATHS",
                sorted: true,
                uniqued: true,
                compute: |ctx| Some(SettingValue::List(ctx.swift_include_paths())),
            },
        ]
    }

    /// The full xcconfig for this (target, configuration), with any merge
    /// warnings.
    pub fn xcconfig(&self) -> GeneratedXcconfig {
        let mut config = evaluate_settings(&Self::settings_table(), self);
        let (merged, warnings) = self.merged_user_target_xcconfigs();
        config.merge(&merged);
        GeneratedXcconfig { config, warnings }
    }
}
