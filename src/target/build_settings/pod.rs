//! Build settings for one pod target (library or test-bundle xcconfig).

use std::path::Path;

use crate::sandbox::{self, FileAccessor, Sandbox};
use crate::spec::{Consumer, Specification};
use crate::target::{PodTarget, TargetError, TargetGraph};

use super::{
    developer_framework_search_paths, evaluate_settings, ld_runpath_search_paths, merged_xcconfigs,
    select_maximal_pod_targets, GeneratedXcconfig, SettingDescriptor, SettingValue,
    CONFIGURATION_BUILD_DIR_VARIABLE,
};

/// The settings context for one pod target, bound to either the library
/// xcconfig or one test spec's xcconfig.
///
/// Contexts are cheap views over the graph; durable memoization and
/// invalidation live in [`super::SettingsStore`].
#[derive(Debug)]
pub struct PodTargetSettings<'a> {
    graph: &'a TargetGraph,
    sandbox: &'a Sandbox,
    target: &'a PodTarget,
    test_spec: Option<&'a Specification>,
}

impl<'a> PodTargetSettings<'a> {
    /// The library xcconfig context for a pod target.
    pub fn new(graph: &'a TargetGraph, sandbox: &'a Sandbox, target: &'a PodTarget) -> Self {
        Self {
            graph,
            sandbox,
            target,
            test_spec: None,
        }
    }

    /// The xcconfig context for one of the target's test specs.
    pub fn for_test_spec(
        graph: &'a TargetGraph,
        sandbox: &'a Sandbox,
        target: &'a PodTarget,
        test_spec_name: &str,
    ) -> Result<Self, TargetError> {
        let test_spec = target
            .test_specs()
            .find(|s| s.name == test_spec_name)
            .ok_or_else(|| TargetError::UnknownTestSpec {
                target: target.label().to_string(),
                spec: test_spec_name.to_string(),
            })?;
        Ok(Self {
            graph,
            sandbox,
            target,
            test_spec: Some(test_spec),
        })
    }

    pub fn target(&self) -> &'a PodTarget {
        self.target
    }

    pub fn test_spec(&self) -> Option<&'a Specification> {
        self.test_spec
    }

    fn test_xcconfig(&self) -> bool {
        self.test_spec.is_some()
    }

    /// Context for a dependency, always the library (non-test) variant.
    fn dependency_settings(&self, dependency: &'a PodTarget) -> PodTargetSettings<'a> {
        PodTargetSettings {
            graph: self.graph,
            sandbox: self.sandbox,
            target: dependency,
            test_spec: None,
        }
    }

    /// The dependent targets consulted for rolled-up settings: the
    /// recursive closure (test closure for test xcconfigs), reduced to
    /// maximal spec sets.
    fn dependent_targets(&self) -> Vec<&'a PodTarget> {
        let closure = match self.test_spec {
            Some(spec) => self.graph.all_dependent_targets(self.target, &spec.name),
            None => self.graph.recursive_dependent_targets(self.target),
        };
        select_maximal_pod_targets(closure)
    }

    fn file_accessors(&self) -> impl Iterator<Item = &'a FileAccessor> {
        self.target.file_accessors(self.test_xcconfig())
    }

    fn spec_consumers(&self) -> Vec<(&'a Specification, &'a Consumer)> {
        let test = self.test_xcconfig();
        let platform = self.target.platform().name;
        self.target
            .specs()
            .iter()
            .filter(|s| s.test_specification == test)
            .filter_map(|s| s.consumer(platform).map(|c| (s, c)))
            .collect()
    }

    fn consumer_frameworks(&self) -> Vec<String> {
        self.spec_consumers()
            .iter()
            .flat_map(|(_, c)| c.frameworks.iter().cloned())
            .collect()
    }

    /// Frameworks and libraries are omitted from a dynamic framework's own
    /// xcconfig: the framework links its content itself and the lists
    /// surface in its consumers through the `_to_import` variants.
    fn linker_lists_suppressed(&self) -> bool {
        !self.test_xcconfig() && self.target.build_type().is_dynamic_framework()
    }

    // Vendored artifact paths, as resolved by the file accessors.

    fn vendored_static_frameworks(&self) -> Vec<&'a Path> {
        self.file_accessors()
            .flat_map(|fa| fa.vendored_static_frameworks.iter())
            .map(Path::new)
            .collect()
    }

    fn vendored_dynamic_frameworks(&self) -> Vec<&'a Path> {
        self.file_accessors()
            .flat_map(|fa| fa.vendored_dynamic_frameworks.iter())
            .map(Path::new)
            .collect()
    }

    fn vendored_static_libraries(&self) -> Vec<&'a Path> {
        self.file_accessors()
            .flat_map(|fa| fa.vendored_static_libraries.iter())
            .map(Path::new)
            .collect()
    }

    fn vendored_dynamic_libraries(&self) -> Vec<&'a Path> {
        self.file_accessors()
            .flat_map(|fa| fa.vendored_dynamic_libraries.iter())
            .map(Path::new)
            .collect()
    }

    fn vendored_search_path(&self, artifact: &Path) -> String {
        let dir = artifact.parent().unwrap_or(artifact);
        let relative = sandbox::relative_path(self.sandbox.root(), dir);
        format!("${{PODS_ROOT}}/{}", relative.display())
    }

    fn framework_basename(path: &Path) -> String {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn library_link_name(path: &Path) -> String {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        stem.strip_prefix("lib").map(str::to_string).unwrap_or(stem)
    }

    // Frameworks.

    /// Frameworks to link: the union of vendored dynamic framework
    /// basenames, declared spec frameworks, and what dependents expose as
    /// `_to_import` (a static dependent's frameworks bubble up to whoever
    /// finally links them).
    fn frameworks(&self) -> Vec<String> {
        if self.linker_lists_suppressed() {
            return vec![];
        }
        let mut frameworks: Vec<String> = self
            .vendored_dynamic_frameworks()
            .iter()
            .map(|p| Self::framework_basename(p))
            .collect();
        frameworks.extend(self.consumer_frameworks());
        for dependency in self.dependent_targets() {
            let settings = self.dependency_settings(dependency);
            frameworks.extend(settings.dynamic_frameworks_to_import());
            if self.test_xcconfig() {
                frameworks.extend(settings.static_frameworks_to_import());
            }
        }
        frameworks.sort();
        frameworks.dedup();
        frameworks
    }

    /// What a consumer must additionally link because this target's static
    /// content cannot link it itself.
    pub fn static_frameworks_to_import(&self) -> Vec<String> {
        let mut frameworks = Vec::new();
        let absorbed_by_own_product =
            self.target.should_build() && self.target.build_type().is_dynamic_framework();
        if !absorbed_by_own_product {
            frameworks.extend(
                self.vendored_static_frameworks()
                    .iter()
                    .map(|p| Self::framework_basename(p)),
            );
        }
        if self.target.should_build() && self.target.build_type().is_static_framework() {
            frameworks.push(self.target.product_basename());
        }
        frameworks
    }

    pub fn dynamic_frameworks_to_import(&self) -> Vec<String> {
        let mut frameworks: Vec<String> = self
            .vendored_dynamic_frameworks()
            .iter()
            .map(|p| Self::framework_basename(p))
            .collect();
        if self.target.should_build() && self.target.build_type().is_dynamic_framework() {
            frameworks.push(self.target.product_basename());
        }
        frameworks.extend(self.consumer_frameworks());
        frameworks
    }

    pub(crate) fn frameworks_to_import(&self) -> Vec<String> {
        let mut frameworks = self.static_frameworks_to_import();
        frameworks.extend(self.dynamic_frameworks_to_import());
        frameworks.sort();
        frameworks.dedup();
        frameworks
    }

    /// Weak linkage never bubbles up through static content.
    pub(crate) fn weak_frameworks_to_import(&self) -> Vec<String> {
        vec![]
    }

    pub fn weak_frameworks(&self) -> Vec<String> {
        if self.linker_lists_suppressed() {
            return vec![];
        }
        self.spec_consumers()
            .iter()
            .flat_map(|(_, c)| c.weak_frameworks.iter().cloned())
            .collect()
    }

    fn vendored_framework_search_paths(&self) -> Vec<String> {
        self.file_accessors()
            .flat_map(|fa| fa.vendored_frameworks())
            .map(|p| self.vendored_search_path(Path::new(p)))
            .collect()
    }

    pub fn framework_search_paths_to_import(&self) -> Vec<String> {
        let consumer_frameworks = self.consumer_frameworks();
        let mut paths = developer_framework_search_paths(&consumer_frameworks);
        paths.extend(self.vendored_framework_search_paths());
        if self.target.build_type().is_framework() && self.target.should_build() {
            paths.push(
                self.target
                    .configuration_build_dir(CONFIGURATION_BUILD_DIR_VARIABLE),
            );
        }
        paths
    }

    fn framework_search_paths(&self) -> Vec<String> {
        let mut paths = developer_framework_search_paths(&self.frameworks());
        for dependency in self.dependent_targets() {
            paths.extend(
                self.dependency_settings(dependency)
                    .framework_search_paths_to_import(),
            );
        }
        paths.extend(self.framework_search_paths_to_import());
        if !self.test_xcconfig() {
            let own_build_dir = self
                .target
                .configuration_build_dir(CONFIGURATION_BUILD_DIR_VARIABLE);
            paths.retain(|p| p != &own_build_dir);
        }
        paths
    }

    // Libraries.

    pub fn static_libraries_to_import(&self) -> Vec<String> {
        let mut libraries: Vec<String> = self
            .vendored_static_libraries()
            .iter()
            .map(|p| Self::library_link_name(p))
            .collect();
        if self.target.should_build() && !self.target.build_type().is_framework() {
            libraries.push(self.target.product_basename());
        }
        libraries
    }

    pub fn dynamic_libraries_to_import(&self) -> Vec<String> {
        let mut libraries: Vec<String> = self
            .vendored_dynamic_libraries()
            .iter()
            .map(|p| Self::library_link_name(p))
            .collect();
        libraries.extend(
            self.spec_consumers()
                .iter()
                .flat_map(|(_, c)| c.libraries.iter().cloned()),
        );
        libraries
    }

    pub(crate) fn libraries_to_import(&self) -> Vec<String> {
        let mut libraries = self.static_libraries_to_import();
        libraries.extend(self.dynamic_libraries_to_import());
        libraries.sort();
        libraries.dedup();
        libraries
    }

    /// Libraries to link. Test bundles additionally link the static
    /// products (their own and their dependencies'), since nothing else
    /// links them into the bundle.
    fn libraries(&self) -> Vec<String> {
        if self.linker_lists_suppressed() {
            return vec![];
        }
        let mut libraries = if self.test_xcconfig() {
            self.libraries_to_import()
        } else {
            self.dynamic_libraries_to_import()
        };
        for dependency in self.dependent_targets() {
            let settings = self.dependency_settings(dependency);
            libraries.extend(settings.dynamic_libraries_to_import());
            if self.test_xcconfig() {
                libraries.extend(settings.static_libraries_to_import());
            }
        }
        libraries.sort();
        libraries.dedup();
        libraries
    }

    pub fn vendored_dynamic_library_search_paths(&self) -> Vec<String> {
        self.vendored_dynamic_libraries()
            .iter()
            .map(|p| self.vendored_search_path(p))
            .collect()
    }

    fn vendored_static_library_search_paths(&self) -> Vec<String> {
        self.vendored_static_libraries()
            .iter()
            .map(|p| self.vendored_search_path(p))
            .collect()
    }

    pub fn library_search_paths_to_import(&self) -> Vec<String> {
        let mut paths = self.vendored_static_library_search_paths();
        paths.extend(self.vendored_dynamic_library_search_paths());
        if !self.target.build_type().is_framework() && self.target.should_build() {
            paths.push(
                self.target
                    .configuration_build_dir(CONFIGURATION_BUILD_DIR_VARIABLE),
            );
        }
        paths
    }

    fn library_search_paths(&self) -> Vec<String> {
        if self.linker_lists_suppressed() {
            return vec![];
        }
        let mut paths = self.library_search_paths_to_import();
        for dependency in self.dependent_targets() {
            paths.extend(
                self.dependency_settings(dependency)
                    .vendored_dynamic_library_search_paths(),
            );
            if self.test_xcconfig() {
                paths.extend(
                    self.dependency_settings(dependency)
                        .library_search_paths_to_import(),
                );
            }
        }
        if !self.test_xcconfig() {
            let own_build_dir = self
                .target
                .configuration_build_dir(CONFIGURATION_BUILD_DIR_VARIABLE);
            paths.retain(|p| p != &own_build_dir);
        }
        paths
    }

    // Module maps.

    /// The module map a consumer must pass to the compiler to import this
    /// target. Only non-framework targets that define a module have one;
    /// frameworks carry their map inside the bundle.
    pub fn module_map_file_to_import(&self) -> Option<String> {
        if !self.target.should_build()
            || self.target.build_type().is_framework()
            || !self.target.defines_module()
        {
            return None;
        }
        if self.target.uses_swift() {
            // A build phase copies the module map into the build products
            // dir with the Swift submodule appended.
            Some(format!(
                "{}/{}/{}.modulemap",
                CONFIGURATION_BUILD_DIR_VARIABLE,
                self.target.label(),
                self.target.product_module_name()
            ))
        } else {
            Some(format!(
                "${{PODS_ROOT}}/Target Support Files/{label}/{label}.modulemap",
                label = self.target.label()
            ))
        }
    }

    fn module_map_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .dependent_targets()
            .into_iter()
            .filter_map(|t| self.dependency_settings(t).module_map_file_to_import())
            .collect();
        files.sort();
        files
    }

    // Swift.

    pub fn swift_include_paths_to_import(&self) -> Vec<String> {
        if self.target.uses_swift() && !self.target.build_type().is_framework() {
            vec![self
                .target
                .configuration_build_dir(CONFIGURATION_BUILD_DIR_VARIABLE)]
        } else {
            vec![]
        }
    }

    fn swift_include_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .dependent_targets()
            .into_iter()
            .flat_map(|t| self.dependency_settings(t).swift_include_paths_to_import())
            .collect();
        if self.test_xcconfig() {
            paths.extend(self.swift_include_paths_to_import());
        }
        paths
    }

    fn other_swift_flags(&self) -> Option<Vec<String>> {
        if !self.target.uses_swift() {
            return None;
        }
        let mut flags = vec!["-D".to_string(), "COCOAPODS".to_string()];
        for file in self.module_map_files() {
            flags.push("-Xcc".to_string());
            flags.push(format!("-fmodule-map-file={file}"));
        }
        if self.target.inhibit_warnings() {
            flags.push("-suppress-warnings".to_string());
        }
        if !self.target.build_type().is_framework()
            && self.target.defines_module()
            && !self.test_xcconfig()
        {
            flags.extend([
                "-import-underlying-module".to_string(),
                "-Xcc".to_string(),
                "-fmodule-map-file=${SRCROOT}/${MODULEMAP_FILE}".to_string(),
            ]);
        }
        Some(flags)
    }

    // Linking.

    /// Whether consumers need `-ObjC` to load this target's Objective-C
    /// categories: always for static content, and for frameworks that
    /// carry any statically linked vendored artifact.
    pub fn requires_objc_linker_flag(&self) -> bool {
        if self.test_xcconfig() || !self.target.build_type().is_framework() {
            return true;
        }
        let own = self
            .target
            .file_accessors
            .iter()
            .any(FileAccessor::has_vendored_static_artifacts);
        own || self
            .graph
            .recursive_dependent_targets(self.target)
            .iter()
            .any(|t| {
                t.file_accessors
                    .iter()
                    .any(FileAccessor::has_vendored_static_artifacts)
            })
    }

    pub fn requires_fobjc_arc(&self) -> bool {
        self.target.arc_compatibility_flag() && self.file_accessors().any(|fa| fa.requires_arc)
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

    // Merged spec fragments.

    fn merged_pod_target_xcconfigs(
        &self,
    ) -> (std::collections::BTreeMap<String, String>, Vec<String>) {
        let mut values_by_consumer_by_key: std::collections::BTreeMap<
            String,
            Vec<(String, String)>,
        > = Default::default();
        for (spec, consumer) in self.spec_consumers() {
            for (key, value) in &consumer.pod_target_xcconfig {
                values_by_consumer_by_key
                    .entry(key.clone())
                    .or_default()
                    .push((spec.name.clone(), value.clone()));
            }
        }
        merged_xcconfigs(&values_by_consumer_by_key, "pod_target_xcconfig")
    }

    fn settings_table() -> Vec<SettingDescriptor<Self>> {
        vec![
            SettingDescriptor {
                name: "CODE_SIGN_IDENTITY",
                sorted: false,
                uniqued: false,
                compute: |ctx| {
                    if ctx.target.build_type().is_framework()
                        && ctx.target.platform().name == crate::platform::PlatformName::Osx
                    {
                        Some(SettingValue::single(""))
                    } else {
                        None
                    }
                },
            },
            SettingDescriptor {
                name: "CONFIGURATION_BUILD_DIR",
                sorted: false,
                uniqued: false,
                compute: |ctx| {
                    if ctx.test_xcconfig() {
                        None
                    } else {
                        Some(SettingValue::single(
                            ctx.target
                                .configuration_build_dir(CONFIGURATION_BUILD_DIR_VARIABLE),
                        ))
                    }
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
                compute: |ctx| {
                    Some(SettingValue::List(ctx.target.header_search_paths(
                        ctx.graph,
                        ctx.sandbox,
                        ctx.test_spec.map(|s| s.name.as_str()),
                    )))
                },
            },
            SettingDescriptor {
                name: "LD_RUNPATH_SEARCH_PATHS",
                sorted: false,
                uniqued: false,
                compute: |ctx| {
                    if ctx.test_xcconfig() {
                        Some(SettingValue::List(ld_runpath_search_paths(
                            ctx.target.platform().name,
                            false,
                            true,
                        )))
                    } else {
                        None
                    }
                },
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
                compute: |ctx| {
                    Some(SettingValue::List(
                        ctx.module_map_files()
                            .into_iter()
                            .map(|f| format!("-fmodule-map-file={f}"))
                            .collect(),
                    ))
                },
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
                name: "PODS_ROOT",
                sorted: false,
                uniqued: false,
                compute: |_| Some(SettingValue::single("${SRCROOT}")),
            },
            SettingDescriptor {
                name: "PODS_TARGET_SRCROOT",
                sorted: false,
                uniqued: false,
                compute: |ctx| Some(SettingValue::single(ctx.target.pod_target_srcroot())),
            },
            SettingDescriptor {
                name: "PRODUCT_BUNDLE_IDENTIFIER",
                sorted: false,
                uniqued: false,
                compute: |_| {
                    Some(SettingValue::single(
                        "org.podgen.${PRODUCT_NAME:rfc1034identifier}",
                    ))
                },
            },
            SettingDescriptor {
                name: "SKIP_INSTALL",
                sorted: false,
                uniqued: false,
                compute: |_| Some(SettingValue::single("YES")),
            },
            SettingDescriptor {
                name: "SWIFT_INCLUDE_PATHS",
                sorted: true,
                uniqued: true,
                compute: |ctx| Some(SettingValue::List(ctx.swift_include_paths())),
            },
        ]
    }

    /// The full xcconfig for this context, with any merge warnings.
    pub fn xcconfig(&self) -> GeneratedXcconfig {
        let mut config = evaluate_settings(&Self::settings_table(), self);
        let (merged, warnings) = self.merged_pod_target_xcconfigs();
        config.merge(&merged);
        GeneratedXcconfig { config, warnings }
    }
}
