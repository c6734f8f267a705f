//! The compiled-target representation of one pod.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use podgen_xcodeproj::ProductType;

use crate::platform::Platform;
use crate::sandbox::{FileAccessor, Sandbox};
use crate::spec::{Consumer, Specification};
use crate::target::{BuildType, TargetDefinition, TargetError, TargetGraph};
use crate::version::Version;

/// The compiled unit for one pod: its activated specs (root, subspecs,
/// test specs) scoped to one platform, one build type, and one scope.
///
/// Immutable after construction apart from lazily computed derived fields.
/// Dependency edges reference other pod targets by label; the
/// [`TargetGraph`] resolves them.
#[derive(Debug)]
pub struct PodTarget {
    specs: Vec<Specification>,
    target_definitions: Vec<TargetDefinition>,
    platform: Platform,
    build_type: BuildType,
    archs: Vec<String>,
    scope_suffix: Option<String>,
    label: String,
    /// Whether the manifest requested modular headers for this pod.
    pub modular_headers: bool,
    /// Resolved file lists, one per (spec, platform).
    pub file_accessors: Vec<FileAccessor>,
    /// Labels of directly dependent pod targets.
    pub dependent_targets: Vec<String>,
    /// Labels of each test spec's own dependent pod targets.
    pub test_dependent_targets_by_spec_name: BTreeMap<String, Vec<String>>,

    should_build: OnceCell<bool>,
    uses_swift: OnceCell<bool>,
}

impl PodTarget {
    /// Create a pod target.
    ///
    /// Requires at least one spec sharing one root, at least one concrete
    /// target definition, and a non-empty scope suffix when present.
    pub fn new(
        specs: Vec<Specification>,
        target_definitions: Vec<TargetDefinition>,
        platform: Platform,
        build_type: BuildType,
        archs: Vec<String>,
        scope_suffix: Option<String>,
    ) -> Result<Self, TargetError> {
        if specs.is_empty() {
            return Err(TargetError::NoSpecs);
        }
        let pod_name = specs[0].root_name().to_string();
        if specs.iter().any(|s| s.root_name() != pod_name) {
            return Err(TargetError::MixedRootSpecs(pod_name));
        }
        if target_definitions.is_empty() {
            return Err(TargetError::NoTargetDefinitions(pod_name));
        }
        if target_definitions.iter().all(|td| td.abstract_target) {
            return Err(TargetError::OnlyAbstractTargetDefinitions(pod_name));
        }
        if let Some(suffix) = &scope_suffix {
            if suffix.is_empty() {
                return Err(TargetError::EmptyScopeSuffix(pod_name));
            }
        }
        let label = match &scope_suffix {
            Some(suffix) => format!("{pod_name}-{suffix}"),
            None => pod_name,
        };
        Ok(Self {
            specs,
            target_definitions,
            platform,
            build_type,
            archs,
            scope_suffix,
            label,
            modular_headers: false,
            file_accessors: Vec::new(),
            dependent_targets: Vec::new(),
            test_dependent_targets_by_spec_name: BTreeMap::new(),
            should_build: OnceCell::new(),
            uses_swift: OnceCell::new(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// The root pod name (scope suffix excluded).
    pub fn pod_name(&self) -> &str {
        self.specs[0].root_name()
    }

    pub fn specs(&self) -> &[Specification] {
        &self.specs
    }

    /// The root spec, or the first spec when only subspecs are activated.
    pub fn root_spec(&self) -> &Specification {
        self.specs
            .iter()
            .find(|s| s.is_root())
            .unwrap_or(&self.specs[0])
    }

    pub fn test_specs(&self) -> impl Iterator<Item = &Specification> {
        self.specs.iter().filter(|s| s.test_specification)
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn build_type(&self) -> BuildType {
        self.build_type
    }

    pub fn archs(&self) -> &[String] {
        &self.archs
    }

    pub fn scope_suffix(&self) -> Option<&str> {
        self.scope_suffix.as_deref()
    }

    pub fn target_definitions(&self) -> &[TargetDefinition] {
        &self.target_definitions
    }

    /// Pod names this target's specs depend on, for validation.
    pub fn spec_dependencies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .spec_consumers(false)
            .flat_map(|c| c.dependencies.iter().map(String::as_str))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Every dependency label declared on this target, library and test.
    pub fn all_declared_dependency_labels(&self) -> impl Iterator<Item = &String> {
        self.dependent_targets
            .iter()
            .chain(self.test_dependent_targets_by_spec_name.values().flatten())
    }

    /// Consumers of this target's specs for its platform, filtered by
    /// whether they belong to test specs.
    pub fn spec_consumers(&self, test: bool) -> impl Iterator<Item = &Consumer> {
        self.specs
            .iter()
            .filter(move |s| s.test_specification == test)
            .filter_map(|s| s.consumer(self.platform.name))
    }

    pub fn file_accessors(&self, test: bool) -> impl Iterator<Item = &FileAccessor> {
        self.file_accessors
            .iter()
            .filter(move |fa| fa.test_specification == test)
    }

    /// Whether a native target should be generated: true when any library
    /// accessor resolved source files. Memoized.
    pub fn should_build(&self) -> bool {
        *self
            .should_build
            .get_or_init(|| self.file_accessors(false).any(|fa| fa.has_source_files()))
    }

    /// Whether any library source file is Swift. Memoized.
    pub fn uses_swift(&self) -> bool {
        *self
            .uses_swift
            .get_or_init(|| self.file_accessors(false).any(|fa| fa.uses_swift()))
    }

    /// Whether the product exposes a compiler module.
    pub fn defines_module(&self) -> bool {
        self.build_type.is_framework() || self.modular_headers
    }

    /// Whether consumers reach headers through a module map rather than
    /// raw include paths (library packaging only).
    pub fn uses_modular_headers(&self) -> bool {
        self.build_type.is_library() && self.modular_headers
    }

    pub fn inhibit_warnings(&self) -> bool {
        self.target_definitions.iter().any(|td| td.inhibit_warnings)
    }

    pub fn arc_compatibility_flag(&self) -> bool {
        self.target_definitions
            .iter()
            .any(|td| td.arc_compatibility_flag)
    }

    /// The declared Swift version, from the root spec.
    pub fn swift_version(&self) -> Option<&Version> {
        self.root_spec().swift_version.as_ref()
    }

    pub fn product_module_name(&self) -> String {
        self.root_spec().product_module_name()
    }

    pub fn product_basename(&self) -> String {
        if self.build_type.is_framework() {
            self.product_module_name()
        } else {
            self.label.clone()
        }
    }

    /// File name of the built product.
    pub fn product_name(&self) -> String {
        self.product_type().product_name(&self.product_basename())
    }

    pub fn product_type(&self) -> ProductType {
        if self.build_type.is_framework() {
            ProductType::Framework
        } else if self.build_type.is_dynamic() {
            ProductType::DynamicLibrary
        } else {
            ProductType::StaticLibrary
        }
    }

    /// Label of the generated test native target for a test spec.
    pub fn test_target_label(&self, test_spec: &Specification) -> String {
        format!("{}-Unit-{}", self.label, test_spec.base_name())
    }

    /// The per-target build products directory under `variable`.
    pub fn configuration_build_dir(&self, variable: &str) -> String {
        format!("{variable}/{}", self.label)
    }

    /// `SRCROOT` of the pod's sources as seen from generated projects.
    pub fn pod_target_srcroot(&self) -> String {
        format!("${{PODS_ROOT}}/{}", self.pod_name())
    }

    /// Header search paths for this target's own compilation.
    ///
    /// Own private headers (when present) and own public headers, plus the
    /// public headers of every recursive dependent target (test closure for
    /// test builds). A path set is scoped modular only when this target
    /// defines a module and, for dependents, the dependent also uses
    /// modular headers.
    pub fn header_search_paths(
        &self,
        graph: &TargetGraph,
        sandbox: &Sandbox,
        test_spec_name: Option<&str>,
    ) -> Vec<String> {
        let mut paths = Vec::new();
        let has_private_headers = self.file_accessors.iter().any(|fa| !fa.private_headers.is_empty());
        if has_private_headers {
            paths.extend(
                sandbox
                    .private_headers()
                    .search_paths(Some(self.pod_name()), false),
            );
        }
        paths.extend(
            sandbox
                .public_headers()
                .search_paths(Some(self.pod_name()), self.defines_module()),
        );

        let dependents = match test_spec_name {
            Some(spec) => graph.all_dependent_targets(self, spec),
            None => graph.recursive_dependent_targets(self),
        };
        for dependent in dependents {
            let modular = self.defines_module() && dependent.uses_modular_headers();
            paths.extend(
                sandbox
                    .public_headers()
                    .search_paths(Some(dependent.pod_name()), modular),
            );
        }
        paths
    }
}

/// Resolves whether a pod should build as a module from the (possibly
/// divergent) requirements of its integrating target definitions.
///
/// Divergence is non-fatal: the pod falls back to not defining a module
/// and a warning describes the ambiguity.
pub fn resolve_module_definition(
    pod_name: &str,
    requirements: &[bool],
) -> (bool, Option<String>) {
    let mut unique = requirements.to_vec();
    unique.sort_unstable();
    unique.dedup();
    match unique.as_slice() {
        [] => (false, None),
        [single] => (*single, None),
        _ => (
            false,
            Some(format!(
                "Unable to determine whether to build `{pod_name}` as a module; \
                 integrating targets disagree. Building without module support."
            )),
        ),
    }
}
