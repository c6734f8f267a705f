//! In-memory model of a generated Xcode project.
//!
//! The settings/wiring engine never reads or writes the on-disk project
//! file format. It emits instructions against this handle-based model:
//! create native targets, connect dependency edges, attach product file
//! references to frameworks build phases, and write configuration-scoped
//! build settings. A separate serializer (out of scope here) turns a
//! `Project` into a `.xcodeproj`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Opaque handle to a native target within a [`Project`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NativeTargetId(usize);

/// Opaque handle to a file reference in the project's frameworks group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileReferenceId(usize);

/// The product a native target builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductType {
    StaticLibrary,
    DynamicLibrary,
    Framework,
    Bundle,
    UnitTestBundle,
    Application,
}

impl ProductType {
    /// File name of the built product for a target with the given basename.
    pub fn product_name(&self, basename: &str) -> String {
        match self {
            ProductType::StaticLibrary => format!("lib{basename}.a"),
            ProductType::DynamicLibrary => format!("lib{basename}.dylib"),
            ProductType::Framework => format!("{basename}.framework"),
            ProductType::Bundle => format!("{basename}.bundle"),
            ProductType::UnitTestBundle => format!("{basename}.xctest"),
            ProductType::Application => format!("{basename}.app"),
        }
    }
}

/// Errors raised when a handle does not belong to this project.
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("unknown native target handle {0:?}")]
    UnknownTarget(NativeTargetId),

    #[error("unknown file reference handle {0:?}")]
    UnknownFileReference(FileReferenceId),

    #[error("target '{0}' already exists in project '{1}'")]
    DuplicateTarget(String, String),
}

/// A native target: name, product, dependency edges, build phases, and
/// per-configuration build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeTarget {
    pub name: String,
    pub product_type: ProductType,
    pub product_basename: String,
    /// Dependency edges to other targets in the same project, in insertion
    /// order with duplicates suppressed.
    dependencies: Vec<NativeTargetId>,
    /// File references linked in the frameworks build phase.
    frameworks_build_phase: Vec<FileReferenceId>,
    /// File references copied in the resources build phase.
    resources_build_phase: Vec<FileReferenceId>,
    /// Build settings keyed by configuration name, then by setting key.
    build_settings: BTreeMap<String, BTreeMap<String, String>>,
}

impl NativeTarget {
    /// File name of this target's built product.
    pub fn product_name(&self) -> String {
        self.product_type.product_name(&self.product_basename)
    }

    pub fn dependencies(&self) -> &[NativeTargetId] {
        &self.dependencies
    }

    pub fn frameworks_build_phase(&self) -> &[FileReferenceId] {
        &self.frameworks_build_phase
    }

    pub fn resources_build_phase(&self) -> &[FileReferenceId] {
        &self.resources_build_phase
    }

    /// The build setting for `key` in `configuration`, if set.
    pub fn build_setting(&self, configuration: &str, key: &str) -> Option<&str> {
        self.build_settings
            .get(configuration)
            .and_then(|settings| settings.get(key))
            .map(String::as_str)
    }

    /// The value of `key` if it resolves identically across every
    /// configuration, mirroring how consumers read host-target settings.
    pub fn common_resolved_build_setting(&self, key: &str) -> Option<&str> {
        let mut values = self
            .build_settings
            .values()
            .map(|settings| settings.get(key).map(String::as_str));
        let first = values.next()?;
        if values.all(|v| v == first) {
            first
        } else {
            None
        }
    }
}

/// A file reference in the project's frameworks group, identified by the
/// product path it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReference {
    pub path: String,
}

/// An in-memory generated project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Configurations every new target is seeded with.
    pub build_configurations: Vec<String>,
    targets: Vec<NativeTarget>,
    frameworks_group: Vec<FileReference>,
}

impl Project {
    pub fn new(name: &str, build_configurations: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            build_configurations,
            targets: Vec::new(),
            frameworks_group: Vec::new(),
        }
    }

    /// Add a native target. Target names are unique within a project.
    pub fn new_target(
        &mut self,
        name: &str,
        product_type: ProductType,
        product_basename: &str,
    ) -> Result<NativeTargetId, ProjectError> {
        if self.targets.iter().any(|t| t.name == name) {
            return Err(ProjectError::DuplicateTarget(
                name.to_string(),
                self.name.clone(),
            ));
        }
        let build_settings = self
            .build_configurations
            .iter()
            .map(|config| (config.clone(), BTreeMap::new()))
            .collect();
        self.targets.push(NativeTarget {
            name: name.to_string(),
            product_type,
            product_basename: product_basename.to_string(),
            dependencies: Vec::new(),
            frameworks_build_phase: Vec::new(),
            resources_build_phase: Vec::new(),
            build_settings,
        });
        Ok(NativeTargetId(self.targets.len() - 1))
    }

    pub fn target(&self, id: NativeTargetId) -> Result<&NativeTarget, ProjectError> {
        self.targets.get(id.0).ok_or(ProjectError::UnknownTarget(id))
    }

    fn target_mut(&mut self, id: NativeTargetId) -> Result<&mut NativeTarget, ProjectError> {
        self.targets
            .get_mut(id.0)
            .ok_or(ProjectError::UnknownTarget(id))
    }

    pub fn target_named(&self, name: &str) -> Option<NativeTargetId> {
        self.targets
            .iter()
            .position(|t| t.name == name)
            .map(NativeTargetId)
    }

    pub fn targets(&self) -> impl Iterator<Item = (NativeTargetId, &NativeTarget)> {
        self.targets
            .iter()
            .enumerate()
            .map(|(i, t)| (NativeTargetId(i), t))
    }

    /// Add a dependency edge. Duplicate edges are suppressed.
    pub fn add_dependency(
        &mut self,
        from: NativeTargetId,
        to: NativeTargetId,
    ) -> Result<(), ProjectError> {
        self.target(to)?;
        let target = self.target_mut(from)?;
        if !target.dependencies.contains(&to) {
            target.dependencies.push(to);
        }
        Ok(())
    }

    /// Find or create a file reference for a built product in the
    /// frameworks group.
    pub fn product_file_reference(&mut self, product_name: &str) -> FileReferenceId {
        if let Some(pos) = self
            .frameworks_group
            .iter()
            .position(|f| f.path == product_name)
        {
            return FileReferenceId(pos);
        }
        self.frameworks_group.push(FileReference {
            path: product_name.to_string(),
        });
        FileReferenceId(self.frameworks_group.len() - 1)
    }

    pub fn file_reference(&self, id: FileReferenceId) -> Result<&FileReference, ProjectError> {
        self.frameworks_group
            .get(id.0)
            .ok_or(ProjectError::UnknownFileReference(id))
    }

    /// Link a file reference in a target's frameworks build phase.
    /// Duplicate references are suppressed.
    pub fn add_file_to_frameworks_phase(
        &mut self,
        target: NativeTargetId,
        file: FileReferenceId,
    ) -> Result<(), ProjectError> {
        self.file_reference(file)?;
        let target = self.target_mut(target)?;
        if !target.frameworks_build_phase.contains(&file) {
            target.frameworks_build_phase.push(file);
        }
        Ok(())
    }

    /// Add a file reference to a target's resources build phase.
    pub fn add_file_to_resources_phase(
        &mut self,
        target: NativeTargetId,
        file: FileReferenceId,
    ) -> Result<(), ProjectError> {
        self.file_reference(file)?;
        let target = self.target_mut(target)?;
        if !target.resources_build_phase.contains(&file) {
            target.resources_build_phase.push(file);
        }
        Ok(())
    }

    /// Write a build setting for one configuration of a target.
    pub fn set_build_setting(
        &mut self,
        target: NativeTargetId,
        configuration: &str,
        key: &str,
        value: &str,
    ) -> Result<(), ProjectError> {
        let target = self.target_mut(target)?;
        target
            .build_settings
            .entry(configuration.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Write a build setting across every configuration of a target.
    pub fn set_build_setting_in_all_configurations(
        &mut self,
        target: NativeTargetId,
        key: &str,
        value: &str,
    ) -> Result<(), ProjectError> {
        let configurations: Vec<String> = self.target(target)?.build_settings.keys().cloned().collect();
        for config in configurations {
            self.set_build_setting(target, &config, key, value)?;
        }
        Ok(())
    }
}
