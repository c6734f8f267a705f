//! The persisted record of the last successful generation.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::target::ConfigurationType;

use super::{CacheError, TargetCacheKey};

/// Target fingerprints plus the global generation metadata active when
/// they were written. All metadata is optional so a missing or truncated
/// cache degrades to "nothing is cached".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectInstallationCache {
    cache_key_by_target_label: BTreeMap<String, TargetCacheKey>,
    build_configurations: Option<BTreeMap<String, ConfigurationType>>,
    project_object_version: Option<u32>,
    podfile_plugins: BTreeMap<String, Value>,
    project_name: Option<String>,
    created_at: Option<DateTime<Utc>>,
}

impl ProjectInstallationCache {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load the cache from disk. A missing file is an empty cache, not an
    /// error; a malformed file is.
    pub fn from_file(path: &Path) -> Result<Self, CacheError> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Persist the cache as canonical JSON, stamping the write time.
    pub fn save_as(&mut self, path: &Path) -> Result<(), CacheError> {
        self.created_at = Some(Utc::now());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json_canonicalizer::to_vec(self)
            .map_err(|e| CacheError::Canonicalize(e.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn cache_key_by_target_label(&self) -> &BTreeMap<String, TargetCacheKey> {
        &self.cache_key_by_target_label
    }

    pub fn build_configurations(&self) -> Option<&BTreeMap<String, ConfigurationType>> {
        self.build_configurations.as_ref()
    }

    pub fn project_object_version(&self) -> Option<u32> {
        self.project_object_version
    }

    pub fn podfile_plugins(&self) -> &BTreeMap<String, Value> {
        &self.podfile_plugins
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Record the state of a completed generation run.
    pub fn update(
        &mut self,
        cache_key_by_target_label: BTreeMap<String, TargetCacheKey>,
        build_configurations: BTreeMap<String, ConfigurationType>,
        project_object_version: u32,
        podfile_plugins: BTreeMap<String, Value>,
        project_name: &str,
    ) {
        self.cache_key_by_target_label = cache_key_by_target_label;
        self.build_configurations = Some(build_configurations);
        self.project_object_version = Some(project_object_version);
        self.podfile_plugins = podfile_plugins;
        self.project_name = Some(project_name.to_string());
    }
}
