//! Resolved file lists for one (spec, platform) pair.
//!
//! A `FileAccessor` materializes a consumer's glob patterns against the
//! pod's directory in the sandbox. The settings engine only reads the
//! resolved lists and a few derived booleans, so fixtures may also
//! construct accessors directly with literal paths.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::platform::PlatformName;
use crate::spec::Specification;

#[derive(Debug, thiserror::Error)]
pub enum FileAccessorError {
    #[error("spec '{spec}' has no consumer for platform {platform}")]
    MissingConsumer {
        spec: String,
        platform: PlatformName,
    },

    #[error("invalid file pattern '{pattern}' in spec '{spec}': {source}")]
    InvalidPattern {
        spec: String,
        pattern: String,
        source: globset::Error,
    },

    #[error("failed to walk pod directory {dir}: {source}")]
    Walk {
        dir: PathBuf,
        source: walkdir::Error,
    },
}

/// Resolved file lists for one spec on one platform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileAccessor {
    pub spec_name: String,
    pub test_specification: bool,
    pub requires_arc: bool,
    pub source_files: Vec<PathBuf>,
    pub public_headers: Vec<PathBuf>,
    pub private_headers: Vec<PathBuf>,
    pub vendored_static_frameworks: Vec<PathBuf>,
    pub vendored_dynamic_frameworks: Vec<PathBuf>,
    pub vendored_static_libraries: Vec<PathBuf>,
    pub vendored_dynamic_libraries: Vec<PathBuf>,
    pub resources: Vec<PathBuf>,
}

impl FileAccessor {
    /// An accessor with empty file lists, for direct fixture construction.
    pub fn empty(spec_name: &str) -> Self {
        Self {
            spec_name: spec_name.to_string(),
            ..Self::default()
        }
    }

    /// Resolve a consumer's file patterns against the pod directory.
    ///
    /// Vendored libraries are classified by extension (`.a` static,
    /// `.dylib` dynamic). Vendored frameworks follow the root spec's
    /// `static_framework` declaration; binary inspection belongs to the
    /// downloader, not this crate.
    pub fn resolve(
        spec: &Specification,
        platform: PlatformName,
        pod_dir: &Path,
        static_frameworks: bool,
    ) -> Result<Self, FileAccessorError> {
        let consumer = spec
            .consumer(platform)
            .ok_or_else(|| FileAccessorError::MissingConsumer {
                spec: spec.name.clone(),
                platform,
            })?;

        let entries = collect_entries(pod_dir)?;
        let exclude = build_globset(&spec.name, &consumer.exclude_files)?;
        let matched = |patterns: &[String]| -> Result<Vec<PathBuf>, FileAccessorError> {
            let set = build_globset(&spec.name, patterns)?;
            Ok(entries
                .iter()
                .filter(|(relative, _)| set.is_match(relative) && !exclude.is_match(relative))
                .map(|(_, absolute)| absolute.clone())
                .collect())
        };

        let mut accessor = Self {
            spec_name: spec.name.clone(),
            test_specification: spec.test_specification,
            requires_arc: consumer.requires_arc,
            source_files: matched(&consumer.source_files)?,
            public_headers: matched(&consumer.public_header_files)?,
            private_headers: matched(&consumer.private_header_files)?,
            resources: matched(&consumer.resources)?,
            ..Self::default()
        };

        for framework in matched(&consumer.vendored_frameworks)? {
            if static_frameworks {
                accessor.vendored_static_frameworks.push(framework);
            } else {
                accessor.vendored_dynamic_frameworks.push(framework);
            }
        }
        for library in matched(&consumer.vendored_libraries)? {
            match library.extension().and_then(|e| e.to_str()) {
                Some("dylib") => accessor.vendored_dynamic_libraries.push(library),
                _ => accessor.vendored_static_libraries.push(library),
            }
        }

        Ok(accessor)
    }

    pub fn vendored_frameworks(&self) -> impl Iterator<Item = &PathBuf> {
        self.vendored_static_frameworks
            .iter()
            .chain(&self.vendored_dynamic_frameworks)
    }

    pub fn vendored_libraries(&self) -> impl Iterator<Item = &PathBuf> {
        self.vendored_static_libraries
            .iter()
            .chain(&self.vendored_dynamic_libraries)
    }

    /// Vendored artifacts that are statically linked.
    pub fn vendored_static_artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.vendored_static_frameworks
            .iter()
            .chain(&self.vendored_static_libraries)
    }

    /// Vendored artifacts that are dynamically linked.
    pub fn vendored_dynamic_artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.vendored_dynamic_frameworks
            .iter()
            .chain(&self.vendored_dynamic_libraries)
    }

    pub fn has_vendored_static_artifacts(&self) -> bool {
        self.vendored_static_artifacts().next().is_some()
    }

    pub fn has_vendored_dynamic_artifacts(&self) -> bool {
        self.vendored_dynamic_artifacts().next().is_some()
    }

    pub fn has_source_files(&self) -> bool {
        !self.source_files.is_empty()
    }

    pub fn uses_swift(&self) -> bool {
        self.source_files
            .iter()
            .any(|f| f.extension().and_then(|e| e.to_str()) == Some("swift"))
    }
}

fn build_globset(spec: &str, patterns: &[String]) -> Result<GlobSet, FileAccessorError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| FileAccessorError::InvalidPattern {
            spec: spec.to_string(),
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|source| FileAccessorError::InvalidPattern {
            spec: spec.to_string(),
            pattern: String::new(),
            source,
        })
}

/// All entries under the pod directory as (pod-relative, absolute) pairs.
/// Directories are included so `*.framework` bundle patterns can match.
fn collect_entries(pod_dir: &Path) -> Result<Vec<(PathBuf, PathBuf)>, FileAccessorError> {
    let mut entries = Vec::new();
    if !pod_dir.exists() {
        return Ok(entries);
    }
    for entry in WalkDir::new(pod_dir).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|source| FileAccessorError::Walk {
            dir: pod_dir.to_path_buf(),
            source,
        })?;
        let relative = entry
            .path()
            .strip_prefix(pod_dir)
            .unwrap_or(entry.path())
            .to_path_buf();
        entries.push((relative, entry.path().to_path_buf()));
    }
    entries.sort();
    Ok(entries)
}
