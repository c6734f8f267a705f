//! The installation sandbox.
//!
//! The sandbox owns the on-disk layout of fetched pods and generated
//! support files, knows which pods are local/external, and exposes the
//! header stores whose search paths feed the settings engine. Fetching
//! itself happens elsewhere; this module only answers path questions.

mod file_accessor;

pub use file_accessor::{FileAccessor, FileAccessorError};

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

/// A store of copied headers (`Headers/Public` or `Headers/Private`)
/// under the sandbox root, with one subdirectory per registered pod.
#[derive(Debug, Clone)]
pub struct HeadersStore {
    /// Path fragment under `${PODS_ROOT}`, e.g. `Headers/Public`.
    relative_root: String,
    pods: BTreeSet<String>,
}

impl HeadersStore {
    pub fn new(relative_root: &str) -> Self {
        Self {
            relative_root: relative_root.to_string(),
            pods: BTreeSet::new(),
        }
    }

    /// Register a pod as having headers in this store.
    pub fn register(&mut self, pod_name: &str) {
        self.pods.insert(pod_name.to_string());
    }

    fn root_search_path(&self) -> String {
        format!("${{PODS_ROOT}}/{}", self.relative_root)
    }

    /// Header search paths exposed by this store.
    ///
    /// Scoped to one pod when `pod_name` is given, otherwise to every
    /// registered pod. Modular consumers resolve headers through the
    /// module map, so they only get the umbrella directory.
    pub fn search_paths(&self, pod_name: Option<&str>, modular: bool) -> Vec<String> {
        let root = self.root_search_path();
        if modular {
            return vec![root];
        }
        match pod_name {
            Some(pod) => vec![root.clone(), format!("{root}/{pod}")],
            None => {
                let mut paths = vec![root.clone()];
                paths.extend(self.pods.iter().map(|pod| format!("{root}/{pod}")));
                paths
            }
        }
    }
}

/// Per-pod checkout metadata recorded by the downloader (e.g. a git
/// commit sha). Opaque to this crate beyond equality.
pub type CheckoutOptions = BTreeMap<String, String>;

/// The installation sandbox rooted at the `Pods/` directory.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
    local_pods: BTreeSet<String>,
    checkout_options: BTreeMap<String, CheckoutOptions>,
    public_headers: HeadersStore,
    private_headers: HeadersStore,
}

impl Sandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            local_pods: BTreeSet::new(),
            checkout_options: BTreeMap::new(),
            public_headers: HeadersStore::new("Headers/Public"),
            private_headers: HeadersStore::new("Headers/Private"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding one pod's sources.
    pub fn pod_dir(&self, pod_name: &str) -> PathBuf {
        self.root.join(pod_name)
    }

    /// The generated umbrella project path.
    pub fn project_path(&self) -> PathBuf {
        self.root.join("Pods.xcodeproj")
    }

    /// The generated per-pod project path (multi-project generation).
    pub fn pod_target_project_path(&self, pod_name: &str) -> PathBuf {
        self.root.join(format!("{pod_name}.xcodeproj"))
    }

    /// The support-files directory (xcconfigs, module maps, scripts) for a
    /// generated target.
    pub fn support_files_dir(&self, target_label: &str) -> PathBuf {
        self.root.join("Target Support Files").join(target_label)
    }

    pub fn mark_local(&mut self, pod_name: &str) {
        self.local_pods.insert(pod_name.to_string());
    }

    /// Whether a pod is integrated from a local path (development pod).
    pub fn is_local(&self, pod_name: &str) -> bool {
        self.local_pods.contains(pod_name)
    }

    pub fn set_checkout_options(&mut self, pod_name: &str, options: CheckoutOptions) {
        self.checkout_options.insert(pod_name.to_string(), options);
    }

    pub fn checkout_options(&self, pod_name: &str) -> Option<&CheckoutOptions> {
        self.checkout_options.get(pod_name)
    }

    pub fn public_headers(&self) -> &HeadersStore {
        &self.public_headers
    }

    pub fn public_headers_mut(&mut self) -> &mut HeadersStore {
        &mut self.public_headers
    }

    pub fn private_headers(&self) -> &HeadersStore {
        &self.private_headers
    }

    /// All files under a pod's directory, as sorted sandbox-relative path
    /// strings. This is the `FILES` component of a local pod's cache
    /// fingerprint.
    pub fn tracked_files(&self, pod_name: &str) -> io::Result<Vec<String>> {
        let dir = self.pod_dir(pod_name);
        let mut files = Vec::new();
        if !dir.exists() {
            return Ok(files);
        }
        for entry in WalkDir::new(&dir).follow_links(false) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            files.push(relative.to_string_lossy().to_string());
        }
        files.sort();
        Ok(files)
    }
}

/// Expresses `path` relative to `base` using `..` components where needed.
/// Both paths must be absolute or share the same anchoring.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    let base_components: Vec<Component<'_>> = base.components().collect();
    let path_components: Vec<Component<'_>> = path.components().collect();
    let common = base_components
        .iter()
        .zip(path_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &path_components[common..] {
        result.push(component);
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}
