//! Resolved library specifications.
//!
//! A [`Specification`] is the immutable description of one library unit as
//! produced by the dependency resolver: name, version, and per-platform
//! consumer attributes. Root specs own subspecs and test specs through the
//! `Root/Sub` name-spacing convention; this module only models the resolved
//! output, not podspec evaluation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::platform::PlatformName;
use crate::version::Version;

/// Platform-scoped attributes of a specification, as seen by one platform's
/// compilation of the pod.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    /// System frameworks to link (`-framework`).
    pub frameworks: Vec<String>,
    /// System frameworks to weakly link (`-weak_framework`).
    pub weak_frameworks: Vec<String>,
    /// System libraries to link (`-l`).
    pub libraries: Vec<String>,
    /// Whether sources compile with ARC.
    pub requires_arc: bool,
    /// Names of pods this spec depends on.
    pub dependencies: Vec<String>,
    /// Glob patterns for source files.
    pub source_files: Vec<String>,
    /// Glob patterns excluded from every file pattern.
    pub exclude_files: Vec<String>,
    /// Glob patterns for public headers.
    pub public_header_files: Vec<String>,
    /// Glob patterns for private headers.
    pub private_header_files: Vec<String>,
    /// Glob patterns for vendored `.framework` bundles.
    pub vendored_frameworks: Vec<String>,
    /// Glob patterns for vendored static/dynamic libraries.
    pub vendored_libraries: Vec<String>,
    /// Glob patterns for resources.
    pub resources: Vec<String>,
    /// xcconfig fragment applied to the pod's own targets.
    pub pod_target_xcconfig: BTreeMap<String, String>,
    /// xcconfig fragment propagated to the integrating user target.
    pub user_target_xcconfig: BTreeMap<String, String>,
}

/// An immutable description of a library unit.
///
/// Subspecs carry their parent chain in `name` (`Root/Sub`); test specs are
/// flagged explicitly. Equality is structural; the resolver guarantees one
/// instance per (name, version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Fully qualified name, e.g. `Alamofire` or `Firebase/Core`.
    pub name: String,
    pub version: Version,
    /// Content checksum of the podspec, computed by the resolver.
    pub checksum: String,
    /// Whether this spec describes a test bundle.
    pub test_specification: bool,
    /// Root-spec opt-in to static-framework packaging.
    pub static_framework: bool,
    /// Explicit module name override.
    pub module_name: Option<String>,
    /// Swift version the spec declares support for.
    pub swift_version: Option<Version>,
    /// Per-platform consumer attributes.
    pub consumers: BTreeMap<PlatformName, Consumer>,
}

impl Specification {
    pub fn new(name: &str, version: Version) -> Self {
        Self {
            name: name.to_string(),
            version,
            checksum: String::new(),
            test_specification: false,
            static_framework: false,
            module_name: None,
            swift_version: None,
            consumers: BTreeMap::new(),
        }
    }

    /// The name of the root spec (`Firebase/Core` -> `Firebase`).
    pub fn root_name(&self) -> &str {
        self.name.split('/').next().unwrap_or(&self.name)
    }

    /// The last name component (`Firebase/Core` -> `Core`).
    pub fn base_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Whether this spec is a root spec (no parent chain).
    pub fn is_root(&self) -> bool {
        !self.name.contains('/')
    }

    /// The consumer for a platform, if the spec supports it.
    pub fn consumer(&self, platform: PlatformName) -> Option<&Consumer> {
        self.consumers.get(&platform)
    }

    /// `Name (1.2.0)`, the display form used in cache fingerprints.
    pub fn name_and_version(&self) -> String {
        format!("{} ({})", self.name, self.version)
    }

    /// The module name for compiled products: the explicit override, or the
    /// root name mangled into a C99 extended identifier.
    pub fn product_module_name(&self) -> String {
        match &self.module_name {
            Some(name) => name.clone(),
            None => c99ext_identifier(self.root_name()),
        }
    }
}

/// Mangles a name into a valid C99 extended identifier: every character
/// outside `[A-Za-z0-9_]` becomes `_`, and a leading digit is prefixed.
pub fn c99ext_identifier(name: &str) -> String {
    let mut result: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result.insert(0, '_');
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> Specification {
        Specification::new(name, Version::new("1.0.0").unwrap())
    }

    #[test]
    fn test_subspec_name_spacing() {
        let sub = spec("Firebase/Core");
        assert_eq!(sub.root_name(), "Firebase");
        assert_eq!(sub.base_name(), "Core");
        assert!(!sub.is_root());
        assert!(spec("Firebase").is_root());
    }

    #[test]
    fn test_name_and_version() {
        assert_eq!(spec("Alamofire").name_and_version(), "Alamofire (1.0.0)");
    }

    #[test]
    fn test_product_module_name_mangling() {
        assert_eq!(spec("AFNetworking").product_module_name(), "AFNetworking");
        assert_eq!(spec("swift-log").product_module_name(), "swift_log");
        assert_eq!(spec("1PasswordKit").product_module_name(), "_1PasswordKit");

        let mut named = spec("swift-log");
        named.module_name = Some("Logging".to_string());
        assert_eq!(named.product_module_name(), "Logging");
    }

    #[test]
    fn test_consumer_lookup() {
        let mut s = spec("Alamofire");
        s.consumers.insert(
            PlatformName::Ios,
            Consumer {
                frameworks: vec!["Foundation".to_string()],
                ..Consumer::default()
            },
        );
        assert!(s.consumer(PlatformName::Ios).is_some());
        assert!(s.consumer(PlatformName::Osx).is_none());
    }
}
