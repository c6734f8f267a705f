//! How a target's product is packaged and linked.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::spec::Specification;

/// How the product binary is linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Static,
    Dynamic,
}

/// How the product is packaged on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Packaging {
    Library,
    Framework,
}

/// Packaging × linkage of a generated target. The two enums make the four
/// canonical combinations the only representable ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildType {
    pub linkage: Linkage,
    pub packaging: Packaging,
}

impl BuildType {
    pub const fn static_library() -> Self {
        Self {
            linkage: Linkage::Static,
            packaging: Packaging::Library,
        }
    }

    pub const fn dynamic_library() -> Self {
        Self {
            linkage: Linkage::Dynamic,
            packaging: Packaging::Library,
        }
    }

    pub const fn static_framework() -> Self {
        Self {
            linkage: Linkage::Static,
            packaging: Packaging::Framework,
        }
    }

    pub const fn dynamic_framework() -> Self {
        Self {
            linkage: Linkage::Dynamic,
            packaging: Packaging::Framework,
        }
    }

    /// The build type for a spec given the host's packaging choice.
    ///
    /// Hosts that do not request frameworks always get static libraries.
    /// Hosts that do get a static framework when the root spec opts in,
    /// otherwise a dynamic framework. Total over its inputs.
    pub fn infer_from_spec(spec: &Specification, host_requires_frameworks: bool) -> Self {
        if host_requires_frameworks {
            if spec.static_framework {
                Self::static_framework()
            } else {
                Self::dynamic_framework()
            }
        } else {
            Self::static_library()
        }
    }

    pub fn is_static(&self) -> bool {
        self.linkage == Linkage::Static
    }

    pub fn is_dynamic(&self) -> bool {
        self.linkage == Linkage::Dynamic
    }

    pub fn is_framework(&self) -> bool {
        self.packaging == Packaging::Framework
    }

    pub fn is_library(&self) -> bool {
        self.packaging == Packaging::Library
    }

    pub fn is_static_library(&self) -> bool {
        self.is_static() && self.is_library()
    }

    pub fn is_dynamic_library(&self) -> bool {
        self.is_dynamic() && self.is_library()
    }

    pub fn is_static_framework(&self) -> bool {
        self.is_static() && self.is_framework()
    }

    pub fn is_dynamic_framework(&self) -> bool {
        self.is_dynamic() && self.is_framework()
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let linkage = match self.linkage {
            Linkage::Static => "static",
            Linkage::Dynamic => "dynamic",
        };
        let packaging = match self.packaging {
            Packaging::Library => "library",
            Packaging::Framework => "framework",
        };
        write!(f, "{linkage} {packaging}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn spec(static_framework: bool) -> Specification {
        let mut spec = Specification::new("Alpha", Version::new("1.0").unwrap());
        spec.static_framework = static_framework;
        spec
    }

    #[test]
    fn test_canonical_constructors() {
        assert!(BuildType::static_library().is_static_library());
        assert!(BuildType::dynamic_library().is_dynamic_library());
        assert!(BuildType::static_framework().is_static_framework());
        assert!(BuildType::dynamic_framework().is_dynamic_framework());
    }

    #[test]
    fn test_infer_without_frameworks_is_always_static_library() {
        assert_eq!(
            BuildType::infer_from_spec(&spec(false), false),
            BuildType::static_library()
        );
        // The static_framework flag is ignored when the host does not
        // request frameworks.
        assert_eq!(
            BuildType::infer_from_spec(&spec(true), false),
            BuildType::static_library()
        );
    }

    #[test]
    fn test_infer_with_frameworks_honors_static_framework_flag() {
        assert_eq!(
            BuildType::infer_from_spec(&spec(false), true),
            BuildType::dynamic_framework()
        );
        assert_eq!(
            BuildType::infer_from_spec(&spec(true), true),
            BuildType::static_framework()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(BuildType::static_framework().to_string(), "static framework");
        assert_eq!(BuildType::dynamic_library().to_string(), "dynamic library");
    }

    #[test]
    fn test_equality_by_value() {
        assert_eq!(BuildType::static_library(), BuildType::static_library());
        assert_ne!(BuildType::static_library(), BuildType::dynamic_library());
    }
}
