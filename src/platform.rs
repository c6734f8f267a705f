//! Apple platforms a target can be scoped to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::version::Version;

/// The platform family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformName {
    Ios,
    Osx,
    Tvos,
    Watchos,
}

impl fmt::Display for PlatformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlatformName::Ios => "iOS",
            PlatformName::Osx => "macOS",
            PlatformName::Tvos => "tvOS",
            PlatformName::Watchos => "watchOS",
        };
        f.write_str(name)
    }
}

/// A platform family plus an optional minimum deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: PlatformName,
    pub deployment_target: Option<Version>,
}

impl Platform {
    pub fn new(name: PlatformName) -> Self {
        Self {
            name,
            deployment_target: None,
        }
    }

    pub fn with_deployment_target(name: PlatformName, deployment_target: Version) -> Self {
        Self {
            name,
            deployment_target: Some(deployment_target),
        }
    }

    pub fn ios() -> Self {
        Self::new(PlatformName::Ios)
    }

    pub fn osx() -> Self {
        Self::new(PlatformName::Osx)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.deployment_target {
            Some(version) => write!(f, "{} {}", self.name, version),
            None => write!(f, "{}", self.name),
        }
    }
}
