//! Minimal dotted version numbers.
//!
//! Used for spec versions, required Swift versions, and the
//! embed-standard-libraries threshold. Ordering is numeric per segment
//! with missing segments treated as zero ("2.3" == "2.3.0" < "2.10").

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A dotted sequence of numeric segments, e.g. `1.2.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    segments: Vec<u64>,
    raw: String,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("version string is empty")]
    Empty,

    #[error("invalid version segment '{0}'")]
    InvalidSegment(String),
}

impl Version {
    pub fn new(s: &str) -> Result<Self, VersionError> {
        s.parse()
    }

    /// A version from numeric segments, for in-code thresholds.
    pub fn from_segments(segments: &[u64]) -> Self {
        let raw = segments
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        Self {
            segments: segments.to_vec(),
            raw,
        }
    }

    pub fn segments(&self) -> &[u64] {
        &self.segments
    }

    /// The major segment.
    pub fn major(&self) -> u64 {
        self.segments.first().copied().unwrap_or(0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }
        let segments = trimmed
            .split('.')
            .map(|seg| {
                seg.parse::<u64>()
                    .map_err(|_| VersionError::InvalidSegment(seg.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            segments,
            raw: trimmed.to_string(),
        })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.raw
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let len = self.segments.len().max(other.segments.len());
        for i in 0..len {
            let a = self.segments.get(i).copied().unwrap_or(0);
            let b = other.segments.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                std::cmp::Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        std::cmp::Ordering::Equal
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
