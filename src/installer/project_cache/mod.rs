//! Incremental regeneration support.
//!
//! Each generated target is fingerprinted into a [`TargetCacheKey`]; the
//! fingerprints of the last successful generation persist in a
//! [`ProjectInstallationCache`]. Before the expensive generation work the
//! [`ProjectCacheAnalyzer`] diffs the two and reports which targets must
//! be regenerated.

mod analyzer;
mod installation_cache;
mod target_cache_key;

pub use analyzer::{ProjectCacheAnalysisResult, ProjectCacheAnalyzer};
pub use installation_cache::ProjectInstallationCache;
pub use target_cache_key::{KeyDifference, TargetCacheKey};

use crate::target::TargetError;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read or write the installation cache: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed installation cache: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to canonicalize cache contents: {0}")]
    Canonicalize(String),

    #[error(transparent)]
    Target(#[from] TargetError),
}
