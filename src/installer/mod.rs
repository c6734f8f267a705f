//! Generation-time orchestration: options, wiring, validation, and the
//! incremental project cache.

pub mod options;
pub mod project_cache;
pub mod target_validator;
pub mod wiring;

pub use options::{InstallationOptions, OptionsError, SchemeSharing};
pub use project_cache::{
    CacheError, KeyDifference, ProjectCacheAnalysisResult, ProjectCacheAnalyzer,
    ProjectInstallationCache, TargetCacheKey,
};
pub use target_validator::{TargetValidator, ValidationError, Violation};
pub use wiring::{
    AggregateTargetDependencyInstaller, PodTargetDependencyInstaller, TargetInstallationResult,
    WiringError,
};
