//! podgen - dependency manager core for Apple-platform libraries
//!
//! Given a resolved dependency graph (specs, platforms, linkage choices),
//! this crate derives per-target build settings, wires the dependency
//! edges between generated native targets, and fingerprints each target
//! so unchanged ones are skipped on the next run.
//!
//! Version resolution, source fetching, and the on-disk project format
//! live elsewhere; the [`podgen_xcodeproj`] crate stands in for the
//! project collaborator.

pub mod installer;
pub mod platform;
pub mod sandbox;
pub mod spec;
pub mod target;
pub mod version;

pub use installer::{ProjectCacheAnalyzer, ProjectInstallationCache, TargetValidator};
pub use platform::{Platform, PlatformName};
pub use sandbox::Sandbox;
pub use spec::Specification;
pub use target::build_settings::SettingsStore;
pub use target::{AggregateTarget, BuildType, PodTarget, TargetGraph};
pub use version::Version;
