//! Installation options from the user's manifest.

use std::collections::BTreeMap;

use serde_json::Value;

/// Scheme-sharing policy for development pods.
///
/// The manifest value is either a boolean or a list of pod names; anything
/// else is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SchemeSharing {
    #[default]
    None,
    All,
    Pods(Vec<String>),
}

impl SchemeSharing {
    pub fn shares_scheme_for(&self, pod_name: &str) -> bool {
        match self {
            SchemeSharing::None => false,
            SchemeSharing::All => true,
            SchemeSharing::Pods(names) => names.iter().any(|n| n == pod_name),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("unknown installation options: {}", .0.join(", "))]
    UnknownKeys(Vec<String>),

    #[error(
        "the `share_schemes_for_development_pods` option must be a boolean \
         or a list of pod names, got `{0}`"
    )]
    InvalidSchemeSharing(Value),

    #[error("the `{key}` option must be a boolean, got `{value}`")]
    NotABoolean { key: String, value: Value },
}

/// User-customizable installation behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallationOptions {
    pub clean: bool,
    pub deduplicate_targets: bool,
    pub deterministic_uuids: bool,
    pub integrate_targets: bool,
    pub lock_pod_sources: bool,
    pub warn_for_multiple_pod_sources: bool,
    pub share_schemes_for_development_pods: SchemeSharing,
}

impl Default for InstallationOptions {
    fn default() -> Self {
        Self {
            clean: true,
            deduplicate_targets: true,
            deterministic_uuids: true,
            integrate_targets: true,
            lock_pod_sources: true,
            warn_for_multiple_pod_sources: true,
            share_schemes_for_development_pods: SchemeSharing::None,
        }
    }
}

impl InstallationOptions {
    /// Parse options from the manifest's installation-method dictionary.
    /// Unknown keys are a user-facing error.
    pub fn from_manifest_options(options: &BTreeMap<String, Value>) -> Result<Self, OptionsError> {
        const KNOWN: &[&str] = &[
            "clean",
            "deduplicate_targets",
            "deterministic_uuids",
            "integrate_targets",
            "lock_pod_sources",
            "warn_for_multiple_pod_sources",
            "share_schemes_for_development_pods",
        ];
        let unknown: Vec<String> = options
            .keys()
            .filter(|k| !KNOWN.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(OptionsError::UnknownKeys(unknown));
        }

        let mut parsed = Self::default();
        let boolean = |key: &str, default: bool| -> Result<bool, OptionsError> {
            match options.get(key) {
                None => Ok(default),
                Some(Value::Bool(b)) => Ok(*b),
                Some(other) => Err(OptionsError::NotABoolean {
                    key: key.to_string(),
                    value: other.clone(),
                }),
            }
        };
        parsed.clean = boolean("clean", parsed.clean)?;
        parsed.deduplicate_targets = boolean("deduplicate_targets", parsed.deduplicate_targets)?;
        parsed.deterministic_uuids = boolean("deterministic_uuids", parsed.deterministic_uuids)?;
        parsed.integrate_targets = boolean("integrate_targets", parsed.integrate_targets)?;
        parsed.lock_pod_sources = boolean("lock_pod_sources", parsed.lock_pod_sources)?;
        parsed.warn_for_multiple_pod_sources =
            boolean("warn_for_multiple_pod_sources", parsed.warn_for_multiple_pod_sources)?;
        parsed.share_schemes_for_development_pods =
            parse_scheme_sharing(options.get("share_schemes_for_development_pods"))?;
        Ok(parsed)
    }
}

fn parse_scheme_sharing(value: Option<&Value>) -> Result<SchemeSharing, OptionsError> {
    match value {
        None => Ok(SchemeSharing::None),
        Some(Value::Bool(true)) => Ok(SchemeSharing::All),
        Some(Value::Bool(false)) => Ok(SchemeSharing::None),
        Some(Value::Array(entries)) => {
            let mut names = Vec::with_capacity(entries.len());
            for entry in entries {
                match entry {
                    Value::String(name) => names.push(name.clone()),
                    other => return Err(OptionsError::InvalidSchemeSharing(other.clone())),
                }
            }
            Ok(SchemeSharing::Pods(names))
        }
        Some(other) => Err(OptionsError::InvalidSchemeSharing(other.clone())),
    }
}
