//! The declarative build-settings engine.
//!
//! Every build setting is a named, pure function of a settings context (one
//! target bound to a configuration or test flag). Settings are declared in
//! static descriptor tables, one per context kind, and evaluated through a
//! single generic engine into an [`Xcconfig`]. Plural settings serialize as
//! `$(inherited)`-prefixed, shell-quoted lists; singular settings are plain
//! strings; an absent value serializes as exactly the inheritance marker.

mod aggregate;
mod pod;
mod store;

pub use aggregate::AggregateTargetSettings;
pub use pod::PodTargetSettings;
pub use store::SettingsStore;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex_lite::Regex;
use sha2::{Digest, Sha256};

use crate::platform::PlatformName;
use crate::target::PodTarget;

/// Build settings whose values are ordered lists rather than strings.
pub const PLURAL_SETTINGS: &[&str] = &[
    "ALTERNATE_PERMISSIONS_FILES",
    "ARCHS",
    "BUILD_VARIANTS",
    "EXCLUDED_SOURCE_FILE_NAMES",
    "FRAMEWORK_SEARCH_PATHS",
    "GCC_PREPROCESSOR_DEFINITIONS",
    "GCC_PREPROCESSOR_DEFINITIONS_NOT_USED_IN_PRECOMPS",
    "HEADER_SEARCH_PATHS",
    "INFOPLIST_PREPROCESSOR_DEFINITIONS",
    "LD_RUNPATH_SEARCH_PATHS",
    "LIBRARY_SEARCH_PATHS",
    "OTHER_CFLAGS",
    "OTHER_CPLUSPLUSFLAGS",
    "OTHER_LDFLAGS",
    "OTHER_SWIFT_FLAGS",
    "REZ_SEARCH_PATHS",
    "SECTORDER_FLAGS",
    "SWIFT_ACTIVE_COMPILATION_CONDITIONS",
    "SWIFT_INCLUDE_PATHS",
    "WARNING_CFLAGS",
    "WARNING_LDFLAGS",
];

/// The variable for the per-target configuration build directory.
pub const CONFIGURATION_BUILD_DIR_VARIABLE: &str = "${PODS_CONFIGURATION_BUILD_DIR}";

/// The xcconfig inheritance marker.
pub const INHERITED: &str = "$(inherited)";

pub fn is_plural_setting(name: &str) -> bool {
    PLURAL_SETTINGS.contains(&name)
}

/// The computed value of one setting before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Single(String),
    List(Vec<String>),
}

impl SettingValue {
    pub fn single(value: impl Into<String>) -> Self {
        Self::Single(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

/// One row of a settings table: a setting name and the pure function that
/// computes it from the context, plus its list post-processing flags.
pub struct SettingDescriptor<C> {
    pub name: &'static str,
    pub sorted: bool,
    pub uniqued: bool,
    pub compute: fn(&C) -> Option<SettingValue>,
}

/// Evaluates a settings table against a context.
///
/// Every descriptor produces a line: absent values serialize as the
/// inheritance marker. List flags are applied before serialization so that
/// output never depends on graph traversal order.
pub fn evaluate_settings<C>(table: &[SettingDescriptor<C>], context: &C) -> Xcconfig {
    let mut xcconfig = Xcconfig::new();
    for descriptor in table {
        let value = (descriptor.compute)(context).map(|value| match value {
            SettingValue::List(mut items) => {
                if descriptor.sorted {
                    items.sort();
                    items.dedup();
                } else if descriptor.uniqued {
                    let mut seen = BTreeSet::new();
                    items.retain(|item| seen.insert(item.clone()));
                }
                SettingValue::List(items)
            }
            single => single,
        });
        xcconfig.set_setting(descriptor.name, value);
    }
    xcconfig
}

/// A rendered xcconfig: setting name to serialized value, ordered by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Xcconfig {
    settings: BTreeMap<String, String>,
}

impl Xcconfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes and stores one setting.
    ///
    /// Panics when the value shape contradicts the plural allow-list; that
    /// is a programmer error in a settings table, not user input.
    pub fn set_setting(&mut self, name: &str, value: Option<SettingValue>) {
        let serialized = match value {
            None => INHERITED.to_string(),
            Some(SettingValue::List(items)) => {
                if !is_plural_setting(name) {
                    panic!("{name} is not a plural setting, cannot have a list value");
                }
                format!("{INHERITED} {}", quote_list(&items))
            }
            Some(SettingValue::Single(value)) => {
                if is_plural_setting(name) {
                    panic!("{name} is a plural setting, cannot have a string value");
                }
                value
            }
        };
        self.settings.insert(name.to_string(), serialized);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.settings.get(name).map(String::as_str)
    }

    /// Merges already-serialized settings (an xcconfig fragment from a
    /// spec). Values for existing keys are appended with a space.
    pub fn merge(&mut self, fragment: &BTreeMap<String, String>) {
        for (key, value) in fragment {
            match self.settings.get_mut(key) {
                Some(existing) => {
                    existing.push(' ');
                    existing.push_str(value);
                }
                None => {
                    self.settings.insert(key.clone(), value.clone());
                }
            }
        }
    }

    /// `KEY = VALUE` lines, one per setting, sorted by key.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.settings {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Hex sha256 of the rendered text, the settings component of a
    /// target's cache fingerprint.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.render().as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// An xcconfig together with the non-fatal warnings its computation raised.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratedXcconfig {
    pub config: Xcconfig,
    pub warnings: Vec<String>,
}

fn key_value_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^([\w-]+?)=(.+)$").unwrap())
}

fn non_word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[^\w\d]").unwrap())
}

fn quote_trigger_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"[$\[\] ]").unwrap())
}

/// Space-joins a plural value, quoting each element with shell-like rules.
///
/// `KEY=VALUE` elements quote only the value portion, and only when it
/// contains a non-word character. Other elements are quoted whole when they
/// contain `$`, `[`, `]` or a space. Build tooling parses these files with
/// shell-like rules, so this serialization is byte-exact wire format.
pub fn quote_list(elements: &[String]) -> String {
    elements
        .iter()
        .map(|element| {
            if let Some(captures) = key_value_regex().captures(element) {
                let key = &captures[1];
                let value = &captures[2];
                if non_word_regex().is_match(value) {
                    format!("{key}=\"{value}\"")
                } else {
                    element.clone()
                }
            } else if quote_trigger_regex().is_match(element) {
                format!("\"{element}\"")
            } else {
                element.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Merges per-consumer xcconfig fragments into one settings map.
///
/// Boolean settings (case-insensitive yes/no) must agree across consumers;
/// plural settings concatenate all distinct values; other singular settings
/// must agree. Conflicts are non-fatal: the setting is dropped and a
/// warning describes the consumers involved.
pub fn merged_xcconfigs(
    values_by_consumer_by_key: &BTreeMap<String, Vec<(String, String)>>,
    attribute: &str,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut merged = BTreeMap::new();
    let mut warnings = Vec::new();

    for (key, values_by_consumer) in values_by_consumer_by_key {
        let mut unique_values: Vec<&str> = Vec::new();
        for (_, value) in values_by_consumer {
            if !unique_values.contains(&value.as_str()) {
                unique_values.push(value);
            }
        }
        let consumer_names = || {
            values_by_consumer
                .iter()
                .map(|(name, _)| name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let values_are_bools = unique_values
            .iter()
            .all(|v| v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("no"));

        if values_are_bools {
            if unique_values.len() > 1 {
                warnings.push(format!(
                    "Can't merge {attribute} for pod targets: {}. Boolean build setting {key} has different values.",
                    consumer_names()
                ));
            } else {
                merged.insert(key.clone(), unique_values[0].to_string());
            }
        } else if is_plural_setting(key) {
            merged.insert(key.clone(), unique_values.join(" "));
        } else if unique_values.len() > 1 {
            warnings.push(format!(
                "Can't merge {attribute} for pod targets: {}. Singular build setting {key} has different values.",
                consumer_names()
            ));
        } else {
            merged.insert(key.clone(), unique_values[0].to_string());
        }
    }
    (merged, warnings)
}

/// Filters out pod targets whose spec set is a subset of another's, so a
/// scoped variant and its superset are never both consulted.
pub fn select_maximal_pod_targets<'a>(pod_targets: Vec<&'a PodTarget>) -> Vec<&'a PodTarget> {
    let mut deduped: Vec<&PodTarget> = Vec::new();
    for target in pod_targets {
        if !deduped.iter().any(|t| t.label() == target.label()) {
            deduped.push(target);
        }
    }
    let spec_names: Vec<BTreeSet<&str>> = deduped
        .iter()
        .map(|t| t.specs().iter().map(|s| s.name.as_str()).collect())
        .collect();

    let mut subset = vec![false; deduped.len()];
    for i in 0..deduped.len() {
        for j in (i + 1)..deduped.len() {
            if spec_names[i].is_subset(&spec_names[j]) {
                subset[i] = true;
            } else if spec_names[j].is_subset(&spec_names[i]) {
                subset[j] = true;
            }
        }
    }
    deduped
        .into_iter()
        .zip(subset)
        .filter_map(|(target, is_subset)| (!is_subset).then_some(target))
        .collect()
}

/// `LD_RUNPATH_SEARCH_PATHS` for dynamically linked content.
pub fn ld_runpath_search_paths(
    platform: PlatformName,
    requires_host_target: bool,
    test_bundle: bool,
) -> Vec<String> {
    if platform == PlatformName::Osx {
        vec![
            "'@executable_path/../Frameworks'".to_string(),
            if test_bundle {
                "'@loader_path/../Frameworks'".to_string()
            } else {
                "'@loader_path/Frameworks'".to_string()
            },
        ]
    } else {
        let mut paths = vec![
            "'@executable_path/Frameworks'".to_string(),
            "'@loader_path/Frameworks'".to_string(),
        ];
        if requires_host_target {
            paths.push("'@executable_path/../../Frameworks'".to_string());
        }
        paths
    }
}

/// Search paths needed to import the developer test frameworks.
pub fn developer_framework_search_paths<'a>(
    frameworks: impl IntoIterator<Item = &'a String>,
) -> Vec<String> {
    let needs_developer_dir = frameworks
        .into_iter()
        .any(|f| f == "XCTest" || f == "SenTestingKit");
    if needs_developer_dir {
        vec!["$(PLATFORM_DIR)/Developer/Library/Frameworks".to_string()]
    } else {
        vec![]
    }
}
