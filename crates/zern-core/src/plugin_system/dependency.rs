use std::fmt;

use crate::plugin_system::version::{ConstraintSet, Version};

/// Represents a dependency on another plugin.
///
/// The version range is kept as its raw source string; the resolver parses
/// and validates it after ordering, so malformed ranges surface as
/// resolution conflicts rather than registration failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDependency {
    /// The name of the required plugin.
    pub plugin_name: String,

    /// The acceptable version range, if constrained.
    pub version_range: Option<String>,

    /// Whether the dependency may be absent.
    pub optional: bool,
}

impl PluginDependency {
    /// Create a new required dependency with a specific version range.
    pub fn required(plugin_name: &str, version_range: &str) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            version_range: Some(version_range.to_string()),
            optional: false,
        }
    }

    /// Create a new required dependency with any version.
    pub fn required_any(plugin_name: &str) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            version_range: None,
            optional: false,
        }
    }

    /// Create a new optional dependency with a specific version range.
    pub fn optional(plugin_name: &str, version_range: &str) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            version_range: Some(version_range.to_string()),
            optional: true,
        }
    }

    /// Create a new optional dependency with any version.
    pub fn optional_any(plugin_name: &str) -> Self {
        Self {
            plugin_name: plugin_name.to_string(),
            version_range: None,
            optional: true,
        }
    }

    /// Check whether `version` satisfies this dependency's range.
    ///
    /// Returns `None` when the range string does not parse; the caller
    /// decides how to report that.
    pub fn accepts(&self, version: &Version) -> Option<bool> {
        match &self.version_range {
            Some(range) => ConstraintSet::parse(range).ok().map(|set| set.satisfies(version)),
            None => Some(true),
        }
    }
}

impl fmt::Display for PluginDependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirement = if self.optional { "Optional" } else { "Requires" };
        match &self.version_range {
            Some(range) => write!(f, "{} plugin: {} (version: {})", requirement, self.plugin_name, range),
            None => write!(f, "{} plugin: {} (any version)", requirement, self.plugin_name),
        }
    }
}
