#![cfg(test)]

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::plugin::{ApiDefinition, Plugin};
use crate::plugin_system::registry::{PluginOrder, PluginRegistry};

fn plugin(name: &str, version: &str) -> Plugin {
    Plugin::builder(name, version)
        .setup(|_| async { Ok(ApiDefinition::new()) })
        .build()
        .unwrap()
}

#[test]
fn register_keeps_insertion_order() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("c", "1.0.0"), None).unwrap();
    registry.register(plugin("a", "1.0.0"), None).unwrap();
    registry.register(plugin("b", "1.0.0"), None).unwrap();

    assert_eq!(registry.names(), vec!["c", "a", "b"]);
    assert_eq!(registry.plugin_count(), 3);
    assert!(registry.has_plugin("a"));
    assert_eq!(registry.get("b").unwrap().version(), "1.0.0");
}

#[test]
fn duplicate_names_are_rejected() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("core", "1.0.0"), None).unwrap();
    let err = registry.register(plugin("core", "2.0.0"), None).unwrap_err();
    assert!(matches!(err, PluginSystemError::DuplicatePlugin { name } if name == "core"));
    assert_eq!(registry.plugin_count(), 1);
}

#[test]
fn user_order_is_stored_only_when_non_empty() {
    let mut registry = PluginRegistry::new();
    registry
        .register(plugin("a", "1.0.0"), Some(PluginOrder::default()))
        .unwrap();
    registry
        .register(plugin("b", "1.0.0"), Some(PluginOrder::before(&["a"])))
        .unwrap();

    assert!(registry.user_order("a").is_none());
    let order = registry.user_order("b").unwrap();
    assert_eq!(order.before, vec!["a"]);
    assert!(order.after.is_empty());
}

#[test]
fn candidates_keep_every_version_of_a_name() {
    let mut registry = PluginRegistry::new();
    registry.register_candidate(plugin("core", "1.0.0"), None);
    registry.register_candidate(plugin("core", "2.0.0"), None);
    registry.register_candidate(plugin("core", "1.5.0"), None);

    // One primary entry, all versions available as candidates.
    assert_eq!(registry.plugin_count(), 1);
    assert!(registry.has_candidates("core"));
    let versions: Vec<String> = registry
        .candidates_for("core")
        .iter()
        .map(|p| p.version().to_string())
        .collect();
    assert_eq!(versions, vec!["1.0.0", "2.0.0", "1.5.0"]);
}

#[test]
fn clear_drops_everything() {
    let mut registry = PluginRegistry::new();
    registry
        .register(plugin("a", "1.0.0"), Some(PluginOrder::after(&["z"])))
        .unwrap();
    registry.clear();

    assert_eq!(registry.plugin_count(), 0);
    assert!(!registry.has_plugin("a"));
    assert!(registry.user_order("a").is_none());
}
