#![cfg(test)]

use crate::plugin_system::plugin::{ApiDefinition, Plugin, PluginBuilder};
use crate::plugin_system::registry::{PluginOrder, PluginRegistry};
use crate::plugin_system::resolver::{Conflict, DependencyResolver, ResolveStrategy};

fn base(name: &str, version: &str) -> PluginBuilder {
    Plugin::builder(name, version).setup(|_| async { Ok(ApiDefinition::new()) })
}

fn plugin(name: &str, version: &str) -> Plugin {
    base(name, version).build().unwrap()
}

fn strict() -> DependencyResolver {
    DependencyResolver::new(ResolveStrategy::Strict)
}

#[test]
fn order_honors_dependencies_hints_and_user_rules() {
    // Registered [D, C, B, A]; B depends on A; C hints loadBefore D;
    // user order says C before D. Expected: [C, D, A, B].
    let mut registry = PluginRegistry::new();
    registry.register(plugin("D", "1.0.0"), None).unwrap();
    registry
        .register(
            base("C", "1.0.0").load_before(&["D"]).build().unwrap(),
            Some(PluginOrder::before(&["D"])),
        )
        .unwrap();
    registry
        .register(base("B", "1.0.0").depends_on("A").build().unwrap(), None)
        .unwrap();
    registry.register(plugin("A", "1.0.0"), None).unwrap();

    let resolution = strict().resolve(&registry, Vec::new()).unwrap();
    assert_eq!(resolution.order, vec!["C", "D", "A", "B"]);
    assert!(resolution.warnings.is_empty());
}

#[test]
fn missing_required_dependency_is_fatal() {
    let mut registry = PluginRegistry::new();
    registry
        .register(base("feature", "1.0.0").depends_on("core").build().unwrap(), None)
        .unwrap();

    let report = strict().resolve(&registry, Vec::new()).unwrap_err();
    assert_eq!(report.primary_code(), "DependencyMissing");
    assert!(matches!(
        &report.conflicts[0],
        Conflict::MissingDependency { plugin, dependency }
            if plugin == "feature" && dependency == "core"
    ));
}

#[test]
fn missing_optional_dependency_is_fine() {
    let mut registry = PluginRegistry::new();
    registry
        .register(
            base("feature", "1.0.0")
                .dependency(crate::plugin_system::PluginDependency::optional_any("extras"))
                .build()
                .unwrap(),
            None,
        )
        .unwrap();

    let resolution = strict().resolve(&registry, Vec::new()).unwrap();
    assert_eq!(resolution.order, vec!["feature"]);
}

#[test]
fn unsatisfied_version_is_fatal_under_strict() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("core", "1.0.0"), None).unwrap();
    registry
        .register(
            base("feature", "1.0.0").depends_on_version("core", "^2.0.0").build().unwrap(),
            None,
        )
        .unwrap();

    let report = strict().resolve(&registry, Vec::new()).unwrap_err();
    assert_eq!(report.primary_code(), "VersionUnsatisfied");
    assert!(matches!(
        &report.conflicts[0],
        Conflict::VersionUnsatisfied { plugin, dependency, required, actual }
            if plugin == "feature"
                && dependency == "core"
                && required == "^2.0.0"
                && actual == "1.0.0"
    ));
}

#[test]
fn permissive_downgrades_version_conflicts_to_warnings() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("core", "1.0.0"), None).unwrap();
    registry
        .register(
            base("feature", "1.0.0").depends_on_version("core", "^2.0.0").build().unwrap(),
            None,
        )
        .unwrap();

    let resolver = DependencyResolver::new(ResolveStrategy::Permissive);
    let resolution = resolver.resolve(&registry, Vec::new()).unwrap();
    // The dependency is still wired; only the constraint is waived.
    assert_eq!(resolution.order, vec!["core", "feature"]);
    assert_eq!(resolution.warnings.len(), 1);
    assert_eq!(resolution.warnings[0].code(), "VersionUnsatisfied");
}

#[test]
fn malformed_range_is_invalid_version_spec() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("core", "1.0.0"), None).unwrap();
    registry
        .register(
            base("feature", "1.0.0")
                .depends_on_version("core", "not-a-range")
                .build()
                .unwrap(),
            None,
        )
        .unwrap();

    let report = strict().resolve(&registry, Vec::new()).unwrap_err();
    assert_eq!(report.primary_code(), "InvalidVersionSpec");
}

#[test]
fn malformed_actual_version_is_invalid_version_spec() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("core", "not.semver"), None).unwrap();
    registry
        .register(
            base("feature", "1.0.0").depends_on_version("core", "^1.0.0").build().unwrap(),
            None,
        )
        .unwrap();

    let report = strict().resolve(&registry, Vec::new()).unwrap_err();
    assert_eq!(report.primary_code(), "InvalidVersionSpec");
}

#[test]
fn dependency_cycle_is_fatal_with_path() {
    let mut registry = PluginRegistry::new();
    registry
        .register(base("a", "1.0.0").depends_on("b").build().unwrap(), None)
        .unwrap();
    registry
        .register(base("b", "1.0.0").depends_on("a").build().unwrap(), None)
        .unwrap();

    let report = strict().resolve(&registry, Vec::new()).unwrap_err();
    assert_eq!(report.primary_code(), "DependencyCycle");
    match &report.conflicts[0] {
        Conflict::DependencyCycle { path } => {
            assert!(path.contains(&"a".to_string()));
            assert!(path.contains(&"b".to_string()));
        }
        other => panic!("unexpected conflict: {other:?}"),
    }
}

#[test]
fn permissive_drops_hint_only_cycles() {
    // a hints before b, b hints before a: a pure hint cycle.
    let mut registry = PluginRegistry::new();
    registry
        .register(base("a", "1.0.0").load_before(&["b"]).build().unwrap(), None)
        .unwrap();
    registry
        .register(base("b", "1.0.0").load_before(&["a"]).build().unwrap(), None)
        .unwrap();

    let strict_report = strict().resolve(&registry, Vec::new()).unwrap_err();
    assert_eq!(strict_report.primary_code(), "DependencyCycle");

    let permissive = DependencyResolver::new(ResolveStrategy::Permissive);
    let resolution = permissive.resolve(&registry, Vec::new()).unwrap();
    assert_eq!(resolution.order, vec!["a", "b"]);
    assert_eq!(resolution.warnings.len(), 1);
    assert_eq!(resolution.warnings[0].code(), "HintCycle");
}

#[test]
fn hints_to_unregistered_plugins_are_ignored() {
    let mut registry = PluginRegistry::new();
    registry
        .register(base("a", "1.0.0").load_before(&["ghost"]).build().unwrap(), None)
        .unwrap();

    let resolution = strict().resolve(&registry, Vec::new()).unwrap();
    assert_eq!(resolution.order, vec!["a"]);
}

#[test]
fn pending_duplicate_conflicts_are_fatal() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("core", "1.0.0"), None).unwrap();

    let pending = vec![Conflict::DuplicatePlugin { name: "core".to_string() }];
    let report = strict().resolve(&registry, pending).unwrap_err();
    assert_eq!(report.primary_code(), "DuplicatePlugin");
}

#[test]
fn auto_picks_highest_compatible_candidate() {
    let mut registry = PluginRegistry::new();
    registry.register_candidate(plugin("core", "1.0.0"), None);
    registry.register_candidate(plugin("core", "2.5.0"), None);
    registry.register_candidate(plugin("core", "1.9.0"), None);
    registry.register_candidate(
        base("feature", "1.0.0").depends_on_version("core", "^1.0.0").build().unwrap(),
        None,
    );

    let auto = DependencyResolver::new(ResolveStrategy::Auto);
    let resolution = auto.resolve(&registry, Vec::new()).unwrap();
    // 2.5.0 violates ^1.0.0; the highest compatible candidate wins.
    assert_eq!(resolution.plugins["core"].version(), "1.9.0");
    assert_eq!(resolution.order, vec!["core", "feature"]);
}

#[test]
fn auto_without_constraints_picks_highest_version() {
    let mut registry = PluginRegistry::new();
    registry.register_candidate(plugin("core", "1.0.0"), None);
    registry.register_candidate(plugin("core", "3.0.0"), None);
    registry.register_candidate(plugin("core", "2.0.0"), None);

    let auto = DependencyResolver::new(ResolveStrategy::Auto);
    let resolution = auto.resolve(&registry, Vec::new()).unwrap();
    assert_eq!(resolution.plugins["core"].version(), "3.0.0");
}

#[test]
fn resolver_reports_all_conflicts_at_once() {
    let mut registry = PluginRegistry::new();
    registry.register(plugin("core", "1.0.0"), None).unwrap();
    registry
        .register(
            base("feature", "1.0.0")
                .depends_on("ghost")
                .depends_on_version("core", "^2.0.0")
                .build()
                .unwrap(),
            None,
        )
        .unwrap();

    let report = strict().resolve(&registry, Vec::new()).unwrap_err();
    let codes: Vec<&str> = report.conflicts.iter().map(Conflict::code).collect();
    assert!(codes.contains(&"DependencyMissing"));
    assert!(codes.contains(&"VersionUnsatisfied"));
}
