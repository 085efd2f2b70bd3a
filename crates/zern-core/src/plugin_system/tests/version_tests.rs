#![cfg(test)]

use std::cmp::Ordering;

use crate::plugin_system::version::{
    compare_versions, Constraint, ConstraintOp, ConstraintSet, Version, VersionError,
};

#[test]
fn parse_and_display_round_trip() {
    for input in ["1.2.3", "0.1.0-alpha", "2.0.0-rc.1+build.5", "10.20.30"] {
        let version = Version::parse(input).unwrap();
        assert_eq!(version.to_string(), input);
    }
}

#[test]
fn parse_rejects_invalid_versions() {
    for input in ["", "1.2", "abc", "1.2.3.4"] {
        let err = Version::parse(input).unwrap_err();
        assert_eq!(err.code(), "InvalidVersion");
    }
}

#[test]
fn compare_orders_prerelease_below_release() {
    let pre = Version::parse("1.0.0-alpha").unwrap();
    let release = Version::parse("1.0.0").unwrap();
    assert_eq!(compare_versions(&pre, &release), Ordering::Less);
    assert_eq!(compare_versions(&release, &pre), Ordering::Greater);
}

#[test]
fn compare_prerelease_identifiers() {
    // Numeric identifiers compare numerically, others lexically.
    let a = Version::parse("1.0.0-alpha.2").unwrap();
    let b = Version::parse("1.0.0-alpha.11").unwrap();
    assert_eq!(compare_versions(&a, &b), Ordering::Less);

    let c = Version::parse("1.0.0-alpha").unwrap();
    let d = Version::parse("1.0.0-beta").unwrap();
    assert_eq!(compare_versions(&c, &d), Ordering::Less);
}

#[test]
fn compare_ignores_build_metadata() {
    let a = Version::parse("1.2.3+build.1").unwrap();
    let b = Version::parse("1.2.3+build.9").unwrap();
    assert_eq!(compare_versions(&a, &b), Ordering::Equal);
}

#[test]
fn compare_is_antisymmetric() {
    let versions = [
        Version::parse("0.9.9").unwrap(),
        Version::parse("1.0.0-alpha").unwrap(),
        Version::parse("1.0.0").unwrap(),
        Version::parse("1.0.1").unwrap(),
        Version::parse("2.0.0").unwrap(),
    ];
    for a in &versions {
        for b in &versions {
            let forward = compare_versions(a, b);
            let backward = compare_versions(b, a);
            assert_eq!(forward, backward.reverse());
        }
    }
}

#[test]
fn constraint_operators_are_recognized() {
    let cases = [
        ("=1.2.3", ConstraintOp::Exact),
        ("^1.2.3", ConstraintOp::Caret),
        ("~1.2.3", ConstraintOp::Tilde),
        (">1.0.0", ConstraintOp::Greater),
        (">=1.0.0", ConstraintOp::GreaterEq),
        ("<2.0.0", ConstraintOp::Less),
        ("<=2.0.0", ConstraintOp::LessEq),
        ("*", ConstraintOp::Wildcard),
    ];
    for (input, expected) in cases {
        let constraint = Constraint::parse(input).unwrap();
        assert_eq!(constraint.op(), expected, "for {input}");
        assert_eq!(constraint.to_string(), input);
    }
}

#[test]
fn caret_matches_same_major_at_or_above_base() {
    let constraint = Constraint::parse("^1.2.3").unwrap();
    assert!(constraint.matches(&Version::parse("1.2.3").unwrap()));
    assert!(constraint.matches(&Version::parse("1.9.0").unwrap()));
    assert!(!constraint.matches(&Version::parse("1.2.2").unwrap()));
    assert!(!constraint.matches(&Version::parse("2.0.0").unwrap()));
}

#[test]
fn tilde_matches_same_minor_with_patch_at_or_above_base() {
    let constraint = Constraint::parse("~1.2.3").unwrap();
    assert!(constraint.matches(&Version::parse("1.2.3").unwrap()));
    assert!(constraint.matches(&Version::parse("1.2.9").unwrap()));
    assert!(!constraint.matches(&Version::parse("1.3.0").unwrap()));
    assert!(!constraint.matches(&Version::parse("1.2.2").unwrap()));
}

#[test]
fn wildcard_matches_everything() {
    let constraint = Constraint::parse("*").unwrap();
    assert!(constraint.matches(&Version::parse("0.0.1").unwrap()));
    assert!(constraint.matches(&Version::parse("99.0.0").unwrap()));
}

#[test]
fn constraint_set_satisfies_any_alternative() {
    let set = ConstraintSet::parse("^1.0.0 || >=3.0.0").unwrap();
    assert!(set.satisfies(&Version::parse("1.5.0").unwrap()));
    assert!(set.satisfies(&Version::parse("3.1.0").unwrap()));
    assert!(!set.satisfies(&Version::parse("2.0.0").unwrap()));
    assert_eq!(set.alternatives().len(), 2);
}

#[test]
fn constraint_set_round_trips_source() {
    let source = "^1.0.0 || ~2.2.0";
    let set = ConstraintSet::parse(source).unwrap();
    assert_eq!(set.to_string(), source);
}

#[test]
fn invalid_constraints_are_rejected() {
    for input in ["", "not-a-range", "^^1.0.0"] {
        let err = ConstraintSet::parse(input).unwrap_err();
        assert_eq!(err.code(), "InvalidConstraint");
    }
    assert!(matches!(
        Constraint::parse("?1.0"),
        Err(VersionError::InvalidConstraint { .. })
    ));
}
