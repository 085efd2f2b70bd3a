use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use semver::VersionReq;
use thiserror::Error;

/// Error type for version and constraint parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("invalid version '{input}': {detail}")]
    InvalidVersion { input: String, detail: String },

    #[error("invalid constraint '{input}': {detail}")]
    InvalidConstraint { input: String, detail: String },
}

impl VersionError {
    /// Stable error code for the taxonomy.
    pub fn code(&self) -> &'static str {
        match self {
            VersionError::InvalidVersion { .. } => "InvalidVersion",
            VersionError::InvalidConstraint { .. } => "InvalidConstraint",
        }
    }
}

/// A semantic version: `major.minor.patch` with optional prerelease and
/// build labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(semver::Version);

impl Version {
    /// Creates a plain release version.
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parses a version string like "1.2.3" or "1.2.3-rc.1+build.5".
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        semver::Version::parse(trimmed)
            .map(Self)
            .map_err(|e| VersionError::InvalidVersion {
                input: input.to_string(),
                detail: e.to_string(),
            })
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Returns a reference to the underlying `semver::Version`.
    pub fn semver(&self) -> &semver::Version {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

/// Compares two versions by precedence.
///
/// Prerelease identifiers order below the bare release (numeric
/// identifiers compare numerically, others lexically); build metadata is
/// ignored entirely.
pub fn compare_versions(a: &Version, b: &Version) -> Ordering {
    a.0.cmp_precedence(&b.0)
}

/// Operators recognized in constraint strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintOp {
    Exact,
    Caret,
    Tilde,
    Greater,
    GreaterEq,
    Less,
    LessEq,
    Wildcard,
}

/// A single-operator version constraint (e.g. `^1.2.3`, `>=2.0`).
///
/// The original constraint string is retained so constraints round-trip
/// through [`fmt::Display`] modulo whitespace. Bare versions take the
/// ecosystem caret default.
#[derive(Debug, Clone)]
pub struct Constraint {
    op: ConstraintOp,
    /// The original constraint string.
    source: String,
    /// The parsed semver requirement.
    req: VersionReq,
}

impl Constraint {
    /// Parses a constraint from a string.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let source = input.trim().to_string();
        if source.is_empty() {
            return Err(VersionError::InvalidConstraint {
                input: input.to_string(),
                detail: "empty constraint".to_string(),
            });
        }

        let op = if source == "*" {
            ConstraintOp::Wildcard
        } else if source.starts_with(">=") {
            ConstraintOp::GreaterEq
        } else if source.starts_with("<=") {
            ConstraintOp::LessEq
        } else if source.starts_with('>') {
            ConstraintOp::Greater
        } else if source.starts_with('<') {
            ConstraintOp::Less
        } else if source.starts_with('=') {
            ConstraintOp::Exact
        } else if source.starts_with('^') {
            ConstraintOp::Caret
        } else if source.starts_with('~') {
            ConstraintOp::Tilde
        } else if source.starts_with(|c: char| c.is_ascii_digit()) {
            ConstraintOp::Caret
        } else {
            return Err(VersionError::InvalidConstraint {
                input: input.to_string(),
                detail: "unrecognized operator".to_string(),
            });
        };

        let req = VersionReq::parse(&source).map_err(|e| VersionError::InvalidConstraint {
            input: input.to_string(),
            detail: e.to_string(),
        })?;

        Ok(Self { op, source, req })
    }

    pub fn op(&self) -> ConstraintOp {
        self.op
    }

    /// Checks whether `version` satisfies this constraint. O(1) beyond
    /// parsing.
    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version.semver())
    }

    /// Returns the original constraint string.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns a reference to the underlying `semver::VersionReq`.
    pub fn semver_req(&self) -> &VersionReq {
        &self.req
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for Constraint {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::parse(s)
    }
}

/// A `||`-joined set of constraints: satisfied if any alternative is.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    source: String,
    alternatives: Vec<Constraint>,
}

impl ConstraintSet {
    /// Parses a range string such as `^1.0 || >=2.2, <3.0`.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let source = input.trim().to_string();
        if source.is_empty() {
            return Err(VersionError::InvalidConstraint {
                input: input.to_string(),
                detail: "empty constraint".to_string(),
            });
        }
        let alternatives = source
            .split("||")
            .map(Constraint::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { source, alternatives })
    }

    /// Checks whether `version` satisfies any alternative.
    pub fn satisfies(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|c| c.matches(version))
    }

    pub fn alternatives(&self) -> &[Constraint] {
        &self.alternatives
    }

    /// Returns the original range string.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl PartialEq for ConstraintSet {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl FromStr for ConstraintSet {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintSet::parse(s)
    }
}
