//! Toolchain versions and selectors.
//!
//! A [`ToolchainVersion`] names exactly one toolchain: either a stable release
//! (`5.9.2`) or a dated snapshot on a development branch
//! (`main-snapshot-2024-01-01`, `5.10-snapshot-2024-01-01`). A
//! [`ToolchainSelector`] is a pattern over versions in which any trailing field
//! may be left out (`5`, `5.9`, `main-snapshot`) or the literal `latest`.
//!
//! Both parse the upstream identifier spellings as well
//! (`swift-5.9.2-RELEASE`, `swift-DEVELOPMENT-SNAPSHOT-2024-01-01-a`,
//! `swift-5.10-DEVELOPMENT-SNAPSHOT-2024-01-01-a`).
//!
//! ## Ordering
//!
//! Stable releases order by `(major, minor, patch)`. Snapshots order by branch
//! first (release branches by `major.minor`, all of them below `main`) and then
//! by their zero-padded ISO date. Any stable release sorts above any snapshot;
//! selectors never compare across kinds, so this only fixes a total order.

use crate::errors::SwiftlyError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stable release such as `5.9.2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StableRelease {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// The development branch a snapshot was cut from.
///
/// Variant order matters: release branches sort below `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Branch {
    /// A `swift-M.m-branch` release branch.
    Release { major: u32, minor: u32 },
    /// The main development branch.
    Main,
}

impl Branch {
    /// Returns the path segment used by the snapshot catalog (`main` or `5.10`).
    #[must_use = "returns the segment without side effects"]
    pub fn catalog_segment(&self) -> String {
        match self {
            Self::Main => "main".to_string(),
            Self::Release { major, minor } => format!("{major}.{minor}"),
        }
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.catalog_segment())
    }
}

/// A dated snapshot on a branch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snapshot {
    pub branch: Branch,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
}

/// A single installable toolchain.
///
/// Variant order matters: every snapshot sorts below every stable release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ToolchainVersion {
    Snapshot(Snapshot),
    Stable(StableRelease),
}

impl ToolchainVersion {
    /// Creates a stable release version.
    #[must_use]
    pub const fn stable(major: u32, minor: u32, patch: u32) -> Self {
        Self::Stable(StableRelease {
            major,
            minor,
            patch,
        })
    }

    /// Creates a snapshot version.
    #[must_use]
    pub fn snapshot(branch: Branch, date: impl Into<String>) -> Self {
        Self::Snapshot(Snapshot {
            branch,
            date: date.into(),
        })
    }

    /// Returns `true` for stable releases.
    #[must_use]
    pub const fn is_stable(&self) -> bool {
        matches!(self, Self::Stable(_))
    }

    /// Returns `true` for snapshots.
    #[must_use]
    pub const fn is_snapshot(&self) -> bool {
        matches!(self, Self::Snapshot(_))
    }

    /// Canonical display name, also the form stored in the config file.
    #[must_use = "returns the name without side effects"]
    pub fn name(&self) -> String {
        self.to_string()
    }

    /// Upstream identifier, used for toolchain directories and download paths.
    #[must_use = "returns the identifier without side effects"]
    pub fn identifier(&self) -> String {
        match self {
            Self::Stable(r) => format!("swift-{}.{}.{}-RELEASE", r.major, r.minor, r.patch),
            Self::Snapshot(Snapshot {
                branch: Branch::Main,
                date,
            }) => format!("swift-DEVELOPMENT-SNAPSHOT-{date}-a"),
            Self::Snapshot(Snapshot {
                branch: Branch::Release { major, minor },
                date,
            }) => format!("swift-{major}.{minor}-DEVELOPMENT-SNAPSHOT-{date}-a"),
        }
    }
}

impl fmt::Display for ToolchainVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stable(r) => write!(f, "{}.{}.{}", r.major, r.minor, r.patch),
            Self::Snapshot(s) => write!(f, "{}-snapshot-{}", s.branch, s.date),
        }
    }
}

impl FromStr for ToolchainVersion {
    type Err = SwiftlyError;

    /// Parses an exact version. A two-component release (`5.9`) means patch 0;
    /// snapshots must carry a date.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.parse::<ToolchainSelector>()? {
            ToolchainSelector::Stable {
                major,
                minor: Some(minor),
                patch,
            } => Ok(Self::stable(major, minor, patch.unwrap_or(0))),
            ToolchainSelector::Stable { minor: None, .. } => Err(SwiftlyError::parse_error(
                input,
                "a release version needs at least a major and minor component",
            )),
            ToolchainSelector::Snapshot {
                branch,
                date: Some(date),
            } => Ok(Self::snapshot(branch, date)),
            ToolchainSelector::Snapshot { date: None, .. } => Err(SwiftlyError::parse_error(
                input,
                "a snapshot version needs a date (YYYY-MM-DD)",
            )),
            ToolchainSelector::Latest => Err(SwiftlyError::parse_error(
                input,
                "\"latest\" is a selector, not a version",
            )),
        }
    }
}

impl TryFrom<String> for ToolchainVersion {
    type Error = SwiftlyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ToolchainVersion> for String {
    fn from(value: ToolchainVersion) -> Self {
        value.name()
    }
}

/// A pattern matching zero or more toolchain versions.
///
/// `None` fields are wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ToolchainSelector {
    Stable {
        major: u32,
        minor: Option<u32>,
        patch: Option<u32>,
    },
    Snapshot {
        branch: Branch,
        date: Option<String>,
    },
    /// The newest stable release.
    Latest,
}

impl ToolchainSelector {
    /// Returns `true` if `version` agrees with every non-wildcard field.
    ///
    /// `Latest` matches every stable release; callers pick the maximum.
    #[must_use]
    pub fn matches(&self, version: &ToolchainVersion) -> bool {
        match (self, version) {
            (Self::Latest, ToolchainVersion::Stable(_)) => true,
            (
                Self::Stable {
                    major,
                    minor,
                    patch,
                },
                ToolchainVersion::Stable(release),
            ) => {
                *major == release.major
                    && minor.is_none_or(|m| m == release.minor)
                    && patch.is_none_or(|p| p == release.patch)
            }
            (Self::Snapshot { branch, date }, ToolchainVersion::Snapshot(snapshot)) => {
                *branch == snapshot.branch
                    && date.as_ref().is_none_or(|d| *d == snapshot.date)
            }
            _ => false,
        }
    }

    /// Returns `true` if every field is specified, so at most one version matches.
    #[must_use]
    pub const fn is_exact(&self) -> bool {
        matches!(
            self,
            Self::Stable {
                minor: Some(_),
                patch: Some(_),
                ..
            } | Self::Snapshot { date: Some(_), .. }
        )
    }
}

impl From<&ToolchainVersion> for ToolchainSelector {
    fn from(version: &ToolchainVersion) -> Self {
        match version {
            ToolchainVersion::Stable(r) => Self::Stable {
                major: r.major,
                minor: Some(r.minor),
                patch: Some(r.patch),
            },
            ToolchainVersion::Snapshot(s) => Self::Snapshot {
                branch: s.branch,
                date: Some(s.date.clone()),
            },
        }
    }
}

impl fmt::Display for ToolchainSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Latest => f.write_str("latest"),
            Self::Stable {
                major,
                minor,
                patch,
            } => {
                write!(f, "{major}")?;
                if let Some(minor) = minor {
                    write!(f, ".{minor}")?;
                    if let Some(patch) = patch {
                        write!(f, ".{patch}")?;
                    }
                }
                Ok(())
            }
            Self::Snapshot { branch, date } => {
                write!(f, "{branch}-snapshot")?;
                if let Some(date) = date {
                    write!(f, "-{date}")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for ToolchainSelector {
    type Err = SwiftlyError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        if s.is_empty() {
            return Err(SwiftlyError::parse_error(input, "selector is empty"));
        }
        if s == "latest" {
            return Ok(Self::Latest);
        }
        if let Some(rest) = s.strip_prefix("swift-") {
            return parse_identifier(input, rest);
        }
        if let Some((branch, tail)) = s.split_once("-snapshot") {
            let branch = parse_branch(input, branch)?;
            let date = match tail {
                "" => None,
                _ => match tail.strip_prefix('-') {
                    Some(date) => Some(parse_date(input, date)?),
                    None => {
                        return Err(SwiftlyError::parse_error(
                            input,
                            "expected '-YYYY-MM-DD' after '-snapshot'",
                        ));
                    }
                },
            };
            return Ok(Self::Snapshot { branch, date });
        }
        parse_release_components(input, s)
    }
}

/// Parses `5`, `5.9` or `5.9.2`.
fn parse_release_components(input: &str, s: &str) -> Result<ToolchainSelector, SwiftlyError> {
    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() > 3 {
        return Err(SwiftlyError::parse_error(
            input,
            "expected at most major.minor.patch",
        ));
    }
    let major = parse_number(input, parts[0], "major")?;
    let minor = parts
        .get(1)
        .map(|p| parse_number(input, p, "minor"))
        .transpose()?;
    let patch = parts
        .get(2)
        .map(|p| parse_number(input, p, "patch"))
        .transpose()?;
    Ok(ToolchainSelector::Stable {
        major,
        minor,
        patch,
    })
}

/// Parses the part of an upstream identifier following `swift-`.
fn parse_identifier(input: &str, rest: &str) -> Result<ToolchainSelector, SwiftlyError> {
    if let Some(release) = rest.strip_suffix("-RELEASE") {
        return match parse_release_components(input, release)? {
            ToolchainSelector::Stable {
                major,
                minor: Some(minor),
                patch,
            } => Ok(ToolchainSelector::Stable {
                major,
                minor: Some(minor),
                patch: Some(patch.unwrap_or(0)),
            }),
            _ => Err(SwiftlyError::parse_error(
                input,
                "release identifiers need a major and minor component",
            )),
        };
    }

    let (branch, tail) = if let Some(tail) = rest.strip_prefix("DEVELOPMENT-SNAPSHOT-") {
        (Branch::Main, tail)
    } else if let Some((branch, tail)) = rest.split_once("-DEVELOPMENT-SNAPSHOT-") {
        (parse_branch(input, branch)?, tail)
    } else {
        return Err(SwiftlyError::parse_error(
            input,
            "unrecognized toolchain identifier",
        ));
    };

    // Upstream names end in a build letter such as `-a`.
    let date = match tail.rsplit_once('-') {
        Some((date, letter))
            if date.len() == 10 && !letter.is_empty() && letter.chars().all(|c| c.is_ascii_lowercase()) =>
        {
            date
        }
        _ => tail,
    };
    Ok(ToolchainSelector::Snapshot {
        branch,
        date: Some(parse_date(input, date)?),
    })
}

fn parse_branch(input: &str, s: &str) -> Result<Branch, SwiftlyError> {
    if s == "main" {
        return Ok(Branch::Main);
    }
    let Some((major, minor)) = s.split_once('.') else {
        return Err(SwiftlyError::parse_error(
            input,
            "snapshot branch must be 'main' or 'major.minor'",
        ));
    };
    Ok(Branch::Release {
        major: parse_number(input, major, "branch major")?,
        minor: parse_number(input, minor, "branch minor")?,
    })
}

fn parse_number(input: &str, s: &str, what: &str) -> Result<u32, SwiftlyError> {
    if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
        return Err(SwiftlyError::parse_error(
            input,
            format!("{what} version is not a number"),
        ));
    }
    s.parse()
        .map_err(|_| SwiftlyError::parse_error(input, format!("{what} version is out of range")))
}

/// Validates a zero-padded `YYYY-MM-DD` date.
fn parse_date(input: &str, s: &str) -> Result<String, SwiftlyError> {
    let bytes = s.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return Err(SwiftlyError::parse_error(
            input,
            format!("\"{s}\" is not a YYYY-MM-DD date"),
        ));
    }
    let month: u32 = s[5..7].parse().unwrap_or(0);
    let day: u32 = s[8..10].parse().unwrap_or(0);
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(SwiftlyError::parse_error(
            input,
            format!("\"{s}\" is not a valid calendar date"),
        ));
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ToolchainVersion {
        s.parse().unwrap()
    }

    fn sel(s: &str) -> ToolchainSelector {
        s.parse().unwrap()
    }

    #[test]
    fn parses_stable_versions() {
        assert_eq!(v("5.9.2"), ToolchainVersion::stable(5, 9, 2));
        assert_eq!(v("5.9"), ToolchainVersion::stable(5, 9, 0));
        assert_eq!(v(" 6.0.1\n"), ToolchainVersion::stable(6, 0, 1));
    }

    #[test]
    fn parses_snapshot_versions() {
        assert_eq!(
            v("main-snapshot-2024-01-01"),
            ToolchainVersion::snapshot(Branch::Main, "2024-01-01")
        );
        assert_eq!(
            v("5.10-snapshot-2024-02-15"),
            ToolchainVersion::snapshot(Branch::Release { major: 5, minor: 10 }, "2024-02-15")
        );
    }

    #[test]
    fn parses_upstream_identifiers() {
        assert_eq!(v("swift-5.9.2-RELEASE"), ToolchainVersion::stable(5, 9, 2));
        assert_eq!(v("swift-5.10-RELEASE"), ToolchainVersion::stable(5, 10, 0));
        assert_eq!(
            v("swift-DEVELOPMENT-SNAPSHOT-2024-01-01-a"),
            ToolchainVersion::snapshot(Branch::Main, "2024-01-01")
        );
        assert_eq!(
            v("swift-6.0-DEVELOPMENT-SNAPSHOT-2024-03-30-a"),
            ToolchainVersion::snapshot(Branch::Release { major: 6, minor: 0 }, "2024-03-30")
        );
    }

    #[test]
    fn name_and_identifier_round_trip() {
        for s in [
            "5.9.2",
            "0.0.0",
            "main-snapshot-2024-01-01",
            "5.10-snapshot-2023-12-31",
        ] {
            let version = v(s);
            assert_eq!(version.name(), s);
            assert_eq!(v(&version.identifier()), version);
        }
    }

    #[test]
    fn identifier_spellings() {
        assert_eq!(v("5.9.2").identifier(), "swift-5.9.2-RELEASE");
        assert_eq!(
            v("main-snapshot-2024-01-01").identifier(),
            "swift-DEVELOPMENT-SNAPSHOT-2024-01-01-a"
        );
        assert_eq!(
            v("5.10-snapshot-2024-01-01").identifier(),
            "swift-5.10-DEVELOPMENT-SNAPSHOT-2024-01-01-a"
        );
    }

    #[test]
    fn version_rejects_partial_or_malformed_input() {
        for s in [
            "",
            "5",
            "latest",
            "main-snapshot",
            "5.10-snapshot",
            "5.9.2.1",
            "5.x",
            "main-snapshot-2024-13-01",
            "main-snapshot-2024-1-1",
            "dev-snapshot-2024-01-01",
            "swift-5.9.2",
        ] {
            let err = s.parse::<ToolchainVersion>().unwrap_err();
            assert!(
                matches!(err, SwiftlyError::ParseError { .. }),
                "{s} should fail to parse"
            );
        }
    }

    #[test]
    fn parses_partial_selectors() {
        assert_eq!(sel("latest"), ToolchainSelector::Latest);
        assert_eq!(
            sel("5"),
            ToolchainSelector::Stable {
                major: 5,
                minor: None,
                patch: None
            }
        );
        assert_eq!(
            sel("5.9"),
            ToolchainSelector::Stable {
                major: 5,
                minor: Some(9),
                patch: None
            }
        );
        assert_eq!(
            sel("main-snapshot"),
            ToolchainSelector::Snapshot {
                branch: Branch::Main,
                date: None
            }
        );
        assert_eq!(
            sel("5.10-snapshot"),
            ToolchainSelector::Snapshot {
                branch: Branch::Release { major: 5, minor: 10 },
                date: None
            }
        );
    }

    #[test]
    fn selector_display_matches_input() {
        for s in [
            "latest",
            "5",
            "5.9",
            "5.9.2",
            "main-snapshot",
            "5.10-snapshot-2024-01-01",
        ] {
            assert_eq!(sel(s).to_string(), s);
        }
    }

    #[test]
    fn selector_rejects_malformed_input() {
        for s in ["", "   ", "5.", ".9", "main-snapshot-", "mainsnapshot", "swift-foo"] {
            assert!(s.parse::<ToolchainSelector>().is_err(), "{s:?}");
        }
    }

    #[test]
    fn partial_selector_matches_by_fields() {
        let five_nine = sel("5.9");
        assert!(five_nine.matches(&v("5.9.0")));
        assert!(five_nine.matches(&v("5.9.2")));
        assert!(!five_nine.matches(&v("5.10.0")));
        assert!(!five_nine.matches(&v("5.9-snapshot-2024-01-01")));

        let main = sel("main-snapshot");
        assert!(main.matches(&v("main-snapshot-2024-01-01")));
        assert!(!main.matches(&v("5.10-snapshot-2024-01-01")));
    }

    #[test]
    fn latest_matches_only_stable_releases() {
        assert!(ToolchainSelector::Latest.matches(&v("5.10.0")));
        assert!(!ToolchainSelector::Latest.matches(&v("main-snapshot-2024-01-01")));
    }

    #[test]
    fn exact_selector_from_version_matches_only_itself() {
        let version = v("5.9.2");
        let exact = ToolchainSelector::from(&version);
        assert!(exact.is_exact());
        assert!(exact.matches(&version));
        assert!(!exact.matches(&v("5.9.3")));
        assert!(!sel("5.9").is_exact());
    }

    #[test]
    fn stable_releases_order_numerically() {
        assert!(v("5.10.0") > v("5.9.2"));
        assert!(v("5.9.2") > v("5.9.0"));
        assert!(v("6.0.0") > v("5.10.1"));
    }

    #[test]
    fn snapshots_order_by_branch_then_date() {
        assert!(v("main-snapshot-2024-01-02") > v("main-snapshot-2024-01-01"));
        assert!(v("main-snapshot-2023-01-01") > v("5.10-snapshot-2024-06-01"));
        assert!(v("5.10-snapshot-2024-01-01") > v("5.9-snapshot-2024-06-01"));
    }

    #[test]
    fn stable_sorts_above_snapshots() {
        assert!(v("5.9.0") > v("main-snapshot-2024-01-01"));
    }

    #[test]
    fn serializes_as_canonical_name() {
        let json = serde_json::to_string(&v("swift-5.9.2-RELEASE")).unwrap();
        assert_eq!(json, "\"5.9.2\"");
        let back: ToolchainVersion = serde_json::from_str("\"main-snapshot-2024-01-01\"").unwrap();
        assert_eq!(back, v("main-snapshot-2024-01-01"));
        assert!(serde_json::from_str::<ToolchainVersion>("\"nonsense\"").is_err());
    }
}
