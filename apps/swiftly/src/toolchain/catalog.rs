//! Remote toolchain catalog.
//!
//! Available toolchains are published as static JSON documents on the
//! catalog server (default: `https://www.swift.org`):
//!
//! - `/api/v1/install/releases.json` lists stable releases with one entry
//!   per platform build:
//!
//! ```json
//! [
//!   {
//!     "name": "5.9.2",
//!     "platforms": [
//!       { "name": "Ubuntu 22.04", "platform": "Linux", "archs": ["x86_64", "aarch64"] },
//!       { "name": "Xcode", "platform": "macOS", "archs": ["x86_64", "arm64"] }
//!     ]
//!   }
//! ]
//! ```
//!
//! - `/api/v1/install/dev/<main|M.m>/<platform|macos>.json` lists snapshot
//!   directories per architecture:
//!
//! ```json
//! { "x86_64": [{ "dir": "swift-DEVELOPMENT-SNAPSHOT-2024-01-01-a" }] }
//! ```
//!
//! Archives themselves are fetched from the download server (default:
//! `https://download.swift.org`); see [`CatalogClient::download_url`].

use crate::errors::SwiftlyError;
use crate::toolchain::http::HttpClient;
use crate::toolchain::platform::{PlatformDefinition, current_architecture};
use crate::toolchain::version::{
    Branch, Snapshot, StableRelease, ToolchainSelector, ToolchainVersion,
};
use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeSet;

/// Environment variable to override the catalog server URL.
pub const CATALOG_SERVER_ENV: &str = "SWIFTLY_CATALOG_SERVER";

/// Environment variable to override the download server URL.
pub const DOWNLOAD_SERVER_ENV: &str = "SWIFTLY_DOWNLOAD_SERVER";

pub const DEFAULT_CATALOG_SERVER: &str = "https://www.swift.org";

pub const DEFAULT_DOWNLOAD_SERVER: &str = "https://download.swift.org";

const RELEASES_PATH: &str = "/api/v1/install/releases.json";

/// One release in `releases.json`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteRelease {
    pub name: String,
    #[serde(default)]
    pub platforms: Vec<RemotePlatform>,
}

/// A platform build of a release.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemotePlatform {
    /// Display name such as `Ubuntu 22.04`.
    pub name: String,
    /// OS family such as `Linux`.
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub archs: Vec<String>,
    #[serde(default)]
    pub checksum: Option<String>,
}

impl RemotePlatform {
    /// Maps the display name to the platform id used in download paths.
    #[must_use]
    pub fn platform_id(&self) -> Option<&'static str> {
        platform_id(&self.name)
    }
}

impl RemoteRelease {
    /// Returns the release as a stable version; two-component names get a
    /// `.0` patch.
    #[must_use]
    pub fn stable(&self) -> Option<StableRelease> {
        match self.name.parse::<ToolchainVersion>() {
            Ok(ToolchainVersion::Stable(release)) => Some(release),
            _ => None,
        }
    }

    /// Returns the build of this release for `platform` and `arch`, if any.
    ///
    /// Every release is available on macOS, whose packages are universal.
    #[must_use]
    pub fn build_for(&self, platform: &PlatformDefinition, arch: &str) -> Option<&RemotePlatform> {
        if platform.is_macos() {
            return self.platforms.first();
        }
        self.platforms
            .iter()
            .find(|p| p.platform_id() == Some(platform.name.as_str()))
            .filter(|p| p.archs.iter().any(|a| a == arch))
    }
}

/// The per-architecture snapshot lists of one branch.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteSnapshotList {
    #[serde(default)]
    pub aarch64: Vec<RemoteSnapshot>,
    #[serde(default)]
    pub x86_64: Vec<RemoteSnapshot>,
    #[serde(default)]
    pub universal: Vec<RemoteSnapshot>,
}

/// A snapshot directory such as `swift-5.10-DEVELOPMENT-SNAPSHOT-2024-01-01-a`.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSnapshot {
    pub dir: String,
}

impl RemoteSnapshot {
    /// Parses the directory name; unrecognized names yield `None`.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        match self.dir.parse::<ToolchainVersion>() {
            Ok(ToolchainVersion::Snapshot(snapshot)) => Some(snapshot),
            _ => None,
        }
    }
}

/// A toolchain chosen from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteToolchain {
    pub version: ToolchainVersion,
    /// Expected SHA-256 of the archive, when the catalog publishes one.
    pub checksum: Option<String>,
}

/// Maps a catalog display name to a platform id.
#[must_use]
pub fn platform_id(display_name: &str) -> Option<&'static str> {
    let id = match display_name {
        "Ubuntu 14.04" => "ubuntu1404",
        "Ubuntu 15.10" => "ubuntu1510",
        "Ubuntu 16.04" => "ubuntu1604",
        "Ubuntu 16.10" => "ubuntu1610",
        "Ubuntu 18.04" => "ubuntu1804",
        "Ubuntu 20.04" => "ubuntu2004",
        "Ubuntu 22.04" => "ubuntu2204",
        "Ubuntu 23.10" => "ubuntu2310",
        "Ubuntu 24.04" => "ubuntu2404",
        "Amazon Linux 2" => "amazonlinux2",
        "CentOS 7" => "centos7",
        "CentOS 8" => "centos8",
        "Windows 10" => "win10",
        "Red Hat Universal Base Image 9" => "ubi9",
        "Debian 12" => "debian12",
        "Fedora 39" => "fedora39",
        _ => return None,
    };
    Some(id)
}

/// Trims whitespace and trailing slashes from a server URL.
#[must_use]
pub fn normalize_server(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Client for the catalog and download servers.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: HttpClient,
    catalog_server: String,
    download_server: String,
}

impl CatalogClient {
    #[must_use]
    pub fn new(http: HttpClient, catalog_server: &str, download_server: &str) -> Self {
        Self {
            http,
            catalog_server: normalize_server(catalog_server),
            download_server: normalize_server(download_server),
        }
    }

    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// URL of the stable release list.
    #[must_use]
    pub fn releases_url(&self) -> String {
        format!("{}{RELEASES_PATH}", self.catalog_server)
    }

    /// URL of the snapshot list for `branch` on `platform`.
    #[must_use]
    pub fn snapshots_url(&self, platform: &PlatformDefinition, branch: Branch) -> String {
        let platform_name = if platform.is_macos() {
            "macos"
        } else {
            platform.name.as_str()
        };
        format!(
            "{}/api/v1/install/dev/{}/{platform_name}.json",
            self.catalog_server,
            branch.catalog_segment()
        )
    }

    /// Lists stable releases with a build for `platform`, newest first.
    ///
    /// # Errors
    ///
    /// - `CatalogUnavailable` if the catalog cannot be fetched
    /// - `CatalogMalformed` if it does not decode
    pub async fn list_releases(
        &self,
        platform: &PlatformDefinition,
        limit: Option<usize>,
        filter: Option<&(dyn Fn(&StableRelease) -> bool + Sync)>,
    ) -> Result<Vec<RemoteToolchain>> {
        let releases: Vec<RemoteRelease> = self.http.get_json(&self.releases_url()).await?;
        let arch = architecture(platform);

        let mut available: Vec<(StableRelease, Option<String>)> = releases
            .iter()
            .filter_map(|release| {
                let build = release.build_for(platform, &arch)?;
                let stable = release.stable()?;
                Some((stable, build.checksum.clone()))
            })
            .filter(|(stable, _)| filter.is_none_or(|f| f(stable)))
            .collect();

        available.sort_by(|a, b| b.0.cmp(&a.0));
        available.dedup_by(|a, b| a.0 == b.0);
        if let Some(limit) = limit {
            available.truncate(limit);
        }

        Ok(available
            .into_iter()
            .map(|(release, checksum)| RemoteToolchain {
                version: ToolchainVersion::Stable(release),
                checksum,
            })
            .collect())
    }

    /// Lists snapshots of `branch` with a build for `platform`, newest first.
    ///
    /// # Errors
    ///
    /// - `CatalogUnavailable` if the catalog cannot be fetched
    /// - `CatalogMalformed` if it does not decode
    pub async fn list_snapshots(
        &self,
        platform: &PlatformDefinition,
        branch: Branch,
        limit: Option<usize>,
        filter: Option<&(dyn Fn(&Snapshot) -> bool + Sync)>,
    ) -> Result<Vec<Snapshot>> {
        let list: RemoteSnapshotList = self
            .http
            .get_json(&self.snapshots_url(platform, branch))
            .await?;

        let entries = if platform.is_macos() {
            &list.universal
        } else {
            match architecture(platform).as_str() {
                "aarch64" => &list.aarch64,
                "x86_64" => &list.x86_64,
                _ => return Ok(Vec::new()),
            }
        };

        let snapshots: BTreeSet<Snapshot> = entries
            .iter()
            .filter_map(RemoteSnapshot::snapshot)
            .filter(|s| s.branch == branch)
            .filter(|s| filter.is_none_or(|f| f(s)))
            .collect();

        let mut snapshots: Vec<Snapshot> = snapshots.into_iter().rev().collect();
        if let Some(limit) = limit {
            snapshots.truncate(limit);
        }
        Ok(snapshots)
    }

    /// Picks the newest catalog toolchain matching `selector`.
    ///
    /// A snapshot selector with a date names its toolchain exactly and is
    /// returned without a catalog lookup, since the snapshot lists only
    /// cover recent builds.
    ///
    /// # Errors
    ///
    /// - `NoMatchingToolchain` if nothing in the catalog matches
    /// - any catalog error from [`list_releases`](Self::list_releases) or
    ///   [`list_snapshots`](Self::list_snapshots)
    pub async fn resolve_remote(
        &self,
        selector: &ToolchainSelector,
        platform: &PlatformDefinition,
    ) -> Result<RemoteToolchain> {
        match selector {
            ToolchainSelector::Snapshot {
                branch,
                date: Some(date),
            } => Ok(RemoteToolchain {
                version: ToolchainVersion::snapshot(*branch, date.clone()),
                checksum: None,
            }),
            ToolchainSelector::Snapshot { branch, date: None } => self
                .list_snapshots(platform, *branch, Some(1), None)
                .await?
                .into_iter()
                .next()
                .map(|snapshot| RemoteToolchain {
                    version: ToolchainVersion::Snapshot(snapshot),
                    checksum: None,
                })
                .ok_or_else(|| SwiftlyError::no_matching_toolchain(selector.to_string()).into()),
            ToolchainSelector::Stable { .. } | ToolchainSelector::Latest => {
                let matches = |release: &StableRelease| {
                    selector.matches(&ToolchainVersion::Stable(*release))
                };
                self.list_releases(platform, Some(1), Some(&matches))
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        SwiftlyError::no_matching_toolchain(selector.to_string()).into()
                    })
            }
        }
    }

    /// Returns the archive URL of `version` for `platform`.
    #[must_use]
    pub fn download_url(&self, version: &ToolchainVersion, platform: &PlatformDefinition) -> String {
        let category = match version {
            ToolchainVersion::Stable(r) => {
                format!("swift-{}.{}.{}-release", r.major, r.minor, r.patch)
            }
            ToolchainVersion::Snapshot(Snapshot {
                branch: Branch::Main,
                ..
            }) => "development".to_string(),
            ToolchainVersion::Snapshot(Snapshot {
                branch: Branch::Release { major, minor },
                ..
            }) => format!("swift-{major}.{minor}-branch"),
        };
        let identifier = version.identifier();

        if platform.is_macos() {
            return format!(
                "{}/{category}/xcode/{identifier}/{identifier}-osx.pkg",
                self.download_server
            );
        }

        let arch_suffix = if platform.is_aarch64() { "-aarch64" } else { "" };
        format!(
            "{}/{category}/{}{arch_suffix}/{identifier}/{identifier}-{}{arch_suffix}.tar.gz",
            self.download_server, platform.name, platform.name_full
        )
    }
}

/// The architecture catalog entries are filtered by.
fn architecture(platform: &PlatformDefinition) -> String {
    match platform
        .architecture
        .clone()
        .or_else(current_architecture)
        .as_deref()
    {
        Some("arm64") => "aarch64".to_string(),
        Some(arch) => arch.to_string(),
        None => String::new(),
    }
}
