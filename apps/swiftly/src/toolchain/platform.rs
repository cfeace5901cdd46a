//! Per-OS toolchain operations.
//!
//! The install and activation state machines are OS-agnostic and reach the
//! operating system only through the [`Platform`] trait. One implementation
//! exists per supported OS ([`LinuxPlatform`], [`MacOsPlatform`]); [`current`]
//! selects it once at startup.
//!
//! A [`PlatformDefinition`] describes the distribution a toolchain is built
//! for. It is detected on first use and recorded in `config.json`.

use crate::toolchain::http::HttpClient;
use crate::toolchain::paths::SwiftlyPaths;
use crate::toolchain::version::ToolchainVersion;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use crate::toolchain::linux::LinuxPlatform;
pub use crate::toolchain::macos::MacOsPlatform;

/// Overrides platform detection with `name[:nameFull]`.
pub const SWIFTLY_PLATFORM_ENV: &str = "SWIFTLY_PLATFORM";

/// The platform toolchain builds are published for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformDefinition {
    /// Identifier used in download paths (`ubuntu2204`, `xcode`).
    pub name: String,
    /// Identifier used in archive file names (`ubuntu22.04`, `osx`).
    pub name_full: String,
    /// Display name (`Ubuntu 22.04`, `macOS`).
    pub name_pretty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
}

/// Linux distributions with published toolchains: `(name, nameFull, namePretty)`.
pub const LINUX_PLATFORMS: [(&str, &str, &str); 8] = [
    ("ubuntu2404", "ubuntu24.04", "Ubuntu 24.04"),
    ("ubuntu2204", "ubuntu22.04", "Ubuntu 22.04"),
    ("ubuntu2004", "ubuntu20.04", "Ubuntu 20.04"),
    ("ubuntu1804", "ubuntu18.04", "Ubuntu 18.04"),
    ("amazonlinux2", "amazonlinux2", "Amazon Linux 2"),
    ("ubi9", "ubi9", "RHEL 9"),
    ("debian12", "debian12", "Debian GNU/Linux 12"),
    ("fedora39", "fedora39", "Fedora Linux 39"),
];

impl PlatformDefinition {
    /// The macOS definition; every macOS toolchain is published under `xcode`.
    #[must_use]
    pub fn macos() -> Self {
        Self {
            name: "xcode".to_string(),
            name_full: "osx".to_string(),
            name_pretty: "macOS".to_string(),
            architecture: current_architecture(),
        }
    }

    /// Looks up a known Linux distribution by its `name`.
    #[must_use]
    pub fn linux(name: &str) -> Option<Self> {
        LINUX_PLATFORMS
            .iter()
            .find(|(n, _, _)| *n == name)
            .map(|(name, full, pretty)| Self {
                name: (*name).to_string(),
                name_full: (*full).to_string(),
                name_pretty: (*pretty).to_string(),
                architecture: current_architecture(),
            })
    }

    /// Parses a `SWIFTLY_PLATFORM` value: a known name, or `name:nameFull`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty.
    pub fn from_override(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        let (name, full) = match spec.split_once(':') {
            Some((name, full)) => (name.trim(), Some(full.trim())),
            None => (spec, None),
        };
        if name.is_empty() {
            bail!("{SWIFTLY_PLATFORM_ENV} is set but names no platform");
        }
        if name == "xcode" {
            return Ok(Self::macos());
        }
        if full.is_none()
            && let Some(known) = Self::linux(name)
        {
            return Ok(known);
        }
        Ok(Self {
            name: name.to_string(),
            name_full: full.filter(|f| !f.is_empty()).unwrap_or(name).to_string(),
            name_pretty: name.to_string(),
            architecture: current_architecture(),
        })
    }

    /// Returns `true` for the macOS definition.
    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.name == "xcode"
    }

    /// Returns `true` when builds for this platform are the `aarch64` variants.
    #[must_use]
    pub fn is_aarch64(&self) -> bool {
        matches!(self.architecture.as_deref(), Some("aarch64" | "arm64"))
    }
}

/// The architecture swiftly was compiled for.
#[must_use]
pub fn current_architecture() -> Option<String> {
    match std::env::consts::ARCH {
        "x86_64" => Some("x86_64".to_string()),
        "aarch64" => Some("aarch64".to_string()),
        _ => None,
    }
}

/// OS-specific operations used by the install and activation state machines.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Short OS name for messages.
    fn name(&self) -> &'static str;

    /// Directory toolchains are installed into.
    fn toolchains_dir(&self) -> &Path;

    /// Directory a toolchain occupies once installed.
    fn toolchain_dir(&self, version: &ToolchainVersion) -> PathBuf;

    /// Directory holding a toolchain's executables.
    fn toolchain_bin_dir(&self, version: &ToolchainVersion) -> PathBuf {
        self.toolchain_dir(version).join("usr").join("bin")
    }

    /// Extension of the downloadable archive (`tar.gz`, `pkg`).
    fn archive_extension(&self) -> &'static str;

    /// Detects the platform definition, honouring an override.
    async fn detect_platform(&self, override_spec: Option<&str>) -> Result<PlatformDefinition>;

    /// Returns a script the user must run (as root) before the toolchain
    /// works, if any system packages are missing. Never executed by swiftly.
    async fn post_install_instructions(
        &self,
        platform: &PlatformDefinition,
        version: &ToolchainVersion,
    ) -> Result<Option<String>>;

    /// Verifies the downloaded archive's signature.
    async fn verify_signature(
        &self,
        http: &HttpClient,
        archive_url: &str,
        archive: &Path,
    ) -> Result<()>;

    /// Installs the downloaded archive into [`toolchain_dir`](Self::toolchain_dir).
    async fn install(&self, archive: &Path, version: &ToolchainVersion, verbose: bool)
    -> Result<()>;

    /// Removes an installed toolchain from disk.
    async fn uninstall(&self, version: &ToolchainVersion, verbose: bool) -> Result<()>;

    /// Returns the user's login shell.
    async fn get_shell(&self) -> Result<String>;
}

/// Selects the implementation for the running OS.
///
/// # Errors
///
/// Returns an error on operating systems without published toolchains.
pub fn current(paths: &SwiftlyPaths, catalog_server: &str) -> Result<Arc<dyn Platform>> {
    if cfg!(target_os = "macos") {
        Ok(Arc::new(MacOsPlatform::new(
            paths.toolchains_dir.clone(),
            paths.uses_system_toolchains_dir(),
        )))
    } else if cfg!(target_os = "linux") {
        Ok(Arc::new(LinuxPlatform::new(
            paths.toolchains_dir.clone(),
            format!("{catalog_server}/keys/all-keys.asc"),
        )))
    } else {
        bail!(
            "Unsupported operating system: {}. swiftly supports Linux and macOS.",
            std::env::consts::OS
        )
    }
}

/// A toolchain being extracted next to its final location.
///
/// Content is written under a hidden `.install-*` directory inside the
/// toolchains dir and renamed into place by [`commit`](Self::commit). Dropping
/// without committing deletes everything written so far. A directory already
/// at the final location is left alone until the commit replaces it.
#[derive(Debug)]
pub struct StagedInstall {
    staging: tempfile::TempDir,
    final_dir: PathBuf,
}

impl StagedInstall {
    /// Creates the staging directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn new(toolchains_dir: &Path, final_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(toolchains_dir).with_context(|| {
            format!("Failed to create directory: {}", toolchains_dir.display())
        })?;
        let staging = tempfile::Builder::new()
            .prefix(".install-")
            .tempdir_in(toolchains_dir)
            .with_context(|| {
                format!(
                    "Failed to create staging directory in {}",
                    toolchains_dir.display()
                )
            })?;
        Ok(Self { staging, final_dir })
    }

    /// Where the toolchain content should be written.
    #[must_use]
    pub fn content_dir(&self) -> PathBuf {
        self.staging.path().join("toolchain")
    }

    /// Moves the staged content into its final location.
    ///
    /// An existing directory there is moved into the staging area first and
    /// put back if the rename fails, so it is only deleted once the new
    /// content is in place.
    ///
    /// # Errors
    ///
    /// Returns an error if nothing was staged or a rename fails.
    pub fn commit(self) -> Result<()> {
        let content = self.content_dir();
        if !content.is_dir() {
            bail!("The toolchain archive was empty");
        }

        let replaced = self.staging.path().join("replaced");
        let has_previous = self.final_dir.symlink_metadata().is_ok();
        if has_previous {
            log::warn!(
                "replacing existing toolchain directory {}",
                self.final_dir.display()
            );
            std::fs::rename(&self.final_dir, &replaced).with_context(|| {
                format!("Failed to move aside {}", self.final_dir.display())
            })?;
        }

        if let Err(e) = std::fs::rename(&content, &self.final_dir) {
            if has_previous && let Err(restore) = std::fs::rename(&replaced, &self.final_dir) {
                log::error!(
                    "could not restore {}: {restore}",
                    self.final_dir.display()
                );
            }
            return Err(e).with_context(|| {
                format!(
                    "Failed to move {} to {}",
                    content.display(),
                    self.final_dir.display()
                )
            });
        }
        // The staging directory, including anything replaced, goes with `self`.
        Ok(())
    }
}

/// Returns the login shell from `$SHELL`, if set.
pub(crate) fn shell_from_env() -> Option<String> {
    std::env::var("SHELL").ok().filter(|s| !s.trim().is_empty())
}
