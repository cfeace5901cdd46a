//! Toolchain install and uninstall.
//!
//! An install walks through the stages of [`InstallStage`]:
//!
//! ```text
//! Resolving -> Downloading -> Verifying -> Installing -> Registering -> Activated
//! ```
//!
//! Any stage may fail. The archive lives in a private temporary directory
//! that is removed on every exit path, and the platform only renames the
//! extracted toolchain into place once extraction succeeded, so a failed or
//! interrupted install never leaves a registered partial toolchain behind.

use crate::errors::SwiftlyError;
use crate::toolchain::activation::{Activator, Confirm};
use crate::toolchain::catalog::CatalogClient;
use crate::toolchain::download::ProgressCallback;
use crate::toolchain::paths::SwiftlyPaths;
use crate::toolchain::platform::{Platform, PlatformDefinition};
use crate::toolchain::registry::Registry;
use crate::toolchain::verify::verify_checksum;
use crate::toolchain::version::{ToolchainSelector, ToolchainVersion};
use anyhow::{Context, Result};
use std::fmt;
use std::sync::Arc;

/// Progress of an install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Resolving,
    Downloading,
    Verifying,
    Installing,
    Registering,
    Activated,
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resolving => "resolving",
            Self::Downloading => "downloading",
            Self::Verifying => "verifying",
            Self::Installing => "installing",
            Self::Registering => "registering",
            Self::Activated => "activated",
        })
    }
}

/// Knobs for [`ToolchainManager::install`].
#[derive(Clone, Default)]
pub struct InstallOptions {
    /// Check the archive's signature with the platform mechanism. Only tests
    /// turn this off.
    pub verify_signature: bool,
    /// Activate the toolchain even if another one is in use.
    pub use_after_install: bool,
    pub verbose: bool,
    pub progress: Option<ProgressCallback>,
}

impl fmt::Debug for InstallOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallOptions")
            .field("verify_signature", &self.verify_signature)
            .field("use_after_install", &self.use_after_install)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub version: ToolchainVersion,
    /// `true` if a matching toolchain was already installed and nothing was
    /// downloaded.
    pub already_installed: bool,
    /// `true` if the toolchain became the in-use toolchain.
    pub activated: bool,
    /// A script that must be run (as root) before the toolchain works.
    /// Returned for the user to run; never executed here.
    pub post_install: Option<String>,
    /// Why activating a freshly installed toolchain failed. The toolchain
    /// stays installed.
    pub activation_error: Option<String>,
}

/// Result of a successful uninstall.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UninstallOutcome {
    /// `true` if the removed toolchain was in use; nothing is in use now.
    pub was_in_use: bool,
}

/// Ties the registry, catalog, and platform together.
#[derive(Clone)]
pub struct ToolchainManager {
    platform: Arc<dyn Platform>,
    paths: SwiftlyPaths,
    registry: Registry,
    catalog: CatalogClient,
}

impl fmt::Debug for ToolchainManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolchainManager")
            .field("platform", &self.platform.name())
            .field("paths", &self.paths)
            .finish_non_exhaustive()
    }
}

impl ToolchainManager {
    #[must_use]
    pub fn new(
        platform: Arc<dyn Platform>,
        paths: SwiftlyPaths,
        registry: Registry,
        catalog: CatalogClient,
    ) -> Self {
        Self {
            platform,
            paths,
            registry,
            catalog,
        }
    }

    #[must_use]
    pub fn platform(&self) -> &dyn Platform {
        self.platform.as_ref()
    }

    #[must_use]
    pub fn paths(&self) -> &SwiftlyPaths {
        &self.paths
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    #[must_use]
    pub fn activator(&self) -> Activator<'_> {
        Activator::new(self.platform.as_ref(), &self.paths, &self.registry)
    }

    /// Returns the platform to install for.
    ///
    /// An override always wins. Otherwise the definition recorded in the
    /// config is used, and on first use it is detected and recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if detection fails or the config cannot be written.
    pub async fn ensure_platform(&self, override_spec: Option<&str>) -> Result<PlatformDefinition> {
        if override_spec.is_none()
            && let Some(platform) = self.registry.config()?.platform
        {
            return Ok(platform);
        }
        let platform = self.platform.detect_platform(override_spec).await?;
        self.registry.set_platform(&platform)?;
        log::debug!("platform is {} ({})", platform.name, platform.name_pretty);
        Ok(platform)
    }

    /// Installs the newest toolchain matching `selector`.
    ///
    /// If an installed toolchain already matches, nothing is downloaded and
    /// that toolchain is returned. A fresh install is activated when no
    /// toolchain is in use or `use_after_install` is set.
    ///
    /// # Errors
    ///
    /// - `NoMatchingToolchain` if the catalog has no match
    /// - `CatalogUnavailable` or `CatalogMalformed` from the catalog
    /// - `DownloadFailed` or `DownloadNotFound` from the download
    /// - `SignatureVerificationFailed` on a checksum or signature mismatch
    /// - `InstallFailed` if the archive cannot be extracted into place
    /// - any activation error from [`Activator::use_toolchain`] when the
    ///   toolchain was already installed. A fresh install that cannot be
    ///   activated still succeeds and reports why in
    ///   [`InstallOutcome::activation_error`].
    pub async fn install(
        &self,
        selector: &ToolchainSelector,
        platform: &PlatformDefinition,
        options: &InstallOptions,
        confirm: &Confirm,
    ) -> Result<InstallOutcome> {
        let stage = InstallStage::Resolving;
        log::debug!("{stage} {selector}");

        if let Some(version) = self.registry.resolve_best(selector)? {
            log::debug!("{selector} is satisfied by installed {version}");
            let activated = options.use_after_install
                && self.registry.in_use()?.as_ref() != Some(&version);
            if activated {
                self.activator().use_toolchain(&version, confirm)?;
            }
            return Ok(InstallOutcome {
                version,
                already_installed: true,
                activated,
                post_install: None,
                activation_error: None,
            });
        }

        let remote = self.catalog.resolve_remote(selector, platform).await?;
        let version = remote.version;
        if self.registry.config()?.is_installed(&version) {
            return Ok(Self::installed_meanwhile(version));
        }

        let post_install = self
            .platform
            .post_install_instructions(platform, &version)
            .await?;

        let download_dir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let archive = download_dir.path().join(format!(
            "{}.{}",
            version.identifier(),
            self.platform.archive_extension()
        ));
        let url = self.catalog.download_url(&version, platform);

        let stage = transition(&version, stage, InstallStage::Downloading);
        self.catalog
            .http()
            .download_file(&url, &archive, options.progress.clone())
            .await
            .inspect_err(|e| failed(&version, stage, e))?;

        let stage = transition(&version, stage, InstallStage::Verifying);
        if let Some(checksum) = &remote.checksum {
            verify_checksum(&archive, checksum).inspect_err(|e| failed(&version, stage, e))?;
        }
        if options.verify_signature {
            self.platform
                .verify_signature(self.catalog.http(), &url, &archive)
                .await
                .inspect_err(|e| failed(&version, stage, e))?;
        }

        let stage = transition(&version, stage, InstallStage::Installing);
        // Another process may have finished the same install during the download.
        if self.registry.config()?.is_installed(&version) {
            log::info!("{version} was installed by another process");
            return Ok(Self::installed_meanwhile(version));
        }
        if let Err(e) = self
            .platform
            .install(&archive, &version, options.verbose)
            .await
        {
            failed(&version, stage, &e);
            return Err(SwiftlyError::install_failed(version.name(), format!("{e:#}")).into());
        }
        drop(download_dir);

        let stage = transition(&version, stage, InstallStage::Registering);
        self.registry.add(&version)?;

        let mut activated = false;
        let mut activation_error = None;
        if options.use_after_install || self.registry.in_use()?.is_none() {
            match self.activator().use_toolchain(&version, confirm) {
                Ok(()) => {
                    activated = true;
                    transition(&version, stage, InstallStage::Activated);
                }
                Err(e) => {
                    log::warn!("{version} is installed but could not be activated: {e:#}");
                    activation_error = Some(format!("{e:#}"));
                }
            }
        }

        Ok(InstallOutcome {
            version,
            already_installed: false,
            activated,
            post_install,
            activation_error,
        })
    }

    fn installed_meanwhile(version: ToolchainVersion) -> InstallOutcome {
        InstallOutcome {
            version,
            already_installed: true,
            activated: false,
            post_install: None,
            activation_error: None,
        }
    }

    /// Removes an installed toolchain.
    ///
    /// The in-use toolchain is deactivated first; nothing is activated in
    /// its place.
    ///
    /// # Errors
    ///
    /// - `NotInstalled` if `version` is not registered
    /// - `ForeignSymlinkDetected` if its links were replaced
    /// - any error removing the toolchain from disk
    pub async fn uninstall(
        &self,
        version: &ToolchainVersion,
        verbose: bool,
    ) -> Result<UninstallOutcome> {
        let config = self.registry.config()?;
        if !config.is_installed(version) {
            return Err(SwiftlyError::not_installed(version.name()).into());
        }

        let was_in_use = config.in_use.as_ref() == Some(version);
        if was_in_use {
            self.activator().unuse(version)?;
        }

        self.platform.uninstall(version, verbose).await?;
        self.registry.remove(version)?;
        log::info!("uninstalled {version}");
        Ok(UninstallOutcome { was_in_use })
    }
}

fn transition(version: &ToolchainVersion, from: InstallStage, to: InstallStage) -> InstallStage {
    log::debug!("{version}: {from} -> {to}");
    to
}

fn failed(version: &ToolchainVersion, stage: InstallStage, error: &anyhow::Error) {
    log::debug!("{version}: failed while {stage}: {error:#}");
}
