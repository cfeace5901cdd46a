//! macOS implementation of [`Platform`].
//!
//! Toolchains ship as signed `.pkg` files and live in
//! `<toolchains_dir>/<identifier>.xctoolchain`. When the toolchains dir is the
//! system default (`~/Library/Developer/Toolchains`) the package goes through
//! `installer`; any other location is populated by expanding the package and
//! untarring its payload, since `installer` only targets volumes and the
//! user's home.

use crate::errors::SwiftlyError;
use crate::toolchain::command::{Dscl, Installer, PlistBuddy, Pkgutil, Tar, shell_from_dscl};
use crate::toolchain::http::HttpClient;
use crate::toolchain::platform::{
    Platform, PlatformDefinition, StagedInstall, shell_from_env,
};
use crate::toolchain::version::ToolchainVersion;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// macOS toolchain installation.
#[derive(Debug, Clone)]
pub struct MacOsPlatform {
    toolchains_dir: PathBuf,
    use_installer: bool,
}

impl MacOsPlatform {
    /// Creates the platform. `use_installer` selects the native installer
    /// route and must only be set for the system toolchains dir.
    #[must_use]
    pub fn new(toolchains_dir: PathBuf, use_installer: bool) -> Self {
        Self {
            toolchains_dir,
            use_installer,
        }
    }

    async fn expand_into(
        &self,
        pkg: &Path,
        version: &ToolchainVersion,
        verbose: bool,
    ) -> Result<()> {
        let scratch = tempfile::tempdir().context("Failed to create temporary directory")?;
        let expanded = scratch.path().join("expanded");
        Pkgutil::expand(pkg, &expanded)
            .quiet(!verbose)
            .run()
            .await
            .with_context(|| format!("Failed to expand {}", pkg.display()))?;

        let payload = payload_path(&expanded, version)
            .with_context(|| format!("No Payload found in {}", pkg.display()))?;

        let staged = StagedInstall::new(&self.toolchains_dir, self.toolchain_dir(version))?;
        let content = staged.content_dir();
        std::fs::create_dir_all(&content)
            .with_context(|| format!("Failed to create directory: {}", content.display()))?;
        Tar::extract(&payload, &content)
            .quiet(!verbose)
            .run()
            .await
            .with_context(|| format!("Failed to extract {}", payload.display()))?;
        staged.commit()
    }
}

/// Locates the payload of an expanded package.
///
/// Official packages keep it at the top level; single-component packages
/// nest it under `<identifier>-osx-package.pkg/`.
fn payload_path(expanded: &Path, version: &ToolchainVersion) -> Option<PathBuf> {
    [
        expanded.join("Payload"),
        expanded
            .join(format!("{}-osx-package.pkg", version.identifier()))
            .join("Payload"),
    ]
    .into_iter()
    .find(|p| p.exists())
}

#[async_trait]
impl Platform for MacOsPlatform {
    fn name(&self) -> &'static str {
        "macOS"
    }

    fn toolchains_dir(&self) -> &Path {
        &self.toolchains_dir
    }

    fn toolchain_dir(&self, version: &ToolchainVersion) -> PathBuf {
        self.toolchains_dir
            .join(format!("{}.xctoolchain", version.identifier()))
    }

    fn archive_extension(&self) -> &'static str {
        "pkg"
    }

    async fn detect_platform(&self, override_spec: Option<&str>) -> Result<PlatformDefinition> {
        if let Some(spec) = override_spec {
            let definition = PlatformDefinition::from_override(spec)?;
            if !definition.is_macos() {
                bail!("Only xcode toolchains can be installed on macOS, not {spec}");
            }
        }
        Ok(PlatformDefinition::macos())
    }

    async fn post_install_instructions(
        &self,
        _platform: &PlatformDefinition,
        _version: &ToolchainVersion,
    ) -> Result<Option<String>> {
        Ok(None)
    }

    async fn verify_signature(
        &self,
        _http: &HttpClient,
        _archive_url: &str,
        archive: &Path,
    ) -> Result<()> {
        Pkgutil::check_signature(archive)
            .quiet(true)
            .run()
            .await
            .map_err(|e| {
                SwiftlyError::signature_verification_failed(format!(
                    "pkgutil rejected {}: {e:#}",
                    archive.display()
                ))
            })?;
        Ok(())
    }

    async fn install(&self, archive: &Path, version: &ToolchainVersion, verbose: bool) -> Result<()> {
        if !archive.exists() {
            bail!("{} doesn't exist", archive.display());
        }
        if self.use_installer {
            std::fs::create_dir_all(&self.toolchains_dir).with_context(|| {
                format!("Failed to create directory: {}", self.toolchains_dir.display())
            })?;
            Installer::install_for_user(archive, verbose)
                .run()
                .await
                .with_context(|| format!("Failed to install {}", archive.display()))
        } else {
            self.expand_into(archive, version, verbose).await
        }
    }

    async fn uninstall(&self, version: &ToolchainVersion, _verbose: bool) -> Result<()> {
        let dir = self.toolchain_dir(version);
        if dir.symlink_metadata().is_err() {
            log::warn!("{} is already gone", dir.display());
            return Ok(());
        }

        let package_id = match PlistBuddy::print(&dir.join("Info.plist"), "CFBundleIdentifier")
            .output()
            .await
        {
            Ok(id) => Some(id.trim().to_string()).filter(|id| !id.is_empty()),
            Err(e) => {
                log::warn!("cannot read the package id of {version}: {e:#}");
                None
            }
        };

        tokio::fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to remove {}", dir.display()))?;

        if let (Some(id), Some(home)) = (package_id, dirs::home_dir())
            && let Err(e) = Pkgutil::forget(&home, &id).quiet(true).run().await
        {
            log::warn!("pkgutil could not forget package {id}: {e:#}");
        }
        Ok(())
    }

    async fn get_shell(&self) -> Result<String> {
        if let Some(home) = dirs::home_dir() {
            match Dscl::read_user_shell(&home).output().await {
                Ok(output) => {
                    if let Some(shell) = shell_from_dscl(&output) {
                        return Ok(shell);
                    }
                }
                Err(e) => log::debug!("dscl lookup failed: {e:#}"),
            }
        }
        Ok(shell_from_env().unwrap_or_else(|| "/bin/zsh".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ToolchainVersion {
        s.parse().unwrap()
    }

    #[test]
    fn toolchain_dir_is_xctoolchain_bundle() {
        let platform = MacOsPlatform::new(PathBuf::from("/Users/me/Library/Developer/Toolchains"), true);
        assert_eq!(
            platform.toolchain_bin_dir(&v("5.9.2")),
            PathBuf::from(
                "/Users/me/Library/Developer/Toolchains/swift-5.9.2-RELEASE.xctoolchain/usr/bin"
            )
        );
        assert_eq!(platform.archive_extension(), "pkg");
    }

    #[test]
    fn payload_found_at_top_level_or_nested() {
        let temp = tempfile::tempdir().unwrap();
        let version = v("5.9.2");
        assert!(payload_path(temp.path(), &version).is_none());

        let nested = temp.path().join("swift-5.9.2-RELEASE-osx-package.pkg");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Payload"), b"x").unwrap();
        assert_eq!(
            payload_path(temp.path(), &version),
            Some(nested.join("Payload"))
        );

        std::fs::write(temp.path().join("Payload"), b"x").unwrap();
        assert_eq!(
            payload_path(temp.path(), &version),
            Some(temp.path().join("Payload"))
        );
    }

    #[tokio::test]
    async fn detects_xcode_and_rejects_linux_override() {
        let platform = MacOsPlatform::new(PathBuf::from("/tmp"), false);
        assert!(platform.detect_platform(None).await.unwrap().is_macos());
        assert!(platform.detect_platform(Some("ubuntu2204")).await.is_err());
    }

    #[tokio::test]
    async fn uninstall_of_missing_toolchain_is_quiet() {
        let temp = tempfile::tempdir().unwrap();
        let platform = MacOsPlatform::new(temp.path().to_path_buf(), false);
        assert!(platform.uninstall(&v("5.9.2"), false).await.is_ok());
    }
}
