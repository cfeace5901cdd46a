//! Linux implementation of [`Platform`].
//!
//! Toolchains are `.tar.gz` archives extracted into
//! `<toolchains_dir>/<identifier>`. Signatures are checked with `gpg` against
//! the published swift.org keys, and missing system packages are reported as
//! an `apt-get`/`yum` script for the user to run.

use crate::errors::SwiftlyError;
use crate::toolchain::archive::extract_tar_gz;
use crate::toolchain::command::{DpkgQuery, Getent, Gpg, Rpm, SystemCommand, shell_from_passwd};
use crate::toolchain::http::HttpClient;
use crate::toolchain::platform::{
    Platform, PlatformDefinition, SWIFTLY_PLATFORM_ENV, StagedInstall, current_architecture,
    shell_from_env,
};
use crate::toolchain::version::ToolchainVersion;
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const OS_RELEASE_PATHS: [&str; 2] = ["/etc/os-release", "/usr/lib/os-release"];

/// Linux toolchain installation.
#[derive(Debug, Clone)]
pub struct LinuxPlatform {
    toolchains_dir: PathBuf,
    keys_url: String,
}

impl LinuxPlatform {
    /// Creates the platform. `keys_url` serves the armored swift.org key bundle.
    #[must_use]
    pub fn new(toolchains_dir: PathBuf, keys_url: String) -> Self {
        Self {
            toolchains_dir,
            keys_url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PackageManager {
    Apt,
    Yum,
}

impl PackageManager {
    fn query(self, package: &str) -> SystemCommand {
        match self {
            Self::Apt => DpkgQuery::installed(package),
            Self::Yum => Rpm::installed(package),
        }
    }

    fn install_script(self, packages: &[&str]) -> String {
        let list = packages.join(" ");
        match self {
            Self::Apt => format!("#!/bin/sh\napt-get update -q\napt-get -y install {list}\n"),
            Self::Yum => format!("#!/bin/sh\nyum install -y {list}\n"),
        }
    }
}

const UBUNTU_COMMON: [&str; 14] = [
    "binutils",
    "git",
    "gnupg2",
    "libc6-dev",
    "libcurl4-openssl-dev",
    "libedit2",
    "libpython3-dev",
    "libsqlite3-0",
    "libxml2-dev",
    "libz3-dev",
    "pkg-config",
    "tzdata",
    "unzip",
    "zlib1g-dev",
];

const RPM_COMMON: [&str; 12] = [
    "binutils",
    "gcc",
    "git",
    "glibc-static",
    "libcurl-devel",
    "libedit",
    "libicu",
    "libstdc++-static",
    "libuuid-devel",
    "libxml2-devel",
    "tar",
    "zlib-devel",
];

/// System packages a toolchain needs on `platform_name`, if the distribution is known.
fn system_dependencies(platform_name: &str) -> Option<(PackageManager, Vec<&'static str>)> {
    let gcc_dev: &[&str] = match platform_name {
        "ubuntu1804" => &["libgcc-5-dev", "libstdc++-5-dev"],
        "ubuntu2004" => &["libgcc-9-dev", "libstdc++-9-dev"],
        "ubuntu2204" => &["libgcc-11-dev", "libstdc++-11-dev"],
        "ubuntu2404" => &["libgcc-13-dev", "libstdc++-13-dev"],
        "debian12" => &["libgcc-12-dev", "libstdc++-12-dev"],
        "amazonlinux2" | "ubi9" | "fedora39" => {
            return Some((PackageManager::Yum, RPM_COMMON.to_vec()));
        }
        _ => return None,
    };
    let mut packages = UBUNTU_COMMON.to_vec();
    packages.extend_from_slice(gcc_dev);
    Some((PackageManager::Apt, packages))
}

/// Maps `/etc/os-release` contents to a platform definition.
///
/// # Errors
///
/// Returns an error for distributions without published toolchains.
pub fn parse_os_release(content: &str) -> Result<PlatformDefinition> {
    let fields: HashMap<&str, &str> = content
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim(), v.trim().trim_matches('"').trim_matches('\'')))
        .collect();

    let id = fields.get("ID").copied().unwrap_or_default();
    let id_like = fields.get("ID_LIKE").copied().unwrap_or_default();
    let version = fields.get("VERSION_ID").copied().unwrap_or_default();
    let major = version.split('.').next().unwrap_or_default();

    let name = match (id, version) {
        ("ubuntu", "18.04" | "20.04" | "22.04" | "24.04") => {
            Some(format!("ubuntu{}", version.replace('.', "")))
        }
        ("amzn", "2") => Some("amazonlinux2".to_string()),
        ("debian", "12") => Some("debian12".to_string()),
        ("fedora", "39") => Some("fedora39".to_string()),
        _ if major == "9"
            && (id == "rhel" || id_like.split_whitespace().any(|like| like == "rhel")) =>
        {
            Some("ubi9".to_string())
        }
        _ => None,
    };

    if let Some(definition) = name.as_deref().and_then(PlatformDefinition::linux) {
        return Ok(definition);
    }

    let pretty = fields
        .get("PRETTY_NAME")
        .copied()
        .filter(|p| !p.is_empty())
        .unwrap_or("this Linux distribution");
    bail!(
        "{pretty} is not a supported platform for Swift toolchains. \
         Set {SWIFTLY_PLATFORM_ENV} to the closest supported platform \
         (for example {SWIFTLY_PLATFORM_ENV}=ubuntu2204) to install anyway."
    )
}

#[async_trait]
impl Platform for LinuxPlatform {
    fn name(&self) -> &'static str {
        "Linux"
    }

    fn toolchains_dir(&self) -> &Path {
        &self.toolchains_dir
    }

    fn toolchain_dir(&self, version: &ToolchainVersion) -> PathBuf {
        self.toolchains_dir.join(version.identifier())
    }

    fn archive_extension(&self) -> &'static str {
        "tar.gz"
    }

    async fn detect_platform(&self, override_spec: Option<&str>) -> Result<PlatformDefinition> {
        if let Some(spec) = override_spec {
            return PlatformDefinition::from_override(spec);
        }
        for path in OS_RELEASE_PATHS {
            match tokio::fs::read_to_string(path).await {
                Ok(content) => {
                    let mut definition = parse_os_release(&content)?;
                    definition.architecture = current_architecture();
                    return Ok(definition);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to read {path}")),
            }
        }
        bail!(
            "Unable to detect the Linux distribution: no os-release file found. \
             Set {SWIFTLY_PLATFORM_ENV} to the platform to install for."
        )
    }

    async fn post_install_instructions(
        &self,
        platform: &PlatformDefinition,
        version: &ToolchainVersion,
    ) -> Result<Option<String>> {
        let Some((manager, packages)) = system_dependencies(&platform.name) else {
            log::debug!(
                "no dependency list for {}; skipping system package check",
                platform.name
            );
            return Ok(None);
        };

        let mut missing = Vec::new();
        for package in packages {
            match manager.query(package).succeeds().await {
                Ok(true) => {}
                Ok(false) => missing.push(package),
                Err(e) => {
                    log::warn!("cannot check system packages for {version}: {e:#}");
                    return Ok(None);
                }
            }
        }

        if missing.is_empty() {
            Ok(None)
        } else {
            Ok(Some(manager.install_script(&missing)))
        }
    }

    async fn verify_signature(
        &self,
        http: &HttpClient,
        archive_url: &str,
        archive: &Path,
    ) -> Result<()> {
        let scratch = tempfile::tempdir().context("Failed to create temporary directory")?;
        let keys = scratch.path().join("all-keys.asc");
        let signature = scratch.path().join("archive.sig");

        http.download_file(&self.keys_url, &keys, None)
            .await
            .context("Failed to download the swift.org signing keys")?;
        http.download_file(&format!("{archive_url}.sig"), &signature, None)
            .await
            .context("Failed to download the toolchain signature")?;

        Gpg::import(&keys).run().await.context(
            "Failed to import the swift.org signing keys; is gpg installed (package gnupg2)?",
        )?;
        Gpg::verify(&signature, archive).run().await.map_err(|e| {
            SwiftlyError::signature_verification_failed(format!(
                "gpg could not verify {}: {e:#}",
                archive.display()
            ))
        })?;

        log::debug!("signature of {} verified", archive.display());
        Ok(())
    }

    async fn install(
        &self,
        archive: &Path,
        version: &ToolchainVersion,
        _verbose: bool,
    ) -> Result<()> {
        let staged = StagedInstall::new(&self.toolchains_dir, self.toolchain_dir(version))?;
        let archive = archive.to_path_buf();
        let content = staged.content_dir();
        tokio::task::spawn_blocking(move || extract_tar_gz(&archive, &content))
            .await
            .context("Extraction task failed")??;
        staged.commit()
    }

    async fn uninstall(&self, version: &ToolchainVersion, _verbose: bool) -> Result<()> {
        let dir = self.toolchain_dir(version);
        if dir.symlink_metadata().is_err() {
            log::warn!("{} is already gone", dir.display());
            return Ok(());
        }
        tokio::fs::remove_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to remove {}", dir.display()))
    }

    async fn get_shell(&self) -> Result<String> {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("LOGNAME"))
            .ok()
            .filter(|u| !u.is_empty());
        if let Some(user) = user {
            match Getent::passwd(&user).output().await {
                Ok(line) => {
                    if let Some(shell) = shell_from_passwd(&line) {
                        return Ok(shell);
                    }
                }
                Err(e) => log::debug!("getent lookup failed: {e:#}"),
            }
        }
        Ok(shell_from_env().unwrap_or_else(|| "/bin/bash".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::archive::testing::toolchain_tar_gz;

    fn v(s: &str) -> ToolchainVersion {
        s.parse().unwrap()
    }

    #[test]
    fn detects_supported_distributions() {
        let cases = [
            ("ID=ubuntu\nVERSION_ID=\"22.04\"\n", "ubuntu2204"),
            ("ID=ubuntu\nVERSION_ID=\"24.04\"\n", "ubuntu2404"),
            ("ID=\"amzn\"\nVERSION_ID=\"2\"\n", "amazonlinux2"),
            ("ID=\"rhel\"\nVERSION_ID=\"9.3\"\n", "ubi9"),
            ("ID=\"rocky\"\nID_LIKE=\"rhel centos fedora\"\nVERSION_ID=\"9.2\"\n", "ubi9"),
            ("ID=debian\nVERSION_ID=\"12\"\n", "debian12"),
            ("ID=fedora\nVERSION_ID=39\n", "fedora39"),
        ];
        for (content, expected) in cases {
            assert_eq!(parse_os_release(content).unwrap().name, expected, "{content}");
        }
    }

    #[test]
    fn unsupported_distribution_suggests_override() {
        let err = parse_os_release("ID=arch\nPRETTY_NAME=\"Arch Linux\"\n").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Arch Linux"));
        assert!(message.contains(SWIFTLY_PLATFORM_ENV));
    }

    #[test]
    fn dependency_lists_pick_package_manager() {
        let (apt, packages) = system_dependencies("ubuntu2204").unwrap();
        assert_eq!(apt, PackageManager::Apt);
        assert!(packages.contains(&"libstdc++-11-dev"));

        let (yum, _) = system_dependencies("amazonlinux2").unwrap();
        assert_eq!(yum, PackageManager::Yum);

        assert!(system_dependencies("custom").is_none());
    }

    #[test]
    fn install_scripts_list_missing_packages() {
        assert_eq!(
            PackageManager::Apt.install_script(&["git", "unzip"]),
            "#!/bin/sh\napt-get update -q\napt-get -y install git unzip\n"
        );
        assert_eq!(
            PackageManager::Yum.install_script(&["gcc"]),
            "#!/bin/sh\nyum install -y gcc\n"
        );
    }

    #[test]
    fn toolchain_dir_uses_identifier() {
        let platform = LinuxPlatform::new(PathBuf::from("/opt/tc"), String::new());
        assert_eq!(
            platform.toolchain_dir(&v("5.9.2")),
            PathBuf::from("/opt/tc/swift-5.9.2-RELEASE")
        );
        assert_eq!(
            platform.toolchain_bin_dir(&v("main-snapshot-2024-01-01")),
            PathBuf::from("/opt/tc/swift-DEVELOPMENT-SNAPSHOT-2024-01-01-a/usr/bin")
        );
    }

    #[tokio::test]
    async fn override_skips_os_release() {
        let platform = LinuxPlatform::new(PathBuf::from("/opt/tc"), String::new());
        let def = platform.detect_platform(Some("fedora39")).await.unwrap();
        assert_eq!(def.name, "fedora39");
    }

    #[tokio::test]
    async fn unknown_platform_has_no_post_install_script() {
        let platform = LinuxPlatform::new(PathBuf::from("/opt/tc"), String::new());
        let def = PlatformDefinition::from_override("testlinux:testlinux1.0").unwrap();
        let script = platform
            .post_install_instructions(&def, &v("5.9.2"))
            .await
            .unwrap();
        assert!(script.is_none());
    }

    #[tokio::test]
    async fn install_then_uninstall() {
        let temp = tempfile::tempdir().unwrap();
        let toolchains = temp.path().join("toolchains");
        let archive = temp.path().join("swift.tar.gz");
        toolchain_tar_gz(&archive, "swift-5.9.2-RELEASE-ubuntu22.04", &["swift", "swiftc"]);
        let platform = LinuxPlatform::new(toolchains.clone(), String::new());
        let version = v("5.9.2");

        platform.install(&archive, &version, false).await.unwrap();
        assert!(platform.toolchain_bin_dir(&version).join("swiftc").is_file());

        platform.uninstall(&version, false).await.unwrap();
        assert!(!platform.toolchain_dir(&version).exists());
        assert_eq!(std::fs::read_dir(&toolchains).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_extraction_leaves_no_toolchain_dir() {
        let temp = tempfile::tempdir().unwrap();
        let toolchains = temp.path().join("toolchains");
        let archive = temp.path().join("broken.tar.gz");
        std::fs::write(&archive, b"not an archive").unwrap();
        let platform = LinuxPlatform::new(toolchains.clone(), String::new());

        assert!(platform.install(&archive, &v("5.9.2"), false).await.is_err());
        assert_eq!(std::fs::read_dir(&toolchains).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn failed_reinstall_keeps_the_existing_toolchain() {
        let temp = tempfile::tempdir().unwrap();
        let toolchains = temp.path().join("toolchains");
        let good = temp.path().join("swift.tar.gz");
        toolchain_tar_gz(&good, "swift-5.9.2-RELEASE-ubuntu22.04", &["swift"]);
        let broken = temp.path().join("broken.tar.gz");
        std::fs::write(&broken, b"not an archive").unwrap();
        let platform = LinuxPlatform::new(toolchains.clone(), String::new());
        let version = v("5.9.2");
        platform.install(&good, &version, false).await.unwrap();

        assert!(platform.install(&broken, &version, false).await.is_err());
        assert!(platform.toolchain_bin_dir(&version).join("swift").is_file());
        assert_eq!(std::fs::read_dir(&toolchains).unwrap().count(), 1);
    }
}
