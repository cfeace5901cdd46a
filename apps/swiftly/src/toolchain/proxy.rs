//! Proxy invocations.
//!
//! When swiftly runs under the name of a toolchain executable (`swift`,
//! `clang`, ...) it picks a toolchain and replaces itself with that
//! toolchain's executable of the same name. The toolchain is chosen from, in
//! order:
//!
//! 1. a `+<selector>` argument (`swift +5.9 build`)
//! 2. the nearest `.swift-version` file in the working directory or its parents
//! 3. the in-use toolchain
//!
//! A selector that matches nothing installed triggers an install first.
//!
//! `swiftly init` links every proxied name to the swiftly executable in the
//! proxy directory (see [`SwiftlyPaths::proxy_dir`]), which sits ahead of the
//! shared bin directory on `PATH`.

use crate::errors::SwiftlyError;
use crate::toolchain::activation::{Confirm, create_link, remove_entry};
use crate::toolchain::install::{InstallOptions, ToolchainManager};
use crate::toolchain::paths::SwiftlyPaths;
use crate::toolchain::version::{ToolchainSelector, ToolchainVersion};
use anyhow::{Context, Result, bail};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Executables swiftly answers for when invoked under their name.
pub const PROXY_LIST: [&str; 15] = [
    "clang",
    "lldb",
    "lldb-dap",
    "lldb-server",
    "clang++",
    "sourcekit-lsp",
    "clangd",
    "swift",
    "docc",
    "swiftc",
    "lld",
    "llvm-ar",
    "plutil",
    "repl_swift",
    "wasm-ld",
];

/// Per-project toolchain pin.
pub const SWIFT_VERSION_FILE: &str = ".swift-version";

/// Returns the proxied executable name if `argv0` names one.
#[must_use]
pub fn proxied_name(argv0: &OsStr) -> Option<&'static str> {
    let name = Path::new(argv0).file_name()?.to_str()?;
    PROXY_LIST.iter().copied().find(|p| *p == name)
}

/// Links every [`PROXY_LIST`] name in the proxy directory to `executable`.
///
/// Links already pointing at `executable` are kept. Anything else under a
/// proxied name is replaced, since the proxy directory belongs to swiftly.
/// Returns the number of links created.
///
/// # Errors
///
/// Returns an error if the directory or a link cannot be created.
pub fn install_aliases(paths: &SwiftlyPaths, executable: &Path) -> Result<usize> {
    let dir = paths.proxy_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let mut created = 0;
    for name in PROXY_LIST {
        let entry = dir.join(name);
        if std::fs::read_link(&entry).is_ok_and(|target| target == executable) {
            continue;
        }
        remove_entry(&entry)?;
        create_link(executable, &entry)?;
        created += 1;
    }
    log::info!(
        "{created} proxy alias(es) created in {} for {}",
        dir.display(),
        executable.display()
    );
    Ok(created)
}

/// Proxied names without a link in the proxy directory.
#[must_use]
pub fn missing_aliases(paths: &SwiftlyPaths) -> Vec<&'static str> {
    let dir = paths.proxy_dir();
    PROXY_LIST
        .iter()
        .copied()
        .filter(|name| std::fs::read_link(dir.join(name)).is_err())
        .collect()
}

/// Proxy arguments split into the selector override and the pass-through rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyArgs {
    pub selector: Option<String>,
    pub args: Vec<OsString>,
}

impl ProxyArgs {
    /// Pulls `+<selector>` tokens out of `args` (without `argv[0]`).
    ///
    /// # Errors
    ///
    /// Returns an error if more than one selector token is present.
    pub fn parse(args: impl IntoIterator<Item = OsString>) -> Result<Self> {
        let mut selectors = Vec::new();
        let mut rest = Vec::new();
        for arg in args {
            match arg.to_str().and_then(|s| s.strip_prefix('+')) {
                Some(selector) => selectors.push(selector.to_string()),
                None => rest.push(arg),
            }
        }
        if selectors.len() > 1 {
            bail!("More than one toolchain selector specified");
        }
        Ok(Self {
            selector: selectors.pop(),
            args: rest,
        })
    }
}

/// Where the toolchain of an invocation came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSource {
    Argument,
    VersionFile(PathBuf),
    InUse,
}

/// Finds the nearest non-empty `.swift-version` at or above `start`.
///
/// Returns the file and its contents with line endings removed.
#[must_use]
pub fn find_swift_version_file(start: &Path) -> Option<(PathBuf, String)> {
    for dir in start.ancestors() {
        let candidate = dir.join(SWIFT_VERSION_FILE);
        let Ok(contents) = std::fs::read_to_string(&candidate) else {
            continue;
        };
        let selection = contents.replace(['\n', '\r'], "");
        if !selection.trim().is_empty() {
            return Some((candidate, selection.trim().to_string()));
        }
    }
    None
}

/// Picks the toolchain for a proxy invocation, installing it if needed.
///
/// # Errors
///
/// - `ParseError` for an invalid selector
/// - an error naming the post-install script when system packages are
///   missing after an install
/// - an error if no toolchain can be determined at all
/// - any install error
pub async fn select_toolchain(
    manager: &ToolchainManager,
    selector: Option<&str>,
    cwd: &Path,
    platform_override: Option<&str>,
    confirm: &Confirm,
) -> Result<(ToolchainVersion, SelectionSource)> {
    if let Some(selector) = selector {
        let version = find_or_install(manager, selector, platform_override, confirm).await?;
        return Ok((version, SelectionSource::Argument));
    }
    if let Some((file, selector)) = find_swift_version_file(cwd) {
        let version = find_or_install(manager, &selector, platform_override, confirm)
            .await
            .with_context(|| format!("Failed to select the toolchain named in {}", file.display()))?;
        return Ok((version, SelectionSource::VersionFile(file)));
    }
    if let Some(version) = manager.registry().in_use()? {
        return Ok((version, SelectionSource::InUse));
    }
    bail!(
        "No swift toolchain could be determined either through a toolchain selector \
         (e.g. +5.7.2, +latest), .swift-version file, or default."
    )
}

async fn find_or_install(
    manager: &ToolchainManager,
    selector: &str,
    platform_override: Option<&str>,
    confirm: &Confirm,
) -> Result<ToolchainVersion> {
    let selector: ToolchainSelector = selector.parse()?;
    if let Some(version) = manager.registry().resolve_best(&selector)? {
        return Ok(version);
    }

    log::info!("no installed toolchain matches {selector}, installing it");
    let platform = manager.ensure_platform(platform_override).await?;
    let options = InstallOptions {
        verify_signature: true,
        ..InstallOptions::default()
    };
    let outcome = manager
        .install(&selector, &platform, &options, confirm)
        .await?;

    if let Some(script) = outcome.post_install {
        bail!(
            "There are some system dependencies that should be installed before using this toolchain.\n\
             You can run the following script as the system administrator (e.g. root) to prepare\n\
             your system and try again:\n\n{script}"
        );
    }

    manager
        .registry()
        .resolve_best(&selector)?
        .with_context(|| format!("Toolchain was not installed: {selector}"))
}

/// Replaces the current process with `name` from the toolchain of `version`.
///
/// Only returns on failure. Where processes cannot be replaced the
/// executable runs as a child and its exit status is propagated as
/// `ProcessExitCode`.
///
/// # Errors
///
/// Returns an error if the executable is missing or cannot be started.
pub fn exec_toolchain_binary(
    manager: &ToolchainManager,
    version: &ToolchainVersion,
    name: &str,
    args: &[OsString],
) -> Result<()> {
    let binary = manager.platform().toolchain_bin_dir(version).join(name);
    if !binary.is_file() {
        bail!(
            "{name} is not part of toolchain {version} (looked for {})",
            binary.display()
        );
    }
    log::debug!("exec {} {args:?}", binary.display());
    exec(&binary, args)
}

#[cfg(unix)]
fn exec(binary: &Path, args: &[OsString]) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let error = std::process::Command::new(binary).args(args).exec();
    Err(error).with_context(|| format!("Failed to execute {}", binary.display()))
}

#[cfg(not(unix))]
fn exec(binary: &Path, args: &[OsString]) -> Result<()> {
    let status = std::process::Command::new(binary)
        .args(args)
        .status()
        .with_context(|| format!("Failed to execute {}", binary.display()))?;
    match status.code() {
        Some(0) => Ok(()),
        code => Err(SwiftlyError::process_exit_code(code.unwrap_or(1)).into()),
    }
}

/// Maps a selector to the installed toolchain it resolves to, without
/// installing anything.
///
/// # Errors
///
/// Returns `ParseError` for an invalid selector, or `NotInstalled` if
/// nothing installed matches.
pub fn resolve_installed(manager: &ToolchainManager, selector: &str) -> Result<ToolchainVersion> {
    let parsed: ToolchainSelector = selector.parse()?;
    manager
        .registry()
        .resolve_best(&parsed)?
        .ok_or_else(|| SwiftlyError::not_installed(parsed.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::catalog::CatalogClient;
    use crate::toolchain::config::ConfigStore;
    use crate::toolchain::http::HttpClient;
    use crate::toolchain::http::testing::MockHttp;
    use crate::toolchain::platform::LinuxPlatform;
    use crate::toolchain::registry::Registry;
    use std::sync::Arc;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    fn manager(home: &Path, mock: Arc<MockHttp>) -> ToolchainManager {
        let paths = SwiftlyPaths::with_home(home.to_path_buf());
        let registry = Registry::new(ConfigStore::new(&paths));
        let platform = Arc::new(LinuxPlatform::new(
            paths.toolchains_dir.clone(),
            "unreachable://keys".to_string(),
        ));
        let catalog = CatalogClient::new(
            HttpClient::new(mock),
            "unreachable://catalog",
            "unreachable://downloads",
        );
        ToolchainManager::new(platform, paths, registry, catalog)
    }

    fn yes(_: &str) -> Result<bool> {
        Ok(true)
    }

    #[test]
    fn proxied_names_come_from_the_basename() {
        assert_eq!(proxied_name(OsStr::new("/home/me/bin/swift")), Some("swift"));
        assert_eq!(proxied_name(OsStr::new("clang++")), Some("clang++"));
        assert_eq!(proxied_name(OsStr::new("/usr/bin/swiftly")), None);
        assert_eq!(proxied_name(OsStr::new("swift-build")), None);
    }

    #[test]
    fn selector_tokens_are_split_out() {
        let parsed = ProxyArgs::parse(os(&["build", "+5.9", "-c", "release"])).unwrap();
        assert_eq!(parsed.selector.as_deref(), Some("5.9"));
        assert_eq!(parsed.args, os(&["build", "-c", "release"]));

        let plain = ProxyArgs::parse(os(&["--version"])).unwrap();
        assert_eq!(plain.selector, None);
    }

    #[test]
    fn two_selector_tokens_are_rejected() {
        let err = ProxyArgs::parse(os(&["+5.9", "+main-snapshot"])).unwrap_err();
        assert!(err.to_string().contains("More than one toolchain selector"));
    }

    #[test]
    fn version_file_is_found_in_ancestors() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join(SWIFT_VERSION_FILE), "5.9.2\r\n").unwrap();

        let (file, selection) = find_swift_version_file(&nested).unwrap();
        assert_eq!(file, temp.path().join(SWIFT_VERSION_FILE));
        assert_eq!(selection, "5.9.2");
    }

    #[test]
    fn empty_version_file_is_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let nested = temp.path().join("project");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join(SWIFT_VERSION_FILE), "\n").unwrap();
        std::fs::write(temp.path().join(SWIFT_VERSION_FILE), "main-snapshot").unwrap();

        let (_, selection) = find_swift_version_file(&nested).unwrap();
        assert_eq!(selection, "main-snapshot");
    }

    #[tokio::test]
    async fn argument_beats_version_file_beats_in_use() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(&temp.path().join("home"), Arc::new(MockHttp::new()));
        for v in ["5.9.2", "5.10.1"] {
            manager.registry().add(&v.parse().unwrap()).unwrap();
        }
        manager
            .registry()
            .set_in_use(&"5.10.1".parse().unwrap())
            .unwrap();
        let project = temp.path().join("project");
        std::fs::create_dir_all(&project).unwrap();

        let (version, source) = select_toolchain(&manager, None, &project, None, &yes)
            .await
            .unwrap();
        assert_eq!(version.name(), "5.10.1");
        assert_eq!(source, SelectionSource::InUse);

        std::fs::write(project.join(SWIFT_VERSION_FILE), "5.9\n").unwrap();
        let (version, source) = select_toolchain(&manager, None, &project, None, &yes)
            .await
            .unwrap();
        assert_eq!(version.name(), "5.9.2");
        assert!(matches!(source, SelectionSource::VersionFile(_)));

        let (version, source) = select_toolchain(&manager, Some("5.10"), &project, None, &yes)
            .await
            .unwrap();
        assert_eq!(version.name(), "5.10.1");
        assert_eq!(source, SelectionSource::Argument);
    }

    #[tokio::test]
    async fn nothing_selected_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(&temp.path().join("home"), Arc::new(MockHttp::new()));

        let err = select_toolchain(&manager, None, temp.path(), None, &yes)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No swift toolchain could be determined"));
    }

    #[tokio::test]
    async fn missing_toolchain_triggers_install() {
        let temp = tempfile::tempdir().unwrap();
        let mock = Arc::new(MockHttp::new());
        let manager = manager(&temp.path().join("home"), mock.clone());

        let err = select_toolchain(&manager, Some("5.9"), temp.path(), Some("ubuntu2204"), &yes)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SwiftlyError>(),
            Some(SwiftlyError::CatalogUnavailable { .. })
        ));
        assert!(
            mock.requests()
                .iter()
                .any(|url| url.ends_with("/api/v1/install/releases.json"))
        );
    }

    #[cfg(unix)]
    #[test]
    fn aliases_link_every_proxied_name_to_the_executable() {
        let temp = tempfile::tempdir().unwrap();
        let paths = SwiftlyPaths::with_home(temp.path().join("home"));
        let exe = temp.path().join("swiftly");
        std::fs::write(&exe, b"#!/bin/sh\n").unwrap();
        assert_eq!(missing_aliases(&paths).len(), PROXY_LIST.len());

        assert_eq!(install_aliases(&paths, &exe).unwrap(), PROXY_LIST.len());
        for name in PROXY_LIST {
            assert_eq!(std::fs::read_link(paths.proxy_dir().join(name)).unwrap(), exe);
        }
        assert!(missing_aliases(&paths).is_empty());

        // A rerun keeps good links and repairs the rest.
        let clang = paths.proxy_dir().join("clang");
        std::fs::remove_file(&clang).unwrap();
        std::fs::write(&clang, b"stale").unwrap();
        assert_eq!(install_aliases(&paths, &exe).unwrap(), 1);
        assert_eq!(std::fs::read_link(&clang).unwrap(), exe);
    }

    #[test]
    fn resolve_installed_reports_not_installed() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(temp.path(), Arc::new(MockHttp::new()));
        let err = resolve_installed(&manager, "5.9").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SwiftlyError>(),
            Some(SwiftlyError::NotInstalled { .. })
        ));
    }
}
