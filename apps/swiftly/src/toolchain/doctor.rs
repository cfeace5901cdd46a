//! Health checks for `swiftly doctor`.
//!
//! ## Checks Performed
//!
//! - `config.json` is readable
//! - a platform is recorded
//! - every registered toolchain is present on disk
//! - the in-use toolchain is registered and its links are intact
//! - the proxy aliases are linked
//! - the proxy and shared bin directories are on `PATH`, proxies first
//! - no other executable on `PATH` shadows a proxied one

use crate::toolchain::config::Config;
use crate::toolchain::install::ToolchainManager;
use crate::toolchain::paths::SwiftlyPaths;
use crate::toolchain::proxy::missing_aliases;
use std::ffi::OsStr;
use std::path::Path;

/// Status of a doctor check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorCheckStatus {
    Ok,
    Warning,
    Error,
}

/// Result of a single doctor check.
#[derive(Debug, Clone)]
pub struct DoctorCheck {
    pub name: String,
    pub status: DoctorCheckStatus,
    pub message: String,
}

impl DoctorCheck {
    #[must_use]
    pub fn ok(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: DoctorCheckStatus::Ok,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn warning(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: DoctorCheckStatus::Warning,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: DoctorCheckStatus::Error,
            message: message.into(),
        }
    }

    /// Returns the CLI prefix for this check status.
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self.status {
            DoctorCheckStatus::Ok => "[OK]",
            DoctorCheckStatus::Warning => "[WARN]",
            DoctorCheckStatus::Error => "[FAIL]",
        }
    }
}

/// Runs every check against `manager`'s installation and the given `PATH`.
#[must_use]
pub fn run_all_checks(manager: &ToolchainManager, path_var: Option<&OsStr>) -> Vec<DoctorCheck> {
    let config = match manager.registry().config() {
        Ok(config) => config,
        Err(e) => {
            return vec![DoctorCheck::error(
                "Configuration",
                format!("Cannot read {}: {e:#}", manager.paths().config_file().display()),
            )];
        }
    };

    let mut checks = vec![
        DoctorCheck::ok(
            "Configuration",
            format!("Read {}", manager.paths().config_file().display()),
        ),
        check_platform(&config),
        check_installed_on_disk(manager, &config),
        check_in_use(manager, &config),
        check_aliases(manager.paths()),
        check_path(manager.paths(), path_var),
    ];
    checks.extend(check_shadowing(manager.paths(), path_var));
    checks
}

fn check_platform(config: &Config) -> DoctorCheck {
    match &config.platform {
        Some(platform) => DoctorCheck::ok(
            "Platform",
            format!(
                "{} ({}){}",
                platform.name_pretty,
                platform.name,
                platform
                    .architecture
                    .as_deref()
                    .map(|a| format!(", {a}"))
                    .unwrap_or_default()
            ),
        ),
        None => DoctorCheck::warning(
            "Platform",
            "No platform recorded yet. Run 'swiftly init'.",
        ),
    }
}

fn check_installed_on_disk(manager: &ToolchainManager, config: &Config) -> DoctorCheck {
    let missing: Vec<String> = config
        .installed_toolchains
        .iter()
        .filter(|v| !manager.platform().toolchain_dir(v).is_dir())
        .map(ToString::to_string)
        .collect();

    if missing.is_empty() {
        DoctorCheck::ok(
            "Installed toolchains",
            format!("{} installed", config.installed_toolchains.len()),
        )
    } else {
        DoctorCheck::error(
            "Installed toolchains",
            format!(
                "Registered but missing from {}: {}. Run 'swiftly uninstall' on them and install again.",
                manager.platform().toolchains_dir().display(),
                missing.join(", ")
            ),
        )
    }
}

fn check_in_use(manager: &ToolchainManager, config: &Config) -> DoctorCheck {
    let Some(version) = &config.in_use else {
        return if config.installed_toolchains.is_empty() {
            DoctorCheck::warning("In-use toolchain", "None. Run 'swiftly install' first.")
        } else {
            DoctorCheck::warning(
                "In-use toolchain",
                "None. Run 'swiftly use <version>' to select one.",
            )
        };
    };

    if !manager.platform().toolchain_bin_dir(version).is_dir() {
        return DoctorCheck::error(
            "In-use toolchain",
            format!("{version} is missing from disk"),
        );
    }

    match manager.activator().stale_links(version) {
        Ok(stale) if stale.is_empty() => DoctorCheck::ok("In-use toolchain", version.to_string()),
        Ok(stale) => DoctorCheck::warning(
            "In-use toolchain",
            format!(
                "{version}, but {} link(s) in {} are missing or point elsewhere. Run 'swiftly use {version}' to repair.",
                stale.len(),
                manager.paths().bin_dir.display()
            ),
        ),
        Err(e) => DoctorCheck::error("In-use toolchain", format!("Cannot check links: {e:#}")),
    }
}

fn check_aliases(paths: &SwiftlyPaths) -> DoctorCheck {
    let missing = missing_aliases(paths);
    if missing.is_empty() {
        DoctorCheck::ok(
            "Proxies",
            format!("Linked in {}", paths.proxy_dir().display()),
        )
    } else {
        DoctorCheck::warning(
            "Proxies",
            format!(
                "Missing from {}: {}. Run 'swiftly init'.",
                paths.proxy_dir().display(),
                missing.join(", ")
            ),
        )
    }
}

fn check_path(paths: &SwiftlyPaths, path_var: Option<&OsStr>) -> DoctorCheck {
    let position = |dir: &Path| {
        path_var.and_then(|path| std::env::split_paths(path).position(|entry| entry == dir))
    };
    let proxy_dir = paths.proxy_dir();

    match (position(&proxy_dir), position(&paths.bin_dir)) {
        (_, None) => DoctorCheck::warning(
            "PATH",
            format!(
                "{} is not on PATH. Run 'swiftly init' or add it yourself.",
                paths.bin_dir.display()
            ),
        ),
        (Some(proxies), Some(bin)) if proxies < bin => DoctorCheck::ok(
            "PATH",
            format!(
                "{} and {} are on PATH",
                proxy_dir.display(),
                paths.bin_dir.display()
            ),
        ),
        (Some(_), Some(_)) => DoctorCheck::warning(
            "PATH",
            format!(
                "{} must come before {} on PATH",
                proxy_dir.display(),
                paths.bin_dir.display()
            ),
        ),
        (None, Some(_)) => DoctorCheck::warning(
            "PATH",
            format!(
                "{} is not on PATH, so '+<selector>' arguments and .swift-version files are ignored",
                proxy_dir.display()
            ),
        ),
    }
}

/// Warns about executables found on `PATH` ahead of their proxy alias or
/// shared bin link.
fn check_shadowing(paths: &SwiftlyPaths, path_var: Option<&OsStr>) -> Vec<DoctorCheck> {
    let bin_dir = &paths.bin_dir;
    let (Some(path_var), Ok(entries)) = (path_var, std::fs::read_dir(bin_dir)) else {
        return Vec::new();
    };
    let Ok(cwd) = std::env::current_dir() else {
        return Vec::new();
    };

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    names
        .into_iter()
        .filter_map(|name| {
            let alias = paths.proxy_dir().join(&name);
            let expected = if alias.symlink_metadata().is_ok() {
                alias
            } else {
                bin_dir.join(&name)
            };
            let found = which::which_in(&name, Some(path_var), &cwd).ok()?;
            (found != expected).then(|| {
                DoctorCheck::warning(
                    format!("PATH conflict: {name}"),
                    format!(
                        "{} is found before {}",
                        found.display(),
                        expected.display()
                    ),
                )
            })
        })
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::toolchain::catalog::CatalogClient;
    use crate::toolchain::config::ConfigStore;
    use crate::toolchain::http::HttpClient;
    use crate::toolchain::http::testing::MockHttp;
    use crate::toolchain::platform::{LinuxPlatform, PlatformDefinition};
    use crate::toolchain::proxy::install_aliases;
    use crate::toolchain::registry::Registry;
    use std::os::unix::fs::PermissionsExt;
    use std::sync::Arc;

    fn manager(home: &Path) -> ToolchainManager {
        let paths = SwiftlyPaths::with_home(home.to_path_buf());
        let registry = Registry::new(ConfigStore::new(&paths));
        let platform = Arc::new(LinuxPlatform::new(
            paths.toolchains_dir.clone(),
            String::new(),
        ));
        let catalog = CatalogClient::new(HttpClient::new(Arc::new(MockHttp::new())), "", "");
        ToolchainManager::new(platform, paths, registry, catalog)
    }

    fn status_of<'a>(checks: &'a [DoctorCheck], name: &str) -> &'a DoctorCheck {
        checks.iter().find(|c| c.name == name).unwrap()
    }

    fn write_executable(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"#!/bin/sh\n").unwrap();
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn fresh_home_warns_but_does_not_fail() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(temp.path());

        let checks = run_all_checks(&manager, None);
        assert!(checks.iter().all(|c| c.status != DoctorCheckStatus::Error));
        assert_eq!(status_of(&checks, "Platform").status, DoctorCheckStatus::Warning);
        assert_eq!(status_of(&checks, "PATH").status, DoctorCheckStatus::Warning);
        assert_eq!(status_of(&checks, "Proxies").status, DoctorCheckStatus::Warning);
    }

    #[test]
    fn healthy_installation_passes() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(temp.path());
        let version = "5.9.2".parse().unwrap();
        write_executable(&manager.platform().toolchain_bin_dir(&version).join("swift"));
        manager.registry().add(&version).unwrap();
        manager
            .registry()
            .set_platform(&PlatformDefinition::linux("ubuntu2204").unwrap())
            .unwrap();
        manager
            .activator()
            .use_toolchain(&version, &|_| Ok(true))
            .unwrap();
        let exe = temp.path().join("tools").join("swiftly");
        write_executable(&exe);
        install_aliases(manager.paths(), &exe).unwrap();

        let path = std::env::join_paths(manager.paths().path_entries()).unwrap();
        let checks = run_all_checks(&manager, Some(&path));
        for check in &checks {
            assert_eq!(check.status, DoctorCheckStatus::Ok, "{check:?}");
        }
    }

    #[test]
    fn proxies_behind_the_bin_dir_are_reported() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(temp.path());
        let exe = temp.path().join("tools").join("swiftly");
        write_executable(&exe);
        install_aliases(manager.paths(), &exe).unwrap();

        let reversed = std::env::join_paths([
            manager.paths().bin_dir.clone(),
            manager.paths().proxy_dir(),
        ])
        .unwrap();
        let check = check_path(manager.paths(), Some(&reversed));
        assert_eq!(check.status, DoctorCheckStatus::Warning);
        assert!(check.message.contains("must come before"));

        let bin_only = std::env::join_paths([manager.paths().bin_dir.clone()]).unwrap();
        let check = check_path(manager.paths(), Some(&bin_only));
        assert_eq!(check.status, DoctorCheckStatus::Warning);
        assert!(check.message.contains(".swift-version"));
    }

    #[test]
    fn missing_toolchain_and_shadowing_are_reported() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(temp.path());
        let version = "5.9.2".parse().unwrap();
        write_executable(&manager.platform().toolchain_bin_dir(&version).join("swift"));
        manager.registry().add(&version).unwrap();
        manager
            .activator()
            .use_toolchain(&version, &|_| Ok(true))
            .unwrap();

        let system = temp.path().join("system");
        write_executable(&system.join("swift"));
        let path = std::env::join_paths([system, manager.paths().bin_dir.clone()]).unwrap();

        let checks = run_all_checks(&manager, Some(&path));
        assert_eq!(
            status_of(&checks, "PATH conflict: swift").status,
            DoctorCheckStatus::Warning
        );

        std::fs::remove_dir_all(manager.platform().toolchain_dir(&version)).unwrap();
        let checks = run_all_checks(&manager, Some(&path));
        assert_eq!(
            status_of(&checks, "Installed toolchains").status,
            DoctorCheckStatus::Error
        );
        assert_eq!(
            status_of(&checks, "In-use toolchain").status,
            DoctorCheckStatus::Error
        );
    }

    #[test]
    fn unreadable_config_is_a_failure() {
        let temp = tempfile::tempdir().unwrap();
        let manager = manager(temp.path());
        std::fs::write(manager.paths().config_file(), "{ not json").unwrap();

        let checks = run_all_checks(&manager, None);
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].status, DoctorCheckStatus::Error);
    }
}
