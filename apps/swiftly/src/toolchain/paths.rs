//! Directory layout for swiftly.
//!
//! ## Directory Structure
//!
//! ```text
//! <data_dir>/swiftly/         # Home directory (or SWIFTLY_HOME_DIR)
//!   config.json               # Installed toolchains, in-use pointer, platform
//!   .config.lock              # Exclusive lock held while mutating config.json
//!   proxies/                  # Aliases of the swiftly executable, ahead of bin/ on PATH
//!     swift -> /path/to/swiftly
//!   bin/                      # Shared bin dir (or SWIFTLY_BIN_DIR)
//!     swift -> ../toolchains/swift-5.9.2-RELEASE/usr/bin/swift
//!   toolchains/               # Toolchains dir (or SWIFTLY_TOOLCHAINS_DIR)
//!     swift-5.9.2-RELEASE/
//!       usr/bin/...
//! ```
//!
//! On macOS the toolchains dir defaults to `~/Library/Developer/Toolchains`,
//! where toolchains live as `<identifier>.xctoolchain` bundles.
//!
//! Resolution takes an environment lookup function rather than reading the
//! process environment directly, so callers and tests can supply their own.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Overrides the home directory holding `config.json`.
pub const SWIFTLY_HOME_DIR_ENV: &str = "SWIFTLY_HOME_DIR";

/// Overrides the shared bin directory holding the in-use toolchain links.
pub const SWIFTLY_BIN_DIR_ENV: &str = "SWIFTLY_BIN_DIR";

/// Overrides the directory toolchains are installed into.
pub const SWIFTLY_TOOLCHAINS_DIR_ENV: &str = "SWIFTLY_TOOLCHAINS_DIR";

const CONFIG_FILE: &str = "config.json";
const LOCK_FILE: &str = ".config.lock";
const PROXY_DIR: &str = "proxies";

/// Resolved swiftly directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwiftlyPaths {
    /// Directory holding the config file and its lock.
    pub home: PathBuf,
    /// Shared bin directory, expected to be on the user's `PATH`.
    pub bin_dir: PathBuf,
    /// Directory toolchains are installed into.
    pub toolchains_dir: PathBuf,
}

impl SwiftlyPaths {
    /// Resolves the directories from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if no override is set and the platform data directory
    /// cannot be determined.
    pub fn from_env() -> Result<Self> {
        Self::resolve(|key| std::env::var_os(key))
    }

    /// Resolves the directories using `lookup` for environment variables.
    ///
    /// Empty values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns an error if no home override is given and the platform data
    /// directory cannot be determined.
    pub fn resolve(lookup: impl Fn(&str) -> Option<OsString>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);

        let home = match var(SWIFTLY_HOME_DIR_ENV) {
            Some(home) => home,
            None => dirs::data_dir()
                .context(
                    "Cannot determine the data directory. Set SWIFTLY_HOME_DIR environment variable.",
                )?
                .join("swiftly"),
        };
        let bin_dir = var(SWIFTLY_BIN_DIR_ENV).unwrap_or_else(|| home.join("bin"));
        let toolchains_dir = match var(SWIFTLY_TOOLCHAINS_DIR_ENV) {
            Some(dir) => dir,
            None => default_toolchains_dir(&home)?,
        };

        Ok(Self {
            home,
            bin_dir,
            toolchains_dir,
        })
    }

    /// Lays every directory out under `home`, ignoring platform defaults.
    #[cfg(test)]
    #[must_use = "returns new paths instance without side effects"]
    pub fn with_home(home: PathBuf) -> Self {
        Self {
            bin_dir: home.join("bin"),
            toolchains_dir: home.join("toolchains"),
            home,
        }
    }

    /// Returns the path to `config.json`.
    #[must_use = "returns the path without side effects"]
    pub fn config_file(&self) -> PathBuf {
        self.home.join(CONFIG_FILE)
    }

    /// Returns the path to the lock file guarding config mutations.
    #[must_use = "returns the path without side effects"]
    pub fn lock_file(&self) -> PathBuf {
        self.home.join(LOCK_FILE)
    }

    /// Returns the path the link for `name` occupies in the shared bin dir.
    #[must_use = "returns the path without side effects"]
    pub fn shared_bin_entry(&self, name: &str) -> PathBuf {
        self.bin_dir.join(name)
    }

    /// Returns the directory holding the proxy aliases of the swiftly
    /// executable. It goes before the shared bin dir on `PATH`, so proxied
    /// names reach swiftly and other executables reach the in-use toolchain.
    #[must_use = "returns the path without side effects"]
    pub fn proxy_dir(&self) -> PathBuf {
        self.home.join(PROXY_DIR)
    }

    /// Directories `init` puts on `PATH`, in precedence order.
    #[must_use]
    pub fn path_entries(&self) -> Vec<PathBuf> {
        vec![self.proxy_dir(), self.bin_dir.clone()]
    }

    /// Returns `true` when toolchains go to the system location that the
    /// native package installer writes to.
    #[must_use]
    pub fn uses_system_toolchains_dir(&self) -> bool {
        system_toolchains_dir().is_some_and(|dir| dir == self.toolchains_dir)
    }

    /// Creates the home, bin, and toolchains directories.
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [&self.home, &self.bin_dir, &self.toolchains_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }
}

#[cfg(target_os = "macos")]
fn system_toolchains_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library").join("Developer").join("Toolchains"))
}

#[cfg(not(target_os = "macos"))]
fn system_toolchains_dir() -> Option<PathBuf> {
    None
}

fn default_toolchains_dir(home: &Path) -> Result<PathBuf> {
    if cfg!(target_os = "macos") {
        system_toolchains_dir()
            .context("Cannot determine home directory. Set SWIFTLY_TOOLCHAINS_DIR environment variable.")
    } else {
        Ok(home.join("toolchains"))
    }
}
