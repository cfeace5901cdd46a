//! Persisted swiftly configuration.
//!
//! `config.json` records the installed toolchains, the toolchain in use, and
//! the detected platform:
//!
//! ```json
//! {
//!   "version": "1",
//!   "installedToolchains": ["5.9.2", "main-snapshot-2024-01-01"],
//!   "inUse": "5.9.2",
//!   "platform": { "name": "ubuntu2204", "nameFull": "ubuntu22.04", "namePretty": "Ubuntu 22.04", "architecture": "x86_64" }
//! }
//! ```
//!
//! Fields this version does not know about are kept and written back unchanged.
//!
//! All mutations go through [`ConfigStore::update`], which holds an exclusive
//! lock on `.config.lock` for the whole load-mutate-persist cycle and replaces
//! `config.json` by renaming a fully written temporary file over it.

use crate::errors::SwiftlyError;
use crate::toolchain::paths::SwiftlyPaths;
use crate::toolchain::platform::PlatformDefinition;
use crate::toolchain::version::{ToolchainSelector, ToolchainVersion};
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

/// Schema marker written to `config.json`.
pub const CONFIG_SCHEMA_VERSION: &str = "1";

fn schema_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

/// The persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "schema_version")]
    pub version: String,
    #[serde(default)]
    pub installed_toolchains: BTreeSet<ToolchainVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_use: Option<ToolchainVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformDefinition>,
    /// Unknown top-level fields, preserved on write-back.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: schema_version(),
            installed_toolchains: BTreeSet::new(),
            in_use: None,
            platform: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl Config {
    /// Returns installed toolchains matching `selector` (all when `None`), in
    /// ascending order.
    #[must_use = "returns the matching toolchains without side effects"]
    pub fn list_installed(&self, selector: Option<&ToolchainSelector>) -> Vec<ToolchainVersion> {
        self.installed_toolchains
            .iter()
            .filter(|v| selector.is_none_or(|s| s.matches(v)))
            .cloned()
            .collect()
    }

    /// Returns the newest installed toolchain matching `selector`.
    #[must_use = "returns the best match without side effects"]
    pub fn resolve_best(&self, selector: &ToolchainSelector) -> Option<ToolchainVersion> {
        self.installed_toolchains
            .iter()
            .filter(|v| selector.matches(v))
            .max()
            .cloned()
    }

    /// Returns `true` if `version` is in the installed set.
    #[must_use]
    pub fn is_installed(&self, version: &ToolchainVersion) -> bool {
        self.installed_toolchains.contains(version)
    }

    /// Adds `version` to the installed set.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInstalled` if it is already present.
    pub fn add(&mut self, version: ToolchainVersion) -> Result<(), SwiftlyError> {
        if self.installed_toolchains.contains(&version) {
            return Err(SwiftlyError::already_installed(version.name()));
        }
        self.installed_toolchains.insert(version);
        Ok(())
    }

    /// Removes `version` from the installed set, clearing the in-use pointer
    /// if it pointed at it.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` if it is absent.
    pub fn remove(&mut self, version: &ToolchainVersion) -> Result<(), SwiftlyError> {
        if !self.installed_toolchains.remove(version) {
            return Err(SwiftlyError::not_installed(version.name()));
        }
        if self.in_use.as_ref() == Some(version) {
            self.in_use = None;
        }
        Ok(())
    }

    /// Points the in-use pointer at `version`.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled` if `version` is not in the installed set.
    pub fn set_in_use(&mut self, version: &ToolchainVersion) -> Result<(), SwiftlyError> {
        if !self.is_installed(version) {
            return Err(SwiftlyError::not_installed(version.name()));
        }
        self.in_use = Some(version.clone());
        Ok(())
    }

    /// Drops an in-use pointer that does not refer to an installed toolchain.
    fn normalize(&mut self) {
        if let Some(in_use) = &self.in_use
            && !self.installed_toolchains.contains(in_use)
        {
            log::warn!(
                "config names {in_use} as in use but it is not installed; clearing the in-use toolchain"
            );
            self.in_use = None;
        }
    }
}

/// Reads and atomically rewrites `config.json`.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    home: PathBuf,
    config_file: PathBuf,
    lock_file: PathBuf,
}

impl ConfigStore {
    /// Creates a store for the config file under `paths.home`.
    #[must_use]
    pub fn new(paths: &SwiftlyPaths) -> Self {
        Self {
            home: paths.home.clone(),
            config_file: paths.config_file(),
            lock_file: paths.lock_file(),
        }
    }

    /// Loads the configuration. A missing file is an empty configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Config> {
        let content = match std::fs::read_to_string(&self.config_file) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read config from {}", self.config_file.display())
                });
            }
        };
        let mut config: Config = serde_json::from_str(&content).with_context(|| {
            format!("Failed to parse config file {}", self.config_file.display())
        })?;
        config.normalize();
        Ok(config)
    }

    /// Runs `mutate` against the freshly loaded configuration under an
    /// exclusive lock and persists the result if it succeeds.
    ///
    /// Nothing is written when `mutate` fails.
    ///
    /// # Errors
    ///
    /// Returns an error from `mutate`, or if locking, loading, or writing fails.
    pub fn update<T>(&self, mutate: impl FnOnce(&mut Config) -> Result<T>) -> Result<T> {
        std::fs::create_dir_all(&self.home)
            .with_context(|| format!("Failed to create directory: {}", self.home.display()))?;
        let lock = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_file)
            .with_context(|| format!("Failed to open lock file {}", self.lock_file.display()))?;
        lock.lock_exclusive()
            .with_context(|| format!("Failed to lock {}", self.lock_file.display()))?;

        let result = self.load().and_then(|mut config| {
            let value = mutate(&mut config)?;
            self.save(&config)?;
            Ok(value)
        });

        FileExt::unlock(&lock)
            .with_context(|| format!("Failed to unlock {}", self.lock_file.display()))?;
        result
    }

    fn save(&self, config: &Config) -> Result<()> {
        let content =
            serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.home).with_context(|| {
            format!("Failed to create temporary file in {}", self.home.display())
        })?;
        writeln!(temp, "{content}").context("Failed to write temporary config file")?;
        temp.as_file()
            .sync_all()
            .context("Failed to flush temporary config file")?;
        temp.persist(&self.config_file).with_context(|| {
            format!("Failed to replace config file {}", self.config_file.display())
        })?;
        log::debug!("wrote {}", self.config_file.display());
        Ok(())
    }
}
