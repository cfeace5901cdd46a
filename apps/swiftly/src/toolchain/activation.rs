//! Activation of the in-use toolchain.
//!
//! The shared bin directory holds one symlink per executable of the in-use
//! toolchain, pointing into that toolchain's `usr/bin`. Switching toolchains
//! removes the old links (refusing to touch any that were replaced behind our
//! back) before creating the new ones, and only ever overwrites foreign files
//! after confirmation.
//!
//! ## Usage
//!
//! ```ignore
//! let activator = Activator::new(platform.as_ref(), &paths, &registry);
//! activator.use_toolchain(&version, &|prompt| Ok(ask_user(prompt)))?;
//! ```

use crate::errors::SwiftlyError;
use crate::toolchain::paths::SwiftlyPaths;
use crate::toolchain::platform::Platform;
use crate::toolchain::registry::Registry;
use crate::toolchain::version::ToolchainVersion;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// The entry point's own name; never linked or unlinked.
pub const SELF_EXECUTABLE: &str = "swiftly";

/// Asks the user to approve a destructive step; `Ok(false)` declines.
pub type Confirm = dyn Fn(&str) -> Result<bool> + Send + Sync;

/// Manages the shared bin directory links.
pub struct Activator<'a> {
    platform: &'a dyn Platform,
    paths: &'a SwiftlyPaths,
    registry: &'a Registry,
}

impl<'a> Activator<'a> {
    #[must_use]
    pub fn new(platform: &'a dyn Platform, paths: &'a SwiftlyPaths, registry: &'a Registry) -> Self {
        Self {
            platform,
            paths,
            registry,
        }
    }

    /// Makes `version` the in-use toolchain.
    ///
    /// Existing entries in the shared bin directory that swiftly does not own
    /// are only replaced once `confirm` approves. Any other toolchain in use is
    /// deactivated after that, so a declined confirmation leaves it in place.
    ///
    /// # Errors
    ///
    /// - `NotInstalled` if `version` is not registered
    /// - `ToolchainBinDirMissing` if its bin directory is gone from disk
    /// - `ForeignSymlinkDetected` from deactivating the previous toolchain
    /// - `ConfirmationDeclined` if overwriting foreign files is declined
    pub fn use_toolchain(&self, version: &ToolchainVersion, confirm: &Confirm) -> Result<()> {
        let config = self.registry.config()?;
        if !config.is_installed(version) {
            return Err(SwiftlyError::not_installed(version.name()).into());
        }

        let toolchain_bin = self.platform.toolchain_bin_dir(version);
        if !toolchain_bin.is_dir() {
            return Err(SwiftlyError::bin_dir_missing(version.name(), toolchain_bin).into());
        }

        let executables = list_executables(&toolchain_bin)?;
        let conflicts: Vec<PathBuf> = executables
            .iter()
            .map(|name| self.paths.shared_bin_entry(name))
            .filter(|entry| entry.symlink_metadata().is_ok() && !self.owns(entry))
            .collect();

        if !conflicts.is_empty() {
            let listing = conflicts
                .iter()
                .map(|p| format!("  {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n");
            let prompt = format!(
                "The following files are not managed by swiftly and will be overwritten:\n{listing}\nProceed?"
            );
            if !confirm(&prompt)? {
                return Err(SwiftlyError::confirmation_declined(format!(
                    "overwriting {} existing file(s) in {}",
                    conflicts.len(),
                    self.paths.bin_dir.display()
                ))
                .into());
            }
        }

        // Only after the conflicts are settled.
        if let Some(previous) = config.in_use.as_ref().filter(|v| *v != version) {
            self.unuse(previous)?;
        }

        std::fs::create_dir_all(&self.paths.bin_dir).with_context(|| {
            format!(
                "Failed to create bin directory: {}",
                self.paths.bin_dir.display()
            )
        })?;

        for name in &executables {
            let entry = self.paths.shared_bin_entry(name);
            remove_entry(&entry)?;
            create_link(&toolchain_bin.join(name), &entry)?;
        }

        self.registry.set_in_use(version)?;
        log::info!(
            "activated {version} ({} links in {})",
            executables.len(),
            self.paths.bin_dir.display()
        );
        Ok(())
    }

    /// Removes the links of `version` from the shared bin directory and
    /// clears the in-use pointer if it named `version`.
    ///
    /// Every link is checked before any is removed, so a foreign link leaves
    /// the directory untouched.
    ///
    /// # Errors
    ///
    /// - `ForeignSymlinkDetected` if an entry named after one of the
    ///   toolchain's executables no longer points into it
    pub fn unuse(&self, version: &ToolchainVersion) -> Result<()> {
        let toolchain_dir = self.platform.toolchain_dir(version);
        let toolchain_bin = self.platform.toolchain_bin_dir(version);

        let names = if toolchain_bin.is_dir() {
            list_executables(&toolchain_bin)?
        } else {
            log::debug!(
                "{} is missing, sweeping links into {}",
                toolchain_bin.display(),
                toolchain_dir.display()
            );
            self.links_into(&toolchain_dir)?
        };

        let mut owned = Vec::new();
        for name in names {
            let entry = self.paths.shared_bin_entry(&name);
            if entry.symlink_metadata().is_err() {
                continue;
            }
            match std::fs::read_link(&entry) {
                Ok(target) if target.starts_with(&toolchain_dir) => owned.push(entry),
                Ok(target) if is_swiftly_executable(&target) => {}
                Ok(target) => return Err(SwiftlyError::foreign_symlink(entry, target).into()),
                Err(_) => return Err(SwiftlyError::foreign_symlink(entry.clone(), entry).into()),
            }
        }

        for entry in &owned {
            remove_entry(entry)?;
        }

        self.registry.clear_in_use_if(version)?;
        log::info!("deactivated {version} ({} links removed)", owned.len());
        Ok(())
    }

    /// Lists the shared bin entries of `version` that are missing or do not
    /// point at its executables.
    ///
    /// # Errors
    ///
    /// Returns an error if the toolchain's bin directory cannot be read.
    pub fn stale_links(&self, version: &ToolchainVersion) -> Result<Vec<PathBuf>> {
        let toolchain_bin = self.platform.toolchain_bin_dir(version);
        if !toolchain_bin.is_dir() {
            return Ok(Vec::new());
        }
        Ok(list_executables(&toolchain_bin)?
            .into_iter()
            .filter_map(|name| {
                let entry = self.paths.shared_bin_entry(&name);
                let expected = toolchain_bin.join(&name);
                match std::fs::read_link(&entry) {
                    Ok(target) if target == expected => None,
                    _ => Some(entry),
                }
            })
            .collect())
    }

    /// Returns `true` for symlinks into the toolchains directory and proxy
    /// aliases of swiftly itself.
    fn owns(&self, entry: &Path) -> bool {
        std::fs::read_link(entry).is_ok_and(|target| {
            target.starts_with(self.platform.toolchains_dir()) || is_swiftly_executable(&target)
        })
    }

    /// Names of shared bin symlinks pointing anywhere inside `dir`.
    fn links_into(&self, dir: &Path) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.paths.bin_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read {}", self.paths.bin_dir.display())
                });
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to read {}", self.paths.bin_dir.display()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == SELF_EXECUTABLE {
                continue;
            }
            if std::fs::read_link(entry.path()).is_ok_and(|target| target.starts_with(dir)) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Lists the executables in a toolchain bin directory, sorted by name.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_executables(bin_dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(bin_dir)
        .with_context(|| format!("Failed to read {}", bin_dir.display()))?
    {
        let entry = entry.with_context(|| format!("Failed to read {}", bin_dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == SELF_EXECUTABLE || entry.path().is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    Ok(names)
}

/// Returns `true` if `target` is the swiftly executable, either by name or
/// because it is the running binary.
fn is_swiftly_executable(target: &Path) -> bool {
    target
        .file_name()
        .is_some_and(|name| name == SELF_EXECUTABLE)
        || std::env::current_exe().is_ok_and(|exe| exe == target)
}

pub(crate) fn remove_entry(entry: &Path) -> Result<()> {
    // symlink_metadata also sees dangling links.
    if entry.symlink_metadata().is_ok() {
        std::fs::remove_file(entry)
            .with_context(|| format!("Failed to remove {}", entry.display()))?;
    }
    Ok(())
}

pub(crate) fn create_link(source: &Path, target: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(source, target).with_context(|| {
            format!(
                "Failed to create symlink from {} to {}",
                target.display(),
                source.display()
            )
        })
    }

    #[cfg(not(unix))]
    {
        anyhow::bail!(
            "Cannot link {} to {}: symlinks are only supported on Unix",
            target.display(),
            source.display()
        )
    }
}
