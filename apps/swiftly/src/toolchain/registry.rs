//! Installed toolchain registry.
//!
//! Persisting counterparts of the [`Config`] operations. Every mutation runs
//! inside [`ConfigStore::update`], so it is written to disk before returning.

use crate::toolchain::config::{Config, ConfigStore};
use crate::toolchain::platform::PlatformDefinition;
use crate::toolchain::version::{ToolchainSelector, ToolchainVersion};
use anyhow::Result;

/// The set of installed toolchains and the in-use pointer, backed by `config.json`.
#[derive(Debug, Clone)]
pub struct Registry {
    store: ConfigStore,
}

impl Registry {
    #[must_use]
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// Loads a snapshot of the current configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.json` cannot be read or parsed.
    pub fn config(&self) -> Result<Config> {
        self.store.load()
    }

    /// Installed toolchains matching `selector`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.json` cannot be read or parsed.
    pub fn list_installed(
        &self,
        selector: Option<&ToolchainSelector>,
    ) -> Result<Vec<ToolchainVersion>> {
        let mut versions = self.store.load()?.list_installed(selector);
        versions.reverse();
        Ok(versions)
    }

    /// The newest installed toolchain matching `selector`.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.json` cannot be read or parsed.
    pub fn resolve_best(&self, selector: &ToolchainSelector) -> Result<Option<ToolchainVersion>> {
        Ok(self.store.load()?.resolve_best(selector))
    }

    /// The toolchain currently in use.
    ///
    /// # Errors
    ///
    /// Returns an error if `config.json` cannot be read or parsed.
    pub fn in_use(&self) -> Result<Option<ToolchainVersion>> {
        Ok(self.store.load()?.in_use)
    }

    /// Records a newly installed toolchain.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyInstalled`, or an error if the config cannot be persisted.
    pub fn add(&self, version: &ToolchainVersion) -> Result<()> {
        self.store.update(|config| Ok(config.add(version.clone())?))?;
        log::info!("registered toolchain {version}");
        Ok(())
    }

    /// Forgets a toolchain, clearing the in-use pointer if it pointed at it.
    ///
    /// Returns `true` if the removed toolchain was in use.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled`, or an error if the config cannot be persisted.
    pub fn remove(&self, version: &ToolchainVersion) -> Result<bool> {
        let was_in_use = self.store.update(|config| {
            let was_in_use = config.in_use.as_ref() == Some(version);
            config.remove(version)?;
            Ok(was_in_use)
        })?;
        log::info!("unregistered toolchain {version}");
        Ok(was_in_use)
    }

    /// Points the in-use pointer at `version`.
    ///
    /// # Errors
    ///
    /// Returns `NotInstalled`, or an error if the config cannot be persisted.
    pub fn set_in_use(&self, version: &ToolchainVersion) -> Result<()> {
        self.store.update(|config| Ok(config.set_in_use(version)?))
    }

    /// Clears the in-use pointer if it names `version`.
    ///
    /// Returns `true` if it did.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be persisted.
    pub fn clear_in_use_if(&self, version: &ToolchainVersion) -> Result<bool> {
        self.store.update(|config| {
            if config.in_use.as_ref() == Some(version) {
                config.in_use = None;
                Ok(true)
            } else {
                Ok(false)
            }
        })
    }

    /// Records the detected platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be persisted.
    pub fn set_platform(&self, platform: &PlatformDefinition) -> Result<()> {
        self.store.update(|config| {
            config.platform = Some(platform.clone());
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SwiftlyError;
    use crate::toolchain::paths::SwiftlyPaths;

    fn v(s: &str) -> ToolchainVersion {
        s.parse().unwrap()
    }

    fn registry(dir: &std::path::Path) -> Registry {
        Registry::new(ConfigStore::new(&SwiftlyPaths::with_home(dir.to_path_buf())))
    }

    #[test]
    fn list_installed_is_newest_first() {
        let temp = tempfile::tempdir().unwrap();
        let registry = registry(temp.path());
        for s in ["5.9.0", "5.10.0", "5.9.2"] {
            registry.add(&v(s)).unwrap();
        }

        assert_eq!(
            registry.list_installed(None).unwrap(),
            vec![v("5.10.0"), v("5.9.2"), v("5.9.0")]
        );
    }

    #[test]
    fn mutations_are_visible_to_a_fresh_registry() {
        let temp = tempfile::tempdir().unwrap();
        registry(temp.path()).add(&v("5.9.2")).unwrap();
        registry(temp.path()).set_in_use(&v("5.9.2")).unwrap();

        assert_eq!(registry(temp.path()).in_use().unwrap(), Some(v("5.9.2")));
    }

    #[test]
    fn removing_in_use_reports_and_clears_it() {
        let temp = tempfile::tempdir().unwrap();
        let registry = registry(temp.path());
        registry.add(&v("5.9.2")).unwrap();
        registry.set_in_use(&v("5.9.2")).unwrap();

        assert!(registry.remove(&v("5.9.2")).unwrap());
        assert_eq!(registry.in_use().unwrap(), None);
    }

    #[test]
    fn typed_errors_pass_through_update() {
        let temp = tempfile::tempdir().unwrap();
        let err = registry(temp.path()).remove(&v("5.9.2")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SwiftlyError>(),
            Some(SwiftlyError::NotInstalled { .. })
        ));
    }
}
