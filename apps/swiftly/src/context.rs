//! Per-invocation wiring shared by every command.
//!
//! Resolves directories and server URLs from the environment, picks the
//! platform implementation and decides how confirmations are answered.

use crate::toolchain::catalog::{
    CATALOG_SERVER_ENV, CatalogClient, DEFAULT_CATALOG_SERVER, DEFAULT_DOWNLOAD_SERVER,
    DOWNLOAD_SERVER_ENV, normalize_server,
};
use crate::toolchain::config::ConfigStore;
use crate::toolchain::download::ReqwestExecutor;
use crate::toolchain::http::HttpClient;
use crate::toolchain::platform::{self, SWIFTLY_PLATFORM_ENV};
use crate::toolchain::registry::Registry;
use crate::toolchain::{SwiftlyPaths, ToolchainManager};
use anyhow::{Context, Result};
use std::io::{BufRead, IsTerminal, Write};
use std::sync::Arc;

/// How yes/no questions get answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmPolicy {
    /// `--assume-yes` was given.
    AssumeYes,
    /// Ask on the terminal.
    Prompt,
    /// Stdin is not a terminal and `--assume-yes` was not given.
    FailClosed,
}

impl ConfirmPolicy {
    #[must_use]
    pub fn detect(assume_yes: bool) -> Self {
        if assume_yes {
            Self::AssumeYes
        } else if std::io::stdin().is_terminal() {
            Self::Prompt
        } else {
            Self::FailClosed
        }
    }

    /// Answers `prompt` according to the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be read.
    pub fn confirm(self, prompt: &str) -> Result<bool> {
        match self {
            Self::AssumeYes => Ok(true),
            Self::FailClosed => {
                log::warn!("not confirmed (stdin is not a terminal, pass --assume-yes): {prompt}");
                Ok(false)
            }
            Self::Prompt => {
                let mut stderr = std::io::stderr();
                write!(stderr, "{prompt} [y/N] ").context("Failed to write prompt")?;
                stderr.flush().context("Failed to write prompt")?;

                let mut answer = String::new();
                std::io::stdin()
                    .lock()
                    .read_line(&mut answer)
                    .context("Failed to read answer")?;
                Ok(is_yes(&answer))
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Everything a command needs to run.
#[derive(Debug)]
pub struct SwiftlyContext {
    pub manager: ToolchainManager,
    /// Value of `SWIFTLY_PLATFORM`, if set.
    pub platform_override: Option<String>,
    pub confirm: ConfirmPolicy,
    pub verbose: bool,
}

impl SwiftlyContext {
    /// Builds the context from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be determined, the HTTP
    /// client cannot be built or the OS is unsupported.
    pub fn from_env(assume_yes: bool, verbose: bool) -> Result<Self> {
        let paths = SwiftlyPaths::from_env()?;
        let catalog_server = server_url(
            std::env::var(CATALOG_SERVER_ENV).ok(),
            DEFAULT_CATALOG_SERVER,
        );
        let download_server = server_url(
            std::env::var(DOWNLOAD_SERVER_ENV).ok(),
            DEFAULT_DOWNLOAD_SERVER,
        );
        log::debug!("catalog server {catalog_server}, download server {download_server}");

        let platform = platform::current(&paths, &catalog_server)?;
        let registry = Registry::new(ConfigStore::new(&paths));
        let http = HttpClient::new(Arc::new(ReqwestExecutor::new()?));
        let catalog = CatalogClient::new(http, &catalog_server, &download_server);

        Ok(Self {
            manager: ToolchainManager::new(platform, paths, registry, catalog),
            platform_override: std::env::var(SWIFTLY_PLATFORM_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty()),
            confirm: ConfirmPolicy::detect(assume_yes),
            verbose,
        })
    }

    /// Returns the confirmation callback handed to core operations.
    #[must_use]
    pub fn confirmer(&self) -> impl Fn(&str) -> Result<bool> + Send + Sync + use<> {
        let policy = self.confirm;
        move |prompt: &str| policy.confirm(prompt)
    }

    #[must_use]
    pub fn platform_override(&self) -> Option<&str> {
        self.platform_override.as_deref()
    }
}

/// Normalizes a server override, falling back to `default` when unset or blank.
fn server_url(value: Option<String>, default: &str) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| default.to_string(), |v| normalize_server(&v))
}
