//! List-available command for the swiftly CLI.
//!
//! Shows toolchains published in the remote catalog for this platform.
//!
//! ## Usage
//!
//! ```bash
//! swiftly list-available                 # every stable release
//! swiftly list-available 5.10            # 5.10.x releases
//! swiftly list-available main-snapshot   # recent main snapshots
//! ```

use anyhow::Result;
use clap::Args;

use crate::commands::{listing_heading, print_heading};
use crate::context::SwiftlyContext;
use crate::toolchain::version::{Snapshot, StableRelease};
use crate::toolchain::{ToolchainSelector, ToolchainVersion};

/// Arguments for the list-available command.
#[derive(Args)]
pub struct ListAvailableArgs {
    /// Only list toolchains matching this selector (e.g. "5.10", "main-snapshot").
    pub selector: Option<String>,
}

/// Executes the list-available command.
///
/// # Errors
///
/// Returns an error if the selector is invalid, the platform cannot be
/// determined or the catalog cannot be fetched.
pub async fn execute(ctx: &SwiftlyContext, args: &ListAvailableArgs) -> Result<()> {
    let selector = args
        .selector
        .as_deref()
        .map(str::parse::<ToolchainSelector>)
        .transpose()?;

    let manager = &ctx.manager;
    let platform = manager.ensure_platform(ctx.platform_override()).await?;
    let catalog = manager.catalog();

    let available: Vec<ToolchainVersion> = match &selector {
        Some(ToolchainSelector::Snapshot { branch, date }) => {
            let same_date = |s: &Snapshot| date.as_ref().is_none_or(|d| *d == s.date);
            catalog
                .list_snapshots(&platform, *branch, None, Some(&same_date))
                .await?
                .into_iter()
                .map(ToolchainVersion::Snapshot)
                .collect()
        }
        _ => {
            let matches = |release: &StableRelease| {
                selector
                    .as_ref()
                    .is_none_or(|s| s.matches(&ToolchainVersion::Stable(*release)))
            };
            catalog
                .list_releases(&platform, None, Some(&matches))
                .await?
                .into_iter()
                .map(|remote| remote.version)
                .collect()
        }
    };

    let config = manager.registry().config()?;
    let heading = match &selector {
        Some(selector) => listing_heading("Available", selector),
        None => "Available release toolchains".to_string(),
    };

    if available.is_empty() {
        println!("No toolchains available for {}.", platform.name_pretty);
        return Ok(());
    }

    print_heading(&heading);
    for version in &available {
        if config.in_use.as_ref() == Some(version) {
            println!("{version} (installed) (in use)");
        } else if config.is_installed(version) {
            println!("{version} (installed)");
        } else {
            println!("{version}");
        }
    }

    Ok(())
}
