//! Uninstall command for the swiftly CLI.
//!
//! ## Usage
//!
//! ```bash
//! swiftly uninstall 5.9.2          # one toolchain
//! swiftly uninstall 5.9            # every installed 5.9.x
//! swiftly uninstall main-snapshot  # every installed main snapshot
//! ```

use anyhow::Result;
use clap::Args;

use crate::context::SwiftlyContext;
use crate::errors::SwiftlyError;
use crate::toolchain::ToolchainSelector;

/// Arguments for the uninstall command.
#[derive(Args)]
pub struct UninstallArgs {
    /// Toolchains to remove (e.g. "5.9.2", "5.9", "main-snapshot").
    pub selector: String,
}

/// Executes the uninstall command.
///
/// Lists every installed toolchain matching the selector, asks for
/// confirmation and removes them one by one. Removing the toolchain in use
/// leaves no toolchain in use.
///
/// # Errors
///
/// Returns an error if:
/// - The selector is invalid or matches nothing installed
/// - Confirmation is declined
/// - A toolchain cannot be removed
pub async fn execute(ctx: &SwiftlyContext, args: &UninstallArgs) -> Result<()> {
    let selector: ToolchainSelector = args.selector.parse()?;
    let manager = &ctx.manager;

    let toolchains = manager.registry().list_installed(Some(&selector))?;
    if toolchains.is_empty() {
        return Err(SwiftlyError::not_installed(selector.to_string()).into());
    }

    println!("The following toolchains will be uninstalled:");
    for version in &toolchains {
        println!("  {version}");
    }
    if !ctx.confirm.confirm("Proceed?")? {
        return Err(SwiftlyError::confirmation_declined("uninstall").into());
    }

    for version in &toolchains {
        println!("Uninstalling {version}...");
        let outcome = manager.uninstall(version, ctx.verbose).await?;
        if outcome.was_in_use {
            println!("{version} was in use. Run 'swiftly use <version>' to select another toolchain.");
        }
    }

    println!("{} toolchain(s) uninstalled.", toolchains.len());
    Ok(())
}
