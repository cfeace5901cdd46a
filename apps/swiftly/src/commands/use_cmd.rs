//! Use command for the swiftly CLI.
//!
//! Switches the toolchain in use, or shows it.
//!
//! ## Usage
//!
//! ```bash
//! swiftly use 5.10                  # newest installed 5.10.x
//! swiftly use                       # show the toolchain in use
//! swiftly use --print-location      # show where it is installed
//! ```
//!
//! Without a selector, a `.swift-version` file in the current directory or
//! one of its parents takes precedence over the global choice.

use anyhow::{Context, Result};
use clap::Args;

use crate::context::SwiftlyContext;
use crate::toolchain::ToolchainVersion;
use crate::toolchain::proxy::{find_swift_version_file, resolve_installed};

/// Arguments for the use command.
#[derive(Args)]
pub struct UseArgs {
    /// Installed toolchain to use (e.g. "5.9.2", "5.10", "main-snapshot").
    pub selector: Option<String>,

    /// Print the directory of the toolchain instead of its name.
    #[clap(long, short = 'p')]
    pub print_location: bool,
}

/// Executes the use command.
///
/// # Errors
///
/// Returns an error if the selector is invalid, matches nothing installed,
/// or the shared bin links cannot be updated.
#[allow(clippy::unused_async)]
pub async fn execute(ctx: &SwiftlyContext, args: &UseArgs) -> Result<()> {
    let manager = &ctx.manager;

    if let Some(selector) = &args.selector {
        let version = resolve_installed(manager, selector)?;
        if manager.registry().in_use()?.as_ref() == Some(&version) {
            println!("{version} is already in use.");
        } else {
            manager
                .activator()
                .use_toolchain(&version, &ctx.confirmer())?;
            println!("The current toolchain is now {version}.");
        }
        if args.print_location {
            print_location(ctx, &version);
        }
        return Ok(());
    }

    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;
    if let Some((file, selector)) = find_swift_version_file(&cwd) {
        let version = resolve_installed(manager, &selector)
            .with_context(|| format!("Failed to resolve the toolchain named in {}", file.display()))?;
        if args.print_location {
            print_location(ctx, &version);
        } else {
            println!("{version} (from {})", file.display());
        }
        return Ok(());
    }

    match manager.registry().in_use()? {
        Some(version) if args.print_location => print_location(ctx, &version),
        Some(version) => println!("{version} (default)"),
        None => {
            println!("No toolchain is in use.");
            println!("Run 'swiftly use <version>' to select an installed toolchain.");
        }
    }
    Ok(())
}

fn print_location(ctx: &SwiftlyContext, version: &ToolchainVersion) {
    println!(
        "{}",
        ctx.manager.platform().toolchain_dir(version).display()
    );
}
