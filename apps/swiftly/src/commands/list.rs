//! List command for the swiftly CLI.
//!
//! ## Usage
//!
//! ```bash
//! swiftly list              # every installed toolchain
//! swiftly list 5.9          # installed 5.9.x releases
//! swiftly list main-snapshot
//! ```
//!
//! ## Output Format
//!
//! ```text
//! Installed release toolchains
//! ----------------------------
//! 5.10.1 (in use)
//! 5.9.2
//!
//! Installed snapshot toolchains
//! -----------------------------
//! main-snapshot-2024-06-01
//! ```

use anyhow::Result;
use clap::Args;

use crate::commands::{listing_heading, print_heading};
use crate::context::SwiftlyContext;
use crate::toolchain::{ToolchainSelector, ToolchainVersion};

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Only list toolchains matching this selector (e.g. "5.9", "main-snapshot").
    pub selector: Option<String>,
}

/// Executes the list command.
///
/// # Errors
///
/// Returns an error if the selector is invalid or the config cannot be read.
#[allow(clippy::unused_async)]
pub async fn execute(ctx: &SwiftlyContext, args: &ListArgs) -> Result<()> {
    let selector = args
        .selector
        .as_deref()
        .map(str::parse::<ToolchainSelector>)
        .transpose()?;

    let registry = ctx.manager.registry();
    let toolchains = registry.list_installed(selector.as_ref())?;
    let in_use = registry.in_use()?;

    if toolchains.is_empty() {
        match &selector {
            Some(selector) => println!("No installed toolchains match {selector}."),
            None => {
                println!("No toolchains installed.");
                println!();
                println!("Run 'swiftly install' to install the latest release.");
            }
        }
        return Ok(());
    }

    let line = |version: &ToolchainVersion| {
        if in_use.as_ref() == Some(version) {
            format!("{version} (in use)")
        } else {
            version.to_string()
        }
    };

    if let Some(selector) = &selector {
        print_heading(&listing_heading("Installed", selector));
        for version in &toolchains {
            println!("{}", line(version));
        }
        return Ok(());
    }

    print_heading("Installed release toolchains");
    for version in toolchains.iter().filter(|v| v.is_stable()) {
        println!("{}", line(version));
    }
    println!();
    print_heading("Installed snapshot toolchains");
    for version in toolchains.iter().filter(|v| v.is_snapshot()) {
        println!("{}", line(version));
    }

    Ok(())
}
