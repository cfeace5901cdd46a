//! Init command for the swiftly CLI.
//!
//! Prepares swiftly for use: records the platform, creates the home, bin and
//! toolchains directories, links the proxied executable names (`swift`,
//! `clang`, ...) to this binary, and puts the proxy and shared bin directories
//! on `PATH` through the login shell's profile.
//!
//! The proxy directory comes first on `PATH`. `swift +5.9 build` and
//! `.swift-version` files work through it, while executables outside the
//! proxy list resolve to the in-use toolchain's links in the bin directory.
//!
//! ## Usage
//!
//! ```bash
//! swiftly init
//! swiftly init --no-modify-profile
//! ```

use anyhow::{Context, Result};
use clap::Args;

use crate::context::SwiftlyContext;
use crate::toolchain::proxy::install_aliases;
use crate::toolchain::shell::{configure_profile, format_result_message};

/// Arguments for the init command.
#[derive(Args)]
pub struct InitArgs {
    /// Do not edit the shell profile.
    #[clap(long)]
    pub no_modify_profile: bool,
}

/// Executes the init command.
///
/// # Errors
///
/// Returns an error if the platform cannot be detected, the directories
/// cannot be created or the proxy aliases cannot be linked. Profile problems
/// are reported as warnings.
pub async fn execute(ctx: &SwiftlyContext, args: &InitArgs) -> Result<()> {
    let manager = &ctx.manager;
    let paths = manager.paths();

    let platform = manager.ensure_platform(ctx.platform_override()).await?;
    paths.ensure_directories()?;

    println!("Platform: {} ({})", platform.name_pretty, platform.name);
    println!("Home directory: {}", paths.home.display());
    println!("Toolchains directory: {}", paths.toolchains_dir.display());
    println!("Bin directory: {}", paths.bin_dir.display());

    let executable =
        std::env::current_exe().context("Cannot determine the path of the swiftly executable")?;
    let created = install_aliases(paths, &executable)?;
    println!(
        "Proxy directory: {} ({created} alias(es) created)",
        paths.proxy_dir().display()
    );
    println!();

    if args.no_modify_profile {
        println!("Add these directories to the front of your PATH, in this order:");
        for dir in paths.path_entries() {
            println!("  {}", dir.display());
        }
        return Ok(());
    }

    configure_shell_path(ctx).await;
    Ok(())
}

async fn configure_shell_path(ctx: &SwiftlyContext) {
    let entries = ctx.manager.paths().path_entries();
    let result = match (ctx.manager.platform().get_shell().await, dirs::home_dir()) {
        (Ok(shell), Some(home)) => configure_profile(&shell, &home, &entries),
        (Err(e), _) => Err(e),
        (_, None) => Err(anyhow::anyhow!("Cannot determine the home directory")),
    };

    match result {
        Ok(result) => println!("{}", format_result_message(&result, &entries)),
        Err(e) => {
            let joined = entries
                .iter()
                .map(|dir| dir.display().to_string())
                .collect::<Vec<_>>()
                .join(":");
            eprintln!("Warning: Could not configure PATH automatically: {e:#}");
            println!("To use the toolchains, add to your shell profile:");
            println!("  export PATH=\"{joined}:$PATH\"");
        }
    }
}
