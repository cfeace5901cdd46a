//! Install command for the swiftly CLI.
//!
//! Downloads and installs the newest toolchain matching a selector. If no
//! selector is given, installs the latest stable release.
//!
//! ## Usage
//!
//! ```bash
//! swiftly install                  # latest stable release
//! swiftly install 5.9              # newest 5.9.x
//! swiftly install main-snapshot    # newest main snapshot
//! swiftly install 5.10.1 --use     # install and switch to it
//! ```
//!
//! Missing system packages are reported as a script to run as root. The
//! script is printed, or written to `--post-install-file`, and never run.

use anyhow::{Context, Result};
use clap::Args;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::SwiftlyContext;
use crate::toolchain::download::{ProgressCallback, ProgressEvent, format_bytes, format_speed};
use crate::toolchain::shell::path_contains;
use crate::toolchain::{InstallOptions, ToolchainSelector};

/// Arguments for the install command.
#[derive(Args)]
pub struct InstallArgs {
    /// Toolchain to install (e.g. "5.9.2", "5.10", "main-snapshot", "latest").
    #[clap(default_value = "latest")]
    pub selector: String,

    /// Use the toolchain once it is installed.
    #[clap(long = "use")]
    pub use_after_install: bool,

    /// Write the post-install script here instead of printing it.
    #[clap(long, value_name = "PATH")]
    pub post_install_file: Option<PathBuf>,
}

/// Executes the install command.
///
/// # Process
///
/// 1. Record the platform on first use
/// 2. Resolve the selector against installed toolchains, then the catalog
/// 3. Download with progress, verify checksum and signature
/// 4. Install, register and (if nothing is in use, or `--use`) activate
///
/// # Errors
///
/// Returns an error if the selector is invalid or any install stage fails.
pub async fn execute(ctx: &SwiftlyContext, args: &InstallArgs) -> Result<()> {
    let selector: ToolchainSelector = args.selector.parse()?;
    let manager = &ctx.manager;
    manager.paths().ensure_directories()?;

    let platform = manager.ensure_platform(ctx.platform_override()).await?;
    let options = InstallOptions {
        verify_signature: true,
        use_after_install: args.use_after_install,
        verbose: ctx.verbose,
        progress: Some(progress_printer()),
    };

    match &selector {
        ToolchainSelector::Latest => {
            println!("Installing the latest release for {}...", platform.name_pretty);
        }
        selector if selector.is_exact() => {
            println!("Installing {selector} for {}...", platform.name_pretty);
        }
        selector => println!(
            "Installing the newest toolchain matching {selector} for {}...",
            platform.name_pretty
        ),
    }
    let outcome = manager
        .install(&selector, &platform, &options, &ctx.confirmer())
        .await?;
    let version = &outcome.version;

    if outcome.already_installed {
        println!("Toolchain {version} is already installed.");
    } else {
        println!("Toolchain {version} installed successfully.");
    }
    if outcome.activated {
        println!("The current toolchain is now {version}.");
    } else if let Some(error) = &outcome.activation_error {
        eprintln!("Warning: {version} could not be made the current toolchain: {error}");
        println!("Run 'swiftly use {version}' to switch to it.");
    } else if !outcome.already_installed {
        println!("Run 'swiftly use {version}' to switch to it.");
    }

    if let Some(script) = &outcome.post_install {
        match &args.post_install_file {
            Some(file) => {
                std::fs::write(file, script).with_context(|| {
                    format!("Failed to write post-install script: {}", file.display())
                })?;
                println!();
                println!(
                    "Some system dependencies are missing. Run {} as root before using this toolchain.",
                    file.display()
                );
            }
            None => {
                println!();
                println!(
                    "There are some system dependencies that should be installed before using this toolchain."
                );
                println!(
                    "Run the following script as the system administrator (e.g. root) to prepare your system:"
                );
                println!();
                println!("{script}");
            }
        }
    }

    let bin_dir = &manager.paths().bin_dir;
    let on_path = std::env::var_os("PATH").is_some_and(|path| path_contains(&path, bin_dir));
    if !on_path {
        println!();
        println!(
            "{} is not on your PATH. Run 'swiftly init' to add it.",
            bin_dir.display()
        );
    }

    Ok(())
}

/// Renders download progress as a single rewritten line.
fn progress_printer() -> ProgressCallback {
    let total = Arc::new(AtomicU64::new(0));
    Arc::new(move |event: ProgressEvent| match event {
        ProgressEvent::Started { url, total: size } => {
            total.store(size.unwrap_or(0), Ordering::Relaxed);
            println!("Downloading {url}");
        }
        ProgressEvent::Progress { downloaded, speed } => {
            let total = total.load(Ordering::Relaxed);
            let speed = format_speed(speed);
            if total > 0 {
                let percent = downloaded.saturating_mul(100) / total;
                print!(
                    "\r{}/{} ({percent}%) {speed}     ",
                    format_bytes(downloaded),
                    format_bytes(total)
                );
            } else {
                print!("\r{} {speed}     ", format_bytes(downloaded));
            }
            let _ = std::io::stdout().flush();
        }
        ProgressEvent::Completed => println!(),
        ProgressEvent::Failed { error } => {
            println!();
            eprintln!("Download failed: {error}");
        }
    })
}
