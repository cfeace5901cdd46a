#![warn(clippy::pedantic)]

//! # swiftly
//!
//! Installs Swift toolchains side by side and switches between them.
//!
//! ## Subcommands
//!
//! - `init` - Record the platform and put the shared bin directory on `PATH`
//! - `install` - Install a toolchain
//! - `uninstall` - Remove toolchains
//! - `use` - Switch or show the toolchain in use
//! - `list` - List installed toolchains
//! - `list-available` - List toolchains in the remote catalog
//! - `doctor` - Check installation health
//!
//! ## Proxy Mode
//!
//! When the binary is invoked through a link named after a toolchain
//! executable (`swift`, `swiftc`, `clang`, `sourcekit-lsp`, ...), it selects
//! a toolchain and replaces itself with that executable. The toolchain comes
//! from a `+<selector>` argument, the nearest `.swift-version` file, or the
//! toolchain in use, in that order:
//!
//! ```bash
//! swift build                # toolchain in use or .swift-version
//! swift +5.9 build           # newest installed 5.9.x, installed on demand
//! ```
//!
//! ## Examples
//!
//! ```bash
//! swiftly install latest
//! swiftly use 5.10
//! swiftly list
//! ```

mod commands;
mod context;
mod errors;
mod logging;
mod toolchain;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{doctor, init, install, list, list_available, uninstall, use_cmd};
use context::SwiftlyContext;
use errors::SwiftlyError;
use std::ffi::OsString;
use toolchain::proxy::{ProxyArgs, exec_toolchain_binary, proxied_name, select_toolchain};

/// Swift toolchain version manager.
#[derive(Parser)]
#[command(
    name = "swiftly",
    author,
    version,
    about = "Install and switch between Swift toolchains",
    after_help = "\
TOOLCHAIN SELECTORS:
    5.9.2, 5.9, 5                   Stable releases, newest match wins
    latest                          Newest stable release
    main-snapshot[-YYYY-MM-DD]      Snapshots of the main branch
    5.10-snapshot[-YYYY-MM-DD]      Snapshots of a release branch

ENVIRONMENT VARIABLES:
    SWIFTLY_HOME_DIR            Home directory holding config.json
    SWIFTLY_BIN_DIR             Shared bin directory (default: $SWIFTLY_HOME_DIR/bin)
    SWIFTLY_TOOLCHAINS_DIR      Toolchain install directory
    SWIFTLY_PLATFORM            Platform override (e.g. ubuntu2204)
    SWIFTLY_CATALOG_SERVER      Catalog server (default: https://www.swift.org)
    SWIFTLY_DOWNLOAD_SERVER     Download server (default: https://download.swift.org)"
)]
pub struct Cli {
    /// Answer yes to every confirmation.
    #[clap(short = 'y', long = "assume-yes", global = true)]
    pub assume_yes: bool,

    /// Log debug output to stderr.
    #[clap(long, global = true)]
    pub verbose: bool,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for the swiftly CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Prepare swiftly for use.
    ///
    /// Detects and records the platform, creates the swiftly directories and
    /// adds the shared bin directory to the login shell's profile.
    Init(init::InitArgs),

    /// Install a toolchain.
    ///
    /// Installs the newest toolchain matching the selector. Without a
    /// selector, installs the latest stable release.
    Install(install::InstallArgs),

    /// Uninstall toolchains.
    ///
    /// Removes every installed toolchain matching the selector.
    Uninstall(uninstall::UninstallArgs),

    /// Set or show the toolchain in use.
    Use(use_cmd::UseArgs),

    /// List installed toolchains.
    List(list::ListArgs),

    /// List toolchains available for this platform.
    ListAvailable(list_available::ListAvailableArgs),

    /// Check installation health.
    ///
    /// Verifies the configuration, the installed toolchains and PATH setup
    /// and suggests how to fix any problem found.
    Doctor,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let exit_code = handle_error(&e);
        std::process::exit(exit_code);
    }
}

/// Handles an error and returns the appropriate exit code.
///
/// For `ProcessExitCode` errors, returns the embedded exit code without
/// printing an error message (the subprocess already printed its output).
/// For all other errors, prints the error and returns exit code 1.
fn handle_error(e: &anyhow::Error) -> i32 {
    if let Some(SwiftlyError::ProcessExitCode { code }) = e.downcast_ref::<SwiftlyError>() {
        return *code;
    }
    eprintln!("Error: {e:?}");
    1
}

async fn run() -> Result<()> {
    let mut args = std::env::args_os();
    if let Some(name) = args.next().as_deref().and_then(proxied_name) {
        logging::init(false);
        return run_proxy(name, args).await;
    }

    let cli = Cli::parse();
    logging::init(cli.verbose);
    let ctx = SwiftlyContext::from_env(cli.assume_yes, cli.verbose)?;

    match cli.command {
        Commands::Init(args) => init::execute(&ctx, &args).await,
        Commands::Install(args) => install::execute(&ctx, &args).await,
        Commands::Uninstall(args) => uninstall::execute(&ctx, &args).await,
        Commands::Use(args) => use_cmd::execute(&ctx, &args).await,
        Commands::List(args) => list::execute(&ctx, &args).await,
        Commands::ListAvailable(args) => list_available::execute(&ctx, &args).await,
        Commands::Doctor => doctor::execute(&ctx).await,
    }
}

/// Runs a proxied toolchain executable such as `swift`.
async fn run_proxy(name: &str, args: impl Iterator<Item = OsString>) -> Result<()> {
    let proxy = ProxyArgs::parse(args)?;
    let ctx = SwiftlyContext::from_env(false, false)?;
    let cwd = std::env::current_dir().context("Failed to determine the current directory")?;

    let (version, source) = select_toolchain(
        &ctx.manager,
        proxy.selector.as_deref(),
        &cwd,
        ctx.platform_override(),
        &ctx.confirmer(),
    )
    .await?;
    log::debug!("running {name} from {version} ({source:?})");

    exec_toolchain_binary(&ctx.manager, &version, name, &proxy.args)
}
