//! Command modules for the swiftly CLI.
//!
//! Each module parses its arguments, calls into [`crate::toolchain`] and
//! prints the result.
//!
//! - [`init`] - Record the platform and set up `PATH`
//! - [`install`] - Install a toolchain
//! - [`uninstall`] - Remove toolchains
//! - [`use_cmd`] - Switch or show the toolchain in use
//! - [`list`] - List installed toolchains
//! - [`list_available`] - List toolchains in the remote catalog
//! - [`doctor`] - Check installation health

pub mod doctor;
pub mod init;
pub mod install;
pub mod list;
pub mod list_available;
pub mod uninstall;
pub mod use_cmd;

use crate::toolchain::version::{Branch, ToolchainSelector};

/// Heading describing what a listing filtered by `selector` contains,
/// e.g. `Installed Swift 5.9 release toolchains`.
pub(crate) fn listing_heading(prefix: &str, selector: &ToolchainSelector) -> String {
    let modifier = match selector {
        ToolchainSelector::Latest => "release".to_string(),
        ToolchainSelector::Stable {
            major,
            minor: Some(minor),
            patch: None,
        } => format!("Swift {major}.{minor} release"),
        ToolchainSelector::Stable {
            major,
            minor: None,
            ..
        } => format!("Swift {major} release"),
        ToolchainSelector::Snapshot {
            branch: Branch::Main,
            date: None,
        } => "main development snapshot".to_string(),
        ToolchainSelector::Snapshot {
            branch: Branch::Release { major, minor },
            date: None,
        } => format!("{major}.{minor} development snapshot"),
        _ => "matching".to_string(),
    };
    format!("{prefix} {modifier} toolchains")
}

/// Prints `heading` underlined with dashes.
pub(crate) fn print_heading(heading: &str) {
    println!("{heading}");
    println!("{}", "-".repeat(heading.len()));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heading(selector: &str) -> String {
        listing_heading("Installed", &selector.parse().unwrap())
    }

    #[test]
    fn headings_describe_the_selector() {
        assert_eq!(heading("5.9"), "Installed Swift 5.9 release toolchains");
        assert_eq!(heading("5"), "Installed Swift 5 release toolchains");
        assert_eq!(heading("5.9.2"), "Installed matching toolchains");
        assert_eq!(
            heading("main-snapshot"),
            "Installed main development snapshot toolchains"
        );
        assert_eq!(
            heading("5.10-snapshot"),
            "Installed 5.10 development snapshot toolchains"
        );
        assert_eq!(heading("latest"), "Installed release toolchains");
    }
}
