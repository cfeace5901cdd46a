//! Toolchain management for the swiftly CLI.
//!
//! Everything here is free of terminal output. Commands in
//! [`crate::commands`] drive these modules and do the printing.
//!
//! ## Module Structure
//!
//! - [`version`] - Toolchain versions and selectors
//! - [`paths`] - Home, shared bin and toolchains directories
//! - [`config`] - `config.json` model and locked persistence
//! - [`registry`] - Installed set and in-use pointer
//! - [`http`] / [`download`] - HTTP seam and its reqwest implementation
//! - [`catalog`] - Remote release and snapshot listings
//! - [`platform`], [`linux`], [`macos`] - OS-specific install steps
//! - [`command`] - External tool invocations
//! - [`archive`] / [`verify`] - Extraction and checksums
//! - [`install`] - Install and uninstall state machine
//! - [`activation`] - Shared bin links for the in-use toolchain
//! - [`proxy`] - Toolchain selection for proxied executables
//! - [`shell`] - Shell profile editing
//! - [`doctor`] - Installation health checks

pub mod activation;
pub mod archive;
pub mod catalog;
pub mod command;
pub mod config;
pub mod doctor;
pub mod download;
pub mod http;
pub mod install;
pub mod linux;
pub mod macos;
pub mod paths;
pub mod platform;
pub mod proxy;
pub mod registry;
pub mod shell;
pub mod verify;
pub mod version;

pub use install::{InstallOptions, ToolchainManager};
pub use paths::SwiftlyPaths;
pub use version::{ToolchainSelector, ToolchainVersion};
