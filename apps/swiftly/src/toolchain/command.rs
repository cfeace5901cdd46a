//! External program invocations.
//!
//! Every tool swiftly shells out to has a small builder here that produces a
//! [`SystemCommand`]: a program name plus an argument vector. Builders never
//! concatenate strings for the shell, and their argument vectors are checked
//! in the tests below.
//!
//! ## Usage
//!
//! ```ignore
//! Pkgutil::forget(&home, "org.swift.592").run().await?;
//! let shell = Getent::passwd("alice").output().await?;
//! ```

use crate::errors::SwiftlyError;
use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::Path;
use std::process::Stdio;

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemCommand {
    program: OsString,
    args: Vec<OsString>,
    quiet: bool,
}

impl SystemCommand {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            quiet: false,
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Discards the program's standard output when run with [`run`](Self::run).
    #[must_use]
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Program followed by arguments, lossily converted to UTF-8.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(&self.program)
            .chain(&self.args)
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    fn to_tokio(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Runs the program with inherited standard error.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, or `ProcessExitCode`
    /// if it exits unsuccessfully.
    pub async fn run(&self) -> Result<()> {
        log::debug!("running {self}");
        let mut command = self.to_tokio();
        if self.quiet {
            command.stdout(Stdio::null());
        }
        let status = command
            .status()
            .await
            .with_context(|| format!("Failed to run {self}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(anyhow::Error::from(SwiftlyError::process_exit_code(
                status.code().unwrap_or(1),
            ))
            .context(format!("{self} failed")))
        }
    }

    /// Runs the program and returns its standard output.
    ///
    /// # Errors
    ///
    /// Returns an error if the program cannot be started, or `ProcessExitCode`
    /// (with its standard error as context) if it exits unsuccessfully.
    pub async fn output(&self) -> Result<String> {
        log::debug!("running {self}");
        let output = self
            .to_tokio()
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {self}"))?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(anyhow::Error::from(SwiftlyError::process_exit_code(
                output.status.code().unwrap_or(1),
            ))
            .context(format!("{self} failed: {}", stderr.trim())))
        }
    }

    /// Runs the program silently and reports whether it succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error only if the program cannot be started.
    pub async fn succeeds(&self) -> Result<bool> {
        let status = self
            .to_tokio()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .with_context(|| format!("Failed to run {self}"))?;
        Ok(status.success())
    }
}

impl fmt::Display for SystemCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`", self.argv().join(" "))
    }
}

/// `tar`
pub struct Tar;

impl Tar {
    /// Extracts `archive` into `dir`.
    pub fn extract(archive: &Path, dir: &Path) -> SystemCommand {
        SystemCommand::new("tar")
            .arg("-C")
            .arg(dir)
            .arg("-x")
            .arg("-f")
            .arg(archive)
    }
}

/// `pkgutil`
pub struct Pkgutil;

impl Pkgutil {
    pub fn check_signature(pkg: &Path) -> SystemCommand {
        SystemCommand::new("pkgutil")
            .arg("--check-signature")
            .arg(pkg)
    }

    pub fn expand(pkg: &Path, dest: &Path) -> SystemCommand {
        SystemCommand::new("pkgutil").arg("--expand").arg(pkg).arg(dest)
    }

    pub fn forget(volume: &Path, package_id: &str) -> SystemCommand {
        SystemCommand::new("pkgutil")
            .arg("--volume")
            .arg(volume)
            .arg("--forget")
            .arg(package_id)
    }
}

/// `installer`
pub struct Installer;

impl Installer {
    /// Installs a package into the current user's home directory.
    pub fn install_for_user(pkg: &Path, verbose: bool) -> SystemCommand {
        let command = SystemCommand::new("installer")
            .arg("-pkg")
            .arg(pkg)
            .args(["-target", "CurrentUserHomeDirectory"]);
        if verbose {
            command.arg("-verbose")
        } else {
            command.quiet(true)
        }
    }
}

/// `gpg`
pub struct Gpg;

impl Gpg {
    pub fn import(keys: &Path) -> SystemCommand {
        SystemCommand::new("gpg").arg("--import").arg(keys).quiet(true)
    }

    pub fn verify(signature: &Path, file: &Path) -> SystemCommand {
        SystemCommand::new("gpg")
            .arg("--verify")
            .arg(signature)
            .arg(file)
            .quiet(true)
    }
}

/// `dscl`
pub struct Dscl;

impl Dscl {
    /// Reads the login shell recorded for the user whose home is `home`.
    pub fn read_user_shell(home: &Path) -> SystemCommand {
        SystemCommand::new("dscl")
            .arg(".")
            .arg("-read")
            .arg(home)
            .arg("UserShell")
    }
}

/// `getent`
pub struct Getent;

impl Getent {
    pub fn passwd(user: &str) -> SystemCommand {
        SystemCommand::new("getent").args(["passwd", user])
    }
}

/// `PlistBuddy`
pub struct PlistBuddy;

impl PlistBuddy {
    const PATH: &'static str = "/usr/libexec/PlistBuddy";

    pub fn print(plist: &Path, key: &str) -> SystemCommand {
        SystemCommand::new(Self::PATH)
            .arg("-c")
            .arg(format!("Print {key}"))
            .arg(plist)
    }
}

/// `dpkg-query`
pub struct DpkgQuery;

impl DpkgQuery {
    /// Succeeds when `package` is known to dpkg.
    pub fn installed(package: &str) -> SystemCommand {
        SystemCommand::new("dpkg-query").args(["-W", package])
    }
}

/// `rpm`
pub struct Rpm;

impl Rpm {
    /// Succeeds when `package` is installed.
    pub fn installed(package: &str) -> SystemCommand {
        SystemCommand::new("rpm").args(["-q", package])
    }
}

/// Extracts the login shell from a `getent passwd` line.
#[must_use]
pub fn shell_from_passwd(line: &str) -> Option<String> {
    line.trim_end()
        .rsplit(':')
        .next()
        .filter(|s| s.starts_with('/'))
        .map(str::to_string)
}

/// Extracts the login shell from `dscl . -read <home> UserShell` output.
#[must_use]
pub fn shell_from_dscl(output: &str) -> Option<String> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("UserShell:"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
