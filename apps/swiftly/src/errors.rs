//! Error types for the swiftly CLI.
//!
//! Core modules return `anyhow::Result` and attach context describing the
//! operation and the paths or URLs involved. When a failure belongs to one of
//! the well-known categories below, it is raised as a `SwiftlyError` so that
//! callers (and tests) can recover the category with `downcast_ref`.

use std::path::PathBuf;
use thiserror::Error;

/// Consolidated error type for swiftly operations.
#[derive(Debug, Error)]
pub enum SwiftlyError {
    /// A version or selector string could not be parsed.
    #[error("invalid toolchain selector \"{input}\": {reason}")]
    ParseError {
        /// The rejected input.
        input: String,
        /// Why the input was rejected.
        reason: String,
    },

    /// The toolchain is not present in the installed set.
    #[error("toolchain {version} is not installed")]
    NotInstalled {
        /// Name of the missing toolchain.
        version: String,
    },

    /// The toolchain is already present in the installed set.
    #[error("toolchain {version} is already installed")]
    AlreadyInstalled {
        /// Name of the duplicate toolchain.
        version: String,
    },

    /// The remote catalog could not be reached or answered with a non-2xx status.
    #[error("toolchain catalog unavailable at {url}: {}", describe_status(.status, .body))]
    CatalogUnavailable {
        /// The catalog URL.
        url: String,
        /// HTTP status, when the server answered at all.
        status: Option<u16>,
        /// Response body or transport error description.
        body: String,
    },

    /// The remote catalog answered with a body that is not the expected JSON.
    #[error("toolchain catalog at {url} is malformed: {message}")]
    CatalogMalformed {
        /// The catalog URL.
        url: String,
        /// Decoder error message.
        message: String,
    },

    /// Neither the installed set nor the remote catalog has a match.
    #[error("no toolchain matching {selector} is available")]
    NoMatchingToolchain {
        /// The selector that matched nothing.
        selector: String,
    },

    /// Transport failure while downloading a toolchain archive.
    #[error("download of {url} failed: {message}")]
    DownloadFailed {
        /// The archive URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The archive URL answered 404.
    #[error("toolchain archive not found at {url}")]
    DownloadNotFound {
        /// The archive URL.
        url: String,
    },

    /// Signature or checksum verification of a downloaded archive failed.
    #[error("signature verification failed: {message}")]
    SignatureVerificationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Extraction or placement of a toolchain failed.
    #[error("installation of {version} failed: {message}")]
    InstallFailed {
        /// Name of the toolchain being installed.
        version: String,
        /// Description of the failure.
        message: String,
    },

    /// A managed link in the shared bin directory points outside the toolchain it belongs to.
    #[error(
        "{} does not point into the toolchain being deactivated (found {}); \
         remove or restore it manually",
        .link.display(),
        .target.display()
    )]
    ForeignSymlinkDetected {
        /// The link in the shared bin directory.
        link: PathBuf,
        /// Where the link actually resolves.
        target: PathBuf,
    },

    /// A registered toolchain has no binary directory on disk.
    #[error(
        "toolchain {version} is registered but {} is missing; reinstall it with 'swiftly install {version}'",
        .path.display()
    )]
    ToolchainBinDirMissing {
        /// Name of the toolchain.
        version: String,
        /// The expected binary directory.
        path: PathBuf,
    },

    /// A destructive step needed confirmation that was not given.
    #[error("aborted: {action}")]
    ConfirmationDeclined {
        /// The action that was not confirmed.
        action: String,
    },

    /// An external program (or a proxied toolchain binary) exited with a non-zero code.
    ///
    /// The exit code is propagated to the parent process without printing an
    /// additional message.
    #[error("process exited with code {code}")]
    ProcessExitCode {
        /// The exit code from the subprocess.
        code: i32,
    },
}

#[allow(clippy::ref_option)]
fn describe_status(status: &Option<u16>, body: &str) -> String {
    match *status {
        Some(code) if body.is_empty() => format!("HTTP {code}"),
        Some(code) => format!("HTTP {code}: {body}"),
        None => body.to_string(),
    }
}

impl SwiftlyError {
    /// Creates a new `ParseError`.
    #[must_use]
    pub fn parse_error(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ParseError {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `NotInstalled` error.
    #[must_use]
    pub fn not_installed(version: impl Into<String>) -> Self {
        Self::NotInstalled {
            version: version.into(),
        }
    }

    /// Creates a new `AlreadyInstalled` error.
    #[must_use]
    pub fn already_installed(version: impl Into<String>) -> Self {
        Self::AlreadyInstalled {
            version: version.into(),
        }
    }

    /// Creates a new `CatalogUnavailable` error.
    #[must_use]
    pub fn catalog_unavailable(
        url: impl Into<String>,
        status: Option<u16>,
        body: impl Into<String>,
    ) -> Self {
        Self::CatalogUnavailable {
            url: url.into(),
            status,
            body: body.into(),
        }
    }

    /// Creates a new `CatalogMalformed` error.
    #[must_use]
    pub fn catalog_malformed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CatalogMalformed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `NoMatchingToolchain` error.
    #[must_use]
    pub fn no_matching_toolchain(selector: impl Into<String>) -> Self {
        Self::NoMatchingToolchain {
            selector: selector.into(),
        }
    }

    /// Creates a new `DownloadFailed` error.
    #[must_use]
    pub fn download_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a new `DownloadNotFound` error.
    #[must_use]
    pub fn download_not_found(url: impl Into<String>) -> Self {
        Self::DownloadNotFound { url: url.into() }
    }

    /// Creates a new `SignatureVerificationFailed` error.
    #[must_use]
    pub fn signature_verification_failed(message: impl Into<String>) -> Self {
        Self::SignatureVerificationFailed {
            message: message.into(),
        }
    }

    /// Creates a new `InstallFailed` error.
    #[must_use]
    pub fn install_failed(version: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InstallFailed {
            version: version.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ForeignSymlinkDetected` error.
    #[must_use]
    pub fn foreign_symlink(link: PathBuf, target: PathBuf) -> Self {
        Self::ForeignSymlinkDetected { link, target }
    }

    /// Creates a new `ToolchainBinDirMissing` error.
    #[must_use]
    pub fn bin_dir_missing(version: impl Into<String>, path: PathBuf) -> Self {
        Self::ToolchainBinDirMissing {
            version: version.into(),
            path,
        }
    }

    /// Creates a new `ConfirmationDeclined` error.
    #[must_use]
    pub fn confirmation_declined(action: impl Into<String>) -> Self {
        Self::ConfirmationDeclined {
            action: action.into(),
        }
    }

    /// Creates a new `ProcessExitCode` error.
    #[must_use]
    pub const fn process_exit_code(code: i32) -> Self {
        Self::ProcessExitCode { code }
    }
}
