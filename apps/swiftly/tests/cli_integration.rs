#![warn(clippy::pedantic)]

//! Integration tests for the swiftly CLI.
//!
//! These tests spawn the compiled `swiftly` binary and check its stdout,
//! stderr and exit codes.
//!
//! ## Test Strategy
//!
//! 1. **Help**: subcommands and options are listed
//! 2. **Empty state**: `list`, `use`, `doctor` and `uninstall` on a fresh home
//! 3. **Network failures**: `install` and `list-available` against an
//!    unreachable catalog fail with an error, never a panic
//! 4. **Installed state** (Linux): a toolchain laid out on disk and
//!    registered in `config.json` is listed, used and uninstalled
//! 5. **Proxy mode** (Linux): `init` links the proxied names to the binary,
//!    and the `swift` alias runs the selected toolchain's `swift`
//!
//! ## Test Infrastructure
//!
//! - Uses `assert_cmd` for spawning and asserting on command execution
//! - Uses `assert_fs` for temporary filesystem operations
//! - Uses `predicates` for flexible output matching
//!
//! Every run is isolated through `SWIFTLY_HOME_DIR`, `SWIFTLY_BIN_DIR` and
//! `SWIFTLY_TOOLCHAINS_DIR` pointing into a temporary directory.

use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use predicates::prelude::*;
use std::process::Command;

/// An unroutable catalog and download server.
const UNREACHABLE_SERVER: &str = "http://127.0.0.1:1";

/// Builds a `swiftly` command isolated to `home`.
fn swiftly(home: &assert_fs::TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("swiftly"));
    cmd.env("SWIFTLY_HOME_DIR", home.path())
        .env("SWIFTLY_BIN_DIR", home.path().join("bin"))
        .env("SWIFTLY_TOOLCHAINS_DIR", home.path().join("toolchains"))
        .env("SWIFTLY_PLATFORM", "ubuntu2204")
        .env("SWIFTLY_CATALOG_SERVER", UNREACHABLE_SERVER)
        .env("SWIFTLY_DOWNLOAD_SERVER", UNREACHABLE_SERVER)
        .current_dir(home.path());
    cmd
}

// -----------------------------------------------------------------------------
// Help
// -----------------------------------------------------------------------------

#[test]
fn help_shows_available_commands() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("swiftly"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("uninstall"))
        .stdout(predicate::str::contains("list-available"))
        .stdout(predicate::str::contains("use"))
        .stdout(predicate::str::contains("doctor"))
        .stdout(predicate::str::contains("SWIFTLY_HOME_DIR"));
}

#[test]
fn install_help_shows_options() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("swiftly"));
    cmd.arg("install").arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("SELECTOR"))
        .stdout(predicate::str::contains("--use"))
        .stdout(predicate::str::contains("--post-install-file"));
}

// -----------------------------------------------------------------------------
// Empty state
// -----------------------------------------------------------------------------

#[test]
fn list_shows_no_toolchains_message() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No toolchains installed"));
}

#[test]
fn list_rejects_invalid_selector() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("list")
        .arg("not-a-version")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid toolchain selector"));
}

#[test]
fn uninstall_nonexistent_shows_message() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("uninstall")
        .arg("5.9.9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn use_without_toolchains_reports_none() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("use")
        .assert()
        .success()
        .stdout(predicate::str::contains("No toolchain is in use"));
}

#[test]
fn use_unknown_toolchain_fails() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("use")
        .arg("5.9")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not installed"));
}

#[test]
fn doctor_runs_on_fresh_home() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checking swiftly installation"))
        .stdout(predicate::str::contains("Configuration"))
        .stdout(predicate::str::contains("PATH"));
}

// -----------------------------------------------------------------------------
// Network failures
// -----------------------------------------------------------------------------

#[test]
fn install_without_network_shows_error() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("install")
        .arg("5.9.2")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn list_available_without_network_shows_error() {
    let home = assert_fs::TempDir::new().unwrap();

    swiftly(&home)
        .arg("list-available")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

// -----------------------------------------------------------------------------
// Installed state and proxy mode
// -----------------------------------------------------------------------------

#[cfg(target_os = "linux")]
mod installed {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Lays out `swift-5.9.2-RELEASE` with a `swift` script that echoes its
    /// arguments, and registers it in `config.json`.
    fn install_fake_toolchain(home: &assert_fs::TempDir) {
        let swift = home
            .child("toolchains/swift-5.9.2-RELEASE/usr/bin/swift");
        swift
            .write_str("#!/bin/sh\necho \"fake swift 5.9.2 $*\"\n")
            .unwrap();
        std::fs::set_permissions(swift.path(), std::fs::Permissions::from_mode(0o755)).unwrap();

        home.child("config.json")
            .write_str(r#"{"version":"1","installedToolchains":["5.9.2"]}"#)
            .unwrap();
    }

    #[test]
    fn use_links_the_toolchain_and_list_marks_it() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);

        swiftly(&home)
            .arg("use")
            .arg("5.9")
            .assert()
            .success()
            .stdout(predicate::str::contains("The current toolchain is now 5.9.2"));

        let link = home.child("bin/swift");
        assert_eq!(
            std::fs::read_link(link.path()).unwrap(),
            home.path()
                .join("toolchains/swift-5.9.2-RELEASE/usr/bin/swift")
        );

        swiftly(&home)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("5.9.2 (in use)"));

        swiftly(&home)
            .arg("use")
            .assert()
            .success()
            .stdout(predicate::str::contains("5.9.2 (default)"));
    }

    #[test]
    fn uninstall_requires_confirmation_without_a_terminal() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);

        swiftly(&home)
            .arg("uninstall")
            .arg("5.9.2")
            .assert()
            .failure()
            .stderr(predicate::str::contains("aborted"));

        home.child("toolchains/swift-5.9.2-RELEASE")
            .assert(predicate::path::is_dir());
    }

    #[test]
    fn uninstall_with_assume_yes_removes_the_toolchain() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);
        swiftly(&home).arg("use").arg("5.9.2").assert().success();

        swiftly(&home)
            .arg("-y")
            .arg("uninstall")
            .arg("5.9")
            .assert()
            .success()
            .stdout(predicate::str::contains("1 toolchain(s) uninstalled"));

        home.child("toolchains/swift-5.9.2-RELEASE")
            .assert(predicate::path::missing());
        home.child("bin/swift").assert(predicate::path::missing());

        swiftly(&home)
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No toolchains installed"));
    }

    #[test]
    fn init_links_the_proxy_aliases() {
        let home = assert_fs::TempDir::new().unwrap();

        swiftly(&home)
            .arg("init")
            .arg("--no-modify-profile")
            .assert()
            .success()
            .stdout(predicate::str::contains("15 alias(es) created"))
            .stdout(predicate::str::contains(
                home.path().join("proxies").display().to_string(),
            ));

        let swiftly_bin = std::fs::canonicalize(assert_cmd::cargo::cargo_bin!("swiftly")).unwrap();
        for name in ["swift", "swiftc", "clang", "sourcekit-lsp"] {
            let alias = home.child("proxies").child(name);
            assert_eq!(std::fs::canonicalize(alias.path()).unwrap(), swiftly_bin);
        }

        swiftly(&home)
            .arg("init")
            .arg("--no-modify-profile")
            .assert()
            .success()
            .stdout(predicate::str::contains("0 alias(es) created"));
    }

    /// Runs `init`, then returns a command for the `swift` alias it created.
    fn proxy(home: &assert_fs::TempDir) -> Command {
        swiftly(home)
            .arg("init")
            .arg("--no-modify-profile")
            .assert()
            .success();
        let link = home.child("proxies/swift");

        let mut cmd = Command::new(link.path());
        cmd.env("SWIFTLY_HOME_DIR", home.path())
            .env("SWIFTLY_BIN_DIR", home.path().join("bin"))
            .env("SWIFTLY_TOOLCHAINS_DIR", home.path().join("toolchains"))
            .env("SWIFTLY_PLATFORM", "ubuntu2204")
            .env("SWIFTLY_CATALOG_SERVER", UNREACHABLE_SERVER)
            .env("SWIFTLY_DOWNLOAD_SERVER", UNREACHABLE_SERVER)
            .current_dir(home.path());
        cmd
    }

    #[test]
    fn proxy_runs_the_toolchain_in_use() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);
        swiftly(&home).arg("use").arg("5.9.2").assert().success();

        proxy(&home)
            .arg("build")
            .arg("-c")
            .arg("release")
            .assert()
            .success()
            .stdout(predicate::str::contains("fake swift 5.9.2 build -c release"));
    }

    #[test]
    fn proxy_honours_selector_argument() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);

        proxy(&home)
            .arg("+5.9")
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("fake swift 5.9.2 --version"));
    }

    #[test]
    fn proxy_honours_swift_version_file() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);
        home.child(".swift-version").write_str("5.9.2\n").unwrap();
        let project = home.child("project/Sources");
        project.create_dir_all().unwrap();

        proxy(&home)
            .current_dir(project.path())
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("fake swift 5.9.2 --version"));
    }

    #[test]
    fn proxy_rejects_two_selectors() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);

        proxy(&home)
            .arg("+5.9")
            .arg("+5.10")
            .assert()
            .failure()
            .stderr(predicate::str::contains("More than one toolchain selector"));
    }

    #[test]
    fn proxy_without_any_toolchain_fails() {
        let home = assert_fs::TempDir::new().unwrap();

        proxy(&home)
            .arg("--version")
            .assert()
            .failure()
            .stderr(predicate::str::contains("No swift toolchain could be determined"));
    }

    #[test]
    fn proxy_propagates_the_exit_code() {
        let home = assert_fs::TempDir::new().unwrap();
        install_fake_toolchain(&home);
        home.child("toolchains/swift-5.9.2-RELEASE/usr/bin/swift")
            .write_str("#!/bin/sh\nexit 3\n")
            .unwrap();

        proxy(&home).arg("+5.9.2").assert().code(3);
    }
}
