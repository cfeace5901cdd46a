//! Doctor command for the swiftly CLI.
//!
//! Verifies the health of the swiftly installation and suggests fixes.
//!
//! ## Usage
//!
//! ```bash
//! swiftly doctor
//! ```

use anyhow::Result;

use crate::context::SwiftlyContext;
use crate::toolchain::doctor::{DoctorCheckStatus, run_all_checks};

/// Executes the doctor command.
///
/// # Errors
///
/// Never fails; problems are reported as check results.
#[allow(clippy::unnecessary_wraps, clippy::unused_async)]
pub async fn execute(ctx: &SwiftlyContext) -> Result<()> {
    println!("Checking swiftly installation...");
    println!();

    let path = std::env::var_os("PATH");
    let checks = run_all_checks(&ctx.manager, path.as_deref());

    let mut has_errors = false;
    let mut has_warnings = false;

    for check in &checks {
        println!("  {} {}: {}", check.prefix(), check.name, check.message);
        match check.status {
            DoctorCheckStatus::Ok => {}
            DoctorCheckStatus::Warning => has_warnings = true,
            DoctorCheckStatus::Error => has_errors = true,
        }
    }

    println!();

    if has_errors {
        println!("Some checks failed. See the suggestions above.");
    } else if has_warnings {
        println!("Some warnings were found. Toolchains may work but could pick the wrong executables.");
    } else {
        println!("All checks passed.");
    }

    Ok(())
}
