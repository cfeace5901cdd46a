//! Terminal logging setup.
//!
//! Core modules log through the `log` facade. Output goes to stderr so it
//! never mixes with command output or a proxied toolchain's stdout.

use simplelog::{ColorChoice, ConfigBuilder, LevelFilter, TermLogger, TerminalMode};

/// Installs the stderr logger. `Warn` by default, `Debug` when `verbose`.
///
/// A second call is a no-op.
pub fn init(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let config = ConfigBuilder::new()
        .add_filter_allow_str("swiftly")
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();

    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}
