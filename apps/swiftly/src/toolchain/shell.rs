//! Shell profile setup for `swiftly init`.
//!
//! The proxy and shared bin directories have to be on `PATH` ahead of any
//! system toolchain, proxies first. `init` appends a marked snippet to the
//! login shell's profile:
//!
//! ```bash
//! # Added by swiftly
//! export PATH="/home/me/.local/share/swiftly/proxies:/home/me/.local/share/swiftly/bin:$PATH"
//! ```
//!
//! ```fish
//! # Added by swiftly
//! fish_add_path --move /home/me/.local/share/swiftly/proxies /home/me/.local/share/swiftly/bin
//! ```
//!
//! The marker keeps repeated runs from adding the snippet twice.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const SWIFTLY_MARKER: &str = "# Added by swiftly";

/// Shells whose profiles swiftly knows how to edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
}

impl Shell {
    /// Parses a shell from a path such as `/bin/zsh`.
    #[must_use]
    pub fn from_path(path: &str) -> Option<Self> {
        match Path::new(path.trim()).file_name()?.to_str()? {
            "bash" => Some(Self::Bash),
            "zsh" => Some(Self::Zsh),
            "fish" => Some(Self::Fish),
            _ => None,
        }
    }

    /// Login profiles in order of preference. The first one is created when
    /// none exists.
    #[must_use]
    pub fn profile_candidates(self, home_dir: &Path) -> Vec<PathBuf> {
        match self {
            Self::Bash => vec![
                home_dir.join(".bash_profile"),
                home_dir.join(".bash_login"),
                home_dir.join(".profile"),
            ],
            Self::Zsh => vec![home_dir.join(".zprofile"), home_dir.join(".zshrc")],
            Self::Fish => vec![
                home_dir
                    .join(".config")
                    .join("fish")
                    .join("conf.d")
                    .join("swiftly.fish"),
            ],
        }
    }

    /// The snippet putting `dirs` first on `PATH`, in the given order.
    #[must_use]
    pub fn path_config(self, dirs: &[PathBuf]) -> String {
        let paths = dirs.iter().map(|dir| dir.display().to_string());
        match self {
            Self::Bash | Self::Zsh => {
                let escaped: Vec<String> = paths
                    .map(|path| {
                        path.replace('\\', "\\\\")
                            .replace('$', "\\$")
                            .replace('`', "\\`")
                            .replace('"', "\\\"")
                    })
                    .collect();
                format!(
                    "\n{SWIFTLY_MARKER}\nexport PATH=\"{}:$PATH\"\n",
                    escaped.join(":")
                )
            }
            Self::Fish => {
                let special = [' ', '$', '\\', '\'', '*', '?', '(', ')', '[', ']', '{', '}'];
                let formatted: Vec<String> = paths
                    .map(|path| {
                        if path.contains(special) {
                            format!("'{}'", path.replace('\\', "\\\\").replace('\'', "\\'"))
                        } else {
                            path
                        }
                    })
                    .collect();
                format!(
                    "\n{SWIFTLY_MARKER}\nfish_add_path --move {}\n",
                    formatted.join(" ")
                )
            }
        }
    }

    /// The command that applies the profile to the current session.
    #[must_use]
    pub fn source_command(self, profile_path: &Path) -> String {
        match self {
            Self::Bash | Self::Zsh => format!(". \"{}\"", profile_path.display()),
            Self::Fish => format!("source '{}'", profile_path.display()),
        }
    }
}

/// Outcome of [`configure_profile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigureResult {
    Added {
        profile: PathBuf,
        source_command: String,
    },
    AlreadyConfigured {
        profile: PathBuf,
    },
    /// The login shell is not one swiftly can configure.
    UnsupportedShell {
        shell: String,
    },
}

/// Prepends `dirs` to `PATH` in the profile of the login shell `shell_path`.
///
/// # Errors
///
/// Returns an error if the profile cannot be read or written.
pub fn configure_profile(
    shell_path: &str,
    home_dir: &Path,
    dirs: &[PathBuf],
) -> Result<ConfigureResult> {
    let Some(shell) = Shell::from_path(shell_path) else {
        return Ok(ConfigureResult::UnsupportedShell {
            shell: shell_path.to_string(),
        });
    };

    let candidates = shell.profile_candidates(home_dir);
    let Some(profile) = candidates
        .iter()
        .find(|p| p.exists())
        .or_else(|| candidates.first())
        .cloned()
    else {
        return Ok(ConfigureResult::UnsupportedShell {
            shell: shell_path.to_string(),
        });
    };

    if is_path_configured(&profile)? {
        return Ok(ConfigureResult::AlreadyConfigured { profile });
    }

    append_to_file(&profile, &shell.path_config(dirs))?;
    log::info!("added {} to PATH in {}", display_list(dirs), profile.display());
    Ok(ConfigureResult::Added {
        source_command: shell.source_command(&profile),
        profile,
    })
}

/// Returns `true` if `dir` is one of the entries of `path_var`.
#[must_use]
pub fn path_contains(path_var: &std::ffi::OsStr, dir: &Path) -> bool {
    std::env::split_paths(path_var).any(|entry| entry == dir)
}

fn is_path_configured(profile: &Path) -> Result<bool> {
    match std::fs::read_to_string(profile) {
        Ok(content) => Ok(content.contains(SWIFTLY_MARKER)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read profile: {}", profile.display()))
        }
    }
}

fn append_to_file(path: &Path, content: &str) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open profile for writing: {}", path.display()))?;
    file.write_all(content.as_bytes())
        .with_context(|| format!("Failed to write to profile: {}", path.display()))
}

fn display_list(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|dir| dir.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Human-readable summary of a [`ConfigureResult`].
#[must_use]
pub fn format_result_message(result: &ConfigureResult, dirs: &[PathBuf]) -> String {
    match result {
        ConfigureResult::Added {
            profile,
            source_command,
        } => format!(
            "Added {} to PATH in {}\nRun '{source_command}' or open a new terminal to use it.",
            display_list(dirs),
            profile.display()
        ),
        ConfigureResult::AlreadyConfigured { profile } => {
            format!("PATH already configured in {}", profile.display())
        }
        ConfigureResult::UnsupportedShell { shell } => format!(
            "Cannot configure the profile of {shell}. Add these directories to the front of your PATH, in this order:\n{}",
            dirs.iter()
                .map(|dir| format!("  {}", dir.display()))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shells_parse_from_paths() {
        assert_eq!(Shell::from_path("/bin/bash"), Some(Shell::Bash));
        assert_eq!(Shell::from_path("/usr/local/bin/zsh\n"), Some(Shell::Zsh));
        assert_eq!(Shell::from_path("/usr/bin/fish"), Some(Shell::Fish));
        assert_eq!(Shell::from_path("/bin/tcsh"), None);
        assert_eq!(Shell::from_path(""), None);
    }

    #[test]
    fn bash_snippet_escapes_specials() {
        let config = Shell::Bash.path_config(&[
            PathBuf::from("/home/u/$X/proxies"),
            PathBuf::from("/home/u/`t`/bin"),
        ]);
        assert!(config.contains(SWIFTLY_MARKER));
        assert!(config.contains(r#"export PATH="/home/u/\$X/proxies:/home/u/\`t\`/bin:$PATH""#));
    }

    #[test]
    fn fish_snippet_quotes_when_needed() {
        assert!(
            Shell::Fish
                .path_config(&[PathBuf::from("/home/u/proxies"), PathBuf::from("/home/u/bin")])
                .contains("fish_add_path --move /home/u/proxies /home/u/bin")
        );
        assert!(
            Shell::Fish
                .path_config(&[PathBuf::from("/home/u/it's here/bin")])
                .contains(r"fish_add_path --move '/home/u/it\'s here/bin'")
        );
    }

    #[test]
    fn existing_profile_is_preferred_and_edited_once() {
        let home = tempfile::tempdir().unwrap();
        std::fs::write(home.path().join(".profile"), "umask 022\n").unwrap();
        let dirs = [PathBuf::from("/opt/swiftly/proxies"), PathBuf::from("/opt/swiftly/bin")];

        let first = configure_profile("/bin/bash", home.path(), &dirs).unwrap();
        assert!(matches!(
            &first,
            ConfigureResult::Added { profile, .. } if *profile == home.path().join(".profile")
        ));

        let second = configure_profile("/bin/bash", home.path(), &dirs).unwrap();
        assert_eq!(
            second,
            ConfigureResult::AlreadyConfigured {
                profile: home.path().join(".profile")
            }
        );

        let content = std::fs::read_to_string(home.path().join(".profile")).unwrap();
        assert!(content.starts_with("umask 022\n"));
        assert_eq!(content.matches(SWIFTLY_MARKER).count(), 1);
        assert!(content.contains("/opt/swiftly/proxies:/opt/swiftly/bin:$PATH"));
    }

    #[test]
    fn missing_profile_is_created() {
        let home = tempfile::tempdir().unwrap();
        let result =
            configure_profile("/usr/bin/fish", home.path(), &[PathBuf::from("/b")]).unwrap();

        let expected = home.path().join(".config/fish/conf.d/swiftly.fish");
        assert!(matches!(result, ConfigureResult::Added { ref profile, .. } if *profile == expected));
        assert!(expected.is_file());
    }

    #[test]
    fn unsupported_shell_changes_nothing() {
        let home = tempfile::tempdir().unwrap();
        let dirs = [PathBuf::from("/p"), PathBuf::from("/b")];
        let result = configure_profile("/bin/tcsh", home.path(), &dirs).unwrap();
        assert!(matches!(result, ConfigureResult::UnsupportedShell { .. }));
        assert!(
            format_result_message(&result, &dirs).ends_with("in this order:\n  /p\n  /b")
        );
    }

    #[test]
    fn path_contains_checks_entries() {
        let path = std::env::join_paths(["/usr/bin", "/opt/swiftly/bin"]).unwrap();
        assert!(path_contains(&path, Path::new("/opt/swiftly/bin")));
        assert!(!path_contains(&path, Path::new("/opt/swiftly")));
    }
}
