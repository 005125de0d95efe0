//! Remote process types and the command-to-program-spec builders.
//!
//! Two ways to describe a command:
//!
//! - [`GuestCommand::Shell`]: a single string. The first space-delimited
//!   token is the program path and the rest is passed verbatim as the
//!   argument string, followed by `1> <stdout> 2> <stderr>`. This relies on
//!   the guest launcher interpreting redirection, and arguments containing
//!   spaces or quotes cannot be expressed safely.
//! - [`GuestCommand::Argv`]: an argument vector, quoted for the guest family
//!   and run through the guest's own shell so redirection always works.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::error::{GuestOpsError, Result};
use crate::domain::guest::GuestFamily;

// ── Constants ────────────────────────────────────────────────────────────────

/// Suffix of the temporary files used to capture process output.
pub const TEMP_FILE_SUFFIX: &str = ".file";

/// Default delay between two process-list polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const POSIX_SHELL: &str = "/bin/sh";
const WINDOWS_SHELL: &str = "cmd.exe";

// ── Value types ──────────────────────────────────────────────────────────────

/// A command to run in the guest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestCommand {
    Shell(String),
    Argv(Vec<String>),
}

/// Which captured stream a temporary guest file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempFileRole {
    Stdout,
    Stderr,
}

impl TempFileRole {
    /// Prefix passed to the guest when allocating the temp file.
    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            TempFileRole::Stdout => "std_out_",
            TempFileRole::Stderr => "std_err_",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            TempFileRole::Stdout => "std_out",
            TempFileRole::Stderr => "std_err",
        }
    }
}

/// Program path and argument string handed to the guest process launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProcessSpec {
    pub program_path: String,
    pub arguments: String,
}

impl RemoteProcessSpec {
    /// Build from a single command string with shell-style redirection.
    ///
    /// # Errors
    ///
    /// Returns [`GuestOpsError::InvalidCommand`] if the command has no
    /// program path.
    pub fn from_shell(command: &str, stdout_path: &str, stderr_path: &str) -> Result<Self> {
        let (program, args) = command.split_once(' ').unwrap_or((command, ""));
        if program.is_empty() {
            return Err(GuestOpsError::InvalidCommand(
                "command must start with a program path".to_string(),
            ));
        }
        Ok(Self {
            program_path: program.to_string(),
            arguments: format!("{args} 1> {stdout_path} 2> {stderr_path}"),
        })
    }

    /// Build from an argument vector, wrapped in the guest family's shell.
    ///
    /// # Errors
    ///
    /// Returns [`GuestOpsError::InvalidCommand`] for an empty vector and
    /// [`GuestOpsError::UnsupportedGuest`] for a family without a known shell.
    pub fn from_argv(
        argv: &[String],
        family: &GuestFamily,
        stdout_path: &str,
        stderr_path: &str,
    ) -> Result<Self> {
        if argv.first().is_none_or(String::is_empty) {
            return Err(GuestOpsError::InvalidCommand(
                "argument vector must start with a program path".to_string(),
            ));
        }
        match family {
            GuestFamily::Linux => {
                let script = format!(
                    "{} 1> {} 2> {}",
                    join_words(argv, posix_quote),
                    posix_quote(stdout_path),
                    posix_quote(stderr_path)
                );
                Ok(Self {
                    program_path: POSIX_SHELL.to_string(),
                    arguments: format!("-c {}", posix_quote(&script)),
                })
            }
            GuestFamily::Windows => {
                let script = format!(
                    "{} 1> {} 2> {}",
                    join_words(argv, cmd_quote),
                    cmd_quote(stdout_path),
                    cmd_quote(stderr_path)
                );
                Ok(Self {
                    program_path: WINDOWS_SHELL.to_string(),
                    arguments: format!("/s /c \"{script}\""),
                })
            }
            GuestFamily::Other(raw) => Err(GuestOpsError::UnsupportedGuest {
                family: raw.clone(),
            }),
        }
    }
}

/// State of a guest process as last observed by polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProcessHandle {
    pub pid: i64,
    pub start_time: Option<DateTime<Utc>>,
    /// `None` while the process is still running.
    pub end_time: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
}

impl RemoteProcessHandle {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Exit code, only meaningful once the process has finished.
    #[must_use]
    pub fn final_exit_code(&self) -> Option<i32> {
        if self.is_finished() {
            self.exit_code
        } else {
            None
        }
    }
}

/// Result of one `exec_command` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// How long and how often to poll a guest process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    /// Give up after this long. `None` waits until the process ends or the
    /// wait is cancelled.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            deadline: None,
        }
    }
}

// ── Quoting ──────────────────────────────────────────────────────────────────

fn join_words(argv: &[String], quote: fn(&str) -> String) -> String {
    argv.iter()
        .map(|w| quote(w))
        .collect::<Vec<_>>()
        .join(" ")
}

fn posix_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

fn cmd_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_.:\\/-".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("\"{}\"", word.replace('"', "\"\""))
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
