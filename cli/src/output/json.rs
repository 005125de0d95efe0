//! JSON output for `--json` mode.
//!
//! Successful commands print one pretty-printed object; failures print the
//! error object from [`format_error`].

use anyhow::{Context, Result};
use serde::Serialize;

use crate::domain::{ExecOutput, GuestHandle};

/// Error object printed when a command fails:
///
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

#[derive(Serialize)]
struct ExecReport<'a> {
    guest: Option<&'a GuestHandle>,
    #[serde(flatten)]
    output: &'a ExecOutput,
}

/// `{"guest": {...}, "exit_code": 0, "stdout": "...", "stderr": "..."}`
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_exec(guest: Option<&GuestHandle>, output: &ExecOutput) -> Result<String> {
    serde_json::to_string_pretty(&ExecReport { guest, output }).context("JSON serialization failed")
}

#[derive(Serialize)]
struct TransferReport<'a> {
    guest: Option<&'a GuestHandle>,
    direction: &'a str,
    local: &'a str,
    remote: &'a str,
    bytes: u64,
}

/// `{"guest": {...}, "direction": "put", "local": "...", "remote": "...", "bytes": 42}`
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_transfer(
    guest: Option<&GuestHandle>,
    direction: &str,
    local: &str,
    remote: &str,
    bytes: u64,
) -> Result<String> {
    serde_json::to_string_pretty(&TransferReport {
        guest,
        direction,
        local,
        remote,
        bytes,
    })
    .context("JSON serialization failed")
}

/// `{"connected": true, "guest": {...}}`
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_check(guest: Option<&GuestHandle>) -> Result<String> {
    let obj = serde_json::json!({
        "connected": guest.is_some(),
        "guest": guest,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}
