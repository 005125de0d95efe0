//! Typed error taxonomy for guest operations.
//!
//! Every port and service returns [`GuestOpsError`]; the command layer turns
//! it into `anyhow::Error` via the `?` operator.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use vmtools_common::{ConfigError, VmSelector};

/// Result alias used by ports and services.
pub type Result<T, E = GuestOpsError> = std::result::Result<T, E>;

/// Everything that can go wrong between the caller and the guest.
#[derive(Debug, Error)]
pub enum GuestOpsError {
    #[error("Unable to validate host credentials for {endpoint}")]
    Authentication { endpoint: String },

    #[error("Connection to {endpoint} failed: no active session after login")]
    Connection { endpoint: String },

    #[error("Unable to find VM by {selector}")]
    NotFound { selector: VmSelector },

    #[error("{count} VMs match {selector}; scope the search with a datacenter")]
    AmbiguousGuest { selector: VmSelector, count: usize },

    #[error("Unable to validate guest credentials for user '{username}'")]
    GuestAuthentication { username: String },

    #[error("Unrecognized guest family: {family}")]
    UnsupportedGuest { family: String },

    #[error("Guest file operation '{operation}' failed for {path}: {message}")]
    GuestFile {
        operation: &'static str,
        path: String,
        message: String,
    },

    #[error("Failed to start '{program}' in guest: {message}")]
    ProcessStart { program: String, message: String },

    #[error("Guest process {pid} is no longer listed by the guest")]
    ProcessLost { pid: i64 },

    #[error("Failed to transfer '{path}': {}", describe_status(.status, .message))]
    Transfer {
        path: String,
        status: Option<u16>,
        message: String,
    },

    #[error("file or module does not exist: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Guest process {pid} still running after {}s", .waited.as_secs())]
    Timeout { pid: i64, waited: Duration },

    #[error("Wait for guest process {pid} was cancelled")]
    Cancelled { pid: i64 },

    #[error("Not connected. Call connect() before guest operations.")]
    NotConnected,

    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Hypervisor API call '{operation}' failed: {message}")]
    Api {
        operation: &'static str,
        message: String,
    },
}

impl GuestOpsError {
    /// Stable machine-readable code, used by `--json` error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "AUTHENTICATION",
            Self::Connection { .. } => "CONNECTION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AmbiguousGuest { .. } => "AMBIGUOUS_GUEST",
            Self::GuestAuthentication { .. } => "GUEST_AUTHENTICATION",
            Self::UnsupportedGuest { .. } => "UNSUPPORTED_GUEST",
            Self::GuestFile { .. } => "GUEST_FILE",
            Self::ProcessStart { .. } => "PROCESS_START",
            Self::ProcessLost { .. } => "PROCESS_LOST",
            Self::Transfer { .. } => "TRANSFER",
            Self::FileNotFound { .. } => "FILE_NOT_FOUND",
            Self::Io { .. } => "IO",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Cancelled { .. } => "CANCELLED",
            Self::NotConnected => "NOT_CONNECTED",
            Self::InvalidCommand(_) => "INVALID_COMMAND",
            Self::Config(_) => "CONFIG",
            Self::Api { .. } => "API",
        }
    }

    pub fn transfer(
        path: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        Self::Transfer {
            path: path.into(),
            status,
            message: message.into(),
        }
    }

    pub fn api(operation: &'static str, message: impl ToString) -> Self {
        Self::Api {
            operation,
            message: message.to_string(),
        }
    }
}

fn describe_status(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(code) => format!("HTTP {code} {message}"),
        None => message.to_string(),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
