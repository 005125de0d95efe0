//! Guest identity, family, and credential types.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

/// A VM resolved from the hypervisor inventory. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuestHandle {
    /// Managed object identifier, e.g. `vm-1042`.
    pub id: String,
    /// Display name in the inventory.
    pub name: String,
}

/// Guest operating system category, as reported by the guest tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestFamily {
    Linux,
    Windows,
    Other(String),
}

impl GuestFamily {
    /// Parse a reported family name. Accepts the guest-tools spelling
    /// (`linuxGuest`) and the REST enum spelling (`LINUX`).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "linuxGuest" | "LINUX" => GuestFamily::Linux,
            "windowsGuest" | "WINDOWS" => GuestFamily::Windows,
            other => GuestFamily::Other(other.to_string()),
        }
    }

    /// File attributes to send with an upload, or `None` when the family is
    /// not one we know how to describe.
    #[must_use]
    pub fn file_attributes(&self, overwrite: bool, size: u64) -> Option<GuestFileAttributes> {
        match self {
            GuestFamily::Linux => Some(GuestFileAttributes::Posix { overwrite, size }),
            GuestFamily::Windows => Some(GuestFileAttributes::Windows { overwrite, size }),
            GuestFamily::Other(_) => None,
        }
    }
}

impl fmt::Display for GuestFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestFamily::Linux => f.write_str("linuxGuest"),
            GuestFamily::Windows => f.write_str("windowsGuest"),
            GuestFamily::Other(raw) => f.write_str(raw),
        }
    }
}

/// Attributes attached to an upload. Ownership and permission bits are left
/// to the guest defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestFileAttributes {
    Posix { overwrite: bool, size: u64 },
    Windows { overwrite: bool, size: u64 },
}

impl GuestFileAttributes {
    #[must_use]
    pub fn size(&self) -> u64 {
        match *self {
            GuestFileAttributes::Posix { size, .. } | GuestFileAttributes::Windows { size, .. } => {
                size
            }
        }
    }

    #[must_use]
    pub fn overwrite(&self) -> bool {
        match *self {
            GuestFileAttributes::Posix { overwrite, .. }
            | GuestFileAttributes::Windows { overwrite, .. } => overwrite,
        }
    }
}

/// Validated guest-OS credentials, attached to every guest operation.
///
/// Never printed: `Debug` shows the username only.
pub struct GuestAuthToken {
    username: String,
    password: SecretString,
}

impl GuestAuthToken {
    /// Wrap credentials. Only the credential validator hands these out as
    /// "validated"; constructing one does not contact the guest.
    #[must_use]
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }

    /// Guest credential assertions are always non-interactive.
    #[must_use]
    pub fn interactive_session(&self) -> bool {
        false
    }
}

impl fmt::Debug for GuestAuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestAuthToken")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
