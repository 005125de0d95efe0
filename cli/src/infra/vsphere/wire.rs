//! Request and response bodies of the vSphere Automation REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GuestAuthToken, GuestFileAttributes, RemoteProcessHandle};

// ── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Credentials<'a> {
    pub interactive_session: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub user_name: &'a str,
    pub password: &'a str,
}

impl<'a> From<&'a GuestAuthToken> for Credentials<'a> {
    fn from(auth: &'a GuestAuthToken) -> Self {
        Self {
            interactive_session: auth.interactive_session(),
            kind: "USERNAME_PASSWORD",
            user_name: auth.username(),
            password: auth.password(),
        }
    }
}

/// Body of every guest operation that needs nothing but credentials.
#[derive(Debug, Serialize)]
pub struct WithCredentials<'a> {
    pub credentials: Credentials<'a>,
}

#[derive(Debug, Serialize)]
pub struct CreateTemporary<'a> {
    pub credentials: Credentials<'a>,
    pub prefix: &'a str,
    pub suffix: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateProcess<'a> {
    pub credentials: Credentials<'a>,
    pub spec: ProgramSpec<'a>,
}

#[derive(Debug, Serialize)]
pub struct ProgramSpec<'a> {
    pub path: &'a str,
    pub arguments: &'a str,
}

#[derive(Debug, Serialize)]
pub struct CreateTransfer<'a> {
    pub credentials: Credentials<'a>,
    pub spec: TransferSpec<'a>,
}

#[derive(Debug, Serialize)]
pub struct TransferSpec<'a> {
    pub path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<FileCreationAttributes>,
}

#[derive(Debug, Serialize)]
pub struct FileCreationAttributes {
    pub overwrite: bool,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posix: Option<Empty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub windows: Option<Empty>,
}

/// Family-specific attribute block. Ownership and permissions stay at the
/// guest defaults, so it is always empty.
#[derive(Debug, Serialize)]
pub struct Empty {}

impl From<&GuestFileAttributes> for FileCreationAttributes {
    fn from(attributes: &GuestFileAttributes) -> Self {
        let (posix, windows) = match attributes {
            GuestFileAttributes::Posix { .. } => (Some(Empty {}), None),
            GuestFileAttributes::Windows { .. } => (None, Some(Empty {})),
        };
        Self {
            overwrite: attributes.overwrite(),
            size: attributes.size(),
            posix,
            windows,
        }
    }
}

// ── Responses ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VmSummary {
    pub vm: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DatacenterSummary {
    pub datacenter: String,
}

#[derive(Debug, Deserialize)]
pub struct VmInfo {
    #[serde(default)]
    pub identity: Option<VmIdentity>,
}

#[derive(Debug, Deserialize)]
pub struct VmIdentity {
    pub bios_uuid: String,
}

#[derive(Debug, Deserialize)]
pub struct GuestIdentity {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProcessInfo {
    #[serde(default)]
    pub started: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finished: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exit_code: Option<i32>,
}

impl ProcessInfo {
    pub fn into_handle(self, pid: i64) -> RemoteProcessHandle {
        RemoteProcessHandle {
            pid,
            start_time: self.started,
            end_time: self.finished,
            exit_code: self.exit_code,
        }
    }
}

/// Standard error body: `{"error_type": "...", "messages": [...]}`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub messages: Vec<LocalizableMessage>,
}

#[derive(Debug, Deserialize)]
pub struct LocalizableMessage {
    pub default_message: String,
}
