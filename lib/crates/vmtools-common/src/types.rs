use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Scheme used to reach the hypervisor management endpoint
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    #[must_use]
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate trust applied to both the management API and the
/// one-time transfer URLs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case", tag = "mode", content = "ca_cert")]
pub enum TrustPolicy {
    /// Verify against the system roots.
    #[default]
    Verify,
    /// Accept any certificate. Opt-in only.
    Skip,
    /// Verify against the given PEM bundle in addition to the system roots.
    Pin(PathBuf),
}

impl TrustPolicy {
    #[must_use]
    pub fn is_insecure(&self) -> bool {
        matches!(self, TrustPolicy::Skip)
    }
}

/// How the guest VM is looked up in the hypervisor inventory.
///
/// `Uuid` matches the VM (BIOS) uuid, never the instance uuid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "by", content = "value")]
pub enum VmSelector {
    Uuid(String),
    Name(String),
    DnsName(String),
    Ip(String),
}

impl fmt::Display for VmSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmSelector::Uuid(v) => write!(f, "uuid {v}"),
            VmSelector::Name(v) => write!(f, "name {v}"),
            VmSelector::DnsName(v) => write!(f, "dns name {v}"),
            VmSelector::Ip(v) => write!(f, "ip {v}"),
        }
    }
}
