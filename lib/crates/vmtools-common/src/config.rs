use std::collections::BTreeMap;
use std::path::PathBuf;

use secrecy::SecretString;
use thiserror::Error;

use crate::types::{Protocol, TrustPolicy, VmSelector};

/// Host variables starting with this prefix configure the hypervisor connection.
pub const CONNECTION_PREFIX: &str = "vmware_tools_connection_";

/// Host variables starting with this prefix configure the guest VM.
pub const VM_PREFIX: &str = "vmware_tools_vm_";

/// Recognised connection keys (after the prefix is stripped).
/// `pwd` and `password` are synonyms.
pub const CONNECTION_KEYS: &[&str] = &[
    "protocol",
    "host",
    "port",
    "user",
    "pwd",
    "password",
    "service",
    "path",
    "validate_certs",
    "ca_cert",
];

/// Recognised VM keys (after the prefix is stripped).
pub const VM_KEYS: &[&str] = &[
    "username",
    "password",
    "uuid",
    "name",
    "dns_name",
    "ip",
    "datacenter",
];

const DEFAULT_SERVICE: &str = "hostd";
const DEFAULT_API_PATH: &str = "/api";

/// Errors raised while turning host variables into settings
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required host variable '{0}'")]
    MissingKey(String),

    #[error("invalid value for '{key}': {value:?} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error(
        "'vmware_tools_connection_ca_cert' cannot be combined with \
         'vmware_tools_connection_validate_certs: false'"
    )]
    ConflictingTrust,
}

/// The two logically separate configuration bags, keyed by the suffix
/// left after stripping the prefix. Unrecognised keys are dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HostVarBags {
    pub connection: BTreeMap<String, String>,
    pub vm: BTreeMap<String, String>,
}

/// Sort host variables into the connection and VM bags.
pub fn split_host_vars<'a, I>(vars: I) -> HostVarBags
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut bags = HostVarBags::default();
    for (key, value) in vars {
        if let Some(suffix) = key.strip_prefix(CONNECTION_PREFIX) {
            if CONNECTION_KEYS.contains(&suffix) {
                bags.connection.insert(suffix.to_string(), value.to_string());
            }
        } else if let Some(suffix) = key.strip_prefix(VM_PREFIX)
            && VM_KEYS.contains(&suffix)
        {
            bags.vm.insert(suffix.to_string(), value.to_string());
        }
    }
    bags
}

/// Hypervisor management endpoint settings.
#[derive(Debug)]
pub struct ConnectionSettings {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    /// Service name, reported in logs only.
    pub service: String,
    /// Base path of the management API, e.g. `/api`.
    pub path: String,
    pub trust: TrustPolicy,
}

impl ConnectionSettings {
    pub fn from_bag(bag: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let protocol = match bag.get("protocol").map(|p| p.trim().to_ascii_lowercase()) {
            None => Protocol::default(),
            Some(p) if p == "https" => Protocol::Https,
            Some(p) if p == "http" => Protocol::Http,
            Some(p) => {
                return Err(invalid(
                    CONNECTION_PREFIX,
                    "protocol",
                    &p,
                    "expected http or https",
                ));
            }
        };

        let port = match bag.get("port") {
            None => protocol.default_port(),
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| invalid(CONNECTION_PREFIX, "port", raw, &e.to_string()))?,
        };

        let password = bag
            .get("pwd")
            .or_else(|| bag.get("password"))
            .ok_or_else(|| ConfigError::MissingKey(format!("{CONNECTION_PREFIX}pwd")))?;

        let mut path = bag
            .get("path")
            .map_or_else(|| DEFAULT_API_PATH.to_string(), |p| p.trim().to_string());
        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        while path.len() > 1 && path.ends_with('/') {
            path.pop();
        }

        Ok(Self {
            protocol,
            host: required(bag, CONNECTION_PREFIX, "host")?,
            port,
            user: required(bag, CONNECTION_PREFIX, "user")?,
            password: SecretString::from(password.clone()),
            service: bag
                .get("service")
                .cloned()
                .unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            path,
            trust: trust_policy(bag)?,
        })
    }

    /// Base URL of the management API, e.g. `https://vc01:443/api`.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}://{}:{}{}", self.protocol, self.host, self.port, self.path)
    }
}

/// Guest VM identification and guest-OS credentials.
#[derive(Debug)]
pub struct VmSettings {
    pub username: String,
    pub password: SecretString,
    pub selector: VmSelector,
    /// Datacenter name to scope the search to. `None` searches the whole inventory.
    pub datacenter: Option<String>,
}

impl VmSettings {
    pub fn from_bag(bag: &BTreeMap<String, String>) -> Result<Self, ConfigError> {
        let selector = if let Some(uuid) = non_empty(bag, "uuid") {
            VmSelector::Uuid(uuid)
        } else if let Some(name) = non_empty(bag, "name") {
            VmSelector::Name(name)
        } else if let Some(dns) = non_empty(bag, "dns_name") {
            VmSelector::DnsName(dns)
        } else if let Some(ip) = non_empty(bag, "ip") {
            VmSelector::Ip(ip)
        } else {
            return Err(ConfigError::MissingKey(format!("{VM_PREFIX}uuid")));
        };

        Ok(Self {
            username: required(bag, VM_PREFIX, "username")?,
            password: bag
                .get("password")
                .map(|p| SecretString::from(p.clone()))
                .ok_or_else(|| ConfigError::MissingKey(format!("{VM_PREFIX}password")))?,
            selector,
            datacenter: non_empty(bag, "datacenter"),
        })
    }
}

/// Parse a full set of host variables into both settings structs.
pub fn settings_from_host_vars<'a, I>(vars: I) -> Result<(ConnectionSettings, VmSettings), ConfigError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let bags = split_host_vars(vars);
    Ok((
        ConnectionSettings::from_bag(&bags.connection)?,
        VmSettings::from_bag(&bags.vm)?,
    ))
}

fn trust_policy(bag: &BTreeMap<String, String>) -> Result<TrustPolicy, ConfigError> {
    let validate = match bag.get("validate_certs") {
        None => true,
        Some(raw) => parse_bool(raw)
            .ok_or_else(|| invalid(CONNECTION_PREFIX, "validate_certs", raw, "expected a boolean"))?,
    };
    match (validate, non_empty(bag, "ca_cert")) {
        (true, None) => Ok(TrustPolicy::Verify),
        (true, Some(path)) => Ok(TrustPolicy::Pin(PathBuf::from(path))),
        (false, None) => Ok(TrustPolicy::Skip),
        (false, Some(_)) => Err(ConfigError::ConflictingTrust),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn non_empty(bag: &BTreeMap<String, String>, key: &str) -> Option<String> {
    bag.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(bag: &BTreeMap<String, String>, prefix: &str, key: &str) -> Result<String, ConfigError> {
    non_empty(bag, key).ok_or_else(|| ConfigError::MissingKey(format!("{prefix}{key}")))
}

fn invalid(prefix: &str, key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: format!("{prefix}{key}"),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
