//! Host-vars sources: the YAML hosts file and `VMTOOLS_*` environment overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_yaml::Value;
use vmtools_common::{CONNECTION_PREFIX, VM_PREFIX};

/// Host variables of a single target, keyed by full variable name.
pub type HostVars = BTreeMap<String, String>;

#[derive(Debug, Default, Deserialize)]
struct HostsDocument {
    #[serde(default)]
    hosts: BTreeMap<String, BTreeMap<String, Value>>,
}

/// A `hosts.yaml` file:
///
/// ```yaml
/// hosts:
///   web01:
///     vmware_tools_connection_host: vc01.lab
///     vmware_tools_vm_uuid: 4210e2f1-...
/// ```
#[derive(Debug, Clone)]
pub struct YamlHostsFile {
    path: PathBuf,
}

impl YamlHostsFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the hosts file location: `explicit`, then `~/.vmtools/hosts.yaml`.
    ///
    /// # Errors
    ///
    /// Fails when no explicit path is given and the home directory is unknown.
    pub fn locate(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(Self::new(home.join(".vmtools").join("hosts.yaml")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Host variables for `target`.
    ///
    /// Without a target, a file with exactly one host selects it. A missing
    /// file yields no variables unless a target was asked for.
    ///
    /// # Errors
    ///
    /// Unreadable or malformed file, unknown target, ambiguous default, or
    /// a non-scalar variable value.
    pub fn load_target(&self, target: Option<&str>) -> Result<HostVars> {
        if !self.path.exists() {
            if let Some(target) = target {
                bail!(
                    "target '{target}' requested but {} does not exist",
                    self.path.display()
                );
            }
            tracing::debug!(path = %self.path.display(), "no hosts file");
            return Ok(HostVars::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read {}", self.path.display()))?;
        let doc: HostsDocument = serde_yaml::from_str(&content)
            .with_context(|| format!("cannot parse {}", self.path.display()))?;

        let (name, vars) = match target {
            Some(t) => match doc.hosts.get_key_value(t) {
                Some(entry) => entry,
                None => bail!("unknown target '{t}' in {}", self.path.display()),
            },
            None => {
                let mut hosts = doc.hosts.iter();
                match (hosts.next(), hosts.next()) {
                    (None, _) => return Ok(HostVars::new()),
                    (Some(only), None) => only,
                    (Some(_), Some(_)) => bail!(
                        "{} defines several targets; pick one with --target",
                        self.path.display()
                    ),
                }
            }
        };

        tracing::debug!(host = %name, path = %self.path.display(), "loaded host vars");
        vars.iter()
            .map(|(key, value)| {
                scalar_to_string(value)
                    .map(|v| (key.clone(), v))
                    .with_context(|| format!("host variable '{key}' of '{name}' must be a scalar"))
            })
            .collect()
    }
}

fn scalar_to_string(value: &Value) -> Result<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            bail!("unsupported value type")
        }
    })
}

/// `VMTOOLS_*` environment overrides.
#[derive(Debug, Default, Deserialize)]
pub struct EnvOverrides {
    /// `VMTOOLS_HOSTS`
    pub hosts: Option<PathBuf>,
    /// `VMTOOLS_TARGET`
    pub target: Option<String>,
    /// `VMTOOLS_CONNECTION_PASSWORD`
    pub connection_password: Option<String>,
    /// `VMTOOLS_VM_PASSWORD`
    pub vm_password: Option<String>,
}

impl EnvOverrides {
    /// # Errors
    ///
    /// Fails when a `VMTOOLS_*` variable cannot be decoded.
    pub fn from_env() -> Result<Self> {
        envy::prefixed("VMTOOLS_")
            .from_env::<Self>()
            .context("cannot read VMTOOLS_* environment")
    }

    /// Apply the password overrides on top of `vars`.
    pub fn apply(&self, vars: &mut HostVars) {
        if let Some(pwd) = &self.connection_password {
            vars.insert(format!("{CONNECTION_PREFIX}pwd"), pwd.clone());
            vars.remove(&format!("{CONNECTION_PREFIX}password"));
        }
        if let Some(pwd) = &self.vm_password {
            vars.insert(format!("{VM_PREFIX}password"), pwd.clone());
        }
    }
}
