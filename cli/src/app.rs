//! Application context: unified state passed to every command handler.
//!
//! `AppContext` owns the output context and knows where host variables come
//! from. Host variables are layered, later sources winning:
//! the hosts file, then `VMTOOLS_*` environment overrides, then `-e` extra vars.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use vmtools_common::{ConnectionSettings, VmSettings, settings_from_host_vars};

use crate::application::GuestConnection;
use crate::domain::PollPolicy;
use crate::infra::hosts::{EnvOverrides, HostVars, YamlHostsFile};
use crate::infra::transfer::ReqwestTransferClient;
use crate::infra::vsphere::VsphereConnector;
use crate::output::OutputContext;

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Where host variables come from.
#[derive(Default)]
pub struct HostVarFlags {
    /// `--hosts`
    pub hosts: Option<PathBuf>,
    /// `--target`
    pub target: Option<String>,
    /// `-e key=value`, in command-line order.
    pub extra_vars: Vec<String>,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Host variable sources.
    pub host_vars: HostVarFlags,
}

/// The connection type every command runs against in production.
pub type LiveConnection = GuestConnection<VsphereConnector, ReqwestTransferClient>;

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    hosts: YamlHostsFile,
    target: Option<String>,
    env: EnvOverrides,
    extra_vars: Vec<(String, String)>,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags and the environment.
    ///
    /// # Errors
    ///
    /// Returns an error for a malformed `-e` pair, an undecodable `VMTOOLS_*`
    /// variable, or when no hosts file path can be determined.
    pub fn new(flags: AppFlags) -> Result<Self> {
        let env = EnvOverrides::from_env()?;
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let hosts_path = flags.host_vars.hosts.or_else(|| env.hosts.clone());
        let extra_vars = flags
            .host_vars
            .extra_vars
            .iter()
            .map(|raw| parse_extra_var(raw))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            hosts: YamlHostsFile::locate(hosts_path.as_deref())?,
            target: flags.host_vars.target.or_else(|| env.target.clone()),
            env,
            extra_vars,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Merged host variables for the selected target.
    ///
    /// # Errors
    ///
    /// See [`YamlHostsFile::load_target`].
    pub fn host_vars(&self) -> Result<HostVars> {
        let mut vars = self.hosts.load_target(self.target.as_deref())?;
        self.env.apply(&mut vars);
        for (key, value) in &self.extra_vars {
            vars.insert(key.clone(), value.clone());
        }
        Ok(vars)
    }

    /// Connection and VM settings for the selected target.
    ///
    /// # Errors
    ///
    /// Returns an error if a required host variable is missing or invalid.
    pub fn settings(&self) -> Result<(ConnectionSettings, VmSettings)> {
        let vars = self.host_vars()?;
        settings_from_host_vars(vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .with_context(|| format!("invalid host variables (hosts file: {})", self.hosts.path().display()))
    }

    /// A disconnected production connection honouring the target's trust policy.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn guest_connection(
        &self,
        connection: &ConnectionSettings,
        poll: PollPolicy,
    ) -> Result<LiveConnection> {
        if connection.trust.is_insecure() {
            self.output
                .warn(&format!("not verifying the TLS certificate of {}", connection.host));
        }
        let transfer = ReqwestTransferClient::new(&connection.trust)
            .context("cannot build transfer client")?;
        Ok(GuestConnection::new(VsphereConnector, transfer).with_poll_policy(poll))
    }
}

/// Split `key=value`. The value may itself contain `=`.
fn parse_extra_var(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("invalid extra var '{raw}': expected key=value"),
    }
}
