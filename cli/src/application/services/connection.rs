//! Connection Facade: the five operations callers use.
//!
//! `GuestConnection` owns at most one hypervisor session, the resolved guest
//! and its validated credentials. Every operation takes `&mut self`, so one
//! instance runs one logical command at a time; share it across tasks only
//! behind a `tokio::sync::Mutex`.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use tokio_util::sync::CancellationToken;
use vmtools_common::{ConnectionSettings, VmSettings};

use crate::application::ports::{HypervisorConnector, TransferClient};
use crate::application::services::{GuestTarget, credentials, locator, runner, session, transfer};
use crate::domain::error::Result;
use crate::domain::{ExecOutput, GuestAuthToken, GuestCommand, GuestHandle, GuestOpsError, PollPolicy};

struct Connected<S> {
    session: S,
    vm: GuestHandle,
    auth: GuestAuthToken,
}

/// Guest connection composed of a hypervisor connector (control plane) and a
/// transfer client (data plane).
pub struct GuestConnection<C: HypervisorConnector, T: TransferClient> {
    connector: C,
    transfer: T,
    poll: PollPolicy,
    overwrite: bool,
    cancel: CancellationToken,
    state: Option<Connected<C::Session>>,
}

impl<C: HypervisorConnector, T: TransferClient> GuestConnection<C, T> {
    /// Create a disconnected facade.
    pub fn new(connector: C, transfer: T) -> Self {
        Self {
            connector,
            transfer,
            poll: PollPolicy::default(),
            overwrite: true,
            cancel: CancellationToken::new(),
            state: None,
        }
    }

    /// Override the poll interval and deadline used by `exec_command`.
    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Whether `put_file` replaces existing guest files. Defaults to `true`.
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// A handle that interrupts any in-progress wait on a guest process.
    /// Once cancelled, later `exec_*` calls fail immediately.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_some()
    }

    /// The guest this facade is connected to.
    #[must_use]
    pub fn guest(&self) -> Option<&GuestHandle> {
        self.state.as_ref().map(|s| &s.vm)
    }

    /// Log in, locate the guest and validate the guest credentials.
    ///
    /// A no-op when already connected. On failure nothing is kept: a session
    /// that was opened before the failing step is logged out again.
    ///
    /// # Errors
    ///
    /// `Authentication`, `Connection`, `NotFound`, `AmbiguousGuest` or
    /// `GuestAuthentication`, see [`GuestOpsError`].
    pub async fn connect(
        &mut self,
        connection: &ConnectionSettings,
        vm_settings: &VmSettings,
    ) -> Result<()> {
        if self.state.is_some() {
            tracing::debug!("already connected");
            return Ok(());
        }

        let hv_session = session::connect(&self.connector, connection).await?;
        match Self::attach_guest(&hv_session, vm_settings).await {
            Ok((vm, auth)) => {
                tracing::info!(vm = %vm.id, name = %vm.name, "connected to guest");
                self.state = Some(Connected {
                    session: hv_session,
                    vm,
                    auth,
                });
                Ok(())
            }
            Err(e) => {
                if let Err(logout) = session::disconnect(&hv_session).await {
                    tracing::warn!(error = %logout, "logout after failed connect did not succeed");
                }
                Err(e)
            }
        }
    }

    async fn attach_guest(
        hv_session: &C::Session,
        vm_settings: &VmSettings,
    ) -> Result<(GuestHandle, GuestAuthToken)> {
        let vm = locator::find_guest(
            hv_session,
            &vm_settings.selector,
            vm_settings.datacenter.as_deref(),
        )
        .await?;
        let password = SecretString::from(vm_settings.password.expose_secret().to_string());
        let auth = credentials::validate(hv_session, &vm, &vm_settings.username, password).await?;
        Ok((vm, auth))
    }

    /// Run a shell-style command line: the first space-delimited token is the
    /// program, the rest its arguments.
    ///
    /// # Errors
    ///
    /// `NotConnected`, plus any error of the process runner.
    pub async fn exec_command(&mut self, command: &str) -> Result<ExecOutput> {
        self.exec(&GuestCommand::Shell(command.to_string())).await
    }

    /// Run an argument vector through the guest's shell with proper quoting.
    ///
    /// # Errors
    ///
    /// `NotConnected`, `UnsupportedGuest`, plus any error of the process runner.
    pub async fn exec_argv(&mut self, argv: &[String]) -> Result<ExecOutput> {
        self.exec(&GuestCommand::Argv(argv.to_vec())).await
    }

    /// Run `command` in the guest.
    ///
    /// # Errors
    ///
    /// `NotConnected`, plus any error of the process runner.
    pub async fn exec(&mut self, command: &GuestCommand) -> Result<ExecOutput> {
        let guest = self.target()?;
        runner::run(guest, &self.transfer, command, &self.poll, &self.cancel).await
    }

    /// Upload a local file into the guest. Returns the number of bytes sent.
    ///
    /// # Errors
    ///
    /// `NotConnected`, `FileNotFound`, `UnsupportedGuest`, `Transfer`.
    pub async fn put_file(&mut self, local: &Path, remote: &str) -> Result<u64> {
        let guest = self.target()?;
        transfer::put_file(guest, &self.transfer, local, remote, self.overwrite).await
    }

    /// Download a guest file to a local path. Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// `NotConnected`, `Io`, `Transfer`.
    pub async fn fetch_file(&mut self, remote: &str, local: &Path) -> Result<u64> {
        let guest = self.target()?;
        transfer::fetch_file(guest, &self.transfer, remote, local).await
    }

    /// Release the hypervisor session. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the logout error; the facade is disconnected either way.
    pub async fn close(&mut self) -> Result<()> {
        let Some(state) = self.state.take() else {
            return Ok(());
        };
        session::disconnect(&state.session).await
    }

    fn target(&self) -> Result<GuestTarget<'_, C::Session>> {
        let state = self.state.as_ref().ok_or(GuestOpsError::NotConnected)?;
        Ok(GuestTarget {
            api: &state.session,
            vm: &state.vm,
            auth: &state.auth,
        })
    }
}
