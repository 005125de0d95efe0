//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `vmtools_common`, never
//! from `crate::infra`, `crate::commands`, or `crate::output`.
//!
//! Every method is one round trip to the hypervisor (or one HTTP request on
//! the data plane) and returns the typed [`GuestOpsError`] on failure.
//! Adapters map operation-specific rejections onto the matching variant
//! (`GuestFile`, `ProcessStart`, `Transfer`, ...); everything else is `Api`.
//!
//! [`GuestOpsError`]: crate::domain::GuestOpsError

use std::path::Path;

use vmtools_common::{ConnectionSettings, VmSelector};

use crate::domain::error::Result;
use crate::domain::{
    GuestAuthToken, GuestFamily, GuestFileAttributes, GuestHandle, RemoteProcessHandle,
    RemoteProcessSpec, TransferDescriptor,
};

// ── Session Ports ─────────────────────────────────────────────────────────────

/// Opens authenticated sessions against the hypervisor management endpoint.
#[allow(async_fn_in_trait)]
pub trait HypervisorConnector {
    /// The session type handed out on a successful login.
    type Session: HypervisorSession;

    /// Log in with the hypervisor credentials in `settings`.
    ///
    /// Returns `Ok(None)` when the hypervisor rejects the credentials.
    async fn login(&self, settings: &ConnectionSettings) -> Result<Option<Self::Session>>;
}

/// Lifecycle of an open session.
#[allow(async_fn_in_trait)]
pub trait SessionControl {
    /// Whether the hypervisor reports this session as current.
    async fn is_active(&self) -> Result<bool>;
    /// Release the session on the hypervisor side.
    async fn logout(&self) -> Result<()>;
}

// ── Inventory Ports ───────────────────────────────────────────────────────────

/// VM lookup in the hypervisor inventory.
#[allow(async_fn_in_trait)]
pub trait InventorySearch {
    /// Every VM matching `selector`, optionally scoped to a datacenter name.
    async fn find_vms(
        &self,
        selector: &VmSelector,
        datacenter: Option<&str>,
    ) -> Result<Vec<GuestHandle>>;
}

/// Live guest information reported by the guest tools.
#[allow(async_fn_in_trait)]
pub trait GuestInfo {
    /// Guest OS family of `vm` as currently reported.
    async fn guest_family(&self, vm: &GuestHandle) -> Result<GuestFamily>;
}

// ── Guest Operation Ports ─────────────────────────────────────────────────────

/// Guest credential validation.
#[allow(async_fn_in_trait)]
pub trait GuestAuthManager {
    /// Returns `Ok(false)` when the guest rejects the credentials.
    async fn validate_credentials(&self, vm: &GuestHandle, auth: &GuestAuthToken) -> Result<bool>;
}

/// Guest file manager: temp files, deletion, and transfer URLs.
#[allow(async_fn_in_trait)]
pub trait GuestFileManager {
    /// Create an empty temporary file in the guest and return its path.
    async fn create_temp_file(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        prefix: &str,
        suffix: &str,
    ) -> Result<String>;

    /// Delete a file in the guest.
    async fn delete_file(&self, vm: &GuestHandle, auth: &GuestAuthToken, path: &str)
    -> Result<()>;

    /// Request a one-time URL to download `guest_path`.
    async fn initiate_transfer_from_guest(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        guest_path: &str,
    ) -> Result<TransferDescriptor>;

    /// Request a one-time URL to upload to `guest_path`.
    async fn initiate_transfer_to_guest(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        guest_path: &str,
        attributes: &GuestFileAttributes,
    ) -> Result<TransferDescriptor>;
}

/// Guest process manager.
#[allow(async_fn_in_trait)]
pub trait GuestProcessManager {
    /// Start a program and return its guest pid.
    async fn start_program(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        spec: &RemoteProcessSpec,
    ) -> Result<i64>;

    /// Current state of the given pids. Unknown pids are omitted.
    async fn list_processes(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        pids: &[i64],
    ) -> Result<Vec<RemoteProcessHandle>>;

    /// Kill a running guest process.
    async fn terminate_process(&self, vm: &GuestHandle, auth: &GuestAuthToken, pid: i64)
    -> Result<()>;
}

/// Composite trait: everything a logged-in session must offer.
pub trait HypervisorSession:
    SessionControl + InventorySearch + GuestInfo + GuestAuthManager + GuestFileManager + GuestProcessManager
{
}

/// Blanket implementation: any type implementing all sub-traits is a `HypervisorSession`.
impl<T> HypervisorSession for T where
    T: SessionControl
        + InventorySearch
        + GuestInfo
        + GuestAuthManager
        + GuestFileManager
        + GuestProcessManager
{
}

// ── Data Plane Port ───────────────────────────────────────────────────────────

/// Plain HTTP(S) transfers against one-time URLs.
///
/// Each method consumes its descriptor: one descriptor, one request, no retry.
#[allow(async_fn_in_trait)]
pub trait TransferClient {
    /// Stream the body of a 200 response into `dest` and return the byte count.
    /// Nothing is left at `dest` unless the whole body arrived.
    async fn download_to_file(&self, descriptor: TransferDescriptor, dest: &Path) -> Result<u64>;

    /// Read the body of a 200 response as (lossy) UTF-8 text.
    async fn download_text(&self, descriptor: TransferDescriptor) -> Result<String>;

    /// Stream `source` as the body of a PUT; anything but 200 is an error.
    async fn upload_file(&self, descriptor: TransferDescriptor, source: &Path) -> Result<()>;
}
