//! vSphere Automation REST adapter for the hypervisor and guest-operation ports.
//!
//! Sessions are opened with `POST {base}/session` and carried in the
//! `vmware-api-session-id` header. Guest operations live under
//! `{base}/vcenter/vm/{vm}/guest/...` and take the guest credentials in the
//! request body.

mod wire;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;
use vmtools_common::{ConnectionSettings, VmSelector};

use crate::application::ports::{
    GuestAuthManager, GuestFileManager, GuestInfo, GuestProcessManager, HypervisorConnector,
    InventorySearch, SessionControl,
};
use crate::domain::error::Result;
use crate::domain::{
    GuestAuthToken, GuestFamily, GuestFileAttributes, GuestHandle, GuestOpsError,
    RemoteProcessHandle, RemoteProcessSpec, TransferDescriptor,
};
use crate::infra::tls;

use wire::{
    CreateProcess, CreateTemporary, CreateTransfer, Credentials, DatacenterSummary,
    FileCreationAttributes, GuestIdentity, ProcessInfo, ProgramSpec, TransferSpec, VmInfo,
    VmSummary, WithCredentials,
};

const SESSION_HEADER: &str = "vmware-api-session-id";
const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
const NOT_FOUND: &str = "NOT_FOUND";

// ── Connector ────────────────────────────────────────────────────────────────

/// Opens [`VsphereSession`]s. Holds no state of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct VsphereConnector;

impl HypervisorConnector for VsphereConnector {
    type Session = VsphereSession;

    async fn login(&self, settings: &ConnectionSettings) -> Result<Option<VsphereSession>> {
        let endpoint = settings.endpoint();
        let base = Url::parse(&endpoint)
            .map_err(|e| GuestOpsError::api("login", format!("invalid endpoint {endpoint}: {e}")))?;
        let client = tls::http_client(&settings.trust)?;

        tracing::debug!(%endpoint, service = %settings.service, user = %settings.user, "logging in");
        let response = client
            .post(join(&base, &["session"])?)
            .basic_auth(&settings.user, Some(settings.password.expose_secret()))
            .send()
            .await
            .map_err(|e| GuestOpsError::api("login", e))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Ok(None),
            status if status.is_success() => {}
            _ => return Err(Rejection::read(response).await.into_api("login")),
        }

        let token: String = decode("login", response).await?;
        Ok(Some(VsphereSession {
            client,
            base,
            token: SecretString::from(token),
        }))
    }
}

// ── Session ──────────────────────────────────────────────────────────────────

/// An authenticated REST session.
pub struct VsphereSession {
    client: Client,
    base: Url,
    token: SecretString,
}

/// A non-2xx answer from the API.
struct Rejection {
    status: StatusCode,
    error_type: Option<String>,
    message: String,
}

enum CallError {
    Transport(reqwest::Error),
    Rejected(Rejection),
}

impl Rejection {
    async fn read(response: Response) -> Self {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let body: wire::ErrorBody = serde_json::from_str(&text).unwrap_or_default();
        let message = body
            .messages
            .into_iter()
            .next()
            .map(|m| m.default_message)
            .or_else(|| Some(text.trim().to_string()).filter(|t| !t.is_empty()))
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected status")
                    .to_string()
            });
        Self {
            status,
            error_type: body.error_type,
            message,
        }
    }

    fn is(&self, error_type: &str) -> bool {
        self.error_type.as_deref() == Some(error_type)
    }

    fn into_api(self, operation: &'static str) -> GuestOpsError {
        GuestOpsError::api(operation, format!("HTTP {} {}", self.status.as_u16(), self.message))
    }
}

impl CallError {
    fn into_api(self, operation: &'static str) -> GuestOpsError {
        match self {
            CallError::Transport(e) => GuestOpsError::api(operation, e),
            CallError::Rejected(r) => r.into_api(operation),
        }
    }

    /// Map a failed guest operation. Credential rejections become
    /// `GuestAuthentication`, other rejections go through `rejected`.
    fn into_guest(
        self,
        operation: &'static str,
        auth: &GuestAuthToken,
        rejected: impl FnOnce(String) -> GuestOpsError,
    ) -> GuestOpsError {
        match self {
            CallError::Rejected(r) if r.is(UNAUTHENTICATED) => GuestOpsError::GuestAuthentication {
                username: auth.username().to_string(),
            },
            CallError::Rejected(r) => rejected(r.message),
            CallError::Transport(e) => GuestOpsError::api(operation, e),
        }
    }
}

impl VsphereSession {
    fn url(&self, segments: &[&str]) -> Result<Url> {
        join(&self.base, segments)
    }

    fn vm_url(&self, vm: &GuestHandle, rest: &[&str]) -> Result<Url> {
        let mut segments = vec!["vcenter", "vm", vm.id.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    async fn dispatch(&self, request: RequestBuilder) -> std::result::Result<Response, CallError> {
        let response = request
            .header(SESSION_HEADER, self.token.expose_secret())
            .send()
            .await
            .map_err(CallError::Transport)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(CallError::Rejected(Rejection::read(response).await))
        }
    }

    async fn get(&self, url: Url) -> std::result::Result<Response, CallError> {
        self.dispatch(self.client.get(url)).await
    }

    async fn post<B: Serialize>(
        &self,
        url: Url,
        action: &str,
        body: &B,
    ) -> std::result::Result<Response, CallError> {
        let url = with_query(url, &[("action", action)]);
        self.dispatch(self.client.post(url).json(body)).await
    }

    async fn get_json<T: DeserializeOwned>(&self, operation: &'static str, url: Url) -> Result<T> {
        let response = self.get(url).await.map_err(|e| e.into_api(operation))?;
        decode(operation, response).await
    }

    async fn datacenter_ids(&self, name: &str) -> Result<Vec<String>> {
        let url = with_query(self.url(&["vcenter", "datacenter"])?, &[("names", name)]);
        let found: Vec<DatacenterSummary> = self.get_json("find_datacenter", url).await?;
        Ok(found.into_iter().map(|d| d.datacenter).collect())
    }

    async fn list_vms(&self, name: Option<&str>, datacenters: &[String]) -> Result<Vec<VmSummary>> {
        let mut query: Vec<(&str, &str)> = datacenters
            .iter()
            .map(|id| ("datacenters", id.as_str()))
            .collect();
        if let Some(name) = name {
            query.push(("names", name));
        }
        let url = with_query(self.url(&["vcenter", "vm"])?, &query);
        self.get_json("find_vms", url).await
    }

    /// Guest identity of a VM, or `None` when the guest tools are not reporting.
    async fn guest_identity(&self, vm_id: &str) -> Result<Option<GuestIdentity>> {
        let url = self.url(&["vcenter", "vm", vm_id, "guest", "identity"])?;
        match self.get(url).await {
            Ok(response) => decode("guest_identity", response).await.map(Some),
            Err(CallError::Rejected(r))
                if r.status == StatusCode::SERVICE_UNAVAILABLE || r.is(NOT_FOUND) =>
            {
                tracing::debug!(vm = vm_id, reason = %r.message, "guest identity unavailable");
                Ok(None)
            }
            Err(e) => Err(e.into_api("guest_identity")),
        }
    }

    async fn matches(&self, vm: &VmSummary, selector: &VmSelector) -> Result<bool> {
        match selector {
            VmSelector::Name(name) => Ok(&vm.name == name),
            VmSelector::Uuid(uuid) => {
                let info: VmInfo = self
                    .get_json("vm_info", self.url(&["vcenter", "vm", &vm.vm])?)
                    .await?;
                Ok(info
                    .identity
                    .is_some_and(|id| id.bios_uuid.eq_ignore_ascii_case(uuid)))
            }
            VmSelector::DnsName(dns) => Ok(self
                .guest_identity(&vm.vm)
                .await?
                .and_then(|g| g.host_name)
                .is_some_and(|h| h.eq_ignore_ascii_case(dns))),
            VmSelector::Ip(ip) => Ok(self
                .guest_identity(&vm.vm)
                .await?
                .and_then(|g| g.ip_address)
                .is_some_and(|a| &a == ip)),
        }
    }
}

impl SessionControl for VsphereSession {
    async fn is_active(&self) -> Result<bool> {
        match self.get(self.url(&["session"])?).await {
            Ok(_) => Ok(true),
            Err(CallError::Rejected(r)) if r.status == StatusCode::UNAUTHORIZED => Ok(false),
            Err(e) => Err(e.into_api("session")),
        }
    }

    async fn logout(&self) -> Result<()> {
        let url = self.url(&["session"])?;
        match self.dispatch(self.client.delete(url)).await {
            Ok(_) => Ok(()),
            Err(CallError::Rejected(r)) if r.status == StatusCode::UNAUTHORIZED => Ok(()),
            Err(e) => Err(e.into_api("logout")),
        }
    }
}

impl InventorySearch for VsphereSession {
    async fn find_vms(
        &self,
        selector: &VmSelector,
        datacenter: Option<&str>,
    ) -> Result<Vec<GuestHandle>> {
        let datacenters = match datacenter {
            Some(name) => {
                let ids = self.datacenter_ids(name).await?;
                if ids.is_empty() {
                    tracing::debug!(datacenter = name, "no such datacenter");
                    return Ok(Vec::new());
                }
                ids
            }
            None => Vec::new(),
        };

        let name_filter = match selector {
            VmSelector::Name(name) => Some(name.as_str()),
            _ => None,
        };
        let candidates = self.list_vms(name_filter, &datacenters).await?;

        let mut found = Vec::new();
        for vm in candidates {
            if self.matches(&vm, selector).await? {
                found.push(GuestHandle {
                    id: vm.vm,
                    name: vm.name,
                });
            }
        }
        Ok(found)
    }
}

impl GuestInfo for VsphereSession {
    async fn guest_family(&self, vm: &GuestHandle) -> Result<GuestFamily> {
        let family = self
            .guest_identity(&vm.id)
            .await?
            .and_then(|g| g.family)
            .unwrap_or_default();
        Ok(GuestFamily::parse(&family))
    }
}

impl GuestAuthManager for VsphereSession {
    async fn validate_credentials(&self, vm: &GuestHandle, auth: &GuestAuthToken) -> Result<bool> {
        let body = WithCredentials {
            credentials: Credentials::from(auth),
        };
        match self.post(self.vm_url(vm, &["guest", "processes"])?, "list", &body).await {
            Ok(_) => Ok(true),
            Err(CallError::Rejected(r)) if r.is(UNAUTHENTICATED) => Ok(false),
            Err(e) => Err(e.into_api("validate_credentials")),
        }
    }
}

impl GuestFileManager for VsphereSession {
    async fn create_temp_file(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        prefix: &str,
        suffix: &str,
    ) -> Result<String> {
        let body = CreateTemporary {
            credentials: Credentials::from(auth),
            prefix,
            suffix,
        };
        let url = self.vm_url(vm, &["guest", "filesystem"])?;
        let response = self
            .post(url, "create_temporary", &body)
            .await
            .map_err(|e| {
                e.into_guest("create_temporary", auth, |message| GuestOpsError::GuestFile {
                    operation: "create_temporary",
                    path: format!("{prefix}*{suffix}"),
                    message,
                })
            })?;
        decode("create_temporary", response).await
    }

    async fn delete_file(&self, vm: &GuestHandle, auth: &GuestAuthToken, path: &str) -> Result<()> {
        let body = WithCredentials {
            credentials: Credentials::from(auth),
        };
        let url = self.vm_url(vm, &["guest", "filesystem", "files", path])?;
        self.post(url, "delete", &body).await.map_err(|e| {
            e.into_guest("delete", auth, |message| GuestOpsError::GuestFile {
                operation: "delete",
                path: path.to_string(),
                message,
            })
        })?;
        Ok(())
    }

    async fn initiate_transfer_from_guest(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        guest_path: &str,
    ) -> Result<TransferDescriptor> {
        let body = CreateTransfer {
            credentials: Credentials::from(auth),
            spec: TransferSpec {
                path: guest_path,
                attributes: None,
            },
        };
        let url = self.create_transfer(vm, auth, guest_path, &body).await?;
        Ok(TransferDescriptor::from_guest(url, guest_path))
    }

    async fn initiate_transfer_to_guest(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        guest_path: &str,
        attributes: &GuestFileAttributes,
    ) -> Result<TransferDescriptor> {
        let body = CreateTransfer {
            credentials: Credentials::from(auth),
            spec: TransferSpec {
                path: guest_path,
                attributes: Some(FileCreationAttributes::from(attributes)),
            },
        };
        let url = self.create_transfer(vm, auth, guest_path, &body).await?;
        Ok(TransferDescriptor::to_guest(url, guest_path, attributes))
    }
}

impl VsphereSession {
    async fn create_transfer(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        guest_path: &str,
        body: &CreateTransfer<'_>,
    ) -> Result<String> {
        let url = self.vm_url(vm, &["guest", "filesystem"])?;
        let response = self.post(url, "create", body).await.map_err(|e| {
            e.into_guest("initiate_transfer", auth, |message| GuestOpsError::GuestFile {
                operation: "initiate_transfer",
                path: guest_path.to_string(),
                message,
            })
        })?;
        decode("initiate_transfer", response).await
    }
}

impl GuestProcessManager for VsphereSession {
    async fn start_program(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        spec: &RemoteProcessSpec,
    ) -> Result<i64> {
        let body = CreateProcess {
            credentials: Credentials::from(auth),
            spec: ProgramSpec {
                path: &spec.program_path,
                arguments: &spec.arguments,
            },
        };
        let url = self.vm_url(vm, &["guest", "processes"])?;
        let response = self.post(url, "create", &body).await.map_err(|e| {
            e.into_guest("start_program", auth, |message| GuestOpsError::ProcessStart {
                program: spec.program_path.clone(),
                message,
            })
        })?;
        decode("start_program", response).await
    }

    async fn list_processes(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        pids: &[i64],
    ) -> Result<Vec<RemoteProcessHandle>> {
        let body = WithCredentials {
            credentials: Credentials::from(auth),
        };
        let mut handles = Vec::with_capacity(pids.len());
        for &pid in pids {
            let pid_segment = pid.to_string();
            let url = self.vm_url(vm, &["guest", "processes", &pid_segment])?;
            match self.post(url, "get", &body).await {
                Ok(response) => {
                    let info: ProcessInfo = decode("list_processes", response).await?;
                    handles.push(info.into_handle(pid));
                }
                Err(CallError::Rejected(r)) if r.is(NOT_FOUND) => {
                    tracing::debug!(pid, "process not listed by guest");
                }
                Err(e) => {
                    return Err(e.into_guest("list_processes", auth, |message| {
                        GuestOpsError::api("list_processes", message)
                    }));
                }
            }
        }
        Ok(handles)
    }

    async fn terminate_process(
        &self,
        vm: &GuestHandle,
        auth: &GuestAuthToken,
        pid: i64,
    ) -> Result<()> {
        let body = WithCredentials {
            credentials: Credentials::from(auth),
        };
        let pid_segment = pid.to_string();
        let url = self.vm_url(vm, &["guest", "processes", &pid_segment])?;
        self.post(url, "delete", &body).await.map_err(|e| {
            e.into_guest("terminate_process", auth, |message| {
                GuestOpsError::api("terminate_process", message)
            })
        })?;
        Ok(())
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Append path segments to `base`, percent-encoding each one.
fn join(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| GuestOpsError::api("url", format!("{base} cannot be a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn with_query(mut url: Url, pairs: &[(&str, &str)]) -> Url {
    if !pairs.is_empty() {
        url.query_pairs_mut().extend_pairs(pairs);
    }
    url
}

async fn decode<T: DeserializeOwned>(operation: &'static str, response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| GuestOpsError::api(operation, format!("malformed response: {e}")))
}
