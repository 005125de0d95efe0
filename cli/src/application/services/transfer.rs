//! Guest File Transfer: two-phase (one-time URL, then HTTP) uploads and
//! downloads.

use std::io::ErrorKind;
use std::path::Path;

use crate::application::ports::{GuestFileManager, GuestInfo, TransferClient};
use crate::application::services::GuestTarget;
use crate::domain::error::Result;
use crate::domain::GuestOpsError;

/// Download `remote` from the guest into `local`, creating parent
/// directories first. Returns the number of bytes written.
///
/// # Errors
///
/// [`GuestOpsError::Io`] if the parent directory cannot be created,
/// [`GuestOpsError::Transfer`] on any non-200 response.
pub async fn fetch_file<S: GuestFileManager>(
    guest: GuestTarget<'_, S>,
    transfer: &impl TransferClient,
    remote: &str,
    local: &Path,
) -> Result<u64> {
    if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| GuestOpsError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    let descriptor = guest
        .api
        .initiate_transfer_from_guest(guest.vm, guest.auth, remote)
        .await?;
    let bytes = transfer.download_to_file(descriptor, local).await?;
    tracing::debug!(remote, local = %local.display(), bytes, "fetched file from guest");
    Ok(bytes)
}

/// Download `remote` from the guest as text.
///
/// # Errors
///
/// [`GuestOpsError::Transfer`] on any non-200 response.
pub async fn fetch_text<S: GuestFileManager>(
    guest: GuestTarget<'_, S>,
    transfer: &impl TransferClient,
    remote: &str,
) -> Result<String> {
    let descriptor = guest
        .api
        .initiate_transfer_from_guest(guest.vm, guest.auth, remote)
        .await?;
    transfer.download_text(descriptor).await
}

/// Upload `local` to `remote` in the guest. Returns the number of bytes sent.
///
/// The local file is checked before anything is sent to the hypervisor, and
/// the guest family before a transfer URL is requested.
///
/// # Errors
///
/// [`GuestOpsError::FileNotFound`] if `local` does not exist,
/// [`GuestOpsError::UnsupportedGuest`] for an unrecognised guest family,
/// [`GuestOpsError::Transfer`] if the PUT is not answered with 200.
pub async fn put_file<S: GuestFileManager + GuestInfo>(
    guest: GuestTarget<'_, S>,
    transfer: &impl TransferClient,
    local: &Path,
    remote: &str,
    overwrite: bool,
) -> Result<u64> {
    let metadata = match tokio::fs::metadata(local).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(GuestOpsError::FileNotFound {
                path: local.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(GuestOpsError::Io {
                path: local.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_file() {
        return Err(GuestOpsError::Io {
            path: local.to_path_buf(),
            source: std::io::Error::new(ErrorKind::InvalidInput, "not a regular file"),
        });
    }
    let size = metadata.len();

    let family = guest.api.guest_family(guest.vm).await?;
    let attributes = family
        .file_attributes(overwrite, size)
        .ok_or_else(|| GuestOpsError::UnsupportedGuest {
            family: family.to_string(),
        })?;

    let descriptor = guest
        .api
        .initiate_transfer_to_guest(guest.vm, guest.auth, remote, &attributes)
        .await?;
    transfer.upload_file(descriptor, local).await?;
    tracing::debug!(local = %local.display(), remote, bytes = size, %family, "uploaded file to guest");
    Ok(size)
}
