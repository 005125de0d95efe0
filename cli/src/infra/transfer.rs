//! Data-plane client: plain HTTP(S) GET and PUT against one-time URLs.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, Client, Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use vmtools_common::TrustPolicy;

use crate::application::ports::TransferClient;
use crate::domain::error::Result;
use crate::domain::{GuestOpsError, TransferDescriptor};
use crate::infra::tls;

/// Production [`TransferClient`] backed by `reqwest`.
pub struct ReqwestTransferClient {
    client: Client,
}

impl ReqwestTransferClient {
    /// # Errors
    ///
    /// See [`tls::http_client`].
    pub fn new(trust: &TrustPolicy) -> Result<Self> {
        Ok(Self {
            client: tls::http_client(trust)?,
        })
    }

    async fn get(&self, descriptor: &TransferDescriptor) -> Result<Response> {
        let response = self
            .client
            .get(&descriptor.url)
            .send()
            .await
            .map_err(|e| GuestOpsError::transfer(&descriptor.guest_path, None, e.to_string()))?;
        expect_ok(&descriptor.guest_path, response)
    }
}

impl TransferClient for ReqwestTransferClient {
    async fn download_to_file(&self, descriptor: TransferDescriptor, dest: &Path) -> Result<u64> {
        let response = self.get(&descriptor).await?;

        let partial = partial_path(dest);
        let io_err = |source| GuestOpsError::Io {
            path: partial.clone(),
            source,
        };
        let mut file = tokio::fs::File::create(&partial).await.map_err(io_err)?;

        let written = match stream_body(&descriptor.guest_path, response, &mut file).await {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                discard(&partial).await;
                return Err(e);
            }
        };
        drop(file);

        if let Err(source) = tokio::fs::rename(&partial, dest).await {
            discard(&partial).await;
            return Err(GuestOpsError::Io {
                path: dest.to_path_buf(),
                source,
            });
        }
        Ok(written)
    }

    async fn download_text(&self, descriptor: TransferDescriptor) -> Result<String> {
        let response = self.get(&descriptor).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| GuestOpsError::transfer(&descriptor.guest_path, None, e.to_string()))?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn upload_file(&self, descriptor: TransferDescriptor, local: &Path) -> Result<()> {
        let io_err = |source| GuestOpsError::Io {
            path: local.to_path_buf(),
            source,
        };
        let file = tokio::fs::File::open(local).await.map_err(io_err)?;
        let len = file.metadata().await.map_err(io_err)?.len();

        let response = self
            .client
            .put(&descriptor.url)
            .header(CONTENT_LENGTH, len)
            .body(Body::wrap_stream(ReaderStream::new(file)))
            .send()
            .await
            .map_err(|e| GuestOpsError::transfer(&descriptor.guest_path, None, e.to_string()))?;
        expect_ok(&descriptor.guest_path, response)?;
        Ok(())
    }
}

fn expect_ok(guest_path: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    Err(GuestOpsError::transfer(
        guest_path,
        Some(status.as_u16()),
        status.canonical_reason().unwrap_or("unexpected status"),
    ))
}

async fn stream_body(
    guest_path: &str,
    response: Response,
    file: &mut tokio::fs::File,
) -> Result<u64> {
    let mut written = 0u64;
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk =
            chunk.map_err(|e| GuestOpsError::transfer(guest_path, None, e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| GuestOpsError::transfer(guest_path, None, e.to_string()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| GuestOpsError::transfer(guest_path, None, e.to_string()))?;
    Ok(written)
}

/// `<dest>.part`, renamed onto `dest` once the body is complete.
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

async fn discard(partial: &Path) {
    if let Err(e) = tokio::fs::remove_file(partial).await {
        tracing::warn!(path = %partial.display(), error = %e, "could not remove partial download");
    }
}
