//! HTTP client construction under a [`TrustPolicy`].
//!
//! The same policy governs the management API and the one-time transfer
//! URLs, so both planes build their client here.

use std::time::Duration;

use reqwest::{Certificate, Client};
use vmtools_common::TrustPolicy;

use crate::domain::GuestOpsError;
use crate::domain::error::Result;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a client that verifies (or, for [`TrustPolicy::Skip`], ignores)
/// server certificates.
///
/// # Errors
///
/// [`GuestOpsError::Io`] if a pinned CA bundle cannot be read,
/// [`GuestOpsError::Api`] if it holds no usable certificate.
pub fn http_client(trust: &TrustPolicy) -> Result<Client> {
    let mut builder = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("vmtools/", env!("CARGO_PKG_VERSION")));

    match trust {
        TrustPolicy::Verify => {}
        TrustPolicy::Skip => {
            tracing::warn!("certificate verification is disabled for this connection");
            builder = builder.danger_accept_invalid_certs(true);
        }
        TrustPolicy::Pin(path) => {
            let pem = std::fs::read(path).map_err(|source| GuestOpsError::Io {
                path: path.clone(),
                source,
            })?;
            let certs = Certificate::from_pem_bundle(&pem)
                .map_err(|e| GuestOpsError::api("tls", format!("{}: {e}", path.display())))?;
            if certs.is_empty() {
                return Err(GuestOpsError::api(
                    "tls",
                    format!("{}: no certificates found", path.display()),
                ));
            }
            tracing::debug!(path = %path.display(), count = certs.len(), "pinning CA bundle");
            for cert in certs {
                builder = builder.add_root_certificate(cert);
            }
        }
    }

    builder.build().map_err(|e| GuestOpsError::api("tls", e))
}
