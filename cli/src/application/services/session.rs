//! Session Manager: hypervisor login, active-session check, logout.

use vmtools_common::ConnectionSettings;

use crate::application::ports::{HypervisorConnector, SessionControl};
use crate::domain::GuestOpsError;
use crate::domain::error::Result;

/// Log in to the hypervisor and confirm the session is live.
///
/// # Errors
///
/// [`GuestOpsError::Authentication`] when the credentials are rejected,
/// [`GuestOpsError::Connection`] when login returns without an active session.
pub async fn connect<C: HypervisorConnector>(
    connector: &C,
    settings: &ConnectionSettings,
) -> Result<C::Session> {
    let endpoint = settings.endpoint();
    tracing::info!(
        endpoint = %endpoint,
        service = %settings.service,
        user = %settings.user,
        "logging in to hypervisor"
    );

    let Some(session) = connector.login(settings).await? else {
        return Err(GuestOpsError::Authentication { endpoint });
    };

    if !session.is_active().await? {
        return Err(GuestOpsError::Connection { endpoint });
    }

    tracing::debug!(endpoint = %endpoint, "hypervisor session established");
    Ok(session)
}

/// Release the hypervisor session.
///
/// # Errors
///
/// Returns an error if the hypervisor refuses the logout.
pub async fn disconnect(session: &impl SessionControl) -> Result<()> {
    session.logout().await?;
    tracing::info!("hypervisor session closed");
    Ok(())
}
