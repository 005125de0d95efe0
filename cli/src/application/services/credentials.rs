//! Guest Credential Validator.

use secrecy::SecretString;

use crate::application::ports::GuestAuthManager;
use crate::domain::error::Result;
use crate::domain::{GuestAuthToken, GuestHandle, GuestOpsError};

/// Submit a non-interactive credential assertion to the guest and hand back
/// the token used for every later guest operation in the session.
///
/// # Errors
///
/// [`GuestOpsError::GuestAuthentication`] when the guest rejects the credentials.
pub async fn validate(
    auth_manager: &impl GuestAuthManager,
    vm: &GuestHandle,
    username: &str,
    password: SecretString,
) -> Result<GuestAuthToken> {
    let token = GuestAuthToken::new(username, password);
    if !auth_manager.validate_credentials(vm, &token).await? {
        return Err(GuestOpsError::GuestAuthentication {
            username: username.to_string(),
        });
    }
    tracing::debug!(vm = %vm.id, user = %username, "guest credentials accepted");
    Ok(token)
}
