//! Guest Locator: resolve one VM from the inventory.

use vmtools_common::VmSelector;

use crate::application::ports::InventorySearch;
use crate::domain::error::Result;
use crate::domain::{GuestHandle, GuestOpsError};

/// Find exactly one VM matching `selector`.
///
/// With `datacenter: None` the whole inventory is searched.
///
/// # Errors
///
/// [`GuestOpsError::NotFound`] when nothing matches and
/// [`GuestOpsError::AmbiguousGuest`] when more than one VM does.
pub async fn find_guest(
    inventory: &impl InventorySearch,
    selector: &VmSelector,
    datacenter: Option<&str>,
) -> Result<GuestHandle> {
    let mut matches = inventory.find_vms(selector, datacenter).await?;
    match matches.len() {
        0 => Err(GuestOpsError::NotFound {
            selector: selector.clone(),
        }),
        1 => {
            let vm = matches.remove(0);
            tracing::debug!(vm = %vm.id, name = %vm.name, "guest located");
            Ok(vm)
        }
        count => Err(GuestOpsError::AmbiguousGuest {
            selector: selector.clone(),
            count,
        }),
    }
}
