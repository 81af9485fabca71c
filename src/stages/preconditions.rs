//! Preconditions checked before first-boot provisioning mutates anything

use tracing::debug;

use crate::ProvisionError;
use crate::guestinfo::{GuestInfo, is_unset, keys};

/// Whether the VM carries an OVF environment to provision from
pub async fn check_for_existing_ovfenv(guestinfo: &dyn GuestInfo) -> Result<bool, ProvisionError> {
    let env = guestinfo.ovf_env().await?;
    let present = !is_unset(&env);
    debug!("OVF environment present: {}", present);
    Ok(present)
}

/// Whether an operator already supplied user-data, which takes precedence
/// over anything rendered here
pub async fn check_for_existing_userdata(
    guestinfo: &dyn GuestInfo,
) -> Result<bool, ProvisionError> {
    let existing = guestinfo.get(keys::USERDATA).await?.is_some();
    debug!("Existing user-data: {}", existing);
    Ok(existing)
}
