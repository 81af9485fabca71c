//! Interface discovery through sysfs

use tokio::fs;
use tracing::debug;

use crate::ProvisionError;
use crate::state::AppliancePaths;

/// Interface names the appliance NICs may come up as
pub const CANDIDATE_INTERFACES: [&str; 3] = ["eth0", "eth1", "eth2"];

/// Find the interface backed by the PCI device at `pci_address`.
///
/// Resolves `/sys/class/net/<iface>/device` for each candidate interface and
/// compares the link target's final component.
pub async fn get_network_for_pci(
    paths: &AppliancePaths,
    pci_address: &str,
) -> Result<String, ProvisionError> {
    for iface in CANDIDATE_INTERFACES {
        let device = paths.net_dir(iface).join("device");

        let target = match fs::read_link(&device).await {
            Ok(target) => target,
            Err(e) => {
                debug!("Skipping {}: {}", device.display(), e);
                continue;
            }
        };

        if target.file_name().is_some_and(|name| name == pci_address) {
            debug!("PCI device {} is {}", pci_address, iface);
            return Ok(iface.to_string());
        }
    }

    Err(ProvisionError::NoInterfaceForPci(pci_address.to_string()))
}

/// Read the hardware address of an interface
pub async fn get_mac_for_network(
    paths: &AppliancePaths,
    iface: &str,
) -> Result<String, ProvisionError> {
    let address = fs::read_to_string(paths.net_dir(iface).join("address")).await?;
    Ok(address.trim().to_string())
}
