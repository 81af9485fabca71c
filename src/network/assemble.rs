//! Per-network assemblers
//!
//! Each assembler resolves its NIC (PCI slot -> interface -> MAC) and pairs
//! it with the addressing from [`ApplianceConfig`].

use tracing::{debug, info};

use super::sysfs::{get_mac_for_network, get_network_for_pci};
use super::{InterfaceConfig, NameserverConfig, NetworkConfig, NetworkRole, render_interface};
use crate::ProvisionError;
use crate::config::{ApplianceConfig, NetworkSettings};
use crate::state::AppliancePaths;

/// A logical network bound to a physical interface
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledNetwork {
    pub role: NetworkRole,
    /// Kernel interface name at boot (`eth0`..)
    pub iface: String,
    pub mac: String,
    pub settings: NetworkSettings,
    pub interface: InterfaceConfig,
}

async fn assemble(
    paths: &AppliancePaths,
    role: NetworkRole,
    settings: &NetworkSettings,
) -> Result<AssembledNetwork, ProvisionError> {
    let iface = get_network_for_pci(paths, role.pci_address()).await?;
    let mac = get_mac_for_network(paths, &iface).await?;
    debug!("{} network on {} ({})", role, iface, mac);

    let interface = render_interface(
        role.logical_id(),
        role.display_name(),
        &mac,
        settings.ip.as_ref(),
    );

    Ok(AssembledNetwork {
        role,
        iface,
        mac,
        settings: settings.clone(),
        interface,
    })
}

/// Management network, with default gateway and nameservers
pub async fn get_management_network_config<S: AsRef<str>>(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
    default_nameservers: &[S],
) -> Result<AssembledNetwork, ProvisionError> {
    let mut network = assemble(paths, NetworkRole::Management, &config.management).await?;

    if let Some(gateway) = config.management.gateway {
        network.interface.ethernet.gateway4 = Some(gateway.to_string());
    }
    network.interface.ethernet.nameservers = Some(NameserverConfig {
        addresses: config.nameservers_or(default_nameservers),
    });

    Ok(network)
}

/// Workload network. Its gateway lives in route table 2, not here.
pub async fn get_workload_network_config(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
) -> Result<AssembledNetwork, ProvisionError> {
    assemble(paths, NetworkRole::Workload, &config.workload).await
}

/// Frontend network, or `None` when this VM has no frontend NIC
pub async fn get_frontend_network_config(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
) -> Result<Option<AssembledNetwork>, ProvisionError> {
    match assemble(paths, NetworkRole::Frontend, &config.frontend).await {
        Ok(network) => Ok(Some(network)),
        Err(ProvisionError::NoInterfaceForPci(pci)) => {
            info!("No frontend NIC at {}, skipping frontend network", pci);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Assemble every network present on this VM, management first
pub async fn assemble_networks<S: AsRef<str>>(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
    default_nameservers: &[S],
) -> Result<Vec<AssembledNetwork>, ProvisionError> {
    let mut networks = vec![
        get_management_network_config(paths, config, default_nameservers).await?,
        get_workload_network_config(paths, config).await?,
    ];
    if let Some(frontend) = get_frontend_network_config(paths, config).await? {
        networks.push(frontend);
    }
    Ok(networks)
}

/// Combine assembled networks into one v2 document
pub fn network_config(networks: &[AssembledNetwork]) -> NetworkConfig {
    NetworkConfig::from_interfaces(networks.iter().map(|n| n.interface.clone()))
}
