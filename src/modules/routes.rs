//! Routing configuration for downstream services
//!
//! - anyip routes: service CIDRs HAProxy answers for
//! - route tables: per-network policy routing (`table,name,mac,ip,gateway`)
//! - postconfig: shell commands run once networking is up

use tracing::{debug, info};

use super::files::{append_lines, write_file};
use crate::ProvisionError;
use crate::config::ApplianceConfig;
use crate::network::NetworkRole;
use crate::network::assemble::AssembledNetwork;
use crate::state::AppliancePaths;

const POSTCONFIG_HEADER: &str = "#!/bin/sh\n";

/// Append the configured service CIDRs to the anyip routes file.
///
/// Returns the number of routes written.
pub async fn write_anyip_config(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
) -> Result<usize, ProvisionError> {
    if config.service_ip_range.is_empty() {
        debug!("No service IP range configured");
        return Ok(0);
    }

    append_lines(&paths.anyip_routes(), config.service_ip_range.as_slice()).await?;
    info!(
        "Wrote {} anyip routes to {}",
        config.service_ip_range.len(),
        paths.anyip_routes().display()
    );
    Ok(config.service_ip_range.len())
}

/// Command removing the DHCP default route of a non-management network
pub fn default_route_command(network: &AssembledNetwork) -> Option<String> {
    if network.role == NetworkRole::Management || !network.settings.is_dhcp() {
        return None;
    }
    Some(format!(
        "ip route del default dev {} || true",
        network.role.display_name()
    ))
}

/// Queue removal of the default route a DHCP lease installs on a
/// workload or frontend interface. Only management owns the default route.
pub async fn disable_default_route(
    paths: &AppliancePaths,
    network: &AssembledNetwork,
) -> Result<bool, ProvisionError> {
    let Some(command) = default_route_command(network) else {
        return Ok(false);
    };

    let postconfig = paths.postconfig();
    if !postconfig.exists() {
        write_file(&postconfig, POSTCONFIG_HEADER, 0o755).await?;
    }
    append_lines(&postconfig, std::slice::from_ref(&command)).await?;

    info!("Default route on {} network will be removed", network.role);
    Ok(true)
}

/// Route table entry for a network with a gateway
pub fn route_table_line(network: &AssembledNetwork) -> Option<String> {
    let table = network.role.route_table()?;
    let gateway = network.settings.gateway?;
    let ip = network
        .settings
        .ip
        .map_or_else(|| "dhcp".to_string(), |ip| ip.to_string());

    Some(format!(
        "{},{},{},{},{}",
        table,
        network.role.display_name(),
        network.mac,
        ip,
        gateway
    ))
}

/// Append the network's route table entry, if it has a gateway
pub async fn write_route_table_config(
    paths: &AppliancePaths,
    network: &AssembledNetwork,
) -> Result<bool, ProvisionError> {
    let Some(line) = route_table_line(network) else {
        return Ok(false);
    };

    append_lines(&paths.route_tables(), std::slice::from_ref(&line)).await?;
    info!("Added route table for {} network", network.role);
    Ok(true)
}
