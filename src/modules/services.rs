//! Service binding
//!
//! The SSH daemon and dataplaneapi ship listening on every address. On
//! first boot both are pinned to the management address, and the dataplane
//! port is set.

use tracing::info;

use super::files::replace_in_file;
use crate::ProvisionError;
use crate::config::ApplianceConfig;
use crate::state::AppliancePaths;

/// Listen address placeholder in sshd_config
pub const SSHD_LISTEN_PLACEHOLDER: &str = "ListenAddress 0.0.0.0";

/// Listen address placeholder in the dataplaneapi environment file
pub const TLS_HOST_PLACEHOLDER: &str = "TLS_HOST=0.0.0.0";

/// Port placeholder in the dataplaneapi environment file
pub const TLS_PORT_PLACEHOLDER: &str = "TLS_PORT=5556";

/// Bind sshd and dataplaneapi to the management IP.
///
/// The management network must be static; binding to a DHCP lease would
/// break as soon as the lease changes.
pub async fn bind_services_to_management_ip(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
) -> Result<(), ProvisionError> {
    let ip = config.management.ip.ok_or_else(|| {
        ProvisionError::step(
            "bind-services",
            "management network uses DHCP; a static management IP is required",
        )
    })?;
    let address = ip.address().to_string();

    replace_in_file(
        &paths.sshd_config(),
        SSHD_LISTEN_PLACEHOLDER,
        &format!("ListenAddress {address}"),
    )
    .await?;
    replace_in_file(
        &paths.dataplaneapi_config(),
        TLS_HOST_PLACEHOLDER,
        &format!("TLS_HOST={address}"),
    )
    .await?;

    info!("Bound sshd and dataplaneapi to {}", address);
    Ok(())
}

/// Set the dataplaneapi port, `default` when unset or zero
pub async fn set_dataplane_api_port(
    paths: &AppliancePaths,
    config: &ApplianceConfig,
    default: u16,
) -> Result<u16, ProvisionError> {
    let port = config.dataplane_port_or(default);

    replace_in_file(
        &paths.dataplaneapi_config(),
        TLS_PORT_PLACEHOLDER,
        &format!("TLS_PORT={port}"),
    )
    .await?;

    info!("dataplaneapi port: {}", port);
    Ok(port)
}
