//! First-boot provisioning sequence

use tracing::info;

use super::preconditions::{check_for_existing_ovfenv, check_for_existing_userdata};
use crate::config::{ApplianceConfig, ProvisionSettings};
use crate::guestinfo::GuestInfo;
use crate::modules::{certs, routes, services};
use crate::network::NetworkRole;
use crate::network::assemble::{assemble_networks, network_config};
use crate::publish::{
    publish_metadata, publish_userdata, refresh_metadata, render_metadata, render_userdata,
};
use crate::state::{AppliancePaths, BootPhase, FirstBootGate};
use crate::{Outcome, ProvisionError};

/// Payloads rendered without being published
#[derive(Debug, Clone)]
pub struct RenderedPayloads {
    pub userdata: String,
    pub metadata: String,
}

/// Drives provisioning against one guest-info backend
pub struct Provisioner<'a> {
    guestinfo: &'a dyn GuestInfo,
    settings: &'a ProvisionSettings,
    paths: AppliancePaths,
}

impl<'a> Provisioner<'a> {
    pub fn new(guestinfo: &'a dyn GuestInfo, settings: &'a ProvisionSettings) -> Self {
        Self {
            guestinfo,
            settings,
            paths: settings.paths(),
        }
    }

    pub fn paths(&self) -> &AppliancePaths {
        &self.paths
    }

    /// Per-boot entry point: full provisioning once, metadata refresh after
    pub async fn run_boot(&self) -> Result<Outcome, ProvisionError> {
        let phase = FirstBootGate::new(self.paths.clone()).enter().await?;
        info!("Boot phase: {}", phase);

        match phase {
            BootPhase::FirstBoot => self.provision().await,
            BootPhase::Subsequent => self.refresh().await,
        }
    }

    /// Restore guestinfo metadata if the store was cleared
    pub async fn refresh(&self) -> Result<Outcome, ProvisionError> {
        if refresh_metadata(self.guestinfo, &self.paths).await? {
            Ok(Outcome::Refreshed)
        } else {
            Ok(Outcome::Unchanged)
        }
    }

    /// Full provisioning sequence.
    ///
    /// Preconditions and configuration are checked before anything is
    /// written. After that each step runs in order; a failing step stops the
    /// run without undoing earlier ones.
    pub async fn provision(&self) -> Result<Outcome, ProvisionError> {
        if !check_for_existing_ovfenv(self.guestinfo).await? {
            return Ok(Outcome::Skipped("no OVF environment".to_string()));
        }
        if check_for_existing_userdata(self.guestinfo).await? {
            return Ok(Outcome::Skipped(
                "user-data already present in guestinfo".to_string(),
            ));
        }

        let config = ApplianceConfig::from_guestinfo(self.guestinfo).await?;
        let networks = assemble_networks(
            &self.paths,
            &config,
            self.settings.default_nameservers.as_slice(),
        )
        .await?;
        let network = network_config(&networks);

        info!("Provisioning appliance {}", config.hostname);

        publish_userdata(self.guestinfo, &self.paths, self.settings, &config).await?;
        publish_metadata(
            self.guestinfo,
            &self.paths,
            self.settings,
            &config,
            &network,
        )
        .await?;

        services::bind_services_to_management_ip(&self.paths, &config).await?;
        services::set_dataplane_api_port(&self.paths, &config, self.settings.default_dataplane_port)
            .await?;

        certs::write_ca_files(&self.paths, &config).await?;

        routes::write_anyip_config(&self.paths, &config).await?;
        for network in networks.iter().filter(|n| n.role != NetworkRole::Management) {
            routes::disable_default_route(&self.paths, network).await?;
            routes::write_route_table_config(&self.paths, network).await?;
        }

        info!("Provisioning complete");
        Ok(Outcome::Provisioned)
    }

    /// Render both payloads from the current guestinfo without side effects
    pub async fn render(&self) -> Result<RenderedPayloads, ProvisionError> {
        let config = ApplianceConfig::from_guestinfo(self.guestinfo).await?;
        let networks = assemble_networks(
            &self.paths,
            &config,
            self.settings.default_nameservers.as_slice(),
        )
        .await?;
        let instance_id = uuid::Uuid::new_v4().to_string();

        Ok(RenderedPayloads {
            userdata: render_userdata(self.settings, &config).await?,
            metadata: render_metadata(
                self.settings,
                &config,
                &instance_id,
                &network_config(&networks),
            )
            .await?,
        })
    }
}
