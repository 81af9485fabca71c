//! Appliance state
//!
//! Tracks whether first boot has already happened and which payloads have
//! been persisted locally.

pub mod paths;

pub use paths::AppliancePaths;

use crate::ProvisionError;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

/// Which path this boot takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootPhase {
    /// Sentinel was absent: run full provisioning
    FirstBoot,
    /// Sentinel present: only refresh guestinfo metadata
    Subsequent,
}

impl std::fmt::Display for BootPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BootPhase::FirstBoot => write!(f, "first-boot"),
            BootPhase::Subsequent => write!(f, "subsequent-boot"),
        }
    }
}

/// Sentinel-file gate for first boot
#[derive(Debug, Clone)]
pub struct FirstBootGate {
    paths: AppliancePaths,
}

impl FirstBootGate {
    pub fn new(paths: AppliancePaths) -> Self {
        Self { paths }
    }

    /// Whether first boot has already been recorded
    pub fn is_done(&self) -> bool {
        self.paths.sentinel().exists()
    }

    /// Decide the boot phase, creating the sentinel on first boot.
    ///
    /// The sentinel is written before provisioning starts: a failed first
    /// boot is not retried by the next one.
    pub async fn enter(&self) -> Result<BootPhase, ProvisionError> {
        let sentinel = self.paths.sentinel();

        if sentinel.exists() {
            debug!("Sentinel {} present", sentinel.display());
            return Ok(BootPhase::Subsequent);
        }

        if let Some(parent) = sentinel.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&sentinel, unix_timestamp().as_bytes()).await?;
        info!("Created first boot sentinel: {}", sentinel.display());

        Ok(BootPhase::FirstBoot)
    }
}

/// Snapshot reported by `lb-firstboot status`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisionStatus {
    pub first_boot_done: bool,
    pub userdata_persisted: bool,
    pub metadata_persisted: bool,
    pub ca_installed: bool,
}

impl ProvisionStatus {
    /// Inspect the filesystem
    pub fn collect(paths: &AppliancePaths) -> Self {
        Self {
            first_boot_done: paths.sentinel().exists(),
            userdata_persisted: paths.userdata().exists(),
            metadata_persisted: paths.metadata().exists(),
            ca_installed: paths.ca_cert().exists() && paths.ca_key().exists(),
        }
    }

    /// Pretty-printed JSON for operators
    pub fn to_json(&self) -> Result<String, ProvisionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn unix_timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let duration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}\n", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_first_boot_then_subsequent() {
        let temp = TempDir::new().unwrap();
        let paths = AppliancePaths::with_root(temp.path());
        let gate = FirstBootGate::new(paths.clone());

        assert!(!gate.is_done());
        assert_eq!(gate.enter().await.unwrap(), BootPhase::FirstBoot);
        assert!(paths.sentinel().exists());
        assert!(gate.is_done());

        assert_eq!(gate.enter().await.unwrap(), BootPhase::Subsequent);
        assert_eq!(gate.enter().await.unwrap(), BootPhase::Subsequent);
    }

    #[test]
    fn test_status_on_empty_root() {
        let temp = TempDir::new().unwrap();
        let status = ProvisionStatus::collect(&AppliancePaths::with_root(temp.path()));
        assert_eq!(
            status,
            ProvisionStatus {
                first_boot_done: false,
                userdata_persisted: false,
                metadata_persisted: false,
                ca_installed: false,
            }
        );
    }

    #[test]
    fn test_status_serializes_to_json() {
        let status = ProvisionStatus {
            first_boot_done: true,
            userdata_persisted: true,
            metadata_persisted: false,
            ca_installed: false,
        };
        let json = status.to_json().unwrap();
        assert!(json.contains("\"first_boot_done\": true"));

        let parsed: ProvisionStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_boot_phase_display() {
        assert_eq!(BootPhase::FirstBoot.to_string(), "first-boot");
        assert_eq!(BootPhase::Subsequent.to_string(), "subsequent-boot");
    }
}
