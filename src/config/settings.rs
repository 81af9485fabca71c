//! Provisioner settings
//!
//! Operator-tunable knobs loaded from `/etc/vmware/lb-provision.yaml`.
//! Every key is optional; a missing file means all defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::ProvisionError;
use crate::guestinfo::rpctool::DEFAULT_RPCTOOL;
use crate::network::DEFAULT_NAMESERVERS;
use crate::publish::PayloadEncoding;
use crate::state::AppliancePaths;

/// Default settings file location
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/vmware/lb-provision.yaml";

/// Port dataplaneapi listens on when none is configured
pub const DEFAULT_DATAPLANE_PORT: u16 = 5556;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionSettings {
    /// Filesystem root all appliance paths are resolved against
    pub root: PathBuf,
    /// Override for `/sys/class/net`
    pub sysfs_net: Option<PathBuf>,
    /// Guest-info tool binary
    pub rpctool: String,
    /// Replacement user-data template
    pub userdata_template: Option<PathBuf>,
    /// Replacement metadata template
    pub metadata_template: Option<PathBuf>,
    /// Encoding used when publishing payloads
    pub payload_encoding: PayloadEncoding,
    pub default_nameservers: Vec<String>,
    pub default_dataplane_port: u16,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/"),
            sysfs_net: None,
            rpctool: DEFAULT_RPCTOOL.to_string(),
            userdata_template: None,
            metadata_template: None,
            payload_encoding: PayloadEncoding::Base64,
            default_nameservers: DEFAULT_NAMESERVERS.iter().map(|s| s.to_string()).collect(),
            default_dataplane_port: DEFAULT_DATAPLANE_PORT,
        }
    }
}

impl ProvisionSettings {
    /// Parse settings from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, ProvisionError> {
        // An empty or comment-only document deserializes to unit, not a map
        if yaml
            .lines()
            .map(str::trim)
            .all(|line| line.is_empty() || line.starts_with('#'))
        {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load settings from `path`; a missing file yields the defaults
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ProvisionError> {
        let path = path.as_ref();

        if !path.exists() {
            debug!("No settings file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).await?;
        let settings = Self::from_yaml(&content).map_err(|e| {
            ProvisionError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Appliance paths rooted at the configured prefix
    pub fn paths(&self) -> AppliancePaths {
        let paths = AppliancePaths::with_root(&self.root);
        match &self.sysfs_net {
            Some(sysfs) => paths.with_sysfs_net(sysfs),
            None => paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = ProvisionSettings::default();
        assert_eq!(settings.rpctool, "ovf-rpctool");
        assert_eq!(settings.default_dataplane_port, 5556);
        assert_eq!(settings.default_nameservers, vec!["1.1.1.1", "1.0.0.1"]);
        assert_eq!(settings.payload_encoding, PayloadEncoding::Base64);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings = ProvisionSettings::from_yaml(
            r#"
root: /tmp/appliance
payload_encoding: gzip+base64
default_nameservers: ["9.9.9.9"]
"#,
        )
        .unwrap();

        assert_eq!(settings.root, PathBuf::from("/tmp/appliance"));
        assert_eq!(settings.payload_encoding, PayloadEncoding::GzipBase64);
        assert_eq!(settings.default_nameservers, vec!["9.9.9.9"]);
        assert_eq!(settings.rpctool, "ovf-rpctool");
        assert_eq!(
            settings.paths().sentinel(),
            PathBuf::from("/tmp/appliance/var/lib/vmware/.firstboot")
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(ProvisionSettings::from_yaml("roots: /tmp\n").is_err());
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(
            ProvisionSettings::from_yaml("\n").unwrap(),
            ProvisionSettings::default()
        );
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let temp = TempDir::new().unwrap();
        let settings = ProvisionSettings::load(temp.path().join("absent.yaml"))
            .await
            .unwrap();
        assert_eq!(settings, ProvisionSettings::default());
    }

    #[tokio::test]
    async fn test_load_invalid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("lb-provision.yaml");
        std::fs::write(&path, "default_dataplane_port: [1, 2]\n").unwrap();

        let err = ProvisionSettings::load(&path).await.unwrap_err();
        assert!(matches!(err, ProvisionError::Config(_)));
    }

    #[test]
    fn test_sysfs_override() {
        let settings = ProvisionSettings {
            sysfs_net: Some(PathBuf::from("/tmp/net")),
            ..Default::default()
        };
        assert_eq!(
            settings.paths().net_dir("eth0"),
            PathBuf::from("/tmp/net/eth0")
        );
    }
}
