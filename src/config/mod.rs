//! Appliance configuration
//!
//! [`ApplianceConfig`] is the typed view of the OVF properties the appliance
//! was deployed with. It is populated in one place,
//! [`ApplianceConfig::from_guestinfo`], so nothing else in the crate deals
//! with string-keyed lookups.

pub mod settings;

pub use settings::ProvisionSettings;

use std::net::IpAddr;
use tracing::debug;

use crate::ProvisionError;
use crate::guestinfo::{GuestInfo, keys};
use crate::network::{NetworkRole, StaticAddress};
use crate::template::escape_value;

/// Addressing for one logical network
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkSettings {
    /// Static address; `None` means DHCP
    pub ip: Option<StaticAddress>,
    pub gateway: Option<IpAddr>,
}

impl NetworkSettings {
    pub fn is_dhcp(&self) -> bool {
        self.ip.is_none()
    }
}

/// Typed appliance configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplianceConfig {
    /// Escaped with [`escape_value`], ready for a quoted template scalar
    pub root_pwd: String,
    pub permit_root_login: bool,
    /// Escaped like `root_pwd`
    pub hostname: String,
    pub nameservers: Vec<String>,
    pub management: NetworkSettings,
    pub workload: NetworkSettings,
    pub frontend: NetworkSettings,
    pub ca_cert: Option<String>,
    pub ca_cert_key: Option<String>,
    pub service_ip_range: Vec<String>,
    pub dataplane_port: Option<u16>,
}

impl ApplianceConfig {
    /// Read and validate the configuration.
    ///
    /// Every missing required key is reported in one
    /// [`ProvisionError::MissingRequired`] rather than stopping at the first.
    pub async fn from_guestinfo(guestinfo: &dyn GuestInfo) -> Result<Self, ProvisionError> {
        let mut missing = Vec::new();

        let root_pwd = required(guestinfo, keys::ROOT_PWD, &mut missing).await?;
        let hostname = required(guestinfo, keys::HOSTNAME, &mut missing).await?;

        let (Some(root_pwd), Some(hostname)) = (root_pwd, hostname) else {
            return Err(ProvisionError::MissingRequired { keys: missing });
        };

        let permit_root_login = match guestinfo.ovf_property(keys::PERMIT_ROOT_LOGIN).await? {
            Some(value) => parse_bool(keys::PERMIT_ROOT_LOGIN, &value)?,
            None => true,
        };

        let nameservers = guestinfo
            .ovf_property(keys::NAMESERVERS)
            .await?
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let service_ip_range = guestinfo
            .ovf_property(keys::SERVICE_IP_RANGE)
            .await?
            .map(|v| split_list(&v))
            .unwrap_or_default();

        let dataplane_port = match guestinfo.ovf_property(keys::DATAPLANE_PORT).await? {
            Some(value) => Some(parse_port(keys::DATAPLANE_PORT, &value)?),
            None => None,
        };

        let management =
            read_network(guestinfo, keys::MANAGEMENT_IP, keys::MANAGEMENT_GATEWAY).await?;
        let workload = read_network(guestinfo, keys::WORKLOAD_IP, keys::WORKLOAD_GATEWAY).await?;
        let frontend = read_network(guestinfo, keys::FRONTEND_IP, keys::FRONTEND_GATEWAY).await?;

        let config = Self {
            root_pwd,
            permit_root_login,
            hostname,
            nameservers,
            management,
            workload,
            frontend,
            ca_cert: guestinfo.ovf_property(keys::CA_CERT).await?,
            ca_cert_key: guestinfo.ovf_property(keys::CA_CERT_KEY).await?,
            service_ip_range,
            dataplane_port,
        };

        debug!(
            "Loaded appliance config for {} (management {})",
            config.hostname,
            config
                .management
                .ip
                .map_or_else(|| "dhcp".to_string(), |ip| ip.to_string())
        );

        Ok(config)
    }

    /// Addressing for a logical network
    pub fn network(&self, role: NetworkRole) -> &NetworkSettings {
        match role {
            NetworkRole::Management => &self.management,
            NetworkRole::Workload => &self.workload,
            NetworkRole::Frontend => &self.frontend,
        }
    }

    /// Configured nameservers, or `defaults` when none were given
    pub fn nameservers_or<S: AsRef<str>>(&self, defaults: &[S]) -> Vec<String> {
        if self.nameservers.is_empty() {
            defaults.iter().map(|s| s.as_ref().to_string()).collect()
        } else {
            self.nameservers.clone()
        }
    }

    /// Dataplane API port, `default` when unset or zero
    pub fn dataplane_port_or(&self, default: u16) -> u16 {
        match self.dataplane_port {
            Some(0) | None => default,
            Some(port) => port,
        }
    }
}

/// Fetch a required OVF property, escaped for template substitution.
///
/// A missing value aborts provisioning with
/// [`ProvisionError::MissingRequired`].
pub async fn get_ovf_string_val(
    guestinfo: &dyn GuestInfo,
    key: &str,
) -> Result<String, ProvisionError> {
    match guestinfo.ovf_property(key).await? {
        Some(value) => Ok(escape_value(&value)),
        None => Err(ProvisionError::MissingRequired {
            keys: vec![key.to_string()],
        }),
    }
}

/// Required lookup that records a missing key instead of stopping at it
async fn required(
    guestinfo: &dyn GuestInfo,
    key: &str,
    missing: &mut Vec<String>,
) -> Result<Option<String>, ProvisionError> {
    match get_ovf_string_val(guestinfo, key).await {
        Ok(value) => Ok(Some(value)),
        Err(ProvisionError::MissingRequired { keys }) => {
            missing.extend(keys);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

async fn read_network(
    guestinfo: &dyn GuestInfo,
    ip_key: &str,
    gateway_key: &str,
) -> Result<NetworkSettings, ProvisionError> {
    let ip = match guestinfo.ovf_property(ip_key).await? {
        Some(value) => Some(
            value
                .parse::<StaticAddress>()
                .map_err(|e| ProvisionError::Config(format!("{ip_key}: {e}")))?,
        ),
        None => None,
    };

    let gateway = match guestinfo.ovf_property(gateway_key).await? {
        Some(value) => Some(value.trim().parse::<IpAddr>().map_err(|e| {
            ProvisionError::Config(format!("{gateway_key}: invalid gateway '{value}': {e}"))
        })?),
        None => None,
    };

    Ok(NetworkSettings { ip, gateway })
}

/// Split a comma and/or whitespace separated list
fn split_list(value: &str) -> Vec<String> {
    value
        .split([',', ' ', '\t', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_port(key: &str, value: &str) -> Result<u16, ProvisionError> {
    value
        .trim()
        .parse()
        .map_err(|e| ProvisionError::Config(format!("{key}: invalid port '{value}': {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ProvisionError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Ok(true),
        "false" | "no" | "0" | "off" => Ok(false),
        other => Err(ProvisionError::Config(format!(
            "{key}: expected a boolean, got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guestinfo::mock::MockGuestInfo;

    fn base() -> MockGuestInfo {
        MockGuestInfo::new()
            .with_ovf_env("<Environment/>")
            .with_property(keys::ROOT_PWD, "s3cret")
            .with_property(keys::HOSTNAME, "lb-01")
    }

    #[tokio::test]
    async fn test_minimal_config() {
        let config = ApplianceConfig::from_guestinfo(&base()).await.unwrap();

        assert_eq!(config.root_pwd, "s3cret");
        assert_eq!(config.hostname, "lb-01");
        assert!(config.permit_root_login);
        assert!(config.management.is_dhcp());
        assert!(config.frontend.gateway.is_none());
        assert!(config.ca_cert.is_none());
        assert_eq!(config.dataplane_port_or(5556), 5556);
    }

    #[tokio::test]
    async fn test_missing_required_collects_all_keys() {
        let err = ApplianceConfig::from_guestinfo(&MockGuestInfo::new())
            .await
            .unwrap_err();

        match err {
            ProvisionError::MissingRequired { keys: missing } => {
                assert_eq!(
                    missing,
                    vec![keys::ROOT_PWD.to_string(), keys::HOSTNAME.to_string()]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_null_required_value_is_missing() {
        let gi = base().with_property(keys::HOSTNAME, "null");
        let err = ApplianceConfig::from_guestinfo(&gi).await.unwrap_err();
        assert!(err.exits_cleanly());
        assert!(err.to_string().contains(keys::HOSTNAME));
    }

    #[tokio::test]
    async fn test_full_config() {
        let gi = base().with_properties([
            (keys::PERMIT_ROOT_LOGIN, "False"),
            (keys::NAMESERVERS, "10.0.0.53, 10.0.0.54"),
            (keys::MANAGEMENT_IP, "10.0.0.2/24"),
            (keys::MANAGEMENT_GATEWAY, "10.0.0.1"),
            (keys::WORKLOAD_IP, "10.1.0.2/24"),
            (keys::WORKLOAD_GATEWAY, "10.1.0.1"),
            (keys::SERVICE_IP_RANGE, "10.2.0.0/24,10.3.0.0/24"),
            (keys::DATAPLANE_PORT, "5443"),
        ]);
        let config = ApplianceConfig::from_guestinfo(&gi).await.unwrap();

        assert!(!config.permit_root_login);
        assert_eq!(config.nameservers, vec!["10.0.0.53", "10.0.0.54"]);
        assert_eq!(config.management.ip.unwrap().to_string(), "10.0.0.2/24");
        let workload = config.network(NetworkRole::Workload);
        assert_eq!(workload.gateway.unwrap().to_string(), "10.1.0.1");
        assert!(config.frontend.is_dhcp());
        assert_eq!(config.service_ip_range, vec!["10.2.0.0/24", "10.3.0.0/24"]);
        assert_eq!(config.dataplane_port_or(5556), 5443);
    }

    #[tokio::test]
    async fn test_zero_port_uses_default() {
        let gi = base().with_property(keys::DATAPLANE_PORT, "0");
        let config = ApplianceConfig::from_guestinfo(&gi).await.unwrap();
        assert_eq!(config.dataplane_port_or(5556), 5556);
    }

    #[tokio::test]
    async fn test_invalid_values_are_config_errors() {
        let gi = base().with_property(keys::MANAGEMENT_IP, "10.0.0.2");
        assert!(matches!(
            ApplianceConfig::from_guestinfo(&gi).await,
            Err(ProvisionError::Config(_))
        ));

        let gi = base().with_property(keys::DATAPLANE_PORT, "70000");
        assert!(matches!(
            ApplianceConfig::from_guestinfo(&gi).await,
            Err(ProvisionError::Config(_))
        ));

        let gi = base().with_property(keys::PERMIT_ROOT_LOGIN, "maybe");
        assert!(matches!(
            ApplianceConfig::from_guestinfo(&gi).await,
            Err(ProvisionError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_nameserver_defaults() {
        let config = ApplianceConfig::from_guestinfo(&base()).await.unwrap();
        assert_eq!(
            config.nameservers_or(&crate::network::DEFAULT_NAMESERVERS),
            vec!["1.1.1.1", "1.0.0.1"]
        );
    }

    #[tokio::test]
    async fn test_required_values_are_escaped() {
        let gi = base()
            .with_property(keys::ROOT_PWD, r#"p"w/\d"#)
            .with_property(keys::HOSTNAME, "lb-01.example.com");
        let config = ApplianceConfig::from_guestinfo(&gi).await.unwrap();

        assert_eq!(config.root_pwd, r#"p\"w\/\\d"#);
        assert_eq!(config.hostname, "lb-01.example.com");
    }

    #[tokio::test]
    async fn test_get_ovf_string_val() {
        let gi = base().with_property(keys::ROOT_PWD, r#"a/b"c"#);
        assert_eq!(
            get_ovf_string_val(&gi, keys::ROOT_PWD).await.unwrap(),
            r#"a\/b\"c"#
        );

        let err = get_ovf_string_val(&gi, keys::CA_CERT).await.unwrap_err();
        assert!(err.exits_cleanly());
    }
}
