//! Network configuration
//!
//! The appliance has three virtual NICs identified by PCI slot rather than by
//! interface name, since the OS may enumerate them in any order. Each one is
//! rendered as a netplan v2 ethernet entry matched on MAC address and renamed
//! to its role.

pub mod assemble;
pub mod sysfs;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::ProvisionError;

/// Nameservers used when none are configured
pub const DEFAULT_NAMESERVERS: [&str; 2] = ["1.1.1.1", "1.0.0.1"];

/// Logical networks of the appliance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkRole {
    /// Control plane access; owns the default route
    Management,
    /// Traffic to backend servers
    Workload,
    /// Optional client-facing network
    Frontend,
}

impl NetworkRole {
    pub const ALL: [NetworkRole; 3] = [Self::Management, Self::Workload, Self::Frontend];

    /// Key used for the interface in the rendered network config
    pub fn logical_id(&self) -> &'static str {
        match self {
            Self::Management => "id0",
            Self::Workload => "id1",
            Self::Frontend => "id2",
        }
    }

    /// Interface name after cloud-init renames it
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Management => "management",
            Self::Workload => "workload",
            Self::Frontend => "frontend",
        }
    }

    /// PCI address of the backing virtual NIC
    pub fn pci_address(&self) -> &'static str {
        match self {
            Self::Management => "0000:03:00.0",
            Self::Workload => "0000:0b:00.0",
            Self::Frontend => "0000:13:00.0",
        }
    }

    /// Policy routing table; management uses the main table
    pub fn route_table(&self) -> Option<u32> {
        match self {
            Self::Management => None,
            Self::Workload => Some(2),
            Self::Frontend => Some(3),
        }
    }
}

impl fmt::Display for NetworkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Static address in CIDR notation (`10.0.0.2/24`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticAddress {
    pub addr: IpAddr,
    pub prefix: u8,
}

impl StaticAddress {
    /// Address without the prefix length
    pub fn address(&self) -> IpAddr {
        self.addr
    }
}

impl FromStr for StaticAddress {
    type Err = ProvisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (addr, prefix) = s
            .split_once('/')
            .ok_or_else(|| ProvisionError::Network(format!("'{s}' is not in CIDR notation")))?;

        let addr: IpAddr = addr
            .parse()
            .map_err(|e| ProvisionError::Network(format!("Invalid address '{addr}': {e}")))?;
        let prefix: u8 = prefix
            .parse()
            .map_err(|e| ProvisionError::Network(format!("Invalid prefix '{prefix}': {e}")))?;

        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(ProvisionError::Network(format!(
                "Prefix /{prefix} out of range for {addr}"
            )));
        }

        Ok(Self { addr, prefix })
    }
}

impl fmt::Display for StaticAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix)
    }
}

/// Network configuration (v2 format)
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    pub version: u8,
    #[serde(default)]
    pub ethernets: BTreeMap<String, EthernetConfig>,
}

/// Ethernet interface configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EthernetConfig {
    #[serde(rename = "match")]
    pub match_config: MatchConfig,
    #[serde(rename = "set-name")]
    pub set_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dhcp4: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway4: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<NameserverConfig>,
}

/// Nameserver configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NameserverConfig {
    #[serde(default)]
    pub addresses: Vec<String>,
}

/// Interface matching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MatchConfig {
    pub macaddress: String,
}

/// One rendered interface, keyed by logical id
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceConfig {
    pub id: String,
    pub ethernet: EthernetConfig,
}

impl InterfaceConfig {
    /// Render as a standalone YAML fragment (`<id>: {...}`)
    pub fn to_yaml(&self) -> Result<String, ProvisionError> {
        let mut doc = BTreeMap::new();
        doc.insert(self.id.as_str(), &self.ethernet);
        Ok(serde_yaml::to_string(&doc)?)
    }
}

/// Render one interface. No static address means DHCP.
pub fn render_interface(
    id: &str,
    name: &str,
    mac: &str,
    ip: Option<&StaticAddress>,
) -> InterfaceConfig {
    let mut ethernet = EthernetConfig {
        match_config: MatchConfig {
            macaddress: mac.to_string(),
        },
        set_name: name.to_string(),
        ..Default::default()
    };

    match ip {
        Some(ip) => ethernet.addresses = vec![ip.to_string()],
        None => ethernet.dhcp4 = Some(true),
    }

    InterfaceConfig {
        id: id.to_string(),
        ethernet,
    }
}

impl NetworkConfig {
    /// Build a v2 document from rendered interfaces
    pub fn from_interfaces(interfaces: impl IntoIterator<Item = InterfaceConfig>) -> Self {
        Self {
            version: 2,
            ethernets: interfaces
                .into_iter()
                .map(|iface| (iface.id, iface.ethernet))
                .collect(),
        }
    }

    /// Parse network config from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
