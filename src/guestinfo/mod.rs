//! Guest-info access
//!
//! The hypervisor passes appliance configuration into the guest through the
//! OVF environment and a guestinfo key/value channel. Everything that talks
//! to that channel goes through the [`GuestInfo`] trait so the rest of the
//! crate only ever sees typed values.

pub mod mock;
pub mod rpctool;

use async_trait::async_trait;

use crate::ProvisionError;

/// Well-known keys read from or written to guestinfo
pub mod keys {
    pub const ROOT_PWD: &str = "appliance.root_pwd";
    pub const PERMIT_ROOT_LOGIN: &str = "appliance.permit_root_login";
    pub const CA_CERT: &str = "appliance.ca_cert";
    pub const CA_CERT_KEY: &str = "appliance.ca_cert_key";

    pub const HOSTNAME: &str = "network.hostname";
    pub const NAMESERVERS: &str = "network.nameservers";
    pub const MANAGEMENT_IP: &str = "network.management_ip";
    pub const MANAGEMENT_GATEWAY: &str = "network.management_gateway";
    pub const WORKLOAD_IP: &str = "network.workload_ip";
    pub const WORKLOAD_GATEWAY: &str = "network.workload_gateway";
    pub const FRONTEND_IP: &str = "network.frontend_ip";
    pub const FRONTEND_GATEWAY: &str = "network.frontend_gateway";

    pub const SERVICE_IP_RANGE: &str = "loadbalance.service_ip_range";
    pub const DATAPLANE_PORT: &str = "loadbalance.dataplane_port";

    pub const USERDATA: &str = "guestinfo.userdata";
    pub const METADATA: &str = "guestinfo.metadata";

    /// Companion key marking how `key` is encoded
    pub fn encoding_of(key: &str) -> String {
        format!("{key}.encoding")
    }
}

/// Access to the hypervisor guest-info channel
///
/// Lookups return `None` for keys that are unset, empty, or hold the
/// literal string `null` (what the OVF tooling writes for blank fields).
#[async_trait]
pub trait GuestInfo: Send + Sync {
    /// Name of this backend
    fn name(&self) -> &'static str;

    /// Raw OVF environment document; empty when the VM was not deployed
    /// from an OVF with properties.
    async fn ovf_env(&self) -> Result<String, ProvisionError>;

    /// Look up an OVF property
    async fn ovf_property(&self, key: &str) -> Result<Option<String>, ProvisionError>;

    /// Read a guestinfo key
    async fn get(&self, key: &str) -> Result<Option<String>, ProvisionError>;

    /// Write a guestinfo key
    async fn set(&self, key: &str, value: &str) -> Result<(), ProvisionError>;
}

/// Normalize a raw lookup result: trim line endings, map empty and `null` to `None`
pub fn normalize_value(raw: &str) -> Option<String> {
    let value = raw.trim_end_matches(['\n', '\r']);
    if is_unset(value) {
        None
    } else {
        Some(value.to_string())
    }
}

/// True for values the OVF tooling uses to mean "not provided"
pub fn is_unset(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == "null"
}
