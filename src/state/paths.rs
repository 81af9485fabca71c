//! Appliance filesystem layout
//!
//! Every file the provisioner reads or writes hangs off a root prefix so the
//! whole layout can be relocated under a scratch directory in tests.

use std::path::{Path, PathBuf};

/// Persistent provisioner state
pub const STATE_DIR: &str = "var/lib/vmware";

/// Routing configuration consumed by the anyip and route-table services
pub const ROUTING_DIR: &str = "etc/vmware";

/// HAProxy and dataplaneapi configuration
pub const HAPROXY_DIR: &str = "etc/haproxy";

/// Standard appliance paths
#[derive(Debug, Clone)]
pub struct AppliancePaths {
    /// Filesystem root (default: /)
    pub root: PathBuf,
    /// sysfs network class directory (default: /sys/class/net)
    pub sysfs_net: PathBuf,
}

impl Default for AppliancePaths {
    fn default() -> Self {
        Self::new()
    }
}

impl AppliancePaths {
    /// Create with default paths
    pub fn new() -> Self {
        Self::with_root("/")
    }

    /// Create with a custom root (useful for testing)
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        Self {
            sysfs_net: root.join("sys/class/net"),
            root,
        }
    }

    /// Override the sysfs network directory
    pub fn with_sysfs_net(mut self, sysfs_net: impl AsRef<Path>) -> Self {
        self.sysfs_net = sysfs_net.as_ref().to_path_buf();
        self
    }

    // ==================== State ====================

    /// /var/lib/vmware - Provisioner state directory
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(STATE_DIR)
    }

    /// /var/lib/vmware/.firstboot - First boot marker
    pub fn sentinel(&self) -> PathBuf {
        self.state_dir().join(".firstboot")
    }

    /// /var/lib/vmware/userdata.txt - Persisted encoded user-data
    pub fn userdata(&self) -> PathBuf {
        self.state_dir().join("userdata.txt")
    }

    /// /var/lib/vmware/metadata.txt - Persisted encoded metadata
    pub fn metadata(&self) -> PathBuf {
        self.state_dir().join("metadata.txt")
    }

    /// /var/lib/vmware/postconfig.sh - Commands run after networking is up
    pub fn postconfig(&self) -> PathBuf {
        self.state_dir().join("postconfig.sh")
    }

    // ==================== Routing ====================

    /// /etc/vmware/anyip-routes.cfg - One CIDR per line
    pub fn anyip_routes(&self) -> PathBuf {
        self.root.join(ROUTING_DIR).join("anyip-routes.cfg")
    }

    /// /etc/vmware/route-tables.cfg - `table,name,mac,ip,gateway` per line
    pub fn route_tables(&self) -> PathBuf {
        self.root.join(ROUTING_DIR).join("route-tables.cfg")
    }

    // ==================== Services ====================

    /// /etc/ssh/sshd_config
    pub fn sshd_config(&self) -> PathBuf {
        self.root.join("etc/ssh/sshd_config")
    }

    /// /etc/haproxy/dataplaneapi.cfg - dataplaneapi environment file
    pub fn dataplaneapi_config(&self) -> PathBuf {
        self.root.join(HAPROXY_DIR).join("dataplaneapi.cfg")
    }

    /// /etc/haproxy/ca.crt
    pub fn ca_cert(&self) -> PathBuf {
        self.root.join(HAPROXY_DIR).join("ca.crt")
    }

    /// /etc/haproxy/ca.key
    pub fn ca_key(&self) -> PathBuf {
        self.root.join(HAPROXY_DIR).join("ca.key")
    }

    // ==================== Network ====================

    /// /sys/class/net/<iface>
    pub fn net_dir(&self, iface: &str) -> PathBuf {
        self.sysfs_net.join(iface)
    }
}
