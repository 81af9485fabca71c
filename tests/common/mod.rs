//! Shared fixtures: an appliance root in a temp dir with fake sysfs NICs

#![allow(dead_code)]

use lb_provision::config::ProvisionSettings;
use lb_provision::guestinfo::keys;
use lb_provision::guestinfo::mock::MockGuestInfo;
use lb_provision::network::NetworkRole;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

pub const MANAGEMENT_MAC: &str = "00:50:56:a0:00:01";
pub const WORKLOAD_MAC: &str = "00:50:56:a0:00:02";
pub const FRONTEND_MAC: &str = "00:50:56:a0:00:03";

pub const ROOT_PWD: &str = r#"VMware1!/"q\"#;
pub const SSHD_CONFIG: &str = "Port 22\nListenAddress 0.0.0.0\nPermitRootLogin yes\n";
pub const DATAPLANEAPI_CONFIG: &str = "TLS_HOST=0.0.0.0\nTLS_PORT=5556\n";
const OVF_ENV: &str = r#"<Environment xmlns="http://schemas.dmtf.org/ovf/environment/1"/>"#;

/// Appliance root with service configs and NICs for the given roles
pub fn appliance(roles: &[NetworkRole]) -> (TempDir, ProvisionSettings) {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    fs::create_dir_all(root.join("etc/ssh")).unwrap();
    fs::create_dir_all(root.join("etc/haproxy")).unwrap();
    fs::write(root.join("etc/ssh/sshd_config"), SSHD_CONFIG).unwrap();
    fs::write(
        root.join("etc/haproxy/dataplaneapi.cfg"),
        DATAPLANEAPI_CONFIG,
    )
    .unwrap();

    for (i, role) in roles.iter().enumerate() {
        let mac = match role {
            NetworkRole::Management => MANAGEMENT_MAC,
            NetworkRole::Workload => WORKLOAD_MAC,
            NetworkRole::Frontend => FRONTEND_MAC,
        };
        add_nic(root, &format!("eth{i}"), role.pci_address(), mac);
    }

    let settings = ProvisionSettings {
        root: root.to_path_buf(),
        ..Default::default()
    };
    (temp, settings)
}

pub fn add_nic(root: &Path, iface: &str, pci: &str, mac: &str) {
    let dir = root.join("sys/class/net").join(iface);
    fs::create_dir_all(&dir).unwrap();
    #[cfg(unix)]
    std::os::unix::fs::symlink(
        format!("../../../devices/pci0000:00/{pci}"),
        dir.join("device"),
    )
    .unwrap();
    fs::write(dir.join("address"), format!("{mac}\n")).unwrap();
}

/// Guestinfo for a fully static two-network deployment
pub fn deployed() -> MockGuestInfo {
    MockGuestInfo::new()
        .with_ovf_env(OVF_ENV)
        .with_properties([
            (keys::ROOT_PWD, ROOT_PWD),
            (keys::HOSTNAME, "haproxy.local"),
            (keys::MANAGEMENT_IP, "192.168.0.2/24"),
            (keys::MANAGEMENT_GATEWAY, "192.168.0.1"),
            (keys::WORKLOAD_IP, "192.168.1.2/24"),
            (keys::WORKLOAD_GATEWAY, "192.168.1.1"),
            (keys::SERVICE_IP_RANGE, "192.168.1.64/26,192.168.1.128/26"),
        ])
}
