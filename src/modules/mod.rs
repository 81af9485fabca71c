//! Provisioning modules
//!
//! Each module applies one aspect of the appliance configuration to the
//! filesystem. They run in a fixed order during first boot.

pub mod certs;
pub mod files;
pub mod routes;
pub mod services;
