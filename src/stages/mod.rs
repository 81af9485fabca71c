//! Boot-time provisioning flow
//!
//! Every boot enters through [`Provisioner::run_boot`]:
//! 1. First boot - preconditions, config, payloads, services, certs, routes
//! 2. Later boots - restore guestinfo metadata from the persisted copy

pub mod preconditions;
pub mod provision;

pub use provision::{Provisioner, RenderedPayloads};
