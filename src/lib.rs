//! lb-provision library
//!
//! First-boot provisioning and CA tooling for the load balancer virtual
//! appliance.
//!
//! # Design Principles
//!
//! - **One adapter**: only [`guestinfo`] talks to the hypervisor channel;
//!   everything else works on the typed [`config::ApplianceConfig`]
//! - **Compute, then apply**: network and payload rendering are pure, the
//!   [`modules`] apply results to the filesystem
//! - **Idempotent boots**: the per-boot path can run forever without drift

pub mod ca;
pub mod config;
pub mod guestinfo;
pub mod modules;
pub mod network;
pub mod publish;
pub mod stages;
pub mod state;
pub mod template;

mod error;

pub use error::ProvisionError;
pub use stages::Provisioner;

/// How a provisioner run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Full first-boot provisioning completed
    Provisioned,
    /// Guestinfo metadata was restored from the persisted copy
    Refreshed,
    /// Later boot with nothing to restore
    Unchanged,
    /// A precondition was not met; nothing was written
    Skipped(String),
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Provisioned => write!(f, "provisioned"),
            Outcome::Refreshed => write!(f, "metadata refreshed"),
            Outcome::Unchanged => write!(f, "unchanged"),
            Outcome::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise each `-v` raises the level one step
/// from INFO.
pub fn init_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();
}
