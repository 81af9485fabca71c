//! lb-firstboot - first-boot provisioning for the load balancer appliance
//!
//! Runs on every boot. The first boot renders cloud-init payloads from the
//! OVF properties and configures services; later boots restore guestinfo
//! metadata wiped by a power cycle.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

use lb_provision::config::ProvisionSettings;
use lb_provision::config::settings::DEFAULT_SETTINGS_PATH;
use lb_provision::guestinfo::rpctool::RpcTool;
use lb_provision::state::ProvisionStatus;
use lb_provision::{Provisioner, init_logging};

#[derive(Parser)]
#[command(name = "lb-firstboot")]
#[command(author, version, about = "Load balancer first-boot provisioning", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Settings file
    #[arg(long, env = "LB_PROVISION_CONFIG", default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision on first boot, refresh metadata afterwards (default)
    Run,
    /// Run the full provisioning sequence regardless of the first-boot marker
    Provision,
    /// Restore guestinfo metadata from the persisted copy
    RefreshMetadata,
    /// Print the user-data and metadata that would be published
    Render,
    /// Show provisioning state as JSON
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let settings = ProvisionSettings::load(&cli.config)
        .await
        .with_context(|| format!("loading settings from {}", cli.config.display()))?;
    let guestinfo = RpcTool::with_program(&settings.rpctool);
    let provisioner = Provisioner::new(&guestinfo, &settings);

    let outcome = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => provisioner.run_boot().await,
        Commands::Provision => provisioner.provision().await,
        Commands::RefreshMetadata => provisioner.refresh().await,
        Commands::Render => {
            let payloads = provisioner
                .render()
                .await
                .context("rendering cloud-init payloads")?;
            println!("# ---- user-data ----");
            print!("{}", payloads.userdata);
            println!("# ---- metadata ----");
            print!("{}", payloads.metadata);
            return Ok(());
        }
        Commands::Status => {
            let status = ProvisionStatus::collect(provisioner.paths());
            println!("{}", status.to_json()?);
            return Ok(());
        }
    };

    match outcome {
        Ok(outcome) => {
            info!("lb-firstboot: {}", outcome);
            Ok(())
        }
        Err(e) if e.exits_cleanly() => {
            error!("Provisioning aborted: {}", e);
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
