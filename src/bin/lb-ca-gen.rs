//! lb-ca-gen - create a self-signed certificate authority
//!
//! Writes `<prefix>.crt` and `<prefix>.key` to the output directory.
//! Exits 0 on success or when `-n` finds both files already present, 1 on
//! any usage, validation or generation failure.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use lb_provision::ca::{CaOptions, CaOutcome, generate_ca};
use lb_provision::init_logging;

#[derive(Parser)]
#[command(name = "lb-ca-gen")]
#[command(author, version, about = "Create a self-signed certificate authority", long_about = None)]
struct Cli {
    /// Common name of the CA
    common_name: String,

    /// Output directory (default: current directory)
    output_dir: Option<PathBuf>,

    /// Country
    #[arg(short = 'c', long, default_value = "US")]
    country: String,

    /// State or province
    #[arg(short = 's', long, default_value = "California")]
    state: String,

    /// Locality
    #[arg(short = 'l', long, default_value = "Palo Alto")]
    locality: String,

    /// Organization
    #[arg(short = 'o', long, default_value = "VMware")]
    organization: String,

    /// Organizational unit
    #[arg(short = 'u', long = "org-unit", default_value = "CAPV")]
    org_unit: String,

    /// RSA key size in bits
    #[arg(short = 'b', long, default_value_t = 2048)]
    bits: u32,

    /// Validity in days
    #[arg(short = 'd', long, default_value_t = 3650)]
    days: u32,

    /// Output file prefix
    #[arg(short = 'f', long = "file-prefix", default_value = "ca")]
    prefix: String,

    /// Do not overwrite existing files
    #[arg(short = 'n', long = "no-overwrite")]
    no_overwrite: bool,

    /// Verbose output
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl From<Cli> for CaOptions {
    fn from(cli: Cli) -> Self {
        Self {
            common_name: cli.common_name,
            output_dir: cli.output_dir.unwrap_or_else(|| PathBuf::from(".")),
            country: cli.country,
            state: cli.state,
            locality: cli.locality,
            organization: cli.organization,
            org_unit: cli.org_unit,
            bits: cli.bits,
            days: cli.days,
            prefix: cli.prefix,
            no_overwrite: cli.no_overwrite,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version print to stdout and succeed
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };
    init_logging(u8::from(cli.verbose));

    match generate_ca(&cli.into()).await {
        Ok(CaOutcome::Generated { cert, key }) => {
            info!("Wrote {} and {}", cert.display(), key.display());
            ExitCode::SUCCESS
        }
        Ok(CaOutcome::Skipped) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
