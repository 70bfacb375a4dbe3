//! mpaas: one module registry served over HTTP and RPC.
//!
//! ```text
//!                   ┌──────────────────────────────────────────────┐
//!                   │                   SERVICE                    │
//!   HTTP request    │  ┌───────────┐    ┌──────────────────────┐   │
//!   ────────────────┼─▶│   http    │───▶│                      │   │
//!                   │  │  server   │    │   registry modules   │   │
//!   RPC frame       │  ├───────────┤    │  (health, ...)       │──┼──▶ mongodb
//!   ────────────────┼─▶│   rpc     │───▶│                      │   │
//!                   │  │  server   │    └──────────────────────┘   │
//!                   │  └───────────┘                               │
//!                   │  ┌────────────────────────────────────────┐  │
//!                   │  │ lifecycle: start, signals, ordered stop│  │
//!                   │  └────────────────────────────────────────┘  │
//!                   └──────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};

use mpaas::{config, lifecycle, observability, version};

#[derive(Parser)]
#[command(name = "mpaas")]
#[command(about = "Multi-protocol service bootstrap", long_about = None)]
struct Cli {
    /// Configuration source: file or env
    #[arg(short = 't', long = "config-type", default_value = "file", global = true)]
    config_type: String,

    /// Configuration file used with `-t file`
    #[arg(short = 'f', long = "config-file", default_value = "etc/config.toml", global = true)]
    config_file: PathBuf,

    /// Configuration store address (not used yet)
    #[arg(short = 'e', long = "config-etcd", default_value = "127.0.0.1:2379", global = true)]
    config_etcd: String,

    /// Print version information
    #[arg(short = 'v', long = "version")]
    version: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP and RPC services
    Start,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Start) => match start(&cli).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        None if cli.version => {
            println!("{}", version::full_version());
            ExitCode::SUCCESS
        }
        None => match Cli::command().print_help() {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        },
    }
}

async fn start(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let config = config::load(&cli.config_type, &cli.config_file)?;
    observability::logging::init(&config.log)?;

    tracing::info!(
        version = version::short(),
        config_type = %cli.config_type,
        app = %config.app.name,
        "mpaas starting"
    );
    tracing::debug!(config_etcd = %cli.config_etcd, "Configuration store address");

    observability::metrics::init_metrics(&config.metrics);

    let service = lifecycle::bootstrap(&config)?;
    lifecycle::run(service).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
