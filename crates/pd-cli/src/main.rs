//! ProxDeck CLI
//!
//! Operator console for a Proxmox VE cluster: list guests, drive
//! lifecycle operations to completion, and launch the SPICE console
//! viewer.

mod commands;
mod output;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use pd_api::{ClusterGateway, ProxmoxGateway};
use pd_coordinator::LifecycleCoordinator;
use pd_core::config::{self, ClientConfig};
use pd_core::{ConfigError, OperationKind};

#[derive(Parser)]
#[command(name = "proxdeck")]
#[command(author, version, about = "Proxmox VE cluster cockpit")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cluster host (overrides config)
    #[arg(long, global = true)]
    host: Option<String>,

    /// User to authenticate as, realm included (overrides config)
    #[arg(short, long, global = true)]
    username: Option<String>,

    /// Password for the cluster user
    #[arg(
        long,
        global = true,
        env = "PROXDECK_PASSWORD",
        hide_env_values = true
    )]
    password: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cluster guests
    #[command(alias = "ls")]
    List {
        /// Include detail columns (CPUs, disk, address, console)
        #[arg(short, long)]
        long: bool,
    },

    /// Start a guest (a paused guest is resumed)
    Start {
        /// Guest identifier
        vmid: u32,
    },

    /// Stop a guest
    Stop {
        /// Guest identifier
        vmid: u32,
    },

    /// Suspend (pause) a guest
    Suspend {
        /// Guest identifier
        vmid: u32,
    },

    /// Resume a paused guest
    Resume {
        /// Guest identifier
        vmid: u32,
    },

    /// Launch the SPICE console viewer for a guest
    Console {
        /// Guest identifier
        vmid: u32,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    // The config subcommand works offline; everything else talks to the
    // cluster.
    if let Commands::Config { action } = &cli.command {
        return commands::config::config_command(&config_path, action);
    }

    let mut config: ClientConfig = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => {
            output::print_warning(&format!(
                "No configuration at {}; using defaults (run `proxdeck config init`)",
                config_path.display()
            ));
            ClientConfig::default()
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(username) = cli.username {
        config.server.username = username;
    }

    let password = cli
        .password
        .context("No password supplied; use --password or PROXDECK_PASSWORD")?;

    let gateway = Arc::new(ProxmoxGateway::new(config.server.accept_invalid_certs)?);
    let session = gateway
        .authenticate(
            &config.server.host,
            config.server.port,
            &config.server.username,
            &password,
        )
        .await
        .with_context(|| format!("Failed to authenticate against {}", config.server.host))?;
    tracing::info!(
        "Authenticated against {}:{} as {}",
        config.server.host,
        config.server.port,
        config.server.username
    );

    let coordinator = LifecycleCoordinator::new(gateway, &config);
    coordinator.set_session(session).await;

    match cli.command {
        Commands::List { long } => commands::list::list_command(&coordinator, long).await,
        Commands::Start { vmid } => {
            commands::power::power_command(&coordinator, vmid, OperationKind::Start).await
        }
        Commands::Stop { vmid } => {
            commands::power::power_command(&coordinator, vmid, OperationKind::Stop).await
        }
        Commands::Suspend { vmid } => {
            commands::power::power_command(&coordinator, vmid, OperationKind::Suspend).await
        }
        Commands::Resume { vmid } => {
            commands::power::power_command(&coordinator, vmid, OperationKind::Resume).await
        }
        Commands::Console { vmid } => commands::console::console_command(&coordinator, vmid).await,
        Commands::Config { .. } => unreachable!("handled before authentication"),
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
