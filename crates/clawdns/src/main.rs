//! clawdns - clusterset-local DNS answers for a Headscale mesh
//!
//! Keeps a cached directory of mesh nodes and resolves
//! `<service>.<namespace>.svc.clusterset.local` names against it.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use claw_headscale::config::DEFAULT_URL;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

const DEFAULT_LOG_FILTER: &str = "clawdns=info,claw_clusterset=info,claw_headscale=info";

#[derive(Parser)]
#[command(name = "clawdns")]
#[command(about = "Clusterset-local service discovery for a Headscale mesh")]
#[command(version)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, env = "CLAWDNS_CONFIG")]
    config: Option<PathBuf>,

    /// Headscale API URL, overriding the config file
    #[arg(long, global = true, env = "HEADSCALE_URL")]
    url: Option<String>,

    /// Headscale API key, overriding the config file
    #[arg(long, global = true, env = "HEADSCALE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Fmt)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Fmt,
    /// One JSON object per event
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the node directory refreshed until interrupted
    Run {
        /// Answer query names read from stdin, one per line
        #[arg(long)]
        stdin: bool,
    },

    /// Resolve clusterset-local names once
    Resolve {
        /// Names such as web.default.svc.clusterset.local
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// List the nodes in the directory
    Nodes,

    /// Check Headscale health
    Health,

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "clawdns.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(DEFAULT_LOG_FILTER)?,
    };
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Fmt => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };

    if let Some(url) = &cli.url {
        config.headscale.url.clone_from(url);
    }
    if let Some(key) = &cli.api_key {
        config.headscale.api_key = Some(key.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    match &cli.command {
        Commands::Run { stdin } => commands::run(load_config(&cli)?, *stdin).await,
        Commands::Resolve { names } => commands::resolve(load_config(&cli)?, names).await,
        Commands::Nodes => commands::nodes(load_config(&cli)?).await,
        Commands::Health => commands::health(load_config(&cli)?).await,
        Commands::InitConfig { output, force } => {
            let url = cli.url.as_deref().unwrap_or(DEFAULT_URL);
            commands::init_config(output, url, *force)
        }
    }
}
