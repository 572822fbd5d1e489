//! takeover — disaster-recovery failover daemon.
//!
//! Watches the production Kubernetes cluster and, when it goes down,
//! restores the newest Velero backup into the disaster cluster. The
//! disaster cluster can also be grown through the ecloud node API.
//!
//! # Usage
//!
//! ```text
//! takeover server --config /etc/takeover/config.toml
//! takeover grow
//! takeover nodes --page 1 --page-size 50
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use takeover_core::TakeoverConfig;
use takeover_core::config::default_config_path;

mod scale;
mod server;

#[derive(Parser)]
#[command(
    name = "takeover",
    about = "Takeover — restore production into the disaster cluster when it goes down",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file. Defaults to $TAKEOVER_CONFIG, then
    /// ~/.takeover/config/config.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level, used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Watch production and restore on failure until interrupted.
    Server(server::ServerArgs),
    /// Add nodes to the disaster cluster once.
    Grow,
    /// Print the disaster cluster's nodes as JSON.
    Nodes {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        page_size: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format)?;

    let path = cli.config.unwrap_or_else(default_config_path);
    let mut config = TakeoverConfig::from_file(&path)
        .with_context(|| format!("load config {}", path.display()))?;

    match cli.command {
        Command::Server(args) => {
            args.apply(&mut config);
            config.validate().context("invalid server overrides")?;
            server::run(config).await
        }
        Command::Grow => scale::grow(&config).await,
        Command::Nodes { page, page_size } => scale::nodes(&config, page, page_size).await,
    }
}

fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).with_context(|| format!("bad log level {level:?}"))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}
