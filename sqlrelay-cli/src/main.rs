//! sqlrelay CLI - bounded transactional gateway for PostgreSQL
//!
//! Entry point for the sqlrelay binary:
//! - `serve` runs the HTTP server (session-correlated RPC, transaction
//!   registry, background expiry monitor)
//! - `config` prints the effective configuration after file and environment
//!   layering, useful for debugging deployments

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use sqlrelay_core::RelayConfig;

mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "sqlrelay",
    author,
    version,
    about = "Expose PostgreSQL operations over a session-correlated RPC protocol",
    long_about = "Serve database reads, bounded write transactions, DDL, and schema \
                  introspection over HTTP. Write transactions are admission-controlled \
                  and force-rolled-back when they outlive their configured timeout."
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Path to a TOML config file (environment variables still override)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server
    Serve(ServeArgs),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to bind (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// PostgreSQL connection string (overrides config and DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Ceiling on concurrent write transactions (overrides config)
    #[arg(long)]
    max_concurrent_transactions: Option<usize>,

    /// Disable the background transaction expiry monitor
    #[arg(long)]
    no_monitor: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<RelayConfig> {
    match path {
        Some(path) => RelayConfig::load(path),
        None => Ok(RelayConfig::from_env()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug })?;

    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve(args) => {
            if let Some(host) = args.host {
                config.host = host;
            }
            if let Some(port) = args.port {
                config.port = port;
            }
            if let Some(url) = args.database_url {
                config.database_url = url;
            }
            if let Some(max) = args.max_concurrent_transactions {
                config.max_concurrent_transactions = max;
            }
            if args.no_monitor {
                config.enable_transaction_monitor = false;
            }

            info!(
                host = %config.host,
                port = config.port,
                max_concurrent_transactions = config.max_concurrent_transactions,
                monitor = config.enable_transaction_monitor,
                "starting sqlrelay"
            );
            sqlrelay_server::serve(config).await.context("server failed")?;
        }
        Commands::Config => {
            let rendered =
                toml::to_string_pretty(&config).context("failed to render configuration")?;
            print!("{rendered}");
        }
    }

    Ok(())
}
