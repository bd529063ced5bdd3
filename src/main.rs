use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use upwatch::{run_gateway, Config};

/// Users, session tokens and uptime checks over a JSON document store.
#[derive(Parser, Debug)]
#[command(name = "upwatch", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API
    Serve {
        /// Config file (defaults to $UPWATCH_CONFIG, then the platform config dir)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override `gateway.host`
        #[arg(long)]
        host: Option<String>,

        /// Override `gateway.port`
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the effective configuration with secrets masked
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .init();

    match Cli::parse().command {
        Command::Serve { config, host, port } => {
            let mut config = Config::load(config.as_deref())?;
            if let Some(host) = host {
                config.gateway.host = host;
            }
            if let Some(port) = port {
                config.gateway.port = port;
            }
            run_gateway(config).await
        }
        Command::Config { config } => {
            let config = Config::load(config.as_deref())?;
            print!("{}", config.to_redacted_toml()?);
            Ok(())
        }
    }
}
