//! mudmux - an intercepting MUD proxy.
//!
//! Sits between one mud server and any number of telnet clients;
//! every line in either direction runs through a plugin-extensible
//! pipeline. Live configuration is handled through the in-proxy
//! settings store (`#bp.settings.set ...`); only the startup parameters
//! are taken here.
//!
//! # Environment Variables
//!
//! - `MUDMUX_LOG`: tracing filter (e.g. `debug`,
//!   `mudmux_runtime=trace`)
//! - `MUDMUX_PASSWORD`: client password, overridden by `--password`

use anyhow::{Context, Result};
use clap::Parser;
use mudmux_runtime::{ProxyConfig, ProxyEngine};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// An intercepting MUD proxy.
#[derive(Parser, Debug)]
#[command(name = "mudmux")]
#[command(version, about, long_about = None)]
struct Args {
    /// Base directory for persisted state
    #[arg(short = 'd', long, default_value = ".mudmux")]
    base_dir: PathBuf,

    /// Mud server host
    #[arg(long)]
    mud_host: String,

    /// Mud server port
    #[arg(long)]
    mud_port: u16,

    /// Address to listen on for clients
    #[arg(long, default_value = "127.0.0.1")]
    listen_host: String,

    /// Port to listen on for clients
    #[arg(short = 'p', long, default_value_t = 9999)]
    listen_port: u16,

    /// Client password (also: MUDMUX_PASSWORD)
    #[arg(long)]
    password: Option<String>,

    /// Password admitting view-only clients
    #[arg(long)]
    view_password: Option<String>,

    /// Log directory (defaults to <base-dir>/logs)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MUDMUX_LOG")
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let password = args
        .password
        .or_else(|| std::env::var("MUDMUX_PASSWORD").ok())
        .context("no client password given (use --password or MUDMUX_PASSWORD)")?;

    let config = ProxyConfig {
        log_dir: args
            .log_dir
            .unwrap_or_else(|| args.base_dir.join("logs")),
        base_dir: args.base_dir,
        mud_host: args.mud_host,
        mud_port: args.mud_port,
        listen_host: args.listen_host,
        listen_port: args.listen_port,
        password,
        view_password: args.view_password,
    };

    info!(
        mud = %config.mud_addr(),
        listen = %config.listen_addr(),
        "starting mudmux"
    );

    let engine = ProxyEngine::new(config).context("engine startup failed")?;
    engine.run().await.context("proxy terminated with error")?;
    Ok(())
}
