//! UAO coordinator daemon.
//!
//! Usage:
//!   uao-api --config uao.toml
//!   uao-api --port 8080 --bind 0.0.0.0
//!
//! # Environment Variables
//!
//! - `UAO_SECTOR_COUNT` - Override the number of sectors
//! - `UAO_AGENTS_PER_SECTOR` - Override agents per sector
//! - `UAO_TIERS` - Comma-separated tier list, in sector order
//! - `UAO_BIND_ADDR` - Server bind address (default: 127.0.0.1)

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uao_api::{AppState, serve};
use uao_coordinator::{CoordinatorConfig, EnvSecretProvider};

fn print_help() {
    println!("UAO coordination daemon");
    println!();
    println!("Usage: uao-api [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -p, --port <PORT>        Port to listen on (default: 8080)");
    println!("  -b, --bind <ADDR>        Bind address (default: 127.0.0.1, env: UAO_BIND_ADDR)");
    println!("  -c, --config <FILE>      Path to a TOML config file");
    println!("  -h, --help               Show this help message");
    println!();
    println!("Environment variables:");
    println!("  UAO_SECTOR_COUNT         Number of sectors");
    println!("  UAO_AGENTS_PER_SECTOR    Agents per sector");
    println!("  UAO_TIERS                Comma-separated tiers, in sector order");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,uao_coordinator=debug,uao_api=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut port: u16 = 8080;
    let mut config_path: Option<String> = None;
    let mut bind_addr: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                if let Some(value) = args.get(i + 1) {
                    port = value
                        .parse()
                        .with_context(|| format!("invalid port number: {value}"))?;
                    i += 1;
                }
            }
            "--config" | "-c" => {
                if let Some(value) = args.get(i + 1) {
                    config_path = Some(value.clone());
                    i += 1;
                }
            }
            "--bind" | "-b" => {
                if let Some(value) = args.get(i + 1) {
                    bind_addr = Some(value.clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => tracing::warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    let host = bind_addr
        .or_else(|| std::env::var("UAO_BIND_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    if host == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 exposes agent assignment to every network interface. \
             Put it behind a firewall or an authenticating proxy."
        );
    }

    let mut config = if let Some(path) = config_path {
        tracing::info!(path = %path, "Loading configuration");
        CoordinatorConfig::from_file(&path)?
    } else {
        tracing::info!("Using default configuration");
        CoordinatorConfig::default()
    };
    config.apply_secrets(&EnvSecretProvider::new()).await?;

    tracing::info!(
        sectors = config.pool.sector_count,
        agents_per_sector = config.pool.agents_per_sector,
        tiers = config.tiers.len(),
        "Coordinator configured"
    );

    let state = Arc::new(AppState::new(&config)?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reporter = state.reporter.clone().spawn(shutdown_rx);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    serve(state, addr, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
        tracing::info!("Shutdown requested");
    })
    .await?;

    let _ = shutdown_tx.send(true);
    reporter.await?;
    Ok(())
}
