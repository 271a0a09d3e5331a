//! Housie - unified CLI
//!
//! Serves a live game or prints tickets.

#![warn(missing_docs)]

use anyhow::{Context, Result};
use clap::Parser;
use housie_engine::TicketGenerator;
use housie_server::cli::{Cli, Command, render_ticket};
use housie_server::{AppState, GameHost, ServerConfig, router};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::{info, instrument};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve { config, host, port } => run_server(config, host, port).await,
        Command::Tickets { count, seed, json } => print_tickets(count, seed, json),
    }
}

/// Run the game server until Ctrl-C
#[instrument(skip_all)]
async fn run_server(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,housie_engine=debug,housie_server=debug")),
        )
        .init();

    let config = match config_path {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    let config = config
        .with_env_overrides()?
        .with_cli_overrides(host, port)
        .validated();

    info!(
        call_interval_ms = *config.engine().call_interval_ms(),
        max_prize_ranks = *config.engine().max_prize_ranks(),
        "Starting housie server"
    );

    let handle = GameHost::spawn(config.engine().clone());
    let app = router(AppState::new(handle, config.host_token().clone()));

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        tracing::warn!("Ctrl-C handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
}

/// Print tickets to stdout
fn print_tickets(count: usize, seed: Option<u64>, json: bool) -> Result<()> {
    let mut generator = match seed {
        Some(seed) => TicketGenerator::seeded(seed),
        None => TicketGenerator::from_os_rng(),
    };
    let tickets = generator.generate_batch(count);

    if json {
        println!("{}", serde_json::to_string_pretty(&tickets)?);
    } else {
        for ticket in &tickets {
            println!("{}\n", render_ticket(ticket));
        }
    }
    Ok(())
}
