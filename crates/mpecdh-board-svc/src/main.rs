//! Ceremony Board Service
//!
//! HTTP service hosting ring ceremony instances for MPECDH participants.

use anyhow::Result;
use clap::Parser;
use mpecdh_board::Board;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Board service CLI arguments
#[derive(Parser, Debug)]
#[command(name = "mpecdh-board-svc")]
#[command(about = "Ceremony board for multi-party ECDH")]
struct Args {
    /// Listen address
    #[arg(short, long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Seconds an idle ceremony is kept
    #[arg(long, default_value = "86400")]
    ttl: i64,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!(listen = %args.listen, ttl = args.ttl, "Starting ceremony board service");

    let board = Board::new(args.ttl);

    let cleanup_board = board.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_board.cleanup();
        }
    });

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    info!(address = %args.listen, "Listening");

    axum::serve(listener, mpecdh_board_svc::app(board)).await?;

    Ok(())
}
