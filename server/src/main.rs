use std::{path::Path, sync::Arc, time::Duration};

use clap::Parser;
use privtx::{
    config::{load_config, Config},
    crypto::EncryptorType,
    privacy_group::ResidentGroupHandler,
};
use tracing_subscriber::EnvFilter;

use crate::{
    cli::{Cli, Command},
    client::HttpClient,
    db::Database,
    error::Error,
    poller::spawn_poller,
    state::AppState,
};

pub mod cli;
pub mod client;
pub mod db;
pub mod error;
pub mod poller;
pub mod services;
pub mod state;

/// jemalloc is an allocator that is more efficient for the server.
#[cfg(feature = "jemalloc")]
#[global_allocator]
static ALLOC: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Run { config, verbose } => {
            init_logging(verbose);

            run(&config).await?;
            Ok(())
        }
        Command::Keygen => {
            let pair = EncryptorType::default().create().generate_new_keys();

            println!("[[keys]]");
            println!("public = \"{}\"", pair.public);
            println!("private = \"{}\"", pair.private.to_base64());
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
}

async fn run(path: &Path) -> Result<(), Error> {
    let config = load_config(path)?;
    start(&config).await
}

pub async fn start(config: &Config) -> Result<(), Error> {
    let db = match &config.data_dir {
        Some(path) => Database::open(path)?,
        None => {
            tracing::warn!("No data_dir configured, using a temporary database");
            Database::temporary()?
        }
    };

    let client = Arc::new(HttpClient::new()?);
    let state = AppState::new(config, &db, client)?;

    ResidentGroupHandler::new(&state.groups).on_create(&config.resident_groups)?;

    let poller = spawn_poller(
        state.poller(),
        Duration::from_millis(config.poll_interval_ms),
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    tracing::info!(
        "Node {} listening on {} with {} keys",
        config.server_url,
        config.bind_address,
        config.keys.len()
    );

    axum::serve(listener, services::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.abort();
    db.flush().await?;
    tracing::info!("Shut down");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Unable to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
