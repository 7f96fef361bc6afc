use anyhow::Result;
use clap::Parser;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

mod adapters;
mod config;
mod engine;
mod status;
mod store;

use adapters::{start_feed_monitor, HttpBookmaker, HttpReferenceFeed, ReferenceFeed};
use config::Config;
use engine::BotSession;
use status::AppState;
use store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.dry_run {
        info!(
            "🟡 DRY RUN mode – no real bets will be placed (initial bankroll: {:.2})",
            config.initial_balance
        );
    } else {
        info!("🔴 LIVE mode – real bets WILL be placed at the bookmaker");
    }

    // Open the persistent store
    let store = Store::open(&config.store_path)?;
    info!("Store opened: {}", config.store_path);
    if let Some(bankroll) = store.get_bankroll_snapshot()? {
        info!("Last recorded bankroll snapshot: {:.2}", bankroll);
    }

    // Build the adapters
    let bookmaker = Arc::new(HttpBookmaker::new(&config.bookmaker_url, store.clone())?);
    let feed: Arc<dyn ReferenceFeed> = Arc::new(HttpReferenceFeed::new(
        &config.reference_url,
        config.reference_api_key.clone(),
    )?);

    // Stop signal: Ctrl-C flips the watch and the session winds down
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            let _ = stop_tx.send(true);
        }
    });

    // Start the feed monitor and the bot session
    let poll_interval = Duration::from_secs(config.poll_interval_secs);
    let notifications = start_feed_monitor(Arc::clone(&feed), poll_interval);

    let (session, status_rx) = BotSession::new(
        config.clone(),
        store.clone(),
        bookmaker,
        Arc::clone(&feed),
        stop_rx,
    );
    let mut worker = tokio::spawn(session.run(notifications));

    // Start the status HTTP surface
    let app = status::router(AppState { status_rx, store });
    let addr: SocketAddr = config.status_addr.parse()?;
    info!("Status surface listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tokio::select! {
        result = &mut worker => {
            match result {
                Ok(Ok(())) => info!("Bot session finished"),
                Ok(Err(e)) => {
                    error!("Bot session failed: {:#}", e);
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Bot session panicked: {}", e);
                    std::process::exit(1);
                }
            }
        }
        result = axum::serve(listener, app).into_future() => {
            result?;
        }
    }

    Ok(())
}
