//! Cash ledger node binary
//!
//! Opens the ledger, optionally starts the escrow sweeper and serves
//! `/health` and `/metrics` until interrupted.

use anyhow::Context;
use axum::{extract::State, http::StatusCode, routing::get, Router};
use cash_ledger::{spawn_sweeper, Config, KeyPair, Ledger};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("CASH_LEDGER_CONFIG") {
        Ok(path) => {
            Config::from_file(&path).with_context(|| format!("Failed to load config {}", path))?
        }
        Err(_) => Config::from_env().context("Invalid CASH_LEDGER_* environment")?,
    };

    init_tracing(config.json_logs);
    tracing::info!(service = %config.service_name, "Starting cash ledger node");

    let ledger = Ledger::open(config.clone())?;
    let stats = ledger.stats()?;
    tracing::info!(
        accounts = stats.accounts,
        open_requests = stats.open_requests,
        holding_escrows = stats.holding_escrows,
        "Ledger opened successfully"
    );

    let sweeper = if config.sweeper.enabled {
        let crank = match &config.sweeper.crank_seed_hex {
            Some(seed) => KeyPair::from_seed_hex(seed)?,
            None => {
                tracing::warn!("No crank seed configured, sweeping with an ephemeral key");
                KeyPair::generate()
            }
        };
        Some(spawn_sweeper(ledger.clone(), crank, &config.sweeper))
    } else {
        None
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(ledger);

    let listener = tokio::net::TcpListener::bind(&config.metrics_listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.metrics_listen_addr))?;
    tracing::info!(addr = %config.metrics_listen_addr, "Metrics endpoint listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await?;
    }

    tracing::info!("Shutting down cash ledger node");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(ledger): State<Ledger>) -> Result<String, (StatusCode, String)> {
    ledger
        .metrics()
        .export()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
