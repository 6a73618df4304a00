//! rv-api - RadarVarsler report aggregation service
//!
//! Ingests crowd-sourced radar/speed-control reports, deduplicates and
//! cross-validates them, expires stale ones, and answers proximity-warning
//! checks for observers.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use rv_api::{build_router, db, AppState};
use rv_common::config::Config;
use rv_common::time;

#[derive(Debug, Parser)]
#[command(name = "rv-api", about = "RadarVarsler report aggregation service")]
struct Args {
    /// Path to the TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 127.0.0.1:5730
    #[arg(long)]
    bind: Option<String>,

    /// SQLite database file path
    #[arg(long)]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting RadarVarsler report service (rv-api) v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = Config::resolve(
        args.config.as_deref(),
        args.bind.as_deref(),
        args.database.as_deref(),
    )?;
    info!("Database path: {}", config.database_path.display());

    let pool = db::connect(&config.database_path).await?;
    let state = AppState::new(pool.clone(), config.policy);

    // Warm start: reports survive restarts, unlike timer-driven expiry
    let reports = db::load_active_reports(&pool).await?;
    info!("Restored {} active reports", reports.len());
    {
        let mut agg = state.aggregator()?;
        for report in reports {
            agg.restore(report);
        }
    }

    let today = time::utc_day(time::now());
    let warnings = db::load_warnings_on_day(&pool, today).await?;
    info!("Restored {} warnings delivered today", warnings.len());
    {
        let mut ledger = state.ledger()?;
        for record in warnings {
            ledger.restore(record);
        }
    }

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("rv-api listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
