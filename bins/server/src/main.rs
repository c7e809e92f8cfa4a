//! MoneyFlow ledger server
//!
//! Main entry point for the period balance service.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use moneyflow_api::{AppState, create_router};
use moneyflow_core::ledger::{LedgerPolicy, LedgerService};
use moneyflow_db::{PeriodBalanceRepository, connect};
use moneyflow_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "moneyflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect(&config.database).await?;
    info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    // Create ledger service
    let policy = LedgerPolicy::from_config(&config.ledger);
    info!(
        lookback = policy.inheritance_lookback,
        max_attempts = policy.retry.max_attempts,
        "Ledger policy loaded"
    );
    let ledger = LedgerService::new(Arc::new(PeriodBalanceRepository::new(db)), policy);

    // Create application state
    let state = AppState {
        ledger: Arc::new(ledger),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
