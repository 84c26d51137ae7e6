use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use common_auth::TokenVerifier;
use pos_service::app::{build_router, cors_layer};
use pos_service::config::load_service_config;
use pos_service::metrics::PosMetrics;
use pos_service::pg_store::{run_migrations, PgSessionStore};
use pos_service::AppState;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_service_config()?;
    info!(
        issuer = %config.jwt.issuer,
        max_connections = config.max_connections,
        "loaded configuration"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to DATABASE_URL")?;
    if config.run_migrations {
        run_migrations(&pool).await?;
    }

    let state = AppState {
        store: Arc::new(PgSessionStore::new(pool)),
        verifier: Arc::new(TokenVerifier::new(config.jwt.clone())),
        metrics: Arc::new(PosMetrics::new()?),
    };

    let app = build_router(state).layer(cors_layer(&config.cors_allowed_origins)?);

    let ip: std::net::IpAddr = config.host.parse().context("Invalid HOST")?;
    let addr = SocketAddr::from((ip, config.port));

    info!(%addr, "starting pos-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
