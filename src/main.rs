use anyhow::Context;
use clap::Parser;
use llm_esm::cache::store::SqliteStore;
use llm_esm::cache::ModuleCache;
use llm_esm::config::Config;
use llm_esm::gateway::{app, AppState};
use llm_esm::generator::ModuleGenerator;
use llm_esm::model::ProviderKind;
use llm_esm::router::provider::{HttpTransport, ProviderClient};
use llm_esm::router::ProviderRouter;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = Config::parse();
    if config.fallback_shares_primary() {
        warn!(
            "Fallback provider URL equals the primary ({}); set FALLBACK_PROVIDER_URL to use a second upstream",
            config.primary_url
        );
    }

    let store = SqliteStore::open(&config.database_url)
        .with_context(|| format!("opening module cache at {}", config.database_url))?;
    let cache = ModuleCache::new(Arc::new(store));

    let transport = Arc::new(
        HttpTransport::new(config.provider_timeout()).context("building HTTP client")?,
    );
    let router = ProviderRouter::new(
        ProviderClient::new(
            ProviderKind::Primary,
            config.primary_url.clone(),
            transport.clone(),
        ),
        ProviderClient::new(
            ProviderKind::Fallback,
            config.fallback_url.clone(),
            transport,
        ),
        config.force_fallback,
    );

    let app_state = Arc::new(AppState {
        cache: cache.clone(),
        generator: Arc::new(ModuleGenerator::new(router)),
    });

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(
        "llm-esm listening on {} (primary: {}, fallback: {}, force fallback: {})",
        addr, config.primary_url, config.fallback_url, config.force_fallback
    );

    axum::serve(listener, app(app_state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    cache.close().await;
    info!("Module cache closed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
