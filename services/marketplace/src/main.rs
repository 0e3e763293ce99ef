//! Marketplace HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, token verification, mail delivery, and the
//! HTTP router, then serves the API and the metrics listener.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use marketplace::app::{AppState, build_router};
use marketplace::auth::token::JwtVerifier;
use marketplace::config::{MarketplaceConfig, StorageBackend};
use marketplace::mail;
use marketplace::observability;
use marketplace::store::{MarketplaceStore, memory::InMemoryStore, postgres::PostgresStore};
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MarketplaceConfig::from_env_or_yaml().context("marketplace config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: MarketplaceConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("marketplace")?;
    let state = build_state(config.clone()).await?;
    tracing::info!(
        storage = state.store.backend_name(),
        mailer = state.mailer.name(),
        "marketplace state ready"
    );
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state);
    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(addr = %listener.local_addr()?, "marketplace listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    metrics_task.abort();
    let _ = metrics_task.await;
    tracing::info!("marketplace stopped");
    Ok(())
}

async fn build_state(config: MarketplaceConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn MarketplaceStore> = match config.storage {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(PostgresStore::connect(pg).await?)
        }
    };
    let mailer = mail::mailer_from_config(&config.mail).context("build mailer")?;
    let superpass_ttl =
        chrono::Duration::from_std(std::time::Duration::from_secs(config.superpass.ttl_secs))
            .context("superpass ttl out of range")?;

    Ok(AppState {
        api_version: "v1".to_string(),
        store,
        token_verifier: Arc::new(JwtVerifier::new(&config.auth)),
        mailer,
        superpass_ttl,
        superpass_recipient: config.superpass.recipient,
    })
}
