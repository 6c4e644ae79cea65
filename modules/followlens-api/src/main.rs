use std::sync::Arc;

use anyhow::Result;
use chrono::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use followlens_common::Config;
use followlens_scan::{
    AccountReader, AccountStore, JobStore, MemoryStore, ScanRegistry, ScanRunner,
    StatisticsReader,
};
use grok_client::GrokClient;
use x_client::XClient;

mod rest;

pub struct AppState {
    pub runner: Arc<ScanRunner>,
    pub store: Arc<dyn AccountStore>,
    pub reader: AccountReader,
    pub stats: StatisticsReader,
    /// Identity to scan when a request names neither an id nor a handle.
    pub default_user_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("followlens=info".parse()?))
        .init();

    let config = Config::from_env();

    let source = Arc::new(XClient::new(config.x_bearer_token.clone()));
    let mut grok = GrokClient::new(config.xai_api_key.clone());
    if let Some(model) = &config.grok_model {
        grok = grok.with_model(model);
    }

    let store = Arc::new(MemoryStore::new());
    let runner = Arc::new(ScanRunner::new(
        source,
        Arc::new(grok),
        store.clone(),
        Arc::new(JobStore::new()),
        Arc::new(ScanRegistry::new()),
        Duration::days(config.cache_freshness_days),
    ));

    let state = Arc::new(AppState {
        runner,
        reader: AccountReader::new(store.clone()),
        stats: StatisticsReader::new(store.clone()),
        store,
        default_user_id: config.default_user_id,
    });

    let app = rest::router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("Followlens API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
