mod configuration;
mod error;
mod ratelimit;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use noor::agent::Agent;
use noor::providers::base::Provider;
use noor::providers::factory::get_provider;
use noor::quran::client::{QuranApi, QuranClient};
use noor::store::MemoryStore;
use noor::tools::ToolExecutor;

use crate::configuration::Settings;
use crate::ratelimit::MemoryRateLimiter;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let settings = Settings::new()?;
    let addr = settings.server.socket_addr();

    let provider: Arc<dyn Provider> = Arc::from(get_provider(settings.provider.into_config())?);
    let quran: Arc<dyn QuranApi> = Arc::new(QuranClient::new()?);
    let agent = Arc::new(Agent::new(provider.clone(), ToolExecutor::new(quran)));

    let state = AppState {
        agent,
        provider,
        store: Arc::new(MemoryStore::new()),
        limiter: Arc::new(MemoryRateLimiter::new()),
        limits: settings.limits.clone(),
    };

    let app = routes::configure(state, settings.cors.origins());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
