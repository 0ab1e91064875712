use std::sync::Arc;

use anyhow::{Context, Result};
use qdrant_client::Qdrant;

use pitchdesk::config::Config;
use pitchdesk::db::Db;
use pitchdesk::openai::OpenAiClient;
use pitchdesk::qdrant_util::QdrantChunkStore;
use pitchdesk::rate_limit::RateLimiter;
use pitchdesk::routes::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitchdesk=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    let openai = Arc::new(OpenAiClient::new(
        &config.openai_api_key,
        &config.openai_base_url,
    )?);

    let qdrant = Qdrant::from_url(&config.qdrant_url)
        .build()
        .with_context(|| format!("failed to connect to Qdrant at {}", config.qdrant_url))?;
    let chunks = Arc::new(QdrantChunkStore::new(qdrant));
    chunks.ensure_collection().await?;

    let db = Db::connect(&config.database_url).await?;

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max,
        config.rate_limit_window,
    ));

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        openai,
        chunks,
        db,
        limiter,
    };

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    tracing::info!("pitchdesk listening on http://{bind_addr}");
    axum::serve(listener, router(state))
        .await
        .context("server shutdown")?;
    Ok(())
}
