mod app;
mod cache;
mod config;
mod emotion;
mod error;
mod recommender;
mod rendezvous;
mod server;
mod spotify;

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    app::App,
    cache::{MemoryTokenStore, RedisTokenStore, TokenStore},
    config::Config,
    spotify::SpotifyConnector,
};

async fn build_token_store(config: &Config) -> Arc<dyn TokenStore> {
    let Some(redis_url) = config.redis_url.as_deref() else {
        info!("REDIS_URL not set, keeping tokens in memory");
        return Arc::new(MemoryTokenStore::new());
    };

    let store = match RedisTokenStore::new(redis_url) {
        Ok(store) => store,
        Err(e) => {
            warn!("Redis unavailable ({e}), keeping tokens in memory");
            return Arc::new(MemoryTokenStore::new());
        }
    };

    if !store.ping().await {
        warn!("Redis not reachable at {redis_url}, keeping tokens in memory");
        return Arc::new(MemoryTokenStore::new());
    }

    info!("Redis connected at {redis_url}");
    Arc::new(store)
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging setup ────────────────────────────────────────────────────────
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("moodmix=info"));
    fmt().with_env_filter(filter).init();

    // ── Load config ──────────────────────────────────────────────────────────
    let config = Config::load()?;

    // ── Token store (Redis optional) ─────────────────────────────────────────
    let tokens = build_token_store(&config).await;

    // ── Run the server ───────────────────────────────────────────────────────
    let connector = Arc::new(SpotifyConnector::new(&config));
    let app = Arc::new(App::new(config, tokens, connector));

    tokio::select! {
        result = server::serve(app) => {
            if let Err(e) = result {
                error!("Server error: {e:?}");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
